// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `/api/realm/{R}/depots[...]`: named, versioned, rollback-capable roots.

use awp_cas::{BlobKey, Realm};
use awp_store::{DepotRecord, StoreError, MAIN_DEPOT_NAME};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::{authenticate, parse_json, scoped_realm};
use crate::error::ApiError;
use crate::state::{now_unix, AppState};

/// Fetch a depot, auto-materializing `main` the first time a realm's depot
/// namespace is touched (spec.md §3: "auto-created per realm on first use").
/// Any other missing depot name is a plain 404.
fn get_or_bootstrap_depot(
    state: &AppState,
    realm: &Realm,
    name: &str,
    now: u64,
) -> Result<DepotRecord, ApiError> {
    if let Some(record) = state.depots.get(realm, name)? {
        return Ok(record);
    }
    if name != MAIN_DEPOT_NAME {
        return Err(ApiError::NotFound("depot"));
    }
    match state.depots.create(realm, MAIN_DEPOT_NAME, None, state.blobs.as_ref(), state.refs.as_ref(), now) {
        Ok(record) => Ok(record),
        Err(StoreError::NameTaken(_)) => {
            state.depots.get(realm, MAIN_DEPOT_NAME)?.ok_or(ApiError::NotFound("depot"))
        }
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct DepotResponse {
    name: String,
    root: String,
    version: u64,
    created_at: u64,
    updated_at: u64,
    description: Option<String>,
}

impl From<awp_store::DepotRecord> for DepotResponse {
    fn from(r: awp_store::DepotRecord) -> Self {
        Self {
            name: r.name,
            root: r.root.to_string(),
            version: r.version,
            created_at: r.created_at,
            updated_at: r.updated_at,
            description: r.description,
        }
    }
}

pub(crate) async fn list_depots(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(realm_segment): Path<String>,
) -> Result<Json<Vec<DepotResponse>>, ApiError> {
    let path = format!("/api/realm/{realm_segment}/depots");
    let ctx = authenticate(&state, &headers, "GET", &path, b"").await?;
    let realm = scoped_realm(&ctx, &realm_segment)?;
    get_or_bootstrap_depot(&state, &realm, MAIN_DEPOT_NAME, now_unix())?;
    let depots = state.depots.list(&realm)?.into_iter().map(Into::into).collect();
    Ok(Json(depots))
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateDepotRequest {
    name: String,
    description: Option<String>,
}

pub(crate) async fn create_depot(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(realm_segment): Path<String>,
    body: Bytes,
) -> Result<Json<DepotResponse>, ApiError> {
    let path = format!("/api/realm/{realm_segment}/depots");
    let ctx = authenticate(&state, &headers, "POST", &path, &body).await?;
    let realm = scoped_realm(&ctx, &realm_segment)?;
    if !ctx.can_write {
        return Err(ApiError::Forbidden("credential lacks write rights"));
    }
    let req: CreateDepotRequest = parse_json(&body)?;
    let now = now_unix();
    let record = state.depots.create(
        &realm,
        &req.name,
        req.description,
        state.blobs.as_ref(),
        state.refs.as_ref(),
        now,
    )?;
    Ok(Json(record.into()))
}

pub(crate) async fn get_depot(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((realm_segment, name)): Path<(String, String)>,
) -> Result<Json<DepotResponse>, ApiError> {
    let path = format!("/api/realm/{realm_segment}/depots/{name}");
    let ctx = authenticate(&state, &headers, "GET", &path, b"").await?;
    let realm = scoped_realm(&ctx, &realm_segment)?;
    let record = get_or_bootstrap_depot(&state, &realm, &name, now_unix())?;
    Ok(Json(record.into()))
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateDepotRequest {
    root: String,
    expected_version: u64,
    message: Option<String>,
}

/// Increment-new, swap-root, decrement-old: the only legal ordering when the
/// backing stores cannot share a transaction (spec.md §4.10).
async fn swap_root(
    state: &AppState,
    realm: &awp_cas::Realm,
    name: &str,
    expected_version: u64,
    new_root: BlobKey,
    message: Option<String>,
    now: u64,
) -> Result<awp_store::DepotRecord, ApiError> {
    if !state.blobs.has(&new_root)? {
        return Err(ApiError::NotFound("root_not_found"));
    }
    let old = get_or_bootstrap_depot(state, realm, name, now)?;

    let Some(entry) = state.refs.get(realm, &new_root)? else {
        return Err(ApiError::NotFound("root_not_found"));
    };
    state
        .refs
        .increment(realm, new_root, entry.physical_size, entry.logical_size, now)?;

    let record = match state
        .depots
        .update_root(realm, name, expected_version, new_root, message, now)
    {
        Ok(record) => record,
        Err(e) => {
            state.refs.decrement(realm, &new_root)?;
            return Err(e.into());
        }
    };

    state.refs.decrement(realm, &old.root)?;
    Ok(record)
}

pub(crate) async fn update_depot(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((realm_segment, name)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<DepotResponse>, ApiError> {
    let path = format!("/api/realm/{realm_segment}/depots/{name}");
    let ctx = authenticate(&state, &headers, "PUT", &path, &body).await?;
    let realm = scoped_realm(&ctx, &realm_segment)?;
    if !ctx.can_write {
        return Err(ApiError::Forbidden("credential lacks write rights"));
    }
    let req: UpdateDepotRequest = parse_json(&body)?;
    let new_root = BlobKey::parse(&req.root).map_err(|e| ApiError::Malformed(e.to_string()))?;
    let now = now_unix();
    let record = swap_root(&state, &realm, &name, req.expected_version, new_root, req.message, now).await?;
    Ok(Json(record.into()))
}

pub(crate) async fn delete_depot(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((realm_segment, name)): Path<(String, String)>,
) -> Result<(), ApiError> {
    let path = format!("/api/realm/{realm_segment}/depots/{name}");
    let ctx = authenticate(&state, &headers, "DELETE", &path, b"").await?;
    let realm = scoped_realm(&ctx, &realm_segment)?;
    if !ctx.can_write {
        return Err(ApiError::Forbidden("credential lacks write rights"));
    }
    let record = state.depots.delete(&realm, &name)?;
    state.refs.decrement(&realm, &record.root)?;
    Ok(())
}

#[derive(Debug, Serialize)]
pub(crate) struct HistoryEntryResponse {
    version: u64,
    root: String,
    created_at: u64,
    message: Option<String>,
}

pub(crate) async fn depot_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((realm_segment, name)): Path<(String, String)>,
) -> Result<Json<Vec<HistoryEntryResponse>>, ApiError> {
    let path = format!("/api/realm/{realm_segment}/depots/{name}/history");
    let ctx = authenticate(&state, &headers, "GET", &path, b"").await?;
    let realm = scoped_realm(&ctx, &realm_segment)?;
    get_or_bootstrap_depot(&state, &realm, &name, now_unix())?;
    let history = state
        .depots
        .history(&realm, &name)?
        .into_iter()
        .map(|(version, entry)| HistoryEntryResponse {
            version,
            root: entry.root.to_string(),
            created_at: entry.created_at,
            message: entry.message,
        })
        .collect();
    Ok(Json(history))
}

#[derive(Debug, Deserialize)]
pub(crate) struct RollbackRequest {
    version: u64,
}

pub(crate) async fn rollback_depot(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((realm_segment, name)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<DepotResponse>, ApiError> {
    let path = format!("/api/realm/{realm_segment}/depots/{name}/rollback");
    let ctx = authenticate(&state, &headers, "POST", &path, &body).await?;
    let realm = scoped_realm(&ctx, &realm_segment)?;
    if !ctx.can_write {
        return Err(ApiError::Forbidden("credential lacks write rights"));
    }
    let req: RollbackRequest = parse_json(&body)?;
    let now = now_unix();
    get_or_bootstrap_depot(&state, &realm, &name, now)?;

    let Some(target_root) = state.depots.rollback_target(&realm, &name, req.version)? else {
        let current = state.depots.get(&realm, &name)?.ok_or(ApiError::NotFound("depot"))?;
        return Ok(Json(current.into()));
    };
    let current = state.depots.get(&realm, &name)?.ok_or(ApiError::NotFound("depot"))?;
    let message = Some(format!("Rollback to v{}", req.version));
    let record = swap_root(&state, &realm, &name, current.version, target_root, message, now).await?;
    Ok(Json(record.into()))
}
