// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Signed-client enrolment: `init` → `status` (polled) → `complete`.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::{authenticate, parse_json};
use crate::error::ApiError;
use crate::state::{now_unix, AppState};

const CODE_TTL_SECS: u64 = 600;
const POLL_INTERVAL_SECS: u64 = 2;

#[derive(Debug, Deserialize)]
pub(crate) struct InitRequest {
    pubkey: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct InitResponse {
    code: String,
    expires_in: u64,
    poll_interval: u64,
}

pub(crate) async fn init(
    State(state): State<AppState>,
    Json(req): Json<InitRequest>,
) -> Result<Json<InitResponse>, ApiError> {
    let now = now_unix();
    let pending = state.pending_auth.create(&req.pubkey, CODE_TTL_SECS, now);
    Ok(Json(InitResponse {
        code: pending.code,
        expires_in: CODE_TTL_SECS,
        poll_interval: POLL_INTERVAL_SECS,
    }))
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusQuery {
    pubkey: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct StatusResponse {
    status: &'static str,
}

pub(crate) async fn status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<StatusResponse>, ApiError> {
    let now = now_unix();
    if state.pubkeys.lookup(&query.pubkey)?.is_some() {
        return Ok(Json(StatusResponse { status: "approved" }));
    }
    let status = match state.pending_auth.get(&query.pubkey, now)? {
        Some(_) => "pending",
        None => "expired",
    };
    Ok(Json(StatusResponse { status }))
}

#[derive(Debug, Deserialize)]
pub(crate) struct CompleteRequest {
    pubkey: String,
    code: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct CompleteResponse {
    pubkey: String,
}

pub(crate) async fn complete(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CompleteResponse>, ApiError> {
    let now = now_unix();
    let ctx = authenticate(&state, &headers, "POST", "/api/auth/clients/complete", &body).await?;
    let req: CompleteRequest = parse_json(&body)?;
    let valid = state.pending_auth.validate_code(&req.pubkey, &req.code, now)?;
    if !valid {
        return Err(ApiError::Forbidden("invalid or expired enrolment code"));
    }
    state.pubkeys.store(awp_auth::AuthorizedPubkey {
        pubkey: req.pubkey.clone(),
        user_id: ctx.user_id,
        created_at: now,
    })?;
    state.pending_auth.delete(&req.pubkey)?;
    Ok(Json(CompleteResponse { pubkey: req.pubkey }))
}

#[derive(Debug, Serialize)]
pub(crate) struct ClientSummary {
    pubkey: String,
    created_at: u64,
}

pub(crate) async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ClientSummary>>, ApiError> {
    let ctx = authenticate(&state, &headers, "GET", "/api/auth/clients", b"").await?;
    let clients = state
        .pubkeys
        .list_by_user(&ctx.user_id)?
        .into_iter()
        .map(|p| ClientSummary { pubkey: p.pubkey, created_at: p.created_at })
        .collect();
    Ok(Json(clients))
}

pub(crate) async fn revoke(
    State(state): State<AppState>,
    headers: HeaderMap,
    axum::extract::Path(pubkey): axum::extract::Path<String>,
) -> Result<(), ApiError> {
    let ctx = authenticate(&state, &headers, "DELETE", "/api/auth/clients", b"").await?;
    let owned = state
        .pubkeys
        .lookup(&pubkey)?
        .is_some_and(|p| p.user_id == ctx.user_id);
    if !owned {
        return Err(ApiError::Forbidden("pubkey not owned by this user"));
    }
    state.pubkeys.revoke(&pubkey)?;
    Ok(())
}
