// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `/api/realm/{R}/commit[s]`: immutable root-pinning records.

use awp_cas::BlobKey;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::{authenticate, parse_json, scoped_realm};
use crate::error::ApiError;
use crate::state::{now_unix, AppState};

#[derive(Debug, Deserialize)]
pub(crate) struct CreateCommitRequest {
    root: String,
    title: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CommitResponse {
    root: String,
    title: Option<String>,
    created_at: u64,
    created_by: String,
}

pub(crate) async fn create_commit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(realm_segment): Path<String>,
    body: Bytes,
) -> Result<Json<CommitResponse>, ApiError> {
    let path = format!("/api/realm/{realm_segment}/commit");
    let ctx = authenticate(&state, &headers, "POST", &path, &body).await?;
    create_commit_with_ctx(state, ctx, realm_segment, body).await
}

pub(crate) async fn create_commit_with_ctx(
    state: AppState,
    ctx: awp_auth::AuthContext,
    realm_segment: String,
    body: Bytes,
) -> Result<Json<CommitResponse>, ApiError> {
    let req: CreateCommitRequest = parse_json(&body)?;
    let realm = scoped_realm(&ctx, &realm_segment)?;
    if !ctx.can_write {
        return Err(ApiError::Forbidden("credential lacks write rights"));
    }
    let root = BlobKey::parse(&req.root).map_err(|e| ApiError::Malformed(e.to_string()))?;

    if !state.blobs.has(&root)? || !state.ownership.has(&realm, &root)? {
        return Err(ApiError::NotFound("root_not_found"));
    }

    let now = now_unix();
    let creator = ctx.token_id.clone().unwrap_or_else(|| ctx.user_id.clone());

    let Some(root_entry) = state.refs.get(&realm, &root)? else {
        return Err(ApiError::NotFound("root_not_found"));
    };
    state
        .refs
        .increment(&realm, root, root_entry.physical_size, root_entry.logical_size, now)?;
    let record = match state.commits.create(&realm, root, &creator, req.title.clone(), now) {
        Ok(record) => record,
        Err(e) => {
            state.refs.decrement(&realm, &root)?;
            return Err(e.into());
        }
    };

    if let Some(token_id) = &ctx.token_id {
        if matches!(state.tokens.get(token_id, now)?, Some(awp_auth::Token::Ticket(_))) {
            let committed = state.tokens.mark_ticket_committed(token_id, root)?;
            if !committed {
                state.refs.decrement(&realm, &root)?;
                state.commits.delete(&realm, &root)?;
                return Err(ApiError::Forbidden("ticket already committed"));
            }
        }
    }

    Ok(Json(CommitResponse {
        root: root.to_string(),
        title: record.title,
        created_at: record.created_at,
        created_by: record.created_by,
    }))
}

pub(crate) async fn get_commit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((realm_segment, root_str)): Path<(String, String)>,
) -> Result<Json<CommitResponse>, ApiError> {
    let path = format!("/api/realm/{realm_segment}/commits/{root_str}");
    let ctx = authenticate(&state, &headers, "GET", &path, b"").await?;
    let realm = scoped_realm(&ctx, &realm_segment)?;
    let root = BlobKey::parse(&root_str).map_err(|e| ApiError::Malformed(e.to_string()))?;
    let record = state.commits.get(&realm, &root)?.ok_or(ApiError::NotFound("commit"))?;
    Ok(Json(CommitResponse {
        root: root.to_string(),
        title: record.title,
        created_at: record.created_at,
        created_by: record.created_by,
    }))
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateCommitRequest {
    title: Option<String>,
}

pub(crate) async fn update_commit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((realm_segment, root_str)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<CommitResponse>, ApiError> {
    let path = format!("/api/realm/{realm_segment}/commits/{root_str}");
    let ctx = authenticate(&state, &headers, "PATCH", &path, &body).await?;
    let req: UpdateCommitRequest = parse_json(&body)?;
    let realm = scoped_realm(&ctx, &realm_segment)?;
    if !ctx.can_write {
        return Err(ApiError::Forbidden("credential lacks write rights"));
    }
    let root = BlobKey::parse(&root_str).map_err(|e| ApiError::Malformed(e.to_string()))?;
    let record = state.commits.update_title(&realm, &root, req.title)?;
    Ok(Json(CommitResponse {
        root: root.to_string(),
        title: record.title,
        created_at: record.created_at,
        created_by: record.created_by,
    }))
}

pub(crate) async fn delete_commit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((realm_segment, root_str)): Path<(String, String)>,
) -> Result<(), ApiError> {
    let path = format!("/api/realm/{realm_segment}/commits/{root_str}");
    let ctx = authenticate(&state, &headers, "DELETE", &path, b"").await?;
    let realm = scoped_realm(&ctx, &realm_segment)?;
    if !ctx.can_write {
        return Err(ApiError::Forbidden("credential lacks write rights"));
    }
    let root = BlobKey::parse(&root_str).map_err(|e| ApiError::Malformed(e.to_string()))?;
    state.commits.get(&realm, &root)?.ok_or(ApiError::NotFound("commit"))?;
    state.refs.decrement(&realm, &root)?;
    state.commits.delete(&realm, &root)?;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListCommitsQuery {
    limit: Option<usize>,
    cursor: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ListCommitsResponse {
    commits: Vec<CommitResponse>,
    next_cursor: Option<String>,
}

pub(crate) async fn list_commits(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(realm_segment): Path<String>,
    Query(query): Query<ListCommitsQuery>,
) -> Result<Json<ListCommitsResponse>, ApiError> {
    let path = format!("/api/realm/{realm_segment}/commits");
    let ctx = authenticate(&state, &headers, "GET", &path, b"").await?;
    let realm = scoped_realm(&ctx, &realm_segment)?;
    let limit = query.limit.unwrap_or(50).min(1000);
    let (entries, next_cursor) = state.commits.list(&realm, limit, query.cursor.as_deref())?;
    let commits = entries
        .into_iter()
        .map(|(root, record)| CommitResponse {
            root: root.to_string(),
            title: record.title,
            created_at: record.created_at,
            created_by: record.created_by,
        })
        .collect();
    Ok(Json(ListCommitsResponse { commits, next_cursor }))
}
