// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `/api/realm/{R}/...` and its `/api/ticket/{id}/...` mirror.

mod chunks;
mod commit;
mod depot;
mod tree;

pub(crate) use chunks::{get_chunk, get_chunk_with_ctx, put_chunk, put_chunk_with_ctx};
pub(crate) use commit::{
    create_commit, create_commit_with_ctx, delete_commit, get_commit, list_commits, update_commit,
};
pub(crate) use depot::{
    create_depot, delete_depot, depot_history, get_depot, list_depots, rollback_depot,
    update_depot,
};
pub(crate) use tree::{get_tree, get_tree_with_ctx, TreeQuery};

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use crate::auth::{authenticate, scoped_realm};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub(crate) struct RealmInfo {
    realm: String,
    can_read: bool,
    can_write: bool,
    can_issue_ticket: bool,
    max_node_bytes: u64,
    max_name_bytes: usize,
}

pub(crate) async fn realm_info(
    State(state): State<AppState>,
    headers: HeaderMap,
    axum::extract::Path(requested): axum::extract::Path<String>,
) -> Result<Json<RealmInfo>, ApiError> {
    let ctx = authenticate(&state, &headers, "GET", &format!("/api/realm/{requested}"), b"").await?;
    realm_info_with_ctx(state, ctx, requested)
}

pub(crate) fn realm_info_with_ctx(
    state: AppState,
    ctx: awp_auth::AuthContext,
    requested: String,
) -> Result<Json<RealmInfo>, ApiError> {
    let realm = scoped_realm(&ctx, &requested)?;
    Ok(Json(RealmInfo {
        realm: realm.as_str().to_owned(),
        can_read: ctx.can_read,
        can_write: ctx.can_write,
        can_issue_ticket: ctx.can_issue_ticket,
        max_node_bytes: state.limits.max_node_bytes,
        max_name_bytes: state.limits.node.max_name_bytes,
    }))
}

#[derive(Debug, Serialize)]
pub(crate) struct UsageResponse {
    physical_bytes: u64,
    logical_bytes: u64,
    node_count: u64,
    quota_limit: u64,
    updated_at: u64,
}

pub(crate) async fn get_usage(
    State(state): State<AppState>,
    headers: HeaderMap,
    axum::extract::Path(requested): axum::extract::Path<String>,
) -> Result<Json<UsageResponse>, ApiError> {
    let ctx = authenticate(&state, &headers, "GET", &format!("/api/realm/{requested}/usage"), b"").await?;
    get_usage_with_ctx(state, ctx, requested)
}

pub(crate) fn get_usage_with_ctx(
    state: AppState,
    ctx: awp_auth::AuthContext,
    requested: String,
) -> Result<Json<UsageResponse>, ApiError> {
    let realm = scoped_realm(&ctx, &requested)?;
    let summary = state.usage.get(&realm)?;
    Ok(Json(UsageResponse {
        physical_bytes: summary.physical_bytes,
        logical_bytes: summary.logical_bytes,
        node_count: summary.node_count,
        quota_limit: summary.quota_limit,
        updated_at: summary.updated_at,
    }))
}
