// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `PUT`/`GET /api/realm/{R}/chunks/{K}`, the content-addressed hot path.

use awp_cas::BlobKey;
use awp_node::{quick_validate, validate, Node, NodeKind, ValidateError};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::auth::{authenticate, scoped_realm};
use crate::error::ApiError;
use crate::state::{now_unix, AppState};

fn node_content_type(node: &Node) -> &str {
    match node {
        Node::Chunk { .. } | Node::File { .. } | Node::Collection { .. } => {
            "application/octet-stream"
        }
        Node::InlineFile { mime, .. } => mime,
    }
}

fn node_kind_header(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Chunk => "chunk",
        NodeKind::InlineFile => "inline_file",
        NodeKind::File => "file",
        NodeKind::Collection => "collection",
    }
}

pub(crate) async fn put_chunk(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((realm_segment, key_str)): Path<(String, String)>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let path = format!("/api/realm/{realm_segment}/chunks/{key_str}");
    let ctx = authenticate(&state, &headers, "PUT", &path, &body).await?;
    put_chunk_with_ctx(state, ctx, realm_segment, key_str, body).await
}

pub(crate) async fn put_chunk_with_ctx(
    state: AppState,
    ctx: awp_auth::AuthContext,
    realm_segment: String,
    key_str: String,
    body: Bytes,
) -> Result<Response, ApiError> {
    let realm = scoped_realm(&ctx, &realm_segment)?;
    let key = BlobKey::parse(&key_str).map_err(|e| ApiError::Malformed(e.to_string()))?;

    if !ctx.can_write {
        return Err(ApiError::Forbidden("credential lacks write rights"));
    }
    #[allow(clippy::cast_possible_truncation)]
    let body_len = body.len() as u64;
    if body_len > state.limits.max_node_bytes {
        return Err(ApiError::QuotaExceeded { remaining: state.limits.max_node_bytes });
    }
    reserve_ticket_quota(&state, &ctx, body_len, now_unix())?;

    quick_validate(&body)?;

    let already_owned = state.ownership.has(&realm, &key)?;
    let needed = if already_owned { 0 } else { body.len() as u64 };
    let (allowed, _) = state.usage.check_quota(&realm, needed)?;
    if !allowed {
        return Err(ApiError::QuotaExceeded { remaining: 0 });
    }

    let refs = state.refs.clone();
    let realm_for_closure = realm.clone();
    let has_child = |child: &BlobKey| state.blobs.has(child).unwrap_or(false);
    let child_size = |child: &BlobKey| {
        refs.get(&realm_for_closure, child)
            .ok()
            .flatten()
            .map(|entry| entry.physical_size)
    };

    let node = match validate(&body, key, &state.limits.node, has_child, child_size) {
        Ok(node) => node,
        Err(ValidateError::MissingChildren(missing)) => {
            return Ok(ApiError::missing_nodes_response(&missing));
        }
        Err(ValidateError::Malformed(e)) => return Err(e.into()),
        Err(other) => return Err(ApiError::Malformed(other.to_string())),
    };

    state.blobs.put_verified(key, &body)?;

    let now = now_unix();
    state.ownership.add(
        &realm,
        key,
        node.kind(),
        "application/octet-stream",
        node.declared_size(),
        ctx.token_id.as_deref().unwrap_or(&ctx.user_id),
        now,
    )?;

    #[allow(clippy::cast_possible_truncation)]
    let physical = body.len() as u64;
    let logical = if matches!(node.kind(), NodeKind::Chunk | NodeKind::InlineFile) {
        node.declared_size()
    } else {
        0
    };
    let outcome = state.refs.increment(&realm, key, physical, logical, now)?;

    for child in node.children() {
        let Some(entry) = state.refs.get(&realm, &child)? else {
            continue;
        };
        state
            .refs
            .increment(&realm, child, entry.physical_size, entry.logical_size, now)?;
    }

    if outcome.was_zero_before {
        #[allow(clippy::cast_possible_wrap)]
        state.usage.apply(&realm, physical as i64, logical as i64, 1, now)?;
    }

    Ok((StatusCode::OK, axum::Json(serde_json::json!({ "success": true, "key": key.to_string() }))).into_response())
}

/// Check and account `len` bytes of a PUT against a ticket's remaining
/// commit-quota budget (spec.md §4.8 step 1). A no-op for any credential
/// that is not a quota-bearing ticket.
fn reserve_ticket_quota(
    state: &AppState,
    ctx: &awp_auth::AuthContext,
    len: u64,
    now: u64,
) -> Result<(), ApiError> {
    let Some(token_id) = &ctx.token_id else {
        return Ok(());
    };
    let Some((allowed, remaining)) = state.tokens.reserve_ticket_bytes(token_id, len, now)? else {
        return Ok(());
    };
    if allowed {
        Ok(())
    } else {
        Err(ApiError::QuotaExceeded { remaining })
    }
}

pub(crate) async fn get_chunk(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((realm_segment, key_str)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let path = format!("/api/realm/{realm_segment}/chunks/{key_str}");
    let ctx = authenticate(&state, &headers, "GET", &path, b"").await?;
    get_chunk_with_ctx(state, ctx, realm_segment, key_str).await
}

pub(crate) async fn get_chunk_with_ctx(
    state: AppState,
    ctx: awp_auth::AuthContext,
    realm_segment: String,
    key_str: String,
) -> Result<Response, ApiError> {
    let realm = scoped_realm(&ctx, &realm_segment)?;
    let key = BlobKey::parse(&key_str).map_err(|e| ApiError::Malformed(e.to_string()))?;

    if !ctx.can_read {
        return Err(ApiError::Forbidden("credential lacks read rights"));
    }
    if let Some(allowed) = &ctx.allowed_keys {
        if !allowed.contains(&key) {
            return Err(ApiError::Forbidden("key outside ticket read scope"));
        }
    }
    if !state.ownership.has(&realm, &key)? {
        return Err(ApiError::NotFound("key"));
    }
    let Some(bytes) = state.blobs.get(&key)? else {
        return Err(ApiError::NotFound("key"));
    };
    let node = awp_node::decode(&bytes, &state.limits.node)?;

    let mut response = bytes.to_vec().into_response();
    let header_map = response.headers_mut();
    header_map.insert("x-cas-kind", HeaderValue::from_static(node_kind_header(node.kind())));
    let size_value = HeaderValue::from_str(&bytes.len().to_string())
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    header_map.insert("x-cas-size", size_value);
    let content_type_value = HeaderValue::from_str(node_content_type(&node))
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    header_map.insert(axum::http::header::CONTENT_TYPE, content_type_value);
    Ok(response)
}
