// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `GET /api/realm/{R}/tree/{K}`: breadth-first DAG summary.

use std::collections::{HashMap, HashSet, VecDeque};

use awp_cas::BlobKey;
use awp_node::{decode, NodeKind};
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::{authenticate, scoped_realm};
use crate::error::ApiError;
use crate::state::AppState;

const MAX_NODES_PER_PAGE: usize = 1000;

#[derive(Debug, Deserialize)]
pub(crate) struct TreeQuery {
    cursor: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct NodeSummary {
    kind: &'static str,
    size: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct TreeResponse {
    nodes: HashMap<String, NodeSummary>,
    next: Option<String>,
}

fn kind_label(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Chunk => "chunk",
        NodeKind::InlineFile => "inline_file",
        NodeKind::File => "file",
        NodeKind::Collection => "collection",
    }
}

fn encode_cursor(keys: &VecDeque<BlobKey>) -> String {
    keys.iter().map(BlobKey::to_string).collect::<Vec<_>>().join(",")
}

fn decode_cursor(cursor: &str) -> Result<VecDeque<BlobKey>, ApiError> {
    cursor
        .split(',')
        .filter(|s| !s.is_empty())
        .map(|s| BlobKey::parse(s).map_err(|e| ApiError::Malformed(e.to_string())))
        .collect()
}

pub(crate) async fn get_tree(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((realm_segment, key_str)): Path<(String, String)>,
    Query(query): Query<TreeQuery>,
) -> Result<Json<TreeResponse>, ApiError> {
    let path = format!("/api/realm/{realm_segment}/tree/{key_str}");
    let ctx = authenticate(&state, &headers, "GET", &path, b"").await?;
    get_tree_with_ctx(state, ctx, realm_segment, key_str, query).await
}

pub(crate) async fn get_tree_with_ctx(
    state: AppState,
    ctx: awp_auth::AuthContext,
    realm_segment: String,
    key_str: String,
    query: TreeQuery,
) -> Result<Json<TreeResponse>, ApiError> {
    let realm = scoped_realm(&ctx, &realm_segment)?;
    if !ctx.can_read {
        return Err(ApiError::Forbidden("credential lacks read rights"));
    }

    let mut queue = match &query.cursor {
        Some(cursor) => decode_cursor(cursor)?,
        None => {
            let root = BlobKey::parse(&key_str).map_err(|e| ApiError::Malformed(e.to_string()))?;
            VecDeque::from([root])
        }
    };

    let mut visited: HashSet<BlobKey> = HashSet::new();
    let mut nodes: HashMap<String, NodeSummary> = HashMap::new();

    while let Some(key) = queue.pop_front() {
        if nodes.len() >= MAX_NODES_PER_PAGE {
            queue.push_front(key);
            break;
        }
        if !visited.insert(key) {
            continue;
        }
        if !state.ownership.has(&realm, &key)? {
            continue;
        }
        let Some(bytes) = state.blobs.get(&key)? else {
            continue;
        };
        let node = decode(&bytes, &state.limits.node)?;
        nodes.insert(
            key.to_string(),
            NodeSummary {
                kind: kind_label(node.kind()),
                size: node.declared_size(),
            },
        );
        for child in node.children() {
            if !visited.contains(&child) {
                queue.push_back(child);
            }
        }
    }

    let next = (!queue.is_empty()).then(|| encode_cursor(&queue));
    Ok(Json(TreeResponse { nodes, next }))
}
