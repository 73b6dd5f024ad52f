// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Agent-token and ticket lifecycle, `/api/auth/tokens` and `/api/auth/ticket`.

use awp_cas::{BlobKey, Realm};
use awp_auth::{Token, TokenStore, TicketCommitConfig};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::{authenticate, parse_json};
use crate::error::ApiError;
use crate::state::{now_unix, AppState};

#[derive(Debug, Deserialize)]
pub(crate) struct CreateAgentTokenRequest {
    name: String,
    description: Option<String>,
    #[serde(default)]
    ttl_secs: Option<u64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AgentTokenResponse {
    id: String,
    name: String,
    description: Option<String>,
    created_at: u64,
    expires_at: u64,
}

pub(crate) async fn create_agent_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<AgentTokenResponse>, ApiError> {
    let ctx = authenticate(&state, &headers, "POST", "/api/auth/tokens", &body).await?;
    let req: CreateAgentTokenRequest = parse_json(&body)?;
    let now = now_unix();
    let ttl = req
        .ttl_secs
        .unwrap_or(state.limits.max_agent_token_ttl_secs)
        .min(state.limits.max_agent_token_ttl_secs);
    let token = state
        .tokens
        .create_agent_token(&ctx.user_id, &req.name, req.description, ttl, now);
    Ok(Json(AgentTokenResponse {
        id: token.id,
        name: token.name,
        description: token.description,
        created_at: token.created_at,
        expires_at: token.expires_at,
    }))
}

pub(crate) async fn list_agent_tokens(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<AgentTokenResponse>>, ApiError> {
    let ctx = authenticate(&state, &headers, "GET", "/api/auth/tokens", b"").await?;
    let now = now_unix();
    let tokens = state
        .tokens
        .list_agent_tokens(&ctx.user_id, now)?
        .into_iter()
        .map(|t| AgentTokenResponse {
            id: t.id,
            name: t.name,
            description: t.description,
            created_at: t.created_at,
            expires_at: t.expires_at,
        })
        .collect();
    Ok(Json(tokens))
}

pub(crate) async fn revoke_agent_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<(), ApiError> {
    let ctx = authenticate(&state, &headers, "DELETE", "/api/auth/tokens", b"").await?;
    if !state.tokens.verify_ownership(&id, &ctx.user_id)? {
        return Err(ApiError::Forbidden("token not owned by this user"));
    }
    state.tokens.revoke(&id)?;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateTicketRequest {
    realm: Option<String>,
    read_scope: Option<Vec<String>>,
    #[serde(default)]
    allow_commit: bool,
    commit_quota: Option<u64>,
    #[serde(default)]
    ttl_secs: Option<u64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct TicketResponse {
    id: String,
    realm: String,
    created_at: u64,
    expires_at: u64,
}

pub(crate) async fn create_ticket(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<TicketResponse>, ApiError> {
    let ctx = authenticate(&state, &headers, "POST", "/api/auth/ticket", &body).await?;
    let req: CreateTicketRequest = parse_json(&body)?;
    let realm = match req.realm.as_deref() {
        Some("@me") | Some("~") | None => ctx.realm.clone(),
        Some(other) => {
            let requested = Realm::new(other.to_owned());
            if requested != ctx.realm {
                return Err(ApiError::Forbidden("realm does not match credential"));
            }
            requested
        }
    };
    let read_scope = req
        .read_scope
        .map(|keys| {
            keys.iter()
                .map(|k| BlobKey::parse(k).map_err(|e| ApiError::Malformed(e.to_string())))
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?;
    let commit = req
        .allow_commit
        .then_some(TicketCommitConfig { quota: req.commit_quota, consumed: 0, root: None });
    let now = now_unix();
    let ttl = req
        .ttl_secs
        .unwrap_or(state.limits.max_ticket_ttl_secs)
        .min(state.limits.max_ticket_ttl_secs);
    if !ctx.can_issue_ticket {
        return Err(ApiError::Forbidden("credential cannot issue tickets"));
    }
    let issuer = ctx.token_id.unwrap_or_else(|| format!("signed:{}", ctx.user_id));
    let ticket = state
        .tokens
        .create_ticket(realm, &issuer, read_scope, commit, ttl, now);
    Ok(Json(TicketResponse {
        id: ticket.id,
        realm: ticket.realm.as_str().to_owned(),
        created_at: ticket.created_at,
        expires_at: ticket.expires_at,
    }))
}

pub(crate) async fn revoke_ticket(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<(), ApiError> {
    let now = now_unix();
    let Some(Token::Ticket(ticket)) = state.tokens.get(&id, now)? else {
        return Err(ApiError::NotFound("ticket"));
    };
    let ctx = authenticate(&state, &headers, "DELETE", "/api/auth/ticket", b"").await?;
    let issuer = ctx.token_id.unwrap_or_else(|| format!("signed:{}", ctx.user_id));
    if ticket.issuer_token_id != issuer {
        return Err(ApiError::Forbidden("ticket not owned by this credential"));
    }
    state.tokens.revoke(&id)?;
    Ok(())
}
