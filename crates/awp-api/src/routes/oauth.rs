// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use crate::error::ApiError;
use crate::identity::{OAuthConfig, OAuthTokenResponse, OAuthUser};
use crate::state::AppState;

pub(crate) async fn config(State(state): State<AppState>) -> Json<OAuthConfig> {
    Json(state.identity.config())
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenRequest {
    code: String,
}

pub(crate) async fn token(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> Result<Json<OAuthTokenResponse>, ApiError> {
    Ok(Json(state.identity.exchange_code(&req.code)?))
}

pub(crate) async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<OAuthUser>, ApiError> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthenticated)?;
    Ok(Json(state.identity.me(token)?))
}
