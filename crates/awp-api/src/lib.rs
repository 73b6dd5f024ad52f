// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The HTTP surface for the AWP storage service (spec.md §6), an
//! `axum::Router` over [`state::AppState`].
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions,
    clippy::use_self
)]

mod auth;
mod error;
mod identity;
mod routes;
mod state;

pub use error::ApiError;
pub use identity::{IdentityProvider, OAuthConfig, OAuthTokenResponse, OAuthUser, StaticIdentityProvider};
pub use state::{now_unix, AppState, Limits, DEFAULT_MAX_NODE_BYTES};

use axum::extract::{Path as AxumPath, State as AxumState};
use axum::http::HeaderName;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the full `/api/...` router over `state`, including the
/// `/api/ticket/{ticketId}/...` mirror (spec.md §6's final row): the ticket
/// mirror reuses the same handlers because `AuthResolver` treats a ticket id
/// presented as a bearer token identically whether it arrived via the
/// `Authorization` header on a `/realm/...` route or bare on a
/// `/ticket/...` route.
#[must_use]
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            HeaderName::from_static("authorization"),
            HeaderName::from_static("content-type"),
            HeaderName::from_static("x-awp-pubkey"),
            HeaderName::from_static("x-awp-timestamp"),
            HeaderName::from_static("x-awp-signature"),
        ]);

    Router::new()
        .route("/api/health", get(routes::health::health))
        .route("/api/oauth/config", get(routes::oauth::config))
        .route("/api/oauth/token", post(routes::oauth::token))
        .route("/api/oauth/me", get(routes::oauth::me))
        .route("/api/auth/clients/init", post(routes::auth_clients::init))
        .route("/api/auth/clients/status", get(routes::auth_clients::status))
        .route("/api/auth/clients/complete", post(routes::auth_clients::complete))
        .route("/api/auth/clients", get(routes::auth_clients::list))
        .route("/api/auth/clients/{pubkey}", delete(routes::auth_clients::revoke))
        .route("/api/auth/tokens", post(routes::tokens::create_agent_token).get(routes::tokens::list_agent_tokens))
        .route("/api/auth/tokens/{id}", delete(routes::tokens::revoke_agent_token))
        .route("/api/auth/ticket", post(routes::tokens::create_ticket))
        .route("/api/auth/ticket/{id}", delete(routes::tokens::revoke_ticket))
        .route("/api/realm/{realm}", get(routes::realm::realm_info))
        .route(
            "/api/realm/{realm}/chunks/{key}",
            put(routes::realm::put_chunk).get(routes::realm::get_chunk),
        )
        .route("/api/realm/{realm}/tree/{key}", get(routes::realm::get_tree))
        .route("/api/realm/{realm}/commit", post(routes::realm::create_commit))
        .route(
            "/api/realm/{realm}/commits/{root}",
            get(routes::realm::get_commit)
                .patch(routes::realm::update_commit)
                .delete(routes::realm::delete_commit),
        )
        .route("/api/realm/{realm}/commits", get(routes::realm::list_commits))
        .route("/api/realm/{realm}/usage", get(routes::realm::get_usage))
        .route(
            "/api/realm/{realm}/depots",
            get(routes::realm::list_depots).post(routes::realm::create_depot),
        )
        .route(
            "/api/realm/{realm}/depots/{id}",
            get(routes::realm::get_depot)
                .put(routes::realm::update_depot)
                .delete(routes::realm::delete_depot),
        )
        .route("/api/realm/{realm}/depots/{id}/history", get(routes::realm::depot_history))
        .route("/api/realm/{realm}/depots/{id}/rollback", post(routes::realm::rollback_depot))
        .merge(ticket_mirror())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `/api/ticket/{ticketId}/...` mirrors every `/api/realm/{R}/...` route
/// one-for-one; the realm segment in the path is replaced by the literal
/// `@me`, which `scoped_realm` rewrites to the credential's own realm.
fn ticket_mirror() -> Router<AppState> {
    Router::new()
        .route("/api/ticket/{ticket_id}", get(ticket_realm_info))
        .route(
            "/api/ticket/{ticket_id}/chunks/{key}",
            put(ticket_put_chunk).get(ticket_get_chunk),
        )
        .route("/api/ticket/{ticket_id}/tree/{key}", get(ticket_get_tree))
        .route("/api/ticket/{ticket_id}/commit", post(ticket_create_commit))
        .route("/api/ticket/{ticket_id}/usage", get(ticket_get_usage))
}

// The ticket mirror authenticates by the ticket id itself, presented bare
// in the path rather than as an `Authorization` header (spec.md §4.7): the
// credential IS the path segment. Each handler resolves its `AuthContext`
// via `auth::authenticate_ticket` and then calls straight into the realm
// handler's `_with_ctx` body with `@me`, which `scoped_realm` rewrites to
// the ticket's own realm.

async fn ticket_realm_info(
    AxumState(state): AxumState<AppState>,
    AxumPath(ticket_id): AxumPath<String>,
) -> Result<axum::response::Response, ApiError> {
    let ctx = auth::authenticate_ticket(&state, &ticket_id).await?;
    Ok(routes::realm::realm_info_with_ctx(state, ctx, "@me".to_owned())?.into_response())
}

async fn ticket_put_chunk(
    AxumState(state): AxumState<AppState>,
    AxumPath((ticket_id, key)): AxumPath<(String, String)>,
    body: axum::body::Bytes,
) -> Result<axum::response::Response, ApiError> {
    let ctx = auth::authenticate_ticket(&state, &ticket_id).await?;
    routes::realm::put_chunk_with_ctx(state, ctx, "@me".to_owned(), key, body).await
}

async fn ticket_get_chunk(
    AxumState(state): AxumState<AppState>,
    AxumPath((ticket_id, key)): AxumPath<(String, String)>,
) -> Result<axum::response::Response, ApiError> {
    let ctx = auth::authenticate_ticket(&state, &ticket_id).await?;
    routes::realm::get_chunk_with_ctx(state, ctx, "@me".to_owned(), key).await
}

async fn ticket_get_tree(
    AxumState(state): AxumState<AppState>,
    AxumPath((ticket_id, key)): AxumPath<(String, String)>,
    axum::extract::Query(query): axum::extract::Query<routes::realm::TreeQuery>,
) -> Result<axum::response::Response, ApiError> {
    let ctx = auth::authenticate_ticket(&state, &ticket_id).await?;
    Ok(
        routes::realm::get_tree_with_ctx(state, ctx, "@me".to_owned(), key, query)
            .await?
            .into_response(),
    )
}

async fn ticket_create_commit(
    AxumState(state): AxumState<AppState>,
    AxumPath(ticket_id): AxumPath<String>,
    body: axum::body::Bytes,
) -> Result<axum::response::Response, ApiError> {
    let ctx = auth::authenticate_ticket(&state, &ticket_id).await?;
    Ok(
        routes::realm::create_commit_with_ctx(state, ctx, "@me".to_owned(), body)
            .await?
            .into_response(),
    )
}

async fn ticket_get_usage(
    AxumState(state): AxumState<AppState>,
    AxumPath(ticket_id): AxumPath<String>,
) -> Result<axum::response::Response, ApiError> {
    let ctx = auth::authenticate_ticket(&state, &ticket_id).await?;
    Ok(routes::realm::get_usage_with_ctx(state, ctx, "@me".to_owned())?.into_response())
}
