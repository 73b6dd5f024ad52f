// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The single `IntoResponse` seam every handler's internal error flows
//! through, per spec.md §7's error taxonomy.

use awp_cas::BlobKey;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

/// Top-level error every handler returns; converts to the HTTP status and
/// JSON body spec.md §7 assigns to each error kind.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No or unverifiable credential. 401.
    #[error("unauthenticated")]
    Unauthenticated,
    /// Credential valid but scope/role/ticket-state forbids the operation. 403.
    #[error("forbidden: {0}")]
    Forbidden(&'static str),
    /// Key not owned by realm, or ticket/commit/depot absent. 404.
    #[error("not found: {0}")]
    NotFound(&'static str),
    /// Expired ticket. 410.
    #[error("gone")]
    Gone,
    /// JSON/schema/path failures, or a codec rejection. 400.
    #[error("malformed request: {0}")]
    Malformed(String),
    /// Realm or ticket quota exceeded. 413.
    #[error("quota exceeded")]
    QuotaExceeded {
        /// Bytes still available under the quota.
        remaining: u64,
    },
    /// Depot name collision, optimistic-CAS loss, or already-committed ticket.
    #[error("conflict: {0}")]
    Conflict(&'static str),
    /// A dependency (store, ledger, codec) failed for an internal reason.
    #[error("internal: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct MissingNodesBody {
    success: bool,
    error: &'static str,
    missing: Vec<String>,
}

impl ApiError {
    /// The planned (not-an-error) `missing_nodes` response body, returned
    /// with `200 OK` per spec.md §4.8 step 4.
    pub fn missing_nodes_response(missing: &[BlobKey]) -> Response {
        Json(MissingNodesBody {
            success: false,
            error: "missing_nodes",
            missing: missing.iter().map(BlobKey::to_string).collect(),
        })
        .into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Self::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Self::Gone => (StatusCode::GONE, "gone"),
            Self::Malformed(_) => (StatusCode::BAD_REQUEST, "malformed_request"),
            Self::QuotaExceeded { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "quota_exceeded"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }
        let body = match &self {
            Self::QuotaExceeded { remaining } => {
                json!({ "success": false, "error": code, "remaining": remaining })
            }
            _ => json!({ "success": false, "error": code, "details": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<awp_cas::CasError> for ApiError {
    fn from(e: awp_cas::CasError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<awp_ledger::LedgerError> for ApiError {
    fn from(e: awp_ledger::LedgerError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<awp_usage::UsageError> for ApiError {
    fn from(e: awp_usage::UsageError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<awp_store::StoreError> for ApiError {
    fn from(e: awp_store::StoreError) -> Self {
        match e {
            awp_store::StoreError::NotFound => Self::NotFound("store record"),
            awp_store::StoreError::NameTaken(_) => Self::Conflict("depot name already exists"),
            awp_store::StoreError::MainDepotProtected => Self::Forbidden("main depot cannot be deleted"),
            awp_store::StoreError::VersionConflict { .. } => Self::Conflict("depot version conflict"),
            awp_store::StoreError::UnknownVersion(_) => Self::NotFound("history version"),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<awp_auth::AuthError> for ApiError {
    fn from(e: awp_auth::AuthError) -> Self {
        match e {
            awp_auth::AuthError::MissingCredential
            | awp_auth::AuthError::UnknownPubkey
            | awp_auth::AuthError::SignatureInvalid
            | awp_auth::AuthError::TimestampSkew
            | awp_auth::AuthError::JwtInvalid
            | awp_auth::AuthError::TokenNotFound
            | awp_auth::AuthError::MalformedHeader(_) => Self::Unauthenticated,
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<awp_node::MalformedError> for ApiError {
    fn from(e: awp_node::MalformedError) -> Self {
        Self::Malformed(e.to_string())
    }
}
