// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Request-level credential resolution and realm-scoping.

use awp_auth::{AuthContext, ResolveRequest, SignedHeaders};
use awp_cas::Realm;
use axum::http::HeaderMap;
use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::state::{now_unix, AppState};

/// Parse a JSON body after it has already been used to compute the signed
/// request's canonical digest — handlers that both sign-verify and decode a
/// body must read the raw bytes once and pass them through here rather than
/// using axum's `Json` extractor, which would consume the body first.
pub fn parse_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(bytes).map_err(|e| ApiError::Malformed(e.to_string()))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Resolve the credential on an inbound request to an [`AuthContext`],
/// probing signed headers, then bearer JWT, then opaque token, per
/// spec.md §4.7.
pub async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
    method: &str,
    path_and_query: &str,
    body: &[u8],
) -> Result<AuthContext, ApiError> {
    let pubkey = header_str(headers, "x-awp-pubkey");
    let timestamp = header_str(headers, "x-awp-timestamp").and_then(|v| v.parse::<u64>().ok());
    let signature = header_str(headers, "x-awp-signature");
    let signed = match (pubkey, timestamp, signature) {
        (Some(pubkey), Some(timestamp), Some(signature)) => {
            Some(SignedHeaders { pubkey, timestamp, signature })
        }
        _ => None,
    };
    let bearer = header_str(headers, "authorization").and_then(|v| v.strip_prefix("Bearer "));

    let req = ResolveRequest { signed, bearer, method, path_and_query, body };
    Ok(state.resolver.resolve(req, now_unix()).await?)
}

/// Resolve a ticket-only credential (the ticket id supplied as a path
/// segment rather than a header), per spec.md §4.7's "ticket-only path".
pub async fn authenticate_ticket(state: &AppState, ticket_id: &str) -> Result<AuthContext, ApiError> {
    let req = ResolveRequest {
        signed: None,
        bearer: Some(ticket_id),
        method: "",
        path_and_query: "",
        body: b"",
    };
    Ok(state.resolver.resolve(req, now_unix()).await?)
}

/// Enforce spec.md §4.7's realm-scoping rule: a path segment naming realm
/// `R` is permitted iff `R == auth.realm`, with `@me`/`~` as aliases for
/// `auth.realm` itself.
pub fn scoped_realm(ctx: &AuthContext, requested: &str) -> Result<Realm, ApiError> {
    if requested == "@me" || requested == "~" {
        return Ok(ctx.realm.clone());
    }
    let requested = Realm::new(requested.to_owned());
    if requested == ctx.realm {
        Ok(requested)
    } else {
        Err(ApiError::Forbidden("realm does not match credential"))
    }
}
