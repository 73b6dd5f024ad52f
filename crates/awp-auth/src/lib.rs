// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Credential storage and resolution for the AWP storage service.
//!
//! Three token kinds ([`UserToken`], [`AgentToken`], [`Ticket`]) live in a
//! [`TokenStore`]; the signed-client enrolment flow lives in
//! [`PendingAuthStore`]/[`AuthorizedPubkeyStore`]. [`AuthResolver`] turns an
//! inbound request's credential — signed headers, a bearer JWT, or an
//! opaque token — into an [`AuthContext`] describing what realm and rights
//! it carries.
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

mod pending;
mod resolver;
mod token;

pub use pending::{AuthorizedPubkey, AuthorizedPubkeyStore, MemoryAuthorizedPubkeyStore, MemoryPendingAuthStore, PendingAuth, PendingAuthStore};
pub use resolver::{AuthContext, AuthResolver, HttpJwksSource, JwksSource, ResolveRequest, SignedHeaders};
pub use token::{AgentToken, MemoryTokenStore, Ticket, TicketCommitConfig, Token, TokenStore, UserToken};

/// Errors raised while storing or resolving credentials.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// A backing lock was poisoned by a panicking holder.
    #[error("auth store lock poisoned")]
    Poisoned,
    /// No request credential was present at all.
    #[error("no credential presented")]
    MissingCredential,
    /// Signed-request headers named a pubkey with no enrolment on file.
    #[error("unknown pubkey")]
    UnknownPubkey,
    /// The P-256 signature did not verify against the canonical string.
    #[error("signature verification failed")]
    SignatureInvalid,
    /// `|now - timestamp|` exceeded the 300s freshness window.
    #[error("request timestamp outside freshness window")]
    TimestampSkew,
    /// The bearer token failed JWT signature, issuer, expiry, or use checks.
    #[error("invalid bearer token")]
    JwtInvalid,
    /// The opaque token id had no matching (non-expired) record.
    #[error("token not found")]
    TokenNotFound,
    /// A signed-request header was present but not parseable.
    #[error("malformed {0} header")]
    MalformedHeader(&'static str),
    /// Fetching or parsing the issuer's JWKS document failed.
    #[error("jwks fetch failed: {0}")]
    Jwks(String),
}
