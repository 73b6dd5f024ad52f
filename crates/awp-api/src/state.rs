// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared application state threaded into every handler via `axum::State`.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use awp_auth::{AuthResolver, AuthorizedPubkeyStore, PendingAuthStore, TokenStore};
use awp_cas::BlobStore;
use awp_ledger::{OwnershipLedger, RefCounter};
use awp_node::NodeLimits;
use awp_store::{CommitStore, DepotStore};
use awp_usage::UsageMeter;

use crate::identity::IdentityProvider;

/// Default ceiling on a single node's encoded byte size (spec.md §6).
pub const DEFAULT_MAX_NODE_BYTES: u64 = 4 * 1024 * 1024;

/// Server-wide tunables sourced from `bins/awpd`'s `Config`.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// `NodeLimits` applied to every decode/validate call.
    pub node: NodeLimits,
    /// Hard ceiling on a single node's encoded byte size.
    pub max_node_bytes: u64,
    /// Hard ceiling on a ticket's requested TTL, regardless of caller input.
    pub max_ticket_ttl_secs: u64,
    /// Hard ceiling on an agent token's requested TTL.
    pub max_agent_token_ttl_secs: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            node: NodeLimits::default(),
            max_node_bytes: DEFAULT_MAX_NODE_BYTES,
            max_ticket_ttl_secs: 24 * 3600,
            max_agent_token_ttl_secs: 30 * 24 * 3600,
        }
    }
}

/// Every component `awp-api` wires into HTTP handlers. Cheaply `Clone`
/// (every field is an `Arc`), matching axum's `State` extractor contract.
#[derive(Clone)]
pub struct AppState {
    /// Content-addressed blob storage.
    pub blobs: Arc<dyn BlobStore>,
    /// Per-realm ownership table.
    pub ownership: Arc<dyn OwnershipLedger>,
    /// Per-realm, per-key live-edge counter.
    pub refs: Arc<dyn RefCounter>,
    /// Per-realm storage usage and quota.
    pub usage: Arc<dyn UsageMeter>,
    /// Immutable commit metadata.
    pub commits: Arc<dyn CommitStore>,
    /// Named, versioned depot pointers.
    pub depots: Arc<dyn DepotStore>,
    /// User/agent/ticket token records.
    pub tokens: Arc<dyn TokenStore>,
    /// Signed-client enrolment-in-progress records.
    pub pending_auth: Arc<dyn PendingAuthStore>,
    /// Enrolled pubkey-to-user bindings.
    pub pubkeys: Arc<dyn AuthorizedPubkeyStore>,
    /// Credential-to-`AuthContext` resolver.
    pub resolver: Arc<AuthResolver>,
    /// The configured (possibly dev-mode) OAuth/IdP backend.
    pub identity: Arc<dyn IdentityProvider>,
    /// Server-wide size/TTL limits.
    pub limits: Limits,
}

/// Unix-seconds wall-clock time, used everywhere a handler needs `now`.
#[must_use]
pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}
