// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-realm storage usage metering and quota enforcement.
//!
//! A [`UsageSummary`] changes only on the first-seen/last-gone transitions
//! the ref counter reports (duplicate puts within a realm must not
//! double-count) — callers compute the signed delta and call
//! [`UsageMeter::apply`] once per transition, in the style of
//! `echo-session-ws-gateway::GatewayMetrics`'s lock-guarded snapshot struct.
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

use std::collections::HashMap;
use std::sync::RwLock;

use awp_cas::Realm;

/// A realm's current storage footprint and quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UsageSummary {
    /// Total encoded-node bytes across all of the realm's live nodes.
    pub physical_bytes: u64,
    /// Total user-payload bytes (chunks/inline-files only).
    pub logical_bytes: u64,
    /// Number of live nodes owned by the realm.
    pub node_count: u64,
    /// Byte ceiling on `physical_bytes`; `0` means unlimited.
    pub quota_limit: u64,
    /// Unix-seconds timestamp of the last `apply`/`set_quota` call.
    pub updated_at: u64,
}

/// Errors raised by usage-metering operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsageError {
    /// A backing lock was poisoned by a panicking holder.
    #[error("usage meter lock poisoned")]
    Poisoned,
}

/// Tracks physical/logical byte usage and enforces per-realm quotas.
pub trait UsageMeter: Send + Sync {
    /// Current usage snapshot for a realm; zeroed defaults if never touched.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::Poisoned`] if the backing lock was poisoned.
    fn get(&self, realm: &Realm) -> Result<UsageSummary, UsageError>;

    /// Apply a signed delta to a realm's usage, creating the record at zero
    /// first if it did not already exist. Deltas saturate at `0`/`u64::MAX`
    /// rather than panicking on underflow/overflow, which an accounting bug
    /// upstream should surface as a wrong number, not a crashed request.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::Poisoned`] if the backing lock was poisoned.
    fn apply(
        &self,
        realm: &Realm,
        delta_physical: i64,
        delta_logical: i64,
        delta_nodes: i64,
        now: u64,
    ) -> Result<UsageSummary, UsageError>;

    /// Set (or clear, with `0`) a realm's physical-byte quota.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::Poisoned`] if the backing lock was poisoned.
    fn set_quota(&self, realm: &Realm, bytes: u64, now: u64) -> Result<(), UsageError>;

    /// Whether adding `would_add_bytes` of physical usage keeps the realm
    /// within its quota, alongside the current snapshot used to make that
    /// decision.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::Poisoned`] if the backing lock was poisoned.
    fn check_quota(
        &self,
        realm: &Realm,
        would_add_bytes: u64,
    ) -> Result<(bool, UsageSummary), UsageError>;
}

/// In-memory [`UsageMeter`]; the reference implementation used by tests and
/// by `awpd` when no persistent backend is configured.
#[derive(Default)]
pub struct MemoryUsageMeter {
    summaries: RwLock<HashMap<Realm, UsageSummary>>,
}

impl MemoryUsageMeter {
    /// Create a meter with no realms recorded yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl UsageMeter for MemoryUsageMeter {
    fn get(&self, realm: &Realm) -> Result<UsageSummary, UsageError> {
        let summaries = self.summaries.read().map_err(|_| UsageError::Poisoned)?;
        Ok(summaries.get(realm).copied().unwrap_or_default())
    }

    fn apply(
        &self,
        realm: &Realm,
        delta_physical: i64,
        delta_logical: i64,
        delta_nodes: i64,
        now: u64,
    ) -> Result<UsageSummary, UsageError> {
        let mut summaries = self.summaries.write().map_err(|_| UsageError::Poisoned)?;
        let entry = summaries.entry(realm.clone()).or_default();
        entry.physical_bytes = entry.physical_bytes.saturating_add_signed(delta_physical);
        entry.logical_bytes = entry.logical_bytes.saturating_add_signed(delta_logical);
        entry.node_count = entry.node_count.saturating_add_signed(delta_nodes);
        entry.updated_at = now;
        Ok(*entry)
    }

    fn set_quota(&self, realm: &Realm, bytes: u64, now: u64) -> Result<(), UsageError> {
        let mut summaries = self.summaries.write().map_err(|_| UsageError::Poisoned)?;
        let entry = summaries.entry(realm.clone()).or_default();
        entry.quota_limit = bytes;
        entry.updated_at = now;
        Ok(())
    }

    fn check_quota(
        &self,
        realm: &Realm,
        would_add_bytes: u64,
    ) -> Result<(bool, UsageSummary), UsageError> {
        let snapshot = self.get(realm)?;
        let allowed = snapshot.quota_limit == 0
            || snapshot.physical_bytes.saturating_add(would_add_bytes) <= snapshot.quota_limit;
        Ok((allowed, snapshot))
    }
}
