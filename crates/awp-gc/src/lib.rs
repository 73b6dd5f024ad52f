// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Reference-counted garbage collection.
//!
//! One [`GarbageCollector::run`] call walks pending ref-count entries older
//! than the protection window, cascades a decrement to each entry's
//! children (which may themselves become newly-pending, to be swept on a
//! later run — the "bounded cascade latency" tradeoff spec.md §4.11
//! describes), and erases a blob once no realm holds a live reference to
//! it. Every step here mirrors the deferred-removal discipline used by
//! journaled ref-counted key-value stores (mark-then-sweep-later rather
//! than eagerly deleting on the decrement that hits zero).
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

use std::sync::Arc;

use awp_cas::BlobStore;
use awp_ledger::{OwnershipLedger, RefCounter};
use awp_node::NodeLimits;
use awp_usage::UsageMeter;
use tracing::{info, warn};

/// Tunables for a single [`GarbageCollector::run`] call.
#[derive(Debug, Clone, Copy)]
pub struct GcConfig {
    /// Entries younger than this (relative to `now`) are never collected,
    /// even if `gc_state == Pending`.
    pub protection_window_secs: u64,
    /// Entries fetched per `listPending` page.
    pub batch_size: usize,
    /// Maximum number of pages processed in one run.
    pub max_batches: usize,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            protection_window_secs: 72 * 3600,
            batch_size: 256,
            max_batches: 64,
        }
    }
}

/// Outcome of one [`GarbageCollector::run`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcReport {
    /// Pending entries visited this run.
    pub entries_processed: u64,
    /// Blobs actually erased (global refcount reached zero).
    pub blobs_erased: u64,
    /// Per-entry failures (logged, not fatal to the run).
    pub errors: u64,
}

/// Walks and reclaims pending ref-count entries across all realms.
///
/// Holds `Arc<dyn Trait>` dependencies rather than plain references so it
/// can be moved into the `tokio::time::interval` loop `bins/awpd` spawns
/// without borrowing the whole server state for the process lifetime.
pub struct GarbageCollector {
    blob_store: Arc<dyn BlobStore>,
    ownership: Arc<dyn OwnershipLedger>,
    ref_counter: Arc<dyn RefCounter>,
    usage: Arc<dyn UsageMeter>,
}

impl GarbageCollector {
    /// Wire a collector against the storage components it sweeps.
    pub fn new(
        blob_store: Arc<dyn BlobStore>,
        ownership: Arc<dyn OwnershipLedger>,
        ref_counter: Arc<dyn RefCounter>,
        usage: Arc<dyn UsageMeter>,
    ) -> Self {
        Self {
            blob_store,
            ownership,
            ref_counter,
            usage,
        }
    }

    /// Run one collection pass. Never returns an error: per-entry failures
    /// are logged and tallied in the returned [`GcReport`], and the run
    /// continues — a partial run is safe because every step here is
    /// individually idempotent or monotone.
    pub fn run(&self, now: u64, config: &GcConfig) -> GcReport {
        let threshold = now.saturating_sub(config.protection_window_secs);
        let mut report = GcReport::default();
        let mut cursor: Option<String> = None;

        for _ in 0..config.max_batches {
            let (entries, next_cursor) =
                match self.ref_counter.list_pending(threshold, config.batch_size, cursor.as_deref())
                {
                    Ok(page) => page,
                    Err(e) => {
                        warn!(error = %e, "gc: list_pending failed, aborting run");
                        report.errors += 1;
                        break;
                    }
                };
            if entries.is_empty() {
                break;
            }
            for (realm, key, entry) in &entries {
                report.entries_processed += 1;
                if let Err(e) = self.collect_one(realm, *key, entry.physical_size, entry.logical_size, now)
                {
                    warn!(realm = %realm, key = %key, error = %e, "gc: failed to collect entry");
                    report.errors += 1;
                    continue;
                }
                match self.ref_counter.count_global(key) {
                    Ok(0) => {
                        if let Err(e) = self.blob_store.erase(key) {
                            warn!(key = %key, error = %e, "gc: failed to erase blob");
                            report.errors += 1;
                        } else {
                            report.blobs_erased += 1;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(key = %key, error = %e, "gc: count_global failed");
                        report.errors += 1;
                    }
                }
            }
            if next_cursor.is_none() {
                break;
            }
            cursor = next_cursor;
        }

        info!(
            entries_processed = report.entries_processed,
            blobs_erased = report.blobs_erased,
            errors = report.errors,
            "gc: run complete"
        );
        report
    }

    fn collect_one(
        &self,
        realm: &awp_cas::Realm,
        key: awp_cas::BlobKey,
        physical_size: u64,
        logical_size: u64,
        now: u64,
    ) -> Result<(), GcStepError> {
        let children = match self.blob_store.get(&key) {
            Ok(Some(bytes)) => match awp_node::decode(&bytes, &NodeLimits::default()) {
                Ok(node) => node.children(),
                Err(e) => {
                    warn!(key = %key, error = %e, "gc: blob failed to decode, treating as childless");
                    Vec::new()
                }
            },
            Ok(None) => {
                warn!(key = %key, "gc: blob already absent, treating as childless");
                Vec::new()
            }
            Err(e) => return Err(GcStepError::Blob(e.to_string())),
        };

        for child in children {
            if let Err(e) = self.ref_counter.decrement(realm, &child) {
                return Err(GcStepError::Ledger(e.to_string()));
            }
        }

        self.usage
            .apply(
                realm,
                -i64::try_from(physical_size).unwrap_or(i64::MAX),
                -i64::try_from(logical_size).unwrap_or(i64::MAX),
                -1,
                now,
            )
            .map_err(|e| GcStepError::Usage(e.to_string()))?;

        self.ownership
            .remove(realm, &key)
            .map_err(|e| GcStepError::Ledger(e.to_string()))?;
        self.ref_counter
            .delete(realm, &key)
            .map_err(|e| GcStepError::Ledger(e.to_string()))?;

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
enum GcStepError {
    #[error("blob store: {0}")]
    Blob(String),
    #[error("ledger: {0}")]
    Ledger(String),
    #[error("usage meter: {0}")]
    Usage(String),
}
