// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The `(realm, key) -> metadata` ownership table.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use awp_cas::{BlobKey, Realm};
use awp_node::NodeKind;

use crate::LedgerError;

/// Metadata recorded the first time a key is put into a realm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipEntry {
    /// The node kind the key decodes to.
    pub kind: NodeKind,
    /// Declared content type of the stored bytes.
    pub content_type: String,
    /// Declared byte size at put time.
    pub byte_size: u64,
    /// Unix-seconds timestamp of the first put.
    pub created_at: u64,
    /// Identity (user or agent token id) that performed the first put.
    pub created_by: String,
}

/// Per-realm record of which keys a realm is allowed to read, and the
/// metadata recorded about each at first-put time.
///
/// Existence of an `(realm, key)` row means the realm may read the blob and
/// that the blob is rooted in the realm's lifetime graph (see
/// [`crate::RefCounter`] for the actual liveness accounting).
pub trait OwnershipLedger: Send + Sync {
    /// Record `key` as owned by `realm`, if not already recorded. Idempotent:
    /// a second `add` for the same `(realm, key)` leaves the first entry's
    /// metadata untouched.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Poisoned`] if the backing lock was poisoned.
    #[allow(clippy::too_many_arguments)]
    fn add(
        &self,
        realm: &Realm,
        key: BlobKey,
        kind: NodeKind,
        content_type: &str,
        byte_size: u64,
        created_by: &str,
        now: u64,
    ) -> Result<(), LedgerError>;

    /// Whether `realm` owns `key`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Poisoned`] if the backing lock was poisoned.
    fn has(&self, realm: &Realm, key: &BlobKey) -> Result<bool, LedgerError>;

    /// Partition `keys` into those `realm` already owns and those it does
    /// not, preserving input order within each partition. Used by the
    /// `resolve` RPC for dedup-aware upload planning.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Poisoned`] if the backing lock was poisoned.
    fn check(
        &self,
        realm: &Realm,
        keys: &[BlobKey],
    ) -> Result<(Vec<BlobKey>, Vec<BlobKey>), LedgerError>;

    /// Page through a realm's owned keys, newest-first.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Poisoned`] if the backing lock was poisoned, or
    /// [`LedgerError::MalformedCursor`] if `cursor` was not produced by a
    /// prior call against this store.
    fn list(
        &self,
        realm: &Realm,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<(Vec<(BlobKey, OwnershipEntry)>, Option<String>), LedgerError>;

    /// Remove the `(realm, key)` row. Called only by the garbage collector.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Poisoned`] if the backing lock was poisoned.
    fn remove(&self, realm: &Realm, key: &BlobKey) -> Result<(), LedgerError>;
}

#[derive(Default)]
struct State {
    by_key: HashMap<(Realm, BlobKey), OwnershipEntry>,
    /// Insertion order per realm, newest-last, keyed by a monotonic sequence
    /// number so two entries created in the same second still sort stably.
    order: BTreeMap<(Realm, u64), BlobKey>,
    next_seq: u64,
}

/// In-memory [`OwnershipLedger`]; the reference implementation used by tests
/// and by `awpd` when no persistent backend is configured.
#[derive(Default)]
pub struct MemoryOwnershipLedger {
    state: RwLock<State>,
}

impl MemoryOwnershipLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl OwnershipLedger for MemoryOwnershipLedger {
    fn add(
        &self,
        realm: &Realm,
        key: BlobKey,
        kind: NodeKind,
        content_type: &str,
        byte_size: u64,
        created_by: &str,
        now: u64,
    ) -> Result<(), LedgerError> {
        let mut state = self.state.write().map_err(|_| LedgerError::Poisoned)?;
        if state.by_key.contains_key(&(realm.clone(), key)) {
            return Ok(());
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.order.insert((realm.clone(), seq), key);
        state.by_key.insert(
            (realm.clone(), key),
            OwnershipEntry {
                kind,
                content_type: content_type.to_owned(),
                byte_size,
                created_at: now,
                created_by: created_by.to_owned(),
            },
        );
        Ok(())
    }

    fn has(&self, realm: &Realm, key: &BlobKey) -> Result<bool, LedgerError> {
        let state = self.state.read().map_err(|_| LedgerError::Poisoned)?;
        Ok(state.by_key.contains_key(&(realm.clone(), *key)))
    }

    fn check(
        &self,
        realm: &Realm,
        keys: &[BlobKey],
    ) -> Result<(Vec<BlobKey>, Vec<BlobKey>), LedgerError> {
        let state = self.state.read().map_err(|_| LedgerError::Poisoned)?;
        let mut present = Vec::new();
        let mut missing = Vec::new();
        for key in keys {
            if state.by_key.contains_key(&(realm.clone(), *key)) {
                present.push(*key);
            } else {
                missing.push(*key);
            }
        }
        Ok((present, missing))
    }

    fn list(
        &self,
        realm: &Realm,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<(Vec<(BlobKey, OwnershipEntry)>, Option<String>), LedgerError> {
        let start_seq = match cursor {
            None => None,
            Some(c) => Some(
                c.parse::<u64>()
                    .map_err(|_| LedgerError::MalformedCursor(c.to_owned()))?,
            ),
        };
        let state = self.state.read().map_err(|_| LedgerError::Poisoned)?;
        let mut matches: Vec<(u64, BlobKey)> = state
            .order
            .range((realm.clone(), 0)..(realm.clone(), u64::MAX))
            .filter(|((_, seq), _)| start_seq.is_none_or(|s| *seq < s))
            .map(|((_, seq), key)| (*seq, *key))
            .collect();
        matches.sort_by(|a, b| b.0.cmp(&a.0));

        let mut out = Vec::with_capacity(limit.min(matches.len()));
        for (seq, key) in matches.into_iter().take(limit) {
            if let Some(entry) = state.by_key.get(&(realm.clone(), key)) {
                out.push((key, entry.clone(), seq));
            }
        }
        let next_cursor = if out.len() == limit {
            out.last().map(|(_, _, seq)| seq.to_string())
        } else {
            None
        };
        let entries = out.into_iter().map(|(k, e, _)| (k, e)).collect();
        Ok((entries, next_cursor))
    }

    fn remove(&self, realm: &Realm, key: &BlobKey) -> Result<(), LedgerError> {
        let mut state = self.state.write().map_err(|_| LedgerError::Poisoned)?;
        if state.by_key.remove(&(realm.clone(), *key)).is_some() {
            let stale: Vec<(Realm, u64)> = state
                .order
                .iter()
                .filter(|(k, v)| k.0 == *realm && **v == *key)
                .map(|(k, _)| k.clone())
                .collect();
            for k in stale {
                state.order.remove(&k);
            }
        }
        Ok(())
    }
}
