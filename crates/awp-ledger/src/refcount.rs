// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-realm, per-key live-edge counting that drives garbage collection.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;

use awp_cas::{BlobKey, Realm};

use crate::LedgerError;

/// Whether a ref-count entry is still reachable (`Active`) or has dropped to
/// zero incoming edges within its realm and is waiting out its protection
/// window (`Pending`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcState {
    /// `count > 0`.
    Active,
    /// `count == 0`; eligible for collection once `firstSeenAt` ages past the
    /// protection window.
    Pending,
}

/// A `(realm, key)` liveness record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefCountEntry {
    /// Number of direct incoming edges within this realm.
    pub count: u64,
    /// Encoded node size.
    pub physical_size: u64,
    /// User-payload size; nonzero only for chunks/inline-files.
    pub logical_size: u64,
    /// Current collection eligibility.
    pub gc_state: GcState,
    /// Unix-seconds timestamp of record creation. Never changes.
    pub first_seen_at: u64,
}

/// Result of [`RefCounter::increment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncrementOutcome {
    /// The count after incrementing.
    pub count: u64,
    /// Whether the count was `0` (or the record did not yet exist)
    /// immediately before this call.
    pub was_zero_before: bool,
}

/// Result of [`RefCounter::decrement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecrementOutcome {
    /// The count after decrementing; `0` if the record was absent.
    pub count: u64,
    /// Whether this call caused the count to transition to `0`.
    pub became_zero: bool,
}

/// Live-edge counter for `(realm, key)` pairs. `increment`/`decrement` on
/// the same pair must be linearisable with respect to concurrent callers;
/// operations on different pairs need not serialise with each other (see
/// spec §5 and the deferred-removal pattern used by journaled ref-counted
/// databases — a count dropping to zero does not erase anything here, it
/// only starts the pending clock).
pub trait RefCounter: Send + Sync {
    /// Create the record at `count = 1` if absent, otherwise add `1` and set
    /// `gc_state = Active`. `first_seen_at` is stamped only on creation.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Poisoned`] if the backing lock was poisoned.
    fn increment(
        &self,
        realm: &Realm,
        key: BlobKey,
        physical_size: u64,
        logical_size: u64,
        now: u64,
    ) -> Result<IncrementOutcome, LedgerError>;

    /// Subtract `1`. A no-op (returns `count: 0, became_zero: false`) if the
    /// record is absent or already at `0`. Setting `gc_state = Pending`
    /// happens only on the transition to `0`, never re-applied on repeated
    /// decrements of an already-pending record.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Poisoned`] if the backing lock was poisoned.
    fn decrement(&self, realm: &Realm, key: &BlobKey) -> Result<DecrementOutcome, LedgerError>;

    /// Read the current entry, if any.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Poisoned`] if the backing lock was poisoned.
    fn get(&self, realm: &Realm, key: &BlobKey) -> Result<Option<RefCountEntry>, LedgerError>;

    /// Remove the record entirely. Called only by the garbage collector
    /// after it has erased the entry's ledger row.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Poisoned`] if the backing lock was poisoned.
    fn delete(&self, realm: &Realm, key: &BlobKey) -> Result<(), LedgerError>;

    /// Page through pending entries with `first_seen_at < before_time`,
    /// ordered by `first_seen_at` ascending.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Poisoned`] if the backing lock was poisoned, or
    /// [`LedgerError::MalformedCursor`] if `cursor` was not produced by a
    /// prior call against this store.
    fn list_pending(
        &self,
        before_time: u64,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<(Vec<(Realm, BlobKey, RefCountEntry)>, Option<String>), LedgerError>;

    /// Number of realms in which `count > 0` for `key`; `0` means the blob
    /// may be safely erased from the store.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Poisoned`] if the backing lock was poisoned.
    fn count_global(&self, key: &BlobKey) -> Result<u64, LedgerError>;
}

#[derive(Default)]
struct State {
    entries: HashMap<(Realm, BlobKey), RefCountEntry>,
    /// Realms currently holding `count > 0` for a given key, used to answer
    /// `count_global` without a full scan.
    active_realms: HashMap<BlobKey, HashSet<Realm>>,
    /// Pending entries ordered by `(first_seen_at, realm, key)`.
    pending_order: BTreeMap<(u64, Realm, BlobKey), ()>,
}

impl State {
    fn mark_active(&mut self, key: BlobKey, realm: &Realm) {
        self.active_realms
            .entry(key)
            .or_default()
            .insert(realm.clone());
    }

    fn mark_inactive(&mut self, key: BlobKey, realm: &Realm) {
        if let Some(set) = self.active_realms.get_mut(&key) {
            set.remove(realm);
            if set.is_empty() {
                self.active_realms.remove(&key);
            }
        }
    }
}

/// In-memory [`RefCounter`]; the reference implementation used by tests and
/// by `awpd` when no persistent backend is configured.
#[derive(Default)]
pub struct MemoryRefCounter {
    state: RwLock<State>,
}

impl MemoryRefCounter {
    /// Create an empty counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RefCounter for MemoryRefCounter {
    fn increment(
        &self,
        realm: &Realm,
        key: BlobKey,
        physical_size: u64,
        logical_size: u64,
        now: u64,
    ) -> Result<IncrementOutcome, LedgerError> {
        let mut state = self.state.write().map_err(|_| LedgerError::Poisoned)?;
        let map_key = (realm.clone(), key);
        match state.entries.get(&map_key).cloned() {
            None => {
                state.entries.insert(
                    map_key,
                    RefCountEntry {
                        count: 1,
                        physical_size,
                        logical_size,
                        gc_state: GcState::Active,
                        first_seen_at: now,
                    },
                );
                state.mark_active(key, realm);
                Ok(IncrementOutcome {
                    count: 1,
                    was_zero_before: true,
                })
            }
            Some(existing) => {
                let was_zero_before = existing.count == 0;
                if was_zero_before {
                    state
                        .pending_order
                        .remove(&(existing.first_seen_at, realm.clone(), key));
                }
                let updated = RefCountEntry {
                    count: existing.count + 1,
                    gc_state: GcState::Active,
                    ..existing
                };
                let count = updated.count;
                state.entries.insert(map_key, updated);
                if was_zero_before {
                    state.mark_active(key, realm);
                }
                Ok(IncrementOutcome {
                    count,
                    was_zero_before,
                })
            }
        }
    }

    fn decrement(&self, realm: &Realm, key: &BlobKey) -> Result<DecrementOutcome, LedgerError> {
        let mut state = self.state.write().map_err(|_| LedgerError::Poisoned)?;
        let map_key = (realm.clone(), *key);
        let Some(existing) = state.entries.get(&map_key).cloned() else {
            return Ok(DecrementOutcome {
                count: 0,
                became_zero: false,
            });
        };
        if existing.count == 0 {
            return Ok(DecrementOutcome {
                count: 0,
                became_zero: false,
            });
        }
        let new_count = existing.count - 1;
        let became_zero = new_count == 0;
        let updated = RefCountEntry {
            count: new_count,
            gc_state: if became_zero {
                GcState::Pending
            } else {
                existing.gc_state
            },
            ..existing.clone()
        };
        state.entries.insert(map_key, updated);
        if became_zero {
            state.mark_inactive(*key, realm);
            state
                .pending_order
                .insert((existing.first_seen_at, realm.clone(), *key), ());
        }
        Ok(DecrementOutcome {
            count: new_count,
            became_zero,
        })
    }

    fn get(&self, realm: &Realm, key: &BlobKey) -> Result<Option<RefCountEntry>, LedgerError> {
        let state = self.state.read().map_err(|_| LedgerError::Poisoned)?;
        Ok(state.entries.get(&(realm.clone(), *key)).cloned())
    }

    fn delete(&self, realm: &Realm, key: &BlobKey) -> Result<(), LedgerError> {
        let mut state = self.state.write().map_err(|_| LedgerError::Poisoned)?;
        if let Some(entry) = state.entries.remove(&(realm.clone(), *key)) {
            state
                .pending_order
                .remove(&(entry.first_seen_at, realm.clone(), *key));
            state.mark_inactive(*key, realm);
        }
        Ok(())
    }

    fn list_pending(
        &self,
        before_time: u64,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<(Vec<(Realm, BlobKey, RefCountEntry)>, Option<String>), LedgerError> {
        let after = match cursor {
            None => None,
            Some(c) => Some(decode_pending_cursor(c)?),
        };
        let state = self.state.read().map_err(|_| LedgerError::Poisoned)?;
        let mut out = Vec::new();
        for ((first_seen_at, realm, key), ()) in &state.pending_order {
            if *first_seen_at >= before_time {
                break;
            }
            if let Some((a_ts, ref a_realm, a_key)) = after {
                if (*first_seen_at, realm.clone(), *key) <= (a_ts, a_realm.clone(), a_key) {
                    continue;
                }
            }
            if let Some(entry) = state.entries.get(&(realm.clone(), *key)) {
                out.push((realm.clone(), *key, entry.clone()));
            }
            if out.len() == limit {
                break;
            }
        }
        let next_cursor = if out.len() == limit {
            out.last()
                .map(|(realm, key, entry)| encode_pending_cursor(entry.first_seen_at, realm, key))
        } else {
            None
        };
        Ok((out, next_cursor))
    }

    fn count_global(&self, key: &BlobKey) -> Result<u64, LedgerError> {
        let state = self.state.read().map_err(|_| LedgerError::Poisoned)?;
        Ok(state
            .active_realms
            .get(key)
            .map_or(0, |realms| realms.len() as u64))
    }
}

fn encode_pending_cursor(ts: u64, realm: &Realm, key: &BlobKey) -> String {
    format!("{ts}:{realm}:{key}")
}

fn decode_pending_cursor(cursor: &str) -> Result<(u64, Realm, BlobKey), LedgerError> {
    let mut parts = cursor.splitn(3, ':');
    let ts = parts
        .next()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| LedgerError::MalformedCursor(cursor.to_owned()))?;
    let realm_str = parts
        .next()
        .ok_or_else(|| LedgerError::MalformedCursor(cursor.to_owned()))?;
    let key_str = parts
        .next()
        .ok_or_else(|| LedgerError::MalformedCursor(cursor.to_owned()))?;
    let key = BlobKey::parse(key_str).map_err(|_| LedgerError::MalformedCursor(cursor.to_owned()))?;
    Ok((ts, Realm::new(realm_str), key))
}
