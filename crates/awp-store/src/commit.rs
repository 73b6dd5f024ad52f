// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Immutable root-pinning records.

use std::collections::HashMap;
use std::sync::RwLock;

use awp_cas::{BlobKey, Realm};

use crate::StoreError;

/// A `(realm, root)` commit record. A commit holds exactly one ref-counter
/// edge for `root`, managed by the caller alongside this store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    /// Optional human-assigned title.
    pub title: Option<String>,
    /// Unix-seconds timestamp of creation.
    pub created_at: u64,
    /// Identity (user or agent token id) that created the commit.
    pub created_by: String,
}

/// Stores commit metadata, keyed by `(realm, root)`.
pub trait CommitStore: Send + Sync {
    /// Record a commit. A second `create` for the same `(realm, root)`
    /// overwrites the prior metadata — each call corresponds to a new
    /// ref-counter edge taken by the caller, but this store tracks only the
    /// latest metadata for that root, matching spec.md's `(realm, rootKey)`
    /// keying.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the backing lock was poisoned.
    fn create(
        &self,
        realm: &Realm,
        root: BlobKey,
        creator: &str,
        title: Option<String>,
        now: u64,
    ) -> Result<CommitRecord, StoreError>;

    /// Fetch a commit record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the backing lock was poisoned.
    fn get(&self, realm: &Realm, root: &BlobKey) -> Result<Option<CommitRecord>, StoreError>;

    /// List commits in a realm, newest-first, paged by an opaque cursor.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the backing lock was poisoned, or
    /// [`StoreError::UnknownVersion`]-free `MalformedCursor`-style failures
    /// surface as [`StoreError::NotFound`] for an unrecognised cursor.
    fn list(
        &self,
        realm: &Realm,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<(Vec<(BlobKey, CommitRecord)>, Option<String>), StoreError>;

    /// Update only the title; no ref-count changes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no commit exists at `(realm,
    /// root)`, or [`StoreError::Poisoned`] if the backing lock was poisoned.
    fn update_title(
        &self,
        realm: &Realm,
        root: &BlobKey,
        title: Option<String>,
    ) -> Result<CommitRecord, StoreError>;

    /// Remove a commit record. The caller is responsible for decrementing
    /// `root`'s ref count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no commit exists at `(realm,
    /// root)`, or [`StoreError::Poisoned`] if the backing lock was poisoned.
    fn delete(&self, realm: &Realm, root: &BlobKey) -> Result<(), StoreError>;
}

#[derive(Default)]
struct State {
    by_key: HashMap<(Realm, BlobKey), CommitRecord>,
    order: Vec<(Realm, u64, BlobKey)>,
    next_seq: u64,
}

/// In-memory [`CommitStore`]; the reference implementation used by tests and
/// by `awpd` when no persistent backend is configured.
#[derive(Default)]
pub struct MemoryCommitStore {
    state: RwLock<State>,
}

impl MemoryCommitStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CommitStore for MemoryCommitStore {
    fn create(
        &self,
        realm: &Realm,
        root: BlobKey,
        creator: &str,
        title: Option<String>,
        now: u64,
    ) -> Result<CommitRecord, StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;
        let record = CommitRecord {
            title,
            created_at: now,
            created_by: creator.to_owned(),
        };
        let seq = state.next_seq;
        state.next_seq += 1;
        state.order.push((realm.clone(), seq, root));
        state
            .by_key
            .insert((realm.clone(), root), record.clone());
        Ok(record)
    }

    fn get(&self, realm: &Realm, root: &BlobKey) -> Result<Option<CommitRecord>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.by_key.get(&(realm.clone(), *root)).cloned())
    }

    fn list(
        &self,
        realm: &Realm,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<(Vec<(BlobKey, CommitRecord)>, Option<String>), StoreError> {
        let start_seq = match cursor {
            None => None,
            Some(c) => Some(c.parse::<u64>().map_err(|_| StoreError::NotFound)?),
        };
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        let mut matches: Vec<(u64, BlobKey)> = state
            .order
            .iter()
            .filter(|(r, seq, _)| r == realm && start_seq.is_none_or(|s| *seq < s))
            .map(|(_, seq, key)| (*seq, *key))
            .collect();
        matches.sort_by(|a, b| b.0.cmp(&a.0));

        let mut out = Vec::with_capacity(limit.min(matches.len()));
        for (seq, key) in matches.into_iter().take(limit) {
            if let Some(record) = state.by_key.get(&(realm.clone(), key)) {
                out.push((key, record.clone(), seq));
            }
        }
        let next_cursor = if out.len() == limit {
            out.last().map(|(_, _, seq)| seq.to_string())
        } else {
            None
        };
        Ok((out.into_iter().map(|(k, r, _)| (k, r)).collect(), next_cursor))
    }

    fn update_title(
        &self,
        realm: &Realm,
        root: &BlobKey,
        title: Option<String>,
    ) -> Result<CommitRecord, StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;
        let record = state
            .by_key
            .get_mut(&(realm.clone(), *root))
            .ok_or(StoreError::NotFound)?;
        record.title = title;
        Ok(record.clone())
    }

    fn delete(&self, realm: &Realm, root: &BlobKey) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;
        state
            .by_key
            .remove(&(realm.clone(), *root))
            .ok_or(StoreError::NotFound)?;
        state.order.retain(|(r, _, k)| !(r == realm && k == root));
        Ok(())
    }
}
