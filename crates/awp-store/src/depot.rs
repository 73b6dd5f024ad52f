// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Named, versioned, mutable root pointers with append-only history.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use awp_cas::{BlobKey, BlobStore, Realm};
use awp_ledger::RefCounter;
use awp_node::{encode, Node};

use crate::StoreError;

/// Name reserved for the depot every realm gets on first use; it cannot be
/// deleted.
pub const MAIN_DEPOT_NAME: &str = "main";

/// One entry of a depot's append-only root history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// The root that was current as of this version.
    pub root: BlobKey,
    /// Unix-seconds timestamp this version was recorded.
    pub created_at: u64,
    /// Optional commit message supplied with the update.
    pub message: Option<String>,
}

/// A depot: a named, versioned pointer to a root node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepotRecord {
    /// The depot's name, unique within its realm. Also its identifier —
    /// routes address depots as `/depots/{name}`.
    pub name: String,
    /// The currently-pinned root.
    pub root: BlobKey,
    /// Monotonically increasing version number, starting at `1`.
    pub version: u64,
    /// Unix-seconds timestamp of creation.
    pub created_at: u64,
    /// Unix-seconds timestamp of the most recent root update.
    pub updated_at: u64,
    /// Optional human description.
    pub description: Option<String>,
}

fn empty_collection() -> &'static (Vec<u8>, BlobKey) {
    static CELL: OnceLock<(Vec<u8>, BlobKey)> = OnceLock::new();
    CELL.get_or_init(|| {
        let bytes = encode(&Node::Collection {
            entries: Vec::new(),
            declared_size: 0,
        });
        let key = awp_cas::blob_key(&bytes);
        (bytes, key)
    })
}

/// The well-known key of the canonical empty collection every depot starts
/// pointing at. Computed once, the same bytes in every realm.
#[must_use]
pub fn empty_collection_key() -> BlobKey {
    empty_collection().1
}

/// Stores depot metadata and version history, keyed by `(realm, name)`.
///
/// This trait does not itself call [`RefCounter`] for root swaps
/// (`update_root`, `delete`) — that five-step transaction is orchestrated by
/// the caller, which must increment the new root, call this store, then
/// decrement the old root, in that order (see the module doc comment).
/// [`DepotStore::create`] is the one exception: the initial empty-collection
/// root is a workspace-wide constant, so bootstrapping it here keeps that
/// special case out of every caller.
pub trait DepotStore: Send + Sync {
    /// Create a depot named `name`, pointed at the well-known empty
    /// collection, version `1`. Puts the empty collection into `blob_store`
    /// and takes its first ref-count edge via `ref_counter` if this is the
    /// first depot in `realm` to need it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NameTaken`] if `name` already exists in
    /// `realm`, [`StoreError::Dependency`] if the blob store or ref counter
    /// call fails, or [`StoreError::Poisoned`] if the backing lock was
    /// poisoned.
    fn create(
        &self,
        realm: &Realm,
        name: &str,
        description: Option<String>,
        blob_store: &dyn BlobStore,
        ref_counter: &dyn RefCounter,
        now: u64,
    ) -> Result<DepotRecord, StoreError>;

    /// Fetch a depot record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the backing lock was poisoned.
    fn get(&self, realm: &Realm, name: &str) -> Result<Option<DepotRecord>, StoreError>;

    /// List all depots in a realm.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the backing lock was poisoned.
    fn list(&self, realm: &Realm) -> Result<Vec<DepotRecord>, StoreError>;

    /// Full version history, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the depot does not exist, or
    /// [`StoreError::Poisoned`] if the backing lock was poisoned.
    fn history(
        &self,
        realm: &Realm,
        name: &str,
    ) -> Result<Vec<(u64, HistoryEntry)>, StoreError>;

    /// Atomically swap the current root, bump the version, and append a
    /// history entry — conditional on `expected_version` still being
    /// current (optimistic concurrency; spec.md §4.10).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the depot does not exist,
    /// [`StoreError::VersionConflict`] if `expected_version` is stale, or
    /// [`StoreError::Poisoned`] if the backing lock was poisoned.
    fn update_root(
        &self,
        realm: &Realm,
        name: &str,
        expected_version: u64,
        new_root: BlobKey,
        message: Option<String>,
        now: u64,
    ) -> Result<DepotRecord, StoreError>;

    /// Resolve what `rollback(version)` should do without mutating
    /// anything: `Ok(None)` means the target root is already current (a
    /// no-op); `Ok(Some(root))` is the root the caller should pass to
    /// [`DepotStore::update_root`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the depot does not exist,
    /// [`StoreError::UnknownVersion`] if `version` has no history entry, or
    /// [`StoreError::Poisoned`] if the backing lock was poisoned.
    fn rollback_target(
        &self,
        realm: &Realm,
        name: &str,
        version: u64,
    ) -> Result<Option<BlobKey>, StoreError>;

    /// Remove a depot record, returning it so the caller can decrement its
    /// root's ref count. History is dropped with it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MainDepotProtected`] if `name` is `"main"`,
    /// [`StoreError::NotFound`] if the depot does not exist, or
    /// [`StoreError::Poisoned`] if the backing lock was poisoned.
    fn delete(&self, realm: &Realm, name: &str) -> Result<DepotRecord, StoreError>;
}

struct Entry {
    record: DepotRecord,
    history: Vec<HistoryEntry>,
}

#[derive(Default)]
struct State {
    depots: HashMap<(Realm, String), Entry>,
}

/// In-memory [`DepotStore`]; the reference implementation used by tests and
/// by `awpd` when no persistent backend is configured.
#[derive(Default)]
pub struct MemoryDepotStore {
    state: RwLock<State>,
}

impl MemoryDepotStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DepotStore for MemoryDepotStore {
    fn create(
        &self,
        realm: &Realm,
        name: &str,
        description: Option<String>,
        blob_store: &dyn BlobStore,
        ref_counter: &dyn RefCounter,
        now: u64,
    ) -> Result<DepotRecord, StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;
        let map_key = (realm.clone(), name.to_owned());
        if state.depots.contains_key(&map_key) {
            return Err(StoreError::NameTaken(name.to_owned()));
        }

        let (bytes, key) = empty_collection();
        blob_store
            .put_verified(*key, bytes)
            .map_err(|e| StoreError::Dependency(e.to_string()))?;
        ref_counter
            .increment(realm, *key, bytes.len() as u64, 0, now)
            .map_err(|e| StoreError::Dependency(e.to_string()))?;

        let record = DepotRecord {
            name: name.to_owned(),
            root: *key,
            version: 1,
            created_at: now,
            updated_at: now,
            description,
        };
        let history = vec![HistoryEntry {
            root: *key,
            created_at: now,
            message: None,
        }];
        state.depots.insert(map_key, Entry { record: record.clone(), history });
        Ok(record)
    }

    fn get(&self, realm: &Realm, name: &str) -> Result<Option<DepotRecord>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state
            .depots
            .get(&(realm.clone(), name.to_owned()))
            .map(|e| e.record.clone()))
    }

    fn list(&self, realm: &Realm) -> Result<Vec<DepotRecord>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state
            .depots
            .iter()
            .filter(|((r, _), _)| r == realm)
            .map(|(_, e)| e.record.clone())
            .collect())
    }

    fn history(
        &self,
        realm: &Realm,
        name: &str,
    ) -> Result<Vec<(u64, HistoryEntry)>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        let entry = state
            .depots
            .get(&(realm.clone(), name.to_owned()))
            .ok_or(StoreError::NotFound)?;
        Ok(entry
            .history
            .iter()
            .enumerate()
            .map(|(i, h)| (i as u64 + 1, h.clone()))
            .collect())
    }

    fn update_root(
        &self,
        realm: &Realm,
        name: &str,
        expected_version: u64,
        new_root: BlobKey,
        message: Option<String>,
        now: u64,
    ) -> Result<DepotRecord, StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;
        let entry = state
            .depots
            .get_mut(&(realm.clone(), name.to_owned()))
            .ok_or(StoreError::NotFound)?;
        if entry.record.version != expected_version {
            return Err(StoreError::VersionConflict {
                expected: expected_version,
                current: entry.record.version,
            });
        }
        entry.record.root = new_root;
        entry.record.version += 1;
        entry.record.updated_at = now;
        entry.history.push(HistoryEntry {
            root: new_root,
            created_at: now,
            message,
        });
        Ok(entry.record.clone())
    }

    fn rollback_target(
        &self,
        realm: &Realm,
        name: &str,
        version: u64,
    ) -> Result<Option<BlobKey>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        let entry = state
            .depots
            .get(&(realm.clone(), name.to_owned()))
            .ok_or(StoreError::NotFound)?;
        let target = entry
            .history
            .get(version.checked_sub(1).ok_or(StoreError::UnknownVersion(version))? as usize)
            .ok_or(StoreError::UnknownVersion(version))?;
        if target.root == entry.record.root {
            Ok(None)
        } else {
            Ok(Some(target.root))
        }
    }

    fn delete(&self, realm: &Realm, name: &str) -> Result<DepotRecord, StoreError> {
        if name == MAIN_DEPOT_NAME {
            return Err(StoreError::MainDepotProtected);
        }
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;
        state
            .depots
            .remove(&(realm.clone(), name.to_owned()))
            .map(|e| e.record)
            .ok_or(StoreError::NotFound)
    }
}
