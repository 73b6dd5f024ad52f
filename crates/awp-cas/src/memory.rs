// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory content-addressed blob store.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::{blob_key, BlobKey, BlobStore, CasError};

/// In-memory [`BlobStore`]. The reference implementation used by tests and
/// by `awpd` when no persistent backend is configured.
#[derive(Default)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<BlobKey, Arc<[u8]>>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.read().map_or(0, |b| b.len())
    }

    /// Returns `true` if no blobs are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlobStore for MemoryStore {
    fn put(&self, bytes: &[u8]) -> Result<BlobKey, CasError> {
        let key = blob_key(bytes);
        let mut blobs = self
            .blobs
            .write()
            .map_err(|_| CasError::Io("poisoned lock".into()))?;
        blobs.entry(key).or_insert_with(|| Arc::from(bytes));
        Ok(key)
    }

    fn put_verified(&self, expected: BlobKey, bytes: &[u8]) -> Result<(), CasError> {
        let computed = blob_key(bytes);
        if computed != expected {
            return Err(CasError::HashMismatch { expected, computed });
        }
        let mut blobs = self
            .blobs
            .write()
            .map_err(|_| CasError::Io("poisoned lock".into()))?;
        blobs.entry(computed).or_insert_with(|| Arc::from(bytes));
        Ok(())
    }

    fn get(&self, key: &BlobKey) -> Result<Option<Arc<[u8]>>, CasError> {
        let blobs = self
            .blobs
            .read()
            .map_err(|_| CasError::Io("poisoned lock".into()))?;
        Ok(blobs.get(key).cloned())
    }

    fn has(&self, key: &BlobKey) -> Result<bool, CasError> {
        let blobs = self
            .blobs
            .read()
            .map_err(|_| CasError::Io("poisoned lock".into()))?;
        Ok(blobs.contains_key(key))
    }

    fn erase(&self, key: &BlobKey) -> Result<(), CasError> {
        let mut blobs = self
            .blobs
            .write()
            .map_err(|_| CasError::Io("poisoned lock".into()))?;
        blobs.remove(key);
        Ok(())
    }
}
