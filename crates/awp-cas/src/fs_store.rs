// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Filesystem-backed [`BlobStore`], laid out as `cas/sha256/<xx>/<hex>`.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::{blob_key, BlobKey, BlobStore, CasError};

/// A [`BlobStore`] rooted at a directory on disk.
///
/// Writes go to a temp file in the same shard directory, then an atomic
/// rename into place, so a crash mid-write never leaves a partial blob
/// visible under its final name.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Open (creating if necessary) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`CasError::Io`] if `root` cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CasError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| CasError::Io(e.to_string()))?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &BlobKey) -> PathBuf {
        self.root
            .join("cas")
            .join("sha256")
            .join(key.shard_prefix())
            .join(key.to_string())
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), CasError> {
        let Some(dir) = path.parent() else {
            return Err(CasError::Io("blob path has no parent".into()));
        };
        fs::create_dir_all(dir).map_err(|e| CasError::Io(e.to_string()))?;
        if path.exists() {
            return Ok(());
        }
        let tmp_path = dir.join(format!(".tmp-{}", uniq_suffix()));
        {
            let mut tmp = fs::File::create(&tmp_path).map_err(|e| CasError::Io(e.to_string()))?;
            tmp.write_all(bytes)
                .map_err(|e| CasError::Io(e.to_string()))?;
            tmp.sync_all().map_err(|e| CasError::Io(e.to_string()))?;
        }
        fs::rename(&tmp_path, path).map_err(|e| CasError::Io(e.to_string()))?;
        Ok(())
    }
}

fn uniq_suffix() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    format!(
        "{}-{}",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

impl BlobStore for FsStore {
    fn put(&self, bytes: &[u8]) -> Result<BlobKey, CasError> {
        let key = blob_key(bytes);
        let path = self.path_for(&key);
        self.write_atomic(&path, bytes)?;
        Ok(key)
    }

    fn put_verified(&self, expected: BlobKey, bytes: &[u8]) -> Result<(), CasError> {
        let computed = blob_key(bytes);
        if computed != expected {
            return Err(CasError::HashMismatch { expected, computed });
        }
        let path = self.path_for(&computed);
        self.write_atomic(&path, bytes)
    }

    fn get(&self, key: &BlobKey) -> Result<Option<std::sync::Arc<[u8]>>, CasError> {
        let path = self.path_for(key);
        match fs::read(path) {
            Ok(bytes) => Ok(Some(std::sync::Arc::from(bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CasError::Io(e.to_string())),
        }
    }

    fn has(&self, key: &BlobKey) -> Result<bool, CasError> {
        Ok(self.path_for(key).exists())
    }

    fn erase(&self, key: &BlobKey) -> Result<(), CasError> {
        let path = self.path_for(key);
        match fs::remove_file(path) {
            Ok(()) | Err(_) => Ok(()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn put_get_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsStore::open(dir.path()).expect("open");
        let data = b"disk blob";
        let key = store.put(data).expect("put");
        let got = store.get(&key).expect("get").expect("present");
        assert_eq!(&*got, data);
    }

    #[test]
    fn layout_matches_sha256_shard_convention() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsStore::open(dir.path()).expect("open");
        let key = store.put(b"layout check").expect("put");
        let expected = dir
            .path()
            .join("cas")
            .join("sha256")
            .join(key.shard_prefix())
            .join(key.to_string());
        assert!(expected.exists());
    }

    #[test]
    fn erase_missing_is_not_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsStore::open(dir.path()).expect("open");
        let key = BlobKey::from_digest([0x11; 32]);
        store.erase(&key).expect("erase missing");
    }

    #[test]
    fn put_verified_mismatch_does_not_write() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsStore::open(dir.path()).expect("open");
        let bad_key = BlobKey::from_digest([0x22; 32]);
        assert!(store.put_verified(bad_key, b"nope").is_err());
        assert!(!store.has(&bad_key).expect("has"));
    }
}
