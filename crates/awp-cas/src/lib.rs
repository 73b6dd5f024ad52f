// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Content-addressed blob store for the AWP storage service.
//!
//! `awp-cas` provides a [`BlobStore`] trait for storage keyed by the SHA-256
//! digest of the stored bytes. [`MemoryStore`] is the reference
//! implementation used by tests and the in-process default; [`FsStore`]
//! lays blobs out on disk under `cas/sha256/<xx>/<hex>` as described by the
//! service's storage contract. Any other backend (an object-store tier, a
//! cloud KV pair) is an external collaborator that only needs to implement
//! [`BlobStore`].
//!
//! # Key identity
//!
//! A [`BlobKey`] is `"sha256:" || lowerhex(SHA-256(bytes))`. [`put`](BlobStore::put)
//! rejects any caller-supplied key that does not match the bytes actually
//! hashed — this is the content-addressing invariant the rest of the service
//! depends on for deduplication safety.
//!
//! # Absence semantics
//!
//! [`get`](BlobStore::get) returns `None` for a missing blob; this is not an
//! error. Errors are reserved for integrity violations (hash mismatch).
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
    clippy::return_self_not_must_use,
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions,
    clippy::use_self
)]

mod fs_store;
mod memory;

pub use fs_store::FsStore;
pub use memory::MemoryStore;

use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

/// A SHA-256 content key, rendered as `"sha256:" || lowerhex(digest)`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct BlobKey([u8; 32]);

impl BlobKey {
    /// Wrap a raw 32-byte digest.
    #[must_use]
    pub fn from_digest(digest: [u8; 32]) -> Self {
        Self(digest)
    }

    /// View the digest as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parse a key from its canonical `"sha256:<hex>"` form.
    ///
    /// # Errors
    ///
    /// Returns [`CasError::MalformedKey`] if the prefix is wrong or the hex
    /// payload is not exactly 64 lowercase hex characters.
    pub fn parse(s: &str) -> Result<Self, CasError> {
        let hex_part = s
            .strip_prefix("sha256:")
            .ok_or_else(|| CasError::MalformedKey(s.to_owned()))?;
        if hex_part.len() != 64 {
            return Err(CasError::MalformedKey(s.to_owned()));
        }
        let mut digest = [0u8; 32];
        for (i, chunk) in hex_part.as_bytes().chunks(2).enumerate() {
            let byte_str =
                std::str::from_utf8(chunk).map_err(|_| CasError::MalformedKey(s.to_owned()))?;
            digest[i] = u8::from_str_radix(byte_str, 16)
                .map_err(|_| CasError::MalformedKey(s.to_owned()))?;
        }
        Ok(Self(digest))
    }

    /// The two-character hex prefix used to shard on-disk directories.
    #[must_use]
    pub fn shard_prefix(&self) -> String {
        hex::encode(&self.0[..1])
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sha256:{}", hex::encode(self.0))
    }
}

/// Opaque tenant identifier, canonically `usr_<userId>`.
///
/// Every stored artefact belongs to exactly one realm; this type is shared
/// by every crate in the workspace that scopes state per-tenant
/// (`awp-ledger`, `awp-usage`, `awp-store`, `awp-auth`) rather than each
/// crate inventing its own wrapper around a bare `String`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Realm(String);

impl Realm {
    /// Wrap an already-canonical realm identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The canonical `usr_<userId>` realm for a given user id.
    #[must_use]
    pub fn for_user(user_id: &str) -> Self {
        Self(format!("usr_{user_id}"))
    }

    /// View the realm identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Realm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Realm {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Compute the content key of `bytes`.
#[must_use]
pub fn blob_key(bytes: &[u8]) -> BlobKey {
    let digest = Sha256::digest(bytes);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    BlobKey(out)
}

/// Errors raised by CAS operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CasError {
    /// Caller-supplied bytes did not hash to the caller-supplied key.
    #[error("hash mismatch: expected {expected}, computed {computed}")]
    HashMismatch {
        /// The key the caller declared.
        expected: BlobKey,
        /// The key actually computed from the bytes.
        computed: BlobKey,
    },
    /// A key string did not parse as `"sha256:<64 lowercase hex chars>"`.
    #[error("malformed key: {0}")]
    MalformedKey(String),
    /// The backing store failed for a reason unrelated to content addressing
    /// (disk I/O, etc).
    #[error("store io error: {0}")]
    Io(String),
}

/// Content-addressed blob store.
///
/// Implementations store opaque byte blobs keyed by their SHA-256 digest.
/// `put`/`put_verified` are idempotent: storing the same key twice is a
/// no-op at the CAS layer (ref-counting for a key that already exists is a
/// concern of the ledger built atop this trait, not of `BlobStore` itself).
pub trait BlobStore: Send + Sync {
    /// Compute the key and store the bytes, returning the key.
    ///
    /// # Errors
    ///
    /// Returns [`CasError::Io`] on a backing-store failure.
    fn put(&self, bytes: &[u8]) -> Result<BlobKey, CasError>;

    /// Store bytes under a caller-asserted key.
    ///
    /// # Errors
    ///
    /// Returns [`CasError::HashMismatch`] if `sha256(bytes) != expected`; the
    /// store is left unchanged on mismatch. Returns [`CasError::Io`] on a
    /// backing-store failure.
    fn put_verified(&self, expected: BlobKey, bytes: &[u8]) -> Result<(), CasError>;

    /// Retrieve a blob by key. `Ok(None)` means the blob is not stored —
    /// that is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`CasError::Io`] on a backing-store failure.
    fn get(&self, key: &BlobKey) -> Result<Option<Arc<[u8]>>, CasError>;

    /// Check existence without retrieving the bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CasError::Io`] on a backing-store failure.
    fn has(&self, key: &BlobKey) -> Result<bool, CasError>;

    /// Remove a blob. Used only by the garbage collector. Absence of the
    /// key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`CasError::Io`] on a backing-store failure.
    fn erase(&self, key: &BlobKey) -> Result<(), CasError>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn key_display_round_trips_through_parse() {
        let key = blob_key(b"round trip me");
        let rendered = key.to_string();
        let parsed = BlobKey::parse(&rendered).expect("parse");
        assert_eq!(key, parsed);
    }

    #[test]
    fn parse_rejects_bad_prefix() {
        assert!(BlobKey::parse("md5:abc").is_err());
    }

    #[test]
    fn parse_rejects_wrong_length() {
        assert!(BlobKey::parse("sha256:abcd").is_err());
    }
}
