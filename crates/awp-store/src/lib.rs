// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Commit and depot record stores.
//!
//! Both stores hold metadata only — the ref-counting edges a commit or
//! depot root holds live in `awp-ledger`. The five-step atomic depot-root
//! swap (increment new, record history, swap version, decrement old)
//! spans both crates and is orchestrated by `awp-api`, which calls
//! [`DepotStore::update_root`] between the ledger calls it makes itself;
//! this crate only guarantees that its own slice of that sequence (the
//! history/version/root triple) commits as one atomic step.
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

mod commit;
mod depot;

pub use commit::{CommitRecord, CommitStore, MemoryCommitStore};
pub use depot::{DepotRecord, DepotStore, HistoryEntry, MemoryDepotStore, MAIN_DEPOT_NAME};

/// Errors raised by the commit and depot stores.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A backing lock was poisoned by a panicking holder.
    #[error("store lock poisoned")]
    Poisoned,
    /// No record exists at the given key.
    #[error("not found")]
    NotFound,
    /// A depot name was already taken in the realm.
    #[error("depot name already exists: {0}")]
    NameTaken(String),
    /// An operation targeted the reserved `main` depot in a way that is
    /// disallowed (deletion).
    #[error("the main depot cannot be deleted")]
    MainDepotProtected,
    /// An `update_root` call's expected version did not match the depot's
    /// current version (optimistic concurrency lost the race).
    #[error("version conflict: expected {expected}, found {current}")]
    VersionConflict {
        /// The version the caller believed was current.
        expected: u64,
        /// The version actually found.
        current: u64,
    },
    /// `rollback` targeted a version number with no history entry.
    #[error("no history entry at version {0}")]
    UnknownVersion(u64),
    /// The blob store or ref counter consulted during depot bootstrap failed.
    #[error("dependency failure: {0}")]
    Dependency(String),
}
