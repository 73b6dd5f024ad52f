// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-realm ownership and reference-counting ledger.
//!
//! [`OwnershipLedger`] answers "does realm R own key K" and lists a realm's
//! artefacts; [`RefCounter`] tracks the live-edge count that drives garbage
//! collection. They are separate traits (a put touches both, but a reader
//! may only need one) backed here by one [`RwLock`]-guarded map apiece, in
//! the style of `echo-cas::MemoryStore`. A cloud-backed pair (e.g. a KV
//! table plus an atomic-counter service) is the out-of-scope external
//! collaborator these traits exist to make swappable.
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

mod ownership;
mod refcount;

pub use ownership::{MemoryOwnershipLedger, OwnershipEntry, OwnershipLedger};
pub use refcount::{
    DecrementOutcome, GcState, IncrementOutcome, MemoryRefCounter, RefCountEntry, RefCounter,
};

/// Errors raised by ledger operations. Both stores in this crate are
/// infallible except for lock poisoning, which only happens if a prior
/// holder panicked while holding the write lock.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// A backing lock was poisoned by a panicking holder.
    #[error("ledger lock poisoned")]
    Poisoned,
    /// A pagination cursor did not round-trip to a value this store produced.
    #[error("malformed pagination cursor: {0}")]
    MalformedCursor(String),
}
