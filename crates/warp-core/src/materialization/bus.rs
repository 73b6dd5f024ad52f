// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Internal materialization bus for tick-scoped channel emissions.
//!
//! The [`MaterializationBus`] collects emissions from rewrite rules during a tick.
//! Emissions are stored in an order-independent manner (keyed by [`EmitKey`]),
//! then finalized post-commit according to each channel's policy.
//!
//! # Order Independence
//!
//! The bus uses `BTreeMap<ChannelId, BTreeMap<EmitKey, Vec<u8>>>` internally.
//! This ensures that:
//! 1. Insertion order doesn't affect the final result
//! 2. Finalization iterates in deterministic (canonical) order
//! 3. Confluence is preserved regardless of rewrite execution order
//!
//! # Usage
//!
//! Rules emit via `bus.emit(channel, emit_key, data)`. After commit, the engine
//! calls `bus.finalize()` to resolve each channel according to its policy and
//! produce the final output.

use std::cell::RefCell;
use std::collections::BTreeMap;

use super::channel::{ChannelConflict, ChannelId, ChannelPolicy};
use super::emit_key::EmitKey;

/// Internal materialization bus for collecting and finalizing channel emissions.
///
/// This is tick-scoped: emissions accumulate during a tick, then `finalize()` is
/// called post-commit to produce output. The bus is cleared after finalization.
#[derive(Debug, Default)]
pub struct MaterializationBus {
    /// Pending emissions: `channel -> (emit_key -> data)`.
    /// Uses `BTreeMap` for deterministic iteration order.
    pending: RefCell<BTreeMap<ChannelId, BTreeMap<EmitKey, Vec<u8>>>>,

    /// Channel policies (looked up during finalization).
    policies: BTreeMap<ChannelId, ChannelPolicy>,
}

/// Result of finalizing a single channel.
#[derive(Debug, Clone)]
pub struct FinalizedChannel {
    /// The channel that was finalized.
    pub channel: ChannelId,
    /// The finalized data (format depends on policy).
    pub data: Vec<u8>,
}

/// Result of finalizing all channels.
pub type FinalizeResult = Result<Vec<FinalizedChannel>, ChannelConflict>;

impl MaterializationBus {
    /// Creates a new empty bus.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a channel with a specific policy.
    ///
    /// If not registered, channels default to [`ChannelPolicy::Log`].
    #[inline]
    pub fn register_channel(&mut self, channel: ChannelId, policy: ChannelPolicy) {
        self.policies.insert(channel, policy);
    }

    /// Emits data to a channel with the given emit key.
    ///
    /// Multiple emissions to the same channel are collected and resolved
    /// during finalization according to the channel's policy.
    #[inline]
    pub fn emit(&self, channel: ChannelId, emit_key: EmitKey, data: Vec<u8>) {
        self.pending
            .borrow_mut()
            .entry(channel)
            .or_default()
            .insert(emit_key, data);
    }

    /// Returns the policy for a channel (defaults to Log if not registered).
    #[inline]
    pub fn policy(&self, channel: &ChannelId) -> ChannelPolicy {
        self.policies.get(channel).copied().unwrap_or_default()
    }

    /// Returns true if there are no pending emissions.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pending.borrow().is_empty()
    }

    /// Finalizes all pending emissions according to channel policies.
    ///
    /// For each channel:
    /// - `Log`: All values concatenated in `EmitKey` order
    /// - `StrictSingle`: Error if >1 emission, otherwise single value
    /// - `Reduce`: Values merged via join function (not yet implemented)
    ///
    /// Clears pending emissions after finalization.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelConflict`] if a `StrictSingle` channel has multiple emissions.
    pub fn finalize(&self) -> FinalizeResult {
        let mut pending = self.pending.borrow_mut();
        let mut results = Vec::with_capacity(pending.len());

        for (channel, emissions) in &*pending {
            let policy = self.policies.get(channel).copied().unwrap_or_default();
            let data = Self::finalize_channel(channel, emissions, policy)?;
            results.push(FinalizedChannel {
                channel: *channel,
                data,
            });
        }

        pending.clear();
        Ok(results)
    }

    /// Clears all pending emissions without finalizing (for abort path).
    #[inline]
    pub fn clear(&self) {
        self.pending.borrow_mut().clear();
    }

    /// Finalizes a single channel according to its policy.
    #[allow(clippy::cast_possible_truncation)]
    fn finalize_channel(
        channel: &ChannelId,
        emissions: &BTreeMap<EmitKey, Vec<u8>>,
        policy: ChannelPolicy,
    ) -> Result<Vec<u8>, ChannelConflict> {
        match policy {
            ChannelPolicy::Log => {
                // Concatenate all values in EmitKey order.
                // Format: length-prefixed entries for parseability.
                let mut result = Vec::new();
                for data in emissions.values() {
                    // Prefix each entry with its length as u32 LE
                    // Truncation is acceptable: entries >4GB are not supported
                    result.extend_from_slice(&(data.len() as u32).to_le_bytes());
                    result.extend_from_slice(data);
                }
                Ok(result)
            }
            ChannelPolicy::StrictSingle => {
                if emissions.len() > 1 {
                    return Err(ChannelConflict {
                        channel: *channel,
                        emission_count: emissions.len(),
                    });
                }
                // Return the single value (or empty if none)
                Ok(emissions.values().next().cloned().unwrap_or_default())
            }
            ChannelPolicy::Reduce { join_fn_id: _ } => {
                // TODO: Implement reduce via join function registry
                // For now, fall back to Log behavior
                let mut result = Vec::new();
                for data in emissions.values() {
                    result.extend_from_slice(&(data.len() as u32).to_le_bytes());
                    result.extend_from_slice(data);
                }
                Ok(result)
            }
        }
    }
}
