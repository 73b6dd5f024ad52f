// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! TTDR v2 — Tick Receipt Record wire codec.
//!
//! Wire format (Little-Endian):
//! ```text
//! offset size  field
//! 0      4     magic = ASCII "TTDR"
//! 4      2     receipt_version = u16 LE (2)
//! 6      2     flags = u16 LE
//!
//! 8      32    schema_hash = [u8;32]
//! 40     32    worldline_id = [u8;32]
//! 72     8     tick = u64 LE
//!
//! 80     32    commit_hash = [u8;32]
//! 112    32    patch_digest = [u8;32]
//! 144    32    state_root = [u8;32]         (zero if absent)
//! 176    32    emissions_digest = [u8;32]
//! 208    32    op_emission_index_digest     (zero if absent)
//!
//! 240    2     parent_count = u16 LE
//! 242    2     channel_count = u16 LE
//!
//! 244    32*P  parent_hashes [P][32]
//! ...    var   channel_digests (per channel)
//! ```
//!
//! Flags (u16):
//! - bit0: HAS_STATE_ROOT
//! - bit1: HAS_OP_EMISSION_INDEX_DIGEST
//! - bit2: HAS_CHANNEL_PAYLOAD_HASH
//! - bit3: HAS_ENTRY_HASHES
//! - bit4-5: RECEIPT_MODE (2 bits)

/// Protocol magic constant "TTDR".
pub const TTDR_MAGIC: [u8; 4] = [b'T', b'T', b'D', b'R'];

/// Current receipt version.
pub const TTDR_VERSION: u16 = 2;

/// Fixed header size in bytes (before variable sections).
pub const TTDR_FIXED_HEADER_SIZE: usize = 244;

/// Maximum parent count to prevent DoS.
pub const TTDR_MAX_PARENTS: u16 = 256;

/// Maximum channel count to prevent DoS.
pub const TTDR_MAX_CHANNELS: u16 = 1024;

/// Hash type (32-byte BLAKE3 hash).
pub type Hash32 = [u8; 32];

/// Zero hash constant.
pub const ZERO_HASH: Hash32 = [0u8; 32];

/// Receipt compression modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ReceiptMode {
    /// Full: all fields, all channel digests, all entry hashes.
    #[default]
    Full = 0,
    /// Proof: hashes + digests only (no payload bodies).
    Proof = 1,
    /// Light: commit_hash + emissions_digest + state_root only.
    Light = 2,
    /// Reserved for future use.
    Reserved = 3,
}

impl ReceiptMode {
    /// Decode from 2-bit value.
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::Full,
            1 => Self::Proof,
            2 => Self::Light,
            _ => Self::Reserved,
        }
    }

    /// Encode to 2-bit value.
    pub const fn to_bits(self) -> u8 {
        self as u8
    }
}

/// TTDR v2 flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TtdrFlags(pub u16);

impl TtdrFlags {
    /// Flag: state_root field is meaningful (not zero).
    pub const HAS_STATE_ROOT: u16 = 1 << 0;
    /// Flag: op_emission_index_digest field is meaningful (not zero).
    pub const HAS_OP_EMISSION_INDEX_DIGEST: u16 = 1 << 1;
    /// Flag: channel digests include payload hashes.
    pub const HAS_CHANNEL_PAYLOAD_HASH: u16 = 1 << 2;
    /// Flag: channel digests include per-entry hashes.
    pub const HAS_ENTRY_HASHES: u16 = 1 << 3;
    /// Mask for receipt mode bits (4-5).
    const RECEIPT_MODE_MASK: u16 = 0b11 << 4;
    /// Shift for receipt mode bits.
    const RECEIPT_MODE_SHIFT: u16 = 4;

    /// Create flags from raw u16.
    #[inline]
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// Check if HAS_STATE_ROOT is set.
    #[inline]
    pub const fn has_state_root(self) -> bool {
        self.0 & Self::HAS_STATE_ROOT != 0
    }

    /// Check if HAS_OP_EMISSION_INDEX_DIGEST is set.
    #[inline]
    pub const fn has_op_emission_index_digest(self) -> bool {
        self.0 & Self::HAS_OP_EMISSION_INDEX_DIGEST != 0
    }

    /// Check if HAS_CHANNEL_PAYLOAD_HASH is set.
    #[inline]
    pub const fn has_channel_payload_hash(self) -> bool {
        self.0 & Self::HAS_CHANNEL_PAYLOAD_HASH != 0
    }

    /// Check if HAS_ENTRY_HASHES is set.
    #[inline]
    pub const fn has_entry_hashes(self) -> bool {
        self.0 & Self::HAS_ENTRY_HASHES != 0
    }

    /// Get the receipt mode.
    #[inline]
    pub const fn receipt_mode(self) -> ReceiptMode {
        let bits = ((self.0 & Self::RECEIPT_MODE_MASK) >> Self::RECEIPT_MODE_SHIFT) as u8;
        ReceiptMode::from_bits(bits)
    }

    /// Set the receipt mode.
    #[inline]
    pub const fn with_receipt_mode(self, mode: ReceiptMode) -> Self {
        let cleared = self.0 & !Self::RECEIPT_MODE_MASK;
        let mode_bits = (mode.to_bits() as u16) << Self::RECEIPT_MODE_SHIFT;
        Self(cleared | mode_bits)
    }

    /// Create flags with specific settings.
    pub const fn new(
        has_state_root: bool,
        has_op_emission_index_digest: bool,
        has_channel_payload_hash: bool,
        has_entry_hashes: bool,
        mode: ReceiptMode,
    ) -> Self {
        let mut bits = 0u16;
        if has_state_root {
            bits |= Self::HAS_STATE_ROOT;
        }
        if has_op_emission_index_digest {
            bits |= Self::HAS_OP_EMISSION_INDEX_DIGEST;
        }
        if has_channel_payload_hash {
            bits |= Self::HAS_CHANNEL_PAYLOAD_HASH;
        }
        if has_entry_hashes {
            bits |= Self::HAS_ENTRY_HASHES;
        }
        bits |= (mode.to_bits() as u16) << Self::RECEIPT_MODE_SHIFT;
        Self(bits)
    }
}

/// TTDR v2 decode/encode errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TtdrError {
    /// Input too short to contain fixed header.
    #[error("incomplete header: need {TTDR_FIXED_HEADER_SIZE} bytes, got {0}")]
    IncompleteHeader(usize),

    /// Input too short to contain parent hashes.
    #[error("incomplete parent hashes: need {needed} bytes, got {got}")]
    IncompleteParents {
        /// Bytes needed.
        needed: usize,
        /// Bytes available.
        got: usize,
    },

    /// Input too short to contain channel digests.
    #[error("incomplete channel digests: need {needed} bytes, got {got}")]
    IncompleteChannels {
        /// Bytes needed.
        needed: usize,
        /// Bytes available.
        got: usize,
    },

    /// Magic bytes do not match "TTDR".
    #[error("bad magic: expected TTDR, got {0:?}")]
    BadMagic([u8; 4]),

    /// Unsupported receipt version.
    #[error("unsupported version: expected {TTDR_VERSION}, got {0}")]
    UnsupportedVersion(u16),

    /// Parent count exceeds maximum.
    #[error("too many parents: {0} exceeds max {TTDR_MAX_PARENTS}")]
    TooManyParents(u16),

    /// Channel count exceeds maximum.
    #[error("too many channels: {0} exceeds max {TTDR_MAX_CHANNELS}")]
    TooManyChannels(u16),

    /// Entry count exceeds maximum.
    #[error("too many entries in channel {channel_idx}: {count} exceeds max {max}")]
    TooManyEntries {
        /// Channel index.
        channel_idx: u16,
        /// Actual entry count.
        count: u32,
        /// Maximum allowed.
        max: u32,
    },

    /// Reserved receipt mode used.
    #[error("reserved receipt mode 3 is not allowed")]
    ReservedReceiptMode,
}

/// TTDR v2 fixed header (first 244 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtdrHeader {
    /// Receipt version (always 2 for v2).
    pub version: u16,
    /// Flags (see [`TtdrFlags`]).
    pub flags: TtdrFlags,
    /// Schema hash identifying the protocol schema.
    pub schema_hash: Hash32,
    /// Worldline identifier.
    pub worldline_id: Hash32,
    /// Tick number.
    pub tick: u64,
    /// Commit hash for this tick.
    pub commit_hash: Hash32,
    /// Patch digest.
    pub patch_digest: Hash32,
    /// State root (zero if HAS_STATE_ROOT is false).
    pub state_root: Hash32,
    /// Emissions digest.
    pub emissions_digest: Hash32,
    /// Op emission index digest (zero if HAS_OP_EMISSION_INDEX_DIGEST is false).
    pub op_emission_index_digest: Hash32,
    /// Number of parent hashes.
    pub parent_count: u16,
    /// Number of channel digest entries.
    pub channel_count: u16,
}

impl TtdrHeader {
    /// Encode header to a 244-byte array.
    pub fn to_bytes(&self) -> [u8; TTDR_FIXED_HEADER_SIZE] {
        let mut buf = [0u8; TTDR_FIXED_HEADER_SIZE];

        // offset 0-3: magic
        buf[0..4].copy_from_slice(&TTDR_MAGIC);
        // offset 4-5: version (LE)
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        // offset 6-7: flags (LE)
        buf[6..8].copy_from_slice(&self.flags.0.to_le_bytes());
        // offset 8-39: schema_hash
        buf[8..40].copy_from_slice(&self.schema_hash);
        // offset 40-71: worldline_id
        buf[40..72].copy_from_slice(&self.worldline_id);
        // offset 72-79: tick (LE)
        buf[72..80].copy_from_slice(&self.tick.to_le_bytes());
        // offset 80-111: commit_hash
        buf[80..112].copy_from_slice(&self.commit_hash);
        // offset 112-143: patch_digest
        buf[112..144].copy_from_slice(&self.patch_digest);
        // offset 144-175: state_root
        buf[144..176].copy_from_slice(&self.state_root);
        // offset 176-207: emissions_digest
        buf[176..208].copy_from_slice(&self.emissions_digest);
        // offset 208-239: op_emission_index_digest
        buf[208..240].copy_from_slice(&self.op_emission_index_digest);
        // offset 240-241: parent_count (LE)
        buf[240..242].copy_from_slice(&self.parent_count.to_le_bytes());
        // offset 242-243: channel_count (LE)
        buf[242..244].copy_from_slice(&self.channel_count.to_le_bytes());

        buf
    }

    /// Parse header from bytes. Returns error if invalid.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TtdrError> {
        if bytes.len() < TTDR_FIXED_HEADER_SIZE {
            return Err(TtdrError::IncompleteHeader(bytes.len()));
        }

        // offset 0-3: magic
        let magic: [u8; 4] = bytes[0..4].try_into().unwrap();
        if magic != TTDR_MAGIC {
            return Err(TtdrError::BadMagic(magic));
        }

        // offset 4-5: version
        let version = u16::from_le_bytes(bytes[4..6].try_into().unwrap());
        if version != TTDR_VERSION {
            return Err(TtdrError::UnsupportedVersion(version));
        }

        // offset 6-7: flags
        let flags = TtdrFlags::from_bits(u16::from_le_bytes(bytes[6..8].try_into().unwrap()));

        // Reject reserved receipt mode
        if flags.receipt_mode() == ReceiptMode::Reserved {
            return Err(TtdrError::ReservedReceiptMode);
        }

        // offset 8-39: schema_hash
        let schema_hash: Hash32 = bytes[8..40].try_into().unwrap();

        // offset 40-71: worldline_id
        let worldline_id: Hash32 = bytes[40..72].try_into().unwrap();

        // offset 72-79: tick
        let tick = u64::from_le_bytes(bytes[72..80].try_into().unwrap());

        // offset 80-111: commit_hash
        let commit_hash: Hash32 = bytes[80..112].try_into().unwrap();

        // offset 112-143: patch_digest
        let patch_digest: Hash32 = bytes[112..144].try_into().unwrap();

        // offset 144-175: state_root
        let state_root: Hash32 = bytes[144..176].try_into().unwrap();

        // offset 176-207: emissions_digest
        let emissions_digest: Hash32 = bytes[176..208].try_into().unwrap();

        // offset 208-239: op_emission_index_digest
        let op_emission_index_digest: Hash32 = bytes[208..240].try_into().unwrap();

        // offset 240-241: parent_count
        let parent_count = u16::from_le_bytes(bytes[240..242].try_into().unwrap());
        if parent_count > TTDR_MAX_PARENTS {
            return Err(TtdrError::TooManyParents(parent_count));
        }

        // offset 242-243: channel_count
        let channel_count = u16::from_le_bytes(bytes[242..244].try_into().unwrap());
        if channel_count > TTDR_MAX_CHANNELS {
            return Err(TtdrError::TooManyChannels(channel_count));
        }

        Ok(Self {
            version,
            flags,
            schema_hash,
            worldline_id,
            tick,
            commit_hash,
            patch_digest,
            state_root,
            emissions_digest,
            op_emission_index_digest,
            parent_count,
            channel_count,
        })
    }
}

/// Per-channel digest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDigest {
    /// Channel identifier (32 bytes).
    pub channel_id: Hash32,
    /// Channel version.
    pub channel_version: u16,
    /// Payload hash (present if HAS_CHANNEL_PAYLOAD_HASH flag is set).
    pub payload_hash: Option<Hash32>,
    /// Entry hashes (present if HAS_ENTRY_HASHES flag is set).
    pub entry_hashes: Vec<Hash32>,
}

impl ChannelDigest {
    /// Minimum size for a channel digest (channel_id + version).
    pub const MIN_SIZE: usize = 32 + 2;

    /// Encode to bytes.
    pub fn encode(&self, flags: TtdrFlags, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.channel_id);
        out.extend_from_slice(&self.channel_version.to_le_bytes());

        if flags.has_channel_payload_hash() {
            let hash = self.payload_hash.unwrap_or(ZERO_HASH);
            out.extend_from_slice(&hash);
        }

        if flags.has_entry_hashes() {
            let count = self.entry_hashes.len() as u32;
            out.extend_from_slice(&count.to_le_bytes());
            for hash in &self.entry_hashes {
                out.extend_from_slice(hash);
            }
        }
    }

    /// Decode from bytes. Returns (digest, bytes_consumed).
    pub fn decode(
        bytes: &[u8],
        flags: TtdrFlags,
        channel_idx: u16,
    ) -> Result<(Self, usize), TtdrError> {
        let mut offset = 0;

        // channel_id (32 bytes)
        if bytes.len() < offset + 32 {
            return Err(TtdrError::IncompleteChannels {
                needed: offset + 32,
                got: bytes.len(),
            });
        }
        let channel_id: Hash32 = bytes[offset..offset + 32].try_into().unwrap();
        offset += 32;

        // channel_version (2 bytes)
        if bytes.len() < offset + 2 {
            return Err(TtdrError::IncompleteChannels {
                needed: offset + 2,
                got: bytes.len(),
            });
        }
        let channel_version = u16::from_le_bytes(bytes[offset..offset + 2].try_into().unwrap());
        offset += 2;

        // payload_hash (32 bytes, optional)
        let payload_hash = if flags.has_channel_payload_hash() {
            if bytes.len() < offset + 32 {
                return Err(TtdrError::IncompleteChannels {
                    needed: offset + 32,
                    got: bytes.len(),
                });
            }
            let hash: Hash32 = bytes[offset..offset + 32].try_into().unwrap();
            offset += 32;
            Some(hash)
        } else {
            None
        };

        // entry_hashes (variable, optional)
        let entry_hashes = if flags.has_entry_hashes() {
            // entry_count (4 bytes)
            if bytes.len() < offset + 4 {
                return Err(TtdrError::IncompleteChannels {
                    needed: offset + 4,
                    got: bytes.len(),
                });
            }
            let entry_count = u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap());
            offset += 4;

            // Limit entry count to prevent DoS
            const MAX_ENTRIES_PER_CHANNEL: u32 = 65536;
            if entry_count > MAX_ENTRIES_PER_CHANNEL {
                return Err(TtdrError::TooManyEntries {
                    channel_idx,
                    count: entry_count,
                    max: MAX_ENTRIES_PER_CHANNEL,
                });
            }

            let hashes_size = entry_count as usize * 32;
            if bytes.len() < offset + hashes_size {
                return Err(TtdrError::IncompleteChannels {
                    needed: offset + hashes_size,
                    got: bytes.len(),
                });
            }

            let mut hashes = Vec::with_capacity(entry_count as usize);
            for _ in 0..entry_count {
                let hash: Hash32 = bytes[offset..offset + 32].try_into().unwrap();
                hashes.push(hash);
                offset += 32;
            }
            hashes
        } else {
            Vec::new()
        };

        Ok((
            Self {
                channel_id,
                channel_version,
                payload_hash,
                entry_hashes,
            },
            offset,
        ))
    }
}

/// TTDR v2 frame with parsed contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtdrFrame {
    /// Parsed header.
    pub header: TtdrHeader,
    /// Parent hashes.
    pub parent_hashes: Vec<Hash32>,
    /// Channel digests.
    pub channel_digests: Vec<ChannelDigest>,
}

impl TtdrFrame {
    /// Convert to a lighter receipt mode (strips data as appropriate).
    pub fn to_mode(&self, mode: ReceiptMode) -> Self {
        match mode {
            ReceiptMode::Full => self.clone(),
            ReceiptMode::Proof => {
                // Keep hashes, strip entry bodies (entry_hashes are already hashes)
                let mut frame = self.clone();
                frame.header.flags = frame.header.flags.with_receipt_mode(ReceiptMode::Proof);
                frame
            }
            ReceiptMode::Light => {
                // Minimal: just commit_hash, emissions_digest, state_root
                let mut header = self.header;
                header.flags = TtdrFlags::new(
                    header.flags.has_state_root(),
                    false, // no op_emission_index_digest
                    false, // no channel payload hash
                    false, // no entry hashes
                    ReceiptMode::Light,
                );
                header.parent_count = 0;
                header.channel_count = 0;
                header.op_emission_index_digest = ZERO_HASH;

                TtdrFrame {
                    header,
                    parent_hashes: Vec::new(),
                    channel_digests: Vec::new(),
                }
            }
            ReceiptMode::Reserved => self.clone(), // No-op for reserved
        }
    }
}

/// Encode a TTDR v2 frame.
pub fn encode_ttdr_v2(frame: &TtdrFrame) -> Result<Vec<u8>, TtdrError> {
    // Validate counts
    if frame.parent_hashes.len() > TTDR_MAX_PARENTS as usize {
        return Err(TtdrError::TooManyParents(frame.parent_hashes.len() as u16));
    }
    if frame.channel_digests.len() > TTDR_MAX_CHANNELS as usize {
        return Err(TtdrError::TooManyChannels(
            frame.channel_digests.len() as u16
        ));
    }

    // Build header with correct counts
    let mut header = frame.header;
    header.parent_count = frame.parent_hashes.len() as u16;
    header.channel_count = frame.channel_digests.len() as u16;

    // Calculate size
    let parents_size = frame.parent_hashes.len() * 32;
    let mut channels_size = 0;
    for digest in &frame.channel_digests {
        channels_size += ChannelDigest::MIN_SIZE;
        if header.flags.has_channel_payload_hash() {
            channels_size += 32;
        }
        if header.flags.has_entry_hashes() {
            channels_size += 4 + digest.entry_hashes.len() * 32;
        }
    }

    let total_size = TTDR_FIXED_HEADER_SIZE + parents_size + channels_size;
    let mut out = Vec::with_capacity(total_size);

    // Write header
    out.extend_from_slice(&header.to_bytes());

    // Write parent hashes
    for hash in &frame.parent_hashes {
        out.extend_from_slice(hash);
    }

    // Write channel digests
    for digest in &frame.channel_digests {
        digest.encode(header.flags, &mut out);
    }

    Ok(out)
}

/// Decode a TTDR v2 frame from bytes.
///
/// # Returns
/// * `Ok((frame, consumed))` - Parsed frame and number of bytes consumed
/// * `Err(e)` - Parse error
pub fn decode_ttdr_v2(bytes: &[u8]) -> Result<(TtdrFrame, usize), TtdrError> {
    let header = TtdrHeader::from_bytes(bytes)?;

    let mut offset = TTDR_FIXED_HEADER_SIZE;

    // Read parent hashes
    let parents_size = header.parent_count as usize * 32;
    if bytes.len() < offset + parents_size {
        return Err(TtdrError::IncompleteParents {
            needed: offset + parents_size,
            got: bytes.len(),
        });
    }

    let mut parent_hashes = Vec::with_capacity(header.parent_count as usize);
    for _ in 0..header.parent_count {
        let hash: Hash32 = bytes[offset..offset + 32].try_into().unwrap();
        parent_hashes.push(hash);
        offset += 32;
    }

    // Read channel digests
    let mut channel_digests = Vec::with_capacity(header.channel_count as usize);
    for i in 0..header.channel_count {
        let (digest, consumed) = ChannelDigest::decode(&bytes[offset..], header.flags, i)?;
        channel_digests.push(digest);
        offset += consumed;
    }

    Ok((
        TtdrFrame {
            header,
            parent_hashes,
            channel_digests,
        },
        offset,
    ))
}
