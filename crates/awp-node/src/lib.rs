// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Binary framing and validation for the four CAS node kinds: chunk,
//! inline-file, file, and collection.
//!
//! Every node blob begins with a 4-byte magic and a 1-byte kind tag. The
//! rest of the framing is kind-specific (see [`Node`]). [`decode`] performs
//! framing-only parsing; [`validate`] additionally checks content-addressing
//! and cross-references against the store the caller supplies.
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

use awp_cas::BlobKey;
use std::collections::HashSet;

const MAGIC: [u8; 4] = *b"AWP1";
const HEADER_LEN: usize = MAGIC.len() + 1;

/// Default maximum UTF-8 byte length for a collection entry name.
pub const DEFAULT_MAX_NAME_BYTES: usize = 255;

/// Limits applied during decode/validate, sourced from service configuration.
#[derive(Debug, Clone, Copy)]
pub struct NodeLimits {
    /// Maximum UTF-8 byte length of a single collection entry name.
    pub max_name_bytes: usize,
}

impl Default for NodeLimits {
    fn default() -> Self {
        Self {
            max_name_bytes: DEFAULT_MAX_NAME_BYTES,
        }
    }
}

/// The kind tag carried in every node's header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Raw payload, no children.
    Chunk,
    /// Payload plus an original MIME type, no children.
    InlineFile,
    /// Ordered list of chunk/file children plus a MIME type.
    File,
    /// Ordered list of (name, child) pairs.
    Collection,
}

impl NodeKind {
    const fn tag(self) -> u8 {
        match self {
            Self::Chunk => 0,
            Self::InlineFile => 1,
            Self::File => 2,
            Self::Collection => 3,
        }
    }

    const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Chunk),
            1 => Some(Self::InlineFile),
            2 => Some(Self::File),
            3 => Some(Self::Collection),
            _ => None,
        }
    }
}

/// A decoded node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Raw payload bytes.
    Chunk {
        /// The stored bytes.
        payload: Vec<u8>,
    },
    /// Raw payload bytes tagged with their original MIME type.
    InlineFile {
        /// The stored bytes.
        payload: Vec<u8>,
        /// Original content type, e.g. `"image/png"`.
        mime: String,
    },
    /// An ordered concatenation of chunk/file children.
    File {
        /// Child digests, in order.
        children: Vec<BlobKey>,
        /// Original content type of the assembled file.
        mime: String,
        /// Declared sum of the children's logical sizes.
        declared_size: u64,
    },
    /// An ordered, name-addressed set of children.
    Collection {
        /// `(name, child key)` pairs, in encode order.
        entries: Vec<(String, BlobKey)>,
        /// Declared sum of the children's logical sizes.
        declared_size: u64,
    },
}

impl Node {
    /// The node's kind.
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Chunk { .. } => NodeKind::Chunk,
            Self::InlineFile { .. } => NodeKind::InlineFile,
            Self::File { .. } => NodeKind::File,
            Self::Collection { .. } => NodeKind::Collection,
        }
    }

    /// Child digests referenced by this node, in encode order. Empty for
    /// chunks and inline files.
    #[must_use]
    pub fn children(&self) -> Vec<BlobKey> {
        match self {
            Self::Chunk { .. } | Self::InlineFile { .. } => Vec::new(),
            Self::File { children, .. } => children.clone(),
            Self::Collection { entries, .. } => entries.iter().map(|(_, k)| *k).collect(),
        }
    }

    /// The declared logical size: payload length for chunk/inline-file,
    /// the declared child-size sum for file/collection.
    #[must_use]
    pub fn declared_size(&self) -> u64 {
        match self {
            Self::Chunk { payload } | Self::InlineFile { payload, .. } => payload.len() as u64,
            Self::File { declared_size, .. } | Self::Collection { declared_size, .. } => {
                *declared_size
            }
        }
    }
}

/// Errors raised while decoding or structurally validating a node blob.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedError {
    /// The 4-byte magic prefix did not match.
    #[error("bad magic")]
    BadMagic,
    /// Buffer too short to contain a header.
    #[error("truncated header")]
    TruncatedHeader,
    /// The kind tag byte is not one of the four known kinds.
    #[error("unknown kind tag {0}")]
    UnknownKind(u8),
    /// A length-prefixed field ran past the end of the buffer.
    #[error("truncated field: {0}")]
    TruncatedField(&'static str),
    /// Trailing bytes remained after all declared fields were consumed.
    #[error("trailing bytes after decode")]
    TrailingBytes,
    /// A MIME or name field was not valid UTF-8.
    #[error("invalid utf-8 in {0}")]
    InvalidUtf8(&'static str),
    /// A collection entry name exceeded `max_name_bytes`.
    #[error("name too long: {0} bytes")]
    NameTooLong(usize),
    /// Two collection entries shared the same name.
    #[error("duplicate entry name: {0}")]
    DuplicateName(String),
}

/// Parse only the framing: magic, kind tag, and enough of the length fields
/// to know the node's kind. Does not allocate child-reference lists or
/// validate names; used as a cheap early rejection before the full decode.
///
/// # Errors
///
/// See [`MalformedError`].
pub fn quick_validate(bytes: &[u8]) -> Result<NodeKind, MalformedError> {
    if bytes.len() < HEADER_LEN {
        return Err(MalformedError::TruncatedHeader);
    }
    if bytes[..4] != MAGIC {
        return Err(MalformedError::BadMagic);
    }
    NodeKind::from_tag(bytes[4]).ok_or(MalformedError::UnknownKind(bytes[4]))
}

/// Fully decode a node blob, checking framing consistency (invariants a/b/c
/// from the data model) but not cross-referencing children against any
/// store — see [`validate`] for that.
///
/// # Errors
///
/// See [`MalformedError`].
pub fn decode(bytes: &[u8], limits: &NodeLimits) -> Result<Node, MalformedError> {
    let kind = quick_validate(bytes)?;
    let body = &bytes[HEADER_LEN..];
    match kind {
        NodeKind::Chunk => Ok(Node::Chunk {
            payload: body.to_vec(),
        }),
        NodeKind::InlineFile => decode_inline_file(body),
        NodeKind::File => decode_file(body),
        NodeKind::Collection => decode_collection(body, limits),
    }
}

fn take_u16_len_prefixed<'a>(
    buf: &'a [u8],
    field: &'static str,
) -> Result<(&'a [u8], &'a [u8]), MalformedError> {
    if buf.len() < 2 {
        return Err(MalformedError::TruncatedField(field));
    }
    let len = u16::from_be_bytes([buf[0], buf[1]]) as usize;
    let rest = &buf[2..];
    if rest.len() < len {
        return Err(MalformedError::TruncatedField(field));
    }
    Ok((&rest[..len], &rest[len..]))
}

fn decode_inline_file(body: &[u8]) -> Result<Node, MalformedError> {
    let (mime_bytes, rest) = take_u16_len_prefixed(body, "mime")?;
    let mime = std::str::from_utf8(mime_bytes)
        .map_err(|_| MalformedError::InvalidUtf8("mime"))?
        .to_owned();
    Ok(Node::InlineFile {
        payload: rest.to_vec(),
        mime,
    })
}

fn decode_file(body: &[u8]) -> Result<Node, MalformedError> {
    if body.len() < 8 {
        return Err(MalformedError::TruncatedField("declared_size"));
    }
    let declared_size = u64::from_be_bytes(body[0..8].try_into().map_err(|_| {
        MalformedError::TruncatedField("declared_size")
    })?);
    let (mime_bytes, rest) = take_u16_len_prefixed(&body[8..], "mime")?;
    let mime = std::str::from_utf8(mime_bytes)
        .map_err(|_| MalformedError::InvalidUtf8("mime"))?
        .to_owned();
    if rest.len() < 4 {
        return Err(MalformedError::TruncatedField("child_count"));
    }
    let child_count = u32::from_be_bytes(rest[0..4].try_into().map_err(|_| {
        MalformedError::TruncatedField("child_count")
    })?) as usize;
    let children_bytes = &rest[4..];
    let expected_len = child_count
        .checked_mul(32)
        .ok_or(MalformedError::TruncatedField("children"))?;
    if children_bytes.len() != expected_len {
        return if children_bytes.len() < expected_len {
            Err(MalformedError::TruncatedField("children"))
        } else {
            Err(MalformedError::TrailingBytes)
        };
    }
    let mut children = Vec::with_capacity(child_count);
    for chunk in children_bytes.chunks_exact(32) {
        let mut digest = [0u8; 32];
        digest.copy_from_slice(chunk);
        children.push(BlobKey::from_digest(digest));
    }
    Ok(Node::File {
        children,
        mime,
        declared_size,
    })
}

fn decode_collection(body: &[u8], limits: &NodeLimits) -> Result<Node, MalformedError> {
    if body.len() < 12 {
        return Err(MalformedError::TruncatedField("declared_size"));
    }
    let declared_size = u64::from_be_bytes(body[0..8].try_into().map_err(|_| {
        MalformedError::TruncatedField("declared_size")
    })?);
    let entry_count = u32::from_be_bytes(body[8..12].try_into().map_err(|_| {
        MalformedError::TruncatedField("entry_count")
    })?) as usize;
    let mut cursor = &body[12..];
    let mut entries = Vec::with_capacity(entry_count);
    let mut seen_names: HashSet<String> = HashSet::with_capacity(entry_count);
    for _ in 0..entry_count {
        let (name_bytes, rest) = take_u16_len_prefixed(cursor, "entry name")?;
        if name_bytes.len() > limits.max_name_bytes {
            return Err(MalformedError::NameTooLong(name_bytes.len()));
        }
        let name = std::str::from_utf8(name_bytes)
            .map_err(|_| MalformedError::InvalidUtf8("entry name"))?
            .to_owned();
        if rest.len() < 32 {
            return Err(MalformedError::TruncatedField("entry digest"));
        }
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&rest[..32]);
        cursor = &rest[32..];
        if !seen_names.insert(name.clone()) {
            return Err(MalformedError::DuplicateName(name));
        }
        entries.push((name, BlobKey::from_digest(digest)));
    }
    if !cursor.is_empty() {
        return Err(MalformedError::TrailingBytes);
    }
    Ok(Node::Collection {
        entries,
        declared_size,
    })
}

/// Encode a node back to its binary framing. Inverse of [`decode`] for any
/// value [`decode`] would have accepted.
#[must_use]
pub fn encode(node: &Node) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&MAGIC);
    out.push(node.kind().tag());
    match node {
        Node::Chunk { payload } => out.extend_from_slice(payload),
        Node::InlineFile { payload, mime } => {
            write_u16_len_prefixed(&mut out, mime.as_bytes());
            out.extend_from_slice(payload);
        }
        Node::File {
            children,
            mime,
            declared_size,
        } => {
            out.extend_from_slice(&declared_size.to_be_bytes());
            write_u16_len_prefixed(&mut out, mime.as_bytes());
            out.extend_from_slice(&(children.len() as u32).to_be_bytes());
            for child in children {
                out.extend_from_slice(child.as_bytes());
            }
        }
        Node::Collection {
            entries,
            declared_size,
        } => {
            out.extend_from_slice(&declared_size.to_be_bytes());
            out.extend_from_slice(&(entries.len() as u32).to_be_bytes());
            for (name, key) in entries {
                write_u16_len_prefixed(&mut out, name.as_bytes());
                out.extend_from_slice(key.as_bytes());
            }
        }
    }
    out
}

fn write_u16_len_prefixed(out: &mut Vec<u8>, bytes: &[u8]) {
    #[allow(clippy::cast_possible_truncation)]
    out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
    out.extend_from_slice(bytes);
}

/// Outcome of a full [`validate`] pass beyond plain decode failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidateError {
    /// Framing was malformed; see [`MalformedError`].
    #[error(transparent)]
    Malformed(#[from] MalformedError),
    /// `sha256(bytes) != expected_key`.
    #[error("hash mismatch: expected {expected}, computed {computed}")]
    HashMismatch {
        /// The key the caller asserted for these bytes.
        expected: BlobKey,
        /// The key actually computed.
        computed: BlobKey,
    },
    /// One or more referenced children are not present in the store.
    #[error("missing {} child node(s)", .0.len())]
    MissingChildren(Vec<BlobKey>),
    /// The declared size did not equal the sum of the children's sizes.
    #[error("size mismatch: declared {declared}, computed {computed}")]
    SizeMismatch {
        /// The size the node declared.
        declared: u64,
        /// The sum of child sizes actually found.
        computed: u64,
    },
}

/// Full validation pass: framing, content-addressing, child presence, and
/// (for file/collection nodes) the declared-size invariant.
///
/// `has_child` and `child_size` are re-queried live by the caller (backed by
/// the ownership ledger) rather than trusted from the blob itself, because
/// presence can change between requests (§5 — no cross-store read-your-writes
/// guarantee).
///
/// # Errors
///
/// See [`ValidateError`]. [`ValidateError::MissingChildren`] is the one
/// "planned failure" variant callers are expected to surface to clients as
/// a retryable `missing_nodes` response rather than a hard error.
pub fn validate<HasChild, ChildSize>(
    bytes: &[u8],
    expected_key: BlobKey,
    limits: &NodeLimits,
    has_child: HasChild,
    child_size: ChildSize,
) -> Result<Node, ValidateError>
where
    HasChild: Fn(&BlobKey) -> bool,
    ChildSize: Fn(&BlobKey) -> Option<u64>,
{
    let node = decode(bytes, limits)?;

    let computed = awp_cas::blob_key(bytes);
    if computed != expected_key {
        return Err(ValidateError::HashMismatch {
            expected: expected_key,
            computed,
        });
    }

    let children = node.children();
    let missing: Vec<BlobKey> = children.iter().copied().filter(|c| !has_child(c)).collect();
    if !missing.is_empty() {
        return Err(ValidateError::MissingChildren(missing));
    }

    if matches!(node, Node::File { .. } | Node::Collection { .. }) {
        let sum: u64 = children.iter().filter_map(|c| child_size(c)).sum();
        let declared = node.declared_size();
        if sum != declared {
            return Err(ValidateError::SizeMismatch {
                declared,
                computed: sum,
            });
        }
    }

    Ok(node)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn key(byte: u8) -> BlobKey {
        BlobKey::from_digest([byte; 32])
    }

    #[test]
    fn chunk_round_trips() {
        let node = Node::Chunk {
            payload: b"hello".to_vec(),
        };
        let bytes = encode(&node);
        let decoded = decode(&bytes, &NodeLimits::default()).expect("decode");
        assert_eq!(decoded, node);
    }

    #[test]
    fn inline_file_round_trips() {
        let node = Node::InlineFile {
            payload: b"<png bytes>".to_vec(),
            mime: "image/png".to_owned(),
        };
        let bytes = encode(&node);
        let decoded = decode(&bytes, &NodeLimits::default()).expect("decode");
        assert_eq!(decoded, node);
    }

    #[test]
    fn file_round_trips_with_children() {
        let node = Node::File {
            children: vec![key(1), key(2)],
            mime: "application/octet-stream".to_owned(),
            declared_size: 10,
        };
        let bytes = encode(&node);
        let decoded = decode(&bytes, &NodeLimits::default()).expect("decode");
        assert_eq!(decoded, node);
        assert_eq!(decoded.children(), vec![key(1), key(2)]);
    }

    #[test]
    fn collection_round_trips_with_named_entries() {
        let node = Node::Collection {
            entries: vec![("a.txt".to_owned(), key(3)), ("b.txt".to_owned(), key(4))],
            declared_size: 20,
        };
        let bytes = encode(&node);
        let decoded = decode(&bytes, &NodeLimits::default()).expect("decode");
        assert_eq!(decoded, node);
    }

    #[test]
    fn quick_validate_rejects_bad_magic() {
        let bytes = vec![0u8; 16];
        assert_eq!(quick_validate(&bytes), Err(MalformedError::BadMagic));
    }

    #[test]
    fn decode_rejects_unknown_kind() {
        let mut bytes = MAGIC.to_vec();
        bytes.push(9);
        assert_eq!(
            decode(&bytes, &NodeLimits::default()),
            Err(MalformedError::UnknownKind(9))
        );
    }

    #[test]
    fn collection_rejects_duplicate_names() {
        let node = Node::Collection {
            entries: vec![("dup".to_owned(), key(1)), ("dup".to_owned(), key(2))],
            declared_size: 0,
        };
        let bytes = encode(&node);
        let err = decode(&bytes, &NodeLimits::default()).expect_err("dup name rejected");
        assert_eq!(err, MalformedError::DuplicateName("dup".to_owned()));
    }

    #[test]
    fn collection_rejects_name_over_limit() {
        let long_name = "x".repeat(10);
        let node = Node::Collection {
            entries: vec![(long_name, key(1))],
            declared_size: 0,
        };
        let bytes = encode(&node);
        let limits = NodeLimits { max_name_bytes: 4 };
        assert!(matches!(
            decode(&bytes, &limits),
            Err(MalformedError::NameTooLong(_))
        ));
    }

    #[test]
    fn decode_rejects_trailing_bytes() {
        let node = Node::Chunk {
            payload: Vec::new(),
        };
        let mut bytes = encode(&node);
        // A chunk has no length-prefixed trailer to overrun, but a
        // collection with zero entries does — build one directly to
        // exercise the trailing-bytes path.
        bytes.clear();
        bytes.extend_from_slice(&MAGIC);
        bytes.push(NodeKind::Collection.tag());
        bytes.extend_from_slice(&0u64.to_be_bytes()); // declared_size
        bytes.extend_from_slice(&0u32.to_be_bytes()); // entry_count
        bytes.push(0xFF); // trailing garbage
        assert_eq!(
            decode(&bytes, &NodeLimits::default()),
            Err(MalformedError::TrailingBytes)
        );
    }

    #[test]
    fn validate_detects_hash_mismatch() {
        let node = Node::Chunk {
            payload: b"abc".to_vec(),
        };
        let bytes = encode(&node);
        let wrong_key = key(0xAB);
        let err = validate(&bytes, wrong_key, &NodeLimits::default(), |_| true, |_| Some(0))
            .expect_err("hash mismatch");
        assert!(matches!(err, ValidateError::HashMismatch { .. }));
    }

    #[test]
    fn validate_reports_all_missing_children() {
        let node = Node::File {
            children: vec![key(1), key(2), key(3)],
            mime: "application/octet-stream".to_owned(),
            declared_size: 0,
        };
        let bytes = encode(&node);
        let expected = awp_cas::blob_key(&bytes);
        let present = key(2);
        let err = validate(
            &bytes,
            expected,
            &NodeLimits::default(),
            |c| *c == present,
            |_| Some(0),
        )
        .expect_err("missing children");
        match err {
            ValidateError::MissingChildren(missing) => {
                assert_eq!(missing, vec![key(1), key(3)]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn validate_checks_declared_size_against_children() {
        let node = Node::Collection {
            entries: vec![("a".to_owned(), key(1)), ("b".to_owned(), key(2))],
            declared_size: 99,
        };
        let bytes = encode(&node);
        let expected = awp_cas::blob_key(&bytes);
        let err = validate(
            &bytes,
            expected,
            &NodeLimits::default(),
            |_| true,
            |_| Some(10),
        )
        .expect_err("size mismatch");
        assert_eq!(
            err,
            ValidateError::SizeMismatch {
                declared: 99,
                computed: 20,
            }
        );
    }

    #[test]
    fn validate_succeeds_on_consistent_collection() {
        let node = Node::Collection {
            entries: vec![("a".to_owned(), key(1)), ("b".to_owned(), key(2))],
            declared_size: 20,
        };
        let bytes = encode(&node);
        let expected = awp_cas::blob_key(&bytes);
        let decoded = validate(
            &bytes,
            expected,
            &NodeLimits::default(),
            |_| true,
            |_| Some(10),
        )
        .expect("valid");
        assert_eq!(decoded, node);
    }
}
