// Copyright (c) Kanari Network
// SPDX-License-Identifier: Apache-2.0

//! Digest engine of the Merkle red-black tree.
//!
//! Every node carries a [`NodeDigest`], a pair of byte strings. For an
//! internal node the pair is computed from the digests of its two children;
//! for a leaf it is computed from the encoded value and the encoded key. The
//! root pair is the externally observable authenticator of the whole tree.
//!
//! The two-argument primitive `H(lhs, rhs) = hash(lhs ‖ rhs)` is selected at
//! tree construction via [`HashKind`] or supplied as a custom closure via
//! [`Hasher::custom`]. The output width follows the selected algorithm, so
//! digest components are plain byte strings rather than a fixed-width hash
//! type.

use blake2::{Blake2b512, Blake2s256};
use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use std::fmt;
use std::sync::Arc;

/// The canonical encoding of an absent value, hashed into the first digest
/// component of the `+∞` sentinel leaf (the bcs encoding of `None`).
pub(crate) const ABSENT_VALUE_BYTES: &[u8] = &[0x00];

/// Width of the digest encoding of a key, in bytes. Keys are `i128` natively
/// but are always encoded big-endian sign-extended to this width.
pub(crate) const KEY_ENCODING_LEN: usize = 32;

/// The hasher used by [`crate::verify`] and by trees built with
/// [`crate::MerkleRedBlackTree::new`].
pub(crate) static DEFAULT_HASHER: Lazy<Hasher> = Lazy::new(Hasher::default);

type HashFn = Arc<dyn Fn(&[u8], &[u8]) -> Vec<u8> + Send + Sync>;

/// Hash algorithms recognised at tree construction.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum HashKind {
    Sha1,
    Sha224,
    #[default]
    Sha256,
    Sha384,
    Sha512,
    Blake2b,
    Blake2s,
    Blake3,
}

impl HashKind {
    /// Resolves a configuration name. Unrecognised names fall back to
    /// [`HashKind::Sha256`].
    pub fn from_name(name: &str) -> Self {
        match name {
            "sha1" => HashKind::Sha1,
            "sha224" => HashKind::Sha224,
            "sha256" => HashKind::Sha256,
            "sha384" => HashKind::Sha384,
            "sha512" => HashKind::Sha512,
            "blake2b" => HashKind::Blake2b,
            "blake2s" => HashKind::Blake2s,
            "blake3" => HashKind::Blake3,
            _ => HashKind::Sha256,
        }
    }
}

fn hash_concat<D: Digest>(lhs: &[u8], rhs: &[u8]) -> Vec<u8> {
    let mut hasher = D::new();
    hasher.update(lhs);
    hasher.update(rhs);
    hasher.finalize().to_vec()
}

fn blake3_concat(lhs: &[u8], rhs: &[u8]) -> Vec<u8> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(lhs);
    hasher.update(rhs);
    hasher.finalize().as_bytes().to_vec()
}

/// The two-argument hash primitive `H: (bytes, bytes) -> bytes`.
///
/// Deterministic and fixed-width for every built-in [`HashKind`]; custom
/// primitives must uphold the same contract for verification and diffing to
/// stay sound.
#[derive(Clone)]
pub struct Hasher {
    kind: Option<HashKind>,
    func: HashFn,
}

impl Hasher {
    pub fn new(kind: HashKind) -> Self {
        let func: HashFn = match kind {
            HashKind::Sha1 => Arc::new(hash_concat::<Sha1>),
            HashKind::Sha224 => Arc::new(hash_concat::<Sha224>),
            HashKind::Sha256 => Arc::new(hash_concat::<Sha256>),
            HashKind::Sha384 => Arc::new(hash_concat::<Sha384>),
            HashKind::Sha512 => Arc::new(hash_concat::<Sha512>),
            HashKind::Blake2b => Arc::new(hash_concat::<Blake2b512>),
            HashKind::Blake2s => Arc::new(hash_concat::<Blake2s256>),
            HashKind::Blake3 => Arc::new(blake3_concat),
        };
        Self {
            kind: Some(kind),
            func,
        }
    }

    /// Resolves a configuration name, falling back to sha256 for unknown
    /// names.
    pub fn by_name(name: &str) -> Self {
        Self::new(HashKind::from_name(name))
    }

    /// Wraps a caller-supplied dual-argument hash function.
    pub fn custom<F>(func: F) -> Self
    where
        F: Fn(&[u8], &[u8]) -> Vec<u8> + Send + Sync + 'static,
    {
        Self {
            kind: None,
            func: Arc::new(func),
        }
    }

    /// The built-in algorithm backing this hasher, `None` for custom
    /// primitives.
    pub fn kind(&self) -> Option<HashKind> {
        self.kind
    }

    pub fn digest(&self, lhs: &[u8], rhs: &[u8]) -> Bytes {
        Bytes::from((self.func)(lhs, rhs))
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new(HashKind::Sha256)
    }
}

impl fmt::Debug for Hasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            Some(kind) => write!(f, "Hasher({:?})", kind),
            None => write!(f, "Hasher(custom)"),
        }
    }
}

/// The digest pair `(d_left, d_right)` stored at every node.
///
/// For internal nodes the components authenticate the left and right child
/// subtrees respectively; for leaves they authenticate the value and the key.
#[derive(Clone, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct NodeDigest(pub Bytes, pub Bytes);

impl fmt::Debug for NodeDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NodeDigest(0x{}, 0x{})",
            hex::encode(&self.0),
            hex::encode(&self.1)
        )
    }
}

/// Fixed-width big-endian signed encoding of a key, sign-extended to
/// [`KEY_ENCODING_LEN`] bytes so that digests agree with a full 256-bit
/// implementation.
pub(crate) fn encode_key(key: i128) -> [u8; KEY_ENCODING_LEN] {
    let fill = if key < 0 { 0xff } else { 0x00 };
    let mut buf = [fill; KEY_ENCODING_LEN];
    BigEndian::write_i128(&mut buf[16..], key);
    buf
}
