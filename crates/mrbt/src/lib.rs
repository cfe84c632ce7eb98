// Copyright (c) Kanari Network
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
//! This crate implements [`MerkleRedBlackTree`], an authenticated ordered
//! map: a dictionary keyed by signed integers whose every state is
//! summarised by a single root digest pair, and which can produce a compact
//! [`VerificationObject`] proving that a `(key, value)` pair is consistent
//! with that digest. The intended setting is an untrusted party storing the
//! data on behalf of a trusted party that retains only the digest.
//!
//! The structure is a red-black tree with Merkle augmentation. Data lives
//! only in the leaves; every internal node carries a digest pair over its
//! children and a subtree weight for order statistics; leaves are threaded
//! into a doubly linked list in key order for O(1) iteration steps; and a
//! bidirectional shortcut ties each internal node to the unique leaf
//! carrying its key. A `+∞` sentinel leaf anchors the right spine so that
//! every internal node always has two children.
//!
//! ```
//! use mrbt::{MerkleRedBlackTree, verify};
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut tree = MerkleRedBlackTree::new();
//! tree.insert(1, "one".to_string())?;
//! tree.insert(2, "two".to_string())?;
//!
//! let (value, vo) = tree.get_authenticated(2).expect("key present");
//! assert_eq!(value, "two");
//! assert!(verify(tree.digest(), &vo));
//! # Ok(())
//! # }
//! ```
//!
//! Trees built with different insertion histories but the same final
//! contents have equal root digests, so `==` compares trees in O(1), and
//! [`MerkleRedBlackTree::change_set`] uses subtree digests to compute the
//! symmetric difference of two trees in O(k log n) for k pointwise
//! differences.
//!
//! The tree is an in-memory, single-threaded structure: operations are
//! synchronous, there is no internal locking, and callers sharing a tree
//! across threads must serialise access externally.

mod diff;
mod hash;
mod iterator;
mod node;
mod proof;
mod tree;
mod value;

#[cfg(test)]
mod test_helper;

#[cfg(test)]
mod diff_test;

pub use diff::{ChangeRecord, ChangeSide};
pub use hash::{HashKind, Hasher, NodeDigest};
pub use iterator::Iter;
pub use proof::{VerificationObject, verify, verify_with_hasher};
pub use tree::MerkleRedBlackTree;
pub use value::Value;
