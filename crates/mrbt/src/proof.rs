// Copyright (c) Kanari Network
// SPDX-License-Identifier: Apache-2.0

//! Verification objects.
//!
//! A [`VerificationObject`] is the ordered list of digest pairs along the
//! search path of a key, from the leaf to the root inclusive. Against a
//! trusted root digest it proves that the `(key, value)` pair the leaf
//! digest commits to is part of the tree state that digest summarises.

use crate::hash::{DEFAULT_HASHER, Hasher, NodeDigest};
use serde::{Deserialize, Serialize};

/// Ordered digest-pair path from a leaf to the root, both inclusive.
///
/// The object is an independent value: it references no live tree nodes and
/// stays valid (as evidence about the digest it was produced under) after
/// the source tree mutates.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct VerificationObject {
    path: Vec<NodeDigest>,
}

impl VerificationObject {
    pub(crate) fn new(path: Vec<NodeDigest>) -> Self {
        Self { path }
    }

    /// The digest pairs, leaf first, root last.
    pub fn path(&self) -> &[NodeDigest] {
        &self.path
    }

    /// The root digest this object claims to chain up to.
    pub fn root(&self) -> Option<&NodeDigest> {
        self.path.last()
    }

    pub fn len(&self) -> usize {
        self.path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }
}

/// Checks a verification object against a trusted root digest using the
/// default sha256 primitive. See [`verify_with_hasher`].
pub fn verify(trusted_digest: &NodeDigest, vo: &VerificationObject) -> bool {
    verify_with_hasher(trusted_digest, vo, &DEFAULT_HASHER)
}

/// Checks a verification object against a trusted root digest.
///
/// Succeeds iff the last entry equals the trusted digest and every entry
/// hashes into one of the two components of its successor. Membership in
/// the pair rather than equality to a fixed side keeps the verifier
/// agnostic to whether each step descended left or right, at the cost of
/// one extra comparison per level. Malformed objects (including the empty
/// path) verify as `false`; this function never fails.
pub fn verify_with_hasher(
    trusted_digest: &NodeDigest,
    vo: &VerificationObject,
    hasher: &Hasher,
) -> bool {
    match vo.root() {
        Some(root) if root == trusted_digest => {}
        _ => return false,
    }
    vo.path.windows(2).all(|step| {
        let rolled = hasher.digest(&step[0].0, &step[0].1);
        rolled == step[1].0 || rolled == step[1].1
    })
}
