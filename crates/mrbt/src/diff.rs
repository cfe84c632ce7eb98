// Copyright (c) Kanari Network
// SPDX-License-Identifier: Apache-2.0

//! Change sets: the symmetric difference of two trees.
//!
//! [`MerkleRedBlackTree::change_set`] walks both trees with synchronised
//! key-ordered cursors and uses the digest pairs to skip subtrees that are
//! provably identical, so trees differing in k places cost O(k log n)
//! instead of O(n + m). Soundness of the pruning rests on the collision
//! resistance of the hash primitive, and both trees must have been built
//! with the same primitive. [`MerkleRedBlackTree::change_set_merge`] is the
//! exhaustive O(n + m) fallback that uses digests only to detect value
//! changes at shared keys.

use crate::hash::NodeDigest;
use crate::node::{NodeId, Side, TreeKey};
use crate::tree::MerkleRedBlackTree;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Which tree contributes a change-set entry. `Source` is the receiver of
/// the call, `Destination` the argument.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum ChangeSide {
    Source,
    Destination,
}

/// One entry of the symmetric difference: the `(key, value)` pair present
/// on `side` but not on the other (a key with differing values contributes
/// one entry per side).
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ChangeRecord<V> {
    pub side: ChangeSide,
    pub key: i128,
    pub value: V,
}

/// Key-ordered cursor over the internal nodes of a tree. Advancing moves to
/// the internal node of the next key; advancing with `skip` climbs past the
/// current node's right subtree instead, dropping every key in it.
struct Cursor<'a, V: Value> {
    tree: &'a MerkleRedBlackTree<V>,
    focus: Option<NodeId>,
}

impl<'a, V: Value> Cursor<'a, V> {
    fn start(tree: &'a MerkleRedBlackTree<V>) -> Self {
        let leftmost = leftmost_leaf(tree);
        Self {
            tree,
            focus: tree.pool[leftmost].parent,
        }
    }

    fn key(&self) -> TreeKey {
        self.tree.pool[self.focus.expect("cursor already exhausted")].key
    }

    fn leaf(&self) -> NodeId {
        self.tree.pool[self.focus.expect("cursor already exhausted")]
            .shortcut
            .expect("internal node missing shortcut")
    }

    fn leaf_digest(&self) -> &NodeDigest {
        &self.tree.pool[self.leaf()].digest
    }

    /// Right component of the current node's digest pair, authenticating
    /// its whole right subtree.
    fn right_digest(&self) -> &bytes::Bytes {
        &self.tree.pool[self.focus.expect("cursor already exhausted")]
            .digest
            .1
    }

    fn record(&self, side: ChangeSide) -> ChangeRecord<V> {
        let leaf = &self.tree.pool[self.leaf()];
        ChangeRecord {
            side,
            key: leaf.key.finite().expect("sentinel reached through a shortcut"),
            value: leaf
                .value
                .as_ref()
                .expect("leaf missing value")
                .origin()
                .clone(),
        }
    }

    fn advance(&mut self, skip: bool) {
        let Some(mut id) = self.focus else {
            return;
        };
        if skip {
            while self.tree.pool.side_of(id) == Some(Side::Right) {
                id = self.tree.pool[id].parent.expect("right child missing parent");
            }
            self.focus = self.tree.pool[id].parent;
        } else {
            let next_leaf = self.tree.pool[self.leaf()]
                .next
                .expect("leaf missing successor");
            // The sentinel has no shortcut; reaching it exhausts the cursor.
            self.focus = self.tree.pool[next_leaf].shortcut;
        }
    }
}

fn leftmost_leaf<V: Value>(tree: &MerkleRedBlackTree<V>) -> NodeId {
    let mut focus = tree.root;
    while let Some(left) = tree.pool[focus].left {
        focus = left;
    }
    focus
}

impl<V: Value> MerkleRedBlackTree<V> {
    /// The symmetric difference with `other`, pruned by digest comparison.
    ///
    /// When both cursors sit on the same key and the right components of
    /// their digest pairs agree, both right subtrees are provably equal and
    /// are skipped wholesale. A shared key whose leaf digests differ
    /// contributes one record per side. Both trees must use the same hash
    /// primitive; collision-prone primitives can produce false matches, in
    /// which case [`Self::change_set_merge`] is the safe fallback.
    pub fn change_set(&self, other: &Self) -> Vec<ChangeRecord<V>> {
        let mut records = Vec::new();
        let mut source = Cursor::start(self);
        let mut destination = Cursor::start(other);
        let mut pruned = 0usize;

        loop {
            match (source.focus, destination.focus) {
                (None, None) => break,
                (Some(_), None) => {
                    records.push(source.record(ChangeSide::Source));
                    source.advance(false);
                }
                (None, Some(_)) => {
                    records.push(destination.record(ChangeSide::Destination));
                    destination.advance(false);
                }
                (Some(_), Some(_)) => {
                    if source.key() < destination.key() {
                        records.push(source.record(ChangeSide::Source));
                        source.advance(false);
                    } else if destination.key() < source.key() {
                        records.push(destination.record(ChangeSide::Destination));
                        destination.advance(false);
                    } else {
                        if source.leaf_digest() != destination.leaf_digest() {
                            records.push(source.record(ChangeSide::Source));
                            records.push(destination.record(ChangeSide::Destination));
                        }
                        let cut = source.right_digest() == destination.right_digest();
                        if cut {
                            pruned += 1;
                        }
                        source.advance(cut);
                        destination.advance(cut);
                    }
                }
            }
        }

        debug!(
            "change_set: {} records, {} equal subtree pairs pruned",
            records.len(),
            pruned
        );
        records
    }

    /// The symmetric difference with `other` by exhaustive merge over the
    /// two leaf lists. Always O(n + m); digests are used only to detect a
    /// value change at a shared key.
    pub fn change_set_merge(&self, other: &Self) -> Vec<ChangeRecord<V>> {
        let mut records = Vec::new();
        let mut source = LeafWalk::start(self);
        let mut destination = LeafWalk::start(other);

        loop {
            match (source.focus, destination.focus) {
                (None, None) => break,
                (Some(_), None) => {
                    records.push(source.record(ChangeSide::Source));
                    source.advance();
                }
                (None, Some(_)) => {
                    records.push(destination.record(ChangeSide::Destination));
                    destination.advance();
                }
                (Some(src), Some(dst)) => {
                    let src_key = self.pool[src].key;
                    let dst_key = other.pool[dst].key;
                    if src_key < dst_key {
                        records.push(source.record(ChangeSide::Source));
                        source.advance();
                    } else if dst_key < src_key {
                        records.push(destination.record(ChangeSide::Destination));
                        destination.advance();
                    } else if self.pool[src].digest != other.pool[dst].digest {
                        // Emit the destination now; the source side of the
                        // changed key follows on the next pass.
                        records.push(destination.record(ChangeSide::Destination));
                        destination.advance();
                    } else {
                        source.advance();
                        destination.advance();
                    }
                }
            }
        }
        records
    }
}

/// Plain walk over the finite leaves of a tree in key order.
struct LeafWalk<'a, V: Value> {
    tree: &'a MerkleRedBlackTree<V>,
    focus: Option<NodeId>,
}

impl<'a, V: Value> LeafWalk<'a, V> {
    fn start(tree: &'a MerkleRedBlackTree<V>) -> Self {
        let leftmost = leftmost_leaf(tree);
        let focus = if tree.pool[leftmost].is_sentinel() {
            None
        } else {
            Some(leftmost)
        };
        Self { tree, focus }
    }

    fn record(&self, side: ChangeSide) -> ChangeRecord<V> {
        let leaf = &self.tree.pool[self.focus.expect("walk already exhausted")];
        ChangeRecord {
            side,
            key: leaf.key.finite().expect("sentinel yielded by leaf walk"),
            value: leaf
                .value
                .as_ref()
                .expect("leaf missing value")
                .origin()
                .clone(),
        }
    }

    fn advance(&mut self) {
        let Some(id) = self.focus else {
            return;
        };
        let next = self.tree.pool[id].next.expect("leaf missing successor");
        self.focus = if self.tree.pool[next].is_sentinel() {
            None
        } else {
            Some(next)
        };
    }
}
