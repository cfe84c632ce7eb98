// Copyright (c) Kanari Network
// SPDX-License-Identifier: Apache-2.0

//! The Merkle red-black tree itself.
//!
//! An authenticated ordered map keyed by signed integers. Data lives only in
//! the `Nil` leaves; every internal node is a routing node augmented with a
//! digest pair over its children. Leaves are threaded into a doubly linked
//! list in key order, and every internal node keeps a shortcut to the unique
//! leaf carrying its key. The following hold after every public operation:
//!
//! 1. binary-search ordering with `≤` going left, so the leaf for a key sits
//!    in the left subtree of the internal node carrying that key;
//! 2. every internal node has exactly two children, every leaf has none, and
//!    a `+∞` sentinel leaf terminates the right spine;
//! 3. the red-black balance rules;
//! 4. subtree weights (leaf count, sentinel excluded) for order statistics;
//! 5. the leaf list is sorted and ends at the sentinel;
//! 6. the shortcut bijection between internal nodes and leaves;
//! 7. every stored digest equals its recomputation under [`crate::hash`].
//!
//! Mutations funnel through [`Self::locate`], adjust linkage, run the
//! red-black fix-up, and finish with a maintenance sweep that refreshes
//! weight and digest from the deepest affected node up to the root.

use crate::hash::{ABSENT_VALUE_BYTES, Hasher, NodeDigest, encode_key};
use crate::iterator::Iter;
use crate::node::{Color, Node, NodeId, NodePool, TreeKey};
use crate::proof::VerificationObject;
use crate::value::{Value, ValueObject};
use anyhow::Result;
use more_asserts::debug_assert_lt;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

/// Merkle red-black tree: an authenticated map from `i128` keys to values.
///
/// The tree owns all of its nodes. It is not internally synchronised;
/// callers sharing one across threads must serialise access externally.
#[derive(Clone, Debug)]
pub struct MerkleRedBlackTree<V: Value> {
    pub(crate) pool: NodePool<V>,
    pub(crate) root: NodeId,
    hasher: Hasher,
}

impl<V: Value> MerkleRedBlackTree<V> {
    /// An empty tree using the default sha256 primitive.
    pub fn new() -> Self {
        Self::with_hasher(Hasher::default())
    }

    /// An empty tree using the given hash primitive.
    pub fn with_hasher(hasher: Hasher) -> Self {
        let mut pool = NodePool::new();
        let root = pool.alloc(Node::new_sentinel());
        let mut tree = Self { pool, root, hasher };
        tree.refresh(root);
        tree
    }

    /// Builds a tree by inserting the pairs in iteration order.
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (i128, V)>,
    {
        let mut tree = Self::new();
        for (key, value) in pairs {
            tree.insert(key, value)?;
        }
        Ok(tree)
    }

    /// Builds a tree from an unordered mapping. The root digest depends only
    /// on the final contents, so this agrees with [`Self::from_pairs`] over
    /// the same pairs.
    pub fn from_map(map: HashMap<i128, V>) -> Result<Self> {
        Self::from_pairs(map)
    }

    /// Number of stored keys.
    pub fn size(&self) -> usize {
        self.pool[self.root].weight
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Root digest pair, the authenticator of the whole tree.
    pub fn digest(&self) -> &NodeDigest {
        &self.pool[self.root].digest
    }

    pub fn hasher(&self) -> &Hasher {
        &self.hasher
    }

    pub fn contains(&self, key: i128) -> bool {
        self.locate(key).0
    }

    /// Value stored under `key`, if any.
    pub fn get(&self, key: i128) -> Option<&V> {
        let (found, node) = self.locate(key);
        if !found {
            return None;
        }
        let leaf = self.pool[node].shortcut.expect("internal node missing shortcut");
        self.pool[leaf].value.as_ref().map(|value| value.origin())
    }

    /// Value stored under `key` together with its verification object: the
    /// digest pairs along the path from the leaf to the root, inclusive.
    pub fn get_authenticated(&self, key: i128) -> Option<(V, VerificationObject)> {
        let (found, node) = self.locate(key);
        if !found {
            return None;
        }
        let leaf = self.pool[node].shortcut.expect("internal node missing shortcut");
        let value = self.pool[leaf]
            .value
            .as_ref()
            .expect("leaf missing value")
            .origin()
            .clone();
        let mut path = Vec::new();
        let mut focus = Some(leaf);
        while let Some(id) = focus {
            path.push(self.pool[id].digest.clone());
            focus = self.pool[id].parent;
        }
        Some((value, VerificationObject::new(path)))
    }

    /// Inserts `key` with `value`. No-op if the key is already present.
    pub fn insert(&mut self, key: i128, value: V) -> Result<()> {
        let (found, focus) = self.locate(key);
        if found {
            return Ok(());
        }
        let value = ValueObject::from_origin(value)?;

        // `focus` is the terminal leaf the new key attaches at. The fresh
        // internal node takes its place, with the new leaf on the left and
        // the old leaf on the right.
        let focus_parent = self.pool[focus].parent;
        let focus_side = self.pool.side_of(focus);
        let focus_prev = self.pool[focus].prev;

        let leaf = self.pool.alloc(Node::new_leaf(key, value));
        let node = self.pool.alloc(Node::new_internal(key));
        {
            let n = &mut self.pool[node];
            n.parent = focus_parent;
            n.left = Some(leaf);
            n.right = Some(focus);
            n.shortcut = Some(leaf);
        }
        {
            let l = &mut self.pool[leaf];
            l.parent = Some(node);
            l.shortcut = Some(node);
            l.prev = focus_prev;
            l.next = Some(focus);
        }
        self.pool[focus].prev = Some(leaf);
        self.pool[focus].parent = Some(node);
        if let Some(prev) = focus_prev {
            self.pool[prev].next = Some(leaf);
        }
        match (focus_parent, focus_side) {
            (Some(parent), Some(side)) => self.pool[parent].set_child(side, Some(node)),
            _ => self.root = node,
        }

        self.insert_fix(node);
        Ok(())
    }

    /// Deletes `key`, reporting whether it was present.
    pub fn delete(&mut self, key: i128) -> bool {
        let (found, matched) = self.locate(key);
        if !found {
            return false;
        }
        let leaf = self.pool[matched]
            .shortcut
            .expect("internal node missing shortcut");
        let parent = self.pool[leaf].parent.expect("leaf missing parent");

        // Unlink the leaf from the leaf list. A finite leaf always has a
        // successor, the sentinel at worst.
        let prev = self.pool[leaf].prev;
        let next = self.pool[leaf].next.expect("leaf missing successor");
        if let Some(prev) = prev {
            self.pool[prev].next = Some(next);
        }
        self.pool[next].prev = prev;

        // The matched node inherits its leaf's parent's key and shortcut
        // target; the matched node may sit anywhere above that parent.
        let parent_key = self.pool[parent].key;
        let parent_shortcut = self.pool[parent].shortcut;
        self.pool[matched].key = parent_key;
        self.pool[matched].shortcut = parent_shortcut;
        if let Some(target) = parent_shortcut {
            self.pool[target].shortcut = Some(matched);
        }

        let sibling = self.pool.sibling(leaf).expect("leaf missing sibling");
        let double_black = self.pool[parent].color != Color::Red
            && self.pool[sibling].color != Color::Red;

        // Transplant the sibling into the parent's slot.
        let grandparent = self.pool[parent].parent;
        let parent_side = self.pool.side_of(parent);
        match (grandparent, parent_side) {
            (Some(g), Some(side)) => self.pool[g].set_child(side, Some(sibling)),
            _ => self.root = sibling,
        }
        self.pool[sibling].parent = grandparent;
        if self.pool[sibling].color == Color::Red {
            self.pool[sibling].color = Color::Black;
        }

        self.pool.release(leaf);
        self.pool.release(parent);
        self.delete_fix(sibling, double_black);
        true
    }

    /// Updates the value stored under `key`. No-op returning `Ok(false)` if
    /// the key is absent; use [`Self::upsert`] for insert-on-miss.
    pub fn set(&mut self, key: i128, value: V) -> Result<bool> {
        let (found, node) = self.locate(key);
        if !found {
            return Ok(false);
        }
        self.replace_value(node, value)?;
        Ok(true)
    }

    /// Updates the value stored under `key`, inserting it if absent.
    pub fn upsert(&mut self, key: i128, value: V) -> Result<()> {
        let (found, node) = self.locate(key);
        if found {
            self.replace_value(node, value)
        } else {
            self.insert(key, value)
        }
    }

    /// Element at position `index` in ascending key order. Negative indices
    /// count from the end; out-of-range indices return `None`.
    pub fn k_order(&self, index: isize) -> Option<(i128, &V)> {
        let size = self.size() as isize;
        if index >= size || index < -size {
            return None;
        }
        let mut remaining = if index < 0 {
            (index + size) as usize
        } else {
            index as usize
        };
        let mut focus = self.root;
        while self.pool[focus].is_internal() {
            debug_assert_lt!(remaining, self.pool[focus].weight);
            let left = self.pool[focus].left.expect("internal node missing left child");
            let left_weight = self.pool[left].weight;
            if remaining < left_weight {
                focus = left;
            } else {
                remaining -= left_weight;
                focus = self.pool[focus].right.expect("internal node missing right child");
            }
        }
        let leaf = &self.pool[focus];
        let key = leaf.key.finite().expect("order statistic landed on the sentinel");
        leaf.value.as_ref().map(|value| (key, value.origin()))
    }

    /// In-order iteration over `(key, value)` pairs via the leaf list.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter::new(self)
    }

    /// Binary descent by key: `k ≤ node.key` goes left, `k > node.key` goes
    /// right. Returns the matching internal node when the key exists,
    /// otherwise the terminal leaf a new key would attach at.
    pub(crate) fn locate(&self, key: i128) -> (bool, NodeId) {
        let key = TreeKey::Finite(key);
        let mut focus = self.root;
        loop {
            let node = &self.pool[focus];
            if !node.is_internal() {
                return (false, focus);
            }
            match key.cmp(&node.key) {
                Ordering::Equal => return (true, focus),
                Ordering::Less => focus = node.left.expect("internal node missing left child"),
                Ordering::Greater => {
                    focus = node.right.expect("internal node missing right child")
                }
            }
        }
    }

    fn replace_value(&mut self, node: NodeId, value: V) -> Result<()> {
        let leaf = self.pool[node]
            .shortcut
            .expect("internal node missing shortcut");
        self.pool[leaf].value = Some(ValueObject::from_origin(value)?);
        self.refresh_to_root(leaf);
        Ok(())
    }

    /// Recomputed weight and digest of a node, from its current children.
    pub(crate) fn compute(&self, id: NodeId) -> (usize, NodeDigest) {
        let node = &self.pool[id];
        match node.color {
            Color::Red | Color::Black => {
                let left = &self.pool[node.left.expect("internal node missing left child")];
                let right = &self.pool[node.right.expect("internal node missing right child")];
                (
                    left.weight + right.weight,
                    NodeDigest(
                        self.hasher.digest(&left.digest.0, &left.digest.1),
                        self.hasher.digest(&right.digest.0, &right.digest.1),
                    ),
                )
            }
            Color::Nil => match node.key {
                TreeKey::Finite(key) => {
                    let value = node.value.as_ref().expect("leaf missing value");
                    (
                        node.weight,
                        NodeDigest(
                            self.hasher.digest(value.raw(), &[]),
                            self.hasher.digest(&encode_key(key), &[]),
                        ),
                    )
                }
                TreeKey::Sup => (
                    0,
                    NodeDigest(
                        self.hasher.digest(ABSENT_VALUE_BYTES, &[]),
                        self.hasher.digest(&[], &[]),
                    ),
                ),
            },
        }
    }

    fn refresh(&mut self, id: NodeId) {
        let (weight, digest) = self.compute(id);
        let node = &mut self.pool[id];
        node.weight = weight;
        node.digest = digest;
    }

    /// Maintenance sweep: refresh weight and digest from `focus` up to and
    /// including the root.
    fn refresh_to_root(&mut self, mut focus: NodeId) {
        loop {
            self.refresh(focus);
            match self.pool[focus].parent {
                Some(parent) => focus = parent,
                None => break,
            }
        }
    }

    /// Single rotation pivoting `node` above its parent. Restores digests of
    /// nodes leaving the sweep path via the callers; ordering, weights, the
    /// leaf list and shortcuts are untouched by construction.
    fn rotate(&mut self, node: NodeId) {
        let side = self.pool.side_of(node).expect("cannot rotate the root");
        let parent = self.pool[node].parent.expect("cannot rotate the root");
        let subtree = if self.pool[node].is_internal() {
            self.pool[node].child(side.opposite())
        } else {
            None
        };

        let grandparent = self.pool[parent].parent;
        let parent_side = self.pool.side_of(parent);
        match (grandparent, parent_side) {
            (Some(g), Some(ps)) => self.pool[g].set_child(ps, Some(node)),
            _ => self.root = node,
        }
        self.pool[node].parent = grandparent;

        self.pool[node].set_child(side.opposite(), Some(parent));
        self.pool[parent].parent = Some(node);
        self.pool[parent].set_child(side, subtree);
        if let Some(subtree) = subtree {
            self.pool[subtree].parent = Some(parent);
        }
    }

    /// Red-black insert fix-up starting at the freshly spliced internal
    /// node. Digests of nodes that leave the ascent path are refreshed
    /// before each move; the final sweep covers the rest.
    fn insert_fix(&mut self, start: NodeId) {
        let leaf = self.pool[start].left.expect("internal node missing left child");
        self.refresh(leaf);

        let mut focus = start;
        loop {
            let Some(parent) = self.pool[focus].parent else {
                break;
            };
            if self.pool[parent].color != Color::Red {
                break;
            }
            let Some(grandparent) = self.pool[parent].parent else {
                // Red parent is the root; repainting it black ends the fix.
                self.pool[parent].color = Color::Black;
                continue;
            };
            let uncle = self.pool.sibling(parent).expect("grandparent missing a child");
            if self.pool[uncle].color == Color::Red {
                self.pool[parent].color = Color::Black;
                self.pool[uncle].color = Color::Black;
                self.pool[grandparent].color = Color::Red;
                self.refresh(focus);
                self.refresh(parent);
                focus = grandparent;
                continue;
            }
            if self.pool.side_of(focus) != self.pool.side_of(parent) {
                // Inner case: rotate onto the outer side and retry there.
                self.rotate(focus);
                focus = parent;
                continue;
            }
            // Outer case: the grandparent rotation terminates the fix.
            self.refresh(focus);
            self.rotate(parent);
            self.pool[parent].color = Color::Black;
            self.pool[grandparent].color = Color::Red;
            focus = grandparent;
        }

        if self.pool[self.root].color == Color::Red {
            self.pool[self.root].color = Color::Black;
        }
        self.refresh_to_root(focus);
    }

    /// Red-black delete fix-up at the transplanted sibling, carrying the
    /// double-black deficit until a case discharges it.
    fn delete_fix(&mut self, focus: NodeId, double_black: bool) {
        let mut focus = focus;
        let mut double_black = double_black;
        while double_black {
            let Some(parent) = self.pool[focus].parent else {
                // The deficit reached the root and vanishes.
                break;
            };
            let side = self.pool.side_of(focus).expect("child missing parent slot");
            let sibling = self.pool.sibling(focus).expect("parent missing a child");

            if self.pool[sibling].color == Color::Red {
                self.rotate(sibling);
                self.pool[sibling].color = Color::Black;
                self.pool[parent].color = Color::Red;
                continue;
            }
            // A double-black node's sibling subtree carries one extra black
            // level, so the sibling is an internal black node here.
            debug_assert_eq!(self.pool[sibling].color, Color::Black);
            let inner = self.pool[sibling]
                .child(side)
                .expect("internal node missing a child");
            let outer = self.pool[sibling]
                .child(side.opposite())
                .expect("internal node missing a child");
            let inner_red = self.pool[inner].color == Color::Red;
            let outer_red = self.pool[outer].color == Color::Red;

            if !inner_red && !outer_red {
                if self.pool[parent].color == Color::Black {
                    // Both black: push the deficit one level up.
                    self.pool[sibling].color = Color::Red;
                    self.refresh(focus);
                    focus = parent;
                } else {
                    // Red parent absorbs the deficit.
                    self.pool[parent].color = Color::Black;
                    self.pool[sibling].color = Color::Red;
                    double_black = false;
                }
                continue;
            }
            if outer_red {
                // Outer red child discharges the deficit with one rotation.
                self.rotate(sibling);
                self.pool[sibling].color = self.pool[parent].color;
                self.pool[parent].color = Color::Black;
                self.pool[outer].color = Color::Black;
                double_black = false;
                continue;
            }
            // Inner red child: pre-rotate it above the sibling, turning this
            // into the outer case on the next pass.
            self.rotate(inner);
            self.pool[inner].color = Color::Black;
            self.pool[sibling].color = Color::Red;
            self.refresh(sibling);
            self.refresh(inner);
        }
        self.refresh_to_root(focus);
    }

    fn fmt_node(&self, f: &mut fmt::Formatter<'_>, id: NodeId, indent: &str) -> fmt::Result {
        let node = &self.pool[id];
        let (open, close) = if node.is_internal() {
            ('(', ')')
        } else {
            ('[', ']')
        };
        let tag = match node.color {
            Color::Red => 'R',
            Color::Black => 'B',
            Color::Nil => 'N',
        };
        writeln!(
            f,
            "{} ⎣{}{}{} {}",
            &indent[..indent.len() - 2],
            open,
            tag,
            close,
            node.key
        )?;
        if node.is_internal() {
            let right = node.right.expect("internal node missing right child");
            let left = node.left.expect("internal node missing left child");
            self.fmt_node(f, right, &format!("{} |", indent))?;
            self.fmt_node(f, left, &format!("{}  ", indent))?;
        }
        Ok(())
    }
}

impl<V: Value> Default for MerkleRedBlackTree<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Probabilistic equality: two trees compare equal iff their root digests
/// are equal, which under a collision-resistant primitive means equal
/// contents.
impl<V: Value> PartialEq for MerkleRedBlackTree<V> {
    fn eq(&self, other: &Self) -> bool {
        self.digest() == other.digest()
    }
}

impl<'a, V: Value> IntoIterator for &'a MerkleRedBlackTree<V> {
    type Item = (i128, &'a V);
    type IntoIter = Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// One line per node (2n + 1 lines for n keys, sentinel included), right
/// subtree printed above the left.
impl<V: Value> fmt::Display for MerkleRedBlackTree<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_node(f, self.root, "  ")
    }
}
