// Copyright (c) Kanari Network
// SPDX-License-Identifier: Apache-2.0

//! Shared helpers for the test modules: a full structural sweep over a tree
//! checking every invariant the engine promises, and small tree builders.

use crate::node::{Color, NodeId, TreeKey};
use crate::tree::MerkleRedBlackTree;
use crate::value::Value;

/// Walks the whole tree and checks:
///
/// 1. BST properties: key ordering, linkage consistency, every node either
///    a leaf or with two children;
/// 2. red-black properties: black root, constant black depth, no red-red
///    relationship;
/// 3. Merkle properties: every stored digest matches its recomputation;
/// 4. miscellaneous: subtree weights, shortcut bijection, doubly linked
///    leaf list order and linkage, sentinel shape, no leaked pool slots.
///
/// O(n); call it between operations, not on every one of a large batch.
pub(crate) fn consistency_check<V: Value>(tree: &MerkleRedBlackTree<V>) -> Result<(), String> {
    let root = tree.root;
    if tree.pool[root].parent.is_some() {
        return Err("root has a parent".to_string());
    }
    if tree.pool[root].color == Color::Red {
        return Err("root is red".to_string());
    }

    let mut leaves = Vec::new();
    check_node(tree, root, None, None, false, &mut leaves)?;

    let last = *leaves.last().expect("traversal yields at least the sentinel");
    if !tree.pool[last].is_sentinel() {
        return Err("rightmost leaf is not the sentinel".to_string());
    }
    let finite = leaves.len() - 1;
    for &leaf in &leaves[..finite] {
        if tree.pool[leaf].is_sentinel() {
            return Err("sentinel inside the leaf list".to_string());
        }
    }
    for pair in leaves.windows(2) {
        if tree.pool[pair[0]].key >= tree.pool[pair[1]].key {
            return Err("leaf list out of key order".to_string());
        }
        if tree.pool[pair[0]].next != Some(pair[1]) {
            return Err("wrong next link".to_string());
        }
        if tree.pool[pair[1]].prev != Some(pair[0]) {
            return Err("wrong previous link".to_string());
        }
    }
    if tree.pool[leaves[0]].prev.is_some() {
        return Err("first leaf has a predecessor".to_string());
    }
    if tree.size() != finite {
        return Err(format!(
            "root weight {} disagrees with leaf count {}",
            tree.size(),
            finite
        ));
    }
    if tree.pool.len() != 2 * finite + 1 {
        return Err(format!(
            "pool holds {} nodes for {} keys",
            tree.pool.len(),
            finite
        ));
    }
    Ok(())
}

/// Recursive sweep; returns the black depth of the subtree. `lower` is an
/// exclusive bound, `upper` inclusive, matching the `≤`-goes-left search.
fn check_node<V: Value>(
    tree: &MerkleRedBlackTree<V>,
    id: NodeId,
    lower: Option<TreeKey>,
    upper: Option<TreeKey>,
    parent_red: bool,
    leaves: &mut Vec<NodeId>,
) -> Result<usize, String> {
    let node = &tree.pool[id];
    if let Some(lower) = lower {
        if node.key <= lower {
            return Err(format!("key {} violates exclusive lower bound {}", node.key, lower));
        }
    }
    if let Some(upper) = upper {
        if node.key > upper {
            return Err(format!("key {} violates inclusive upper bound {}", node.key, upper));
        }
    }
    let (weight, digest) = tree.compute(id);
    if digest != node.digest {
        return Err(format!("stale digest at key {}", node.key));
    }
    if weight != node.weight {
        return Err(format!(
            "weight {} at key {} should be {}",
            node.weight, node.key, weight
        ));
    }

    match node.color {
        Color::Red | Color::Black => {
            if node.color == Color::Red && parent_red {
                return Err(format!("red-red relationship at key {}", node.key));
            }
            if node.value.is_some() {
                return Err(format!("internal node {} carries a value", node.key));
            }
            let left = node
                .left
                .ok_or_else(|| format!("internal node {} misses its left child", node.key))?;
            let right = node
                .right
                .ok_or_else(|| format!("internal node {} misses its right child", node.key))?;
            if tree.pool[left].parent != Some(id) || tree.pool[right].parent != Some(id) {
                return Err(format!("child of {} does not recognise its parent", node.key));
            }
            let shortcut = node
                .shortcut
                .ok_or_else(|| format!("internal node {} misses its shortcut", node.key))?;
            let leaf = &tree.pool[shortcut];
            if leaf.color != Color::Nil || leaf.key != node.key {
                return Err(format!("shortcut of {} targets the wrong leaf", node.key));
            }
            if leaf.shortcut != Some(id) {
                return Err(format!("invalid back shortcut at key {}", node.key));
            }

            let red = node.color == Color::Red;
            let left_depth = check_node(tree, left, lower, Some(node.key), red, leaves)?;
            let right_depth = check_node(tree, right, Some(node.key), upper, red, leaves)?;
            if left_depth != right_depth {
                return Err(format!("black depth inconsistent below key {}", node.key));
            }
            Ok(left_depth + usize::from(!red))
        }
        Color::Nil => {
            if node.left.is_some() || node.right.is_some() {
                return Err(format!("leaf {} has children", node.key));
            }
            match node.key {
                TreeKey::Sup => {
                    if node.weight != 0 {
                        return Err("sentinel has non-zero weight".to_string());
                    }
                    if node.shortcut.is_some() {
                        return Err("sentinel has a shortcut".to_string());
                    }
                    if node.value.is_some() {
                        return Err("sentinel carries a value".to_string());
                    }
                    if node.next.is_some() {
                        return Err("sentinel has a successor".to_string());
                    }
                }
                TreeKey::Finite(_) => {
                    if node.weight != 1 {
                        return Err(format!("leaf {} has weight {}", node.key, node.weight));
                    }
                    if node.value.is_none() {
                        return Err(format!("leaf {} misses its value", node.key));
                    }
                    let shortcut = node
                        .shortcut
                        .ok_or_else(|| format!("leaf {} misses its shortcut", node.key))?;
                    if tree.pool[shortcut].shortcut != Some(id) {
                        return Err(format!("invalid back shortcut at leaf {}", node.key));
                    }
                }
            }
            leaves.push(id);
            Ok(1)
        }
    }
}

/// A tree over string values derived from the keys.
pub(crate) fn tree_of(keys: &[i128]) -> MerkleRedBlackTree<String> {
    let mut tree = MerkleRedBlackTree::new();
    for &key in keys {
        tree.insert(key, key.to_string()).unwrap();
    }
    tree
}
