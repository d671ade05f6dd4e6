//! B+Tree primary-key index.
//!
//! The tree maps primary-key values to the (slot, page) location of their record and
//! mirrors physical placement: inserting a key computes the slot its record must take,
//! right after the record of the next smaller key, and shifts the slots of the records
//! that follow it on the same page. Deleting a key shifts them back.
//!
//! Nodes live in a [`NodeArena`]. With order `N`, every node holds at most `N - 1` keys;
//! non-root leaves hold at least `ceil((N - 1) / 2)` keys and non-root internal nodes at
//! least `ceil(N / 2)` children.

pub mod iterator;
pub mod node;

use self::iterator::BTreeIterator;
use self::node::{Node, NodeArena, NodeBody, NodeId};
use crate::access::key::KeyOrder;
use crate::access::record::RecordPointer;
use crate::access::value::{DataType, Value};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::PageId;
use anyhow::ensure;
use log::debug;
use std::cmp::Ordering;

/// Smallest order for which split, merge and borrow are always possible.
pub const MIN_ORDER: usize = 3;

/// Fan-out of a tree whose nodes are sized like a page: each entry costs a 4 byte
/// reference plus the key.
pub fn compute_order(page_size: usize, key_type: DataType) -> usize {
    (page_size / (4 + key_type.key_width())).saturating_sub(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotShift {
    Up,
    Down,
}

#[derive(Debug)]
pub struct BPlusTree {
    name: String,
    key_order: KeyOrder,
    order: usize,
    root: NodeId,
    arena: NodeArena,
    len: usize,
}

impl BPlusTree {
    /// Create an empty tree with the order derived from the page size and key type.
    pub fn new(
        name: impl Into<String>,
        key_order: KeyOrder,
        page_size: usize,
    ) -> StorageResult<Self> {
        let order = compute_order(page_size, key_order.data_type());
        Self::with_order(name, key_order, order)
    }

    /// Create an empty tree with an explicit order.
    pub fn with_order(
        name: impl Into<String>,
        key_order: KeyOrder,
        order: usize,
    ) -> StorageResult<Self> {
        if order < MIN_ORDER {
            return Err(StorageError::DegenerateOrder {
                order,
                minimum: MIN_ORDER,
            });
        }

        let mut arena = NodeArena::new();
        let root = arena.alloc(Node::leaf());
        Ok(Self {
            name: name.into(),
            key_order,
            order,
            root,
            arena,
            len: 0,
        })
    }

    /// Name of the indexed table.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_order(&self) -> &KeyOrder {
        &self.key_order
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Number of indexed keys.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of levels; a lone root leaf is height 1.
    pub fn height(&self) -> usize {
        let mut height = 1;
        let mut node = self.root;
        while let Some(&child) = self.arena[node].children().first() {
            node = child;
            height += 1;
        }
        height
    }

    pub fn node_count(&self) -> usize {
        self.arena.len()
    }

    /// Entries in key order.
    pub fn iter(&self) -> BTreeIterator<'_> {
        BTreeIterator::new(&self.arena, self.leftmost_leaf())
    }

    pub fn search(&self, key: &Value) -> Option<RecordPointer> {
        let (leaf, _) = self.descend(key);
        let index = self.find(leaf, key).ok()?;
        self.arena[leaf].pointers().get(index).copied()
    }

    /// Index `key` and return the location its record must be stored at.
    ///
    /// The record goes right after the record of the greatest smaller key, or at slot 0 of
    /// page 0 when there is none. Entries after it on the same page move down one slot.
    pub fn insert(&mut self, key: Value) -> StorageResult<RecordPointer> {
        let (leaf, left_subtree) = self.descend(&key);
        let index = match self.find(leaf, &key) {
            Ok(_) => return Err(StorageError::DuplicateKey(key.to_string())),
            Err(index) => index,
        };

        let predecessor = if index > 0 {
            self.arena[leaf].pointers().get(index - 1).copied()
        } else {
            left_subtree
                .map(|subtree| self.rightmost_leaf(subtree))
                .and_then(|prev| self.arena[prev].pointers().last().copied())
        };
        let pointer = match predecessor {
            Some(prev) => RecordPointer::new(prev.slot + 1, prev.page_id),
            None => RecordPointer::new(0, PageId(0)),
        };

        self.insert_at(leaf, index, key, pointer);
        self.shift_slots(leaf, index + 1, pointer.page_id, SlotShift::Up);
        self.split_if_full(leaf);
        Ok(pointer)
    }

    /// Index `key` at a known location without touching other entries. Used to rebuild an
    /// index from a table scan.
    pub fn insert_entry(&mut self, key: Value, pointer: RecordPointer) -> StorageResult<()> {
        let (leaf, _) = self.descend(&key);
        let index = match self.find(leaf, &key) {
            Ok(_) => return Err(StorageError::DuplicateKey(key.to_string())),
            Err(index) => index,
        };
        self.insert_at(leaf, index, key, pointer);
        self.split_if_full(leaf);
        Ok(())
    }

    /// Remove `key` and return the location its record had. Entries after it on the same
    /// page move up one slot.
    pub fn delete(&mut self, key: &Value) -> Option<RecordPointer> {
        let (leaf, _) = self.descend(key);
        let index = self.find(leaf, key).ok()?;

        let node = &mut self.arena[leaf];
        let pointer = match &mut node.body {
            NodeBody::Leaf { pointers, .. } => pointers.remove(index),
            NodeBody::Internal { .. } => return None,
        };
        node.keys.remove(index);
        self.len -= 1;

        self.shift_slots(leaf, index, pointer.page_id, SlotShift::Down);
        self.rebalance(leaf);
        Some(pointer)
    }

    /// Point `key` at a new location, after its record moved to another page. Returns
    /// false when the key is not indexed.
    pub fn repair(&mut self, key: &Value, pointer: RecordPointer) -> bool {
        let (leaf, _) = self.descend(key);
        let Ok(index) = self.find(leaf, key) else {
            return false;
        };
        match &mut self.arena[leaf].body {
            NodeBody::Leaf { pointers, .. } => match pointers.get_mut(index) {
                Some(slot) => {
                    *slot = pointer;
                    true
                }
                None => false,
            },
            NodeBody::Internal { .. } => false,
        }
    }

    fn compare(&self, a: &Value, b: &Value) -> Ordering {
        self.key_order.compare_keys(a, b)
    }

    fn max_keys(&self) -> usize {
        self.order - 1
    }

    fn min_leaf_keys(&self) -> usize {
        self.order / 2
    }

    fn min_children(&self) -> usize {
        (self.order + 1) / 2
    }

    /// Leaf responsible for `key`, plus the nearest subtree left of the descent path.
    fn descend(&self, key: &Value) -> (NodeId, Option<NodeId>) {
        let mut node = self.root;
        let mut left_subtree = None;
        loop {
            let current = &self.arena[node];
            match &current.body {
                NodeBody::Leaf { .. } => return (node, left_subtree),
                NodeBody::Internal { children } => {
                    // Keys equal to a separator belong to its right
                    let index = current
                        .keys
                        .partition_point(|sep| self.compare(sep, key) != Ordering::Greater);
                    if index > 0 {
                        left_subtree = Some(children[index - 1]);
                    }
                    node = children[index];
                }
            }
        }
    }

    fn find(&self, leaf: NodeId, key: &Value) -> Result<usize, usize> {
        self.arena[leaf]
            .keys
            .binary_search_by(|probe| self.compare(probe, key))
    }

    fn leftmost_leaf(&self) -> NodeId {
        let mut node = self.root;
        while let Some(&child) = self.arena[node].children().first() {
            node = child;
        }
        node
    }

    fn rightmost_leaf(&self, subtree: NodeId) -> NodeId {
        let mut node = subtree;
        while let Some(&child) = self.arena[node].children().last() {
            node = child;
        }
        node
    }

    fn insert_at(&mut self, leaf: NodeId, index: usize, key: Value, pointer: RecordPointer) {
        let node = &mut self.arena[leaf];
        if let NodeBody::Leaf { pointers, .. } = &mut node.body {
            pointers.insert(index, pointer);
            node.keys.insert(index, key);
            self.len += 1;
        }
    }

    /// Move entries on `page_id` by one slot, starting at `start` in `leaf` and following
    /// sibling links until an entry on another page shows up.
    fn shift_slots(&mut self, leaf: NodeId, start: usize, page_id: PageId, shift: SlotShift) {
        let mut current = Some(leaf);
        let mut start = start;
        while let Some(id) = current {
            let NodeBody::Leaf { pointers, next } = &mut self.arena[id].body else {
                return;
            };
            for pointer in pointers.iter_mut().skip(start) {
                if pointer.page_id != page_id {
                    return;
                }
                pointer.slot = match shift {
                    SlotShift::Up => pointer.slot + 1,
                    SlotShift::Down => pointer.slot.saturating_sub(1),
                };
            }
            current = *next;
            start = 0;
        }
    }

    fn split_if_full(&mut self, node: NodeId) {
        let mut node = node;
        while self.arena[node].keys.len() > self.max_keys() {
            let (separator, right) = self.split_node(node);
            match self.insert_into_parent(node, separator, right) {
                Some(parent) => node = parent,
                None => return,
            }
        }
    }

    /// Move the upper half of `node` into a new right sibling. Returns the separator for
    /// the parent and the new node.
    fn split_node(&mut self, node: NodeId) -> (Value, NodeId) {
        let current = &mut self.arena[node];
        let mid = current.keys.len() / 2;
        let parent = current.parent;

        let (separator, sibling) = match &mut current.body {
            NodeBody::Leaf { pointers, next } => {
                let keys = current.keys.split_off(mid);
                let separator = keys[0].clone();
                let sibling = Node {
                    keys,
                    parent,
                    body: NodeBody::Leaf {
                        pointers: pointers.split_off(mid),
                        next: *next,
                    },
                };
                (separator, sibling)
            }
            NodeBody::Internal { children } => {
                let mut keys = current.keys.split_off(mid);
                let separator = keys.remove(0);
                let mut sibling = Node::internal(keys, children.split_off(mid + 1));
                sibling.parent = parent;
                (separator, sibling)
            }
        };

        let moved_children = sibling.children().to_vec();
        let right = self.arena.alloc(sibling);
        if let NodeBody::Leaf { next, .. } = &mut self.arena[node].body {
            *next = Some(right);
        }
        for child in moved_children {
            self.arena[child].parent = Some(right);
        }
        (separator, right)
    }

    /// Hook `right` into the parent of `left`. Returns the parent when it may now overflow.
    fn insert_into_parent(&mut self, left: NodeId, separator: Value, right: NodeId) -> Option<NodeId> {
        let Some(parent) = self.arena[left].parent else {
            let root = self
                .arena
                .alloc(Node::internal(vec![separator], vec![left, right]));
            self.arena[left].parent = Some(root);
            self.arena[right].parent = Some(root);
            self.root = root;
            debug!("B+Tree {}: root split, height {}", self.name, self.height());
            return None;
        };

        let node = &mut self.arena[parent];
        let index = node.child_position(left)?;
        node.keys.insert(index, separator);
        if let NodeBody::Internal { children } = &mut node.body {
            children.insert(index + 1, right);
        }
        self.arena[right].parent = Some(parent);
        Some(parent)
    }

    fn is_underfull(&self, id: NodeId) -> bool {
        let node = &self.arena[id];
        if node.is_leaf() {
            node.keys.len() < self.min_leaf_keys()
        } else {
            node.children().len() < self.min_children()
        }
    }

    /// Whether `left` and `right` fit in one node. Internal merges also pull down the
    /// separator between them.
    fn fits_merged(&self, left: NodeId, right: NodeId) -> bool {
        let separator = usize::from(!self.arena[left].is_leaf());
        self.arena[left].keys.len() + self.arena[right].keys.len() + separator <= self.max_keys()
    }

    /// Restore minimum occupancy from `node` upwards.
    fn rebalance(&mut self, node: NodeId) {
        let mut node = node;
        loop {
            let Some(parent) = self.arena[node].parent else {
                self.collapse_root();
                return;
            };
            if !self.is_underfull(node) {
                return;
            }
            let Some(index) = self.arena[parent].child_position(node) else {
                return;
            };

            let siblings = self.arena[parent].children();
            let left = index.checked_sub(1).map(|i| siblings[i]);
            let right = siblings.get(index + 1).copied();

            if let Some(left) = left.filter(|&left| self.fits_merged(left, node)) {
                self.merge(left, node, parent, index - 1);
            } else if let Some(right) = right.filter(|&right| self.fits_merged(node, right)) {
                self.merge(node, right, parent, index);
            } else if let Some(left) = left {
                self.borrow_from_left(node, left, parent, index - 1);
                return;
            } else if let Some(right) = right {
                self.borrow_from_right(node, right, parent, index);
                return;
            } else {
                return;
            }
            node = parent;
        }
    }

    /// An internal root left without keys hands the root role to its only child.
    fn collapse_root(&mut self) {
        let root = &self.arena[self.root];
        if root.is_leaf() || !root.keys.is_empty() {
            return;
        }
        let Some(&child) = root.children().first() else {
            return;
        };
        self.arena.release(self.root);
        self.arena[child].parent = None;
        self.root = child;
        debug!("B+Tree {}: root collapsed, height {}", self.name, self.height());
    }

    /// Absorb `right` into `left`; `separator` is the index of the parent key between them.
    fn merge(&mut self, left: NodeId, right: NodeId, parent: NodeId, separator: usize) {
        let parent_node = &mut self.arena[parent];
        let separator_key = parent_node.keys.remove(separator);
        if let NodeBody::Internal { children } = &mut parent_node.body {
            children.remove(separator + 1);
        }

        let donor = self.arena.release(right);
        let moved_children = donor.children().to_vec();
        let target = &mut self.arena[left];
        match (&mut target.body, donor.body) {
            (
                NodeBody::Leaf { pointers, next },
                NodeBody::Leaf {
                    pointers: donor_pointers,
                    next: donor_next,
                },
            ) => {
                target.keys.extend(donor.keys);
                pointers.extend(donor_pointers);
                *next = donor_next;
            }
            (
                NodeBody::Internal { children },
                NodeBody::Internal {
                    children: donor_children,
                },
            ) => {
                target.keys.push(separator_key);
                target.keys.extend(donor.keys);
                children.extend(donor_children);
            }
            // Siblings are always at the same level
            _ => {}
        }

        for child in moved_children {
            self.arena[child].parent = Some(left);
        }
    }

    /// Move the largest entry of `left` into `node`, rotating through the parent.
    fn borrow_from_left(&mut self, node: NodeId, left: NodeId, parent: NodeId, separator: usize) {
        if self.arena[node].is_leaf() {
            let Some((key, pointer)) = self.arena[left].pop_entry() else {
                return;
            };
            let target = &mut self.arena[node];
            if let NodeBody::Leaf { pointers, .. } = &mut target.body {
                pointers.insert(0, pointer);
                target.keys.insert(0, key.clone());
            }
            self.arena[parent].keys[separator] = key;
        } else {
            let Some((key, child)) = self.arena[left].pop_child() else {
                return;
            };
            let separator_key = std::mem::replace(&mut self.arena[parent].keys[separator], key);
            let target = &mut self.arena[node];
            if let NodeBody::Internal { children } = &mut target.body {
                children.insert(0, child);
                target.keys.insert(0, separator_key);
            }
            self.arena[child].parent = Some(node);
        }
    }

    /// Move the smallest entry of `right` into `node`, rotating through the parent.
    fn borrow_from_right(&mut self, node: NodeId, right: NodeId, parent: NodeId, separator: usize) {
        if self.arena[node].is_leaf() {
            let Some((key, pointer)) = self.arena[right].shift_entry() else {
                return;
            };
            let target = &mut self.arena[node];
            if let NodeBody::Leaf { pointers, .. } = &mut target.body {
                pointers.push(pointer);
                target.keys.push(key);
            }
            if let Some(first) = self.arena[right].keys.first().cloned() {
                self.arena[parent].keys[separator] = first;
            }
        } else {
            let Some((key, child)) = self.arena[right].shift_child() else {
                return;
            };
            let separator_key = std::mem::replace(&mut self.arena[parent].keys[separator], key);
            let target = &mut self.arena[node];
            if let NodeBody::Internal { children } = &mut target.body {
                children.push(child);
                target.keys.push(separator_key);
            }
            self.arena[child].parent = Some(node);
        }
    }

    /// Verify ordering, arity, occupancy, parent links, uniform depth and the leaf chain.
    pub fn check_invariants(&self) -> anyhow::Result<()> {
        ensure!(
            self.arena[self.root].parent.is_none(),
            "root {} has a parent",
            self.root
        );

        let mut leaf_depth = None;
        self.check_node(self.root, None, None, 1, &mut leaf_depth)?;

        let mut previous: Option<&Value> = None;
        let mut count = 0;
        for (key, _) in self.iter() {
            if let Some(previous) = previous {
                ensure!(
                    self.compare(previous, key) == Ordering::Less,
                    "leaf chain not ascending at {}",
                    key
                );
            }
            previous = Some(key);
            count += 1;
        }
        ensure!(
            count == self.len,
            "leaf chain holds {} keys, tree counts {}",
            count,
            self.len
        );
        Ok(())
    }

    fn check_node(
        &self,
        id: NodeId,
        lower: Option<&Value>,
        upper: Option<&Value>,
        depth: usize,
        leaf_depth: &mut Option<usize>,
    ) -> anyhow::Result<()> {
        let node = &self.arena[id];
        let is_root = id == self.root;

        ensure!(
            node.keys
                .windows(2)
                .all(|pair| self.compare(&pair[0], &pair[1]) == Ordering::Less),
            "node {} keys are not strictly ascending",
            id
        );
        ensure!(
            node.keys.len() <= self.max_keys(),
            "node {} holds {} keys, order {} allows {}",
            id,
            node.keys.len(),
            self.order,
            self.max_keys()
        );
        for key in &node.keys {
            if let Some(lower) = lower {
                ensure!(
                    self.compare(lower, key) != Ordering::Greater,
                    "key {} of node {} is below its bound {}",
                    key,
                    id,
                    lower
                );
            }
            if let Some(upper) = upper {
                ensure!(
                    self.compare(key, upper) == Ordering::Less,
                    "key {} of node {} is not below its bound {}",
                    key,
                    id,
                    upper
                );
            }
        }

        match &node.body {
            NodeBody::Leaf { pointers, .. } => {
                ensure!(
                    pointers.len() == node.keys.len(),
                    "leaf {} has {} keys and {} pointers",
                    id,
                    node.keys.len(),
                    pointers.len()
                );
                ensure!(
                    is_root || node.keys.len() >= self.min_leaf_keys(),
                    "leaf {} underflows with {} keys",
                    id,
                    node.keys.len()
                );
                match leaf_depth {
                    Some(expected) => ensure!(
                        *expected == depth,
                        "leaf {} at depth {}, other leaves at {}",
                        id,
                        depth,
                        expected
                    ),
                    None => *leaf_depth = Some(depth),
                }
            }
            NodeBody::Internal { children } => {
                ensure!(
                    children.len() == node.keys.len() + 1,
                    "internal node {} has {} keys and {} children",
                    id,
                    node.keys.len(),
                    children.len()
                );
                if is_root {
                    ensure!(!node.keys.is_empty(), "internal root {} has no keys", id);
                } else {
                    ensure!(
                        children.len() >= self.min_children(),
                        "internal node {} underflows with {} children",
                        id,
                        children.len()
                    );
                }
                for (i, &child) in children.iter().enumerate() {
                    ensure!(
                        self.arena[child].parent == Some(id),
                        "child {} does not point back to {}",
                        child,
                        id
                    );
                    let child_lower = if i == 0 { lower } else { node.keys.get(i - 1) };
                    let child_upper = node.keys.get(i).or(upper);
                    self.check_node(child, child_lower, child_upper, depth + 1, leaf_depth)?;
                }
            }
        }
        Ok(())
    }
}
