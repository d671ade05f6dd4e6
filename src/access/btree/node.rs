//! B+Tree nodes and the arena that owns them.
//!
//! Parent, child and sibling links are `NodeId` handles into the arena, so restructuring
//! moves handles around instead of references.

use crate::access::record::RecordPointer;
use crate::access::value::Value;
use std::fmt;
use std::ops::{Index, IndexMut};

/// Handle of a node in a `NodeArena`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub enum NodeBody {
    /// `pointers[i]` locates the record whose key is `keys[i]`.
    Leaf {
        pointers: Vec<RecordPointer>,
        next: Option<NodeId>,
    },
    /// `children[i]` holds keys below `keys[i]`; the last child holds the rest.
    Internal { children: Vec<NodeId> },
}

#[derive(Debug, Clone)]
pub struct Node {
    pub keys: Vec<Value>,
    pub parent: Option<NodeId>,
    pub body: NodeBody,
}

impl Node {
    pub fn leaf() -> Self {
        Self {
            keys: Vec::new(),
            parent: None,
            body: NodeBody::Leaf {
                pointers: Vec::new(),
                next: None,
            },
        }
    }

    pub fn internal(keys: Vec<Value>, children: Vec<NodeId>) -> Self {
        Self {
            keys,
            parent: None,
            body: NodeBody::Internal { children },
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.body, NodeBody::Leaf { .. })
    }

    /// Children of an internal node; empty for a leaf.
    pub fn children(&self) -> &[NodeId] {
        match &self.body {
            NodeBody::Internal { children } => children,
            NodeBody::Leaf { .. } => &[],
        }
    }

    /// Pointers of a leaf; empty for an internal node.
    pub fn pointers(&self) -> &[RecordPointer] {
        match &self.body {
            NodeBody::Leaf { pointers, .. } => pointers,
            NodeBody::Internal { .. } => &[],
        }
    }

    /// Sibling to the right, for leaves.
    pub fn next(&self) -> Option<NodeId> {
        match &self.body {
            NodeBody::Leaf { next, .. } => *next,
            NodeBody::Internal { .. } => None,
        }
    }

    pub fn child_position(&self, child: NodeId) -> Option<usize> {
        self.children().iter().position(|&c| c == child)
    }

    /// Remove a leaf's last key and pointer.
    pub fn pop_entry(&mut self) -> Option<(Value, RecordPointer)> {
        match &mut self.body {
            NodeBody::Leaf { pointers, .. } if !self.keys.is_empty() => {
                Some((self.keys.pop()?, pointers.pop()?))
            }
            _ => None,
        }
    }

    /// Remove a leaf's first key and pointer.
    pub fn shift_entry(&mut self) -> Option<(Value, RecordPointer)> {
        match &mut self.body {
            NodeBody::Leaf { pointers, .. } if !self.keys.is_empty() && !pointers.is_empty() => {
                Some((self.keys.remove(0), pointers.remove(0)))
            }
            _ => None,
        }
    }

    /// Remove an internal node's last key and last child.
    pub fn pop_child(&mut self) -> Option<(Value, NodeId)> {
        match &mut self.body {
            NodeBody::Internal { children } if !self.keys.is_empty() => {
                Some((self.keys.pop()?, children.pop()?))
            }
            _ => None,
        }
    }

    /// Remove an internal node's first key and first child.
    pub fn shift_child(&mut self) -> Option<(Value, NodeId)> {
        match &mut self.body {
            NodeBody::Internal { children } if !self.keys.is_empty() && !children.is_empty() => {
                Some((self.keys.remove(0), children.remove(0)))
            }
            _ => None,
        }
    }
}

/// Owner of every node of one tree. Freed slots are reused by later allocations.
#[derive(Debug, Default)]
pub struct NodeArena {
    nodes: Vec<Node>,
    free: Vec<NodeId>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id.0] = node;
                id
            }
            None => {
                self.nodes.push(node);
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    /// Release a node and return its contents. The handle must not be used afterwards.
    pub fn release(&mut self, id: NodeId) -> Node {
        self.free.push(id);
        std::mem::replace(&mut self.nodes[id.0], Node::leaf())
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Index<NodeId> for NodeArena {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }
}

impl IndexMut<NodeId> for NodeArena {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_reuses_released_slots() {
        let mut arena = NodeArena::new();
        let a = arena.alloc(Node::leaf());
        let b = arena.alloc(Node::internal(vec![Value::Integer(1)], vec![a, a]));
        assert_eq!(arena.len(), 2);
        assert!(!arena[b].is_leaf());

        let released = arena.release(b);
        assert_eq!(released.keys, vec![Value::Integer(1)]);
        assert_eq!(arena.len(), 1);

        let c = arena.alloc(Node::leaf());
        assert_eq!(c, b);
        assert!(arena[c].is_leaf());
    }

    #[test]
    fn test_accessors_by_kind() {
        let mut arena = NodeArena::new();
        let left = arena.alloc(Node::leaf());
        let right = arena.alloc(Node::leaf());
        let root = arena.alloc(Node::internal(vec![Value::Integer(5)], vec![left, right]));

        assert_eq!(arena[root].child_position(right), Some(1));
        assert!(arena[root].pointers().is_empty());
        assert!(arena[left].children().is_empty());
        assert_eq!(arena[left].next(), None);
    }
}
