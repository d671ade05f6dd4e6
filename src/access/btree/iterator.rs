use crate::access::btree::node::{NodeArena, NodeId};
use crate::access::record::RecordPointer;
use crate::access::value::Value;

/// In-order walk over the leaf level, following sibling links.
pub struct BTreeIterator<'a> {
    arena: &'a NodeArena,
    leaf: Option<NodeId>,
    index: usize,
}

impl<'a> BTreeIterator<'a> {
    pub(crate) fn new(arena: &'a NodeArena, first_leaf: NodeId) -> Self {
        Self {
            arena,
            leaf: Some(first_leaf),
            index: 0,
        }
    }
}

impl<'a> Iterator for BTreeIterator<'a> {
    type Item = (&'a Value, RecordPointer);

    fn next(&mut self) -> Option<Self::Item> {
        let arena = self.arena;
        while let Some(id) = self.leaf {
            let node = &arena[id];
            if let (Some(key), Some(&pointer)) =
                (node.keys.get(self.index), node.pointers().get(self.index))
            {
                self.index += 1;
                return Some((key, pointer));
            }
            self.leaf = node.next();
            self.index = 0;
        }
        None
    }
}
