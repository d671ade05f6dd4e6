use crate::access::record::Record;
use crate::access::value::{DataType, KeyComparator, Value};
use std::cmp::Ordering;
use std::fmt;

const NULL_KEY: &Value = &Value::Null;

/// The primary-key ordering of a table.
///
/// Unindexed record placement and B+Tree separator comparisons both go through this type,
/// so the physical order of records always agrees with the logical key order.
#[derive(Clone, Copy)]
pub struct KeyOrder {
    index: usize,
    data_type: DataType,
    compare: KeyComparator,
}

impl KeyOrder {
    pub fn new(index: usize, data_type: DataType) -> Self {
        Self {
            index,
            data_type,
            compare: data_type.key_comparator(),
        }
    }

    /// Position of the primary-key attribute within a record.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn compare_keys(&self, a: &Value, b: &Value) -> Ordering {
        (self.compare)(a, b)
    }

    /// The record's primary-key value. A short record has a null key.
    pub fn key_of<'a>(&self, record: &'a Record) -> &'a Value {
        record.get(self.index).unwrap_or(NULL_KEY)
    }

    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        self.compare_keys(self.key_of(a), self.key_of(b))
    }

    /// True when `a` must sort at or before `b`.
    pub fn precedes_or_equals(&self, a: &Record, b: &Record) -> bool {
        self.compare(a, b) != Ordering::Greater
    }
}

impl fmt::Debug for KeyOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyOrder")
            .field("index", &self.index)
            .field("data_type", &self.data_type)
            .finish()
    }
}

impl PartialEq for KeyOrder {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.data_type == other.data_type
    }
}
