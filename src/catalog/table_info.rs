//! Table information and metadata structures.

use crate::access::{DataType, KeyOrder};
use crate::catalog::attribute::Attribute;
use crate::storage::page::PageId;
use crate::storage::table::Table;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableId(pub u32);

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persisted description of a table: its attributes and its page order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub id: TableId,
    pub name: String,
    pub attributes: Vec<Attribute>,
    /// The table's logical page order as of the last shutdown.
    pub page_order: Vec<PageId>,
}

impl TableSchema {
    pub fn new(id: TableId, name: impl Into<String>, attributes: Vec<Attribute>) -> Self {
        Self {
            id,
            name: name.into(),
            attributes,
            page_order: Vec::new(),
        }
    }

    pub fn primary_key_index(&self) -> Option<usize> {
        self.attributes.iter().position(|attr| attr.primary_key)
    }

    pub fn attribute_index(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|attr| attr.name == name)
    }

    /// Column types in record order.
    pub fn layout(&self) -> Vec<DataType> {
        self.attributes.iter().map(|attr| attr.data_type).collect()
    }

    /// Ordering by the primary key; the first attribute stands in when none is marked.
    pub fn key_order(&self) -> KeyOrder {
        let index = self.primary_key_index().unwrap_or(0);
        let data_type = self
            .attributes
            .get(index)
            .map(|attr| attr.data_type)
            .unwrap_or(DataType::Integer);
        KeyOrder::new(index, data_type)
    }

    /// The storage-layer view of this table, starting from the persisted page order.
    pub fn to_table(&self) -> Table {
        Table::new(
            self.id,
            self.name.clone(),
            self.layout(),
            self.key_order(),
            self.page_order.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> TableSchema {
        TableSchema::new(
            TableId(3),
            "students",
            vec![
                Attribute::new("name", DataType::Varchar(20)),
                Attribute::new("id", DataType::Integer).primary_key(),
                Attribute::new("gpa", DataType::Double),
            ],
        )
    }

    #[test]
    fn test_primary_key_lookup() {
        let schema = schema();
        assert_eq!(schema.primary_key_index(), Some(1));
        assert_eq!(schema.attribute_index("gpa"), Some(2));
        assert_eq!(schema.attribute_index("missing"), None);
        assert_eq!(schema.key_order(), KeyOrder::new(1, DataType::Integer));
    }

    #[test]
    fn test_to_table_keeps_page_order() {
        let mut schema = schema();
        schema.page_order = vec![PageId(0), PageId(2), PageId(1)];

        let table = schema.to_table();
        assert_eq!(table.id(), TableId(3));
        assert_eq!(table.name(), "students");
        assert_eq!(table.page_ids(), &[PageId(0), PageId(2), PageId(1)]);
        assert_eq!(
            table.layout(),
            &[DataType::Varchar(20), DataType::Integer, DataType::Double]
        );
    }
}
