//! Table metadata: attributes, primary keys and each table's page order.
//!
//! The catalog is kept in memory while a database is open and written to the `catalog`
//! file of the database directory with `bincode` when it closes.

pub mod attribute;
pub mod table_info;

pub use attribute::Attribute;
pub use table_info::{TableId, TableSchema};

use crate::storage::page::PageId;
use anyhow::{bail, Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

pub const CATALOG_FILE: &str = "catalog";

/// On-disk form of the catalog.
#[derive(Debug, Serialize, Deserialize)]
struct CatalogImage {
    page_size: u32,
    next_table_id: u32,
    tables: Vec<TableSchema>,
}

#[derive(Debug)]
pub struct Catalog {
    path: PathBuf,
    page_size: usize,
    next_table_id: u32,
    tables: BTreeMap<String, TableSchema>,
}

impl Catalog {
    /// A new, empty catalog for a database directory.
    pub fn create(db_dir: &Path, page_size: usize) -> Self {
        Self {
            path: db_dir.join(CATALOG_FILE),
            page_size,
            next_table_id: 0,
            tables: BTreeMap::new(),
        }
    }

    pub fn exists(db_dir: &Path) -> bool {
        db_dir.join(CATALOG_FILE).exists()
    }

    pub fn load(db_dir: &Path) -> Result<Self> {
        let path = db_dir.join(CATALOG_FILE);
        let data = fs::read(&path).with_context(|| format!("Failed to read catalog: {:?}", path))?;
        let image: CatalogImage = bincode::deserialize(&data)
            .with_context(|| format!("Failed to decode catalog: {:?}", path))?;

        let tables = image
            .tables
            .into_iter()
            .map(|schema| (schema.name.clone(), schema))
            .collect();
        Ok(Self {
            path,
            page_size: image.page_size as usize,
            next_table_id: image.next_table_id,
            tables,
        })
    }

    pub fn save(&self) -> Result<()> {
        let image = CatalogImage {
            page_size: self.page_size as u32,
            next_table_id: self.next_table_id,
            tables: self.tables.values().cloned().collect(),
        };
        let data = bincode::serialize(&image).context("Failed to encode catalog")?;
        fs::write(&self.path, data)
            .with_context(|| format!("Failed to write catalog: {:?}", self.path))?;
        debug!("Saved catalog with {} tables", self.tables.len());
        Ok(())
    }

    /// Page size the database was created with.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Register a table. Exactly one attribute must be the primary key and attribute names
    /// must be distinct.
    pub fn create_table(&mut self, name: &str, attributes: Vec<Attribute>) -> Result<&TableSchema> {
        if self.tables.contains_key(name) {
            bail!("Table '{}' already exists", name);
        }
        if attributes.is_empty() {
            bail!("Table '{}' needs at least one attribute", name);
        }
        let primary_keys = attributes.iter().filter(|attr| attr.primary_key).count();
        if primary_keys != 1 {
            bail!(
                "Table '{}' must have exactly one primary key, found {}",
                name,
                primary_keys
            );
        }
        let mut seen = HashSet::new();
        for attr in &attributes {
            if !seen.insert(attr.name.as_str()) {
                bail!("Duplicate attribute '{}' in table '{}'", attr.name, name);
            }
        }

        let id = TableId(self.next_table_id);
        self.next_table_id += 1;
        let schema = TableSchema::new(id, name, attributes);
        debug!("Registered table {} with id {}", name, id);
        Ok(self.tables.entry(name.to_string()).or_insert(schema))
    }

    pub fn drop_table(&mut self, name: &str) -> Result<TableSchema> {
        match self.tables.remove(name) {
            Some(schema) => Ok(schema),
            None => bail!("Table '{}' does not exist", name),
        }
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    /// Tables ordered by name.
    pub fn tables(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.values()
    }

    pub fn set_page_order(&mut self, name: &str, page_order: Vec<PageId>) -> Result<()> {
        match self.tables.get_mut(name) {
            Some(schema) => {
                schema.page_order = page_order;
                Ok(())
            }
            None => bail!("Table '{}' does not exist", name),
        }
    }
}
