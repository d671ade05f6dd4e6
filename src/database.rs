pub mod validation;

use crate::access::{BPlusTree, Record, RecordPointer, StorageManager, Value};
use crate::catalog::{Attribute, Catalog, TableSchema};
use crate::config::DatabaseConfig;
use crate::storage::buffer::PageBuffer;
use crate::storage::page::{PageId, PAGE_HEADER_SIZE};
use crate::storage::table::Table;
use anyhow::{anyhow, bail, ensure, Context, Result};
use log::{debug, info, warn};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use validation::ConstraintViolation;

/// High-level database interface that integrates all layers
///
/// An open database owns the catalog, the page buffer behind the storage manager, the
/// in-memory page order of every table and, when indexing is enabled, one B+Tree per
/// table. Closing (or dropping) the handle writes every cached page and the catalog.
pub struct Database {
    config: DatabaseConfig,
    catalog: Catalog,
    storage: StorageManager,
    tables: HashMap<String, Table>,
    indexes: HashMap<String, BPlusTree>,
    closed: bool,
}

impl Database {
    /// Open the database in `config.db_dir`, creating it if the directory holds no catalog.
    pub fn open(config: DatabaseConfig) -> Result<Self> {
        fs::create_dir_all(&config.db_dir)
            .with_context(|| format!("Failed to create database directory {:?}", config.db_dir))?;

        let catalog = if Catalog::exists(&config.db_dir) {
            let catalog = Catalog::load(&config.db_dir)?;
            if catalog.page_size() != config.page_size {
                info!(
                    "Using stored page size {} instead of configured {}",
                    catalog.page_size(),
                    config.page_size
                );
            }
            catalog
        } else {
            info!("Creating new database in {:?}", config.db_dir);
            let catalog = Catalog::create(&config.db_dir, config.page_size);
            catalog.save()?;
            catalog
        };

        let buffer = PageBuffer::new(&config.db_dir, catalog.page_size(), config.buffer_size)?;
        let storage = StorageManager::new(buffer);

        let mut tables = HashMap::new();
        for schema in catalog.tables() {
            let table = schema.to_table();
            let file = storage.buffer().table_file(schema.id);
            ensure!(
                file.exists(),
                "Data file {:?} of table {} is missing",
                file.path(),
                schema.name
            );
            let stored = file.read_page_count()? as usize;
            if stored != table.page_count() {
                warn!(
                    "Table {} has {} pages on disk but {} in the catalog",
                    schema.name,
                    stored,
                    table.page_count()
                );
            }
            tables.insert(schema.name.clone(), table);
        }

        let mut db = Self {
            config,
            catalog,
            storage,
            tables,
            indexes: HashMap::new(),
            closed: false,
        };

        if db.config.indexing {
            let names = db.table_names();
            for name in &names {
                db.build_index(name)?;
            }
        }

        info!(
            "Opened database {:?}: page size {}, buffer {} pages, {} tables, indexing {}",
            db.config.db_dir,
            db.page_size(),
            db.config.buffer_size,
            db.tables.len(),
            if db.config.indexing { "on" } else { "off" }
        );
        Ok(db)
    }

    /// Write all cached pages and the catalog.
    pub fn close(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.storage.purge()?;
        for (name, table) in &self.tables {
            self.catalog.set_page_order(name, table.page_ids().to_vec())?;
        }
        self.catalog.save()?;
        self.closed = true;
        info!("Closed database {:?}", self.config.db_dir);
        Ok(())
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Page size in effect, which is the one stored in the catalog.
    pub fn page_size(&self) -> usize {
        self.catalog.page_size()
    }

    pub fn storage(&self) -> &StorageManager {
        &self.storage
    }

    /// Register a table and create its file. Nothing is left behind when the table cannot
    /// be indexed or its file cannot be created.
    pub fn create_table(&mut self, name: &str, attributes: Vec<Attribute>) -> Result<()> {
        let schema = self.catalog.create_table(name, attributes)?.clone();
        if let Err(e) = self.attach_table(&schema) {
            self.catalog.drop_table(name)?;
            return Err(e.context(format!("Failed to create table '{}'", name)));
        }

        info!("Created table {} ({} attributes)", name, schema.attributes.len());
        Ok(())
    }

    fn attach_table(&mut self, schema: &TableSchema) -> Result<()> {
        let tree = if self.config.indexing {
            Some(self.new_index(schema)?)
        } else {
            None
        };
        self.storage
            .buffer()
            .table_file(schema.id)
            .create()
            .with_context(|| format!("Failed to create table file for '{}'", schema.name))?;

        if let Some(tree) = tree {
            self.indexes.insert(schema.name.clone(), tree);
        }
        self.tables.insert(schema.name.clone(), schema.to_table());
        Ok(())
    }

    /// Drop a table: forget its cached pages without writing them, delete its file and
    /// remove it from the catalog.
    pub fn drop_table(&mut self, name: &str) -> Result<()> {
        let schema = self.catalog.drop_table(name)?;
        let evicted = self.storage.remove_table(name);
        self.tables.remove(name);
        self.indexes.remove(name);

        let file = self.storage.buffer().table_file(schema.id);
        if file.exists() {
            file.remove()?;
        }
        info!("Dropped table {} ({} cached pages discarded)", name, evicted);
        Ok(())
    }

    /// Validate and insert a row. Returns where the record is stored.
    pub fn insert(&mut self, name: &str, values: Vec<Value>) -> Result<RecordPointer> {
        let schema = self
            .catalog
            .table(name)
            .ok_or_else(|| anyhow!("Table '{}' does not exist", name))?;
        let table = self
            .tables
            .get_mut(name)
            .ok_or_else(|| anyhow!("Table '{}' is not open", name))?;

        validation::check_row(schema, &values)?;
        let record = Record::new(values);
        let key = table.key().key_of(&record).clone();
        let duplicate = ConstraintViolation::DuplicateKey {
            table: name.to_string(),
            key: key.to_string(),
        };

        let Some(tree) = self.indexes.get_mut(name) else {
            if self.storage.find_by_key(table, &key)?.is_some() {
                return Err(duplicate.into());
            }
            check_unique(&mut self.storage, table, schema, &record)?;
            return Ok(self.storage.insert_record(table, record)?.pointer);
        };

        if tree.search(&key).is_some() {
            return Err(duplicate.into());
        }
        check_unique(&mut self.storage, table, schema, &record)?;

        let pointer = tree.insert(key.clone())?;
        let outcome = match self.storage.insert_using_rp(pointer, record, table) {
            Ok(outcome) => outcome,
            Err(e) => {
                tree.delete(&key);
                return Err(e);
            }
        };

        if !outcome.splits.is_empty() {
            let relocated = self.storage.relocated_keys(table, &outcome.splits)?;
            debug!(
                "Repairing {} index entries of {} after {} splits",
                relocated.len(),
                name,
                outcome.splits.len()
            );
            for (moved_key, moved_to) in relocated {
                if !tree.repair(&moved_key, moved_to) {
                    warn!("Key {} of {} is missing from the index", moved_key, name);
                }
            }
        }
        Ok(outcome.pointer)
    }

    /// Every record of a table in primary-key order.
    pub fn select_all(&mut self, name: &str) -> Result<Vec<Record>> {
        let table = lookup(&self.tables, name)?;
        self.storage.all_records(table)
    }

    /// Delete every record matching `predicate`, returning the deleted records.
    pub fn delete_where<F>(&mut self, name: &str, predicate: F) -> Result<Vec<Record>>
    where
        F: FnMut(&Record) -> bool,
    {
        let table = lookup(&self.tables, name)?;
        let deleted = self.storage.delete_where(table, predicate)?;

        if let Some(tree) = self.indexes.get_mut(name) {
            let key = *table.key();
            for record in &deleted {
                tree.delete(key.key_of(record));
            }
        }
        Ok(deleted)
    }

    /// Delete the record with primary key `key`, if there is one.
    pub fn delete_by_key(&mut self, name: &str, key: &Value) -> Result<Option<Record>> {
        let table = lookup(&self.tables, name)?;

        let pointer = match self.indexes.get_mut(name) {
            Some(tree) => tree.delete(key),
            None => self
                .storage
                .find_by_key(table, key)?
                .map(|(pointer, _)| pointer),
        };
        match pointer {
            Some(pointer) => Ok(Some(self.storage.remove_at(table, pointer)?)),
            None => Ok(None),
        }
    }

    /// Set `column` to `value` on every record matching `predicate` and return how many
    /// records changed.
    ///
    /// Matching records are deleted and reinserted with the new value, so they pass the
    /// same checks as any insert and a record whose primary key changes moves to its new
    /// position. When a reinsert fails, the records reinserted so far are removed, the
    /// originals are put back and the error is returned.
    pub fn update_where<F>(
        &mut self,
        name: &str,
        predicate: F,
        column: &str,
        value: Value,
    ) -> Result<usize>
    where
        F: FnMut(&Record) -> bool,
    {
        let schema = self.schema(name)?;
        let index = schema
            .attribute_index(column)
            .ok_or_else(|| anyhow!("Table '{}' has no attribute '{}'", name, column))?;
        validation::check_value(&schema.attributes[index], &value)?;
        let order = *lookup(&self.tables, name)?.key();

        let originals = self.delete_where(name, predicate)?;
        let mut reinserted = Vec::with_capacity(originals.len());
        for original in &originals {
            let mut values = original.values().to_vec();
            if let Some(slot) = values.get_mut(index) {
                *slot = value.clone();
            }
            let updated = Record::new(values);
            let key = order.key_of(&updated).clone();

            if let Err(e) = self.insert(name, updated.into_values()) {
                warn!(
                    "Update of {} failed at key {}, restoring {} records",
                    name,
                    key,
                    originals.len()
                );
                self.restore_update(name, &reinserted, &originals)?;
                return Err(e.context(format!("Update of table '{}' was rolled back", name)));
            }
            reinserted.push(key);
        }

        debug!("Updated {} records of table {}", originals.len(), name);
        Ok(originals.len())
    }

    fn restore_update(&mut self, name: &str, reinserted: &[Value], originals: &[Record]) -> Result<()> {
        for key in reinserted {
            self.delete_by_key(name, key)?;
        }
        for original in originals {
            self.insert(name, original.values().to_vec())?;
        }
        Ok(())
    }

    /// Look a record up by primary key, through the index when there is one.
    pub fn search(&mut self, name: &str, key: &Value) -> Result<Option<Record>> {
        let table = lookup(&self.tables, name)?;

        match self.indexes.get(name) {
            Some(tree) => match tree.search(key) {
                Some(pointer) => self.storage.record_at(table, pointer),
                None => Ok(None),
            },
            None => Ok(self
                .storage
                .find_by_key(table, key)?
                .map(|(_, record)| record)),
        }
    }

    /// Remove an attribute from a table by rewriting it.
    pub fn alter_drop_column(&mut self, name: &str, attribute: &str) -> Result<()> {
        let schema = self.schema(name)?.clone();
        let index = schema
            .attribute_index(attribute)
            .ok_or_else(|| anyhow!("Table '{}' has no attribute '{}'", name, attribute))?;
        if schema.attributes[index].primary_key {
            bail!("Cannot drop primary key '{}' of table '{}'", attribute, name);
        }

        let table = lookup(&self.tables, name)?;
        let records = self.storage.drop_alter_records(table, index)?;
        let mut attributes = schema.attributes;
        attributes.remove(index);

        self.rewrite_table(name, attributes, records)
    }

    /// Append an attribute to a table, filling existing rows with `default`.
    pub fn alter_add_column(
        &mut self,
        name: &str,
        attribute: Attribute,
        default: Value,
    ) -> Result<()> {
        let schema = self.schema(name)?.clone();
        if schema.attribute_index(&attribute.name).is_some() {
            bail!(
                "Table '{}' already has an attribute '{}'",
                name,
                attribute.name
            );
        }
        if attribute.primary_key {
            bail!("Table '{}' already has a primary key", name);
        }
        validation::check_value(&attribute, &default)?;

        let table = lookup(&self.tables, name)?;
        let records = self.storage.add_alter_records(table, &default)?;
        if attribute.unique && !default.is_null() && records.len() > 1 {
            return Err(ConstraintViolation::DuplicateUnique {
                attribute: attribute.name,
                value: default.to_string(),
            }
            .into());
        }

        let mut attributes = schema.attributes;
        attributes.push(attribute);
        self.rewrite_table(name, attributes, records)
    }

    /// Replace a table with one of a new shape holding `records`.
    fn rewrite_table(
        &mut self,
        name: &str,
        attributes: Vec<Attribute>,
        records: Vec<Record>,
    ) -> Result<()> {
        let budget = self.page_size().saturating_sub(PAGE_HEADER_SIZE);
        if let Some(record) = records.iter().find(|record| record.byte_size() > budget) {
            bail!(
                "Rewritten record of {} bytes does not fit in a {} byte page budget",
                record.byte_size(),
                budget
            );
        }

        let count = records.len();
        self.drop_table(name)?;
        self.create_table(name, attributes)?;
        for record in records {
            self.insert(name, record.into_values())?;
        }
        info!("Rewrote table {} with {} records", name, count);
        Ok(())
    }

    /// Table names in alphabetical order.
    pub fn table_names(&self) -> Vec<String> {
        self.catalog
            .tables()
            .map(|schema| schema.name.clone())
            .collect()
    }

    /// A table's pages in logical order.
    pub fn page_ids(&self, name: &str) -> Option<&[PageId]> {
        self.tables.get(name).map(|table| table.page_ids())
    }

    /// The primary-key index of a table, when indexing is enabled.
    pub fn index(&self, name: &str) -> Option<&BPlusTree> {
        self.indexes.get(name)
    }

    pub fn schema(&self, name: &str) -> Result<&TableSchema> {
        self.catalog
            .table(name)
            .ok_or_else(|| anyhow!("Table '{}' does not exist", name))
    }

    pub fn record_count(&mut self, name: &str) -> Result<usize> {
        let table = lookup(&self.tables, name)?;
        self.storage.record_count(table)
    }

    /// Verify that a table's records are strictly ascending by primary key and, when it is
    /// indexed, that the tree is well formed and every entry points at its record. Returns
    /// the number of records.
    pub fn check_table(&mut self, name: &str) -> Result<usize> {
        let table = lookup(&self.tables, name)?;
        let order = *table.key();

        let mut previous: Option<Value> = None;
        let mut count = 0;
        for item in self.storage.scan(table) {
            let (pointer, record) = item?;
            let key = order.key_of(&record);
            if let Some(previous) = &previous {
                ensure!(
                    order.compare_keys(previous, key) == Ordering::Less,
                    "Table {} is out of order at {} ({})",
                    name,
                    key,
                    pointer
                );
            }
            previous = Some(key.clone());
            count += 1;
        }

        if let Some(tree) = self.indexes.get(name) {
            tree.check_invariants()
                .with_context(|| format!("Index of {} is malformed", name))?;
            ensure!(
                tree.len() == count,
                "Index of {} holds {} keys for {} records",
                name,
                tree.len(),
                count
            );
            for (key, pointer) in tree.iter() {
                let record = self
                    .storage
                    .record_at(table, pointer)?
                    .ok_or_else(|| anyhow!("Key {} of {} points at empty {}", key, name, pointer))?;
                ensure!(
                    order.compare_keys(order.key_of(&record), key) == Ordering::Equal,
                    "Key {} of {} points at the record of {}",
                    key,
                    name,
                    order.key_of(&record)
                );
            }
        }
        Ok(count)
    }

    fn new_index(&self, schema: &TableSchema) -> Result<BPlusTree> {
        let tree = match self.config.index_order {
            Some(order) => BPlusTree::with_order(&schema.name, schema.key_order(), order)?,
            None => BPlusTree::new(&schema.name, schema.key_order(), self.page_size())?,
        };
        Ok(tree)
    }

    /// Index every record of a table from a scan.
    fn build_index(&mut self, name: &str) -> Result<()> {
        let mut tree = self.new_index(self.schema(name)?)?;
        let table = lookup(&self.tables, name)?;
        let order = *table.key();

        for item in self.storage.scan(table) {
            let (pointer, record) = item?;
            tree.insert_entry(order.key_of(&record).clone(), pointer)?;
        }
        debug!(
            "Built index of {}: {} keys, order {}, height {}",
            name,
            tree.len(),
            tree.order(),
            tree.height()
        );
        self.indexes.insert(name.to_string(), tree);
        Ok(())
    }
}

fn lookup<'a>(tables: &'a HashMap<String, Table>, name: &str) -> Result<&'a Table> {
    tables
        .get(name)
        .ok_or_else(|| anyhow!("Table '{}' does not exist", name))
}

/// Reject a record whose value in a unique, non-key attribute is already taken.
///
/// There is no secondary index, so this scans the whole table: every insert into a table
/// with a unique attribute costs a full read of its pages.
fn check_unique(
    storage: &mut StorageManager,
    table: &Table,
    schema: &TableSchema,
    record: &Record,
) -> Result<()> {
    let unique: Vec<(usize, &Attribute)> = schema
        .attributes
        .iter()
        .enumerate()
        .filter(|(index, attr)| {
            attr.unique
                && !attr.primary_key
                && record.get(*index).is_some_and(|value| !value.is_null())
        })
        .collect();
    if unique.is_empty() {
        return Ok(());
    }

    for item in storage.scan(table) {
        let (_, existing) = item?;
        for &(index, attr) in &unique {
            if existing.get(index) == record.get(index) {
                let value = record.get(index).map(Value::to_string).unwrap_or_default();
                return Err(ConstraintViolation::DuplicateUnique {
                    attribute: attr.name.clone(),
                    value,
                }
                .into());
            }
        }
    }
    Ok(())
}

impl Drop for Database {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("Failed to close database {:?}: {:#}", self.config.db_dir, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::DataType;
    use crate::storage::error::StorageError;
    use tempfile::tempdir;

    fn people() -> Vec<Attribute> {
        vec![
            Attribute::new("id", DataType::Integer).primary_key(),
            Attribute::new("name", DataType::Varchar(15)),
        ]
    }

    fn row(id: i32, name: &str) -> Vec<Value> {
        vec![Value::Integer(id), Value::Text(name.to_string())]
    }

    fn keys(records: &[Record]) -> Vec<i32> {
        records
            .iter()
            .filter_map(|record| match record.get(0) {
                Some(Value::Integer(k)) => Some(*k),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_create_insert_select() -> Result<()> {
        let dir = tempdir()?;
        let mut db = Database::open(DatabaseConfig::new(dir.path()).page_size(400))?;
        db.create_table("people", people())?;

        for id in [30, 10, 20] {
            db.insert("people", row(id, "x"))?;
        }
        assert_eq!(keys(&db.select_all("people")?), vec![10, 20, 30]);
        assert_eq!(db.page_ids("people"), Some(&[PageId(0)][..]));
        assert_eq!(db.table_names(), vec!["people".to_string()]);
        assert!(db.index("people").is_none());
        Ok(())
    }

    #[test]
    fn test_insert_rejections() -> Result<()> {
        let dir = tempdir()?;
        let mut db = Database::open(DatabaseConfig::new(dir.path()).indexing(true))?;
        db.create_table(
            "people",
            vec![
                Attribute::new("id", DataType::Integer).primary_key(),
                Attribute::new("email", DataType::Varchar(20)).unique(),
            ],
        )?;

        db.insert("people", row(1, "a@x"))?;

        let err = db.insert("people", row(1, "b@x")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConstraintViolation>(),
            Some(ConstraintViolation::DuplicateKey { .. })
        ));

        let err = db.insert("people", row(2, "a@x")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConstraintViolation>(),
            Some(ConstraintViolation::DuplicateUnique { .. })
        ));

        let err = db
            .insert("people", vec![Value::Null, Value::Text("c@x".into())])
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConstraintViolation>(),
            Some(ConstraintViolation::NullValue(_))
        ));

        assert!(db.insert("missing", row(3, "c@x")).is_err());
        assert_eq!(db.record_count("people")?, 1);
        assert_eq!(db.index("people").map(BPlusTree::len), Some(1));
        Ok(())
    }

    #[test]
    fn test_search_and_delete_by_key() -> Result<()> {
        for indexing in [false, true] {
            let dir = tempdir()?;
            let mut db = Database::open(
                DatabaseConfig::new(dir.path())
                    .page_size(200)
                    .indexing(indexing)
                    .index_order(3),
            )?;
            db.create_table("people", people())?;
            for id in 0..20 {
                db.insert("people", row(id * 2, "name"))?;
            }

            assert_eq!(
                db.search("people", &Value::Integer(14))?,
                Some(Record::new(row(14, "name")))
            );
            assert_eq!(db.search("people", &Value::Integer(15))?, None);

            let removed = db.delete_by_key("people", &Value::Integer(14))?;
            assert_eq!(removed, Some(Record::new(row(14, "name"))));
            assert_eq!(db.delete_by_key("people", &Value::Integer(14))?, None);
            assert_eq!(db.search("people", &Value::Integer(14))?, None);
            assert_eq!(db.check_table("people")?, 19);
        }
        Ok(())
    }

    #[test]
    fn test_delete_where_keeps_index_consistent() -> Result<()> {
        let dir = tempdir()?;
        let mut db = Database::open(
            DatabaseConfig::new(dir.path())
                .page_size(200)
                .indexing(true)
                .index_order(4),
        )?;
        db.create_table("people", people())?;
        for id in 0..30 {
            db.insert("people", row(id, "name"))?;
        }

        let deleted = db.delete_where("people", |record| {
            matches!(record.get(0), Some(Value::Integer(k)) if k % 3 == 0)
        })?;
        assert_eq!(deleted.len(), 10);
        assert_eq!(db.check_table("people")?, 20);

        for id in (0..30).filter(|id| id % 3 != 0) {
            assert_eq!(
                db.search("people", &Value::Integer(id))?,
                Some(Record::new(row(id, "name")))
            );
        }
        Ok(())
    }

    #[test]
    fn test_unindexable_table_is_not_registered() -> Result<()> {
        let dir = tempdir()?;
        let wide_key = || vec![Attribute::new("k", DataType::Char(100)).primary_key()];
        {
            let mut db =
                Database::open(DatabaseConfig::new(dir.path()).page_size(64).indexing(true))?;
            let err = db.create_table("t", wide_key()).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<StorageError>(),
                Some(StorageError::DegenerateOrder { .. })
            ));
            assert!(db.table_names().is_empty());
            assert!(db.index("t").is_none());
            assert!(db.select_all("t").is_err());

            db.create_table("small", vec![Attribute::new("id", DataType::Integer).primary_key()])?;
            db.insert("small", vec![Value::Integer(1)])?;
            db.close()?;
        }

        let mut db = Database::open(DatabaseConfig::new(dir.path()).indexing(true))?;
        assert_eq!(db.table_names(), vec!["small".to_string()]);
        assert_eq!(db.check_table("small")?, 1);
        Ok(())
    }

    #[test]
    fn test_update_where() -> Result<()> {
        for indexing in [false, true] {
            let dir = tempdir()?;
            let mut db = Database::open(
                DatabaseConfig::new(dir.path())
                    .page_size(200)
                    .indexing(indexing)
                    .index_order(3),
            )?;
            db.create_table("people", people())?;
            for id in 1..=12 {
                db.insert("people", row(id, "name"))?;
            }

            let changed = db.update_where(
                "people",
                |record| matches!(record.get(0), Some(Value::Integer(k)) if k % 2 == 0),
                "name",
                Value::Text("even".into()),
            )?;
            assert_eq!(changed, 6);
            assert_eq!(
                db.search("people", &Value::Integer(4))?,
                Some(Record::new(row(4, "even")))
            );

            // A new primary key moves the record to the end of the table
            let changed = db.update_where(
                "people",
                |record| record.get(0) == Some(&Value::Integer(3)),
                "id",
                Value::Integer(100),
            )?;
            assert_eq!(changed, 1);
            assert_eq!(db.search("people", &Value::Integer(3))?, None);
            assert_eq!(
                db.search("people", &Value::Integer(100))?,
                Some(Record::new(row(100, "name")))
            );
            let scanned = keys(&db.select_all("people")?);
            assert_eq!(scanned.last(), Some(&100));
            assert_eq!(db.check_table("people")?, 12);

            assert!(db
                .update_where("people", |_| true, "missing", Value::Null)
                .is_err());
            assert!(db
                .update_where("people", |_| true, "name", Value::Integer(1))
                .is_err());
        }
        Ok(())
    }

    #[test]
    fn test_update_where_rolls_back_on_duplicate_key() -> Result<()> {
        for indexing in [false, true] {
            let dir = tempdir()?;
            let mut db = Database::open(DatabaseConfig::new(dir.path()).indexing(indexing))?;
            db.create_table("people", people())?;
            for (id, name) in [(1, "a"), (2, "b"), (3, "c")] {
                db.insert("people", row(id, name))?;
            }
            let before = db.select_all("people")?;

            // Both matching records would get key 10
            let err = db
                .update_where(
                    "people",
                    |record| matches!(record.get(0), Some(Value::Integer(k)) if *k >= 2),
                    "id",
                    Value::Integer(10),
                )
                .unwrap_err();
            assert!(matches!(
                err.downcast_ref::<ConstraintViolation>(),
                Some(ConstraintViolation::DuplicateKey { .. })
            ));

            assert_eq!(db.select_all("people")?, before);
            assert_eq!(db.search("people", &Value::Integer(10))?, None);
            assert_eq!(db.check_table("people")?, 3);
        }
        Ok(())
    }

    #[test]
    fn test_drop_table_removes_file() -> Result<()> {
        let dir = tempdir()?;
        let mut db = Database::open(DatabaseConfig::new(dir.path()))?;
        db.create_table("people", people())?;
        db.insert("people", row(1, "a"))?;

        let file = dir.path().join(db.schema("people")?.id.to_string());
        assert!(file.exists());

        db.drop_table("people")?;
        assert!(!file.exists());
        assert!(db.table_names().is_empty());
        assert!(db.select_all("people").is_err());
        assert!(db.drop_table("people").is_err());
        Ok(())
    }

    #[test]
    fn test_alter_columns() -> Result<()> {
        let dir = tempdir()?;
        let mut db = Database::open(DatabaseConfig::new(dir.path()).indexing(true))?;
        db.create_table("people", people())?;
        db.insert("people", row(2, "b"))?;
        db.insert("people", row(1, "a"))?;

        db.alter_add_column(
            "people",
            Attribute::new("age", DataType::Integer),
            Value::Integer(30),
        )?;
        assert_eq!(
            db.select_all("people")?,
            vec![
                Record::new(vec![Value::Integer(1), Value::Text("a".into()), Value::Integer(30)]),
                Record::new(vec![Value::Integer(2), Value::Text("b".into()), Value::Integer(30)]),
            ]
        );

        // Wrong default type, duplicate name, primary key
        assert!(db
            .alter_add_column("people", Attribute::new("x", DataType::Integer), Value::Boolean(true))
            .is_err());
        assert!(db
            .alter_add_column("people", Attribute::new("age", DataType::Double), Value::Null)
            .is_err());
        assert!(db.alter_drop_column("people", "id").is_err());

        db.alter_drop_column("people", "name")?;
        assert_eq!(db.schema("people")?.attributes.len(), 2);
        assert_eq!(
            db.search("people", &Value::Integer(2))?,
            Some(Record::new(vec![Value::Integer(2), Value::Integer(30)]))
        );
        assert_eq!(db.check_table("people")?, 2);
        Ok(())
    }

    #[test]
    fn test_reopen_keeps_stored_page_size() -> Result<()> {
        let dir = tempdir()?;
        {
            let mut db = Database::open(DatabaseConfig::new(dir.path()).page_size(400))?;
            db.create_table("people", people())?;
            db.insert("people", row(1, "a"))?;
            db.close()?;
        }

        let mut db = Database::open(DatabaseConfig::new(dir.path()).page_size(1024))?;
        assert_eq!(db.page_size(), 400);
        assert_eq!(db.select_all("people")?, vec![Record::new(row(1, "a"))]);
        Ok(())
    }
}
