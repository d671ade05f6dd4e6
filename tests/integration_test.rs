use anyhow::Result;
use pagedb::access::{DataType, Record, Value};
use pagedb::catalog::Attribute;
use pagedb::config::DatabaseConfig;
use pagedb::database::Database;
use pagedb::storage::page::PageId;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;
use tempfile::tempdir;

/// Integer key plus 15 characters of text: 50 bytes on a page.
fn attributes() -> Vec<Attribute> {
    vec![
        Attribute::new("id", DataType::Integer).primary_key(),
        Attribute::new("payload", DataType::Varchar(15)),
    ]
}

fn row(id: i32) -> Vec<Value> {
    vec![Value::Integer(id), Value::Text("x".repeat(15))]
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
fn test_three_records_fit_one_page() -> Result<()> {
    let dir = tempdir()?;
    let mut db = Database::open(DatabaseConfig::new(dir.path()).page_size(400))?;
    db.create_table("t", attributes())?;

    for id in 1..=3 {
        db.insert("t", row(id))?;
    }
    assert_eq!(Record::new(row(1)).byte_size(), 50);
    assert_eq!(db.page_ids("t"), Some(&[PageId(0)][..]));
    assert_eq!(keys(&db.select_all("t")?), vec![1, 2, 3]);
    Ok(())
}

#[test]
fn test_overflow_splits_into_two_pages() -> Result<()> {
    let dir = tempdir()?;
    let mut db = Database::open(DatabaseConfig::new(dir.path()).page_size(400))?;
    db.create_table("t", attributes())?;

    // Seven records take 350 of 396 bytes, the eighth overflows
    for id in 1..=7 {
        db.insert("t", row(id))?;
    }
    assert_eq!(db.page_ids("t"), Some(&[PageId(0)][..]));

    db.insert("t", row(8))?;
    assert_eq!(db.page_ids("t"), Some(&[PageId(0), PageId(1)][..]));
    assert_eq!(keys(&db.select_all("t")?), (1..=8).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn test_split_in_the_middle_keeps_logical_order() -> Result<()> {
    let dir = tempdir()?;
    let mut db = Database::open(DatabaseConfig::new(dir.path()).page_size(400))?;
    db.create_table("t", attributes())?;

    for id in (0..16).map(|i| i * 10) {
        db.insert("t", row(id))?;
    }
    // Fill the first page again so that it splits into a page spliced in before page 1
    for id in [1, 2, 3, 4] {
        db.insert("t", row(id))?;
    }

    let pages = db.page_ids("t").map(<[PageId]>::to_vec).unwrap_or_default();
    assert_eq!(pages.first(), Some(&PageId(0)));
    assert!(pages.len() >= 3);
    let ids: BTreeSet<PageId> = pages.iter().copied().collect();
    assert_eq!(ids.len(), pages.len());
    assert_eq!(ids.iter().last(), Some(&PageId(pages.len() as u32 - 1)));

    let mut expected: Vec<i32> = (0..16).map(|i| i * 10).chain([1, 2, 3, 4]).collect();
    expected.sort_unstable();
    assert_eq!(keys(&db.select_all("t")?), expected);
    assert_eq!(db.check_table("t")?, 20);
    Ok(())
}

#[test]
fn test_persistence_round_trip() -> Result<()> {
    let dir = tempdir()?;
    let mut rng = StdRng::seed_from_u64(7);
    let mut ids: Vec<i32> = (0..200).collect();
    ids.shuffle(&mut rng);

    let (records, pages) = {
        let mut db = Database::open(
            DatabaseConfig::new(dir.path())
                .page_size(400)
                .buffer_size(4),
        )?;
        db.create_table("t", attributes())?;
        db.create_table(
            "mixed",
            vec![
                Attribute::new("name", DataType::Char(4)).primary_key(),
                Attribute::new("score", DataType::Double),
                Attribute::new("active", DataType::Boolean),
            ],
        )?;
        for &id in &ids {
            db.insert("t", row(id))?;
        }
        db.insert(
            "mixed",
            vec![Value::Text("bbbb".into()), Value::Double(2.5), Value::Null],
        )?;
        db.insert(
            "mixed",
            vec![Value::Text("aaaa".into()), Value::Null, Value::Boolean(true)],
        )?;

        let records = db.select_all("t")?;
        let pages = db.page_ids("t").map(<[PageId]>::to_vec).unwrap_or_default();
        db.close()?;
        (records, pages)
    };
    assert_eq!(keys(&records), (0..200).collect::<Vec<_>>());

    let mut db = Database::open(DatabaseConfig::new(dir.path()).buffer_size(4))?;
    assert_eq!(db.page_size(), 400);
    assert_eq!(db.table_names(), vec!["mixed".to_string(), "t".to_string()]);
    assert_eq!(db.page_ids("t"), Some(&pages[..]));
    assert_eq!(db.select_all("t")?, records);
    assert_eq!(
        db.select_all("mixed")?,
        vec![
            Record::new(vec![Value::Text("aaaa".into()), Value::Null, Value::Boolean(true)]),
            Record::new(vec![Value::Text("bbbb".into()), Value::Double(2.5), Value::Null]),
        ]
    );
    Ok(())
}

#[test]
fn test_unindexed_scan_is_sorted_under_eviction() -> Result<()> {
    let dir = tempdir()?;
    let mut db = Database::open(
        DatabaseConfig::new(dir.path())
            .page_size(256)
            .buffer_size(1),
    )?;
    db.create_table("t", attributes())?;

    let mut rng = StdRng::seed_from_u64(11);
    let mut inserted = BTreeSet::new();
    while inserted.len() < 150 {
        let id = rng.gen_range(-1000..1000);
        if inserted.insert(id) {
            db.insert("t", row(id))?;
        } else {
            assert!(db.insert("t", row(id)).is_err());
        }
    }

    let scanned = keys(&db.select_all("t")?);
    assert_eq!(scanned, inserted.iter().copied().collect::<Vec<_>>());
    assert!(db.storage().buffer().len() <= 1);
    Ok(())
}

fn sized_attributes() -> Vec<Attribute> {
    vec![
        Attribute::new("id", DataType::Integer).primary_key(),
        Attribute::new("payload", DataType::Varchar(40)),
    ]
}

/// A row of `20 + 2 * len` bytes.
fn sized_row(id: i32, len: usize) -> Vec<Value> {
    vec![Value::Integer(id), Value::Text("y".repeat(len))]
}

#[test]
fn test_repeated_split_with_one_page_buffer() -> Result<()> {
    let dir = tempdir()?;
    let config = DatabaseConfig::new(dir.path()).page_size(160).buffer_size(1);
    {
        let mut db = Database::open(config.clone())?;
        db.create_table("t", sized_attributes())?;

        // 70 + 24 bytes fit the 156 byte budget, the 90 byte row in between does not. The
        // first split leaves 160 bytes on the source page, which has to split again.
        db.insert("t", sized_row(1, 25))?;
        db.insert("t", sized_row(3, 2))?;
        db.insert("t", sized_row(2, 35))?;

        assert_eq!(
            db.page_ids("t"),
            Some(&[PageId(0), PageId(2), PageId(1)][..])
        );
        assert_eq!(keys(&db.select_all("t")?), vec![1, 2, 3]);
        assert!(db.storage().buffer().len() <= 1);
        db.close()?;
    }

    let mut db = Database::open(config)?;
    assert_eq!(keys(&db.select_all("t")?), vec![1, 2, 3]);
    assert_eq!(db.check_table("t")?, 3);
    Ok(())
}

#[test]
fn test_variable_rows_with_one_page_buffer() -> Result<()> {
    let dir = tempdir()?;
    let config = DatabaseConfig::new(dir.path()).page_size(160).buffer_size(1);
    let mut rng = StdRng::seed_from_u64(23);
    let mut ids: Vec<i32> = (0..120).collect();
    ids.shuffle(&mut rng);
    {
        let mut db = Database::open(config.clone())?;
        db.create_table("t", sized_attributes())?;
        for &id in &ids {
            db.insert("t", sized_row(id, rng.gen_range(0..=40)))?;
            assert!(db.storage().buffer().len() <= 1);
        }
        assert_eq!(keys(&db.select_all("t")?), (0..120).collect::<Vec<_>>());
        db.close()?;
    }

    let mut db = Database::open(config)?;
    assert_eq!(db.check_table("t")?, 120);
    Ok(())
}

#[test]
fn test_indexed_random_inserts_and_deletes() -> Result<()> {
    for (seed, order) in [(1, Some(3)), (2, Some(4)), (3, Some(7)), (4, None)] {
        let dir = tempdir()?;
        let mut config = DatabaseConfig::new(dir.path())
            .page_size(300)
            .buffer_size(3)
            .indexing(true);
        if let Some(order) = order {
            config = config.index_order(order);
        }
        let mut db = Database::open(config)?;
        db.create_table("t", attributes())?;

        let mut rng = StdRng::seed_from_u64(seed);
        let mut present = BTreeSet::new();
        for round in 0..6 {
            for _ in 0..60 {
                let id = rng.gen_range(0..500);
                if present.insert(id) {
                    db.insert("t", row(id))?;
                }
            }

            let mut victims: Vec<i32> = present.iter().copied().collect();
            victims.shuffle(&mut rng);
            for id in victims.into_iter().take(20 + round * 3) {
                let removed = db.delete_by_key("t", &Value::Integer(id))?;
                assert_eq!(removed, Some(Record::new(row(id))));
                present.remove(&id);
            }

            assert_eq!(db.check_table("t")?, present.len());
        }

        for &id in &present {
            assert_eq!(db.search("t", &Value::Integer(id))?, Some(Record::new(row(id))));
        }
        assert_eq!(db.search("t", &Value::Integer(-1))?, None);
        assert_eq!(keys(&db.select_all("t")?), present.iter().copied().collect::<Vec<_>>());
    }
    Ok(())
}

#[test]
fn test_front_insert_shifts_across_leaves() -> Result<()> {
    let dir = tempdir()?;
    // One large page and a tiny tree order: every record shares a page while the keys
    // spread over many leaves
    let mut db = Database::open(
        DatabaseConfig::new(dir.path())
            .page_size(4096)
            .indexing(true)
            .index_order(3),
    )?;
    db.create_table("t", attributes())?;

    for id in (1..=20).map(|i| i * 10) {
        db.insert("t", row(id))?;
    }
    let pointer = db.insert("t", row(5))?;
    assert_eq!(pointer.slot, 0);
    assert_eq!(pointer.page_id, PageId(0));

    let tree = db.index("t").map(|tree| tree.iter().map(|(_, p)| p).collect::<Vec<_>>());
    let slots: Vec<u32> = tree.unwrap_or_default().iter().map(|p| p.slot).collect();
    assert_eq!(slots, (0..21).collect::<Vec<u32>>());

    db.delete_by_key("t", &Value::Integer(5))?;
    db.delete_by_key("t", &Value::Integer(100))?;
    assert_eq!(db.check_table("t")?, 19);
    Ok(())
}

#[test]
fn test_reopen_rebuilds_index() -> Result<()> {
    let dir = tempdir()?;
    {
        let mut db = Database::open(DatabaseConfig::new(dir.path()).page_size(400))?;
        db.create_table("t", attributes())?;
        for id in (0..40).rev() {
            db.insert("t", row(id))?;
        }
        db.close()?;
    }

    let mut db = Database::open(
        DatabaseConfig::new(dir.path())
            .indexing(true)
            .index_order(4),
    )?;
    assert_eq!(db.index("t").map(|tree| tree.len()), Some(40));
    assert_eq!(db.check_table("t")?, 40);

    db.insert("t", row(100))?;
    db.delete_where("t", |record| {
        matches!(record.get(0), Some(Value::Integer(k)) if *k < 10)
    })?;
    assert_eq!(db.check_table("t")?, 31);
    Ok(())
}

#[test]
fn test_text_primary_key_index() -> Result<()> {
    let dir = tempdir()?;
    let mut db = Database::open(
        DatabaseConfig::new(dir.path())
            .page_size(200)
            .indexing(true),
    )?;
    db.create_table(
        "words",
        vec![
            Attribute::new("word", DataType::Varchar(12)).primary_key(),
            Attribute::new("len", DataType::Integer).not_null(),
        ],
    )?;

    let words = ["pear", "apple", "fig", "banana", "kiwi", "cherry", "date", "grape"];
    for word in words {
        db.insert(
            "words",
            vec![Value::Text(word.into()), Value::Integer(word.len() as i32)],
        )?;
    }

    let mut sorted = words.to_vec();
    sorted.sort_unstable();
    let scanned: Vec<Value> = db
        .select_all("words")?
        .iter()
        .filter_map(|record| record.get(0).cloned())
        .collect();
    assert_eq!(
        scanned,
        sorted.iter().map(|w| Value::Text(w.to_string())).collect::<Vec<_>>()
    );
    assert_eq!(
        db.search("words", &Value::Text("kiwi".into()))?,
        Some(Record::new(vec![Value::Text("kiwi".into()), Value::Integer(4)]))
    );
    assert_eq!(db.check_table("words")?, words.len());
    Ok(())
}

#[test]
fn test_alter_survives_reopen() -> Result<()> {
    let dir = tempdir()?;
    {
        let mut db = Database::open(DatabaseConfig::new(dir.path()).page_size(400))?;
        db.create_table("t", attributes())?;
        for id in 0..20 {
            db.insert("t", row(id))?;
        }
        db.alter_drop_column("t", "payload")?;
        db.alter_add_column(
            "t",
            Attribute::new("flag", DataType::Boolean),
            Value::Boolean(false),
        )?;
        db.close()?;
    }

    let mut db = Database::open(DatabaseConfig::new(dir.path()))?;
    let records = db.select_all("t")?;
    assert_eq!(records.len(), 20);
    assert!(records
        .iter()
        .all(|record| record.values().get(1) == Some(&Value::Boolean(false))));
    assert_eq!(db.schema("t")?.attributes.len(), 2);
    Ok(())
}
