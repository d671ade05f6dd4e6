//! pagedb - inspect and verify a page-based database directory

use anyhow::{Context, Result};
use clap::{Parser as ClapParser, Subcommand};
use std::path::PathBuf;
use pagedb::config::DatabaseConfig;
use pagedb::database::Database;

/// pagedb - A page-based table store with an optional B+Tree primary-key index
#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Database directory
    db_dir: PathBuf,

    /// Page size in bytes (ignored for an existing database)
    page_size: usize,

    /// Number of pages the buffer holds
    buffer_size: usize,

    /// Maintain B+Tree indexes on primary keys
    #[arg(short, long)]
    index: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List tables with their page ids and record counts
    Info,
    /// Verify that every table is sorted and, with --index, that its index is consistent
    Check,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config = DatabaseConfig::new(&args.db_dir)
        .page_size(args.page_size)
        .buffer_size(args.buffer_size)
        .indexing(args.index);
    let mut db = Database::open(config).context("Failed to open database")?;

    match args.command {
        Command::Info => info(&mut db)?,
        Command::Check => check(&mut db)?,
    }

    db.close()
}

fn info(db: &mut Database) -> Result<()> {
    println!("Database: {}", db.config().db_dir.display());
    println!("Page size: {}", db.page_size());

    let names = db.table_names();
    if names.is_empty() {
        println!("No tables");
        return Ok(());
    }

    for name in &names {
        let schema = db.schema(name)?;
        let attributes: Vec<String> = schema.attributes.iter().map(|a| a.to_string()).collect();
        println!();
        println!("Table {} ({})", name, attributes.join(", "));

        let pages: Vec<String> = db
            .page_ids(name)
            .unwrap_or_default()
            .iter()
            .map(|id| id.to_string())
            .collect();
        println!("  Pages: [{}]", pages.join(", "));
        println!("  Records: {}", db.record_count(name)?);

        if let Some(tree) = db.index(name) {
            println!(
                "  Index: order {}, height {}, {} keys",
                tree.order(),
                tree.height(),
                tree.len()
            );
        }
    }
    Ok(())
}

fn check(db: &mut Database) -> Result<()> {
    let mut failures = 0;
    for name in db.table_names() {
        match db.check_table(&name) {
            Ok(count) => println!("{}: ok ({} records)", name, count),
            Err(e) => {
                failures += 1;
                println!("{}: FAILED: {:#}", name, e);
            }
        }
    }
    anyhow::ensure!(failures == 0, "{} tables failed verification", failures);
    Ok(())
}
