//! Operator tool for ql-storage database files.
//!
//! Commands:
//! - `info`: paths, row-id counter and allocation statistics
//! - `verify`: heap consistency scan
//! - `check-wal`: report on the companion WAL without opening the database

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use ql_storage::identity::FileIdentity;
use ql_storage::wal::{inspect_wal, WalSummary};
use ql_storage::{AllocStats, FileStorage, StorageConfig};

/// Command-line arguments for the storage tool.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show paths, row-id counter and allocation statistics
    Info {
        /// Database file
        db: PathBuf,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check the heap for structural consistency
    Verify {
        /// Database file
        db: PathBuf,
    },
    /// Inspect the companion WAL file
    CheckWal {
        /// Database file
        db: PathBuf,
    },
}

#[derive(Debug, Serialize)]
struct Info {
    path: PathBuf,
    wal_path: PathBuf,
    lock_path: PathBuf,
    row_id: u64,
    stats: AllocStats,
}

#[derive(Debug, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
enum WalReport {
    Absent,
    Empty,
    Leftover(WalSummary),
}

fn open_existing(db: &Path) -> Result<FileStorage> {
    let config = StorageConfig {
        can_create: false,
        ..StorageConfig::default()
    };
    FileStorage::open(db, &config).with_context(|| format!("opening {}", db.display()))
}

fn info(db: &Path, json: bool) -> Result<()> {
    let storage = open_existing(db)?;
    let info = Info {
        path: storage.name().to_path_buf(),
        wal_path: storage.wal_path().to_path_buf(),
        lock_path: storage.lock_path().to_path_buf(),
        row_id: storage.current_id()?,
        stats: storage.verify()?,
    };
    storage.close()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!("database:    {}", info.path.display());
        println!("wal:         {}", info.wal_path.display());
        println!("lock:        {}", info.lock_path.display());
        println!("row id:      {}", info.row_id);
        println!("allocations: {} ({} bytes)", info.stats.allocs, info.stats.alloc_bytes);
        println!("free blocks: {} ({} bytes)", info.stats.free_blocks, info.stats.free_bytes);
        println!("heap size:   {} bytes", info.stats.total_bytes);
    }
    Ok(())
}

fn verify(db: &Path) -> Result<()> {
    let storage = open_existing(db)?;
    let result = storage.verify();
    storage.close()?;
    let stats = result.with_context(|| format!("verifying {}", db.display()))?;
    println!("ok: {} allocations", stats.allocs);
    Ok(())
}

fn wal_report(db: &Path) -> Result<WalReport> {
    let identity = FileIdentity::new(db)?;
    if !identity.wal_path().exists() {
        return Ok(WalReport::Absent);
    }
    let summary = inspect_wal(identity.wal_path())
        .with_context(|| format!("reading {}", identity.wal_path().display()))?;
    if summary.bytes == 0 {
        Ok(WalReport::Empty)
    } else {
        Ok(WalReport::Leftover(summary))
    }
}

fn check_wal(db: &Path) -> Result<()> {
    let report = wal_report(db)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    if let WalReport::Leftover(summary) = &report {
        tracing::warn!(
            "WAL holds {} bytes; the database will refuse to open until it is removed",
            summary.bytes
        );
        bail!("unclean shutdown detected");
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Info { db, json } => info(&db, json),
        Command::Verify { db } => verify(&db),
        Command::CheckWal { db } => check_wal(&db),
    }
}
