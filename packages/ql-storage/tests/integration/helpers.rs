//! Shared fixtures.

use std::path::PathBuf;

use ql_storage::{FileStorage, StorageConfig};
use tempfile::TempDir;

/// Scratch directory plus a database path inside it.
pub struct Scratch {
    pub dir: TempDir,
    pub path: PathBuf,
}

pub fn scratch() -> Scratch {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.db");
    Scratch { dir, path }
}

pub fn open(scratch: &Scratch) -> FileStorage {
    FileStorage::open(&scratch.path, &StorageConfig::default()).unwrap()
}
