//! Storage configuration.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::Result;
use crate::temp::TempFile;

/// Supplies backing storage for ephemeral stores, given the configured
/// directory and prefix. Lets encrypted back ends keep sort and group data
/// encrypted as well.
pub type TempFileFactory = Arc<dyn Fn(Option<&Path>, &str) -> Result<TempFile> + Send + Sync>;

/// Options for opening a database file.
#[derive(Clone)]
pub struct StorageConfig {
    /// Create the database file if it does not exist. Ignored when the
    /// caller supplies the backing filer.
    pub can_create: bool,
    /// Directory for ephemeral sort/group stores (None = OS temp dir)
    pub temp_dir: Option<PathBuf>,
    /// File name prefix for ephemeral stores
    pub temp_prefix: String,
    /// Replaces the default `tempfile` backing of ephemeral stores
    pub temp_file: Option<TempFileFactory>,
    /// fsync the WAL and the main file on every commit
    pub sync_on_commit: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            can_create: true,
            temp_dir: None,
            temp_prefix: "ql-tmp-".to_string(),
            temp_file: None,
            sync_on_commit: true,
        }
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("can_create", &self.can_create)
            .field("temp_dir", &self.temp_dir)
            .field("temp_prefix", &self.temp_prefix)
            .field("temp_file", &self.temp_file.as_ref().map(|_| "custom"))
            .field("sync_on_commit", &self.sync_on_commit)
            .finish()
    }
}
