//! Crash-consistent single-file record storage.
//!
//! Provides the scalar record codec, a handle-addressed heap made atomic by
//! a write-ahead log, the transactional file engine, and ephemeral ordered
//! stores for sorting and grouping.

pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod filer;
pub mod heap;
pub mod identity;
pub mod index;
pub mod temp;
pub mod types;
pub mod wal;

pub use config::{StorageConfig, TempFileFactory};
pub use engine::{FileHeap, FileStorage, ID_HANDLE, ROOT_HANDLE};
pub use error::{Result, StorageError};
pub use heap::{AllocStats, Handle};
pub use temp::{TempFile, TempHeap, TempIter, TempStore};
pub use types::{Column, Kind, Value};
