//! Storage error types.

use std::io::ErrorKind;
use std::path::PathBuf;

use thiserror::Error;

use crate::heap::Handle;

/// Storage operation errors.
#[derive(Error, Debug, Clone)]
pub enum StorageError {
    /// Operating system I/O failure
    #[error("I/O error: {0}")]
    IoError(String),

    /// File header or heap structure is not in the expected format
    #[error("Bad format: {0}")]
    BadFormat(String),

    /// A non-empty WAL file was found at open
    #[error("Unclean shutdown: non-empty WAL file {} exists", path.display())]
    UncleanShutdown { path: PathBuf },

    /// Handle is unknown or was freed
    #[error("Record not found for handle {handle}")]
    NotFound { handle: Handle },

    /// Key is absent from an ordered store
    #[error("Key not found")]
    KeyNotFound,

    /// Record bytes could not be decoded
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    /// Declared column kind disagrees with the stored value
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    /// Bootstrap or internal bookkeeping broke an invariant; the instance must not be used
    #[error("Internal invariant violation: {0}")]
    InternalInvariantViolation(String),

    /// Advisory lock is held by another owner
    #[error("Database is locked: {}", path.display())]
    Locked { path: PathBuf },

    /// Handle is owned by the engine and cannot be changed by callers
    #[error("Handle {handle} is reserved: {op} not allowed")]
    ReservedHandle { handle: Handle, op: &'static str },

    /// Transaction bracket misuse
    #[error("Transaction state: {0}")]
    TransactionState(String),

    /// Record does not fit the heap block format
    #[error("Record too large: {len} bytes")]
    RecordTooLarge { len: usize },

    /// Lock poisoned (RwLock poisoned)
    #[error("Lock poisoned")]
    LockPoisoned,

    /// Instance was closed or dropped
    #[error("Storage closed")]
    Closed,
}

impl StorageError {
    /// Returns `true` for missing handles and missing keys.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::NotFound { .. } | StorageError::KeyNotFound
        )
    }
}

/// Classifies I/O errors into `StorageError` variants.
pub fn classify_io_error(error: std::io::Error, context: &str) -> StorageError {
    match error.kind() {
        ErrorKind::UnexpectedEof => {
            StorageError::BadFormat(format!("{}: unexpected end of file", context))
        }
        ErrorKind::InvalidData => StorageError::BadFormat(format!("{}: {}", context, error)),
        _ => StorageError::IoError(format!("{}: {}", context, error)),
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
