//! Database file identity: header magic, companion file names and the
//! advisory lock.

use std::fmt::Write as _;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use sha2::{Digest, Sha256};

use crate::error::{classify_io_error, Result, StorageError};

/// Fixed file header: marker followed by reserved zero bytes.
pub const MAGIC: [u8; 16] = *b"\x60\xdbql\0\0\0\0\0\0\0\0\0\0\0\0";

/// Bytes reserved for [`MAGIC`] at the start of the file.
pub const HEADER_SIZE: u64 = 16;

/// Paths that belong to one database file.
///
/// The lock and WAL names are derived from the base name only, so every
/// spelling of the same file in the same directory maps to the same
/// companions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIdentity {
    path: PathBuf,
    lock_path: PathBuf,
    wal_path: PathBuf,
}

impl FileIdentity {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let base = path.file_name().ok_or_else(|| {
            StorageError::IoError(format!("{}: not a file path", path.display()))
        })?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let base = base.to_string_lossy();
        let lock_path = dir.join(hidden_name(format!("{}lockfile", base).as_bytes()));
        let wal_path = dir.join(hidden_name(base.as_bytes()));
        Ok(Self {
            path: path.to_path_buf(),
            lock_path,
            wal_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    pub fn wal_path(&self) -> &Path {
        &self.wal_path
    }
}

fn hidden_name(seed: &[u8]) -> String {
    let digest = Sha256::digest(seed);
    let mut name = String::with_capacity(1 + digest.len() * 2);
    name.push('.');
    for byte in digest {
        let _ = write!(name, "{byte:02x}");
    }
    name
}

/// Checks the 16-byte header of an existing database file.
pub fn check_header(header: &[u8]) -> Result<()> {
    if header.len() < HEADER_SIZE as usize {
        return Err(StorageError::BadFormat(format!(
            "file too short for header: {} bytes",
            header.len()
        )));
    }
    if header[..HEADER_SIZE as usize] != MAGIC {
        return Err(StorageError::BadFormat("magic header mismatch".to_string()));
    }
    Ok(())
}

/// Exclusive advisory lock held through a lock file.
///
/// Dropping the lock releases it and removes the lock file.
#[derive(Debug)]
pub struct AdvisoryLock {
    file: Option<File>,
    path: PathBuf,
}

/// Attempts before giving up on a lock file that keeps being replaced.
const ACQUIRE_ATTEMPTS: usize = 8;

impl AdvisoryLock {
    /// Takes the lock without blocking; `Locked` if another owner holds it.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        for _ in 0..ACQUIRE_ATTEMPTS {
            let file = open_lock_file(path)?;
            if let Some(file) = lock_current(file, path)? {
                return Ok(Self {
                    file: Some(file),
                    path: path.to_path_buf(),
                });
            }
            tracing::debug!(lock = %path.display(), "lock file replaced while locking, retrying");
        }
        Err(StorageError::Locked {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unlocks and removes the lock file.
    pub fn release(mut self) -> Result<()> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> Result<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        // Remove while still holding the lock so no other opener locks the
        // file we are about to unlink.
        let removed = fs::remove_file(&self.path);
        let _ = FileExt::unlock(&file);
        match removed {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(classify_io_error(err, "remove lock file")),
        }
    }
}

impl Drop for AdvisoryLock {
    fn drop(&mut self) {
        if let Err(err) = self.release_inner() {
            tracing::warn!(lock = %self.path.display(), "releasing lock failed: {}", err);
        }
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| classify_io_error(e, "open lock file"))
}

/// Locks `file` and checks that it is still the file at `path`.
///
/// A releasing holder unlinks the lock file before unlocking it, so an
/// opener that raced with the release can lock an orphaned file. That lock
/// guards nothing; `None` tells the caller to reopen.
fn lock_current(file: File, path: &Path) -> Result<Option<File>> {
    if let Err(err) = file.try_lock_exclusive() {
        if is_contended(&err) {
            return Err(StorageError::Locked {
                path: path.to_path_buf(),
            });
        }
        return Err(classify_io_error(err, "lock"));
    }
    if is_same_file(&file, path)? {
        Ok(Some(file))
    } else {
        let _ = FileExt::unlock(&file);
        Ok(None)
    }
}

#[cfg(unix)]
fn is_same_file(file: &File, path: &Path) -> Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let held = file
        .metadata()
        .map_err(|e| classify_io_error(e, "stat lock file"))?;
    match fs::metadata(path) {
        Ok(current) => Ok(held.dev() == current.dev() && held.ino() == current.ino()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(classify_io_error(err, "stat lock file")),
    }
}

#[cfg(not(unix))]
fn is_same_file(_file: &File, path: &Path) -> Result<bool> {
    Ok(path.exists())
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
