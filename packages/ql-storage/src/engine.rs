//! File storage engine: handle-based CRUD over a WAL-protected heap.

use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::codec::{decode, encode};
use crate::config::StorageConfig;
use crate::error::{classify_io_error, Result, StorageError};
use crate::filer::{Filer, InnerFiler, OsFiler};
use crate::heap::{AllocStats, Allocator, Handle, Heap, TxHeap};
use crate::identity::{check_header, AdvisoryLock, FileIdentity, HEADER_SIZE, MAGIC};
use crate::temp::TempStore;
use crate::types::{narrow, Column, Value};
use crate::wal::WalFiler;

/// Caller-defined root record.
pub const ROOT_HANDLE: Handle = 1;
/// 8-byte big-endian row-id counter.
pub const ID_HANDLE: Handle = 2;

/// Heap stack used by file-backed databases.
pub type FileHeap<F = OsFiler> = Allocator<WalFiler<InnerFiler<F>>>;

struct EngineState<H> {
    heap: H,
    /// Last issued row id
    last_id: u64,
    lock: AdvisoryLock,
}

/// Transactional record store over one database file.
///
/// Share across threads with `Arc`. Mutations require an open transaction
/// and take the write side of the instance lock; [`read`](Self::read) takes
/// the read side.
pub struct FileStorage<H = FileHeap> {
    identity: FileIdentity,
    config: StorageConfig,
    state: RwLock<Option<EngineState<H>>>,
}

/// Removes a file created by the current open unless disarmed.
struct CreatedFile {
    path: Option<PathBuf>,
}

impl CreatedFile {
    fn new(path: &Path, created: bool) -> Self {
        Self {
            path: created.then(|| path.to_path_buf()),
        }
    }

    fn disarm(mut self) {
        self.path = None;
    }
}

impl Drop for CreatedFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(e) = fs::remove_file(&path) {
                tracing::warn!("Failed to remove {} after failed open: {}", path.display(), e);
            }
        }
    }
}

impl FileStorage<FileHeap> {
    /// Opens or creates the database at `path`.
    pub fn open(path: impl AsRef<Path>, config: &StorageConfig) -> Result<Self> {
        let identity = FileIdentity::new(path)?;
        let (file, created) = open_main(identity.path(), config.can_create)?;
        Self::bootstrap(identity, OsFiler::new(file), created, config)
    }
}

impl<F: Filer> FileStorage<FileHeap<F>> {
    /// Opens a database stored in `main` instead of the file at `path`.
    ///
    /// `path` still names the database: the lock and WAL files are derived
    /// from it. An empty `main` is initialized as a fresh database.
    pub fn open_with_filer(path: impl AsRef<Path>, main: F, config: &StorageConfig) -> Result<Self> {
        let identity = FileIdentity::new(path)?;
        Self::bootstrap(identity, main, false, config)
    }

    fn bootstrap(
        identity: FileIdentity,
        main: F,
        created: bool,
        config: &StorageConfig,
    ) -> Result<Self> {
        let main_guard = CreatedFile::new(identity.path(), created);

        let lock = AdvisoryLock::acquire(identity.lock_path())?;

        let (wal, wal_created) = open_wal(identity.wal_path())?;
        let wal_guard = CreatedFile::new(identity.wal_path(), wal_created);

        let (heap, last_id, fresh) = load_heap(main, wal, &identity, config)?;

        main_guard.disarm();
        wal_guard.disarm();
        tracing::info!(
            "Opened database {} ({}), row id {}",
            identity.path().display(),
            if fresh { "new" } else { "existing" },
            last_id
        );

        Ok(Self {
            identity,
            config: config.clone(),
            state: RwLock::new(Some(EngineState {
                heap,
                last_id,
                lock,
            })),
        })
    }
}

fn open_main(path: &Path, can_create: bool) -> Result<(File, bool)> {
    match OpenOptions::new().read(true).write(true).open(path) {
        Ok(file) => Ok((file, false)),
        Err(e) if e.kind() == ErrorKind::NotFound && can_create => {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create_new(true)
                .open(path)
                .map_err(|e| classify_io_error(e, "create database file"))?;
            Ok((file, true))
        }
        Err(e) => Err(classify_io_error(e, "open database file")),
    }
}

fn open_wal(path: &Path) -> Result<(File, bool)> {
    let created = OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .open(path);
    match created {
        Ok(file) => Ok((file, true)),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(path)
                .map_err(|e| classify_io_error(e, "open WAL"))?;
            let len = file
                .metadata()
                .map_err(|e| classify_io_error(e, "stat WAL"))?
                .len();
            if len != 0 {
                tracing::warn!(
                    "Refusing to open: WAL {} holds {} bytes from an unclean shutdown",
                    path.display(),
                    len
                );
                return Err(StorageError::UncleanShutdown {
                    path: path.to_path_buf(),
                });
            }
            Ok((file, false))
        }
        Err(e) => Err(classify_io_error(e, "create WAL")),
    }
}

fn load_heap<F: Filer>(
    mut main: F,
    wal: File,
    identity: &FileIdentity,
    config: &StorageConfig,
) -> Result<(FileHeap<F>, u64, bool)> {
    let size = main.size()?;
    let fresh = size == 0;
    if fresh {
        main.write_at(&MAGIC, 0)?;
        if config.sync_on_commit {
            main.sync()?;
        }
    } else {
        let mut header = vec![0u8; size.min(HEADER_SIZE) as usize];
        main.read_at(&mut header, 0)?;
        check_header(&header)?;
    }

    let filer = WalFiler::new(
        InnerFiler::new(main, HEADER_SIZE),
        wal,
        identity.wal_path(),
        config.sync_on_commit,
    );
    let mut heap = Allocator::open(filer)?;
    let last_id = if fresh {
        init_well_known(&mut heap)?;
        0
    } else {
        load_id(&heap)?
    };
    Ok((heap, last_id, fresh))
}

/// Creates the root and row-id records in a fresh heap.
fn init_well_known<H: TxHeap>(heap: &mut H) -> Result<()> {
    heap.begin()?;
    match alloc_well_known(heap) {
        Ok(()) => heap.commit(),
        Err(e) => {
            if let Err(rollback) = heap.rollback() {
                tracing::warn!("Rollback after failed bootstrap failed: {}", rollback);
            }
            Err(e)
        }
    }
}

fn alloc_well_known<H: Heap>(heap: &mut H) -> Result<()> {
    let root = heap.alloc(&encode(&[])?)?;
    if root != ROOT_HANDLE {
        tracing::error!("Root record allocated at handle {}", root);
        return Err(StorageError::InternalInvariantViolation(format!(
            "root record allocated at handle {}, expected {}",
            root,
            ROOT_HANDLE
        )));
    }
    let id = heap.alloc(&0u64.to_be_bytes())?;
    if id != ID_HANDLE {
        tracing::error!("Row-id record allocated at handle {}", id);
        return Err(StorageError::InternalInvariantViolation(format!(
            "row-id record allocated at handle {}, expected {}",
            id,
            ID_HANDLE
        )));
    }
    Ok(())
}

fn load_id<H: Heap>(heap: &H) -> Result<u64> {
    let bytes = heap
        .get(ID_HANDLE)
        .map_err(|e| match e {
            StorageError::NotFound { .. } => {
                StorageError::BadFormat("row-id record is missing".to_string())
            }
            other => other,
        })?;
    let bytes: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
        StorageError::BadFormat(format!(
            "row-id record is {} bytes, expected 8",
            bytes.len()
        ))
    })?;
    Ok(u64::from_be_bytes(bytes))
}

fn require_transaction<H: TxHeap>(heap: &H, op: &str) -> Result<()> {
    if heap.in_transaction() {
        Ok(())
    } else {
        Err(StorageError::TransactionState(format!(
            "{} outside transaction",
            op
        )))
    }
}

impl<H> FileStorage<H> {
    /// Path of the database file.
    pub fn name(&self) -> &Path {
        self.identity.path()
    }

    pub fn wal_path(&self) -> &Path {
        self.identity.wal_path()
    }

    pub fn lock_path(&self) -> &Path {
        self.identity.lock_path()
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// File-backed instances are always transactional and durable.
    pub fn is_acid(&self) -> bool {
        true
    }
}

impl<H: TxHeap> FileStorage<H> {
    fn write<T>(&self, f: impl FnOnce(&mut EngineState<H>) -> Result<T>) -> Result<T> {
        let mut guard = self.state.write().map_err(|_| StorageError::LockPoisoned)?;
        let state = guard.as_mut().ok_or(StorageError::Closed)?;
        f(state)
    }

    fn read_state<T>(&self, f: impl FnOnce(&EngineState<H>) -> Result<T>) -> Result<T> {
        let guard = self.state.read().map_err(|_| StorageError::LockPoisoned)?;
        let state = guard.as_ref().ok_or(StorageError::Closed)?;
        f(state)
    }

    pub fn begin_transaction(&self) -> Result<()> {
        self.write(|state| {
            if state.heap.in_transaction() {
                return Err(StorageError::TransactionState(
                    "transaction already open".to_string(),
                ));
            }
            state.heap.begin()?;
            tracing::debug!("Transaction started on {}", self.identity.path().display());
            Ok(())
        })
    }

    pub fn commit(&self) -> Result<()> {
        self.write(|state| {
            require_transaction(&state.heap, "commit")?;
            if let Err(e) = state.heap.commit() {
                tracing::error!("Commit on {} failed: {}", self.identity.path().display(), e);
                if let Ok(last_id) = load_id(&state.heap) {
                    state.last_id = last_id;
                }
                return Err(e);
            }
            tracing::debug!("Transaction committed on {}", self.identity.path().display());
            Ok(())
        })
    }

    /// Discards the open transaction and reloads the row-id counter.
    pub fn rollback(&self) -> Result<()> {
        self.write(|state| {
            require_transaction(&state.heap, "rollback")?;
            state.heap.rollback()?;
            state.last_id = load_id(&state.heap)?;
            tracing::debug!("Transaction rolled back on {}", self.identity.path().display());
            Ok(())
        })
    }

    pub fn in_transaction(&self) -> bool {
        self.read_state(|state| Ok(state.heap.in_transaction()))
            .unwrap_or(false)
    }

    /// Stores a new record and returns its handle.
    pub fn create(&self, values: &[Value]) -> Result<Handle> {
        let record = encode(values)?;
        self.write(|state| {
            require_transaction(&state.heap, "create")?;
            state.heap.alloc(&record)
        })
    }

    /// Reads a record, narrowing the listed columns to their declared kinds.
    pub fn read(&self, handle: Handle, columns: &[Column]) -> Result<Vec<Value>> {
        let record = self.read_state(|state| state.heap.get(handle))?;
        let mut values = decode(&record)?;
        for column in columns {
            let Some(kind) = column.kind else { continue };
            let field_count = values.len();
            let slot = values.get_mut(column.index).ok_or_else(|| {
                StorageError::CorruptRecord(format!(
                    "column {} outside record of {} fields at handle {}",
                    column.index, field_count, handle
                ))
            })?;
            let value = std::mem::replace(slot, Value::Null);
            *slot = narrow(value, kind)?;
        }
        Ok(values)
    }

    /// Replaces the record under `handle`; the handle stays valid. The
    /// row-id record is only written through [`id`](Self::id).
    pub fn update(&self, handle: Handle, values: &[Value]) -> Result<()> {
        let record = encode(values)?;
        self.write(|state| {
            require_transaction(&state.heap, "update")?;
            if handle == ID_HANDLE {
                return Err(StorageError::ReservedHandle { handle, op: "update" });
            }
            state.heap.realloc(handle, &record)
        })
    }

    /// Frees the record under `handle`. The root and row-id records cannot
    /// be deleted.
    pub fn delete(&self, handle: Handle) -> Result<()> {
        self.write(|state| {
            require_transaction(&state.heap, "delete")?;
            if handle == ROOT_HANDLE || handle == ID_HANDLE {
                return Err(StorageError::ReservedHandle { handle, op: "delete" });
            }
            state.heap.free(handle)
        })
    }

    /// Issues the next row id, persisting the counter first.
    pub fn id(&self) -> Result<u64> {
        self.write(|state| {
            require_transaction(&state.heap, "id")?;
            let next = state.last_id.checked_add(1).ok_or_else(|| {
                StorageError::InternalInvariantViolation("row-id counter overflow".to_string())
            })?;
            state.heap.realloc(ID_HANDLE, &next.to_be_bytes())?;
            state.last_id = next;
            Ok(next)
        })
    }

    /// Last issued row id as held in memory.
    pub fn current_id(&self) -> Result<u64> {
        self.read_state(|state| Ok(state.last_id))
    }

    /// Resets the in-memory counter to 0. The stored counter is untouched
    /// until the next [`id`](Self::id).
    pub fn reset_id(&self) -> Result<()> {
        self.write(|state| {
            state.last_id = 0;
            Ok(())
        })
    }

    /// Scans the heap and checks it against the in-memory index.
    pub fn verify(&self) -> Result<AllocStats> {
        self.write(|state| state.heap.verify())
    }

    /// Opens an ephemeral store from the configured factory, or a temporary
    /// file in the configured directory.
    pub fn create_temp(&self, ascending: bool) -> Result<TempStore> {
        self.read_state(|_| Ok(()))?;
        let dir = self.config.temp_dir.as_deref();
        match &self.config.temp_file {
            Some(factory) => {
                TempStore::from_file(factory(dir, &self.config.temp_prefix)?, ascending)
            }
            None => TempStore::create(dir, &self.config.temp_prefix, ascending),
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state.read().as_deref(), Ok(None))
    }

    /// Flushes and closes the database, then removes the empty WAL and the
    /// lock file. An open transaction is rolled back. Closing twice is a
    /// no-op.
    pub fn close(&self) -> Result<()> {
        let state = {
            let mut guard = self.state.write().map_err(|_| StorageError::LockPoisoned)?;
            guard.take()
        };
        match state {
            Some(state) => self.shutdown(state),
            None => Ok(()),
        }
    }

    fn shutdown(&self, state: EngineState<H>) -> Result<()> {
        let EngineState { mut heap, lock, .. } = state;
        let mut first_error = None;

        if heap.in_transaction() {
            tracing::warn!(
                "Closing {} with an open transaction; rolling back",
                self.identity.path().display()
            );
            if let Err(e) = heap.rollback() {
                first_error.get_or_insert(e);
            }
        }
        if let Err(e) = heap.sync() {
            first_error.get_or_insert(e);
        }
        drop(heap);

        let wal_path = self.identity.wal_path();
        match fs::metadata(wal_path) {
            Ok(meta) if meta.len() == 0 => {
                if let Err(e) = fs::remove_file(wal_path) {
                    first_error.get_or_insert(classify_io_error(e, "remove WAL"));
                }
            }
            Ok(meta) => tracing::warn!(
                "Leaving non-empty WAL {} ({} bytes) in place",
                wal_path.display(),
                meta.len()
            ),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                first_error.get_or_insert(classify_io_error(e, "stat WAL"));
            }
        }

        if let Err(e) = lock.release() {
            first_error.get_or_insert(e);
        }

        tracing::info!("Closed database {}", self.identity.path().display());
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<H> Drop for FileStorage<H> {
    fn drop(&mut self) {
        let state = match self.state.get_mut() {
            Ok(state) => state.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(state) = state else { return };
        close_on_drop(&self.identity, state);
    }
}

/// Best-effort close for instances dropped without [`FileStorage::close`].
fn close_on_drop<H>(identity: &FileIdentity, state: EngineState<H>) {
    let EngineState { heap, lock, .. } = state;
    // Dropping the heap discards any open transaction's overlay.
    drop(heap);
    if let Ok(meta) = fs::metadata(identity.wal_path()) {
        if meta.len() == 0 {
            if let Err(e) = fs::remove_file(identity.wal_path()) {
                tracing::warn!("Failed to remove WAL {}: {}", identity.wal_path().display(), e);
            }
        }
    }
    drop(lock);
    tracing::info!("Closed database {} on drop", identity.path().display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filer::MemFiler;
    use crate::temp::TempFile;
    use crate::types::Kind;
    use std::sync::Arc;

    fn open(dir: &tempfile::TempDir) -> FileStorage {
        FileStorage::open(dir.path().join("test.db"), &StorageConfig::default()).unwrap()
    }

    #[test]
    fn fresh_database_has_well_known_handles() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir);

        assert!(db.read(ROOT_HANDLE, &[]).unwrap().is_empty());
        assert_eq!(db.verify().unwrap().allocs, 2);
        assert!(db.is_acid());
        assert!(db.lock_path().exists());
        assert!(db.wal_path().exists());

        let bytes = fs::read(db.name()).unwrap();
        assert_eq!(&bytes[..16], &MAGIC);
        db.close().unwrap();
    }

    #[test]
    fn mutations_need_a_transaction() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir);

        assert!(matches!(
            db.create(&[Value::IdealInt(1)]),
            Err(StorageError::TransactionState(_))
        ));
        assert!(matches!(db.id(), Err(StorageError::TransactionState(_))));
        assert!(matches!(db.commit(), Err(StorageError::TransactionState(_))));
        assert!(matches!(db.rollback(), Err(StorageError::TransactionState(_))));

        db.begin_transaction().unwrap();
        assert!(matches!(
            db.begin_transaction(),
            Err(StorageError::TransactionState(_))
        ));
        assert_eq!(db.id().unwrap(), 1);
        db.commit().unwrap();
    }

    #[test]
    fn read_narrows_declared_columns() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir);

        db.begin_transaction().unwrap();
        let h = db
            .create(&[Value::IdealInt(300), "name".into(), Value::Null])
            .unwrap();
        db.commit().unwrap();

        let values = db
            .read(h, &[Column::new(0, Kind::Int8), Column::untyped(1)])
            .unwrap();
        assert_eq!(
            values,
            vec![Value::Int8(44), Value::String("name".into()), Value::Null]
        );

        assert!(matches!(
            db.read(h, &[Column::new(1, Kind::Int64)]),
            Err(StorageError::TypeMismatch { .. })
        ));
        assert!(matches!(
            db.read(h, &[Column::new(7, Kind::Int64)]),
            Err(StorageError::CorruptRecord(_))
        ));
    }

    #[test]
    fn rollback_restores_row_id_counter() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir);

        db.begin_transaction().unwrap();
        assert_eq!(db.id().unwrap(), 1);
        db.commit().unwrap();

        db.begin_transaction().unwrap();
        assert_eq!(db.id().unwrap(), 2);
        assert_eq!(db.id().unwrap(), 3);
        db.rollback().unwrap();

        db.begin_transaction().unwrap();
        assert_eq!(db.id().unwrap(), 2);
        db.commit().unwrap();
    }

    #[test]
    fn reset_id_only_touches_memory() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir);

        db.begin_transaction().unwrap();
        db.id().unwrap();
        db.id().unwrap();
        db.commit().unwrap();

        db.reset_id().unwrap();
        db.begin_transaction().unwrap();
        assert_eq!(db.id().unwrap(), 1);
        db.rollback().unwrap();

        db.begin_transaction().unwrap();
        assert_eq!(db.id().unwrap(), 3);
        db.commit().unwrap();
    }

    #[test]
    fn close_is_idempotent_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir);
        let wal = db.wal_path().to_path_buf();
        let lock = db.lock_path().to_path_buf();

        db.begin_transaction().unwrap();
        db.create(&["pending".into()]).unwrap();
        db.close().unwrap();
        db.close().unwrap();

        assert!(db.is_closed());
        assert!(!wal.exists());
        assert!(!lock.exists());
        assert!(matches!(db.read(1, &[]), Err(StorageError::Closed)));
        assert!(matches!(db.begin_transaction(), Err(StorageError::Closed)));
        assert!(matches!(db.create_temp(true), Err(StorageError::Closed)));
        assert!(!db.in_transaction());

        let db = open(&dir);
        assert_eq!(db.verify().unwrap().allocs, 2);
    }

    #[test]
    fn drop_releases_lock() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir);
        let lock = db.lock_path().to_path_buf();
        drop(db);
        assert!(!lock.exists());
        open(&dir).close().unwrap();
    }

    #[test]
    fn create_temp_uses_configured_location() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            temp_dir: Some(scratch.path().to_path_buf()),
            temp_prefix: "grp-".to_string(),
            ..StorageConfig::default()
        };
        let db = FileStorage::open(dir.path().join("t.db"), &config).unwrap();
        let store = db.create_temp(false).unwrap();
        let path = store.path().unwrap().to_path_buf();
        assert_eq!(path.parent(), Some(scratch.path()));
        drop(store);
        assert!(!path.exists());
    }

    #[test]
    fn missing_file_without_create_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            can_create: false,
            ..StorageConfig::default()
        };
        let path = dir.path().join("absent.db");
        assert!(matches!(
            FileStorage::open(&path, &config),
            Err(StorageError::IoError(_))
        ));
        assert!(!path.exists());
        let identity = FileIdentity::new(&path).unwrap();
        assert!(!identity.lock_path().exists());
    }

    #[test]
    fn caller_supplied_filer_holds_the_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mem.db");
        let db = FileStorage::open_with_filer(&path, MemFiler::new(), &StorageConfig::default())
            .unwrap();
        assert!(!path.exists());
        assert!(db.lock_path().exists());

        db.begin_transaction().unwrap();
        let h = db.create(&[Value::IdealInt(5)]).unwrap();
        assert_eq!(db.id().unwrap(), 1);
        db.commit().unwrap();
        assert_eq!(db.read(h, &[]).unwrap(), vec![Value::Int64(5)]);
        assert_eq!(db.verify().unwrap().allocs, 3);

        let lock = db.lock_path().to_path_buf();
        let wal = db.wal_path().to_path_buf();
        db.close().unwrap();
        assert!(!lock.exists());
        assert!(!wal.exists());
    }

    #[test]
    fn caller_supplied_filer_is_checked_for_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mem.db");
        let mut main = MemFiler::new();
        main.write_at(b"definitely not a database", 0).unwrap();

        let err = FileStorage::open_with_filer(&path, main, &StorageConfig::default()).err();
        assert!(matches!(err, Some(StorageError::BadFormat(_))));
        let identity = FileIdentity::new(&path).unwrap();
        assert!(!identity.lock_path().exists());
        assert!(!identity.wal_path().exists());
    }

    #[test]
    fn temp_file_factory_backs_ephemeral_stores() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            temp_dir: Some(scratch.path().to_path_buf()),
            temp_prefix: "enc-".to_string(),
            temp_file: Some(Arc::new(|dir: Option<&Path>, prefix: &str| {
                assert!(dir.is_some());
                assert_eq!(prefix, "enc-");
                Ok(Box::new(MemFiler::new()) as TempFile)
            })),
            ..StorageConfig::default()
        };
        let db = FileStorage::open(dir.path().join("t.db"), &config).unwrap();

        let mut store = db.create_temp(true).unwrap();
        store.set(&[Value::IdealInt(2)], &["b".into()]).unwrap();
        store.set(&[Value::IdealInt(1)], &["a".into()]).unwrap();
        assert_eq!(store.path(), None);
        assert_eq!(store.len(), 2);
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
        db.close().unwrap();
    }
}
