//! Ephemeral ordered store for sort and group-by materialization.
//!
//! A [`TempStore`] writes straight to a throwaway file: no WAL, no lock, no
//! crash safety. A file created by [`TempStore::create`] is deleted when the
//! store is dropped; caller-supplied backing is simply dropped.

use std::path::Path;

use tempfile::TempPath;

use crate::codec::{collate, collate_desc, decode, encode};
use crate::error::{classify_io_error, Result, StorageError};
use crate::filer::{Filer, OsFiler};
use crate::heap::{Allocator, Heap};
use crate::index::{Collator, Enumerator, OrderedIndex};
use crate::types::{enforce, infer, Column, Value};

/// Backing storage of a file-backed store.
pub type TempFile = Box<dyn Filer + Send>;

/// Heap of a file-backed store.
pub type TempHeap = Allocator<TempFile>;

/// Disposable ordered key/value store.
pub struct TempStore<H = TempHeap> {
    index: Option<OrderedIndex<H>>,
    path: Option<TempPath>,
    ascending: bool,
    key_columns: Vec<Column>,
    value_columns: Vec<Column>,
}

impl TempStore {
    /// Creates a store backed by a new temporary file in `dir` (or the OS
    /// temp directory).
    pub fn create(dir: Option<&Path>, prefix: &str, ascending: bool) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(prefix);
        let named = match dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| classify_io_error(e, "create temp file"))?;

        let (file, path) = named.into_parts();
        let filer: TempFile = Box::new(OsFiler::new(file));
        let heap = Allocator::open(filer)?;
        tracing::debug!("Created temp store {}", path.display());
        let mut store = Self::with_heap(heap, ascending);
        store.path = Some(path);
        Ok(store)
    }

    /// Creates a store over caller-supplied backing storage.
    pub fn from_file(file: TempFile, ascending: bool) -> Result<Self> {
        Ok(Self::with_heap(Allocator::open(file)?, ascending))
    }
}

impl<H: Heap> TempStore<H> {
    /// Creates a store over an existing heap, such as an in-memory one.
    pub fn with_heap(heap: H, ascending: bool) -> Self {
        let collator: Collator = if ascending { collate } else { collate_desc };
        Self {
            index: Some(OrderedIndex::new(heap, collator)),
            path: None,
            ascending,
            key_columns: Vec::new(),
            value_columns: Vec::new(),
        }
    }

    /// No-op: ephemeral stores have no durability contract.
    pub fn begin_transaction(&mut self) -> Result<()> {
        Ok(())
    }

    /// Upserts `value` under `key`, inferring column kinds on the way.
    pub fn set(&mut self, key: &[Value], value: &[Value]) -> Result<()> {
        let index = self.index.as_mut().ok_or(StorageError::Closed)?;

        let mut key = key.to_vec();
        let mut value = value.to_vec();
        infer(&mut key, &mut self.key_columns);
        infer(&mut value, &mut self.value_columns);

        index.set(&encode(&key)?, &encode(&value)?)
    }

    pub fn get(&self, key: &[Value]) -> Result<Vec<Value>> {
        let index = self.index.as_ref().ok_or(StorageError::Closed)?;
        let bytes = index
            .get(&encode(key)?)?
            .ok_or(StorageError::KeyNotFound)?;
        let mut value = decode(&bytes)?;
        enforce(&mut value, &self.value_columns)?;
        Ok(value)
    }

    /// Iterates all entries in collation order.
    pub fn seek_first(&self) -> Result<TempIter<'_, H>> {
        let index = self.index.as_ref().ok_or(StorageError::Closed)?;
        Ok(TempIter {
            entries: index.seek_first(),
            key_columns: &self.key_columns,
            value_columns: &self.value_columns,
        })
    }

    /// Closes the store and deletes its backing file. Safe to call twice.
    pub fn drop_store(&mut self) -> Result<()> {
        self.index = None;
        if let Some(path) = self.path.take() {
            let name = path.display().to_string();
            path.close()
                .map_err(|e| classify_io_error(e, "remove temp file"))?;
            tracing::debug!("Dropped temp store {}", name);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.index.as_ref().map_or(0, OrderedIndex::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ascending(&self) -> bool {
        self.ascending
    }

    pub fn key_columns(&self) -> &[Column] {
        &self.key_columns
    }

    pub fn value_columns(&self) -> &[Column] {
        &self.value_columns
    }

    /// Backing file, `None` for heap-only stores or after drop.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl<H> Drop for TempStore<H> {
    fn drop(&mut self) {
        self.index = None;
        if let Some(path) = self.path.take() {
            let name = path.display().to_string();
            if let Err(e) = path.close() {
                tracing::warn!("Failed to remove temp file {}: {}", name, e);
            }
        }
    }
}

/// Lazy iterator over a [`TempStore`], yielding decoded `(key, value)` rows.
pub struct TempIter<'a, H> {
    entries: Enumerator<'a, H>,
    key_columns: &'a [Column],
    value_columns: &'a [Column],
}

impl<H: Heap> Iterator for TempIter<'_, H> {
    type Item = Result<(Vec<Value>, Vec<Value>)>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.entries.next()?;
        Some(entry.and_then(|(key, value)| {
            let mut key = decode(&key)?;
            let mut value = decode(&value)?;
            enforce(&mut key, self.key_columns)?;
            enforce(&mut value, self.value_columns)?;
            Ok((key, value))
        }))
    }
}
