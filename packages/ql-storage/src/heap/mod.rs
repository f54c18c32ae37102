//! Handle-addressed record heap.
//!
//! [`Heap`] is the capability the engine and the temp store depend on;
//! [`Allocator`] is the bundled implementation over any [`Filer`].
//!
//! [`Filer`]: crate::filer::Filer

mod allocator;

pub use allocator::Allocator;

use serde::Serialize;

use crate::error::Result;

/// Opaque address of one record.
pub type Handle = u64;

/// Space usage reported by [`Heap::verify`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AllocStats {
    /// Live allocations
    pub allocs: u64,
    /// Payload bytes of live allocations
    pub alloc_bytes: u64,
    /// Free blocks awaiting reuse
    pub free_blocks: u64,
    /// Capacity of free blocks
    pub free_bytes: u64,
    /// Total heap size including block headers
    pub total_bytes: u64,
}

/// Byte heap with handle-based alloc/free/realloc/get.
pub trait Heap {
    /// Stores `data` and returns its new handle.
    fn alloc(&mut self, data: &[u8]) -> Result<Handle>;

    /// Releases `handle`; fails `NotFound` for unknown handles.
    fn free(&mut self, handle: Handle) -> Result<()>;

    /// Replaces the content of `handle`, relocating it if needed.
    fn realloc(&mut self, handle: Handle, data: &[u8]) -> Result<()>;

    /// Returns the content of `handle`.
    fn get(&self, handle: Handle) -> Result<Vec<u8>>;

    /// Checks on-disk structure against the in-memory index.
    fn verify(&self) -> Result<AllocStats>;
}

/// Heap whose mutations are grouped into transactions.
pub trait TxHeap: Heap {
    fn begin(&mut self) -> Result<()>;
    fn commit(&mut self) -> Result<()>;
    fn rollback(&mut self) -> Result<()>;
    fn in_transaction(&self) -> bool;

    /// Flushes the backing storage.
    fn sync(&mut self) -> Result<()>;
}
