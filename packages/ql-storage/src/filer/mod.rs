//! Byte-addressable storage underneath the allocator.
//!
//! A [`Filer`] is a growable byte range with positional reads and writes.
//! [`TxFiler`] adds transaction brackets; the WAL coordinator implements it.

mod inner;
mod mem;
mod os;

pub use inner::InnerFiler;
pub use mem::MemFiler;
pub use os::OsFiler;

use crate::error::Result;

/// Positional byte storage.
pub trait Filer {
    /// Current size in bytes.
    fn size(&self) -> Result<u64>;

    /// Fills `buf` from `offset`. Reading past the end is an error.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<()>;

    /// Writes `data` at `offset`, growing the storage if needed.
    fn write_at(&mut self, data: &[u8], offset: u64) -> Result<()>;

    /// Sets the size, discarding or zero-extending the tail.
    fn truncate(&mut self, size: u64) -> Result<()>;

    /// Flushes buffered state to stable storage.
    fn sync(&mut self) -> Result<()>;
}

impl<F: Filer + ?Sized> Filer for Box<F> {
    fn size(&self) -> Result<u64> {
        (**self).size()
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        (**self).read_at(buf, offset)
    }

    fn write_at(&mut self, data: &[u8], offset: u64) -> Result<()> {
        (**self).write_at(data, offset)
    }

    fn truncate(&mut self, size: u64) -> Result<()> {
        (**self).truncate(size)
    }

    fn sync(&mut self) -> Result<()> {
        (**self).sync()
    }
}

/// Filer whose writes can be grouped into all-or-nothing updates.
pub trait TxFiler: Filer {
    fn begin(&mut self) -> Result<()>;
    fn commit(&mut self) -> Result<()>;
    fn rollback(&mut self) -> Result<()>;
    fn in_transaction(&self) -> bool;
}
