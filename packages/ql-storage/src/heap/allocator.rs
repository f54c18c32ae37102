//! Block allocator over a filer.
//!
//! Blocks are laid out back to back from offset 0:
//!
//! ```text
//! handle u64 | capacity u32 | length u32 | capacity bytes
//! ```
//!
//! Handle 0 marks a free block. The in-memory index is derived entirely
//! from a scan, so it can be rebuilt at any time (open, rollback).

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::{Result, StorageError};
use crate::filer::{Filer, TxFiler};

use super::{AllocStats, Handle, Heap, TxHeap};

const BLOCK_HEADER: u64 = 16;
const FREE_HANDLE: Handle = 0;
const ALIGN: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Block {
    offset: u64,
    cap: u32,
    len: u32,
}

impl Block {
    fn end(&self) -> u64 {
        self.offset + BLOCK_HEADER + u64::from(self.cap)
    }
}

/// Where a new block goes.
#[derive(Debug, Clone, Copy)]
struct Placement {
    offset: u64,
    cap: u32,
    reused: bool,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Layout {
    used: HashMap<Handle, Block>,
    /// Free blocks: offset -> capacity
    free: BTreeMap<u64, u32>,
    end: u64,
}

impl Layout {
    fn scan<F: Filer>(filer: &F) -> Result<Self> {
        let size = filer.size()?;
        let mut layout = Layout {
            end: size,
            ..Layout::default()
        };

        let mut offset = 0u64;
        while offset < size {
            if size - offset < BLOCK_HEADER {
                return Err(StorageError::BadFormat(format!(
                    "truncated block header at offset {}",
                    offset
                )));
            }
            let mut header = [0u8; BLOCK_HEADER as usize];
            filer.read_at(&mut header, offset)?;
            let (handle, cap, len) = decode_header(&header);
            if len > cap {
                return Err(StorageError::BadFormat(format!(
                    "block at offset {} has length {} above capacity {}",
                    offset, len, cap
                )));
            }
            let block = Block { offset, cap, len };
            if block.end() > size {
                return Err(StorageError::BadFormat(format!(
                    "block at offset {} extends past end of heap",
                    offset
                )));
            }

            if handle == FREE_HANDLE {
                layout.free.insert(offset, cap);
            } else if layout.used.insert(handle, block).is_some() {
                return Err(StorageError::BadFormat(format!(
                    "handle {} allocated twice",
                    handle
                )));
            }
            offset = block.end();
        }
        Ok(layout)
    }

    fn stats(&self) -> AllocStats {
        AllocStats {
            allocs: self.used.len() as u64,
            alloc_bytes: self.used.values().map(|b| u64::from(b.len)).sum(),
            free_blocks: self.free.len() as u64,
            free_bytes: self.free.values().map(|cap| u64::from(*cap)).sum(),
            total_bytes: self.end,
        }
    }
}

fn encode_header(handle: Handle, cap: u32, len: u32) -> [u8; BLOCK_HEADER as usize] {
    let mut header = [0u8; BLOCK_HEADER as usize];
    header[0..8].copy_from_slice(&handle.to_be_bytes());
    header[8..12].copy_from_slice(&cap.to_be_bytes());
    header[12..16].copy_from_slice(&len.to_be_bytes());
    header
}

fn decode_header(header: &[u8; BLOCK_HEADER as usize]) -> (Handle, u32, u32) {
    let mut handle = [0u8; 8];
    handle.copy_from_slice(&header[0..8]);
    let mut cap = [0u8; 4];
    cap.copy_from_slice(&header[8..12]);
    let mut len = [0u8; 4];
    len.copy_from_slice(&header[12..16]);
    (
        Handle::from_be_bytes(handle),
        u32::from_be_bytes(cap),
        u32::from_be_bytes(len),
    )
}

fn capacity_for(len: u32) -> u32 {
    len.max(ALIGN)
        .checked_next_multiple_of(ALIGN)
        .unwrap_or(u32::MAX)
}

fn record_len(data: &[u8]) -> Result<u32> {
    u32::try_from(data.len()).map_err(|_| StorageError::RecordTooLarge { len: data.len() })
}

/// Handle-addressed heap over a [`Filer`].
///
/// Handles are dense: a fresh heap hands out 1, 2, 3, ... and freed handles
/// are reused smallest first.
#[derive(Debug)]
pub struct Allocator<F> {
    filer: F,
    layout: Layout,
    free_handles: BTreeSet<Handle>,
    next_handle: Handle,
}

impl<F: Filer> Allocator<F> {
    /// Opens a heap over `filer`, scanning existing blocks.
    pub fn open(filer: F) -> Result<Self> {
        let layout = Layout::scan(&filer)?;
        let mut allocator = Self {
            filer,
            layout: Layout::default(),
            free_handles: BTreeSet::new(),
            next_handle: 1,
        };
        allocator.install(layout);
        Ok(allocator)
    }

    /// Rebuilds the in-memory index from storage.
    pub fn reload(&mut self) -> Result<()> {
        let layout = Layout::scan(&self.filer)?;
        self.install(layout);
        Ok(())
    }

    fn install(&mut self, layout: Layout) {
        let max = layout.used.keys().copied().max().unwrap_or(0);
        self.free_handles = (1..max).filter(|h| !layout.used.contains_key(h)).collect();
        self.next_handle = max + 1;
        self.layout = layout;
    }

    /// Number of live allocations.
    pub fn len(&self) -> usize {
        self.layout.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layout.used.is_empty()
    }

    pub fn filer(&self) -> &F {
        &self.filer
    }

    pub fn into_filer(self) -> F {
        self.filer
    }

    fn block(&self, handle: Handle) -> Result<Block> {
        self.layout
            .used
            .get(&handle)
            .copied()
            .ok_or(StorageError::NotFound { handle })
    }

    fn place(&self, len: u32) -> Placement {
        let reusable = self
            .layout
            .free
            .iter()
            .find(|(_, cap)| **cap >= len)
            .map(|(offset, cap)| (*offset, *cap));
        match reusable {
            Some((offset, cap)) => Placement {
                offset,
                cap,
                reused: true,
            },
            None => Placement {
                offset: self.layout.end,
                cap: capacity_for(len),
                reused: false,
            },
        }
    }

    fn write_block(&mut self, handle: Handle, offset: u64, cap: u32, data: &[u8], pad: bool) -> Result<()> {
        let len = record_len(data)?;
        let body = if pad { cap as usize } else { data.len() };
        let mut buf = Vec::with_capacity(BLOCK_HEADER as usize + body);
        buf.extend_from_slice(&encode_header(handle, cap, len));
        buf.extend_from_slice(data);
        buf.resize(BLOCK_HEADER as usize + body, 0);
        self.filer.write_at(&buf, offset)
    }

    fn take_placement(&mut self, placement: Placement) {
        if placement.reused {
            self.layout.free.remove(&placement.offset);
        } else {
            self.layout.end = placement.offset + BLOCK_HEADER + u64::from(placement.cap);
        }
    }

    /// Releases the storage of `block`, shrinking the heap when it is the tail.
    fn release_block(&mut self, block: Block) -> Result<()> {
        if block.end() == self.layout.end {
            let mut new_end = block.offset;
            while let Some((&offset, &cap)) = self.layout.free.last_key_value() {
                if offset + BLOCK_HEADER + u64::from(cap) != new_end {
                    break;
                }
                new_end = offset;
                self.layout.free.remove(&offset);
            }
            self.filer.truncate(new_end)?;
            self.layout.end = new_end;
        } else {
            self.filer
                .write_at(&encode_header(FREE_HANDLE, block.cap, 0), block.offset)?;
            self.layout.free.insert(block.offset, block.cap);
        }
        Ok(())
    }

    fn release_handle(&mut self, handle: Handle) {
        if handle + 1 == self.next_handle {
            self.next_handle = handle;
            while self.next_handle > 1 && self.free_handles.remove(&(self.next_handle - 1)) {
                self.next_handle -= 1;
            }
        } else {
            self.free_handles.insert(handle);
        }
    }
}

impl<F: Filer> Heap for Allocator<F> {
    fn alloc(&mut self, data: &[u8]) -> Result<Handle> {
        let len = record_len(data)?;
        let handle = self
            .free_handles
            .first()
            .copied()
            .unwrap_or(self.next_handle);
        let placement = self.place(len);
        self.write_block(handle, placement.offset, placement.cap, data, !placement.reused)?;

        self.take_placement(placement);
        if !self.free_handles.remove(&handle) {
            self.next_handle += 1;
        }
        self.layout.used.insert(
            handle,
            Block {
                offset: placement.offset,
                cap: placement.cap,
                len,
            },
        );
        Ok(handle)
    }

    fn free(&mut self, handle: Handle) -> Result<()> {
        let block = self.block(handle)?;
        self.release_block(block)?;
        self.layout.used.remove(&handle);
        self.release_handle(handle);
        Ok(())
    }

    fn realloc(&mut self, handle: Handle, data: &[u8]) -> Result<()> {
        let block = self.block(handle)?;
        let len = record_len(data)?;

        if len <= block.cap {
            self.write_block(handle, block.offset, block.cap, data, false)?;
            self.layout.used.insert(handle, Block { len, ..block });
            return Ok(());
        }

        if block.end() == self.layout.end {
            let cap = capacity_for(len);
            self.write_block(handle, block.offset, cap, data, true)?;
            let grown = Block {
                offset: block.offset,
                cap,
                len,
            };
            self.layout.end = grown.end();
            self.layout.used.insert(handle, grown);
            return Ok(());
        }

        let placement = self.place(len);
        self.write_block(handle, placement.offset, placement.cap, data, !placement.reused)?;
        self.take_placement(placement);
        self.layout.used.insert(
            handle,
            Block {
                offset: placement.offset,
                cap: placement.cap,
                len,
            },
        );
        self.release_block(block)
    }

    fn get(&self, handle: Handle) -> Result<Vec<u8>> {
        let block = self.block(handle)?;
        let mut buf = vec![0u8; block.len as usize];
        self.filer.read_at(&mut buf, block.offset + BLOCK_HEADER)?;
        Ok(buf)
    }

    fn verify(&self) -> Result<AllocStats> {
        let on_disk = Layout::scan(&self.filer)?;
        if on_disk != self.layout {
            return Err(StorageError::BadFormat(format!(
                "heap index out of sync with storage ({} live in memory, {} on disk)",
                self.layout.used.len(),
                on_disk.used.len()
            )));
        }
        Ok(on_disk.stats())
    }
}

impl<F: TxFiler> TxHeap for Allocator<F> {
    fn begin(&mut self) -> Result<()> {
        self.filer.begin()
    }

    fn commit(&mut self) -> Result<()> {
        let result = self.filer.commit();
        if result.is_err() {
            // A poisoned filer refuses the scan as well.
            if let Err(e) = self.reload() {
                tracing::warn!("Reloading heap index after failed commit failed: {}", e);
            }
        }
        result
    }

    fn rollback(&mut self) -> Result<()> {
        self.filer.rollback()?;
        self.reload()
    }

    fn in_transaction(&self) -> bool {
        self.filer.in_transaction()
    }

    fn sync(&mut self) -> Result<()> {
        self.filer.sync()
    }
}
