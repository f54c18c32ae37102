//! Write-ahead log coordinator.
//!
//! [`WalFiler`] buffers every write of a transaction in a page overlay. On
//! commit the dirty pages go to the WAL file first, then to the main file,
//! then the WAL is truncated. A WAL that is still non-empty at the next open
//! means the previous process died mid-commit; the engine refuses to open it
//! and never replays it.

mod log;

pub use log::{inspect_wal, WalSummary};

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{classify_io_error, Result, StorageError};
use crate::filer::{Filer, TxFiler};

use log::{encode_log, PAGE_SIZE};

/// Pending state of an open transaction.
#[derive(Debug)]
struct Pending {
    /// Dirty pages by page number
    pages: BTreeMap<u64, Box<[u8]>>,
    /// Size of the filer as seen inside the transaction
    size: u64,
    /// Base bytes at or above this offset are dead (truncated away)
    floor: u64,
}

/// Filer that makes groups of writes atomic through a WAL file.
#[derive(Debug)]
pub struct WalFiler<F> {
    base: F,
    wal: File,
    wal_path: PathBuf,
    pending: Option<Pending>,
    sync_on_commit: bool,
    poisoned: bool,
}

impl<F: Filer> WalFiler<F> {
    /// Wraps `base`. The WAL file must be empty.
    pub fn new(base: F, wal: File, wal_path: impl Into<PathBuf>, sync_on_commit: bool) -> Self {
        Self {
            base,
            wal,
            wal_path: wal_path.into(),
            pending: None,
            sync_on_commit,
            poisoned: false,
        }
    }

    pub fn wal_path(&self) -> &Path {
        &self.wal_path
    }

    /// Releases the base filer and the WAL file handle.
    pub fn into_parts(self) -> (F, File) {
        (self.base, self.wal)
    }

    fn check_usable(&self) -> Result<()> {
        if self.poisoned {
            return Err(StorageError::IoError(format!(
                "commit failed after logging; WAL {} must be inspected",
                self.wal_path.display()
            )));
        }
        Ok(())
    }

    fn pending_mut(&mut self, op: &str) -> Result<&mut Pending> {
        self.check_usable()?;
        self.pending
            .as_mut()
            .ok_or_else(|| StorageError::TransactionState(format!("{} outside transaction", op)))
    }

    /// Reads live base bytes; anything at or above `floor` reads as zero.
    fn read_base(&self, buf: &mut [u8], offset: u64, floor: u64) -> Result<()> {
        let live = floor.saturating_sub(offset).min(buf.len() as u64) as usize;
        if live > 0 {
            self.base.read_at(&mut buf[..live], offset)?;
        }
        buf[live..].fill(0);
        Ok(())
    }

    fn load_page(&self, page_no: u64, floor: u64) -> Result<Box<[u8]>> {
        let mut page = vec![0u8; PAGE_SIZE].into_boxed_slice();
        self.read_base(&mut page, page_no * PAGE_SIZE as u64, floor)?;
        Ok(page)
    }

    fn write_log(&mut self, pending: &Pending) -> Result<()> {
        let image = encode_log(
            pending.pages.iter().map(|(no, page)| (*no, &page[..])),
            pending.floor,
            pending.size,
        )?;
        write_image(&mut self.wal, &image).map_err(|e| classify_io_error(e, "write WAL"))?;
        if self.sync_on_commit {
            self.wal
                .sync_data()
                .map_err(|e| classify_io_error(e, "sync WAL"))?;
        }
        Ok(())
    }

    fn apply(&mut self, pending: &Pending) -> Result<()> {
        if pending.floor < self.base.size()? {
            self.base.truncate(pending.floor)?;
        }
        for (page_no, page) in &pending.pages {
            let start = page_no * PAGE_SIZE as u64;
            if start >= pending.size {
                continue;
            }
            let len = (pending.size - start).min(PAGE_SIZE as u64) as usize;
            self.base.write_at(&page[..len], start)?;
        }
        if self.base.size()? != pending.size {
            self.base.truncate(pending.size)?;
        }
        if self.sync_on_commit {
            self.base.sync()?;
        }
        Ok(())
    }

    fn clear_log(&mut self) -> Result<()> {
        self.wal
            .set_len(0)
            .map_err(|e| classify_io_error(e, "truncate WAL"))?;
        if self.sync_on_commit {
            self.wal
                .sync_data()
                .map_err(|e| classify_io_error(e, "sync WAL"))?;
        }
        Ok(())
    }

    /// Logs the open transaction without applying it, as a crash would.
    #[cfg(test)]
    pub(crate) fn log_without_apply(&mut self) -> Result<()> {
        let pending = self
            .pending
            .take()
            .ok_or_else(|| StorageError::TransactionState("no transaction".to_string()))?;
        self.write_log(&pending)
    }
}

fn write_image(wal: &mut File, image: &[u8]) -> io::Result<()> {
    wal.set_len(0)?;
    wal.seek(SeekFrom::Start(0))?;
    wal.write_all(image)?;
    wal.flush()
}

impl<F: Filer> Filer for WalFiler<F> {
    fn size(&self) -> Result<u64> {
        self.check_usable()?;
        match &self.pending {
            Some(pending) => Ok(pending.size),
            None => self.base.size(),
        }
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        self.check_usable()?;
        let Some(pending) = &self.pending else {
            return self.base.read_at(buf, offset);
        };

        let end = offset + buf.len() as u64;
        if end > pending.size {
            return Err(StorageError::BadFormat(format!(
                "read of {} bytes at {} past end {}",
                buf.len(),
                offset,
                pending.size
            )));
        }

        let mut done = 0usize;
        while done < buf.len() {
            let pos = offset + done as u64;
            let page_no = pos / PAGE_SIZE as u64;
            let in_page = (pos % PAGE_SIZE as u64) as usize;
            let n = (PAGE_SIZE - in_page).min(buf.len() - done);
            let chunk = &mut buf[done..done + n];
            match pending.pages.get(&page_no) {
                Some(page) => chunk.copy_from_slice(&page[in_page..in_page + n]),
                None => self.read_base(chunk, pos, pending.floor)?,
            }
            done += n;
        }
        Ok(())
    }

    fn write_at(&mut self, data: &[u8], offset: u64) -> Result<()> {
        let floor = self.pending_mut("write")?.floor;

        let mut done = 0usize;
        while done < data.len() {
            let pos = offset + done as u64;
            let page_no = pos / PAGE_SIZE as u64;
            let in_page = (pos % PAGE_SIZE as u64) as usize;
            let n = (PAGE_SIZE - in_page).min(data.len() - done);

            let loaded = match self.pending.as_ref().map(|p| p.pages.contains_key(&page_no)) {
                Some(false) => Some(self.load_page(page_no, floor)?),
                _ => None,
            };
            let pending = self.pending_mut("write")?;
            if let Some(page) = loaded {
                pending.pages.insert(page_no, page);
            }
            if let Some(page) = pending.pages.get_mut(&page_no) {
                page[in_page..in_page + n].copy_from_slice(&data[done..done + n]);
            }
            done += n;
        }

        let pending = self.pending_mut("write")?;
        pending.size = pending.size.max(offset + data.len() as u64);
        Ok(())
    }

    fn truncate(&mut self, size: u64) -> Result<()> {
        let pending = self.pending_mut("truncate")?;
        pending.size = size;
        pending.floor = pending.floor.min(size);

        let boundary = size / PAGE_SIZE as u64;
        let in_page = (size % PAGE_SIZE as u64) as usize;
        pending
            .pages
            .retain(|page_no, _| *page_no < boundary || (*page_no == boundary && in_page > 0));
        if let Some(page) = pending.pages.get_mut(&boundary) {
            page[in_page..].fill(0);
        }
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.check_usable()?;
        self.base.sync()
    }
}

impl<F: Filer> TxFiler for WalFiler<F> {
    fn begin(&mut self) -> Result<()> {
        self.check_usable()?;
        if self.pending.is_some() {
            return Err(StorageError::TransactionState(
                "transaction already open".to_string(),
            ));
        }
        let size = self.base.size()?;
        self.pending = Some(Pending {
            pages: BTreeMap::new(),
            size,
            floor: size,
        });
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.check_usable()?;
        let pending = self
            .pending
            .take()
            .ok_or_else(|| StorageError::TransactionState("commit without transaction".to_string()))?;

        let base_size = self.base.size()?;
        if pending.pages.is_empty() && pending.size == base_size && pending.floor == base_size {
            return Ok(());
        }

        if let Err(err) = self.write_log(&pending) {
            if let Err(clear) = self.clear_log() {
                tracing::warn!(
                    wal = %self.wal_path.display(),
                    "clearing WAL after failed write failed: {}",
                    clear
                );
            }
            return Err(err);
        }
        if let Err(err) = self.apply(&pending) {
            tracing::error!(
                wal = %self.wal_path.display(),
                "applying logged commit failed: {}",
                err
            );
            self.poisoned = true;
            return Err(err);
        }
        self.clear_log()
    }

    fn rollback(&mut self) -> Result<()> {
        self.check_usable()?;
        if self.pending.take().is_none() {
            return Err(StorageError::TransactionState(
                "rollback without transaction".to_string(),
            ));
        }
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.pending.is_some()
    }
}
