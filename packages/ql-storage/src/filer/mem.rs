use crate::error::{Result, StorageError};

use super::Filer;

/// Filer backed by a `Vec<u8>`.
#[derive(Debug, Default, Clone)]
pub struct MemFiler {
    data: Vec<u8>,
}

impl MemFiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl Filer for MemFiler {
    fn size(&self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        let start = offset as usize;
        let end = start
            .checked_add(buf.len())
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| {
                StorageError::BadFormat(format!(
                    "read of {} bytes at {} past end {}",
                    buf.len(),
                    offset,
                    self.data.len()
                ))
            })?;
        buf.copy_from_slice(&self.data[start..end]);
        Ok(())
    }

    fn write_at(&mut self, data: &[u8], offset: u64) -> Result<()> {
        let start = offset as usize;
        let end = start + data.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[start..end].copy_from_slice(data);
        Ok(())
    }

    fn truncate(&mut self, size: u64) -> Result<()> {
        self.data.resize(size as usize, 0);
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }
}
