use crate::error::Result;

use super::Filer;

/// View of a filer starting at a fixed offset.
///
/// Used to keep the file header out of the allocator's address space.
#[derive(Debug)]
pub struct InnerFiler<F> {
    outer: F,
    offset: u64,
}

impl<F: Filer> InnerFiler<F> {
    pub fn new(outer: F, offset: u64) -> Self {
        Self { outer, offset }
    }

    pub fn get_ref(&self) -> &F {
        &self.outer
    }

    pub fn into_inner(self) -> F {
        self.outer
    }
}

impl<F: Filer> Filer for InnerFiler<F> {
    fn size(&self) -> Result<u64> {
        Ok(self.outer.size()?.saturating_sub(self.offset))
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        self.outer.read_at(buf, offset + self.offset)
    }

    fn write_at(&mut self, data: &[u8], offset: u64) -> Result<()> {
        self.outer.write_at(data, offset + self.offset)
    }

    fn truncate(&mut self, size: u64) -> Result<()> {
        self.outer.truncate(size + self.offset)
    }

    fn sync(&mut self) -> Result<()> {
        self.outer.sync()
    }
}
