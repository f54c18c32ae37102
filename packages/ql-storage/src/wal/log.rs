//! On-disk WAL format.
//!
//! ```text
//! header:  magic[8] | version u32 | page size u32
//! page:    0x01 | page_no u64 | crc32 u32 | page bytes
//! commit:  0x02 | page count u32 | floor u64 | size u64 | crc32 u32
//! ```
//!
//! All integers are big-endian. A page checksum covers `page_no` and the page
//! bytes; the commit checksum covers the commit fields.

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::error::{classify_io_error, Result, StorageError};

pub(crate) const WAL_MAGIC: &[u8; 8] = b"QLSTWAL1";
pub(crate) const WAL_VERSION: u32 = 1;
pub(crate) const WAL_HEADER_SIZE: usize = 16;
pub(crate) const PAGE_SIZE: usize = 4096;

const FRAME_PAGE: u8 = 1;
const FRAME_COMMIT: u8 = 2;

/// Serializes one transaction into a complete WAL image.
pub(crate) fn encode_log<'a>(
    pages: impl ExactSizeIterator<Item = (u64, &'a [u8])>,
    floor: u64,
    size: u64,
) -> Result<Vec<u8>> {
    let count = u32::try_from(pages.len()).map_err(|_| {
        StorageError::TransactionState("too many dirty pages in one transaction".to_string())
    })?;

    let mut buf = Vec::with_capacity(WAL_HEADER_SIZE + pages.len() * (PAGE_SIZE + 13) + 25);
    buf.extend_from_slice(WAL_MAGIC);
    buf.extend_from_slice(&WAL_VERSION.to_be_bytes());
    buf.extend_from_slice(&(PAGE_SIZE as u32).to_be_bytes());

    for (page_no, page) in pages {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&page_no.to_be_bytes());
        hasher.update(page);
        buf.push(FRAME_PAGE);
        buf.extend_from_slice(&page_no.to_be_bytes());
        buf.extend_from_slice(&hasher.finalize().to_be_bytes());
        buf.extend_from_slice(page);
    }

    let mut commit = Vec::with_capacity(20);
    commit.extend_from_slice(&count.to_be_bytes());
    commit.extend_from_slice(&floor.to_be_bytes());
    commit.extend_from_slice(&size.to_be_bytes());
    buf.push(FRAME_COMMIT);
    buf.extend_from_slice(&commit);
    buf.extend_from_slice(&crc32fast::hash(&commit).to_be_bytes());
    Ok(buf)
}

/// What a leftover WAL file contains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalSummary {
    /// File length in bytes
    pub bytes: u64,
    /// Page frames with a valid checksum
    pub pages: u64,
    /// A valid commit frame follows the pages
    pub committed: bool,
    /// Size the main heap would have had after the logged commit
    pub final_size: Option<u64>,
    /// Trailing bytes that do not form a valid frame
    pub torn_bytes: u64,
}

/// Parses a WAL file without applying it.
pub fn inspect_wal(path: impl AsRef<Path>) -> Result<WalSummary> {
    let path = path.as_ref();
    let data = fs::read(path).map_err(|e| classify_io_error(e, "read WAL"))?;
    let mut summary = WalSummary {
        bytes: data.len() as u64,
        pages: 0,
        committed: false,
        final_size: None,
        torn_bytes: 0,
    };
    if data.is_empty() {
        return Ok(summary);
    }
    if data.len() < WAL_HEADER_SIZE || &data[..8] != WAL_MAGIC {
        return Err(StorageError::BadFormat(format!(
            "invalid WAL header in {}",
            path.display()
        )));
    }
    let version = u32::from_be_bytes(read_array(&data, 8));
    if version != WAL_VERSION {
        return Err(StorageError::BadFormat(format!(
            "unsupported WAL version {}",
            version
        )));
    }

    let mut pos = WAL_HEADER_SIZE;
    while pos < data.len() {
        match data[pos] {
            FRAME_PAGE if pos + 13 + PAGE_SIZE <= data.len() => {
                let page_no = &data[pos + 1..pos + 9];
                let crc = u32::from_be_bytes(read_array(&data, pos + 9));
                let page = &data[pos + 13..pos + 13 + PAGE_SIZE];
                let mut hasher = crc32fast::Hasher::new();
                hasher.update(page_no);
                hasher.update(page);
                if hasher.finalize() != crc {
                    break;
                }
                summary.pages += 1;
                pos += 13 + PAGE_SIZE;
            }
            FRAME_COMMIT if pos + 25 <= data.len() => {
                let fields = &data[pos + 1..pos + 21];
                let crc = u32::from_be_bytes(read_array(&data, pos + 21));
                if crc32fast::hash(fields) != crc {
                    break;
                }
                let count = u32::from_be_bytes(read_array(fields, 0));
                summary.committed = u64::from(count) == summary.pages;
                summary.final_size = Some(u64::from_be_bytes(read_array(fields, 12)));
                pos += 25;
                break;
            }
            _ => break,
        }
    }
    summary.torn_bytes = (data.len() - pos) as u64;
    Ok(summary)
}

fn read_array<const N: usize>(buf: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[offset..offset + N]);
    out
}
