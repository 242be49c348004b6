// src/pkpass/archive.rs

//! Store-only ZIP container writer
//!
//! Wallet clients expect a plain ZIP: one local record per entry followed by
//! the central directory and the end-of-central-directory record. Nothing is
//! compressed, there is no ZIP64, no data descriptors and no extra fields.
//!
//! Layout produced by [`build_archive`]:
//!
//! ```text
//! [local header 0][name 0][payload 0] ... [local header n-1][name][payload]
//! [central header 0][name 0] ... [central header n-1][name n-1]
//! [end of central directory]
//! ```
//!
//! All multi-byte fields are little-endian. Local and central records are
//! written in the same entry order, and the writer checks its own offset
//! bookkeeping against the buffer after each pass.

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use super::entry::{EntryList, PackageEntry};
use crate::checksum::crc32;

pub const LOCAL_HEADER_SIGNATURE: u32 = 0x0403_4b50;
pub const CENTRAL_HEADER_SIGNATURE: u32 = 0x0201_4b50;
pub const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0605_4b50;

/// Version needed to extract (2.0) and version made by
pub const ZIP_VERSION: u16 = 20;

/// Compression method 0 (stored)
pub const METHOD_STORED: u16 = 0;

/// Placeholder DOS time (00:00:00)
pub const DOS_TIME: u16 = 0x0000;

/// Placeholder DOS date (1980-01-01)
pub const DOS_DATE: u16 = 0x0021;

/// Fixed part of a local file header
pub const LOCAL_HEADER_LEN: usize = 30;

/// Fixed part of a central directory header
pub const CENTRAL_HEADER_LEN: usize = 46;

/// End of central directory record without comment
pub const END_RECORD_LEN: usize = 22;

/// Errors raised while writing or reading an archive
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Duplicate archive entry: {0}")]
    DuplicateEntry(String),

    #[error("Entry name too long ({len} bytes): {name}")]
    NameTooLong { name: String, len: usize },

    #[error("Too many entries for a non-ZIP64 archive: {0}")]
    TooManyEntries(usize),

    #[error("Archive too large for a non-ZIP64 container: {0}")]
    TooLarge(String),

    #[error("Archive layout inconsistent: {0}")]
    Consistency(String),

    #[error("Malformed archive: {0}")]
    Malformed(String),

    #[error("CRC-32 mismatch for {name}: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        name: String,
        expected: u32,
        actual: u32,
    },
}

/// Offsets and sizes of the central directory in a finished archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArchiveLayout {
    pub entry_count: u16,
    pub central_directory_offset: u32,
    pub central_directory_size: u32,
}

struct PlannedEntry<'a> {
    entry: &'a PackageEntry,
    name_len: u16,
    size: u32,
    crc32: u32,
    local_offset: u32,
}

fn to_u32(value: usize, what: &str) -> Result<u32, ArchiveError> {
    u32::try_from(value).map_err(|_| ArchiveError::TooLarge(format!("{} is {} bytes", what, value)))
}

fn put_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Serialize entries into a store-only ZIP archive
pub fn build_archive(entries: &EntryList) -> Result<Vec<u8>, ArchiveError> {
    let (bytes, layout) = build_archive_with_layout(entries)?;
    debug!(
        "Built archive: {} entries, {} bytes, central directory at {}",
        layout.entry_count,
        bytes.len(),
        layout.central_directory_offset
    );
    Ok(bytes)
}

/// Serialize entries and also return the central directory layout
pub fn build_archive_with_layout(
    entries: &EntryList,
) -> Result<(Vec<u8>, ArchiveLayout), ArchiveError> {
    let entry_count = u16::try_from(entries.len())
        .map_err(|_| ArchiveError::TooManyEntries(entries.len()))?;

    // Validate names and sizes and assign offsets before writing anything
    let mut planned = Vec::with_capacity(entries.len());
    let mut offset: usize = 0;
    for entry in entries {
        let name_len = u16::try_from(entry.name().len()).map_err(|_| ArchiveError::NameTooLong {
            name: entry.name().to_string(),
            len: entry.name().len(),
        })?;
        let size = to_u32(entry.len(), entry.name())?;
        let local_offset = to_u32(offset, "local header offset")?;

        planned.push(PlannedEntry {
            entry,
            name_len,
            size,
            crc32: crc32(entry.payload()),
            local_offset,
        });
        offset += LOCAL_HEADER_LEN + entry.name().len() + entry.len();
    }

    let central_size: usize = planned
        .iter()
        .map(|p| CENTRAL_HEADER_LEN + p.entry.name().len())
        .sum();
    let central_offset = to_u32(offset, "central directory offset")?;
    let central_size_u32 = to_u32(central_size, "central directory")?;
    to_u32(offset + central_size + END_RECORD_LEN, "archive")?;

    let mut buf = Vec::with_capacity(offset + central_size + END_RECORD_LEN);

    // Pass 1: local records
    for p in &planned {
        if buf.len() != p.local_offset as usize {
            return Err(ArchiveError::Consistency(format!(
                "local header for {} expected at {}, buffer at {}",
                p.entry.name(),
                p.local_offset,
                buf.len()
            )));
        }
        put_u32(&mut buf, LOCAL_HEADER_SIGNATURE);
        put_u16(&mut buf, ZIP_VERSION);
        put_u16(&mut buf, 0); // flags
        put_u16(&mut buf, METHOD_STORED);
        put_u16(&mut buf, DOS_TIME);
        put_u16(&mut buf, DOS_DATE);
        put_u32(&mut buf, p.crc32);
        put_u32(&mut buf, p.size); // compressed
        put_u32(&mut buf, p.size); // uncompressed
        put_u16(&mut buf, p.name_len);
        put_u16(&mut buf, 0); // extra field length
        buf.extend_from_slice(p.entry.name().as_bytes());
        buf.extend_from_slice(p.entry.payload());
    }

    if buf.len() != central_offset as usize {
        return Err(ArchiveError::Consistency(format!(
            "central directory expected at {}, buffer at {}",
            central_offset,
            buf.len()
        )));
    }

    // Pass 2: central directory, same order
    for p in &planned {
        put_u32(&mut buf, CENTRAL_HEADER_SIGNATURE);
        put_u16(&mut buf, ZIP_VERSION); // version made by
        put_u16(&mut buf, ZIP_VERSION); // version needed
        put_u16(&mut buf, 0); // flags
        put_u16(&mut buf, METHOD_STORED);
        put_u16(&mut buf, DOS_TIME);
        put_u16(&mut buf, DOS_DATE);
        put_u32(&mut buf, p.crc32);
        put_u32(&mut buf, p.size);
        put_u32(&mut buf, p.size);
        put_u16(&mut buf, p.name_len);
        put_u16(&mut buf, 0); // extra field length
        put_u16(&mut buf, 0); // comment length
        put_u16(&mut buf, 0); // disk number start
        put_u16(&mut buf, 0); // internal attributes
        put_u32(&mut buf, 0); // external attributes
        put_u32(&mut buf, p.local_offset);
        buf.extend_from_slice(p.entry.name().as_bytes());
    }

    if buf.len() != central_offset as usize + central_size {
        return Err(ArchiveError::Consistency(format!(
            "central directory size is {}, expected {}",
            buf.len() - central_offset as usize,
            central_size
        )));
    }

    // End of central directory
    put_u32(&mut buf, END_OF_CENTRAL_DIRECTORY_SIGNATURE);
    put_u16(&mut buf, 0); // this disk
    put_u16(&mut buf, 0); // disk with central directory
    put_u16(&mut buf, entry_count);
    put_u16(&mut buf, entry_count);
    put_u32(&mut buf, central_size_u32);
    put_u32(&mut buf, central_offset);
    put_u16(&mut buf, 0); // comment length

    Ok((
        buf,
        ArchiveLayout {
            entry_count,
            central_directory_offset: central_offset,
            central_directory_size: central_size_u32,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u16_at(buf: &[u8], at: usize) -> u16 {
        u16::from_le_bytes([buf[at], buf[at + 1]])
    }

    fn u32_at(buf: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
    }

    #[test]
    fn test_empty_archive_is_end_record_only() {
        let bytes = build_archive(&EntryList::new()).unwrap();
        assert_eq!(bytes.len(), END_RECORD_LEN);
        assert_eq!(u32_at(&bytes, 0), END_OF_CENTRAL_DIRECTORY_SIGNATURE);
        assert_eq!(u16_at(&bytes, 8), 0);
        assert_eq!(u32_at(&bytes, 16), 0);
    }

    #[test]
    fn test_single_entry_layout() {
        let mut entries = EntryList::new();
        entries.add("a", b"hello".to_vec()).unwrap();
        let (bytes, layout) = build_archive_with_layout(&entries).unwrap();

        // local header
        assert_eq!(u32_at(&bytes, 0), LOCAL_HEADER_SIGNATURE);
        assert_eq!(u16_at(&bytes, 4), 20);
        assert_eq!(u16_at(&bytes, 8), METHOD_STORED);
        assert_eq!(u16_at(&bytes, 10), 0x0000);
        assert_eq!(u16_at(&bytes, 12), 0x0021);
        assert_eq!(u32_at(&bytes, 14), crc32(b"hello"));
        assert_eq!(u32_at(&bytes, 18), 5);
        assert_eq!(u32_at(&bytes, 22), 5);
        assert_eq!(u16_at(&bytes, 26), 1);
        assert_eq!(u16_at(&bytes, 28), 0);
        assert_eq!(&bytes[30..31], b"a");
        assert_eq!(&bytes[31..36], b"hello");

        // central header
        assert_eq!(layout.central_directory_offset, 36);
        assert_eq!(layout.central_directory_size, 47);
        assert_eq!(u32_at(&bytes, 36), CENTRAL_HEADER_SIGNATURE);
        assert_eq!(u32_at(&bytes, 36 + 42), 0);

        // end record
        let end = 36 + 47;
        assert_eq!(bytes.len(), end + END_RECORD_LEN);
        assert_eq!(u32_at(&bytes, end), END_OF_CENTRAL_DIRECTORY_SIGNATURE);
        assert_eq!(u16_at(&bytes, end + 8), 1);
        assert_eq!(u16_at(&bytes, end + 10), 1);
        assert_eq!(u32_at(&bytes, end + 12), 47);
        assert_eq!(u32_at(&bytes, end + 16), 36);
    }

    #[test]
    fn test_central_offsets_point_at_local_headers() {
        let mut entries = EntryList::new();
        entries.add("pass.json", b"{}".to_vec()).unwrap();
        entries.add("logo.png", vec![7u8; 300]).unwrap();
        entries.add("empty", Vec::new()).unwrap();
        let (bytes, layout) = build_archive_with_layout(&entries).unwrap();

        let mut cursor = layout.central_directory_offset as usize;
        for entry in &entries {
            assert_eq!(u32_at(&bytes, cursor), CENTRAL_HEADER_SIGNATURE);
            let name_len = u16_at(&bytes, cursor + 28) as usize;
            let local = u32_at(&bytes, cursor + 42) as usize;
            assert_eq!(&bytes[cursor + 46..cursor + 46 + name_len], entry.name().as_bytes());
            assert_eq!(u32_at(&bytes, local), LOCAL_HEADER_SIGNATURE);
            assert_eq!(&bytes[local + 30..local + 30 + name_len], entry.name().as_bytes());
            cursor += CENTRAL_HEADER_LEN + name_len;
        }
        assert_eq!(
            cursor,
            (layout.central_directory_offset + layout.central_directory_size) as usize
        );
    }

    #[test]
    fn test_name_too_long() {
        let mut entries = EntryList::new();
        entries.add("n".repeat(70_000), b"x".to_vec()).unwrap();
        let err = build_archive(&entries).unwrap_err();
        assert!(matches!(err, ArchiveError::NameTooLong { len: 70_000, .. }));
    }

    #[test]
    fn test_too_many_entries() {
        let mut entries = EntryList::new();
        for i in 0..=u16::MAX as usize {
            entries.push(PackageEntry::new(format!("{}", i), Vec::new())).unwrap();
        }
        let err = build_archive(&entries).unwrap_err();
        assert!(matches!(err, ArchiveError::TooManyEntries(65_536)));
    }
}
