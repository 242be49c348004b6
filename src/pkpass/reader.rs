// src/pkpass/reader.rs

//! Store-only ZIP container reader
//!
//! Reads back archives in the shape [`build_archive`](super::archive::build_archive)
//! writes: locates the end record, walks the central directory and checks
//! each local header against its central entry before trusting the payload.
//! Only stored entries are accepted.

use serde::Serialize;
use tracing::trace;

use super::archive::{
    ArchiveError, ArchiveLayout, CENTRAL_HEADER_SIGNATURE, END_OF_CENTRAL_DIRECTORY_SIGNATURE,
    END_RECORD_LEN, LOCAL_HEADER_SIGNATURE, METHOD_STORED,
};
use super::entry::EntryList;
use crate::checksum::crc32;

/// Per-entry metadata from the central directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveEntryInfo {
    pub name: String,
    pub size: u32,
    pub crc32: u32,
    pub local_header_offset: u32,
}

/// Result of reading an archive
#[derive(Debug, Clone)]
pub struct ArchiveContents {
    pub entries: EntryList,
    pub info: Vec<ArchiveEntryInfo>,
    pub layout: ArchiveLayout,
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn at(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8], ArchiveError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| ArchiveError::Malformed(format!("truncated {} at {}", what, self.pos)))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u16(&mut self, what: &str) -> Result<u16, ArchiveError> {
        let b = self.take(2, what)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self, what: &str) -> Result<u32, ArchiveError> {
        let b = self.take(4, what)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn skip(&mut self, len: usize, what: &str) -> Result<(), ArchiveError> {
        self.take(len, what).map(|_| ())
    }
}

/// Find the end-of-central-directory record, allowing a trailing comment
fn find_end_record(bytes: &[u8]) -> Result<usize, ArchiveError> {
    if bytes.len() < END_RECORD_LEN {
        return Err(ArchiveError::Malformed(format!(
            "{} bytes is too short for an archive",
            bytes.len()
        )));
    }

    let last = bytes.len() - END_RECORD_LEN;
    let first = last.saturating_sub(u16::MAX as usize);
    let signature = END_OF_CENTRAL_DIRECTORY_SIGNATURE.to_le_bytes();

    (first..=last)
        .rev()
        .find(|&pos| {
            bytes[pos..pos + 4] == signature && {
                let comment_len = u16::from_le_bytes([bytes[pos + 20], bytes[pos + 21]]) as usize;
                pos + END_RECORD_LEN + comment_len == bytes.len()
            }
        })
        .ok_or_else(|| ArchiveError::Malformed("end of central directory not found".to_string()))
}

/// Parse a store-only archive into its ordered entries
pub fn read_archive(bytes: &[u8]) -> Result<ArchiveContents, ArchiveError> {
    let end_pos = find_end_record(bytes)?;
    let mut end = Cursor::at(bytes, end_pos + 4);
    let this_disk = end.u16("end record")?;
    let central_disk = end.u16("end record")?;
    let disk_entries = end.u16("end record")?;
    let total_entries = end.u16("end record")?;
    let central_size = end.u32("end record")?;
    let central_offset = end.u32("end record")?;

    if this_disk != 0 || central_disk != 0 || disk_entries != total_entries {
        return Err(ArchiveError::Malformed(
            "multi-disk archives are not supported".to_string(),
        ));
    }
    if central_offset as usize + central_size as usize != end_pos {
        return Err(ArchiveError::Consistency(format!(
            "central directory at {} with size {} does not end at the end record ({})",
            central_offset, central_size, end_pos
        )));
    }

    let mut entries = EntryList::new();
    let mut info = Vec::with_capacity(total_entries as usize);
    let mut central = Cursor::at(bytes, central_offset as usize);

    for index in 0..total_entries {
        let what = "central header";
        if central.u32(what)? != CENTRAL_HEADER_SIGNATURE {
            return Err(ArchiveError::Malformed(format!(
                "bad central header signature for entry {}",
                index
            )));
        }
        central.skip(4, what)?; // version made by, version needed
        let flags = central.u16(what)?;
        let method = central.u16(what)?;
        central.skip(4, what)?; // time, date
        let crc = central.u32(what)?;
        let compressed = central.u32(what)?;
        let uncompressed = central.u32(what)?;
        let name_len = central.u16(what)? as usize;
        let extra_len = central.u16(what)? as usize;
        let comment_len = central.u16(what)? as usize;
        central.skip(8, what)?; // disk start, internal attrs, external attrs
        let local_offset = central.u32(what)?;
        let name_bytes = central.take(name_len, "entry name")?;
        central.skip(extra_len + comment_len, what)?;

        let name = std::str::from_utf8(name_bytes)
            .map_err(|_| ArchiveError::Malformed(format!("entry {} name is not UTF-8", index)))?
            .to_string();

        if method != METHOD_STORED || compressed != uncompressed {
            return Err(ArchiveError::Malformed(format!(
                "entry {} is not stored (method {})",
                name, method
            )));
        }
        if flags & 0x0001 != 0 {
            return Err(ArchiveError::Malformed(format!("entry {} is encrypted", name)));
        }

        let payload =
            read_local_record(bytes, &name, local_offset, uncompressed, crc, central_offset)?;
        let actual = crc32(payload);
        if actual != crc {
            return Err(ArchiveError::ChecksumMismatch {
                name,
                expected: crc,
                actual,
            });
        }

        trace!("Read entry {} ({} bytes) at {}", name, uncompressed, local_offset);
        info.push(ArchiveEntryInfo {
            name: name.clone(),
            size: uncompressed,
            crc32: crc,
            local_header_offset: local_offset,
        });
        entries.add(name, payload.to_vec())?;
    }

    if central.pos != end_pos {
        return Err(ArchiveError::Consistency(format!(
            "central directory records end at {}, expected {}",
            central.pos, end_pos
        )));
    }

    Ok(ArchiveContents {
        entries,
        info,
        layout: ArchiveLayout {
            entry_count: total_entries,
            central_directory_offset: central_offset,
            central_directory_size: central_size,
        },
    })
}

fn read_local_record<'a>(
    bytes: &'a [u8],
    name: &str,
    offset: u32,
    size: u32,
    crc: u32,
    central_offset: u32,
) -> Result<&'a [u8], ArchiveError> {
    let what = "local header";
    let mut local = Cursor::at(bytes, offset as usize);
    if local.u32(what)? != LOCAL_HEADER_SIGNATURE {
        return Err(ArchiveError::Consistency(format!(
            "central entry {} points at {}, which is not a local header",
            name, offset
        )));
    }
    local.skip(2, what)?; // version needed
    let flags = local.u16(what)?;
    let method = local.u16(what)?;
    local.skip(4, what)?; // time, date
    let local_crc = local.u32(what)?;
    let compressed = local.u32(what)?;
    let uncompressed = local.u32(what)?;
    let name_len = local.u16(what)? as usize;
    let extra_len = local.u16(what)? as usize;
    let local_name = local.take(name_len, "local entry name")?;
    local.skip(extra_len, what)?;

    // Data descriptors would leave the local sizes zeroed
    let sizes_deferred =
        flags & 0x0008 != 0 && local_crc == 0 && compressed == 0 && uncompressed == 0;
    if local_name != name.as_bytes()
        || method != METHOD_STORED
        || (!sizes_deferred && (local_crc != crc || compressed != size || uncompressed != size))
    {
        return Err(ArchiveError::Consistency(format!(
            "local header for {} disagrees with the central directory",
            name
        )));
    }

    let payload = local.take(size as usize, "entry payload")?;
    if local.pos > central_offset as usize {
        return Err(ArchiveError::Consistency(format!(
            "payload of {} overlaps the central directory",
            name
        )));
    }
    Ok(payload)
}
