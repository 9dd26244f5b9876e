//! On-wire USN journal structures and constants
//!
//! Layouts follow the NTFS change journal as exposed by
//! FSCTL_QUERY_USN_JOURNAL and FSCTL_READ_USN_JOURNAL.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

// ============================================================================
// Journal State
// ============================================================================

/// Snapshot of a volume's change journal, as returned by
/// FSCTL_QUERY_USN_JOURNAL (USN_JOURNAL_DATA).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JournalState {
    pub journal_id: u64,
    /// First USN still present in the journal.
    pub first_usn: i64,
    /// USN that will be assigned to the next record written.
    pub next_usn: i64,
    pub lowest_valid_usn: i64,
    pub max_usn: i64,
    pub maximum_size: u64,
    pub allocation_delta: u64,
}

impl JournalState {
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 0x38 {
            return None;
        }

        let mut cursor = Cursor::new(data);

        Some(Self {
            journal_id: cursor.read_u64::<LittleEndian>().ok()?,
            first_usn: cursor.read_i64::<LittleEndian>().ok()?,
            next_usn: cursor.read_i64::<LittleEndian>().ok()?,
            lowest_valid_usn: cursor.read_i64::<LittleEndian>().ok()?,
            max_usn: cursor.read_i64::<LittleEndian>().ok()?,
            maximum_size: cursor.read_u64::<LittleEndian>().ok()?,
            allocation_delta: cursor.read_u64::<LittleEndian>().ok()?,
        })
    }
}

// ============================================================================
// USN Record
// ============================================================================

/// A raw change journal record (USN_RECORD V2 or V3).
///
/// V3 records carry 128-bit file references; only the low 64 bits are kept,
/// which is where NTFS stores the file id.
#[derive(Debug, Clone)]
pub struct UsnRecord {
    pub record_length: u32,
    pub major_version: u16,
    pub minor_version: u16,
    pub file_ref: u64,
    pub parent_ref: u64,
    pub usn: i64,
    pub timestamp: u64,
    pub reason: u32,
    pub source_info: u32,
    pub security_id: u32,
    pub attributes: u32,
    pub name: String,
}

impl UsnRecord {
    /// Parse a single record from a journal read buffer.
    ///
    /// V2 header is 60 bytes, V3 header is 76 bytes; the UTF-16 name follows
    /// at the offset the header declares.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 8 {
            return None;
        }

        let mut cursor = Cursor::new(data);
        let record_length = cursor.read_u32::<LittleEndian>().ok()?;
        let major_version = cursor.read_u16::<LittleEndian>().ok()?;
        let minor_version = cursor.read_u16::<LittleEndian>().ok()?;

        let min_size = if major_version >= 3 { 76 } else { 60 };
        if data.len() < min_size || (record_length as usize) < min_size {
            return None;
        }

        let (file_ref, parent_ref) = if major_version >= 3 {
            // 128-bit references at offsets 8 and 24
            let file_ref = cursor.read_u64::<LittleEndian>().ok()?;
            cursor.set_position(24);
            let parent_ref = cursor.read_u64::<LittleEndian>().ok()?;
            cursor.set_position(40);
            (file_ref, parent_ref)
        } else {
            // 64-bit references at offsets 8 and 16
            let file_ref = cursor.read_u64::<LittleEndian>().ok()?;
            let parent_ref = cursor.read_u64::<LittleEndian>().ok()?;
            (file_ref, parent_ref)
        };

        let usn = cursor.read_i64::<LittleEndian>().ok()?;
        let timestamp = cursor.read_u64::<LittleEndian>().ok()?;
        let reason = cursor.read_u32::<LittleEndian>().ok()?;
        let source_info = cursor.read_u32::<LittleEndian>().ok()?;
        let security_id = cursor.read_u32::<LittleEndian>().ok()?;
        let attributes = cursor.read_u32::<LittleEndian>().ok()?;
        let name_length = cursor.read_u16::<LittleEndian>().ok()? as usize;
        let name_offset = cursor.read_u16::<LittleEndian>().ok()? as usize;

        let name_end = name_offset.checked_add(name_length)?;
        if name_end > data.len() || name_end > record_length as usize {
            return None;
        }

        let units: Vec<u16> = data[name_offset..name_end]
            .chunks_exact(2)
            .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
            .collect();
        let name = String::from_utf16_lossy(&units);

        Some(Self {
            record_length,
            major_version,
            minor_version,
            file_ref,
            parent_ref,
            usn,
            timestamp,
            reason,
            source_info,
            security_id,
            attributes,
            name,
        })
    }
}

// ============================================================================
// Reason Flags
// ============================================================================

/// USN reason flags, one bit per mutation kind.
pub mod usn_reason {
    pub const DATA_OVERWRITE: u32 = 0x00000001;
    pub const DATA_EXTEND: u32 = 0x00000002;
    pub const DATA_TRUNCATION: u32 = 0x00000004;
    pub const NAMED_DATA_OVERWRITE: u32 = 0x00000010;
    pub const NAMED_DATA_EXTEND: u32 = 0x00000020;
    pub const NAMED_DATA_TRUNCATION: u32 = 0x00000040;
    pub const FILE_CREATE: u32 = 0x00000100;
    pub const FILE_DELETE: u32 = 0x00000200;
    pub const EA_CHANGE: u32 = 0x00000400;
    pub const SECURITY_CHANGE: u32 = 0x00000800;
    pub const RENAME_OLD_NAME: u32 = 0x00001000;
    pub const RENAME_NEW_NAME: u32 = 0x00002000;
    pub const INDEXABLE_CHANGE: u32 = 0x00004000;
    pub const BASIC_INFO_CHANGE: u32 = 0x00008000;
    pub const HARD_LINK_CHANGE: u32 = 0x00010000;
    pub const COMPRESSION_CHANGE: u32 = 0x00020000;
    pub const ENCRYPTION_CHANGE: u32 = 0x00040000;
    pub const OBJECT_ID_CHANGE: u32 = 0x00080000;
    pub const REPARSE_POINT_CHANGE: u32 = 0x00100000;
    pub const STREAM_CHANGE: u32 = 0x00200000;
    pub const CLOSE: u32 = 0x80000000;
}

// ============================================================================
// Time Conversion
// ============================================================================

/// Seconds between the FILETIME epoch (1601) and the Unix epoch (1970).
const FILETIME_UNIX_DIFF: i64 = 11_644_473_600;

/// Convert a Windows FILETIME (100ns ticks since 1601) to Unix seconds.
pub fn filetime_to_unix(filetime: u64) -> i64 {
    (filetime / 10_000_000) as i64 - FILETIME_UNIX_DIFF
}

/// Convert a Windows FILETIME to a UTC datetime.
pub fn filetime_to_datetime(filetime: u64) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::from_timestamp(filetime_to_unix(filetime), 0).unwrap_or_default()
}
