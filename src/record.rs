//! Change record domain type
//!
//! One journal entry, keyed by its USN. Identity fields never change after
//! construction; `reason_text` is display text derived later by the
//! entry store's decode pass.

use crate::journal::structs::{filetime_to_datetime, UsnRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A single change journal entry.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeRecord {
    /// Update Sequence Number, unique within one journal read.
    pub usn: i64,
    /// The subject's own name (not a path).
    pub name: String,
    /// File reference of the subject.
    pub file_ref: u64,
    /// File reference of the containing directory at change time.
    pub parent_ref: u64,
    /// FILETIME of the change.
    pub timestamp: u64,
    /// Raw reason bitmask.
    pub reason: u32,
    /// Human-readable reason list, filled by the decode pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_text: Option<String>,
}

impl ChangeRecord {
    pub fn new(
        usn: i64,
        name: impl Into<String>,
        file_ref: u64,
        parent_ref: u64,
        timestamp: u64,
        reason: u32,
    ) -> Self {
        Self {
            usn,
            name: name.into(),
            file_ref,
            parent_ref,
            timestamp,
            reason,
            reason_text: None,
        }
    }

    /// The change time as a UTC datetime.
    pub fn timestamp_utc(&self) -> DateTime<Utc> {
        filetime_to_datetime(self.timestamp)
    }
}

impl From<UsnRecord> for ChangeRecord {
    fn from(raw: UsnRecord) -> Self {
        Self {
            usn: raw.usn,
            name: raw.name,
            file_ref: raw.file_ref,
            parent_ref: raw.parent_ref,
            timestamp: raw.timestamp,
            reason: raw.reason,
            reason_text: None,
        }
    }
}
