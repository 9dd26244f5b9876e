//! Reason-bitmask decoding
//!
//! Translates a record's raw reason bits into display text using an ordered
//! label list, one label per known bit. The list is injected configuration
//! (a localized UI supplies its own); the count is validated up front so a
//! misaligned list fails at startup instead of mislabeling every record.

use crate::error::{Result, UsnTraceError};
use crate::journal::structs::usn_reason;

/// Every reason bit a record can carry, in ascending bit order.
pub const KNOWN_REASONS: [u32; 21] = [
    usn_reason::DATA_OVERWRITE,
    usn_reason::DATA_EXTEND,
    usn_reason::DATA_TRUNCATION,
    usn_reason::NAMED_DATA_OVERWRITE,
    usn_reason::NAMED_DATA_EXTEND,
    usn_reason::NAMED_DATA_TRUNCATION,
    usn_reason::FILE_CREATE,
    usn_reason::FILE_DELETE,
    usn_reason::EA_CHANGE,
    usn_reason::SECURITY_CHANGE,
    usn_reason::RENAME_OLD_NAME,
    usn_reason::RENAME_NEW_NAME,
    usn_reason::INDEXABLE_CHANGE,
    usn_reason::BASIC_INFO_CHANGE,
    usn_reason::HARD_LINK_CHANGE,
    usn_reason::COMPRESSION_CHANGE,
    usn_reason::ENCRYPTION_CHANGE,
    usn_reason::OBJECT_ID_CHANGE,
    usn_reason::REPARSE_POINT_CHANGE,
    usn_reason::STREAM_CHANGE,
    usn_reason::CLOSE,
];

/// Default English labels, aligned with [`KNOWN_REASONS`].
const DEFAULT_LABELS: [&str; 21] = [
    "data overwrite",
    "data extend",
    "data truncation",
    "named data overwrite",
    "named data extend",
    "named data truncation",
    "file create",
    "file delete",
    "extended attribute change",
    "security change",
    "rename: old name",
    "rename: new name",
    "indexable change",
    "basic info change",
    "hard link change",
    "compression change",
    "encryption change",
    "object id change",
    "reparse point change",
    "stream change",
    "close",
];

/// The fixed mask a scan reads with: every mutation kind the pipeline
/// understands. Must match the journal's reason bit layout exactly.
pub const REASON_MASK_ALL: u32 = usn_reason::DATA_OVERWRITE
    | usn_reason::DATA_EXTEND
    | usn_reason::NAMED_DATA_OVERWRITE
    | usn_reason::NAMED_DATA_TRUNCATION
    | usn_reason::FILE_CREATE
    | usn_reason::FILE_DELETE
    | usn_reason::EA_CHANGE
    | usn_reason::SECURITY_CHANGE
    | usn_reason::RENAME_OLD_NAME
    | usn_reason::RENAME_NEW_NAME
    | usn_reason::INDEXABLE_CHANGE
    | usn_reason::BASIC_INFO_CHANGE
    | usn_reason::HARD_LINK_CHANGE
    | usn_reason::COMPRESSION_CHANGE
    | usn_reason::ENCRYPTION_CHANGE
    | usn_reason::OBJECT_ID_CHANGE
    | usn_reason::REPARSE_POINT_CHANGE
    | usn_reason::STREAM_CHANGE
    | usn_reason::CLOSE;

/// Ordered reason labels, one per bit in [`KNOWN_REASONS`].
#[derive(Debug, Clone)]
pub struct ReasonCatalog {
    labels: Vec<String>,
}

impl ReasonCatalog {
    /// Number of labels a valid list must carry.
    pub const BIT_COUNT: usize = KNOWN_REASONS.len();

    /// Build a catalog from an injected label list.
    pub fn new(labels: Vec<String>) -> Result<Self> {
        if labels.len() != Self::BIT_COUNT {
            return Err(UsnTraceError::LabelCount {
                expected: Self::BIT_COUNT,
                got: labels.len(),
            });
        }
        Ok(Self { labels })
    }

    /// Build a catalog from a JSON array of strings.
    pub fn from_json(text: &str) -> Result<Self> {
        let labels: Vec<String> = serde_json::from_str(text)?;
        Self::new(labels)
    }

    /// Describe a reason bitmask as a comma-separated label list.
    ///
    /// Bits outside [`KNOWN_REASONS`] are ignored.
    pub fn describe(&self, mask: u32) -> String {
        let mut parts = Vec::new();
        for (bit, label) in KNOWN_REASONS.iter().zip(&self.labels) {
            if mask & bit != 0 {
                parts.push(label.as_str());
            }
        }
        parts.join(", ")
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }
}

impl Default for ReasonCatalog {
    fn default() -> Self {
        Self {
            labels: DEFAULT_LABELS.iter().map(|s| s.to_string()).collect(),
        }
    }
}
