//! Journal access layer
//!
//! [`JournalPort`] is the contract the scan pipeline consumes: query the
//! journal's state, read every change since a position, resolve a file
//! reference to a path. [`WindowsJournal`] is the real implementation over
//! the Win32 volume IOCTLs; tests drive the pipeline with mock ports.

pub mod structs;
#[cfg(windows)]
pub mod winapi;
#[cfg(windows)]
mod volume;

pub use structs::JournalState;
#[cfg(windows)]
pub use volume::WindowsJournal;

use crate::error::Result;
use crate::record::ChangeRecord;

/// Volume-level journal operations the scan pipeline delegates to.
pub trait JournalPort {
    /// Fetch the journal's current metadata.
    fn query_state(&mut self) -> Result<JournalState>;

    /// Read all entries between `since.first_usn` and the journal's current
    /// end, filtered by `reason_mask`. Returns the records in journal order
    /// together with an updated state snapshot.
    fn read_changes(
        &mut self,
        since: &JournalState,
        reason_mask: u32,
    ) -> Result<(Vec<ChangeRecord>, JournalState)>;

    /// Resolve a file reference to its current full path.
    fn resolve_path(&mut self, reference: u64) -> Result<String>;
}

/// Stand-in port for builds without journal access; every operation fails.
#[cfg(not(windows))]
pub struct UnsupportedJournal;

#[cfg(not(windows))]
impl JournalPort for UnsupportedJournal {
    fn query_state(&mut self) -> Result<JournalState> {
        Err(crate::error::UsnTraceError::Unsupported(
            "change journal access requires Windows".to_string(),
        ))
    }

    fn read_changes(
        &mut self,
        _since: &JournalState,
        _reason_mask: u32,
    ) -> Result<(Vec<ChangeRecord>, JournalState)> {
        Err(crate::error::UsnTraceError::Unsupported(
            "change journal access requires Windows".to_string(),
        ))
    }

    fn resolve_path(&mut self, _reference: u64) -> Result<String> {
        Err(crate::error::UsnTraceError::Unsupported(
            "change journal access requires Windows".to_string(),
        ))
    }
}
