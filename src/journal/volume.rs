//! Windows journal port
//!
//! Real [`JournalPort`] over a live NTFS volume. One open volume handle is
//! reused for the state query, the paged journal reads, and per-reference
//! path resolution.

use crate::error::Result;
use crate::journal::structs::{JournalState, UsnRecord};
use crate::journal::winapi::{
    open_volume, query_usn_journal, read_usn_journal, resolve_file_reference, SafeHandle,
};
use crate::journal::JournalPort;
use crate::record::ChangeRecord;
use tracing::trace;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Journal access for one NTFS volume.
pub struct WindowsJournal {
    volume: char,
    handle: SafeHandle,
    buffer: Vec<u8>,
}

impl WindowsJournal {
    /// Open the volume for journal access.
    pub fn open(volume: char) -> Result<Self> {
        let volume = volume.to_ascii_uppercase();
        let handle = open_volume(volume)?;
        Ok(Self {
            volume,
            handle,
            buffer: vec![0u8; READ_BUFFER_SIZE],
        })
    }

    pub fn volume(&self) -> char {
        self.volume
    }
}

impl JournalPort for WindowsJournal {
    fn query_state(&mut self) -> Result<JournalState> {
        query_usn_journal(&self.handle, self.volume)
    }

    fn read_changes(
        &mut self,
        since: &JournalState,
        reason_mask: u32,
    ) -> Result<(Vec<ChangeRecord>, JournalState)> {
        let mut records = Vec::new();
        let mut position = since.first_usn;

        loop {
            let (next, bytes_returned) = read_usn_journal(
                &self.handle,
                since.journal_id,
                position,
                reason_mask,
                &mut self.buffer,
                self.volume,
            )?;

            if bytes_returned <= 8 {
                break;
            }

            // Records follow the 8-byte continuation USN, each aligned to
            // its declared length.
            let mut offset = 8;
            while offset + 4 <= bytes_returned {
                let record_len = u32::from_le_bytes(
                    self.buffer[offset..offset + 4].try_into().unwrap_or([0; 4]),
                ) as usize;

                if record_len < 60 || offset + record_len > bytes_returned {
                    break;
                }

                if let Some(raw) = UsnRecord::from_bytes(&self.buffer[offset..offset + record_len])
                {
                    records.push(ChangeRecord::from(raw));
                }
                offset += record_len;
            }

            trace!(position = next, total = records.len(), "journal page read");

            if next <= position {
                break;
            }
            position = next;
            if position >= since.next_usn {
                break;
            }
        }

        let mut state = since.clone();
        state.next_usn = position;
        Ok((records, state))
    }

    fn resolve_path(&mut self, reference: u64) -> Result<String> {
        resolve_file_reference(&self.handle, reference)
    }
}
