//! Entry store
//!
//! Owns every change record of a scan, keyed by USN, plus two reverse
//! indices: by containing directory (parent reference) and by subject
//! (the record's own file reference, stable across renames). Indexing is a
//! single O(n) pass; the reason decode pass afterwards fills display text.

use crate::error::{Result, UsnTraceError};
use crate::reasons::ReasonCatalog;
use crate::record::ChangeRecord;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Ordered USNs accumulated for one file reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeList {
    pub reference: u64,
    /// USNs in discovery order (chronological within a scan).
    pub usns: Vec<i64>,
}

impl ChangeList {
    fn new(reference: u64) -> Self {
        Self {
            reference,
            usns: Vec::new(),
        }
    }
}

/// Record map and reverse indices for one scan.
#[derive(Debug, Default)]
pub struct EntryStore {
    records: HashMap<i64, ChangeRecord>,
    directories: HashMap<u64, ChangeList>,
    files: HashMap<u64, ChangeList>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a batch of records in one pass.
    ///
    /// The journal guarantees USN uniqueness within one read; a duplicate
    /// here means a broken collaborator and fails the batch rather than
    /// silently overwriting.
    pub fn index_batch(&mut self, batch: Vec<ChangeRecord>) -> Result<()> {
        for record in batch {
            let usn = record.usn;
            let parent_ref = record.parent_ref;
            let file_ref = record.file_ref;

            match self.records.entry(usn) {
                Entry::Occupied(_) => return Err(UsnTraceError::DuplicateUsn(usn)),
                Entry::Vacant(slot) => {
                    slot.insert(record);
                }
            }

            self.directories
                .entry(parent_ref)
                .or_insert_with(|| ChangeList::new(parent_ref))
                .usns
                .push(usn);
            self.files
                .entry(file_ref)
                .or_insert_with(|| ChangeList::new(file_ref))
                .usns
                .push(usn);
        }
        Ok(())
    }

    /// Fill every record's display text from its reason bitmask.
    pub fn decode_reasons(&mut self, catalog: &ReasonCatalog) {
        for record in self.records.values_mut() {
            record.reason_text = Some(catalog.describe(record.reason));
        }
    }

    pub fn record(&self, usn: i64) -> Option<&ChangeRecord> {
        self.records.get(&usn)
    }

    pub fn records(&self) -> impl Iterator<Item = &ChangeRecord> + '_ {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Changes grouped by containing directory.
    pub fn directories(&self) -> impl Iterator<Item = &ChangeList> + '_ {
        self.directories.values()
    }

    /// Changes grouped by subject file reference.
    pub fn files(&self) -> impl Iterator<Item = &ChangeList> + '_ {
        self.files.values()
    }

    pub fn directory(&self, reference: u64) -> Option<&ChangeList> {
        self.directories.get(&reference)
    }

    pub fn file(&self, reference: u64) -> Option<&ChangeList> {
        self.files.get(&reference)
    }

    pub fn directory_count(&self) -> usize {
        self.directories.len()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.directories.clear();
        self.files.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::structs::usn_reason;

    fn record(usn: i64, file_ref: u64, parent_ref: u64, reason: u32) -> ChangeRecord {
        ChangeRecord::new(usn, format!("f{usn}"), file_ref, parent_ref, 0, reason)
    }

    #[test]
    fn indexes_every_record_once() {
        let mut store = EntryStore::new();
        let batch = vec![
            record(1, 0x20, 0x10, usn_reason::FILE_CREATE),
            record(2, 0x21, 0x10, usn_reason::DATA_EXTEND),
            record(3, 0x20, 0x11, usn_reason::FILE_DELETE),
        ];

        store.index_batch(batch).unwrap();

        assert_eq!(store.len(), 3);
        let dir_total: usize = store.directories().map(|l| l.usns.len()).sum();
        let file_total: usize = store.files().map(|l| l.usns.len()).sum();
        assert_eq!(dir_total, 3);
        assert_eq!(file_total, 3);
        assert_eq!(store.directory_count(), 2);
        assert_eq!(store.file_count(), 2);
    }

    #[test]
    fn appends_usns_in_discovery_order() {
        let mut store = EntryStore::new();
        store
            .index_batch(vec![
                record(5, 0x20, 0x10, usn_reason::DATA_OVERWRITE),
                record(9, 0x21, 0x10, usn_reason::DATA_OVERWRITE),
                record(12, 0x20, 0x10, usn_reason::CLOSE),
            ])
            .unwrap();

        assert_eq!(store.directory(0x10).unwrap().usns, vec![5, 9, 12]);
        assert_eq!(store.file(0x20).unwrap().usns, vec![5, 12]);
        assert_eq!(store.file(0x21).unwrap().usns, vec![9]);
    }

    #[test]
    fn rejects_duplicate_usn() {
        let mut store = EntryStore::new();
        let err = store
            .index_batch(vec![
                record(7, 0x20, 0x10, usn_reason::FILE_CREATE),
                record(7, 0x21, 0x11, usn_reason::FILE_DELETE),
            ])
            .unwrap_err();

        assert!(matches!(err, UsnTraceError::DuplicateUsn(7)));
    }

    #[test]
    fn decode_pass_fills_reason_text() {
        let mut store = EntryStore::new();
        store
            .index_batch(vec![record(
                1,
                0x20,
                0x10,
                usn_reason::FILE_CREATE | usn_reason::CLOSE,
            )])
            .unwrap();

        store.decode_reasons(&ReasonCatalog::default());

        let text = store.record(1).unwrap().reason_text.as_deref().unwrap();
        assert_eq!(text, "file create, close");
    }

    #[test]
    fn clear_resets_all_indices() {
        let mut store = EntryStore::new();
        store
            .index_batch(vec![record(1, 0x20, 0x10, usn_reason::FILE_CREATE)])
            .unwrap();
        store.clear();

        assert!(store.is_empty());
        assert_eq!(store.directory_count(), 0);
        assert_eq!(store.file_count(), 0);
    }
}
