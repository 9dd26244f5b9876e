//! Identifier resolution cache
//!
//! Change records name their containing directory by an opaque 64-bit file
//! reference, and many records share one parent. Resolving a reference to a
//! path is the dominant cost of the pipeline, so references are deduplicated
//! through a set and each one is resolved exactly once per scan. A reference
//! that fails to resolve stays in the cache as [`ResolvedPath::Unknown`];
//! consumers render it as "path unknown" instead of aborting.

use crate::journal::JournalPort;
use crate::record::ChangeRecord;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Outcome of resolving one file reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedPath {
    /// Full path the reference currently names.
    Known(String),
    /// The reference could not be resolved (object gone, access denied).
    Unknown,
}

impl ResolvedPath {
    pub fn as_known(&self) -> Option<&str> {
        match self {
            ResolvedPath::Known(path) => Some(path),
            ResolvedPath::Unknown => None,
        }
    }
}

/// Per-scan cache of parent reference resolutions.
#[derive(Debug, Default)]
pub struct ResolverCache {
    paths: HashMap<u64, ResolvedPath>,
    distinct_files: usize,
}

impl ResolverCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve every distinct parent reference in `records`, one port call
    /// per reference. Also counts the batch's distinct subject references.
    pub fn resolve_batch<P: JournalPort>(&mut self, records: &[ChangeRecord], port: &mut P) {
        let mut parents = HashSet::new();
        let mut files = HashSet::new();
        for record in records {
            parents.insert(record.parent_ref);
            files.insert(record.file_ref);
        }
        self.distinct_files = files.len();

        for reference in parents {
            if self.paths.contains_key(&reference) {
                continue;
            }
            let resolved = match port.resolve_path(reference) {
                Ok(path) => ResolvedPath::Known(path),
                Err(err) => {
                    debug!(reference, %err, "path resolution failed");
                    ResolvedPath::Unknown
                }
            };
            self.paths.insert(reference, resolved);
        }
    }

    /// Resolution outcome for a reference, if it appeared in the batch.
    pub fn path_of(&self, reference: u64) -> Option<&ResolvedPath> {
        self.paths.get(&reference)
    }

    /// The resolved path string, when the reference resolved successfully.
    pub fn known_path(&self, reference: u64) -> Option<&str> {
        self.paths.get(&reference).and_then(ResolvedPath::as_known)
    }

    /// Number of distinct parent references cached.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Distinct subject references counted in the last batch.
    pub fn distinct_files(&self) -> usize {
        self.distinct_files
    }

    pub fn clear(&mut self) {
        self.paths.clear();
        self.distinct_files = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, UsnTraceError};
    use crate::journal::structs::usn_reason;
    use crate::journal::JournalState;

    struct CountingPort {
        paths: HashMap<u64, String>,
        calls: usize,
    }

    impl CountingPort {
        fn with(paths: &[(u64, &str)]) -> Self {
            Self {
                paths: paths
                    .iter()
                    .map(|(r, p)| (*r, p.to_string()))
                    .collect(),
                calls: 0,
            }
        }
    }

    impl JournalPort for CountingPort {
        fn query_state(&mut self) -> Result<JournalState> {
            Ok(JournalState::default())
        }

        fn read_changes(
            &mut self,
            since: &JournalState,
            _reason_mask: u32,
        ) -> Result<(Vec<ChangeRecord>, JournalState)> {
            Ok((Vec::new(), since.clone()))
        }

        fn resolve_path(&mut self, reference: u64) -> Result<String> {
            self.calls += 1;
            self.paths
                .get(&reference)
                .cloned()
                .ok_or(UsnTraceError::PathResolve(reference))
        }
    }

    fn record(usn: i64, parent_ref: u64) -> ChangeRecord {
        ChangeRecord::new(usn, "a.txt", 0x20, parent_ref, 0, usn_reason::FILE_CREATE)
    }

    #[test]
    fn resolves_each_reference_exactly_once() {
        let records = vec![record(1, 10), record(2, 10), record(3, 11)];
        let mut port = CountingPort::with(&[(10, "C:\\Users"), (11, "C:\\Temp")]);
        let mut cache = ResolverCache::new();

        cache.resolve_batch(&records, &mut port);

        assert_eq!(port.calls, 2);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.known_path(10), Some("C:\\Users"));
        assert_eq!(cache.known_path(11), Some("C:\\Temp"));
    }

    #[test]
    fn records_failures_as_unknown() {
        let records = vec![record(1, 10), record(2, 99)];
        let mut port = CountingPort::with(&[(10, "C:\\Users")]);
        let mut cache = ResolverCache::new();

        cache.resolve_batch(&records, &mut port);

        assert_eq!(cache.path_of(99), Some(&ResolvedPath::Unknown));
        assert_eq!(cache.known_path(99), None);
        assert_eq!(cache.known_path(10), Some("C:\\Users"));
    }

    #[test]
    fn no_speculative_resolution() {
        let records = vec![record(1, 10)];
        let mut port = CountingPort::with(&[(10, "C:\\Users"), (11, "C:\\Temp")]);
        let mut cache = ResolverCache::new();

        cache.resolve_batch(&records, &mut port);

        assert_eq!(cache.path_of(11), None);
        assert_eq!(port.calls, 1);
    }

    #[test]
    fn counts_distinct_subject_references() {
        let mut a = record(1, 10);
        a.file_ref = 0x20;
        let mut b = record(2, 10);
        b.file_ref = 0x21;
        let mut c = record(3, 10);
        c.file_ref = 0x20;

        let mut port = CountingPort::with(&[(10, "C:\\Users")]);
        let mut cache = ResolverCache::new();
        cache.resolve_batch(&[a, b, c], &mut port);

        assert_eq!(cache.distinct_files(), 2);
    }

    #[test]
    fn clear_empties_the_cache() {
        let mut port = CountingPort::with(&[(10, "C:\\Users")]);
        let mut cache = ResolverCache::new();
        cache.resolve_batch(&[record(1, 10)], &mut port);
        assert!(!cache.is_empty());

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.distinct_files(), 0);
    }
}
