//! Scan orchestrator
//!
//! Drives one journal scan through five gated phases: open the volume,
//! query the journal, read every entry up to the journal's current end,
//! resolve parent references, index the records. Each transition emits a
//! progress event; a failed phase abandons the scan. Starting a scan clears
//! everything a previous scan built, so a failed run reports no results
//! rather than a stale model.

use crate::error::{Result, UsnTraceError};
use crate::journal::{JournalPort, JournalState};
use crate::reasons::{ReasonCatalog, REASON_MASK_ALL};
use crate::record::ChangeRecord;
use crate::resolve::{ResolvedPath, ResolverCache};
use crate::store::{ChangeList, EntryStore};
use crate::tree::PathTree;
use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, info, warn};

// ============================================================================
// Phases and Events
// ============================================================================

/// The five scan phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    OpenVolume,
    QueryJournal,
    ReadEntries,
    ResolvePaths,
    IndexRecords,
}

impl ScanPhase {
    pub const COUNT: usize = 5;

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanPhase::OpenVolume => "Opening volume",
            ScanPhase::QueryJournal => "Querying journal",
            ScanPhase::ReadEntries => "Reading entries",
            ScanPhase::ResolvePaths => "Resolving paths",
            ScanPhase::IndexRecords => "Indexing records",
        }
    }
}

/// Progress notification sent to subscribers.
///
/// Sends are fire-and-forget: a slow or dropped subscriber never blocks the
/// pipeline. Every scan ends with exactly one `Ended` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanEvent {
    Phase { phase: ScanPhase, ok: bool },
    Ended { ok: bool },
}

/// Counters reported after a successful scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    pub records: usize,
    pub distinct_directories: usize,
    pub distinct_files: usize,
    /// Oldest USN still present in the journal at scan time.
    pub first_usn: i64,
    /// Position the read stopped at.
    pub next_usn: i64,
}

// ============================================================================
// Scanner
// ============================================================================

/// Owns one scan's state: the record store, the resolution cache, and the
/// journal snapshot. Re-running a scan resets all of it.
///
/// Single-threaded by design: phases run sequentially on the caller's
/// thread, and a new scan must not start while one is executing.
pub struct JournalScanner {
    volume: Option<char>,
    catalog: ReasonCatalog,
    store: EntryStore,
    cache: ResolverCache,
    journal_state: Option<JournalState>,
    subscribers: Vec<Sender<ScanEvent>>,
}

impl JournalScanner {
    pub fn new() -> Self {
        Self::with_catalog(ReasonCatalog::default())
    }

    /// Use an injected reason-label catalog (e.g. a localized list).
    pub fn with_catalog(catalog: ReasonCatalog) -> Self {
        Self {
            volume: None,
            catalog,
            store: EntryStore::new(),
            cache: ResolverCache::new(),
            journal_state: None,
            subscribers: Vec::new(),
        }
    }

    /// Choose the volume the next scan reads.
    pub fn select_volume(&mut self, drive: char) {
        self.volume = Some(drive.to_ascii_uppercase());
    }

    pub fn volume(&self) -> Option<char> {
        self.volume
    }

    /// Register a progress listener. Subscribe before starting the scan.
    pub fn subscribe(&mut self) -> Receiver<ScanEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    fn emit(&self, event: ScanEvent) {
        for tx in &self.subscribers {
            let _ = tx.send(event);
        }
    }

    fn phase_ok(&self, phase: ScanPhase) {
        debug!(phase = phase.as_str(), "phase complete");
        self.emit(ScanEvent::Phase { phase, ok: true });
    }

    fn fail<T>(&self, phase: ScanPhase, err: UsnTraceError) -> Result<T> {
        warn!(phase = phase.as_str(), error = %err, "scan aborted");
        self.emit(ScanEvent::Phase { phase, ok: false });
        self.emit(ScanEvent::Ended { ok: false });
        Err(err)
    }

    /// Run one full scan against the selected volume.
    ///
    /// `open` is the acquisition seam: given the volume, it produces a
    /// journal port or the error that ends the scan at phase one. All state
    /// from a previous scan is cleared before anything runs.
    pub fn begin_scan<P, F>(&mut self, open: F) -> Result<ScanSummary>
    where
        P: JournalPort,
        F: FnOnce(char) -> Result<P>,
    {
        self.store.clear();
        self.cache.clear();
        self.journal_state = None;

        // phase 1: acquire
        let volume = match self.volume.ok_or(UsnTraceError::NoVolumeSelected) {
            Ok(v) => v,
            Err(e) => return self.fail(ScanPhase::OpenVolume, e),
        };
        let mut port = match open(volume) {
            Ok(p) => p,
            Err(e) => return self.fail(ScanPhase::OpenVolume, e),
        };
        self.phase_ok(ScanPhase::OpenVolume);

        // phase 2: journal state
        let state = match port.query_state() {
            Ok(s) => s,
            Err(e) => return self.fail(ScanPhase::QueryJournal, e),
        };
        self.phase_ok(ScanPhase::QueryJournal);

        // phase 3: batch read from the first valid USN to the current end
        let (records, new_state) = match port.read_changes(&state, REASON_MASK_ALL) {
            Ok(batch) => batch,
            Err(e) => return self.fail(ScanPhase::ReadEntries, e),
        };
        info!(
            volume = %volume,
            records = records.len(),
            first_usn = state.first_usn,
            next_usn = new_state.next_usn,
            "journal read complete"
        );
        self.phase_ok(ScanPhase::ReadEntries);

        // phase 4: resolve parent references, one call per distinct reference
        self.cache.resolve_batch(&records, &mut port);
        self.phase_ok(ScanPhase::ResolvePaths);

        // phase 5: index and decode
        if let Err(e) = self.store.index_batch(records) {
            return self.fail(ScanPhase::IndexRecords, e);
        }
        self.store.decode_reasons(&self.catalog);
        self.phase_ok(ScanPhase::IndexRecords);

        let summary = ScanSummary {
            records: self.store.len(),
            distinct_directories: self.store.directory_count(),
            distinct_files: self.store.file_count(),
            first_usn: state.first_usn,
            next_usn: new_state.next_usn,
        };
        self.journal_state = Some(new_state);

        self.emit(ScanEvent::Ended { ok: true });
        Ok(summary)
    }

    // ------------------------------------------------------------------
    // Query surface
    // ------------------------------------------------------------------

    pub fn store(&self) -> &EntryStore {
        &self.store
    }

    pub fn cache(&self) -> &ResolverCache {
        &self.cache
    }

    pub fn record(&self, usn: i64) -> Option<&ChangeRecord> {
        self.store.record(usn)
    }

    /// Journal snapshot captured by the last successful scan.
    pub fn journal_state(&self) -> Option<&JournalState> {
        self.journal_state.as_ref()
    }

    /// Every directory index entry with its resolution outcome.
    pub fn resolved_directories(
        &self,
    ) -> impl Iterator<Item = (&ResolvedPath, &ChangeList)> + '_ {
        static UNKNOWN: ResolvedPath = ResolvedPath::Unknown;
        self.store.directories().map(|list| {
            (
                self.cache.path_of(list.reference).unwrap_or(&UNKNOWN),
                list,
            )
        })
    }

    /// USNs of all changes inside the directory whose resolved path equals
    /// `path` exactly.
    ///
    /// Comparison is byte-for-byte: no case folding, no trailing-separator
    /// trimming, no alias resolution. Known limitation, kept deliberately.
    pub fn changes_under(&self, path: &str) -> Option<&[i64]> {
        self.store
            .directories()
            .find(|list| self.cache.known_path(list.reference) == Some(path))
            .map(|list| list.usns.as_slice())
    }

    /// Bake the directory hierarchy from the current scan's resolved paths.
    pub fn build_tree(&self) -> PathTree {
        PathTree::build(&self.store, &self.cache)
    }
}

impl Default for JournalScanner {
    fn default() -> Self {
        Self::new()
    }
}
