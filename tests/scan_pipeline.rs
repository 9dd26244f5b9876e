//! End-to-end pipeline tests over a mock journal port.

use std::cell::Cell;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;
use usntrace::journal::structs::usn_reason;
use usntrace::{
    ChangeRecord, JournalPort, JournalScanner, JournalState, ReasonCatalog, ResolvedPath, Result,
    ScanEvent, UsnTraceError, REASON_MASK_ALL,
};

struct FakeJournal {
    state: JournalState,
    records: Vec<ChangeRecord>,
    paths: HashMap<u64, String>,
    resolve_calls: Rc<Cell<usize>>,
    seen_mask: Rc<Cell<u32>>,
}

impl FakeJournal {
    fn new(records: Vec<ChangeRecord>, paths: &[(u64, &str)]) -> Self {
        Self {
            state: JournalState {
                journal_id: 0x51,
                first_usn: records.iter().map(|r| r.usn).min().unwrap_or(0),
                next_usn: records.iter().map(|r| r.usn).max().unwrap_or(0) + 1,
                ..JournalState::default()
            },
            records,
            paths: paths.iter().map(|(r, p)| (*r, p.to_string())).collect(),
            resolve_calls: Rc::new(Cell::new(0)),
            seen_mask: Rc::new(Cell::new(0)),
        }
    }
}

impl JournalPort for FakeJournal {
    fn query_state(&mut self) -> Result<JournalState> {
        Ok(self.state.clone())
    }

    fn read_changes(
        &mut self,
        since: &JournalState,
        reason_mask: u32,
    ) -> Result<(Vec<ChangeRecord>, JournalState)> {
        self.seen_mask.set(reason_mask);
        let mut state = since.clone();
        state.next_usn = self.state.next_usn;
        Ok((self.records.clone(), state))
    }

    fn resolve_path(&mut self, reference: u64) -> Result<String> {
        self.resolve_calls.set(self.resolve_calls.get() + 1);
        self.paths
            .get(&reference)
            .cloned()
            .ok_or(UsnTraceError::PathResolve(reference))
    }
}

fn create_record(usn: i64, file_ref: u64, parent_ref: u64, name: &str) -> ChangeRecord {
    ChangeRecord::new(
        usn,
        name,
        file_ref,
        parent_ref,
        132_223_104_000_000_000,
        usn_reason::FILE_CREATE,
    )
}

#[test]
fn create_in_users_shows_up_in_tree_and_lookup() {
    let mut scanner = JournalScanner::new();
    scanner.select_volume('C');
    let journal = FakeJournal::new(
        vec![create_record(1, 0x20, 0x10, "a.txt")],
        &[(0x10, "C:\\Users")],
    );

    let summary = scanner.begin_scan(|_| Ok(journal)).unwrap();
    assert_eq!(summary.records, 1);

    let tree = scanner.build_tree();
    let labels: Vec<&str> = tree.roots().map(|n| n.label.as_str()).collect();
    assert_eq!(labels, vec!["C:"]);
    assert!(tree.root("C:").unwrap().child("Users").unwrap().has_changes);

    assert_eq!(scanner.changes_under("C:\\Users"), Some(&[1][..]));
    assert_eq!(scanner.changes_under("C:\\Users\\"), None);
}

#[test]
fn shared_parent_is_resolved_once_and_keeps_order() {
    let mut scanner = JournalScanner::new();
    scanner.select_volume('C');
    let journal = FakeJournal::new(
        vec![
            create_record(1, 0x20, 0x10, "a.txt"),
            create_record(2, 0x21, 0x10, "b.txt"),
        ],
        &[(0x10, "C:\\Users")],
    );
    let calls = journal.resolve_calls.clone();

    scanner.begin_scan(|_| Ok(journal)).unwrap();

    assert_eq!(calls.get(), 1);
    assert_eq!(scanner.changes_under("C:\\Users"), Some(&[1, 2][..]));
}

#[test]
fn unresolved_parent_is_reported_not_fatal() {
    let mut scanner = JournalScanner::new();
    scanner.select_volume('C');
    let journal = FakeJournal::new(
        vec![
            create_record(1, 0x20, 0x10, "kept.txt"),
            create_record(2, 0x21, 0x99, "orphan.txt"),
        ],
        &[(0x10, "C:\\Users")],
    );

    let summary = scanner.begin_scan(|_| Ok(journal)).unwrap();
    assert_eq!(summary.records, 2);

    assert_eq!(
        scanner.cache().path_of(0x99),
        Some(&ResolvedPath::Unknown)
    );

    let tree = scanner.build_tree();
    assert_eq!(tree.root_count(), 1);
    assert_eq!(tree.skipped_unresolved(), 1);

    // the unresolved directory is queryable by reference, not by path
    assert_eq!(scanner.store().directory(0x99).unwrap().usns, vec![2]);
}

#[test]
fn acquisition_failure_reports_once_and_leaves_nothing() {
    let mut scanner = JournalScanner::new();
    scanner.select_volume('C');
    let rx = scanner.subscribe();

    let err = scanner
        .begin_scan(|v| -> Result<FakeJournal> { Err(UsnTraceError::NoJournal(v.to_string())) })
        .unwrap_err();

    assert!(err.is_acquisition());
    assert!(scanner.store().is_empty());
    assert!(scanner.cache().is_empty());

    let events: Vec<ScanEvent> = rx.try_iter().collect();
    let failures = events
        .iter()
        .filter(|e| matches!(e, ScanEvent::Phase { ok: false, .. }))
        .count();
    let terminals: Vec<&ScanEvent> = events
        .iter()
        .filter(|e| matches!(e, ScanEvent::Ended { .. }))
        .collect();
    assert_eq!(failures, 1);
    assert_eq!(terminals, vec![&ScanEvent::Ended { ok: false }]);
}

#[test]
fn scan_reads_with_the_full_reason_mask() {
    let mut scanner = JournalScanner::new();
    scanner.select_volume('C');
    let journal = FakeJournal::new(vec![create_record(1, 0x20, 0x10, "a.txt")], &[]);
    let seen_mask = journal.seen_mask.clone();

    scanner.begin_scan(|_| Ok(journal)).unwrap();

    assert_eq!(seen_mask.get(), REASON_MASK_ALL);
    assert_ne!(seen_mask.get() & usn_reason::FILE_CREATE, 0);
    assert_ne!(seen_mask.get() & usn_reason::CLOSE, 0);
}

#[test]
fn rescan_replaces_the_previous_model() {
    let mut scanner = JournalScanner::new();
    scanner.select_volume('C');

    scanner
        .begin_scan(|_| {
            Ok(FakeJournal::new(
                vec![
                    create_record(1, 0x20, 0x10, "a.txt"),
                    create_record(2, 0x21, 0x10, "b.txt"),
                ],
                &[(0x10, "C:\\Users")],
            ))
        })
        .unwrap();
    assert_eq!(scanner.store().len(), 2);

    scanner
        .begin_scan(|_| {
            Ok(FakeJournal::new(
                vec![create_record(7, 0x30, 0x11, "d.txt")],
                &[(0x11, "D:\\projects")],
            ))
        })
        .unwrap();

    assert_eq!(scanner.store().len(), 1);
    assert_eq!(scanner.changes_under("C:\\Users"), None);
    assert_eq!(scanner.changes_under("D:\\projects"), Some(&[7][..]));

    let labels: Vec<String> = scanner
        .build_tree()
        .roots()
        .map(|n| n.label.clone())
        .collect();
    assert_eq!(labels, vec!["D:".to_string()]);
}

#[test]
fn injected_label_file_drives_the_decode_pass() {
    let labels: Vec<String> = (0..ReasonCatalog::BIT_COUNT)
        .map(|i| format!("reason-{i}"))
        .collect();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", serde_json::to_string(&labels).unwrap()).unwrap();

    let text = std::fs::read_to_string(file.path()).unwrap();
    let catalog = ReasonCatalog::from_json(&text).unwrap();

    let mut scanner = JournalScanner::with_catalog(catalog);
    scanner.select_volume('C');
    let journal = FakeJournal::new(
        vec![create_record(1, 0x20, 0x10, "a.txt")],
        &[(0x10, "C:\\Users")],
    );
    scanner.begin_scan(|_| Ok(journal)).unwrap();

    // FILE_CREATE is the seventh known bit
    assert_eq!(
        scanner.record(1).unwrap().reason_text.as_deref(),
        Some("reason-6")
    );
}

#[test]
fn drive_root_changes_collapse_to_one_node() {
    let mut scanner = JournalScanner::new();
    scanner.select_volume('C');
    let journal = FakeJournal::new(
        vec![create_record(1, 0x20, 0x05, "pagefile.sys")],
        &[(0x05, "C:\\")],
    );

    scanner.begin_scan(|_| Ok(journal)).unwrap();

    let tree = scanner.build_tree();
    let root = tree.root("C:").unwrap();
    assert!(root.has_changes);
    assert!(root.children.is_empty());
    assert_eq!(scanner.changes_under("C:\\"), Some(&[1][..]));
}
