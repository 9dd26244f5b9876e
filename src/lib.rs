//! usntrace - NTFS change journal inspector
//!
//! Reads a volume's USN change journal in one batch and turns the raw
//! record stream into a queryable model: change records keyed by USN,
//! reverse indices from file references to their changes, resolved
//! parent-directory paths, and a navigable directory tree.
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(windows)]
//! # fn main() -> usntrace::Result<()> {
//! use usntrace::{JournalScanner, WindowsJournal};
//!
//! let mut scanner = JournalScanner::new();
//! scanner.select_volume('C');
//!
//! let summary = scanner.begin_scan(WindowsJournal::open)?;
//! println!("{} changes in {} directories", summary.records, summary.distinct_directories);
//!
//! let tree = scanner.build_tree();
//! for root in tree.roots() {
//!     println!("{}", root.label);
//! }
//!
//! if let Some(usns) = scanner.changes_under("C:\\Users") {
//!     println!("C:\\Users saw {} changes", usns.len());
//! }
//! # Ok(())
//! # }
//! # #[cfg(not(windows))]
//! # fn main() {}
//! ```

pub mod error;
pub mod journal;
pub mod reasons;
pub mod record;
pub mod resolve;
pub mod scan;
pub mod store;
pub mod tree;

// Re-export main types
pub use error::{Result, UsnTraceError};
pub use journal::{JournalPort, JournalState};
#[cfg(windows)]
pub use journal::WindowsJournal;
pub use reasons::{ReasonCatalog, REASON_MASK_ALL};
pub use record::ChangeRecord;
pub use resolve::{ResolvedPath, ResolverCache};
pub use scan::{JournalScanner, ScanEvent, ScanPhase, ScanSummary};
pub use store::{ChangeList, EntryStore};
pub use tree::{PathNode, PathTree};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Format a Windows FILETIME as a human-readable date string
pub fn format_filetime(filetime: u64) -> String {
    journal::structs::filetime_to_datetime(filetime)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}
