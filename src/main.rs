//! usntrace CLI
//!
//! Command-line frontend over the scan pipeline: run a scan and print the
//! results, render the directory tree, or look up changes under a path.

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use usntrace::{
    format_filetime, ChangeRecord, JournalScanner, ReasonCatalog, ScanEvent, ScanPhase,
};

/// usntrace - NTFS change journal inspector
///
/// Reads a volume's USN change journal and shows what changed, where.
#[derive(Parser)]
#[command(name = "usntrace")]
#[command(version)]
#[command(about = "NTFS change journal inspector", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a volume's journal and list the most recent changes
    Scan {
        /// Drive letter to scan (e.g. C)
        #[arg(short, long)]
        drive: char,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        output: String,

        /// JSON file with a reason label list (one label per reason bit)
        #[arg(long)]
        labels: Option<PathBuf>,

        /// Number of records to print in text mode
        #[arg(short, long, default_value = "25")]
        limit: usize,
    },

    /// Scan and render the changed-directory tree
    Tree {
        /// Drive letter to scan
        #[arg(short, long)]
        drive: char,

        /// Maximum depth to display
        #[arg(long)]
        depth: Option<usize>,
    },

    /// Scan and list all changes under an exact directory path
    Changes {
        /// Drive letter to scan
        #[arg(short, long)]
        drive: char,

        /// Resolved directory path, matched byte-for-byte (e.g. C:\Users)
        path: String,
    },

    /// List volumes with an active change journal
    Volumes,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Scan {
            drive,
            output,
            labels,
            limit,
        } => cmd_scan(drive, &output, labels.as_deref(), limit),
        Commands::Tree { drive, depth } => cmd_tree(drive, depth),
        Commands::Changes { drive, path } => cmd_changes(drive, &path),
        Commands::Volumes => cmd_volumes(),
    };

    if let Err(e) = result {
        eprintln!("{} {}", style("error:").red().bold(), e);
        std::process::exit(1);
    }
}

// ============================================================================
// Journal acquisition
// ============================================================================

#[cfg(windows)]
fn open_journal(drive: char) -> usntrace::Result<usntrace::WindowsJournal> {
    usntrace::WindowsJournal::open(drive)
}

#[cfg(not(windows))]
fn open_journal(_drive: char) -> usntrace::Result<usntrace::journal::UnsupportedJournal> {
    Err(usntrace::UsnTraceError::Unsupported(
        "change journal access requires Windows".to_string(),
    ))
}

// ============================================================================
// Commands
// ============================================================================

/// Run one scan with a progress bar fed from the event channel.
fn run_scan(drive: char, catalog: ReasonCatalog) -> usntrace::Result<JournalScanner> {
    let mut scanner = JournalScanner::with_catalog(catalog);
    scanner.select_volume(drive);

    let rx = scanner.subscribe();
    let pb = ProgressBar::new(ScanPhase::COUNT as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let pb_events = pb.clone();
    let drain = std::thread::spawn(move || {
        while let Ok(event) = rx.recv() {
            match event {
                ScanEvent::Phase { phase, ok: true } => {
                    pb_events.inc(1);
                    pb_events.set_message(phase.as_str());
                }
                ScanEvent::Phase { phase, ok: false } => {
                    pb_events.set_message(format!("{} failed", phase.as_str()));
                }
                ScanEvent::Ended { .. } => break,
            }
        }
    });

    let result = scanner.begin_scan(open_journal);
    let _ = drain.join();

    match result {
        Ok(summary) => {
            pb.finish_with_message(format!(
                "{} changes, {} directories, {} files",
                summary.records, summary.distinct_directories, summary.distinct_files
            ));
            Ok(scanner)
        }
        Err(e) => {
            pb.abandon_with_message("scan failed");
            Err(e)
        }
    }
}

fn load_catalog(labels: Option<&std::path::Path>) -> usntrace::Result<ReasonCatalog> {
    match labels {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            ReasonCatalog::from_json(&text)
        }
        None => Ok(ReasonCatalog::default()),
    }
}

fn cmd_scan(
    drive: char,
    output: &str,
    labels: Option<&std::path::Path>,
    limit: usize,
) -> usntrace::Result<()> {
    let scanner = run_scan(drive, load_catalog(labels)?)?;

    if output == "json" {
        let mut records: Vec<&ChangeRecord> = scanner.store().records().collect();
        records.sort_by_key(|r| r.usn);
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if let Some(state) = scanner.journal_state() {
        println!(
            "\n{} journal 0x{:016X}, USN {} to {}",
            style("Journal:").bold(),
            state.journal_id,
            state.first_usn,
            state.next_usn
        );
    }

    let mut records: Vec<&ChangeRecord> = scanner.store().records().collect();
    records.sort_by_key(|r| std::cmp::Reverse(r.usn));
    records.truncate(limit);

    println!("{}", style("Most recent changes:").bold());
    for record in records {
        let reasons = record.reason_text.as_deref().unwrap_or("");
        println!(
            "  {:>12}  {}  {}  {}",
            record.usn,
            format_filetime(record.timestamp),
            style(&record.name).cyan(),
            style(reasons).dim()
        );
    }

    Ok(())
}

fn cmd_tree(drive: char, depth: Option<usize>) -> usntrace::Result<()> {
    let scanner = run_scan(drive, ReasonCatalog::default())?;
    let tree = scanner.build_tree();

    println!();
    for root in tree.roots() {
        print_node(root, 0, depth);
    }
    if tree.skipped_unresolved() > 0 {
        println!(
            "{}",
            style(format!(
                "({} director{} could not be resolved to a path)",
                tree.skipped_unresolved(),
                if tree.skipped_unresolved() == 1 { "y" } else { "ies" }
            ))
            .dim()
        );
    }

    Ok(())
}

fn print_node(node: &usntrace::PathNode, indent: usize, max_depth: Option<usize>) {
    let label = if node.has_changes {
        style(node.label.as_str()).cyan().bold()
    } else {
        style(node.label.as_str()).dim()
    };
    println!("{}{}", "  ".repeat(indent), label);

    if max_depth.map_or(true, |d| indent + 1 < d) {
        for child in node.children.values() {
            print_node(child, indent + 1, max_depth);
        }
    }
}

fn cmd_changes(drive: char, path: &str) -> usntrace::Result<()> {
    let scanner = run_scan(drive, ReasonCatalog::default())?;

    match scanner.changes_under(path) {
        Some(usns) => {
            println!(
                "\n{} change{} under {}",
                style(usns.len()).bold(),
                if usns.len() == 1 { "" } else { "s" },
                style(path).cyan()
            );
            for &usn in usns {
                if let Some(record) = scanner.record(usn) {
                    println!(
                        "  {:>12}  {}  {}  {}",
                        record.usn,
                        format_filetime(record.timestamp),
                        record.name,
                        style(record.reason_text.as_deref().unwrap_or("")).dim()
                    );
                }
            }
        }
        None => {
            println!(
                "no indexed changes under '{}' (paths match byte-for-byte)",
                path
            );
        }
    }

    Ok(())
}

#[cfg(windows)]
fn cmd_volumes() -> usntrace::Result<()> {
    use usntrace::{JournalPort, WindowsJournal};

    let mut found = 0;
    for letter in 'A'..='Z' {
        let Ok(mut port) = WindowsJournal::open(letter) else {
            continue;
        };
        if let Ok(state) = port.query_state() {
            println!(
                "  {}:  journal 0x{:016X}, {} USNs",
                letter,
                state.journal_id,
                state.next_usn - state.first_usn
            );
            found += 1;
        }
    }

    if found == 0 {
        println!("no volumes with an active change journal");
    }
    Ok(())
}

#[cfg(not(windows))]
fn cmd_volumes() -> usntrace::Result<()> {
    Err(usntrace::UsnTraceError::Unsupported(
        "volume enumeration requires Windows".to_string(),
    ))
}
