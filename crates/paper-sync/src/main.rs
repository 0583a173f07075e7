//! paper-sync: one-shot sync of a BibTeX export into Obsidian paper notes.
//!
//! Progress is logged to stderr; the run summary goes to stdout.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

use paper_sync::bibtex;
use paper_sync::{ArchiveStorage, Config, ConfigArgs, NativeFs, Reconciler, SyncReport};

#[derive(Parser, Debug)]
#[command(name = "paper-sync")]
#[command(about = "Sync a BibTeX export into Obsidian paper notes")]
struct Args {
    /// Path to the Obsidian vault (defaults to $OBSIDIAN_VAULT_PATH)
    #[arg(short, long)]
    vault: Option<String>,

    /// BibTeX file to sync from (defaults to $PAPER_SYNC_BIB, then references.bib)
    #[arg(short, long)]
    bib: Option<String>,

    /// Archive file remembering the last sync
    /// (defaults to $PAPER_SYNC_ARCHIVE, then obsidian_archive.json)
    #[arg(short, long)]
    archive: Option<String>,

    /// Folder inside the vault holding the paper notes
    #[arg(long, default_value = paper_sync::config::DEFAULT_PAPERS_FOLDER)]
    papers_folder: String,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging - respects RUST_LOG env var, defaults to info (or debug with --verbose)
    let default_filter = if args.verbose {
        "info,paper_sync=debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env(ConfigArgs {
        vault: args.vault,
        bib: args.bib,
        archive: args.archive,
        papers_folder: Some(args.papers_folder),
    })?;
    config.validate()?;

    let papers_path = config.papers_path();
    if !papers_path.is_dir() {
        std::fs::create_dir_all(&papers_path)
            .with_context(|| format!("Failed to create papers folder {}", papers_path.display()))?;
        info!("Created papers folder: {}", papers_path.display());
    }

    info!("Reading BibTeX file: {}", config.bib_path.display());
    let bibliography = bibtex::load(&config.bib_path)?;
    info!("Found {} entries in BibTeX file", bibliography.records.len());

    let storage = ArchiveStorage::new(&config.archive_path);
    let archive = storage.load()?;
    info!("Loaded archive with {} entries", archive.len());

    let fs = NativeFs::new(papers_path.clone());
    let mut reconciler = Reconciler::new(fs, archive, config.sync.clone());
    let report = reconciler.run(&bibliography.records);

    storage
        .save(reconciler.archive())
        .with_context(|| format!("Failed to save archive {}", storage.path().display()))?;

    print_summary(&report, bibliography.malformed, &config.sync.removed_folder, &papers_path);
    Ok(())
}

fn print_summary(report: &SyncReport, malformed: usize, removed_folder: &str, papers_path: &Path) {
    println!("\nSync complete!");
    println!("Total entries in BibTeX: {}", report.total_entries);
    println!("New files created: {}", report.created.len());
    println!("Files updated: {}", report.updated.len());
    println!("Unchanged: {}", report.unchanged);
    println!("Files processed this run: {}", report.total_processed());
    if !report.archived.is_empty() {
        println!("Files moved to {}: {}", removed_folder, report.archived.len());
    }
    let skipped = report.skipped + malformed;
    if skipped > 0 {
        println!("Skipped records: {}", skipped);
    }
    if !report.failed.is_empty() {
        println!("Failed: {}", report.failed.len());
    }
    println!("Papers folder: {}", papers_path.display());
}
