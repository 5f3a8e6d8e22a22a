//! SpaceHound: disk-usage aggregation and duplicate-file detection.
//!
//! Thin binary entry point. All logic lives in `spacehound-core`; this file
//! parses arguments, wires up logging and prints job events as JSON lines.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use parking_lot::Mutex;
use spacehound_core::analysis::FileCategory;
use spacehound_core::history::{ScanHistory, ScanSnapshot};
use spacehound_core::model::size::format_size;
use spacehound_core::model::{DuplicateGroup, ScanNode};
use spacehound_core::orchestrator::{DuplicateRequestHandler, ScanOrchestrator};
use spacehound_core::scanner::progress::{DuplicateEvent, ScanEvent};
use spacehound_core::{export, EngineConfig};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

/// Background disk-usage aggregation and duplicate-file detection.
#[derive(Debug, Parser)]
#[command(name = "spacehound", version, about, long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Scan history file (overrides the configured one)
    #[arg(long, value_name = "FILE", global = true)]
    history: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Aggregate sizes and categories under a directory
    Scan(ScanArgs),
    /// Find duplicate files under a directory
    Dupes(DupesArgs),
    /// Print recorded scan snapshots
    History,
}

#[derive(Debug, Args)]
struct ScanArgs {
    #[arg(value_name = "PATH")]
    path: String,

    /// Deepest directory level to descend into
    #[arg(long, value_name = "N")]
    max_depth: Option<usize>,
}

#[derive(Debug, Args)]
struct DupesArgs {
    #[arg(value_name = "PATH")]
    path: String,

    /// Also write the groups as CSV
    #[arg(long, value_name = "FILE")]
    csv: Option<PathBuf>,

    /// Print status and progress events as well as the result
    #[arg(long)]
    progress: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(path) = cli.history.clone() {
        config.history.path = Some(path);
    }
    config.validate()?;

    tracing::debug!("SpaceHound starting with {config:?}");

    match cli.command {
        Command::Scan(args) => run_scan(&config, &args),
        Command::Dupes(args) => run_dupes(&config, &args),
        Command::History => print_history(&config),
    }
}

fn open_history(config: &EngineConfig) -> anyhow::Result<Option<ScanHistory>> {
    match &config.history.path {
        Some(path) => Ok(Some(
            ScanHistory::open(path, config.history.capacity)
                .with_context(|| format!("failed to open history {}", path.display()))?,
        )),
        None => Ok(None),
    }
}

fn print_line<T: serde::Serialize>(out: &mut impl Write, value: &T) -> anyhow::Result<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn run_scan(config: &EngineConfig, args: &ScanArgs) -> anyhow::Result<()> {
    let orchestrator = match open_history(config)? {
        Some(history) => ScanOrchestrator::with_history(config, Arc::new(Mutex::new(history)))?,
        None => ScanOrchestrator::new(config)?,
    };
    let ticket = orchestrator.start_scan(&args.path, args.max_depth)?;

    let mut out = io::stdout().lock();
    for event in ticket.events.iter() {
        print_line(&mut out, &event)?;
        match event {
            ScanEvent::Progress { .. } => continue,
            ScanEvent::Complete(node) => {
                log_breakdown(&node);
                return Ok(());
            }
            ScanEvent::Error(failure) => bail!("scan failed: {failure}"),
            ScanEvent::Cancelled => bail!("scan cancelled"),
        }
    }
    bail!("scan ended without a result")
}

fn run_dupes(config: &EngineConfig, args: &DupesArgs) -> anyhow::Result<()> {
    let handler = DuplicateRequestHandler::with_progress_forwarding(config, args.progress)?;
    let ticket = handler.find_duplicates(&args.path)?;

    let mut out = io::stdout().lock();
    for event in ticket.events.iter() {
        print_line(&mut out, &event)?;
        match event {
            DuplicateEvent::Status { .. } | DuplicateEvent::Progress { .. } => continue,
            DuplicateEvent::Complete(groups) => {
                if let Some(path) = &args.csv {
                    let file = File::create(path)
                        .with_context(|| format!("failed to create {}", path.display()))?;
                    export::write_duplicates_csv(&groups, BufWriter::new(file))?;
                    tracing::info!("Wrote {} groups to {}", groups.len(), path.display());
                }
                log_reclaimable(&groups);
                return Ok(());
            }
            DuplicateEvent::Error(failure) => bail!("duplicate detection failed: {failure}"),
            DuplicateEvent::Cancelled => bail!("duplicate detection cancelled"),
        }
    }
    bail!("duplicate detection ended without a result")
}

fn print_history(config: &EngineConfig) -> anyhow::Result<()> {
    let Some(history) = open_history(config)? else {
        bail!("no history file configured; pass --history FILE");
    };
    if history.is_empty() {
        if let Some(file) = history.file() {
            tracing::info!("No snapshots recorded in {}", file.display());
        }
    }
    let snapshots: Vec<&ScanSnapshot> = history.snapshots().collect();
    println!("{}", export::to_json_pretty(&snapshots)?);
    Ok(())
}

fn log_breakdown(node: &ScanNode) {
    tracing::info!("{}: {}", node.path.display(), format_size(node.size));
    for category in FileCategory::ALL {
        let bytes = node.categories.get(category);
        if bytes > 0 {
            tracing::info!("  {:<12} {}", category.label(), format_size(bytes));
        }
    }
}

fn log_reclaimable(groups: &[DuplicateGroup]) {
    for group in groups {
        if let Some(keep) = group.keep_candidate() {
            tracing::debug!(
                "{} copies of {} ({} each)",
                group.files.len(),
                keep.display(),
                format_size(group.size)
            );
        }
    }
    let wasted: u64 = groups.iter().map(DuplicateGroup::wasted_bytes).sum();
    tracing::info!(
        "{} duplicate groups, {} reclaimable",
        groups.len(),
        format_size(wasted)
    );
}
