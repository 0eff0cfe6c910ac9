use anyhow::{Context, Result, bail};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use devscan::discovery::discover_files;
use devscan::loader::{builtin_signatures, load_signatures};
use devscan::logging::init_logging;
use devscan::{Anchoring, EngineKind, Orchestrator, ScanConfig, ScanReport, TracingSink};

const PROGRESS_POLL: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(name = "devscan")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Identify file formats by content across a directory tree")]
struct Cli {
    /// File or directory to scan
    target: PathBuf,

    /// Signature definitions (JSON); the built-in set is used when omitted
    #[arg(short = 'c', long = "config")]
    signatures: Option<PathBuf>,

    /// backtrack | two-phase | vectorscan
    #[arg(short, long, default_value = "two-phase")]
    engine: EngineKind,

    /// Worker threads (defaults to the number of CPUs)
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Skip files larger than this many MiB
    #[arg(short = 'm', long = "max-filesize", default_value_t = 512)]
    max_filesize_mb: u64,

    /// Match binary headers anywhere in a file (raw stream captures)
    #[arg(long)]
    unanchored: bool,

    /// Write a JSON report here
    #[arg(long)]
    json: Option<PathBuf>,

    /// Write a text report here
    #[arg(long)]
    txt: Option<PathBuf>,

    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging("info");
    let sink = TracingSink;

    let signatures = match &cli.signatures {
        Some(path) => load_signatures(path, &sink)
            .with_context(|| format!("Failed to load signatures from {}", path.display()))?,
        None => builtin_signatures(&sink).context("Failed to load built-in signatures")?,
    };

    let mut config = ScanConfig::new()
        .with_engine(cli.engine)
        .with_max_file_size(cli.max_filesize_mb.saturating_mul(1024 * 1024));
    if let Some(threads) = cli.threads {
        config = config.with_workers(threads);
    }
    if cli.unanchored {
        config = config.with_anchoring(Anchoring::Unanchored);
    }

    let orchestrator = Orchestrator::new(config, signatures, &sink).context("Cannot start scan")?;

    if !cli.target.exists() {
        bail!("Target does not exist: {}", cli.target.display());
    }
    let files = discover_files(&cli.target, &sink);
    tracing::info!(
        files = files.len(),
        engine = %cli.engine,
        signatures = orchestrator.patterns().len(),
        "starting scan"
    );

    let stats = if cli.quiet {
        orchestrator.scan_paths(&files)?
    } else {
        scan_with_progress(&orchestrator, &files)?
    };

    let report = ScanReport::new(cli.target.display().to_string(), cli.engine, &stats);
    for line in report.summary_lines() {
        println!("{line}");
    }
    println!("Total files processed: {}", report.total_files_processed);

    if let Some(path) = &cli.json {
        report
            .write_json(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    if let Some(path) = &cli.txt {
        report
            .write_text(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}

fn scan_with_progress(
    orchestrator: &Orchestrator<'_>,
    files: &[PathBuf],
) -> Result<devscan::ScanStats> {
    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({eta})")?
            .progress_chars("=>-"),
    );

    let progress = orchestrator.progress();
    let done = AtomicBool::new(false);

    let stats = thread::scope(|scope| {
        scope.spawn(|| {
            while !done.load(Ordering::Relaxed) {
                pb.set_position(progress.get() as u64);
                thread::sleep(PROGRESS_POLL);
            }
        });
        let result = orchestrator.scan_paths(files);
        done.store(true, Ordering::Relaxed);
        result
    })?;

    pb.set_position(progress.get() as u64);
    pb.finish_and_clear();
    Ok(stats)
}
