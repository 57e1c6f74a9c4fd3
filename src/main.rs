use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use rgscan::abort::AbortHandle;
use rgscan::cache;
use rgscan::config::{FailurePolicy, ScanConfig, DEFAULT_JOBS, DEFAULT_TARGET_DB};
use rgscan::decoder::DecoderRegistry;
use rgscan::format;
use rgscan::models::ScanReport;
use rgscan::playlist::{scan_audio_files, Playlist};
use rgscan::replaygain;
use rgscan::scanner;
use rgscan::worker::track_name;

#[derive(Parser)]
#[command(name = "rgscan", about = "EBU R128 ReplayGain scanner for audio files")]
struct Cli {
    /// Audio files and/or directories; all tracks form one album
    paths: Vec<PathBuf>,

    /// ReplayGain target level in dB SPL
    #[arg(long, default_value_t = DEFAULT_TARGET_DB)]
    target: f64,

    /// Number of tracks scanned in parallel
    #[arg(short = 'j', long, default_value_t = DEFAULT_JOBS)]
    jobs: usize,

    /// Abort the whole scan when a track hits a fatal error
    #[arg(long)]
    abort_on_error: bool,

    /// Write ReplayGain tags to the files after a complete scan
    #[arg(long)]
    write: bool,

    /// Remove ReplayGain tags from the files instead of scanning
    #[arg(long)]
    remove: bool,

    /// Output as JSON instead of table
    #[arg(long)]
    json: bool,

    /// Output as CSV instead of table
    #[arg(long)]
    csv: bool,

    /// Save the report as rg_report.json in the scanned directory
    #[arg(long)]
    report: bool,

    /// Re-scan even if a saved report exists
    #[arg(long)]
    regenerate: bool,

    /// Launch interactive TUI
    #[arg(long)]
    tui: bool,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "rgscan=warn".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn collect_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(scan_audio_files(path));
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            anyhow::bail!("Path '{}' is not a file or directory", path.display());
        }
    }
    Ok(files)
}

fn print_report(cli: &Cli, report: &ScanReport) {
    if cli.json {
        println!("{}", format::format_json(report));
    } else if cli.csv {
        print!("{}", format::format_csv(report));
    } else {
        println!("{}", format::format_table(report));
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    if cli.remove && cli.write {
        anyhow::bail!("--remove and --write cannot be used together");
    }
    if cli.json && cli.csv {
        anyhow::bail!("--json and --csv cannot be used together");
    }

    let paths = if cli.paths.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        cli.paths.clone()
    };
    let files = collect_files(&paths)?;
    if files.is_empty() {
        anyhow::bail!("No audio files found");
    }

    // reports are kept per directory, so only a single directory argument has one
    let report_dir: Option<&Path> = match paths.as_slice() {
        [dir] if dir.is_dir() => Some(dir.as_path()),
        _ => None,
    };
    if cli.report && report_dir.is_none() {
        anyhow::bail!("--report requires a single directory argument");
    }

    let playlist = Arc::new(Playlist::new());
    let tracks = playlist.add_files(&files);
    let decoders = Arc::new(DecoderRegistry::with_defaults());

    if cli.remove {
        let removed = replaygain::remove(&playlist, &decoders, &tracks);
        eprintln!("Removed ReplayGain tags from {}/{} files", removed, tracks.len());
        return Ok(());
    }

    if let Some(dir) = report_dir {
        if cli.report && !cli.regenerate && !cli.write {
            if let Some(cached) = cache::load_cached_report(dir) {
                eprintln!("(loaded from saved report)");
                print_report(&cli, &cached);
                return Ok(());
            }
        }
    }

    let policy = if cli.abort_on_error {
        FailurePolicy::AbortScan
    } else {
        FailurePolicy::Isolate
    };
    let config = ScanConfig::default()
        .with_target_db(cli.target)
        .with_jobs(cli.jobs)
        .with_failure_policy(policy);

    let start = Instant::now();
    let report = if cli.tui {
        let names = files
            .iter()
            .map(|f| track_name(&f.to_string_lossy()))
            .collect();
        let export_dir = report_dir.unwrap_or_else(|| Path::new("."));
        rgscan::tui::run(
            Arc::clone(&playlist),
            Arc::clone(&decoders),
            tracks.clone(),
            names,
            config,
            export_dir,
        )?
    } else {
        scanner::scan(&playlist, &decoders, &tracks, &config, &AbortHandle::new())
    };
    let elapsed = start.elapsed();

    if cli.report {
        if let Some(dir) = report_dir {
            cache::save_report(dir, &report)
                .with_context(|| format!("Failed to save report in {}", dir.display()))?;
        }
    }

    if cli.write {
        if report.aborted {
            eprintln!("Warning: scan was aborted, no tags written");
        } else {
            let written = replaygain::apply_report(&playlist, &decoders, &tracks, &report);
            eprintln!("Wrote ReplayGain tags to {}/{} files", written, tracks.len());
        }
    }

    print_report(&cli, &report);

    eprintln!(
        "Scanned {} tracks ({} measured) in {:.2}s",
        report.tracks.len(),
        report.completed_count(),
        elapsed.as_secs_f64(),
    );

    Ok(())
}
