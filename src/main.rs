use anyhow::{Context, Result};
use burstcull::audit::{AuditLog, AuditSummary};
use burstcull::config::{CullConfig, DEFAULT_JOBS, DEFAULT_THRESHOLD};
use burstcull::coordinator::Coordinator;
use burstcull::hash::{HashAlgorithm, ImageHashProvider};
use burstcull::quarantine::Quarantine;
use burstcull::{history, progress, scanner};
use clap::builder::TypedValueParser;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "burstcull", version, about = "Quarantine near-duplicate burst shots")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify bursts and move duplicates into the destination tree
    Cull {
        /// Root directory to scan
        #[arg(short, long, value_name = "DIR")]
        source: PathBuf,
        /// Quarantine root; the audit log is written here too
        #[arg(short, long, value_name = "DIR")]
        dest: PathBuf,
        /// Largest hash distance from the run's first image still counted as a duplicate
        #[arg(short, long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: u32,
        /// Number of directories processed in parallel
        #[arg(short, long, default_value_t = DEFAULT_JOBS,
              value_parser = clap::value_parser!(u64).range(1..).map(|n| n as usize))]
        jobs: usize,
        /// Only write the audit log, move nothing
        #[arg(long)]
        dry_run: bool,
        /// Perceptual hash used for comparison
        #[arg(short, long, value_enum, default_value_t = HashAlgorithm::Dhash)]
        algorithm: HashAlgorithm,
    },

    /// Work with audit logs of earlier runs
    History {
        #[command(subcommand)]
        command: HistoryCmd,
    },
}

#[derive(Subcommand, Debug)]
enum HistoryCmd {
    /// List audit logs in a quarantine root
    List {
        /// Quarantine root used for earlier runs
        #[arg(short, long, value_name = "DIR")]
        dest: PathBuf,
    },

    /// Move quarantined files from one run back to their original place
    Restore {
        /// Audit log of the run to undo
        #[arg(short, long, value_name = "FILE")]
        log: PathBuf,
        /// Only show what would be restored
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Cull {
            source,
            dest,
            threshold,
            jobs,
            dry_run,
            algorithm,
        } => {
            let config = CullConfig::resolve(&source, &dest, threshold, jobs, dry_run, algorithm)?;
            let log_path = cull(&config)?;
            println!("{}", log_path.display());
        }

        Commands::History { command } => match command {
            HistoryCmd::List { dest } => {
                let listings = history::list(&dest)
                    .with_context(|| format!("Could not read audit logs in {:?}", dest))?;
                if listings.is_empty() {
                    println!("No audit logs in {}", dest.display());
                    return Ok(());
                }
                println!("🗂️  Cull history:");
                for (i, listing) in listings.iter().enumerate() {
                    println!(
                        "[{}] {}\n     images: {}  directories: {}  duplicates: {}\n",
                        i,
                        listing.path.display(),
                        listing.summary.total_images,
                        listing.summary.directories,
                        listing.duplicates
                    );
                }
            }

            HistoryCmd::Restore { log, dry_run } => {
                println!("🔄 Restoring from {}", log.display());
                let stats = history::restore(&log, dry_run)
                    .with_context(|| format!("Failed to restore from {:?}", log))?;
                println!(
                    "🔄 {} restored, {} skipped, {} failed",
                    stats.restored, stats.skipped, stats.failed
                );
                if dry_run {
                    println!("\n⚠️  Dry-run only; no files were changed.");
                }
            }
        },
    }

    Ok(())
}

/// Scan, classify and quarantine according to `config`; returns the audit log path.
fn cull(config: &CullConfig) -> Result<PathBuf> {
    eprintln!("▶ Scanning {}", config.source.display());
    let spinner = progress::spinner("Scanning for images…");
    let chunks = scanner::partition(&config.source, config.nested_dest(), &spinner)?;
    spinner.finish_with_message("Scan complete");

    let summary = AuditSummary {
        total_images: scanner::image_count(&chunks),
        directories: chunks.len(),
    };
    let (mut audit, log_path) = AuditLog::create_in(&config.dest, summary)
        .with_context(|| format!("Failed to create audit log in {:?}", config.dest))?;
    eprintln!(
        "▶ {} image(s) in {} director(ies), threshold {} ({})",
        summary.total_images, summary.directories, config.threshold, config.algorithm
    );

    let provider = ImageHashProvider::new(config.algorithm);
    let quarantine = Quarantine::new(&config.source, &config.dest, config.dry_run);
    let coordinator = Coordinator::new(&provider, &quarantine, config.threshold, config.jobs)
        .context("Failed to start worker pool")?;

    let bar = progress::image_bar(summary.total_images);
    let stats = benchmark("classifying all images", || {
        coordinator.run(chunks, &mut audit, &bar)
    })
    .with_context(|| format!("Failed to write audit log {:?}", log_path))?;
    bar.finish_with_message("done");

    eprintln!(
        "✨ {} duplicate(s), {} moved, {} problem(s)",
        stats.duplicates, stats.moved, stats.failures
    );
    if config.dry_run {
        eprintln!("⚠️  Dry-run only; no files were changed.");
    }
    Ok(log_path)
}

/// Run `f()`, print how long it took (with `label`), and return its result.
fn benchmark<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    let start = Instant::now();
    let result = f();
    eprintln!("⏱ {} took {:.2?}", label, start.elapsed());
    result
}
