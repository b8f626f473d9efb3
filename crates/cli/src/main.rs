use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use codemap_indexer::{ChangeBatch, ChangeWatcher, ProjectAnalyzer, WatcherConfig};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;

#[derive(Parser)]
#[command(name = "codemap")]
#[command(about = "Incremental dependency maps for JS/TS/Vue projects", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a project and print the dependency report as JSON
    Analyze(AnalyzeArgs),

    /// List files related to one file through import edges
    Related(RelatedArgs),

    /// Watch a project and re-analyze on every change batch
    Watch(WatchArgs),

    /// Print cache statistics for a project
    Stats(StatsArgs),
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Project directory to analyze (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Write the report to a file instead of stdout
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Force full re-analysis (ignore the incremental cache)
    #[arg(long)]
    force: bool,
}

#[derive(Args)]
struct RelatedArgs {
    /// Project-relative file to start from, e.g. src/components/App.vue
    file: String,

    /// Project directory (defaults to current directory)
    #[arg(long, default_value = ".")]
    path: PathBuf,

    /// Maximum number of import hops to follow
    #[arg(long, short = 'd', default_value_t = 2)]
    depth: u32,
}

#[derive(Args)]
struct WatchArgs {
    /// Project directory to watch (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,
}

#[derive(Args)]
struct StatsArgs {
    /// Project directory (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,
}

/// One stdout line per completed watch cycle.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WatchCycleLine<'a> {
    changed: &'a BTreeSet<String>,
    deleted: &'a BTreeSet<String>,
    overflowed: bool,
    file_count: usize,
    files_extracted: usize,
    files_failed: usize,
    duration_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match cli.command {
        Commands::Analyze(args) => run_analyze(args).await?,
        Commands::Related(args) => run_related(args).await?,
        Commands::Watch(args) => run_watch(args).await?,
        Commands::Stats(args) => run_stats(args).await?,
    }

    Ok(())
}

async fn run_analyze(args: AnalyzeArgs) -> Result<()> {
    let root = args.path.canonicalize().context("Invalid project path")?;
    let analyzer = ProjectAnalyzer::new(&root)?;

    let report = if args.force {
        analyzer.analyze_full().await?
    } else {
        analyzer.analyze().await?
    };

    let json = serde_json::to_string_pretty(&report)?;
    match args.output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::write(&path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Report saved to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

async fn run_related(args: RelatedArgs) -> Result<()> {
    let root = args.path.canonicalize().context("Invalid project path")?;
    let analyzer = ProjectAnalyzer::new(&root)?;

    let report = analyzer.analyze().await?;
    if !report.files.contains_key(&args.file) {
        anyhow::bail!("{} is not an indexed file", args.file);
    }

    let related = analyzer.related_files(&args.file, args.depth);
    if related.is_empty() {
        log::info!("No files related to {} within {} hops", args.file, args.depth);
    }
    for path in related {
        println!("{path}");
    }
    Ok(())
}

async fn run_watch(args: WatchArgs) -> Result<()> {
    let root = args.path.canonicalize().context("Invalid project path")?;
    let analyzer = ProjectAnalyzer::new(&root)?;

    let report = analyzer.analyze().await?;
    log::info!("Initial analysis: {} files", report.file_count);

    let watcher = ChangeWatcher::start(analyzer.cache(), &root, WatcherConfig::default())?;
    let mut batches = watcher.subscribe();
    log::info!("Watching {} (Ctrl-C to stop)", root.display());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            received = batches.recv() => match received {
                Ok(batch) => handle_batch(&analyzer, &batch).await,
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Dropped {skipped} change batches; re-analyzing");
                    if let Err(e) = analyzer.analyze().await {
                        log::error!("Analysis failed: {e}");
                    }
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    log::info!("Watch stopped");
    Ok(())
}

async fn handle_batch(analyzer: &ProjectAnalyzer, batch: &ChangeBatch) {
    if batch.is_empty() {
        return;
    }

    match analyzer.analyze().await {
        Ok(report) => {
            let line = WatchCycleLine {
                changed: &batch.changed,
                deleted: &batch.deleted,
                overflowed: batch.overflowed,
                file_count: report.file_count,
                files_extracted: report.statistics.files_extracted,
                files_failed: report.statistics.files_failed,
                duration_ms: report.statistics.duration_ms,
            };
            match serde_json::to_string(&line) {
                Ok(json) => println!("{json}"),
                Err(e) => log::error!("Failed to serialize watch line: {e}"),
            }
        }
        Err(e) => log::error!("Analysis failed: {e}"),
    }
}

async fn run_stats(args: StatsArgs) -> Result<()> {
    let root = args.path.canonicalize().context("Invalid project path")?;
    let analyzer = ProjectAnalyzer::new(&root)?;
    println!("{}", serde_json::to_string_pretty(&analyzer.stats())?);
    Ok(())
}
