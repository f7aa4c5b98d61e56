//! revisit CLI - reciprocal engagement for a blog neighborhood
//!
//! Usage:
//!   revisit init                 Write default config and create the store
//!   revisit run                  Scan notifications, then engage with the feed
//!   revisit scan                 Scan notifications and update the ranking only
//!   revisit ranking              Show the current reputation ranking
//!   revisit visits               Show the visit ledger
//!   revisit reset-stats          Clear accumulated reputation

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use revisit_assistant::AnthropicAssistant;
use revisit_browser::BrowserSession;
use revisit_core::{
    Assistant, Checkpoint, CheckpointStore, RevisitConfig, StatsDelta, StatsStore, VisitLedger,
};
use revisit_engine::{format_ranking, LoggingObserver, Orchestrator, Ranking, RunReport, StopSignal};
use revisit_store::Database;
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "revisit")]
#[command(author, version, about = "Reciprocal engagement for a blog neighborhood")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Directory holding .revisit/
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config and create the store
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Scan notifications, then like and comment through the feed
    Run {
        /// Stop after this many successful engagements
        #[arg(short, long)]
        target: Option<usize>,

        /// First feed page to walk
        #[arg(long)]
        start_page: Option<usize>,

        /// Attach to a browser on this DevTools port
        #[arg(long)]
        port: Option<u16>,

        /// Use template comments only
        #[arg(long)]
        no_assistant: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Scan notifications and update the ranking only
    Scan {
        /// Attach to a browser on this DevTools port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Show the current reputation ranking
    Ranking {
        /// Rows to show
        #[arg(short = 'n', long, default_value = "30")]
        limit: usize,
    },

    /// Show the visit ledger, most recent first
    Visits {
        /// Rows to show
        #[arg(short = 'n', long, default_value = "30")]
        limit: usize,
    },

    /// Clear accumulated reputation counters
    ResetStats {
        /// Also forget the scan checkpoint so the next scan starts over
        #[arg(long)]
        checkpoint: bool,

        /// Required; resets cannot be undone
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let root = cli.root;
    match cli.command {
        Commands::Init { force } => cmd_init(&root, force).await,
        Commands::Run {
            target,
            start_page,
            port,
            no_assistant,
            json,
        } => cmd_run(&root, target, start_page, port, no_assistant, json).await,
        Commands::Scan { port } => cmd_scan(&root, port).await,
        Commands::Ranking { limit } => cmd_ranking(&root, limit).await,
        Commands::Visits { limit } => cmd_visits(&root, limit).await,
        Commands::ResetStats { checkpoint, yes } => cmd_reset_stats(&root, checkpoint, yes).await,
    }
}

fn load_config(root: &Path) -> Result<RevisitConfig> {
    RevisitConfig::load_or_default(root).context("Failed to load .revisit/config.toml")
}

async fn open_store(root: &Path, config: &RevisitConfig) -> Result<Database> {
    let path = root.join(&config.store.path);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let db = Database::open(&path)
        .await
        .with_context(|| format!("Failed to open store at {}", path.display()))?;
    db.init_schema().await?;
    Ok(db)
}

/// Stop signal raised by the first Ctrl-C
fn stop_on_ctrl_c() -> StopSignal {
    let stop = StopSignal::new();
    let handle = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Stop requested; finishing the current step");
            handle.request();
        }
    });
    stop
}

fn build_assistant(config: &RevisitConfig, disabled: bool) -> Option<AnthropicAssistant> {
    if disabled || !config.assistant.enabled {
        return None;
    }
    match AnthropicAssistant::from_config(&config.assistant) {
        Ok(assistant) => Some(assistant),
        Err(e) => {
            warn!("Assistant disabled: {}", e);
            None
        }
    }
}

async fn cmd_init(root: &Path, force: bool) -> Result<()> {
    info!("Initializing revisit in {:?}", root);

    let config_path = root.join(".revisit/config.toml");
    if config_path.exists() && !force {
        println!("Config already exists at {:?} (use --force to overwrite)", config_path);
    } else {
        let written = RevisitConfig::write_default(root)?;
        println!("Wrote {:?}", written);
    }

    let config = load_config(root)?;
    let db = open_store(root, &config).await?;
    println!("Store ready at {}", db.path());

    println!("\nNext steps:");
    println!("  1. Start Chrome with --remote-debugging-port=9222 and log in");
    println!("  2. Set browser.debug_port = 9222 in .revisit/config.toml");
    println!("  3. Run 'revisit run --target 10'");
    Ok(())
}

async fn cmd_run(
    root: &Path,
    target: Option<usize>,
    start_page: Option<usize>,
    port: Option<u16>,
    no_assistant: bool,
    json: bool,
) -> Result<()> {
    let mut config = load_config(root)?;
    if let Some(target) = target {
        config.engagement.target_successes = target;
    }
    if let Some(page) = start_page {
        config.engagement.start_page = page;
    }
    if port.is_some() {
        config.browser.debug_port = port;
    }
    config.validate()?;

    let db = open_store(root, &config).await?;
    let session = BrowserSession::start(&config.browser).await?;
    let assistant = build_assistant(&config, no_assistant);
    let observer = LoggingObserver::default();
    let stop = stop_on_ctrl_c();

    let mut orchestrator = Orchestrator::new(&session, &db, &config, &observer, stop);
    if let Some(ref assistant) = assistant {
        orchestrator = orchestrator.with_assistant(assistant as &dyn Assistant);
    }
    let result = orchestrator.run().await;

    if let Err(e) = session.close().await {
        warn!("Browser cleanup failed: {}", e);
    }
    let report = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    if report.halted() {
        bail!("Run halted by the platform's daily limit");
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    println!("\nRun report");
    println!("==========");
    println!(
        "Scan:       {} ({} cards, {} new events, {} counterparties{})",
        report.scan.termination,
        report.scan.cards_read,
        report.scan.new_events,
        report.scan.counterparties,
        if report.scan.committed { "" } else { ", discarded" }
    );
    println!("Ranked:     {}", report.ranking_size);
    println!("Pages:      {}", report.pages);
    println!("Attempts:   {}", report.attempts);
    println!(
        "Successes:  {} ({} comments)",
        report.successes, report.comments
    );
    println!("Already:    {}", report.already_done);
    println!("Failures:   {}", report.failures);
    println!("Stopped:    {}", report.stop_reason);
}

async fn cmd_scan(root: &Path, port: Option<u16>) -> Result<()> {
    let mut config = load_config(root)?;
    if port.is_some() {
        config.browser.debug_port = port;
    }

    let db = open_store(root, &config).await?;
    let session = BrowserSession::start(&config.browser).await?;
    let observer = LoggingObserver::default();
    let stop = stop_on_ctrl_c();

    let result = Orchestrator::new(&session, &db, &config, &observer, stop)
        .sync()
        .await;
    if let Err(e) = session.close().await {
        warn!("Browser cleanup failed: {}", e);
    }
    let (summary, ranking) = result?;

    println!(
        "Scan finished: {} ({} new events{})",
        summary.termination,
        summary.new_events,
        if summary.committed { "" } else { ", discarded" }
    );
    println!("{} counterparties ranked", ranking.len());
    Ok(())
}

async fn cmd_ranking(root: &Path, limit: usize) -> Result<()> {
    let config = load_config(root)?;
    let db = open_store(root, &config).await?;

    let ranking = Ranking::from_stats(&db.all_stats().await?, &config.scoring);
    if ranking.is_empty() {
        println!("No reputation recorded yet. Run 'revisit scan' first.");
        return Ok(());
    }
    println!("{}", format_ranking(ranking.entries(), limit));

    let checkpoint = db.load_checkpoint().await?;
    if let Some(at) = checkpoint.last_sync_at {
        println!("Last sync: {}", at.to_rfc3339());
    }
    Ok(())
}

async fn cmd_visits(root: &Path, limit: usize) -> Result<()> {
    let config = load_config(root)?;
    let db = open_store(root, &config).await?;
    let now = Utc::now();
    let cooldown = config.engagement.cooldown_days;

    let visits = db.all_visits().await?;
    if visits.is_empty() {
        println!("No visits recorded yet.");
        return Ok(());
    }

    println!("{:<24} {:>6} {:<26} {}", "COUNTERPARTY", "COUNT", "LAST ENGAGED", "READY");
    for visit in visits.iter().take(limit) {
        let last = visit
            .last_engaged_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        let ready = if visit.can_engage_at(cooldown, now) { "yes" } else { "no" };
        println!(
            "{:<24} {:>6} {:<26} {}",
            visit.counterparty, visit.count, last, ready
        );
    }
    Ok(())
}

async fn cmd_reset_stats(root: &Path, checkpoint: bool, yes: bool) -> Result<()> {
    if !yes {
        bail!("Refusing to reset without --yes");
    }
    let config = load_config(root)?;
    let db = open_store(root, &config).await?;

    let removed = db.reset_stats().await?;
    println!("Removed reputation for {} counterparties", removed);

    if checkpoint {
        db.commit_scan(&StatsDelta::default(), &Checkpoint::default())
            .await?;
        println!("Scan checkpoint cleared; the next scan starts from the top");
    }
    Ok(())
}
