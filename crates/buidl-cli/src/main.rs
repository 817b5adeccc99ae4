use std::sync::Arc;

use anyhow::{bail, Context, Result};
use buidl_core::{EntityKind, Source};
use buidl_storage::{MemoryStore, PgRecordStore, RecordStore};
use buidl_sync::{RunReport, ScrapeRequest, SourceRegistry, SyncConfig, SyncPipeline};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "buidl-cli")]
#[command(about = "Scrape, normalize and reconcile web3 hackathons and grants")]
struct Cli {
    /// Debug-level logs unless RUST_LOG is set.
    #[arg(long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run every enabled source once.
    Run {
        /// Reconcile into an in-memory store instead of the database.
        #[arg(long)]
        dry_run: bool,
        /// Exit non-zero when any source fails.
        #[arg(long)]
        fail_on_error: bool,
    },
    /// Run a single source on demand.
    Scrape {
        source: Source,
        #[arg(long, value_enum)]
        entity_type: Option<EntityArg>,
        #[arg(long)]
        dry_run: bool,
    },
    /// List the configured sources.
    Sources,
    /// Run the cron scheduler until interrupted.
    Schedule,
    /// Apply database migrations.
    Migrate,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EntityArg {
    Hackathon,
    Grant,
}

impl From<EntityArg> for EntityKind {
    fn from(arg: EntityArg) -> Self {
        match arg {
            EntityArg::Hackathon => EntityKind::Hackathon,
            EntityArg::Grant => EntityKind::Grant,
        }
    }
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

async fn open_store(config: &SyncConfig, dry_run: bool) -> Result<Arc<dyn RecordStore>> {
    match config.database_url.as_deref() {
        Some(url) if !dry_run => {
            let store = PgRecordStore::connect(url).await.context("connecting to database")?;
            store.migrate().await.context("running migrations")?;
            Ok(Arc::new(store))
        }
        _ => {
            info!(dry_run, "using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

fn print_report(report: &RunReport) {
    println!("run {} ({} sources)", report.run_id, report.results.len());
    for r in &report.results {
        match &r.error {
            Some(err) => println!("  {:<18} FAILED: {err}", r.name),
            None => println!(
                "  {:<18} found={} created={} updated={} unchanged={} failed={}",
                r.name, r.found, r.created, r.updated, r.unchanged, r.failed
            ),
        }
    }
    let t = &report.totals;
    println!(
        "total: found={} created={} updated={} unchanged={} failed={} source_failures={}",
        t.found, t.created, t.updated, t.unchanged, t.failed, report.failures
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);
    let config = SyncConfig::from_env();

    match cli.command.unwrap_or(Commands::Run {
        dry_run: false,
        fail_on_error: false,
    }) {
        Commands::Run {
            dry_run,
            fail_on_error,
        } => {
            let store = open_store(&config, dry_run).await?;
            let pipeline = SyncPipeline::load(config, store).await?;
            let report = pipeline.run_once().await?;
            print_report(&report);
            if fail_on_error && report.has_failures() {
                bail!("{} source(s) failed", report.failures);
            }
        }
        Commands::Scrape {
            source,
            entity_type,
            dry_run,
        } => {
            let request = ScrapeRequest {
                source,
                entity_type: entity_type.map(EntityKind::from),
            };
            request.validate()?;
            let store = open_store(&config, dry_run).await?;
            let pipeline = SyncPipeline::load(config, store).await?;
            let report = pipeline.handle_request(request).await?;
            print_report(&report);
            if report.has_failures() {
                bail!("{source} failed");
            }
        }
        Commands::Sources => {
            let registry = SourceRegistry::load(&config.workspace_root).await?;
            for entry in &registry.sources {
                println!(
                    "{:<18} {:<9} {:<8} {}",
                    entry.source.as_str(),
                    entry.entity_type.as_str(),
                    if entry.enabled { "enabled" } else { "disabled" },
                    entry.schedule.as_deref().unwrap_or("-")
                );
            }
        }
        Commands::Schedule => {
            let store = open_store(&config, false).await?;
            let pipeline = Arc::new(SyncPipeline::load(config, store).await?);
            let mut sched = pipeline.build_scheduler().await?;
            sched.start().await.context("starting scheduler")?;
            info!("scheduler running; ctrl-c to stop");
            tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
            sched.shutdown().await.context("stopping scheduler")?;
        }
        Commands::Migrate => {
            let Some(url) = config.database_url.as_deref() else {
                bail!("DATABASE_URL is not set");
            };
            let store = PgRecordStore::connect(url).await.context("connecting to database")?;
            store.migrate().await.context("running migrations")?;
            println!("migrations applied");
        }
    }

    Ok(())
}
