//! Bulkgen CLI - runs bulk content-generation batches

mod console;
mod logging;
mod manifest;
mod settings;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use bulkgen_core::application::Orchestrator;
use bulkgen_core::port::id_provider::UuidProvider;
use bulkgen_core::port::time_provider::SystemTimeProvider;
use bulkgen_core::VERSION;
use bulkgen_infra_http::HttpGenerationClient;
use bulkgen_infra_sqlite::{create_pool, run_migrations, SqliteArtifactStore};

use console::{ConsoleReporter, GroupCountRow};
use manifest::Manifest;
use settings::Settings;

#[derive(Parser)]
#[command(name = "bulkgen")]
#[command(about = "Bulk content generation runner", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML config file (BULKGEN__* environment variables override it)
    #[arg(short, long, env = "BULKGEN_CONFIG", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every job in a manifest, one at a time
    Run {
        /// Manifest JSON file
        #[arg(short, long)]
        manifest: PathBuf,
    },

    /// Check a manifest without running it
    Validate {
        /// Manifest JSON file
        #[arg(short, long)]
        manifest: PathBuf,
    },

    /// List stored artifacts
    Artifacts {
        /// Only this group
        #[arg(short, long)]
        group: Option<String>,

        /// Print full artifacts as JSON
        #[arg(long)]
        json: bool,
    },
}

async fn open_store(settings: &Settings) -> Result<SqliteArtifactStore> {
    if let Some(dir) = settings.storage.database_dir() {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create database directory {}", dir.display()))?;
    }

    let database_url = settings.storage.resolved_url();
    info!(database_url = %database_url, "Opening artifact store");
    let pool = create_pool(&database_url)
        .await
        .context("DB pool creation failed")?;
    run_migrations(&pool).await.context("Migration failed")?;

    Ok(SqliteArtifactStore::new(pool, Arc::new(SystemTimeProvider)))
}

async fn run(settings: Settings, manifest_path: &Path) -> Result<()> {
    let manifest = Manifest::load(manifest_path)?;
    let problems = manifest.problems();
    if !problems.is_empty() {
        anyhow::bail!("Manifest rejected: {}", problems.join("; "));
    }
    let (jobs, groups) = manifest.into_run(&UuidProvider);

    let store = open_store(&settings).await?;
    let generator = HttpGenerationClient::new(&settings.generation)?;
    info!(endpoint = %generator.endpoint(), "Generation endpoint configured");

    let orchestrator = Arc::new(Orchestrator::new(
        settings.orchestrator,
        Arc::new(generator),
        Arc::new(store),
        Arc::new(ConsoleReporter),
        Arc::new(SystemTimeProvider),
    )?);
    orchestrator.initialize(jobs, groups)?;

    // Ctrl-C cancels; the in-flight job settles first
    let canceller = orchestrator.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            canceller.cancel();
        }
    });

    let stats = orchestrator.start().await;
    console::print_run_summary(
        &stats,
        &orchestrator.group_statuses(),
        &orchestrator.job_records(),
    );

    if stats.failed > 0 {
        anyhow::bail!("{} of {} jobs failed", stats.failed, stats.total);
    }
    Ok(())
}

fn validate(manifest_path: &Path) -> Result<()> {
    let manifest = Manifest::load(manifest_path)?;

    let rows: Vec<GroupCountRow> = manifest
        .group_counts()
        .into_iter()
        .map(|c| GroupCountRow {
            group: c.key,
            title: c.title,
            jobs: c.jobs,
        })
        .collect();
    if !rows.is_empty() {
        console::print_group_counts(rows);
    }

    for group in manifest.untracked_groups() {
        println!(
            "  {} group '{}' has no metadata; its jobs run but are not aggregated",
            "!".yellow(),
            group
        );
    }

    let problems = manifest.problems();
    if !problems.is_empty() {
        for problem in &problems {
            println!("  {} {}", "✗".red(), problem);
        }
        anyhow::bail!("Manifest has {} problem(s)", problems.len());
    }

    println!(
        "{}",
        format!("✓ {} jobs ready", manifest.jobs.len()).green().bold()
    );
    Ok(())
}

async fn artifacts(settings: Settings, group: Option<&str>, json: bool) -> Result<()> {
    let store = open_store(&settings).await?;
    let artifacts = store.list_artifacts(group).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&artifacts)?);
    } else {
        console::print_artifacts(&artifacts);
        println!(
            "  {} {}",
            "Total stored:".bold(),
            store.count_artifacts().await?
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging()?;
    info!("Bulkgen v{} starting...", VERSION);

    match cli.command {
        Commands::Run { manifest } => {
            let settings = Settings::load(cli.config.as_deref())?;
            run(settings, &manifest).await
        }
        Commands::Validate { manifest } => validate(&manifest),
        Commands::Artifacts { group, json } => {
            let settings = Settings::load(cli.config.as_deref())?;
            artifacts(settings, group.as_deref(), json).await
        }
    }
}
