/// Migration Binary - Moves the legacy Nocturne graph store into the hierarchical memory store
///
/// Usage:
///   cargo run --bin migrate [--domain <name>] [--yes] [--log-file <path>]
///
/// Environment (a `.env` file in the working directory is honoured):
///   DATABASE_URL:   target SQLite database (e.g. sqlite:///memory.db)
///   NEO4J_URI:      legacy Neo4j (default bolt://localhost:7687)
///   dbuser:         Neo4j user (default neo4j)
///   dbpassword:     Neo4j password (default "password", with a warning)
///   GRAPH_SNAPSHOT: read a JSON export instead of Neo4j (path or file:// URL)
///
/// Mapping:
///   entity `nocturne`                -> core://nocturne
///   relationship `nocturne > salem`  -> core://nocturne/salem
///   chapter `first` on that edge     -> core://nocturne/salem/first
///
/// Exit codes: 0 on success or when declined, 1 on fatal errors,
/// 2 when the run completed with per-item errors.

use anyhow::Result;
use clap::Parser;
use nocturne_migrate::{
    GraphSource, GraphSourceConfig, MigrationConfig, MigrationOrchestrator, Neo4jGraph,
    RunOutcome, SnapshotGraph, SqliteStore, DEFAULT_DOMAIN, DEFAULT_LOG_FILE,
};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "migrate")]
#[command(about = "Migrate Nocturne memories from the legacy graph store into the hierarchical store")]
struct Args {
    /// Target domain for migrated memories
    #[arg(long, default_value = DEFAULT_DOMAIN)]
    domain: String,

    /// Skip the interactive confirmation
    #[arg(long, short)]
    yes: bool,

    /// Where to write the migration audit log
    #[arg(long, default_value = DEFAULT_LOG_FILE)]
    log_file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    dotenv::dotenv().ok();

    let args = Args::parse();

    info!("============================================================");
    info!("  GRAPH -> HIERARCHICAL MEMORY MIGRATION");
    info!("============================================================");

    info!("Preflight check...");
    let config = match MigrationConfig::from_env(args.domain.as_str()) {
        Ok(config) => config.with_log_file(args.log_file),
        Err(e) => {
            error!("{}", e);
            error!("Aborted: fix the errors above and try again.");
            return Err(e.into());
        }
    };
    for warning in config.preflight_warnings() {
        warn!("{}", warning);
    }

    info!("Initializing clients...");
    let store = SqliteStore::new(config.database_path());
    info!("  SQLite target: {}", store.path().display());
    info!("  Graph source:  {}", config.graph_source);

    match config.graph_source.clone() {
        GraphSourceConfig::Neo4j(neo4j) => {
            migrate(config, Neo4jGraph::new(neo4j), store, args.yes).await
        }
        GraphSourceConfig::Snapshot(location) => {
            let source = SnapshotGraph::open(&location).await?;
            migrate(config, source, store, args.yes).await
        }
    }
}

async fn migrate<G: GraphSource>(
    config: MigrationConfig,
    source: G,
    store: SqliteStore,
    skip_prompt: bool,
) -> Result<ExitCode> {
    let orchestrator = MigrationOrchestrator::new(config, source, store);
    let outcome = orchestrator
        .run(|domain| skip_prompt || prompt_confirmation(domain))
        .await?;

    match outcome {
        RunOutcome::Declined => Ok(ExitCode::SUCCESS),
        RunOutcome::Completed(report) => {
            println!("\n{}", report.logger.summary());
            if let Some(path) = &report.audit_path {
                println!("\nMigration log saved to: {}", path.display());
            }

            if report.logger.has_errors() {
                Ok(ExitCode::from(2))
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

fn prompt_confirmation(domain: &str) -> bool {
    println!("\n  All memories will be migrated into the '{}://' domain.", domain);
    print!("\n  Proceed? [y/N] ");
    if io::stdout().flush().is_err() {
        return false;
    }

    let mut answer = String::new();
    match io::stdin().lock().read_line(&mut answer) {
        Ok(_) => answer.trim().eq_ignore_ascii_case("y"),
        Err(_) => false,
    }
}
