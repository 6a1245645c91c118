//! Citegraph CLI — legacy import and relation maintenance.
//!
//! Usage:
//!   citegraph populate --file dump.txt [--config path]
//!   citegraph migrate [--all | --recids 666,667]
//!   citegraph process-references <uuid>...
//!   citegraph update-relations <uuid>...
//!   citegraph index <uuid>...
//!   citegraph mirror-status

use citegraph::{
    Config, ControlNumber, InMemoryIndex, LegacyTransformer, LocalQueue, Migrator, MirrorSelector,
    OpenStore, Orchestrator, Pipeline, RecordId, RecordStore, SqliteStore, Stage,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "citegraph",
    version,
    about = "Bibliographic record migration and relation-graph maintenance"
)]
struct Cli {
    /// Path to a YAML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a legacy dump file into the mirror store
    Populate {
        /// Path to the dump (records separated by blank lines)
        #[arg(long)]
        file: PathBuf,
    },
    /// Migrate mirror rows into normalized records and process relations
    Migrate {
        /// Re-migrate every mirror row, including already-migrated ones
        #[arg(long, conflicts_with = "recids")]
        all: bool,
        /// Migrate only these recids
        #[arg(long, value_delimiter = ',')]
        recids: Vec<u64>,
    },
    /// Reconcile relations, recompute aggregates, and reindex
    ProcessReferences {
        #[arg(required = true)]
        uuids: Vec<String>,
    },
    /// Reconcile relations and aggregates without reindexing
    UpdateRelations {
        #[arg(required = true)]
        uuids: Vec<String>,
    },
    /// Reindex records (deleted records come off the index)
    Index {
        #[arg(required = true)]
        uuids: Vec<String>,
    },
    /// Show mirror store counters
    MirrorStatus,
}

struct Stack {
    store: Arc<SqliteStore>,
    orchestrator: Arc<Orchestrator>,
    migrator: Migrator,
}

fn build_stack(config: &Config) -> Result<Stack, String> {
    let store = Arc::new(
        SqliteStore::open(&config.database)
            .map_err(|e| format!("failed to open database: {e}"))?,
    );
    let engine = Arc::new(InMemoryIndex::new());
    let pipeline = Arc::new(
        Pipeline::new(store.clone(), engine).with_index_retry(config.index.retry_policy()),
    );
    let queue = LocalQueue::start(pipeline, config.pipeline.workers);
    let orchestrator = Arc::new(
        Orchestrator::new(queue).with_floor_chunk_size(config.pipeline.floor_chunk_size),
    );
    let migrator = Migrator::new(store.clone(), Arc::new(LegacyTransformer::new()));

    Ok(Stack {
        store,
        orchestrator,
        migrator,
    })
}

fn parse_uuids(raw: &[String]) -> Result<Vec<RecordId>, String> {
    raw.iter()
        .map(|s| RecordId::parse(s).map_err(|e| format!("invalid uuid {s:?}: {e}")))
        .collect()
}

fn cmd_populate(stack: &Stack, file: &PathBuf) -> i32 {
    match stack.migrator.populate_mirror_from_file(file) {
        Ok(summary) => {
            println!(
                "Populated mirror: {} inserted, {} rejected",
                summary.inserted, summary.rejected
            );
            0
        }
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    }
}

async fn cmd_migrate(stack: &Stack, all: bool, recids: &[u64]) -> i32 {
    let selector = if !recids.is_empty() {
        MirrorSelector::Recids(recids.iter().map(|r| ControlNumber::new(*r)).collect())
    } else if all {
        MirrorSelector::All
    } else {
        MirrorSelector::Pending
    };

    let summary = match stack.migrator.migrate(selector).await {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("Error: {e}");
            return 1;
        }
    };

    println!(
        "Migrated {} records, skipped {} invalid",
        summary.migrated.len(),
        summary.skipped.len()
    );
    for (recid, reason) in &summary.skipped {
        eprintln!("  skipped {recid}: {reason}");
    }

    // The CLI is a synchronous operator tool, so wait for the relation
    // stage instead of exiting with work still queued.
    if !summary.migrated.is_empty() {
        if let Err(e) = stack
            .orchestrator
            .dispatch_and_wait(Stage::ProcessReferences, summary.migrated)
            .await
        {
            eprintln!("Error: relation processing failed: {e}");
            return 1;
        }
        println!("Relations processed");
    }
    0
}

async fn cmd_stage(stack: &Stack, stage: Stage, uuids: &[String]) -> i32 {
    let uuids = match parse_uuids(uuids) {
        Ok(uuids) => uuids,
        Err(e) => {
            eprintln!("Error: {e}");
            return 1;
        }
    };

    match stack.orchestrator.dispatch_and_wait(stage, uuids).await {
        Ok(processed) => {
            println!("Processed {} records", processed.len());
            0
        }
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    }
}

fn cmd_mirror_status(stack: &Stack) -> i32 {
    match stack.store.mirror_stats() {
        Ok(stats) => {
            println!("{:<10} {:>8}", "STATE", "COUNT");
            println!("{}", "-".repeat(19));
            println!("{:<10} {:>8}", "total", stats.total);
            println!("{:<10} {:>8}", "migrated", stats.migrated);
            println!("{:<10} {:>8}", "invalid", stats.invalid);
            0
        }
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };

    let stack = match build_stack(&config) {
        Ok(stack) => stack,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Populate { file } => cmd_populate(&stack, &file),
        Commands::Migrate { all, recids } => cmd_migrate(&stack, all, &recids).await,
        Commands::ProcessReferences { uuids } => {
            cmd_stage(&stack, Stage::ProcessReferences, &uuids).await
        }
        Commands::UpdateRelations { uuids } => {
            cmd_stage(&stack, Stage::UpdateRelations, &uuids).await
        }
        Commands::Index { uuids } => cmd_stage(&stack, Stage::IndexRecords, &uuids).await,
        Commands::MirrorStatus => cmd_mirror_status(&stack),
    };
    std::process::exit(code);
}
