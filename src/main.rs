use std::io;
use std::path::Path;

use clap::{Parser, Subcommand};
use tracing::info;

use rx_analyzer::config::Config;
use rx_analyzer::logging;
use rx_analyzer::pipeline;
use rx_analyzer::render::ChartSink;
use rx_analyzer::reports::dispatcher;
use rx_analyzer::storage::SqliteStore;

#[derive(Parser)]
#[command(name = "rx_analyzer")]
#[command(about = "Prescription records cleaning and analytics pipeline")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean a raw prescription export and persist the canonical batch
    Ingest {
        /// Raw CSV to ingest (overrides config)
        #[arg(long)]
        input: Option<String>,
        /// Skip writing the cleaned CSV artifact
        #[arg(long)]
        no_artifact: bool,
    },
    /// Serve the interactive report menu against the persisted data
    Analyze,
    /// Ingest and then serve the report menu
    Run {
        /// Raw CSV to ingest (overrides config)
        #[arg(long)]
        input: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Ingest { input, no_artifact } => {
            ingest(&config, input, no_artifact)?;
        }
        Commands::Analyze => {
            analyze(&config)?;
        }
        Commands::Run { input } => {
            println!("🚀 Running full pipeline (ingest + analyze)...");
            ingest(&config, input, false)?;
            analyze(&config)?;
        }
    }
    Ok(())
}

fn ingest(config: &Config, input: Option<String>, no_artifact: bool) -> anyhow::Result<()> {
    println!("🔄 Running ingest pipeline...");
    let input = input.unwrap_or_else(|| config.ingest.input.clone());
    let artifacts = if no_artifact {
        pipeline::IngestArtifacts::default()
    } else {
        pipeline::IngestArtifacts {
            cleaned: Some(Path::new(config.ingest.cleaned_output.as_str())),
            rejects: Some(Path::new(config.ingest.rejects_output.as_str())),
        }
    };

    let mut store = SqliteStore::open(&config.database.path)?;
    let summary = pipeline::run_ingest(Path::new(&input), artifacts, &mut store)?;

    println!("\n📊 Ingest results (run {}):", summary.run_id);
    println!("   Rows read: {}", summary.rows_read);
    println!("   Duplicates dropped: {}", summary.duplicate_rows);
    println!("   Missing required fields: {}", summary.missing_field_rows);
    println!("   Unparseable dates: {}", summary.bad_date_rows);
    println!("   Rows persisted: {}", summary.rows_persisted);
    if summary.insert_failures > 0 {
        println!("⚠️  Insert failures: {}", summary.insert_failures);
    }
    Ok(())
}

fn analyze(config: &Config) -> anyhow::Result<()> {
    let store = SqliteStore::open(&config.database.path)?;
    info!(rows = store.count()?, "serving reports");

    let mut sink = ChartSink::new(&config.charts.output_dir)?;
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    dispatcher::run_menu(&store, &mut sink, stdin.lock(), &mut stdout)?;
    Ok(())
}
