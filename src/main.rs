use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use georesolver::app::build_pipeline;
use georesolver::config::AppConfig;
use georesolver::domain::AddressQuery;
use georesolver::ingest::{self, Dataset};
use georesolver::observability::{logging, metrics};
use georesolver::server;

#[derive(Parser)]
#[command(name = "georesolver")]
#[command(about = "Address normalization and multi-source geocoding resolver")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config/georesolver.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP resolution service
    Serve,
    /// Resolve a single address and print the result
    Resolve {
        #[arg(long)]
        street: String,
        #[arg(long, default_value = "")]
        number: String,
        #[arg(long)]
        comuna: String,
        #[arg(long)]
        region: String,
        #[arg(long, default_value = "")]
        provincia: String,
        /// Print the full trace instead of coordinates alone
        #[arg(long)]
        full: bool,
    },
    /// Import a reference dataset CSV into its SQLite file
    LoadData {
        #[arg(long, value_enum)]
        dataset: Dataset,
        #[arg(long)]
        csv: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    dotenv::dotenv().ok();

    let config = AppConfig::load(&cli.config)?;
    logging::init_logging(&config.server.log_dir);

    match cli.command {
        Commands::Serve => {
            if let Some(port) = config.server.metrics_port {
                let addr = format!("{}:{}", config.server.host, port).parse()?;
                metrics::init_metrics(addr);
            }
            let pipeline = Arc::new(build_pipeline(&config)?);
            server::serve(&config.server, pipeline).await?;
        }
        Commands::Resolve { street, number, comuna, region, provincia, full } => {
            let pipeline = build_pipeline(&config)?;
            let query = AddressQuery::new(&street, &number, &comuna, &region, &provincia);

            let missing = query.missing_fields();
            if !missing.is_empty() {
                println!("missing required fields: {}", missing.join(", "));
                return Ok(());
            }

            let outcome = pipeline.resolve(query).await;
            if full {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("{}", serde_json::to_string_pretty(&outcome.coords)?);
            }
        }
        Commands::LoadData { dataset, csv } => {
            let imported = ingest::load(&config, dataset, &csv)?;
            info!(rows = imported, "import finished");
            println!("imported {} rows", imported);
        }
    }

    Ok(())
}
