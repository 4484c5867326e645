use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use resonate_match::config::{self, AppConfig};
use resonate_match::fingerprint::extraction::{Extractor, Fpcalc};
use resonate_match::ingest::ingest_directory;
use resonate_match::logging::init_logging;
use resonate_match::matching::Identifier;
use resonate_match::persistance::database::Database;
use resonate_match::persistance::{Catalog, TrackStore};
use resonate_match::server::{self, AppState};

#[derive(Parser)]
#[command(name = "resonate", version, about = "Identify audio clips by acoustic fingerprint")]
struct Cli {
    /// Overrides DATABASE_URL.
    #[arg(long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP identification API.
    Serve {
        /// Overrides BIND_ADDR.
        #[arg(long)]
        bind: Option<String>,
    },
    /// Fingerprint every audio file in a directory and add it to the catalog.
    Ingest {
        #[arg(default_value = "data/reference")]
        dir: PathBuf,
    },
    /// Identify a single audio file.
    Identify { file: PathBuf },
    /// Print catalog counts.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut cfg: AppConfig = config::load_config()?;
    if let Some(database) = cli.database {
        cfg.database_url = database;
    }
    let _guard = init_logging(&cfg.logging)?;

    tracing::info!(
        service = "resonate",
        version = %env!("CARGO_PKG_VERSION"),
        database = %cfg.database_url,
        "starting"
    );

    let database = Arc::new(Database::connect(&cfg.database_url).await?);
    let extractor = Arc::new(Fpcalc::new(&cfg.fpcalc_path));

    match cli.command {
        Command::Serve { bind } => {
            let catalog: Arc<dyn Catalog> = database;
            let state = AppState {
                identifier: Arc::new(Identifier::new(catalog, cfg.scoring)),
                extractor,
            };
            let bind = bind.unwrap_or(cfg.bind_addr);
            server::serve(&bind, state, &cfg.cors_origins).await?;
        }
        Command::Ingest { dir } => {
            let report = ingest_directory(database.as_ref(), extractor.as_ref(), &dir, &cfg.scoring)
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Identify { file } => {
            let extracted = extractor.extract(&file).await?;
            let identifier = Identifier::new(database, cfg.scoring);

            match identifier.identify(&extracted.fingerprint).await? {
                Some(found) => println!("{}", serde_json::to_string_pretty(&found)?),
                None => println!("no match"),
            }
        }
        Command::Stats => {
            let stats = database.stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}
