use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use cdrd::bootstrap::Daemon;
use cdrd::config::Config;
use cdrd::events::read_events_file;
use cdrd::resolver::Resolver;
use cdrd::store::{create_store, CdrStore};
use cdrd::telemetry::{init_tracing, TracingConfig};

#[derive(Parser, Debug)]
#[command(name = "cdrd")]
#[command(author, version, about = "Call state event correlation and CDR resolution")]
struct Args {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve one time window to CDRs and exit
    Resolve {
        /// Window start (RFC 3339, e.g. 2026-01-05T00:00:00Z)
        #[arg(long, value_parser = parse_utc)]
        start: DateTime<Utc>,

        /// Window end; defaults to start plus one day
        #[arg(long, value_parser = parse_utc)]
        end: Option<DateTime<Utc>>,

        /// Recompute CDRs from scratch (reserved, not implemented)
        #[arg(long)]
        redo: bool,
    },

    /// Resolve the trailing window periodically until interrupted
    Run,

    /// Import call state events from a JSON-lines file
    Import {
        /// Event file, one JSON object per line
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
    },

    /// Validate config and exit
    Validate,
}

fn parse_utc(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid RFC 3339 timestamp: {e}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration first (to get log settings)
    let config = Config::load(&args.config)?;

    init_tracing(&TracingConfig::from(&config.telemetry))?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        "starting cdrd"
    );

    if let Command::Validate = args.command {
        info!("configuration is valid");
        return Ok(());
    }

    let store = create_store(&config.store)?;

    match args.command {
        Command::Resolve { start, end, redo } => {
            let resolver = Resolver::new(store);
            let stats = resolver.resolve(start, end, redo)?;
            info!(
                written = stats.written,
                failed = stats.failed,
                "resolution complete"
            );
        }
        Command::Run => {
            let resolver = Resolver::new(store);
            let daemon = Daemon::new(resolver, config.resolver.interval, config.resolver.window);
            daemon.run().await?;
        }
        Command::Import { file } => {
            let events = read_events_file(&file)?;
            let count = store.insert_events(&events)?;
            info!(file = %file.display(), count, "events imported");
        }
        Command::Validate => unreachable!(),
    }

    Ok(())
}
