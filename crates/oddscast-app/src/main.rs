//! oddscast - multi-feed market-probability fusion service.
//!
//! Default command runs the trigger loop: poll feeds, fuse, persist,
//! evaluate alerts. Maintenance subcommands operate on the same data files.

use anyhow::Result;
use clap::{Parser, Subcommand};
use oddscast_app::{AppConfig, Application};
use oddscast_store::{export_csv, SnapshotStore};
use tracing::{info, warn};

/// Multi-feed market-probability fusion service
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via ODDSCAST_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the trigger loop (the default)
    Run,
    /// Rewrite the snapshot log keeping only readable lines
    Repair,
    /// Render the snapshot log as CSV on stdout
    Export,
    /// Print a downsampled chart payload as JSON on stdout
    Chart {
        /// Window selector: 1d, 7d, or all
        #[arg(short, long, default_value = "all")]
        window: String,
        /// Simplification tolerance; 0 keeps every point
        #[arg(short, long, default_value_t = 0.5)]
        tolerance: f64,
    },
    /// Add an alert subscriber
    Subscribe {
        email: String,
        /// Personal swing threshold in percentage points (1-20)
        #[arg(short, long)]
        threshold: Option<f64>,
    },
    /// Remove an alert subscriber, verifying their unsubscribe token
    Unsubscribe { email: String, token: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    oddscast_app::init_logging();

    let args = Args::parse();

    info!("Starting oddscast v{}", env!("CARGO_PKG_VERSION"));

    // Config path: CLI arg > ODDSCAST_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("ODDSCAST_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = AppConfig::load(&config_path)?;

    match args.command.unwrap_or(Command::Run) {
        Command::Run => {
            let app = Application::new(config)?;
            app.run().await?;
        }

        Command::Repair => {
            let store = SnapshotStore::new(&config.data.snapshot_log);
            let report = store.repair()?;
            info!(
                total = report.total,
                kept = report.kept,
                removed = report.removed,
                backup = ?report.backup_path,
                "Repair complete"
            );
        }

        Command::Export => {
            let store = SnapshotStore::new(&config.data.snapshot_log);
            let snapshots = store.read_all()?;
            print!("{}", export_csv(&snapshots));
        }

        Command::Chart { window, tolerance } => {
            let app = Application::new(config)?;
            let payload = app.chart().query(&window, tolerance);
            println!("{}", serde_json::to_string_pretty(payload.as_ref())?);
        }

        Command::Subscribe { email, threshold } => {
            let store = oddscast_alert::SubscriberStore::new(&config.data.subscriber_file);
            let threshold = threshold.unwrap_or(config.alerts.default_threshold);
            let subscriber = store.add(&email, threshold, chrono::Utc::now())?;
            let tokens = oddscast_alert::UnsubTokens::new(config.alerts.unsubscribe_secret);
            info!(
                email = %subscriber.email,
                threshold = subscriber.threshold,
                unsubscribe_token = %tokens.token_for(&subscriber.email),
                "Subscribed"
            );
        }

        Command::Unsubscribe { email, token } => {
            let tokens = oddscast_alert::UnsubTokens::new(config.alerts.unsubscribe_secret);
            if !tokens.verify(&email, &token) {
                warn!(email = %email, "Unsubscribe token does not match");
                anyhow::bail!("invalid unsubscribe token");
            }
            let store = oddscast_alert::SubscriberStore::new(&config.data.subscriber_file);
            if store.remove(&email)? {
                info!(email = %email, "Unsubscribed");
            } else {
                warn!(email = %email, "No such subscriber");
            }
        }
    }

    Ok(())
}
