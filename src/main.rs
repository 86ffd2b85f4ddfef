use anyhow::{Context, Result};
use clap::Parser;
use papertrader::config::SessionConfig;
use papertrader::feed::SyntheticFeed;
use papertrader::oracle::C3poClient;
use papertrader::session::{SessionController, StatusSnapshot};
use std::path::PathBuf;
use tokio::sync::{mpsc, watch};

/// Paper-trading session driven by the C3PO prediction oracle
#[derive(Parser, Debug)]
#[command(name = "papertrader")]
#[command(about = "Run a simulated trading session against a prediction oracle")]
struct Args {
    /// TOML config file (missing file is fine)
    #[arg(long, default_value = "config/default.toml")]
    config: PathBuf,

    /// Session length in seconds
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Seconds between ticks
    #[arg(long)]
    tick_secs: Option<u64>,

    /// Oracle base URL
    #[arg(long)]
    oracle_url: Option<String>,

    /// Comma-separated symbols, e.g. BTCUSDT,ETHUSDT
    #[arg(long, value_delimiter = ',')]
    symbols: Option<Vec<String>>,

    #[arg(long)]
    initial_cash: Option<f64>,

    /// Seed for the synthetic market feed
    #[arg(long)]
    seed: Option<u64>,

    /// Print the final summary as JSON on stdout
    #[arg(long)]
    json: bool,
}

impl Args {
    fn apply(&self, config: &mut SessionConfig) {
        if let Some(secs) = self.duration_secs {
            config.session_duration_secs = secs;
        }
        if let Some(secs) = self.tick_secs {
            config.tick_interval_secs = secs;
        }
        if let Some(url) = &self.oracle_url {
            config.oracle.base_url = url.clone();
        }
        if let Some(symbols) = &self.symbols {
            config.symbols = symbols.clone();
        }
        if let Some(cash) = self.initial_cash {
            config.initial_cash = cash;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let args = Args::parse();

    let mut config =
        SessionConfig::load(Some(&args.config)).context("Failed to load session config")?;
    args.apply(&mut config);
    config.normalize();
    config.validate().context("Invalid session config")?;

    tracing::info!("🤖 Paper trading with C3PO oracle at {}", config.oracle.base_url);
    tracing::info!(
        "   Symbols: {} | Cash: ${:.2} | Threshold: {:.0}% | Duration: {}s",
        config.symbols.join(", "),
        config.initial_cash,
        config.confidence_threshold * 100.0,
        config.session_duration_secs
    );

    let oracle = C3poClient::new(&config.oracle).context("Failed to build oracle client")?;

    let seed = config.seed.unwrap_or_else(rand::random);
    let step = config.tick_step();
    let feed = SyntheticFeed::new(&config.symbols, seed, step);
    tracing::info!("📈 Synthetic market feed seeded with {}", seed);

    let (snap_tx, snap_rx) = mpsc::channel(64);
    let snapshot_task = tokio::spawn(drain_snapshots(snap_rx));

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("🛑 Ctrl+C received, stopping after the current tick");
            stop_tx.send(true).ok();
        }
    });

    let mut session = SessionController::new(config, oracle, feed).with_snapshots(snap_tx);
    let summary = session.run(stop_rx).await.context("Session failed")?;

    drop(session);
    snapshot_task.await.ok();

    if args.json {
        let json = serde_json::to_string_pretty(&summary).context("Failed to encode summary")?;
        println!("{}", json);
    }

    Ok(())
}

/// Keep the snapshot channel moving; the status block is already logged per tick
async fn drain_snapshots(mut rx: mpsc::Receiver<StatusSnapshot>) {
    while let Some(snapshot) = rx.recv().await {
        tracing::debug!(
            tick = snapshot.tick,
            total_value = snapshot.total_value,
            exposure_pct = snapshot.exposure_pct,
            "Snapshot"
        );
    }
}

fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("papertrader=info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
