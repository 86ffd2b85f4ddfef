use anyhow::{Context, Result};
use clap::Parser;
use papertrader::config::SessionConfig;
use papertrader::feed::{MarketFeed, SyntheticFeed};
use papertrader::oracle::{C3poClient, PredictionOracle};
use papertrader::Prediction;
use std::path::PathBuf;

const MODEL_TYPES: &[&str] = &["ensemble", "autoencoder", "vae", "transformer"];
const BAR_WIDTH: usize = 20;

/// Check that the C3PO model service answers and print one prediction per symbol and model
#[derive(Parser, Debug)]
#[command(name = "oracle_probe")]
struct Args {
    #[arg(long, default_value = "config/default.toml")]
    config: PathBuf,

    #[arg(long)]
    oracle_url: Option<String>,

    /// Candles sent per prediction
    #[arg(long, default_value_t = 50)]
    window: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter("papertrader=info")
        .init();

    let args = Args::parse();
    let mut config = SessionConfig::load(Some(&args.config)).context("Failed to load config")?;
    if let Some(url) = args.oracle_url {
        config.oracle.base_url = url;
    }

    let client = C3poClient::new(&config.oracle).context("Failed to build oracle client")?;

    println!("🔍 Probing C3PO at {}", client.base_url());
    if !client.health_check().await {
        anyhow::bail!("Oracle at {} is not healthy", client.base_url());
    }
    println!("✅ Service healthy");

    match client.get_status().await {
        Ok(status) => println!(
            "📋 {} | models loaded: {} | uptime: {:.0}s",
            status.service_name,
            status.models_loaded.join(", "),
            status.uptime_seconds
        ),
        Err(e) => println!("⚠️  Status unavailable: {}", e),
    }

    match client.get_models().await {
        Ok(models) => println!("🧠 Available models: {}", models.join(", ")),
        Err(e) => println!("⚠️  Model list unavailable: {}", e),
    }

    let step = chrono::Duration::minutes(1);
    let feed = SyntheticFeed::new(&config.symbols, args.seed, step);

    println!("\n🔮 Predictions");
    for model in MODEL_TYPES {
        for symbol in &config.symbols {
            let window = feed.window(symbol, args.window);
            match client.predict(&window, symbol, model).await {
                Ok(prediction) => println!("   {}", format_prediction(&prediction)),
                Err(e) => println!("   {}: ❌ {} ({})", symbol, e, model),
            }
        }
    }

    Ok(())
}

fn format_prediction(p: &Prediction) -> String {
    let filled = ((p.confidence * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH);
    let bar = format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled));

    format!(
        "{}: {} | Confidence: {:.1}% [{}] | Model: {}",
        p.symbol,
        p.direction.as_str(),
        p.confidence * 100.0,
        bar,
        p.model_type
    )
}
