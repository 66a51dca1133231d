//! SEC Form 4 Insider Trade Scraper
//!
//! Command-line entry point for ingestion, cluster detection and queries.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use insider_scraper::{
    client::{EdgarClient, FilingSource, MarketDataClient},
    config::Config,
    pipeline::Pipeline,
    storage::{Database, TradeQuery, TradeStore},
    types::TransactionCode,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "insider-scraper")]
#[command(about = "Ingest SEC Form 4 insider trades and flag clustered activity")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (searches default locations when omitted)
    #[arg(short, long)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one full ingestion
    Run,
    /// List recent Form 4 filings
    Filings {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Parse a single filing and print its transactions
    Parse {
        /// Accession number, e.g. 0001234567-24-000001
        accession: String,
        /// CIK used to locate the filing folder
        cik: String,
    },
    /// Re-run cluster detection over stored trades
    Clusters,
    /// Query stored trades
    Trades {
        #[arg(short, long)]
        ticker: Option<String>,
        /// Transaction code letter (P, S, ...)
        #[arg(long)]
        code: Option<String>,
        #[arg(long)]
        clusters_only: bool,
        /// Earliest filing date (YYYY-MM-DD)
        #[arg(long)]
        since: Option<NaiveDate>,
        #[arg(short, long, default_value = "50")]
        limit: u32,
    },
    /// Remove rows with placeholder tickers
    Cleanup,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };

    match cli.command {
        Commands::Run => run(config).await,
        Commands::Filings { limit } => show_filings(config, limit).await,
        Commands::Parse { accession, cik } => parse_one(config, &accession, &cik).await,
        Commands::Clusters => detect(config).await,
        Commands::Trades {
            ticker,
            code,
            clusters_only,
            since,
            limit,
        } => {
            let transaction_type = match code {
                Some(code) => Some(
                    TransactionCode::from_code(&code)
                        .ok_or_else(|| anyhow::anyhow!("invalid transaction code: {code}"))?,
                ),
                None => None,
            };
            let query = TradeQuery {
                ticker,
                transaction_type,
                clusters_only,
                filed_from: since,
                filed_to: None,
                limit: Some(limit),
            };
            show_trades(config, &query).await
        }
        Commands::Cleanup => cleanup(config).await,
    }
}

async fn build_pipeline(config: &Config) -> anyhow::Result<Pipeline> {
    let source = Arc::new(EdgarClient::new(&config.sec)?);
    let market = Arc::new(MarketDataClient::new(&config.market)?);
    let store = Arc::new(Database::connect(&config.database.path).await?);
    Ok(Pipeline::new(source, market, store, config))
}

async fn run(config: Config) -> anyhow::Result<()> {
    let pipeline = build_pipeline(&config).await?;
    let summary = pipeline.run_ingestion().await;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    if !summary.success {
        std::process::exit(1);
    }
    Ok(())
}

async fn show_filings(config: Config, limit: usize) -> anyhow::Result<()> {
    let client = EdgarClient::new(&config.sec)?;
    let filings = client.list_recent_filings(limit).await?;

    println!("\n{} recent Form 4 filings:\n", filings.len());
    println!("{:<22} {:<12} {:<12} {}", "Accession", "Filed", "CIK", "Name");
    println!("{}", "-".repeat(80));
    for filing in filings {
        println!(
            "{:<22} {:<12} {:<12} {}",
            filing.accession_id, filing.filed_at, filing.issuer_cik, filing.issuer_name
        );
    }
    Ok(())
}

async fn parse_one(config: Config, accession: &str, cik: &str) -> anyhow::Result<()> {
    let client = EdgarClient::new(&config.sec)?;
    let parsed = client.parse_filing(accession, cik).await?;

    println!("{}", serde_json::to_string_pretty(&parsed)?);
    Ok(())
}

async fn detect(config: Config) -> anyhow::Result<()> {
    let pipeline = build_pipeline(&config).await?;
    let report = pipeline.detect_clusters().await?;

    println!(
        "Scanned {} trades, {} clusters, {} trades flagged",
        report.trades_scanned,
        report.clusters.len(),
        report.trades_flagged
    );
    for cluster in &report.clusters {
        println!(
            "  {:<6} {} {} .. {}  {} insiders, {} trades",
            cluster.ticker,
            cluster.transaction_type.label(),
            cluster.anchor,
            cluster.end,
            cluster.size,
            cluster.trade_ids.len()
        );
    }
    Ok(())
}

async fn show_trades(config: Config, query: &TradeQuery) -> anyhow::Result<()> {
    let db = Database::connect(&config.database.path).await?;
    let trades = db.query_trades(query).await?;

    println!(
        "{:<11} {:<6} {:<28} {:<14} {:>12} {:>14} {:>4}",
        "Filed", "Ticker", "Insider", "Type", "Qty", "Value", "Clu"
    );
    println!("{}", "-".repeat(95));
    for trade in trades {
        let r = &trade.record;
        let insider: String = r.insider_name.chars().take(27).collect();
        println!(
            "{:<11} {:<6} {:<28} {:<14} {:>12} {:>14} {:>4}",
            r.filing_date,
            r.ticker,
            insider,
            r.transaction_type.label(),
            r.quantity,
            r.transaction_value.round_dp(2),
            if r.is_cluster { r.cluster_size.to_string() } else { "-".to_string() }
        );
    }
    Ok(())
}

async fn cleanup(config: Config) -> anyhow::Result<()> {
    let db = Database::connect(&config.database.path).await?;
    let removed = db.delete_placeholder_tickers().await?;
    tracing::info!("Removed {} trades with placeholder tickers", removed);
    println!("Removed {} trades", removed);
    Ok(())
}
