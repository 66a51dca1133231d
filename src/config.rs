//! Configuration management

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sec: SecConfig,
    pub market: MarketConfig,
    pub database: DatabaseConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecConfig {
    /// Contact-identifying User-Agent required by EDGAR fair-use policy
    pub user_agent: String,
    /// Archive and browse host
    pub base_url: String,
    /// Submissions JSON host
    pub data_url: String,
    /// Minimum gap between any two requests to EDGAR (100ms = 10 req/s)
    pub min_request_interval_ms: u64,
    /// Entries per listing page (EDGAR caps this at 100)
    pub page_size: usize,
    /// Filings requested from the listing per run
    pub max_listed_filings: usize,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Chart endpoint; the ticker is appended as a path segment
    pub chart_url: String,
    /// Trailing window for the percent change
    pub lookback_days: i64,
    /// Delay between sequential batch requests
    pub request_delay_ms: u64,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Cap on filings parsed per run (None = all listed)
    pub max_filings: Option<usize>,
    /// Pause between filings, on top of the request gate
    pub filing_delay_ms: u64,
    /// Cluster detection reads filings this many days back
    pub cluster_lookback_days: i64,
    /// Width of a cluster time bucket, measured from its anchor
    pub cluster_window_days: i64,
}

impl Default for SecConfig {
    fn default() -> Self {
        Self {
            user_agent: "InsiderScraper contact@example.com".to_string(),
            base_url: "https://www.sec.gov".to_string(),
            data_url: "https://data.sec.gov".to_string(),
            min_request_interval_ms: 100,
            page_size: 100,
            max_listed_filings: 100,
            timeout_secs: 30,
        }
    }
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            chart_url: "https://query1.finance.yahoo.com/v8/finance/chart".to_string(),
            lookback_days: 7,
            request_delay_ms: 200,
            timeout_secs: 10,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "insider_trades.db".to_string(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_filings: None,
            filing_delay_ms: 300,
            cluster_lookback_days: 30,
            cluster_window_days: 7,
        }
    }
}

impl SecConfig {
    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }
}

impl Config {
    /// Load configuration from an optional file plus environment
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix("INSIDER")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_override_option("sec.user_agent", std::env::var("SEC_USER_AGENT").ok())?
            .set_override_option(
                "pipeline.max_filings",
                std::env::var("MAX_FILINGS")
                    .ok()
                    .and_then(|v| v.trim().parse::<u64>().ok()),
            )?
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from default locations
    pub fn load_default() -> anyhow::Result<Self> {
        let paths = [
            "config.toml",
            "insider-scraper.toml",
            "~/.config/insider-scraper/config.toml",
        ];

        for path in paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::load(expanded.as_ref());
            }
        }

        // Nothing on disk: defaults plus environment
        Self::load("config.toml")
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.sec.user_agent.trim().is_empty() {
            anyhow::bail!("sec.user_agent must identify a contact");
        }
        if self.sec.page_size == 0 {
            anyhow::bail!("sec.page_size must be positive");
        }
        if self.pipeline.cluster_window_days < 0 || self.pipeline.cluster_lookback_days < 0 {
            anyhow::bail!("cluster windows must not be negative");
        }
        Ok(())
    }
}
