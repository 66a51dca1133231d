//! Market data client
//!
//! Current price and trailing percent change from the Yahoo chart endpoint.
//! Every failure degrades to `None`; prices are enrichment, never required.

use super::MarketData;
use crate::config::MarketConfig;
use crate::error::{Result, ScraperError};
use crate::types::PriceData;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Url};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Option<ChartNode>,
}

#[derive(Debug, Deserialize)]
struct ChartNode {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteBlock>,
}

#[derive(Debug, Deserialize)]
struct QuoteBlock {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

/// Yahoo chart client
pub struct MarketDataClient {
    http: Client,
    chart_url: String,
    lookback_days: i64,
    request_delay: Duration,
}

impl MarketDataClient {
    pub fn new(config: &MarketConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            chart_url: config.chart_url.trim_end_matches('/').to_string(),
            lookback_days: config.lookback_days,
            request_delay: Duration::from_millis(config.request_delay_ms),
        })
    }

    async fn fetch_closes(&self, ticker: &str) -> Result<Vec<Option<f64>>> {
        let now = Utc::now().timestamp();
        let start = now - self.lookback_days * 86_400;
        let url = chart_endpoint(&self.chart_url, ticker)?;

        let resp = self
            .http
            .get(url.clone())
            .query(&[
                ("period1", start.to_string()),
                ("period2", now.to_string()),
                ("interval", "1d".to_string()),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ScraperError::HttpStatus {
                status: resp.status().as_u16(),
                url: url.to_string(),
            });
        }

        let envelope: ChartEnvelope = resp.json().await?;
        Ok(envelope
            .chart
            .and_then(|c| c.result)
            .and_then(|r| r.into_iter().next())
            .and_then(|r| r.indicators.quote.into_iter().next())
            .map(|q| q.close)
            .unwrap_or_default())
    }
}

#[async_trait]
impl MarketData for MarketDataClient {
    async fn get_price(&self, ticker: &str) -> Option<PriceData> {
        match self.fetch_closes(ticker).await {
            Ok(closes) => summarize_closes(ticker, &closes),
            Err(e) => {
                tracing::debug!("Price lookup for {} failed: {}", ticker, e);
                None
            }
        }
    }

    async fn get_batch(&self, tickers: &[String]) -> HashMap<String, PriceData> {
        let mut prices = HashMap::new();
        for (i, ticker) in tickers.iter().enumerate() {
            if i > 0 && !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }
            if let Some(price) = self.get_price(ticker).await {
                prices.insert(ticker.clone(), price);
            }
        }
        prices
    }
}

/// Chart URL for one ticker, with the ticker as a single encoded path segment
pub(crate) fn chart_endpoint(chart_url: &str, ticker: &str) -> Result<Url> {
    let mut url = Url::parse(chart_url)
        .map_err(|e| ScraperError::Config(format!("invalid chart url {chart_url:?}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| ScraperError::Config(format!("chart url {chart_url:?} cannot take a path")))?
        .pop_if_empty()
        .push(ticker);
    Ok(url)
}

/// Last non-null close and its change from the first non-null close.
/// A single close gives a change of zero.
pub(crate) fn summarize_closes(ticker: &str, closes: &[Option<f64>]) -> Option<PriceData> {
    let valid: Vec<f64> = closes
        .iter()
        .flatten()
        .copied()
        .filter(|c| c.is_finite())
        .collect();
    let last = *valid.last()?;
    let first = valid[0];

    let price_change_pct = if valid.len() >= 2 && first != 0.0 {
        (last - first) / first * 100.0
    } else {
        0.0
    };

    Some(PriceData {
        ticker: ticker.to_string(),
        current_price: Decimal::try_from(last).ok()?.round_dp(4),
        price_change_pct,
    })
}
