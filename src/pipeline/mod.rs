//! Ingestion orchestrator
//!
//! One run: list filings, parse each, normalize, persist, detect clusters,
//! enrich. Listing and persistence failures end the run; a bad filing, a
//! failed enrichment or a failed cluster pass is logged and skipped.


use crate::client::{FilingSource, MarketData};
use crate::cluster::{ClusterDetector, ClusterReport};
use crate::config::Config;
use crate::error::{Result, ScraperError};
use crate::industry::{IndustryChain, IssuerProfile};
use crate::normalize::normalize_batch;
use crate::storage::TradeStore;
use crate::types::{Enrichment, IngestionSummary, RawTransaction, TradeRecord};
use chrono::{NaiveDate, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

pub struct Pipeline {
    source: Arc<dyn FilingSource>,
    market: Arc<dyn MarketData>,
    store: Arc<dyn TradeStore>,
    industry: IndustryChain,
    detector: ClusterDetector,
    list_limit: usize,
    filing_delay: Duration,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn FilingSource>,
        market: Arc<dyn MarketData>,
        store: Arc<dyn TradeStore>,
        config: &Config,
    ) -> Self {
        let industry = IndustryChain::standard(source.clone());
        let detector = ClusterDetector::new(
            store.clone(),
            config.pipeline.cluster_lookback_days,
            config.pipeline.cluster_window_days,
        );

        Self {
            source,
            market,
            store,
            industry,
            detector,
            list_limit: config
                .pipeline
                .max_filings
                .unwrap_or(config.sec.max_listed_filings),
            filing_delay: Duration::from_millis(config.pipeline.filing_delay_ms),
        }
    }

    /// Replace the classification chain
    pub fn with_industry_chain(mut self, chain: IndustryChain) -> Self {
        self.industry = chain;
        self
    }

    /// Run one full ingestion and summarize it
    pub async fn run_ingestion(&self) -> IngestionSummary {
        tracing::info!("Starting insider trade ingestion");
        match self.ingest(Utc::now().date_naive()).await {
            Ok(count) => {
                tracing::info!("Ingestion complete: {} trades processed", count);
                IngestionSummary::succeeded(count)
            }
            Err(e) => {
                tracing::error!("Ingestion failed: {}", e);
                IngestionSummary::failed(e)
            }
        }
    }

    /// Cluster detection on its own
    pub async fn detect_clusters(&self) -> Result<ClusterReport> {
        self.detector.run(Utc::now().date_naive()).await
    }

    async fn ingest(&self, today: NaiveDate) -> Result<usize> {
        // 1. List
        let filings = self.source.list_recent_filings(self.list_limit).await?;
        tracing::info!("Processing {} filings", filings.len());

        // 2. Parse, one filing at a time
        let mut raw: Vec<RawTransaction> = Vec::new();
        let mut issuers: BTreeMap<String, IssuerProfile> = BTreeMap::new();
        let mut failed = 0usize;

        for (i, filing) in filings.iter().enumerate() {
            if i > 0 && !self.filing_delay.is_zero() {
                tokio::time::sleep(self.filing_delay).await;
            }

            let parsed = match self
                .source
                .parse_filing(&filing.accession_id, &filing.issuer_cik)
                .await
            {
                Ok(parsed) => parsed,
                Err(e) => {
                    failed += 1;
                    tracing::warn!("Skipping filing {}: {}", filing.accession_id, e);
                    continue;
                }
            };

            if let Some(ticker) = &parsed.ticker {
                issuers
                    .entry(ticker.clone())
                    .or_insert_with(|| IssuerProfile {
                        ticker: ticker.clone(),
                        cik: Some(parsed.issuer_cik.clone()).filter(|c| !c.is_empty()),
                        company_name: parsed.issuer_name.clone(),
                    });
            }

            let filed = filing.filed_at.to_string();
            raw.extend(parsed.transactions.into_iter().map(|mut tx| {
                tx.filing_date = filed.clone();
                tx
            }));
        }
        tracing::info!(
            "Parsed {} transaction lines ({} filings skipped)",
            raw.len(),
            failed
        );

        // 3. Filter and dedup
        let records = normalize_batch(&raw);

        // 4. Persist
        let written = self.store.upsert_trades(&records).await.map_err(|e| match e {
            ScraperError::Persistence(_) => e,
            other => ScraperError::Persistence(other.to_string()),
        })?;
        tracing::info!("Persisted {} trades", written);

        // 5. Clusters
        if let Err(e) = self.detector.run(today).await {
            tracing::error!("Cluster detection failed, flags may be stale: {}", e);
        }

        // 6. Enrichment
        self.enrich(&records, &issuers).await;

        Ok(records.len())
    }

    async fn enrich(&self, records: &[TradeRecord], issuers: &BTreeMap<String, IssuerProfile>) {
        let tickers: Vec<String> = records
            .iter()
            .map(|r| r.ticker.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if tickers.is_empty() {
            return;
        }

        let prices = self.market.get_batch(&tickers).await;
        tracing::info!("Fetched prices for {}/{} tickers", prices.len(), tickers.len());

        for ticker in &tickers {
            let profile = issuers.get(ticker).cloned().unwrap_or_else(|| IssuerProfile {
                ticker: ticker.clone(),
                cik: None,
                company_name: records
                    .iter()
                    .find(|r| &r.ticker == ticker)
                    .map(|r| r.company_name.clone())
                    .unwrap_or_default(),
            });

            let price = prices.get(ticker);
            let enrichment = Enrichment {
                industry: self.industry.resolve(&profile).await,
                current_price: price.map(|p| p.current_price),
                price_change_pct: price.map(|p| p.price_change_pct),
            };
            if enrichment.is_empty() {
                continue;
            }

            if let Err(e) = self.store.update_enrichment(ticker, &enrichment).await {
                tracing::warn!("Enrichment for {} not saved: {}", ticker, e);
            }
        }
    }
}
