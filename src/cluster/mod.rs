//! Cluster detection
//!
//! Finds groups of two or more distinct insiders trading the same ticker with
//! the same transaction code inside a short window:
//! 1. Read trades filed within the lookback horizon
//! 2. Group by (ticker, transaction code)
//! 3. Skip groups with a single distinct insider
//! 4. Bucket each group by filing date against fixed anchors
//! 5. Flag every member of a bucket with two or more distinct insiders
//!
//! Buckets keep their first member's date as anchor. A trade joins the first
//! bucket whose anchor is within the window, even when the bucket's latest
//! member is further away; anchors never move.


use crate::error::{Result, ScraperError};
use crate::storage::TradeStore;
use crate::types::{StoredTrade, TransactionCode};
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Typed grouping key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub ticker: String,
    pub transaction_type: TransactionCode,
}

/// One time bucket over a date-sorted sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeBucket {
    pub anchor: NaiveDate,
    pub end: NaiveDate,
    /// Indices into the input sequence
    pub members: Vec<usize>,
}

/// Greedy fixed-anchor partition of ascending dates.
///
/// Each date joins the first bucket whose anchor lies within `window_days`
/// (inclusive, either direction); otherwise it opens a new bucket.
pub fn window_buckets(dates: &[NaiveDate], window_days: i64) -> Vec<TimeBucket> {
    let mut buckets: Vec<TimeBucket> = Vec::new();

    for (i, &date) in dates.iter().enumerate() {
        let open = buckets
            .iter_mut()
            .find(|b| (date - b.anchor).num_days().abs() <= window_days);
        match open {
            Some(bucket) => {
                bucket.members.push(i);
                if date > bucket.end {
                    bucket.end = date;
                }
            }
            None => buckets.push(TimeBucket {
                anchor: date,
                end: date,
                members: vec![i],
            }),
        }
    }

    buckets
}

/// A detected cluster
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster {
    pub ticker: String,
    pub transaction_type: TransactionCode,
    pub anchor: NaiveDate,
    pub end: NaiveDate,
    /// Distinct insiders in the bucket
    pub size: u32,
    /// Row ids of every member trade
    pub trade_ids: Vec<i64>,
}

/// Pure detection over already-loaded trades
pub fn detect_clusters(trades: &[StoredTrade], window_days: i64) -> Vec<Cluster> {
    let mut groups: HashMap<GroupKey, Vec<&StoredTrade>> = HashMap::new();
    for trade in trades {
        groups
            .entry(GroupKey {
                ticker: trade.record.ticker.clone(),
                transaction_type: trade.record.transaction_type,
            })
            .or_default()
            .push(trade);
    }

    let mut keys: Vec<GroupKey> = groups.keys().cloned().collect();
    keys.sort();

    let mut clusters = Vec::new();
    for key in keys {
        let Some(mut members) = groups.remove(&key) else {
            continue;
        };

        let insiders: HashSet<&str> = members
            .iter()
            .map(|t| t.record.insider_name.as_str())
            .collect();
        if insiders.len() < 2 {
            continue;
        }

        members.sort_by_key(|t| (t.record.filing_date, t.id));
        let dates: Vec<NaiveDate> = members.iter().map(|t| t.record.filing_date).collect();

        for bucket in window_buckets(&dates, window_days) {
            let distinct: HashSet<&str> = bucket
                .members
                .iter()
                .map(|&i| members[i].record.insider_name.as_str())
                .collect();
            if distinct.len() < 2 {
                continue;
            }
            clusters.push(Cluster {
                ticker: key.ticker.clone(),
                transaction_type: key.transaction_type,
                anchor: bucket.anchor,
                end: bucket.end,
                size: u32::try_from(distinct.len()).unwrap_or(u32::MAX),
                trade_ids: bucket.members.iter().map(|&i| members[i].id).collect(),
            });
        }
    }

    clusters
}

/// Outcome of one detection pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClusterReport {
    pub trades_scanned: usize,
    pub clusters: Vec<Cluster>,
    pub trades_flagged: usize,
}

/// Full recompute over the lookback horizon, persisted through the store
pub struct ClusterDetector {
    store: Arc<dyn TradeStore>,
    lookback_days: i64,
    window_days: i64,
}

impl ClusterDetector {
    pub fn new(store: Arc<dyn TradeStore>, lookback_days: i64, window_days: i64) -> Self {
        Self {
            store,
            lookback_days,
            window_days,
        }
    }

    /// Reset every flag in the horizon, then mark current members
    pub async fn run(&self, today: NaiveDate) -> Result<ClusterReport> {
        let since = today - Duration::days(self.lookback_days);
        let trades = self
            .store
            .trades_since(since)
            .await
            .map_err(|e| ScraperError::ClusterDetection(format!("read failed: {e}")))?;

        let clusters = detect_clusters(&trades, self.window_days);

        self.store
            .reset_cluster_flags_since(since)
            .await
            .map_err(|e| ScraperError::ClusterDetection(format!("reset failed: {e}")))?;

        let mut flagged = 0;
        for cluster in &clusters {
            for &id in &cluster.trade_ids {
                self.store
                    .mark_cluster(id, cluster.size)
                    .await
                    .map_err(|e| ScraperError::ClusterDetection(format!("mark {id} failed: {e}")))?;
                flagged += 1;
            }
        }

        tracing::info!(
            "Cluster detection: {} trades scanned, {} clusters, {} trades flagged",
            trades.len(),
            clusters.len(),
            flagged
        );

        Ok(ClusterReport {
            trades_scanned: trades.len(),
            clusters,
            trades_flagged: flagged,
        })
    }
}
