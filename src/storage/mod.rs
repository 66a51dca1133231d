//! Trade persistence
//!
//! SQLite store for insider trades. Rows are keyed by the natural key
//! (filing date, trade date, ticker, insider, transaction type, value) so a
//! re-ingested filing updates in place. Decimals are stored as normalized
//! text.

#[cfg(test)]
mod tests;

use crate::error::{Result, ScraperError};
use crate::normalize::PLACEHOLDER_TICKERS;
use crate::types::{Enrichment, StoredTrade, TradeRecord, TransactionCode};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::sqlite::{Sqlite, SqlitePool, SqlitePoolOptions};
use sqlx::QueryBuilder;
use std::path::Path;
use std::str::FromStr;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Read-side filter over persisted trades
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeQuery {
    pub ticker: Option<String>,
    pub transaction_type: Option<TransactionCode>,
    pub clusters_only: bool,
    pub filed_from: Option<NaiveDate>,
    pub filed_to: Option<NaiveDate>,
    pub limit: Option<u32>,
}

/// Persistence gateway used by the pipeline and the cluster detector
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TradeStore: Send + Sync {
    /// Insert or update by natural key, all or nothing. Returns rows written.
    async fn upsert_trades(&self, trades: &[TradeRecord]) -> Result<usize>;

    /// Trades filed on or after `since`, oldest filing first
    async fn trades_since(&self, since: NaiveDate) -> Result<Vec<StoredTrade>>;

    /// Clear cluster flags for trades filed on or after `since`
    async fn reset_cluster_flags_since(&self, since: NaiveDate) -> Result<u64>;

    /// Flag one trade as a cluster member
    async fn mark_cluster(&self, id: i64, cluster_size: u32) -> Result<()>;

    /// Write non-empty enrichment fields to every trade of a ticker
    async fn update_enrichment(&self, ticker: &str, enrichment: &Enrichment) -> Result<u64>;

    async fn query_trades(&self, query: &TradeQuery) -> Result<Vec<StoredTrade>>;

    /// Maintenance: remove rows whose ticker is a placeholder
    async fn delete_placeholder_tickers(&self) -> Result<u64>;
}

/// SQLite-backed trade store
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to SQLite database (creates if not exists)
    pub async fn connect<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db_url = format!("sqlite:{}?mode=rwc", path.as_ref().display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Private in-memory database. One connection that never expires, so
    /// the data lives as long as the pool.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS insider_trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                filing_date TEXT NOT NULL,
                trade_date TEXT NOT NULL,
                ticker TEXT NOT NULL,
                company_name TEXT NOT NULL,
                industry TEXT,
                insider_name TEXT NOT NULL,
                insider_title TEXT NOT NULL,
                transaction_type TEXT NOT NULL,
                price TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                shares_owned_after INTEGER NOT NULL,
                ownership_delta_pct REAL NOT NULL,
                transaction_value TEXT NOT NULL,
                current_price TEXT,
                price_change_pct REAL,
                is_cluster INTEGER NOT NULL DEFAULT 0,
                cluster_size INTEGER NOT NULL DEFAULT 1,
                source_url TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(filing_date, trade_date, ticker, insider_name, transaction_type, transaction_value)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_trades_filing_date
            ON insider_trades(filing_date)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_trades_ticker_type
            ON insider_trades(ticker, transaction_type, filing_date)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Total stored trades
    pub async fn count_trades(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM insider_trades")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    pub async fn get_trade(&self, id: i64) -> Result<Option<StoredTrade>> {
        let row = sqlx::query_as::<_, TradeRow>(&format!("{SELECT_TRADE} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(StoredTrade::try_from).transpose()
    }
}

const SELECT_TRADE: &str = r#"
    SELECT id, filing_date, trade_date, ticker, company_name, industry,
           insider_name, insider_title, transaction_type, price, quantity,
           shares_owned_after, ownership_delta_pct, transaction_value,
           current_price, price_change_pct, is_cluster, cluster_size, source_url
    FROM insider_trades
"#;

fn decimal_text(value: Decimal) -> String {
    value.normalize().to_string()
}

fn date_text(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

#[async_trait]
impl TradeStore for Database {
    async fn upsert_trades(&self, trades: &[TradeRecord]) -> Result<usize> {
        if trades.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        for trade in trades {
            sqlx::query(
                r#"
                INSERT INTO insider_trades
                (filing_date, trade_date, ticker, company_name, industry, insider_name,
                 insider_title, transaction_type, price, quantity, shares_owned_after,
                 ownership_delta_pct, transaction_value, current_price, price_change_pct,
                 is_cluster, cluster_size, source_url)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(filing_date, trade_date, ticker, insider_name, transaction_type, transaction_value)
                DO UPDATE SET
                    company_name = excluded.company_name,
                    insider_title = excluded.insider_title,
                    price = excluded.price,
                    quantity = excluded.quantity,
                    shares_owned_after = excluded.shares_owned_after,
                    ownership_delta_pct = excluded.ownership_delta_pct,
                    source_url = excluded.source_url,
                    updated_at = datetime('now')
                "#,
            )
            .bind(date_text(trade.filing_date))
            .bind(date_text(trade.trade_date))
            .bind(&trade.ticker)
            .bind(&trade.company_name)
            .bind(&trade.industry)
            .bind(&trade.insider_name)
            .bind(&trade.insider_title)
            .bind(trade.transaction_type.to_string())
            .bind(decimal_text(trade.price))
            .bind(trade.quantity)
            .bind(trade.shares_owned_after)
            .bind(trade.ownership_delta_pct)
            .bind(decimal_text(trade.transaction_value))
            .bind(trade.current_price.map(decimal_text))
            .bind(trade.price_change_pct)
            .bind(trade.is_cluster)
            .bind(i64::from(trade.cluster_size))
            .bind(&trade.source_url)
            .execute(&mut *tx)
            .await
            .map_err(|e| ScraperError::Persistence(format!("{} {}: {}", trade.ticker, trade.insider_name, e)))?;
        }
        tx.commit().await?;

        Ok(trades.len())
    }

    async fn trades_since(&self, since: NaiveDate) -> Result<Vec<StoredTrade>> {
        let rows = sqlx::query_as::<_, TradeRow>(&format!(
            "{SELECT_TRADE} WHERE filing_date >= ? ORDER BY filing_date ASC, id ASC"
        ))
        .bind(date_text(since))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(StoredTrade::try_from).collect()
    }

    async fn reset_cluster_flags_since(&self, since: NaiveDate) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE insider_trades
            SET is_cluster = 0, cluster_size = 1
            WHERE filing_date >= ? AND (is_cluster != 0 OR cluster_size != 1)
            "#,
        )
        .bind(date_text(since))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn mark_cluster(&self, id: i64, cluster_size: u32) -> Result<()> {
        sqlx::query("UPDATE insider_trades SET is_cluster = 1, cluster_size = ? WHERE id = ?")
            .bind(i64::from(cluster_size))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_enrichment(&self, ticker: &str, enrichment: &Enrichment) -> Result<u64> {
        if enrichment.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            UPDATE insider_trades
            SET industry = COALESCE(?, industry),
                current_price = COALESCE(?, current_price),
                price_change_pct = COALESCE(?, price_change_pct),
                updated_at = datetime('now')
            WHERE ticker = ?
            "#,
        )
        .bind(&enrichment.industry)
        .bind(enrichment.current_price.map(decimal_text))
        .bind(enrichment.price_change_pct)
        .bind(ticker)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn query_trades(&self, query: &TradeQuery) -> Result<Vec<StoredTrade>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_TRADE);
        qb.push(" WHERE 1 = 1");

        if let Some(ticker) = &query.ticker {
            qb.push(" AND ticker = ").push_bind(ticker.trim().to_ascii_uppercase());
        }
        if let Some(code) = query.transaction_type {
            qb.push(" AND transaction_type = ").push_bind(code.to_string());
        }
        if query.clusters_only {
            qb.push(" AND is_cluster = 1");
        }
        if let Some(from) = query.filed_from {
            qb.push(" AND filing_date >= ").push_bind(date_text(from));
        }
        if let Some(to) = query.filed_to {
            qb.push(" AND filing_date <= ").push_bind(date_text(to));
        }
        qb.push(" ORDER BY filing_date DESC, id DESC");
        if let Some(limit) = query.limit {
            qb.push(" LIMIT ").push_bind(i64::from(limit));
        }

        let rows = qb
            .build_query_as::<TradeRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(StoredTrade::try_from).collect()
    }

    async fn delete_placeholder_tickers(&self) -> Result<u64> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("DELETE FROM insider_trades WHERE UPPER(TRIM(ticker)) IN (");
        let mut values = qb.separated(", ");
        for placeholder in PLACEHOLDER_TICKERS {
            values.push_bind(placeholder);
        }
        qb.push(")");

        let result = qb.build().execute(&self.pool).await?;
        let removed = result.rows_affected();
        if removed > 0 {
            tracing::info!("Removed {} trades with placeholder tickers", removed);
        }
        Ok(removed)
    }
}

// Row types for database queries

#[derive(Debug, sqlx::FromRow)]
struct TradeRow {
    id: i64,
    filing_date: String,
    trade_date: String,
    ticker: String,
    company_name: String,
    industry: Option<String>,
    insider_name: String,
    insider_title: String,
    transaction_type: String,
    price: String,
    quantity: i64,
    shares_owned_after: i64,
    ownership_delta_pct: f64,
    transaction_value: String,
    current_price: Option<String>,
    price_change_pct: Option<f64>,
    is_cluster: bool,
    cluster_size: i64,
    source_url: String,
}

fn corrupt(id: i64, field: &str, value: &str) -> ScraperError {
    ScraperError::Internal(format!("trade {id}: bad {field} {value:?}"))
}

impl TryFrom<TradeRow> for StoredTrade {
    type Error = ScraperError;

    fn try_from(row: TradeRow) -> std::result::Result<Self, Self::Error> {
        let id = row.id;
        let date = |field: &str, value: &str| {
            NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| corrupt(id, field, value))
        };
        let decimal = |field: &str, value: &str| {
            Decimal::from_str(value).map_err(|_| corrupt(id, field, value))
        };

        let current_price = row
            .current_price
            .as_deref()
            .map(|v| decimal("current_price", v))
            .transpose()?;

        Ok(StoredTrade {
            id,
            record: TradeRecord {
                filing_date: date("filing_date", &row.filing_date)?,
                trade_date: date("trade_date", &row.trade_date)?,
                transaction_type: TransactionCode::from_code(&row.transaction_type)
                    .ok_or_else(|| corrupt(id, "transaction_type", &row.transaction_type))?,
                price: decimal("price", &row.price)?,
                transaction_value: decimal("transaction_value", &row.transaction_value)?,
                current_price,
                cluster_size: u32::try_from(row.cluster_size.max(1)).unwrap_or(u32::MAX),
                ticker: row.ticker,
                company_name: row.company_name,
                industry: row.industry,
                insider_name: row.insider_name,
                insider_title: row.insider_title,
                quantity: row.quantity,
                shares_owned_after: row.shares_owned_after,
                ownership_delta_pct: row.ownership_delta_pct,
                price_change_pct: row.price_change_pct,
                is_cluster: row.is_cluster,
                source_url: row.source_url,
            },
        })
    }
}
