//! Trade normalization and in-batch deduplication
//!
//! Maps parsed transaction lines into persisted trade shape. Lines without a
//! usable ticker or a positive value are dropped; every transaction code is
//! kept.

use crate::types::{NaturalKey, RawTransaction, TradeRecord};
use chrono::{NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Ticker values filers use for "not applicable"
pub const PLACEHOLDER_TICKERS: [&str; 5] = ["NONE", "N/A", "NA", "NULL", ""];

pub fn is_placeholder_ticker(ticker: &str) -> bool {
    let upper = ticker.trim().to_ascii_uppercase();
    PLACEHOLDER_TICKERS.contains(&upper.as_str())
}

/// Trimmed, upper-cased ticker, or `None` for placeholders
pub fn clean_ticker(ticker: &str) -> Option<String> {
    if is_placeholder_ticker(ticker) {
        None
    } else {
        Some(ticker.trim().to_ascii_uppercase())
    }
}

/// Calendar date from a date or timestamp string. Only the leading
/// `YYYY-MM-DD` is read, so time and zone suffixes in any layout are ignored;
/// unparseable input becomes today.
pub fn normalize_date(value: &str) -> NaiveDate {
    NaiveDate::parse_and_remainder(value.trim(), "%Y-%m-%d")
        .map(|(date, _)| date)
        .unwrap_or_else(|_| Utc::now().date_naive())
}

fn whole_shares(value: Option<Decimal>) -> i64 {
    value
        .map(|v| v.abs().round())
        .and_then(|v| v.to_i64())
        .unwrap_or(0)
}

/// Map one parsed line into a trade record
pub fn to_trade_record(raw: &RawTransaction) -> Option<TradeRecord> {
    let ticker = raw.ticker.as_deref().and_then(clean_ticker)?;
    let transaction_value = raw.transaction_value().filter(|v| *v > Decimal::ZERO)?;
    let price = raw.price?;

    let filing_date = normalize_date(&raw.filing_date);
    let trade_date = if raw.trade_date.trim().is_empty() {
        filing_date
    } else {
        normalize_date(&raw.trade_date)
    };

    Some(TradeRecord {
        filing_date,
        trade_date,
        ticker,
        company_name: raw.issuer_name.clone(),
        industry: None,
        insider_name: raw.insider_name.trim().to_string(),
        insider_title: raw.insider_title.clone(),
        transaction_type: raw.code,
        price,
        quantity: whole_shares(raw.shares),
        shares_owned_after: whole_shares(raw.shares_owned_after),
        ownership_delta_pct: raw.ownership_delta_pct(),
        transaction_value,
        current_price: None,
        price_change_pct: None,
        is_cluster: false,
        cluster_size: 1,
        source_url: raw.document_url.clone(),
    })
}

/// Collapse records sharing a natural key. The last one seen wins and takes
/// the position of the first.
pub fn dedup_batch(records: Vec<TradeRecord>) -> Vec<TradeRecord> {
    let mut positions: HashMap<NaturalKey, usize> = HashMap::with_capacity(records.len());
    let mut out: Vec<TradeRecord> = Vec::with_capacity(records.len());

    for record in records {
        match positions.get(&record.natural_key()) {
            Some(&i) => out[i] = record,
            None => {
                positions.insert(record.natural_key(), out.len());
                out.push(record);
            }
        }
    }
    out
}

/// Filter, map and deduplicate a run's transaction lines
pub fn normalize_batch(raw: &[RawTransaction]) -> Vec<TradeRecord> {
    let mapped: Vec<TradeRecord> = raw.iter().filter_map(to_trade_record).collect();
    let dropped = raw.len() - mapped.len();
    if dropped > 0 {
        tracing::debug!("Dropped {} lines without ticker or positive value", dropped);
    }
    dedup_batch(mapped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransactionCode;
    use rust_decimal_macros::dec;

    fn raw(insider: &str, shares: Decimal, price: Decimal) -> RawTransaction {
        RawTransaction {
            ticker: Some("acme".to_string()),
            issuer_name: "Acme Widgets Inc.".to_string(),
            issuer_cik: "320193".to_string(),
            insider_name: insider.to_string(),
            insider_cik: "1".to_string(),
            insider_title: "Director".to_string(),
            security_title: "Common Stock".to_string(),
            code: TransactionCode::Purchase,
            trade_date: "2024-06-03".to_string(),
            filing_date: "2024-06-05T16:01:02-04:00".to_string(),
            shares: Some(shares),
            price: Some(price),
            shares_owned_after: Some(dec!(4000)),
            document_url: "https://www.sec.gov/doc.xml".to_string(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_normalize_date_strips_time() {
        assert_eq!(normalize_date("2024-06-05T16:01:02-04:00"), date(2024, 6, 5));
        assert_eq!(normalize_date("2024-06-05"), date(2024, 6, 5));
        assert_eq!(normalize_date(" 2024-01-31 "), date(2024, 1, 31));
    }

    #[test]
    fn test_normalize_date_ignores_zone_and_time_suffixes() {
        assert_eq!(normalize_date("2024-06-05-05:00"), date(2024, 6, 5));
        assert_eq!(normalize_date("2024-06-05Z"), date(2024, 6, 5));
        assert_eq!(normalize_date("2024-06-05 16:01:02"), date(2024, 6, 5));
        assert_eq!(normalize_date("2024-06-05+01:00"), date(2024, 6, 5));
    }

    #[test]
    fn test_zone_suffixed_trade_date_keeps_natural_key() {
        let mut plain = raw("Doe Jane", dec!(100), dec!(10));
        plain.trade_date = "2024-06-03".to_string();
        let mut zoned = plain.clone();
        zoned.trade_date = "2024-06-03-05:00".to_string();

        let a = to_trade_record(&plain).unwrap();
        let b = to_trade_record(&zoned).unwrap();
        assert_eq!(b.trade_date, date(2024, 6, 3));
        assert_eq!(a.natural_key(), b.natural_key());
    }

    #[test]
    fn test_normalize_date_falls_back_to_today() {
        let today = Utc::now().date_naive();
        let parsed = normalize_date("not a date");
        // Allow for a run straddling midnight
        assert!(parsed == today || parsed == today.succ_opt().unwrap());
        assert!(normalize_date("").signed_duration_since(today).num_days().abs() <= 1);
    }

    #[test]
    fn test_placeholder_tickers() {
        for t in ["NONE", "none", "N/A", "NA", "NULL", "", "  "] {
            assert!(is_placeholder_ticker(t), "{t:?}");
            assert!(clean_ticker(t).is_none());
        }
        assert_eq!(clean_ticker(" brk.b ").as_deref(), Some("BRK.B"));
    }

    #[test]
    fn test_to_trade_record() {
        let record = to_trade_record(&raw("Doe Jane", dec!(1000), dec!(2.5))).unwrap();
        assert_eq!(record.ticker, "ACME");
        assert_eq!(record.filing_date, date(2024, 6, 5));
        assert_eq!(record.trade_date, date(2024, 6, 3));
        assert_eq!(record.transaction_value, dec!(2500));
        assert_eq!(record.quantity, 1000);
        assert_eq!(record.shares_owned_after, 4000);
        assert!((record.ownership_delta_pct - 25.0).abs() < 1e-9);
        assert!(!record.is_cluster);
        assert_eq!(record.cluster_size, 1);
        assert!(record.industry.is_none());
    }

    #[test]
    fn test_disposition_quantity_is_non_negative() {
        let mut sale = raw("Doe Jane", dec!(-300), dec!(10));
        sale.code = TransactionCode::Sale;
        let record = to_trade_record(&sale).unwrap();
        assert_eq!(record.quantity, 300);
        assert_eq!(record.transaction_value, dec!(3000));
    }

    #[test]
    fn test_invalid_value_rejected() {
        assert!(to_trade_record(&raw("Doe Jane", dec!(100), dec!(0))).is_none());
        assert!(to_trade_record(&raw("Doe Jane", dec!(0), dec!(5))).is_none());

        let mut no_price = raw("Doe Jane", dec!(100), dec!(1));
        no_price.price = None;
        assert!(to_trade_record(&no_price).is_none());
    }

    #[test]
    fn test_placeholder_ticker_rejected() {
        let mut tx = raw("Doe Jane", dec!(100), dec!(1));
        tx.ticker = Some("N/A".to_string());
        assert!(to_trade_record(&tx).is_none());
        tx.ticker = None;
        assert!(to_trade_record(&tx).is_none());
    }

    #[test]
    fn test_all_codes_retained() {
        let codes = [
            TransactionCode::Grant,
            TransactionCode::Gift,
            TransactionCode::TaxWithholding,
            TransactionCode::OptionExercise,
            TransactionCode::Other('Q'),
        ];
        let batch: Vec<RawTransaction> = codes
            .iter()
            .map(|code| {
                let mut tx = raw("Doe Jane", dec!(10), dec!(1));
                tx.code = *code;
                tx
            })
            .collect();
        assert_eq!(normalize_batch(&batch).len(), codes.len());
    }

    #[test]
    fn test_dedup_keeps_last_seen() {
        let mut first = raw("Doe Jane", dec!(100), dec!(10));
        first.insider_title = "Director".to_string();
        let mut second = raw("Doe Jane", dec!(100), dec!(10));
        second.insider_title = "Chief Executive Officer".to_string();
        let other = raw("Roe Richard", dec!(100), dec!(10));

        let out = normalize_batch(&[first, other, second]);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].insider_name, "Doe Jane");
        assert_eq!(out[0].insider_title, "Chief Executive Officer");
        assert_eq!(out[1].insider_name, "Roe Richard");
    }

    #[test]
    fn test_dedup_treats_equal_values_as_same_key() {
        let a = to_trade_record(&raw("Doe Jane", dec!(100), dec!(10))).unwrap();
        let b = to_trade_record(&raw("Doe Jane", dec!(100.00), dec!(10.0))).unwrap();
        assert_eq!(dedup_batch(vec![a, b]).len(), 1);
    }
}
