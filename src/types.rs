//! Core types for filings, transactions and persisted trades

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One discovered Form 4 filing from the listing feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingReference {
    /// Accession number, e.g. "0001234567-24-000001"
    pub accession_id: String,
    /// CIK taken from the feed entry title
    pub issuer_cik: String,
    pub issuer_name: String,
    pub filed_at: NaiveDate,
    /// Link to the filing index page
    pub link: String,
}

/// Whether a transaction code adds to or removes from the insider's holdings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeDirection {
    Acquisition,
    Disposition,
    Other,
}

/// Form 4 transaction code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum TransactionCode {
    /// P - open market or private purchase
    Purchase,
    /// S - open market or private sale
    Sale,
    /// A - grant, award or other acquisition
    Grant,
    /// D - disposition back to the issuer
    ReturnToIssuer,
    /// F - payment of exercise price or tax by withholding
    TaxWithholding,
    /// G - bona fide gift
    Gift,
    /// M - exercise or conversion of a derivative
    OptionExercise,
    /// X - exercise of in-the-money or at-the-money derivative
    InTheMoneyExercise,
    /// C - conversion of derivative security
    Conversion,
    /// E - expiration of short derivative position
    Expiration,
    /// H - expiration or cancellation of long derivative position
    Cancellation,
    /// I - discretionary transaction
    Discretionary,
    /// J - other acquisition or disposition
    OtherTransaction,
    /// K - equity swap or similar
    EquitySwap,
    /// L - small acquisition
    SmallAcquisition,
    /// O - exercise of out-of-the-money derivative
    OutOfTheMoneyExercise,
    /// U - disposition pursuant to a tender of shares
    Tender,
    /// V - transaction voluntarily reported
    Voluntary,
    /// W - acquisition or disposition by will or laws of descent
    Inheritance,
    /// Z - deposit into or withdrawal from voting trust
    VotingTrust,
    /// Any letter not in the table above
    Other(char),
}

impl TransactionCode {
    /// Parse the single-letter code. Returns None for empty input.
    pub fn from_code(code: &str) -> Option<Self> {
        let mut chars = code.trim().chars();
        let c = chars.next()?.to_ascii_uppercase();
        if chars.next().is_some() {
            return None;
        }
        Some(match c {
            'P' => Self::Purchase,
            'S' => Self::Sale,
            'A' => Self::Grant,
            'D' => Self::ReturnToIssuer,
            'F' => Self::TaxWithholding,
            'G' => Self::Gift,
            'M' => Self::OptionExercise,
            'X' => Self::InTheMoneyExercise,
            'C' => Self::Conversion,
            'E' => Self::Expiration,
            'H' => Self::Cancellation,
            'I' => Self::Discretionary,
            'J' => Self::OtherTransaction,
            'K' => Self::EquitySwap,
            'L' => Self::SmallAcquisition,
            'O' => Self::OutOfTheMoneyExercise,
            'U' => Self::Tender,
            'V' => Self::Voluntary,
            'W' => Self::Inheritance,
            'Z' => Self::VotingTrust,
            other => Self::Other(other),
        })
    }

    pub fn letter(&self) -> char {
        match self {
            Self::Purchase => 'P',
            Self::Sale => 'S',
            Self::Grant => 'A',
            Self::ReturnToIssuer => 'D',
            Self::TaxWithholding => 'F',
            Self::Gift => 'G',
            Self::OptionExercise => 'M',
            Self::InTheMoneyExercise => 'X',
            Self::Conversion => 'C',
            Self::Expiration => 'E',
            Self::Cancellation => 'H',
            Self::Discretionary => 'I',
            Self::OtherTransaction => 'J',
            Self::EquitySwap => 'K',
            Self::SmallAcquisition => 'L',
            Self::OutOfTheMoneyExercise => 'O',
            Self::Tender => 'U',
            Self::Voluntary => 'V',
            Self::Inheritance => 'W',
            Self::VotingTrust => 'Z',
            Self::Other(c) => *c,
        }
    }

    /// Short display label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Purchase => "Purchase",
            Self::Sale => "Sale",
            Self::Grant => "Grant/Award",
            Self::ReturnToIssuer => "Return to Issuer",
            Self::TaxWithholding => "Tax Payment",
            Self::Gift => "Gift",
            Self::OptionExercise => "Option Exercise",
            Self::InTheMoneyExercise => "ITM Exercise",
            Self::Conversion => "Conversion",
            Self::Expiration => "Expiration",
            Self::Cancellation => "Cancellation",
            Self::Discretionary => "Discretionary",
            Self::OtherTransaction => "Other",
            Self::EquitySwap => "Equity Swap",
            Self::SmallAcquisition => "Small Acquisition",
            Self::OutOfTheMoneyExercise => "OTM Exercise",
            Self::Tender => "Tender",
            Self::Voluntary => "Voluntary",
            Self::Inheritance => "Will/Descent",
            Self::VotingTrust => "Trust Deposit",
            Self::Other(_) => "Unknown",
        }
    }

    pub fn direction(&self) -> TradeDirection {
        match self {
            Self::Purchase
            | Self::Grant
            | Self::OptionExercise
            | Self::InTheMoneyExercise
            | Self::Discretionary
            | Self::SmallAcquisition
            | Self::Inheritance => TradeDirection::Acquisition,
            Self::Sale
            | Self::ReturnToIssuer
            | Self::TaxWithholding
            | Self::Gift
            | Self::Expiration => TradeDirection::Disposition,
            _ => TradeDirection::Other,
        }
    }
}

impl fmt::Display for TransactionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl From<TransactionCode> for String {
    fn from(code: TransactionCode) -> Self {
        code.letter().to_string()
    }
}

impl TryFrom<String> for TransactionCode {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        TransactionCode::from_code(&value).ok_or_else(|| format!("invalid transaction code: {value:?}"))
    }
}

/// One transaction line extracted from an ownership document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    /// None when absent or a "not applicable" placeholder
    pub ticker: Option<String>,
    pub issuer_name: String,
    /// Company CIK, never the reporting owner's
    pub issuer_cik: String,
    pub insider_name: String,
    pub insider_cik: String,
    pub insider_title: String,
    pub security_title: String,
    pub code: TransactionCode,
    /// As written in the document, normalized later
    pub trade_date: String,
    /// Filled in by the orchestrator from the filing reference
    pub filing_date: String,
    pub shares: Option<Decimal>,
    pub price: Option<Decimal>,
    pub shares_owned_after: Option<Decimal>,
    pub document_url: String,
}

impl RawTransaction {
    /// shares × price, if both are present
    pub fn transaction_value(&self) -> Option<Decimal> {
        match (self.shares, self.price) {
            (Some(shares), Some(price)) => shares.abs().checked_mul(price),
            _ => None,
        }
    }

    /// True when the computed value is present and strictly positive
    pub fn has_positive_value(&self) -> bool {
        self.transaction_value()
            .map(|v| v > Decimal::ZERO)
            .unwrap_or(false)
    }

    /// Percent of the post-transaction holding represented by this line
    pub fn ownership_delta_pct(&self) -> f64 {
        match (self.shares, self.shares_owned_after) {
            (Some(shares), Some(after)) if after > Decimal::ZERO => shares
                .abs()
                .checked_div(after)
                .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
                .and_then(|pct| pct.to_f64())
                .unwrap_or(0.0),
            _ => 0.0,
        }
    }
}

/// Result of parsing one filing's ownership document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedFiling {
    pub accession_id: String,
    pub document_url: String,
    pub ticker: Option<String>,
    pub issuer_name: String,
    pub issuer_cik: String,
    pub insider_name: String,
    pub insider_cik: String,
    pub insider_title: String,
    pub period_of_report: Option<String>,
    pub transactions: Vec<RawTransaction>,
}

/// Canonical persisted trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub filing_date: NaiveDate,
    pub trade_date: NaiveDate,
    pub ticker: String,
    pub company_name: String,
    pub industry: Option<String>,
    pub insider_name: String,
    pub insider_title: String,
    pub transaction_type: TransactionCode,
    pub price: Decimal,
    pub quantity: i64,
    pub shares_owned_after: i64,
    pub ownership_delta_pct: f64,
    pub transaction_value: Decimal,
    pub current_price: Option<Decimal>,
    pub price_change_pct: Option<f64>,
    pub is_cluster: bool,
    pub cluster_size: u32,
    pub source_url: String,
}

impl TradeRecord {
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            filing_date: self.filing_date,
            trade_date: self.trade_date,
            ticker: self.ticker.clone(),
            insider_name: self.insider_name.clone(),
            transaction_type: self.transaction_type,
            transaction_value: self.transaction_value.normalize(),
        }
    }
}

/// Identity of a logical trade for upsert purposes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    pub filing_date: NaiveDate,
    pub trade_date: NaiveDate,
    pub ticker: String,
    pub insider_name: String,
    pub transaction_type: TransactionCode,
    pub transaction_value: Decimal,
}

/// A trade as read back from the store, with its row identity
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTrade {
    pub id: i64,
    pub record: TradeRecord,
}

/// Current price and trailing change for one ticker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceData {
    pub ticker: String,
    pub current_price: Decimal,
    pub price_change_pct: f64,
}

/// Best-effort fields written back after ingestion
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enrichment {
    pub industry: Option<String>,
    pub current_price: Option<Decimal>,
    pub price_change_pct: Option<f64>,
}

impl Enrichment {
    pub fn is_empty(&self) -> bool {
        self.industry.is_none() && self.current_price.is_none() && self.price_change_pct.is_none()
    }
}

/// Outcome of one ingestion run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionSummary {
    pub success: bool,
    pub trades_processed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IngestionSummary {
    pub fn succeeded(trades_processed: usize) -> Self {
        Self {
            success: true,
            trades_processed,
            error: None,
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        Self {
            success: false,
            trades_processed: 0,
            error: Some(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn raw(shares: Option<Decimal>, price: Option<Decimal>) -> RawTransaction {
        RawTransaction {
            ticker: Some("ACME".to_string()),
            issuer_name: "Acme Corp".to_string(),
            issuer_cik: "1000".to_string(),
            insider_name: "Jane Doe".to_string(),
            insider_cik: "2000".to_string(),
            insider_title: "CEO".to_string(),
            security_title: "Common Stock".to_string(),
            code: TransactionCode::Purchase,
            trade_date: "2024-06-03".to_string(),
            filing_date: "2024-06-05".to_string(),
            shares,
            price,
            shares_owned_after: Some(dec!(1000)),
            document_url: String::new(),
        }
    }

    #[test]
    fn test_transaction_code_round_trip_letters() {
        for letter in ["P", "S", "A", "D", "F", "G", "M", "X", "C", "E", "H", "I", "J", "K", "L", "O", "U", "V", "W", "Z"] {
            let code = TransactionCode::from_code(letter).unwrap();
            assert_eq!(code.to_string(), letter);
            assert!(!matches!(code, TransactionCode::Other(_)));
        }
    }

    #[test]
    fn test_unknown_code_is_retained() {
        let code = TransactionCode::from_code("q").unwrap();
        assert_eq!(code, TransactionCode::Other('Q'));
        assert_eq!(code.letter(), 'Q');
        assert_eq!(code.direction(), TradeDirection::Other);
    }

    #[test]
    fn test_empty_or_multi_letter_code_rejected() {
        assert!(TransactionCode::from_code("").is_none());
        assert!(TransactionCode::from_code("  ").is_none());
        assert!(TransactionCode::from_code("PS").is_none());
    }

    #[test]
    fn test_code_directions() {
        assert_eq!(TransactionCode::Purchase.direction(), TradeDirection::Acquisition);
        assert_eq!(TransactionCode::Sale.direction(), TradeDirection::Disposition);
        assert_eq!(TransactionCode::Gift.direction(), TradeDirection::Disposition);
        assert_eq!(TransactionCode::Conversion.direction(), TradeDirection::Other);
    }

    #[test]
    fn test_code_serializes_as_letter() {
        assert_eq!(serde_json::to_string(&TransactionCode::TaxWithholding).unwrap(), "\"F\"");
        let code: TransactionCode = serde_json::from_str("\"G\"").unwrap();
        assert_eq!(code, TransactionCode::Gift);
    }

    #[test]
    fn test_transaction_value() {
        let tx = raw(Some(dec!(100)), Some(dec!(12.50)));
        assert_eq!(tx.transaction_value(), Some(dec!(1250)));
        assert!(tx.has_positive_value());
    }

    #[test]
    fn test_missing_or_zero_price_is_not_positive() {
        assert!(!raw(Some(dec!(100)), None).has_positive_value());
        assert!(!raw(Some(dec!(100)), Some(dec!(0))).has_positive_value());
        assert!(!raw(None, Some(dec!(5))).has_positive_value());
    }

    #[test]
    fn test_ownership_delta() {
        let tx = raw(Some(dec!(100)), Some(dec!(1)));
        assert!((tx.ownership_delta_pct() - 10.0).abs() < 1e-9);

        let mut none_after = raw(Some(dec!(100)), Some(dec!(1)));
        none_after.shares_owned_after = Some(Decimal::ZERO);
        assert_eq!(none_after.ownership_delta_pct(), 0.0);
    }

    #[test]
    fn test_ownership_delta_overflow_is_zero() {
        let mut tx = raw(Some(Decimal::from_i128_with_scale(10i128.pow(27), 0)), Some(dec!(1)));
        tx.shares_owned_after = Some(dec!(0.5));
        assert_eq!(tx.ownership_delta_pct(), 0.0);

        let mut tiny = raw(Some(Decimal::MAX), Some(dec!(1)));
        tiny.shares_owned_after = Some(dec!(0.0000000001));
        assert_eq!(tiny.ownership_delta_pct(), 0.0);
    }

    #[test]
    fn test_natural_key_ignores_decimal_scale() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 5).unwrap();
        let mut a = TradeRecord {
            filing_date: date,
            trade_date: date,
            ticker: "ACME".to_string(),
            company_name: "Acme".to_string(),
            industry: None,
            insider_name: "Jane".to_string(),
            insider_title: "CEO".to_string(),
            transaction_type: TransactionCode::Purchase,
            price: dec!(10),
            quantity: 100,
            shares_owned_after: 1000,
            ownership_delta_pct: 10.0,
            transaction_value: dec!(1000),
            current_price: None,
            price_change_pct: None,
            is_cluster: false,
            cluster_size: 1,
            source_url: String::new(),
        };
        let key = a.natural_key();
        a.transaction_value = dec!(1000.00);
        a.company_name = "Acme Corp".to_string();
        assert_eq!(key, a.natural_key());
    }

    #[test]
    fn test_summary_serialization() {
        let ok = serde_json::to_string(&IngestionSummary::succeeded(12)).unwrap();
        assert_eq!(ok, r#"{"success":true,"tradesProcessed":12}"#);

        let failed = IngestionSummary::failed("boom");
        let json = serde_json::to_string(&failed).unwrap();
        assert!(json.contains("\"success\":false"));
        assert!(json.contains("\"error\":\"boom\""));
    }
}
