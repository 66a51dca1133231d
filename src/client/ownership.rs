//! Form 4 ownership document parsing
//!
//! EDGAR serves the structured part of a Form 4 as an `<ownershipDocument>`
//! XML file. Only the non-derivative table is read; holdings rows and the
//! derivative table carry no executed open-market transactions.

use crate::error::Result;
use crate::normalize::clean_ticker;
use crate::types::{ParsedFiling, RawTransaction, TransactionCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

// ============================================================================
// Wire structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct OwnershipDocument {
    #[serde(rename = "periodOfReport", default)]
    period_of_report: Option<String>,
    #[serde(default)]
    issuer: Option<IssuerNode>,
    #[serde(rename = "reportingOwner", default)]
    reporting_owners: Vec<ReportingOwner>,
    #[serde(rename = "nonDerivativeTable", default)]
    non_derivative_table: Option<NonDerivativeTable>,
}

#[derive(Debug, Deserialize)]
struct IssuerNode {
    #[serde(rename = "issuerCik", default)]
    cik: Option<String>,
    #[serde(rename = "issuerName", default)]
    name: Option<String>,
    #[serde(rename = "issuerTradingSymbol", default)]
    trading_symbol: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReportingOwner {
    #[serde(rename = "reportingOwnerId", default)]
    id: Option<OwnerId>,
    #[serde(rename = "reportingOwnerRelationship", default)]
    relationship: Option<Relationship>,
}

#[derive(Debug, Deserialize)]
struct OwnerId {
    #[serde(rename = "rptOwnerCik", default)]
    cik: Option<String>,
    #[serde(rename = "rptOwnerName", default)]
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Relationship {
    #[serde(rename = "isDirector", default)]
    is_director: Option<String>,
    #[serde(rename = "isOfficer", default)]
    is_officer: Option<String>,
    #[serde(rename = "isTenPercentOwner", default)]
    is_ten_percent_owner: Option<String>,
    #[serde(rename = "officerTitle", default)]
    officer_title: Option<String>,
    #[serde(rename = "otherText", default)]
    other_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NonDerivativeTable {
    #[serde(rename = "nonDerivativeTransaction", default)]
    transactions: Vec<NonDerivativeTransaction>,
}

#[derive(Debug, Deserialize)]
struct NonDerivativeTransaction {
    #[serde(rename = "securityTitle", default)]
    security_title: Option<ValueNode>,
    #[serde(rename = "transactionDate", default)]
    transaction_date: Option<ValueNode>,
    #[serde(rename = "transactionCoding", default)]
    coding: Option<TransactionCoding>,
    #[serde(rename = "transactionAmounts", default)]
    amounts: Option<TransactionAmounts>,
    #[serde(rename = "postTransactionAmounts", default)]
    post_amounts: Option<PostTransactionAmounts>,
}

#[derive(Debug, Deserialize)]
struct TransactionCoding {
    #[serde(rename = "transactionCode", default)]
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransactionAmounts {
    #[serde(rename = "transactionShares", default)]
    shares: Option<ValueNode>,
    #[serde(rename = "transactionPricePerShare", default)]
    price_per_share: Option<ValueNode>,
    #[serde(rename = "transactionAcquiredDisposedCode", default)]
    acquired_disposed: Option<ValueNode>,
}

#[derive(Debug, Deserialize)]
struct PostTransactionAmounts {
    #[serde(rename = "sharesOwnedFollowingTransaction", default)]
    shares_owned_following: Option<ValueNode>,
}

/// `<x><value>…</value><footnoteId …/></x>` wrapper used by most fields
#[derive(Debug, Deserialize)]
struct ValueNode {
    #[serde(default)]
    value: Option<String>,
}

// ============================================================================
// Extraction
// ============================================================================

fn non_empty(s: Option<&String>) -> Option<String> {
    s.map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn node_text(node: Option<&ValueNode>) -> Option<String> {
    node.and_then(|n| non_empty(n.value.as_ref()))
}

fn node_decimal(node: Option<&ValueNode>) -> Option<Decimal> {
    let text = node_text(node)?;
    let cleaned = text.replace(',', "");
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
}

fn flag(value: Option<&String>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1") | Some("true")
    )
}

/// Explicit title first, then the relationship flags in officer, director,
/// 10% owner order, then "Other".
fn derive_title(rel: Option<&Relationship>) -> String {
    let Some(rel) = rel else {
        return "Other".to_string();
    };
    if let Some(title) = non_empty(rel.officer_title.as_ref()) {
        return title;
    }
    if let Some(text) = non_empty(rel.other_text.as_ref()) {
        return text;
    }
    if flag(rel.is_officer.as_ref()) {
        "Officer".to_string()
    } else if flag(rel.is_director.as_ref()) {
        "Director".to_string()
    } else if flag(rel.is_ten_percent_owner.as_ref()) {
        "10% Owner".to_string()
    } else {
        "Other".to_string()
    }
}

/// Parse one candidate document.
///
/// Returns `Ok(None)` when the text is not an ownership document at all (an
/// HTML rendering, a filing summary), and `Err` when it claims to be one but
/// is malformed. Transactions without a positive value are dropped here.
pub fn parse_ownership_document(
    xml: &str,
    accession_id: &str,
    document_url: &str,
) -> Result<Option<ParsedFiling>> {
    if !xml.contains("<ownershipDocument") {
        return Ok(None);
    }

    let doc: OwnershipDocument = quick_xml::de::from_str(xml)?;
    let Some(issuer) = doc.issuer else {
        return Ok(None);
    };

    let ticker = issuer.trading_symbol.as_deref().and_then(clean_ticker);
    let issuer_name = non_empty(issuer.name.as_ref()).unwrap_or_default();
    let issuer_cik = non_empty(issuer.cik.as_ref()).unwrap_or_default();

    // Joint filings list several owners; the first one is the filer of record
    let owner = doc.reporting_owners.first();
    let owner_id = owner.and_then(|o| o.id.as_ref());
    let insider_name = owner_id
        .and_then(|id| non_empty(id.name.as_ref()))
        .unwrap_or_else(|| "Unknown".to_string());
    let insider_cik = owner_id
        .and_then(|id| non_empty(id.cik.as_ref()))
        .unwrap_or_default();
    let insider_title = derive_title(owner.and_then(|o| o.relationship.as_ref()));

    let rows = doc
        .non_derivative_table
        .map(|t| t.transactions)
        .unwrap_or_default();

    let transactions: Vec<RawTransaction> = rows
        .iter()
        .map(|row| {
            let amounts = row.amounts.as_ref();
            let code = row
                .coding
                .as_ref()
                .and_then(|c| c.code.as_deref())
                .and_then(TransactionCode::from_code)
                .unwrap_or_else(|| {
                    let acquired = node_text(amounts.and_then(|a| a.acquired_disposed.as_ref()));
                    if acquired.as_deref() == Some("A") {
                        TransactionCode::Purchase
                    } else {
                        TransactionCode::Sale
                    }
                });

            RawTransaction {
                ticker: ticker.clone(),
                issuer_name: issuer_name.clone(),
                issuer_cik: issuer_cik.clone(),
                insider_name: insider_name.clone(),
                insider_cik: insider_cik.clone(),
                insider_title: insider_title.clone(),
                security_title: node_text(row.security_title.as_ref()).unwrap_or_default(),
                code,
                trade_date: node_text(row.transaction_date.as_ref()).unwrap_or_default(),
                filing_date: String::new(),
                shares: node_decimal(amounts.and_then(|a| a.shares.as_ref())),
                price: node_decimal(amounts.and_then(|a| a.price_per_share.as_ref())),
                shares_owned_after: node_decimal(
                    row.post_amounts
                        .as_ref()
                        .and_then(|p| p.shares_owned_following.as_ref()),
                ),
                document_url: document_url.to_string(),
            }
        })
        .filter(RawTransaction::has_positive_value)
        .collect();

    Ok(Some(ParsedFiling {
        accession_id: accession_id.to_string(),
        document_url: document_url.to_string(),
        ticker,
        issuer_name,
        issuer_cik,
        insider_name,
        insider_cik,
        insider_title,
        period_of_report: non_empty(doc.period_of_report.as_ref()),
        transactions,
    }))
}
