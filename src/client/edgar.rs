//! SEC EDGAR client
//!
//! Lists recent Form 4 filings from the "current events" Atom feed, locates
//! and parses each filing's ownership document, and looks up the issuer's
//! SIC classification. Every request goes through one shared [`RateGate`].

use super::ownership::parse_ownership_document;
use super::rate_limit::RateGate;
use super::FilingSource;
use crate::config::SecConfig;
use crate::error::{Result, ScraperError};
use crate::types::{FilingReference, ParsedFiling};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^4(?:/A)?\s+-\s+(.+?)\s+\((\d+)\)").unwrap());
static ACCESSION_TAGGED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"accession[_-]number=(\d{10}-\d{2}-\d{6})").unwrap());
static ACCESSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{10}-\d{2}-\d{6})").unwrap());
static XML_HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href="([^"]*\.xml)""#).unwrap());

/// SIC patterns for the company browse page, most specific first
static SIC_PATTERNS: LazyLock<Vec<(Regex, usize)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(r"SIC</acronym>:\s*<a[^>]*>(\d+)</a>\s*-\s*([^<\n]+)").unwrap(),
            2,
        ),
        (
            Regex::new(r"(?s)SIC[^>]*>.*?<a[^>]*>(\d+)\s*-\s*([^<]+)</a>").unwrap(),
            2,
        ),
        (
            Regex::new(r"SIC:\s*</span>\s*(\d+)\s*-\s*([^<\n]+)").unwrap(),
            2,
        ),
        (
            Regex::new(r"Standard Industrial Classification[^>]*>\s*<a[^>]*>([^<]+)</a>").unwrap(),
            1,
        ),
        (
            Regex::new(r"SIC[^\d]*(\d+)\s*-\s*([^<\n]{10,100})").unwrap(),
            2,
        ),
    ]
});

/// File names tried when neither index lists a usable document
const GUESSED_DOCUMENTS: [&str; 3] = ["primary_doc.xml", "doc4.xml", "form4.xml"];

// ============================================================================
// Wire structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    #[serde(default)]
    title: Option<String>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    #[serde(default)]
    summary: Option<AtomText>,
    #[serde(default)]
    updated: Option<String>,
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href", default)]
    href: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomText {
    #[serde(rename = "$text", default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DirectoryIndex {
    directory: DirectoryListing,
}

#[derive(Debug, Deserialize)]
struct DirectoryListing {
    #[serde(default)]
    item: Vec<DirectoryItem>,
}

#[derive(Debug, Deserialize)]
struct DirectoryItem {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Submissions {
    #[serde(rename = "sicDescription", default)]
    sic_description: Option<String>,
}

// ============================================================================
// Client
// ============================================================================

/// EDGAR client
pub struct EdgarClient {
    http: Client,
    gate: RateGate,
    base_url: String,
    data_url: String,
    page_size: usize,
}

impl EdgarClient {
    /// Create a client with its own rate gate
    pub fn new(config: &SecConfig) -> Result<Self> {
        Self::with_gate(config, RateGate::new(config.min_request_interval()))
    }

    /// Create a client sharing an existing gate
    pub fn with_gate(config: &SecConfig, gate: RateGate) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            return Err(ScraperError::Config("EDGAR requires a User-Agent".to_string()));
        }

        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .build()?;

        Ok(Self {
            http,
            gate,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            data_url: config.data_url.trim_end_matches('/').to_string(),
            page_size: config.page_size.max(1),
        })
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        self.gate.acquire().await;
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ScraperError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(resp.text().await?)
    }

    fn feed_url(&self, offset: usize) -> String {
        format!(
            "{}/cgi-bin/browse-edgar?action=getcurrent&type=4&company=&dateb=&owner=include&start={}&count={}&output=atom",
            self.base_url, offset, self.page_size
        )
    }

    /// Fetch one listing page. Returns the raw entry count alongside the
    /// entries that could be interpreted as Form 4 filings.
    async fn fetch_feed_page(&self, offset: usize) -> Result<(usize, Vec<FilingReference>)> {
        let body = self.fetch_text(&self.feed_url(offset)).await?;
        let feed: AtomFeed = quick_xml::de::from_str(&body)?;
        let raw_count = feed.entries.len();
        let filings = feed.entries.iter().filter_map(filing_from_entry).collect();
        Ok((raw_count, filings))
    }

    fn filing_folder(&self, accession_id: &str, cik: &str) -> String {
        format!(
            "{}/Archives/edgar/data/{}/{}",
            self.base_url,
            trim_cik(cik),
            accession_id.replace('-', "")
        )
    }

    /// XML document names listed in the filing's JSON directory index
    async fn documents_from_json_index(&self, folder: &str) -> Result<Vec<String>> {
        let body = self.fetch_text(&format!("{folder}/index.json")).await?;
        let index: DirectoryIndex = serde_json::from_str(&body)?;
        Ok(index
            .directory
            .item
            .into_iter()
            .filter(|item| item.name.to_ascii_lowercase().ends_with(".xml"))
            .map(|item| format!("{folder}/{}", item.name))
            .collect())
    }

    /// XML links scraped from the filing's HTML index page
    async fn documents_from_html_index(&self, folder: &str, accession_id: &str) -> Result<Vec<String>> {
        let body = self
            .fetch_text(&format!("{folder}/{accession_id}-index.htm"))
            .await?;
        Ok(XML_HREF_RE
            .captures_iter(&body)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str())
            // xsl-rendered copies are HTML despite the extension
            .filter(|href| !href.contains("/xsl"))
            .map(|href| self.absolute_url(folder, href))
            .collect())
    }

    fn absolute_url(&self, folder: &str, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else if href.starts_with('/') {
            format!("{}{}", self.base_url, href)
        } else {
            format!("{folder}/{href}")
        }
    }

    /// Try candidates in order, skipping any already tried
    async fn try_candidates(
        &self,
        candidates: Vec<String>,
        tried: &mut HashSet<String>,
        accession_id: &str,
    ) -> Option<ParsedFiling> {
        for url in candidates {
            if !tried.insert(url.clone()) {
                continue;
            }
            let body = match self.fetch_text(&url).await {
                Ok(body) => body,
                Err(e) => {
                    tracing::debug!("Candidate {} unavailable: {}", url, e);
                    continue;
                }
            };
            match parse_ownership_document(&body, accession_id, &url) {
                Ok(Some(parsed)) => return Some(parsed),
                Ok(None) => tracing::debug!("{} is not an ownership document", url),
                Err(e) => tracing::debug!("{} failed to parse: {}", url, e),
            }
        }
        None
    }

    async fn sic_from_submissions(&self, cik: &str) -> Result<Option<String>> {
        let url = format!("{}/submissions/CIK{:0>10}.json", self.data_url, trim_cik(cik));
        let body = self.fetch_text(&url).await?;
        let submissions: Submissions = serde_json::from_str(&body)?;
        Ok(submissions
            .sic_description
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()))
    }

    async fn sic_from_browse_page(&self, cik: &str) -> Result<Option<String>> {
        let url = format!(
            "{}/cgi-bin/browse-edgar?action=getcompany&CIK={}&owner=include&count=40&hidefilings=0",
            self.base_url,
            trim_cik(cik)
        );
        let body = self.fetch_text(&url).await?;
        Ok(sic_from_company_page(&body))
    }
}

#[async_trait]
impl FilingSource for EdgarClient {
    async fn list_recent_filings(&self, max: usize) -> Result<Vec<FilingReference>> {
        let mut filings: Vec<FilingReference> = Vec::new();
        let mut seen = HashSet::new();
        let mut offset = 0;

        while filings.len() < max {
            match self.fetch_feed_page(offset).await {
                Ok((raw_count, page)) => {
                    tracing::debug!("Listing page at {}: {} entries", offset, raw_count);
                    for filing in page {
                        if seen.insert(filing.accession_id.clone()) {
                            filings.push(filing);
                        }
                    }
                    if raw_count < self.page_size {
                        break;
                    }
                    offset += self.page_size;
                }
                Err(e) if offset == 0 => {
                    return Err(ScraperError::FilingList(e.to_string()));
                }
                Err(e) => {
                    tracing::warn!(
                        "Listing page at {} failed, keeping {} filings: {}",
                        offset,
                        filings.len(),
                        e
                    );
                    break;
                }
            }
        }

        filings.truncate(max);
        tracing::info!("Found {} recent Form 4 filings", filings.len());
        Ok(filings)
    }

    async fn parse_filing(&self, accession_id: &str, cik: &str) -> Result<ParsedFiling> {
        let folder = self.filing_folder(accession_id, cik);
        let mut tried = HashSet::new();

        match self.documents_from_json_index(&folder).await {
            Ok(docs) => {
                if let Some(parsed) = self.try_candidates(docs, &mut tried, accession_id).await {
                    return Ok(parsed);
                }
            }
            Err(e) => tracing::debug!("No JSON index for {}: {}", accession_id, e),
        }

        match self.documents_from_html_index(&folder, accession_id).await {
            Ok(docs) => {
                if let Some(parsed) = self.try_candidates(docs, &mut tried, accession_id).await {
                    return Ok(parsed);
                }
            }
            Err(e) => tracing::debug!("No HTML index for {}: {}", accession_id, e),
        }

        let mut guesses = vec![
            format!("{folder}/wk-form4_{accession_id}.xml"),
            format!("{folder}/{accession_id}.xml"),
        ];
        guesses.extend(GUESSED_DOCUMENTS.iter().map(|name| format!("{folder}/{name}")));
        if let Some(parsed) = self.try_candidates(guesses, &mut tried, accession_id).await {
            return Ok(parsed);
        }

        Err(ScraperError::FilingParse {
            accession: accession_id.to_string(),
            reason: format!("no ownership document among {} candidates", tried.len()),
        })
    }

    async fn issuer_classification(&self, cik: &str) -> Result<Option<String>> {
        match self.sic_from_submissions(cik).await {
            Ok(sic) => Ok(sic),
            Err(e) => {
                tracing::debug!("Submissions lookup for CIK {} failed, trying browse page: {}", cik, e);
                self.sic_from_browse_page(cik).await
            }
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn filing_from_entry(entry: &AtomEntry) -> Option<FilingReference> {
    let title = entry.title.as_deref()?.trim();
    let caps = TITLE_RE.captures(title)?;
    let issuer_name = caps.get(1)?.as_str().trim().to_string();
    let issuer_cik = caps.get(2)?.as_str().to_string();

    let link = entry
        .links
        .iter()
        .find_map(|l| l.href.clone())
        .unwrap_or_default();
    let summary = entry
        .summary
        .as_ref()
        .and_then(|s| s.text.as_deref())
        .unwrap_or_default();
    let id = entry.id.as_deref().unwrap_or_default();

    let accession_id = find_accession(&[id, &link, summary])?;
    let filed_at = entry
        .updated
        .as_deref()
        .and_then(|u| u.split('T').next())
        .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok())
        .unwrap_or_else(|| Utc::now().date_naive());

    Some(FilingReference {
        accession_id,
        issuer_cik,
        issuer_name,
        filed_at,
        link,
    })
}

/// Tagged form first, then any accession-shaped number
fn find_accession(haystacks: &[&str]) -> Option<String> {
    haystacks
        .iter()
        .find_map(|h| ACCESSION_TAGGED_RE.captures(h))
        .or_else(|| haystacks.iter().find_map(|h| ACCESSION_RE.captures(h)))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// CIK without leading zeros, as used in archive paths
fn trim_cik(cik: &str) -> &str {
    let trimmed = cik.trim().trim_start_matches('0');
    if trimmed.is_empty() {
        "0"
    } else {
        trimmed
    }
}

/// Extract the SIC description from a company browse page.
///
/// Pages for individuals carry a state location but no SIC line; those
/// yield `None` without trying the looser patterns.
pub(crate) fn sic_from_company_page(html: &str) -> Option<String> {
    let has_sic_label = html.contains("SIC:") || html.contains("SIC</acronym>");
    if html.contains("State location:") && !has_sic_label {
        return None;
    }
    SIC_PATTERNS.iter().find_map(|(re, group)| {
        re.captures(html)
            .and_then(|c| c.get(*group))
            .map(|m| decode_entities(m.as_str().trim()))
            .filter(|s| !s.is_empty())
    })
}

fn decode_entities(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&#39;", "'")
        .replace("&quot;", "\"")
        .replace("&nbsp;", " ")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str, id: &str, updated: &str) -> AtomEntry {
        AtomEntry {
            title: Some(title.to_string()),
            links: vec![AtomLink {
                href: Some("https://www.sec.gov/Archives/edgar/data/1/x-index.htm".to_string()),
            }],
            summary: None,
            updated: Some(updated.to_string()),
            id: Some(id.to_string()),
        }
    }

    #[test]
    fn test_entry_with_tagged_accession() {
        let e = entry(
            "4 - Acme Widgets Inc. (0000320193) (Issuer)",
            "urn:tag:sec.gov,2008:accession-number=0001234567-24-000001",
            "2024-06-05T16:01:02-04:00",
        );
        let filing = filing_from_entry(&e).unwrap();
        assert_eq!(filing.accession_id, "0001234567-24-000001");
        assert_eq!(filing.issuer_cik, "0000320193");
        assert_eq!(filing.issuer_name, "Acme Widgets Inc.");
        assert_eq!(filing.filed_at, NaiveDate::from_ymd_opt(2024, 6, 5).unwrap());
    }

    #[test]
    fn test_amendment_title_accepted() {
        let e = entry(
            "4/A - Doe Jane (0001111111) (Reporting)",
            "0009999999-24-000123",
            "2024-06-05T09:00:00-04:00",
        );
        let filing = filing_from_entry(&e).unwrap();
        assert_eq!(filing.accession_id, "0009999999-24-000123");
        assert_eq!(filing.issuer_name, "Doe Jane");
    }

    #[test]
    fn test_non_form4_title_skipped() {
        let e = entry(
            "8-K - Acme Widgets Inc. (0000320193) (Filer)",
            "accession-number=0001234567-24-000001",
            "2024-06-05T16:01:02-04:00",
        );
        assert!(filing_from_entry(&e).is_none());
    }

    #[test]
    fn test_entry_without_accession_skipped() {
        let mut e = entry("4 - Acme (1) (Issuer)", "urn:none", "2024-06-05T00:00:00");
        e.links.clear();
        assert!(filing_from_entry(&e).is_none());
    }

    #[test]
    fn test_tagged_accession_preferred() {
        let acc = find_accession(&["0000000001-24-000001", "accession_number=0000000002-24-000002"]);
        assert_eq!(acc.as_deref(), Some("0000000002-24-000002"));
    }

    #[test]
    fn test_trim_cik() {
        assert_eq!(trim_cik("0000320193"), "320193");
        assert_eq!(trim_cik("320193"), "320193");
        assert_eq!(trim_cik("0000"), "0");
    }

    #[test]
    fn test_sic_from_acronym_layout() {
        let html = r#"<p class="identInfo"><acronym title="Standard Industrial Code">SIC</acronym>: <a href="/cgi-bin/browse-edgar?action=getcompany&amp;SIC=3571&amp;owner=include">3571</a> - ELECTRONIC COMPUTERS<br />State location: <a href="x">CA</a></p>"#;
        assert_eq!(sic_from_company_page(html).as_deref(), Some("ELECTRONIC COMPUTERS"));
    }

    #[test]
    fn test_sic_from_table_layout() {
        let html = r#"<tr><td>SIC</td><td><a href="x">3571 - ELECTRONIC COMPUTERS</a></td></tr>"#;
        assert_eq!(sic_from_company_page(html).as_deref(), Some("ELECTRONIC COMPUTERS"));
    }

    #[test]
    fn test_sic_from_span_layout() {
        let html = "<span class=\"label\">SIC:</span> 2834 - Pharmaceutical Preparations\n<br/>";
        assert_eq!(
            sic_from_company_page(html).as_deref(),
            Some("Pharmaceutical Preparations")
        );
    }

    #[test]
    fn test_sic_decodes_entities() {
        let html = r#"SIC: <a href="x">6798 - Real Estate Investment Trusts &amp; Co</a>"#;
        assert_eq!(
            sic_from_company_page(html).as_deref(),
            Some("Real Estate Investment Trusts & Co")
        );
    }

    #[test]
    fn test_individual_page_has_no_sic() {
        let html = "<div class=\"companyInfo\">Doe Jane<br/>State location: NY</div>";
        assert!(sic_from_company_page(html).is_none());
    }

    #[test]
    fn test_page_without_sic_is_none() {
        assert!(sic_from_company_page("<html><body>nothing here</body></html>").is_none());
    }
}
