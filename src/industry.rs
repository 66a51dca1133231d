//! Industry classification
//!
//! An ordered chain of resolvers, each returning an optional description.
//! The first answer wins. The pipeline runs the EDGAR lookup first and the
//! company-name inference last.

use crate::client::FilingSource;
use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, LazyLock};

/// What a resolver knows about an issuer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssuerProfile {
    pub ticker: String,
    pub cik: Option<String>,
    pub company_name: String,
}

#[async_trait]
pub trait IndustryResolver: Send + Sync {
    fn name(&self) -> &'static str;

    async fn resolve(&self, issuer: &IssuerProfile) -> Option<String>;
}

/// Resolvers tried in order
pub struct IndustryChain {
    resolvers: Vec<Box<dyn IndustryResolver>>,
}

impl IndustryChain {
    pub fn new(resolvers: Vec<Box<dyn IndustryResolver>>) -> Self {
        Self { resolvers }
    }

    /// EDGAR classification, then name inference
    pub fn standard(source: Arc<dyn FilingSource>) -> Self {
        Self::new(vec![
            Box::new(EdgarIndustryResolver::new(source)),
            Box::new(KeywordIndustryResolver),
        ])
    }

    pub async fn resolve(&self, issuer: &IssuerProfile) -> Option<String> {
        for resolver in &self.resolvers {
            if let Some(industry) = resolver.resolve(issuer).await {
                tracing::debug!("{} classified {} as {}", resolver.name(), issuer.ticker, industry);
                return Some(industry);
            }
        }
        None
    }
}

/// SIC description from EDGAR, keyed by issuer CIK
pub struct EdgarIndustryResolver {
    source: Arc<dyn FilingSource>,
}

impl EdgarIndustryResolver {
    pub fn new(source: Arc<dyn FilingSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl IndustryResolver for EdgarIndustryResolver {
    fn name(&self) -> &'static str {
        "edgar"
    }

    async fn resolve(&self, issuer: &IssuerProfile) -> Option<String> {
        let cik = issuer.cik.as_deref().filter(|c| !c.trim().is_empty())?;
        match self.source.issuer_classification(cik).await {
            Ok(industry) => industry,
            Err(e) => {
                tracing::debug!("Classification lookup for {} failed: {}", issuer.ticker, e);
                None
            }
        }
    }
}

/// Last-resort guess from the company name
pub struct KeywordIndustryResolver;

#[async_trait]
impl IndustryResolver for KeywordIndustryResolver {
    fn name(&self) -> &'static str {
        "keywords"
    }

    async fn resolve(&self, issuer: &IssuerProfile) -> Option<String> {
        infer_from_name(&issuer.company_name).map(str::to_string)
    }
}

static SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[\s,]+(inc\.?|corp\.?|corporation|company|co\.?|ltd\.?|llc|plc)$").unwrap()
});

static KNOWN_COMPANY_RES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    KNOWN_COMPANIES
        .iter()
        .filter_map(|(name, industry)| {
            Regex::new(&format!(r"\b{}\b", regex::escape(name)))
                .ok()
                .map(|re| (re, *industry))
        })
        .collect()
});

const SOFTWARE: &str = "Prepackaged Software";
const COMPUTER_SERVICES: &str = "Computer Programming, Data Processing, Etc.";
const SEMICONDUCTORS: &str = "Semiconductors & Related Devices";
const PHARMA: &str = "Pharmaceutical Preparations";
const FINANCE: &str = "Finance Services";
const BROKERS: &str = "Security Brokers, Dealers & Flotation Companies";
const STATE_BANKS: &str = "State Commercial Banks";
const NATIONAL_BANKS: &str = "National Commercial Banks";
const INVESTMENT_ADVICE: &str = "Investment Advice";
const VARIETY_STORES: &str = "Retail-Variety Stores";
const MAIL_ORDER: &str = "Retail-Catalog & Mail-Order Houses";
const MOTOR_VEHICLES: &str = "Motor Vehicles & Passenger Car Bodies";
const REFINING: &str = "Petroleum Refining";
const REIT: &str = "Real Estate Investment Trusts";
const MOTION_PICTURES: &str = "Services-Motion Picture & Video Tape Production";
const AMUSEMENT: &str = "Services-Amusement & Recreation Services";
const SPORTING_GOODS: &str = "Sporting & Athletic Goods, Nec";
const ELECTRIC: &str = "Electric Services";
const TRUCKING: &str = "Trucking (No Local)";
const EATING_PLACES: &str = "Eating Places";
const MANUFACTURING: &str = "Miscellaneous Manufacturing Industries";
const RADIOTELEPHONE: &str = "Radiotelephone Communications";

/// Names matched as whole words, checked before keywords
const KNOWN_COMPANIES: &[(&str, &str)] = &[
    ("alphabet", COMPUTER_SERVICES),
    ("google", COMPUTER_SERVICES),
    ("microsoft", SOFTWARE),
    ("apple", COMPUTER_SERVICES),
    ("meta", COMPUTER_SERVICES),
    ("facebook", COMPUTER_SERVICES),
    ("amazon", MAIL_ORDER),
    ("amazon.com", MAIL_ORDER),
    ("netflix", MOTION_PICTURES),
    ("tesla", MOTOR_VEHICLES),
    ("nvidia", SEMICONDUCTORS),
    ("amd", SEMICONDUCTORS),
    ("advanced micro devices", SEMICONDUCTORS),
    ("intel", SEMICONDUCTORS),
    ("qualcomm", SEMICONDUCTORS),
    ("salesforce", SOFTWARE),
    ("oracle", SOFTWARE),
    ("adobe", SOFTWARE),
    ("ibm", COMPUTER_SERVICES),
    ("dell", "Computer & Office Equipment"),
    ("hp", "Computer & Office Equipment"),
    ("cisco", "Computer Communications Equipment"),
    ("uber", "Arrangement of Passenger Transportation"),
    ("lyft", "Arrangement of Passenger Transportation"),
    ("airbnb", "Hotels & Motels"),
    ("spotify", AMUSEMENT),
    ("zoom", COMPUTER_SERVICES),
    ("paypal", FINANCE),
    ("visa", FINANCE),
    ("mastercard", FINANCE),
    ("crowdstrike", SOFTWARE),
    ("palo alto", SOFTWARE),
    ("peloton", SPORTING_GOODS),
    ("roku", "Household Audio & Video Equipment"),
    ("robinhood", BROKERS),
    ("coinbase", BROKERS),
    ("pfizer", PHARMA),
    ("moderna", PHARMA),
    ("johnson & johnson", PHARMA),
    ("merck", PHARMA),
    ("abbvie", PHARMA),
    ("bristol", PHARMA),
    ("eli lilly", PHARMA),
    ("astrazeneca", PHARMA),
    ("gilead", PHARMA),
    ("regeneron", PHARMA),
    ("biogen", PHARMA),
    ("berkshire", FINANCE),
    ("jpmorgan", STATE_BANKS),
    ("bank of america", NATIONAL_BANKS),
    ("wells fargo", NATIONAL_BANKS),
    ("citigroup", NATIONAL_BANKS),
    ("goldman sachs", BROKERS),
    ("morgan stanley", BROKERS),
    ("blackrock", INVESTMENT_ADVICE),
    ("charles schwab", BROKERS),
    ("walmart", VARIETY_STORES),
    ("target", VARIETY_STORES),
    ("costco", VARIETY_STORES),
    ("home depot", "Retail-Lumber & Other Building Materials Dealers"),
    ("nike", "Rubber & Plastics Footwear"),
    ("starbucks", EATING_PLACES),
    ("coca-cola", "Beverages"),
    ("boeing", "Aircraft"),
    ("exxon", REFINING),
    ("chevron", REFINING),
    ("ford", MOTOR_VEHICLES),
    ("general motors", MOTOR_VEHICLES),
    ("rivian", MOTOR_VEHICLES),
    ("lucid", MOTOR_VEHICLES),
];

/// Substring keywords, first match wins; longer and more specific entries
/// come before the generic ones they contain
const KEYWORDS: &[(&str, &str)] = &[
    ("biopharma", PHARMA),
    ("pharmaceutical", PHARMA),
    ("pharma", PHARMA),
    ("therapeutics", PHARMA),
    ("biotech", "Biological Products (No Diagnostic Substances)"),
    ("bio", "Biological Products (No Diagnostic Substances)"),
    ("drug", PHARMA),
    ("medicine", PHARMA),
    ("clinical", PHARMA),
    ("medical", "Surgical & Medical Instruments & Apparatus"),
    ("health", "Services-Medical Laboratories"),
    ("semiconductor", SEMICONDUCTORS),
    ("microchip", SEMICONDUCTORS),
    ("chip", SEMICONDUCTORS),
    ("processor", SEMICONDUCTORS),
    ("electronics", "Electronic Components, Nec"),
    ("software", SOFTWARE),
    ("saas", SOFTWARE),
    ("cyber", SOFTWARE),
    ("security", SOFTWARE),
    ("computer", COMPUTER_SERVICES),
    ("technolog", COMPUTER_SERVICES),
    ("tech", COMPUTER_SERVICES),
    ("cloud", COMPUTER_SERVICES),
    ("data", COMPUTER_SERVICES),
    ("platform", COMPUTER_SERVICES),
    ("digital", COMPUTER_SERVICES),
    ("internet", COMPUTER_SERVICES),
    ("online", COMPUTER_SERVICES),
    ("interactive", COMPUTER_SERVICES),
    ("systems", COMPUTER_SERVICES),
    ("solutions", COMPUTER_SERVICES),
    ("networks", "Computer Communications Equipment"),
    ("bancorp", STATE_BANKS),
    ("bancgroup", STATE_BANKS),
    ("banc", STATE_BANKS),
    ("bank", STATE_BANKS),
    ("insurance", "Fire, Marine & Casualty Insurance"),
    ("investment", INVESTMENT_ADVICE),
    ("fund", INVESTMENT_ADVICE),
    ("asset", INVESTMENT_ADVICE),
    ("financial", FINANCE),
    ("capital", FINANCE),
    ("credit", FINANCE),
    ("reit", REIT),
    ("real estate", REIT),
    ("realty", REIT),
    ("propert", REIT),
    ("trust", REIT),
    ("holding", FINANCE),
    ("energy", "Crude Petroleum & Natural Gas"),
    ("oil", "Crude Petroleum & Natural Gas"),
    ("petroleum", REFINING),
    ("gas", "Natural Gas Transmission"),
    ("solar", ELECTRIC),
    ("power", ELECTRIC),
    ("electric", ELECTRIC),
    ("utilities", ELECTRIC),
    ("ecommerce", MAIL_ORDER),
    ("commerce", MAIL_ORDER),
    ("marketplace", MAIL_ORDER),
    ("retail", VARIETY_STORES),
    ("store", VARIETY_STORES),
    ("shopping", VARIETY_STORES),
    ("manufacturing", MANUFACTURING),
    ("industrial", MANUFACTURING),
    ("industries", MANUFACTURING),
    ("telecom", "Telephone Communications (No Radiotelephone)"),
    ("wireless", RADIOTELEPHONE),
    ("mobile", RADIOTELEPHONE),
    ("communications", "Communications Services, Nec"),
    ("entertainment", MOTION_PICTURES),
    ("media", MOTION_PICTURES),
    ("streaming", MOTION_PICTURES),
    ("video", MOTION_PICTURES),
    ("gaming", AMUSEMENT),
    ("games", AMUSEMENT),
    ("music", AMUSEMENT),
    ("airline", "Air Transportation, Scheduled"),
    ("logistics", TRUCKING),
    ("transport", TRUCKING),
    ("delivery", TRUCKING),
    ("automotive", MOTOR_VEHICLES),
    ("motor", MOTOR_VEHICLES),
    ("vehicle", MOTOR_VEHICLES),
    ("auto", MOTOR_VEHICLES),
    ("foods", "Food & Kindred Products"),
    ("food", "Food & Kindred Products"),
    ("beverage", "Beverages"),
    ("restaurant", EATING_PLACES),
    ("coffee", EATING_PLACES),
    ("cafe", EATING_PLACES),
    ("fitness", SPORTING_GOODS),
    ("athletic", SPORTING_GOODS),
    ("sport", SPORTING_GOODS),
];

/// Company-name inference: strip the corporate suffix, then well-known
/// names, then keywords
pub fn infer_from_name(company_name: &str) -> Option<&'static str> {
    let lower = company_name.trim().to_lowercase();
    if lower.is_empty() {
        return None;
    }
    let clean = SUFFIX_RE.replace(&lower, "");
    let clean = clean.trim();

    KNOWN_COMPANY_RES
        .iter()
        .find(|(re, _)| re.is_match(clean))
        .map(|(_, industry)| *industry)
        .or_else(|| {
            KEYWORDS
                .iter()
                .find(|(keyword, _)| clean.contains(keyword))
                .map(|(_, industry)| *industry)
        })
}
