//! Core domain types for firm datasets and enrichment runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one enrichment run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// FirmRecord
// ---------------------------------------------------------------------------

/// One dataset row, as seen by the filter/rank collaborator.
///
/// Monetary figures keep the units of the source sheet: capital raised in
/// USD millions, fund size and AUM in USD billions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirmRecord {
    /// Stable unique rank; the join key between report rows and source rows.
    pub rank: i64,
    /// Firm name. Never empty for a record produced from a dataset.
    pub name: String,
    pub region: String,
    pub primary_focus: String,
    pub capital_raised: f64,
    pub latest_fund_size: f64,
    /// Assets under management. Zero means "needs enrichment".
    pub aum: f64,
    #[serde(default)]
    pub metadata: EnrichmentMetadata,
}

impl FirmRecord {
    /// Whether this record still lacks its AUM figure.
    pub fn needs_enrichment(&self) -> bool {
        self.aum <= 0.0
    }
}

/// Provenance written alongside a row by the enrichment pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentMetadata {
    /// Page the values were read from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// The firm's own website, as listed on the source page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub founded_year: Option<i32>,
    /// When a lookup last produced values for this row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_enriched: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// LookupResult
// ---------------------------------------------------------------------------

/// Raw, unparsed snippets returned by a firm lookup.
///
/// All fields default to empty. A `LookupResult` with every field empty still
/// means "page found"; a failed lookup is represented by the absence of a
/// result altogether.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupResult {
    /// URL of the page the snippets came from.
    pub reference_url: String,
    /// Website link from the info panel.
    pub website: String,
    /// Headquarters text, e.g. `"30 Hudson Yards, New York City, U.S."`.
    pub headquarters: String,
    /// Founding-date text, e.g. `"1976; 48 years ago"`.
    pub founded: String,
    /// Assets-under-management text, e.g. `"US$553 billion (2023)"`.
    pub aum: String,
    /// Whole-page text, only used for focus guessing.
    pub page_text: String,
}

// ---------------------------------------------------------------------------
// Criteria
// ---------------------------------------------------------------------------

/// A ranking key for the filter/rank collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriorityKey {
    Aum,
    LatestFundSize,
    CapitalRaised,
    Rank,
}

/// Priority used when the operator gives none.
pub const DEFAULT_PRIORITY: [PriorityKey; 4] = [
    PriorityKey::Aum,
    PriorityKey::LatestFundSize,
    PriorityKey::CapitalRaised,
    PriorityKey::Rank,
];

impl PriorityKey {
    /// Parse one operator token. Unrecognised tokens return `None`.
    ///
    /// Tokens are upper-cased and spaces become underscores, so
    /// `"latest fund size"` and `"LATEST_FUND_SIZE"` are the same key.
    pub fn parse(token: &str) -> Option<Self> {
        let key = token.trim().to_uppercase().replace(' ', "_");
        match key.as_str() {
            "AUM" => Some(Self::Aum),
            "LATEST_FUND_SIZE" => Some(Self::LatestFundSize),
            "CAPITAL_RAISED" => Some(Self::CapitalRaised),
            "PEI_RANK" | "RANK" => Some(Self::Rank),
            _ => None,
        }
    }

    /// Canonical token, as accepted by [`PriorityKey::parse`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aum => "AUM",
            Self::LatestFundSize => "LATEST_FUND_SIZE",
            Self::CapitalRaised => "CAPITAL_RAISED",
            Self::Rank => "PEI_RANK",
        }
    }
}

impl std::fmt::Display for PriorityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a comma-separated priority list.
///
/// Blank input yields [`DEFAULT_PRIORITY`]. Unknown tokens are dropped, not
/// reported as errors.
pub fn parse_priority_list(csv: &str) -> Vec<PriorityKey> {
    if csv.trim().is_empty() {
        return DEFAULT_PRIORITY.to_vec();
    }

    csv.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter_map(|token| {
            let key = PriorityKey::parse(token);
            if key.is_none() {
                tracing::debug!(token, "ignoring unrecognised priority key");
            }
            key
        })
        .collect()
}

/// Filter and ranking criteria supplied by the operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criteria {
    /// Region equality filter (trimmed, case-insensitive). Empty = any.
    pub region_equals: String,
    pub min_aum: f64,
    pub min_latest_fund_size: f64,
    pub min_capital_raised: f64,
    /// Primary-focus substring filter (case-insensitive). Empty = any.
    pub focus_contains: String,
    /// Ranking keys, most significant first.
    pub priority: Vec<PriorityKey>,
}

impl Default for Criteria {
    fn default() -> Self {
        Self {
            region_equals: String::new(),
            min_aum: 0.0,
            min_latest_fund_size: 0.0,
            min_capital_raised: 0.0,
            focus_contains: String::new(),
            priority: DEFAULT_PRIORITY.to_vec(),
        }
    }
}

// ---------------------------------------------------------------------------
// Lenient number parsing
// ---------------------------------------------------------------------------

/// Parse a numeric cell that arrived as text.
///
/// Commas and whitespace are stripped; anything unparseable, non-finite or
/// negative becomes `0.0`.
pub fn parse_cell_number(text: &str) -> f64 {
    let cleaned: String = text
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();

    match cleaned.parse::<f64>() {
        Ok(n) if n.is_finite() && n > 0.0 => n,
        _ => 0.0,
    }
}

/// Parse an operator-supplied number. Blank or unparseable input is `0.0`.
pub fn parse_operator_number(text: &str) -> f64 {
    let cleaned = text.trim().replace(',', "");
    if cleaned.is_empty() {
        return 0.0;
    }
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_roundtrip() {
        let id = RunId::new();
        let parsed: RunId = id.to_string().parse().expect("parse RunId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn priority_key_accepts_synonyms() {
        assert_eq!(PriorityKey::parse("aum"), Some(PriorityKey::Aum));
        assert_eq!(
            PriorityKey::parse("latest fund size"),
            Some(PriorityKey::LatestFundSize)
        );
        assert_eq!(PriorityKey::parse("RANK"), Some(PriorityKey::Rank));
        assert_eq!(PriorityKey::parse("PEI_RANK"), Some(PriorityKey::Rank));
        assert_eq!(PriorityKey::parse("vintage"), None);
    }

    #[test]
    fn blank_priority_uses_default() {
        assert_eq!(parse_priority_list("  "), DEFAULT_PRIORITY.to_vec());
    }

    #[test]
    fn unknown_priority_keys_are_ignored() {
        let keys = parse_priority_list("CAPITAL_RAISED, bogus, ,rank");
        assert_eq!(keys, vec![PriorityKey::CapitalRaised, PriorityKey::Rank]);
    }

    #[test]
    fn cell_numbers_are_lenient() {
        assert_eq!(parse_cell_number("1,234.5"), 1234.5);
        assert_eq!(parse_cell_number(" 12 "), 12.0);
        assert_eq!(parse_cell_number(""), 0.0);
        assert_eq!(parse_cell_number("n/a"), 0.0);
        assert_eq!(parse_cell_number("-4"), 0.0);
    }

    #[test]
    fn operator_numbers_default_to_zero() {
        assert_eq!(parse_operator_number(""), 0.0);
        assert_eq!(parse_operator_number("ten"), 0.0);
        assert_eq!(parse_operator_number("2,500"), 2500.0);
        assert_eq!(parse_operator_number(" 1.5 "), 1.5);
    }

    #[test]
    fn record_needs_enrichment_only_without_aum() {
        let mut record = FirmRecord {
            rank: 1,
            name: "Blackstone".into(),
            region: String::new(),
            primary_focus: String::new(),
            capital_raised: 0.0,
            latest_fund_size: 0.0,
            aum: 0.0,
            metadata: EnrichmentMetadata::default(),
        };
        assert!(record.needs_enrichment());
        record.aum = 1.0;
        assert!(!record.needs_enrichment());
    }

    #[test]
    fn criteria_serialization() {
        let criteria = Criteria::default();
        let json = serde_json::to_string(&criteria).expect("serialize");
        assert!(json.contains("LATEST_FUND_SIZE"));
        let parsed: Criteria = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, criteria);
    }
}
