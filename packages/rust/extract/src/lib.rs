//! Field extraction heuristics for firm lookups.
//!
//! Turns the raw snippets in a [`LookupResult`] into typed fields. Everything
//! here is pure and deterministic: the same text always yields the same fields.

mod aum;
mod region;

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use firmrank_shared::LookupResult;

pub use aum::{AumUnit, detect_unit, parse_aum};
pub use region::{Region, extract_country, infer_region, region_for_country};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Typed fields derived from one lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedFields {
    /// AUM in billions; `0.0` when the page gave no usable figure.
    pub aum_billions: f64,
    /// Coarse region label, empty when headquarters were unknown.
    pub region: String,
    /// Focus label guessed from page text, empty when nothing matched.
    pub focus: String,
    pub founded_year: Option<i32>,
    /// Page the values were read from.
    pub source_url: String,
    /// Firm website from the info panel.
    pub website: String,
}

// ---------------------------------------------------------------------------
// Focus guessing
// ---------------------------------------------------------------------------

/// Keyword groups in priority order. The first group with any hit wins, so a
/// page mentioning both infrastructure and buyouts is labelled Infrastructure.
const FOCUS_RULES: &[(&str, &[&str])] = &[
    ("Infrastructure", &["infrastructure"]),
    ("Real Estate", &["real estate"]),
    ("Venture", &["venture capital"]),
    ("Credit", &["private credit", "direct lending", "credit fund"]),
    (
        "Growth",
        &["growth equity", "growth capital", "growth investments"],
    ),
    ("Buyout", &["buyout"]),
];

/// Guess an investment-focus label from full page text.
pub fn guess_focus(page_text: &str) -> String {
    let body = page_text.to_lowercase();

    FOCUS_RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| body.contains(k)))
        .map(|(label, _)| (*label).to_string())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Founded year
// ---------------------------------------------------------------------------

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").expect("year regex"));

/// First 19xx/20xx year token in founding-date text.
pub fn founded_year(text: &str) -> Option<i32> {
    YEAR_RE
        .find(text)
        .and_then(|m| m.as_str().parse::<i32>().ok())
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// Run every heuristic over a lookup result.
pub fn extract(result: &LookupResult) -> ExtractedFields {
    let fields = ExtractedFields {
        aum_billions: parse_aum(&result.aum),
        region: infer_region(&result.headquarters),
        focus: guess_focus(&result.page_text),
        founded_year: founded_year(&result.founded),
        source_url: result.reference_url.trim().to_string(),
        website: result.website.trim().to_string(),
    };

    debug!(
        url = %fields.source_url,
        aum = fields.aum_billions,
        region = %fields.region,
        focus = %fields.focus,
        founded = ?fields.founded_year,
        "fields extracted"
    );

    fields
}
