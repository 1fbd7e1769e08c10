//! Header normalisation and the required-column schema.

/// Normalise a header for matching.
///
/// En dashes become hyphens, text is lower-cased, everything except ASCII
/// letters, digits, whitespace and `-` is dropped, and whitespace collapses to
/// single spaces. `"Capital Raised (USD M, 2020–24)"` and
/// `"capital raised  USD M 2020-24"` normalise identically.
pub fn normalize_header(raw: &str) -> String {
    let filtered: String = raw
        .replace('\u{2013}', "-")
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace() || *c == '-')
        .collect();

    filtered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Opaque handle to a dataset column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnHandle(pub(crate) usize);

impl ColumnHandle {
    /// Zero-based position within the data sheet.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Columns every input sheet must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequiredColumn {
    Rank,
    FirmName,
    Region,
    PrimaryFocus,
    CapitalRaised,
    LatestFundSize,
    Aum,
}

impl RequiredColumn {
    pub const ALL: [RequiredColumn; 7] = [
        Self::Rank,
        Self::FirmName,
        Self::Region,
        Self::PrimaryFocus,
        Self::CapitalRaised,
        Self::LatestFundSize,
        Self::Aum,
    ];

    /// Accepted header spellings, most specific first. The first one is the
    /// canonical header used in error messages.
    pub fn synonyms(&self) -> &'static [&'static str] {
        match self {
            Self::Rank => &["Rank"],
            Self::FirmName => &["Firm Name"],
            Self::Region => &["Region"],
            Self::PrimaryFocus => &["Primary Focus"],
            Self::CapitalRaised => &["Capital Raised (USD M, 2020\u{2013}24)", "Capital Raised"],
            Self::LatestFundSize => &["Latest Fund Size (USD B)", "Latest Fund Size"],
            Self::Aum => &["AUM (USD B)", "AUM"],
        }
    }

    pub fn canonical(&self) -> &'static str {
        self.synonyms()[0]
    }
}

/// Provenance columns appended by the enrichment pass.
pub const SOURCE_URL_COLUMN: &str = "Source URL (wiki)";
pub const WEBSITE_COLUMN: &str = "Website (wiki)";
pub const FOUNDED_COLUMN: &str = "Founded (wiki)";
pub const LAST_ENRICHED_COLUMN: &str = "Last Enriched";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_ignores_case_space_and_punctuation() {
        assert_eq!(
            normalize_header("Capital Raised (USD M, 2020\u{2013}24)"),
            "capital raised usd m 2020-24"
        );
        assert_eq!(normalize_header("  FIRM   name "), "firm name");
        assert_eq!(normalize_header("Website (wiki)"), normalize_header("website  WIKI"));
        assert_eq!(normalize_header("AUM (USD B)"), "aum usd b");
    }

    #[test]
    fn canonical_is_first_synonym() {
        assert_eq!(RequiredColumn::Aum.canonical(), "AUM (USD B)");
        assert_eq!(RequiredColumn::ALL.len(), 7);
    }
}
