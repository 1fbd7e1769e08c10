//! Headquarters text → country → coarse region.

/// Coarse geographic bucket used in the dataset's Region column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    NorthAmerica,
    Europe,
    AsiaPacific,
    Other,
}

impl Region {
    /// Label written into the dataset.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NorthAmerica => "North America",
            Self::Europe => "Europe",
            Self::AsiaPacific => "Asia-Pacific",
            Self::Other => "Other",
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

const NORTH_AMERICA: &[&str] = &["united states", "canada", "mexico"];

const EUROPE: &[&str] = &[
    "united kingdom",
    "england",
    "scotland",
    "ireland",
    "france",
    "germany",
    "netherlands",
    "switzerland",
    "sweden",
    "norway",
    "denmark",
    "finland",
    "spain",
    "italy",
    "luxembourg",
    "belgium",
    "austria",
    "portugal",
    "poland",
];

const ASIA_PACIFIC: &[&str] = &[
    "china",
    "hong kong",
    "japan",
    "singapore",
    "india",
    "australia",
    "new zealand",
    "korea",
    "taiwan",
    "indonesia",
    "malaysia",
    "thailand",
    "philippines",
    "vietnam",
];

/// Take the trailing comma-separated segment of a headquarters string and
/// expand common abbreviations.
///
/// Returns an empty string for blank input.
pub fn extract_country(headquarters: &str) -> String {
    if headquarters.trim().is_empty() {
        return String::new();
    }

    let last = headquarters.rsplit(',').next().unwrap_or("").trim();

    match last.to_lowercase().as_str() {
        "us" | "u.s." | "usa" | "u.s.a" | "u.s.a." => "United States".to_string(),
        "uk" | "u.k." => "United Kingdom".to_string(),
        _ => last.to_string(),
    }
}

/// Map a country name onto a [`Region`] by substring match.
pub fn region_for_country(country: &str) -> Region {
    let lowered = country.to_lowercase();
    let matches = |table: &[&str]| table.iter().any(|needle| lowered.contains(needle));

    if matches(NORTH_AMERICA) {
        Region::NorthAmerica
    } else if matches(EUROPE) {
        Region::Europe
    } else if matches(ASIA_PACIFIC) {
        Region::AsiaPacific
    } else {
        Region::Other
    }
}

/// Infer a region label from headquarters text. Blank input gives `""`.
pub fn infer_region(headquarters: &str) -> String {
    let country = extract_country(headquarters);
    if country.is_empty() {
        return String::new();
    }
    region_for_country(&country).label().to_string()
}
