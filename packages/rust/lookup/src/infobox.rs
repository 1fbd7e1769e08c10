//! Info-panel ("infobox") parsing.
//!
//! Encyclopedia pages summarise an organisation in a two-column table:
//! - `<table class="infobox vcard">` wraps the panel
//! - each row is `<tr><th>Label</th><td>Value</td></tr>`
//!
//! Labels are matched case-insensitively as substrings of the `th` text.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use firmrank_shared::LookupResult;

// ---------------------------------------------------------------------------
// Selectors (compiled once)
// ---------------------------------------------------------------------------

static INFOBOX_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table.infobox").expect("infobox selector"));

static ROW_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").expect("tr selector"));

static TH_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th").expect("th selector"));

static TD_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").expect("td selector"));

static LINK_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("link selector"));

static SEARCH_HIT_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.mw-search-result-heading > a").expect("search hit selector")
});

/// Labels tried, in order, for the assets figure.
pub const AUM_LABELS: [&str; 4] = [
    "AUM",
    "Assets under management",
    "Assets under management (AUM)",
    "Total assets",
];

// ---------------------------------------------------------------------------
// Search results
// ---------------------------------------------------------------------------

/// Resolve the first search hit's link against `base`.
pub fn first_search_hit(html: &str, base: &Url) -> Option<Url> {
    let doc = Html::parse_document(html);
    let href = doc.select(&SEARCH_HIT_SEL).next()?.value().attr("href")?;
    base.join(href).ok()
}

// ---------------------------------------------------------------------------
// Firm page
// ---------------------------------------------------------------------------

/// Parse a firm page into raw snippets.
///
/// A page without an info panel still yields a result: the panel fields are
/// left empty and only the URL and page text are filled.
pub fn parse_firm_page(html: &str, page_url: &Url) -> LookupResult {
    let doc = Html::parse_document(html);

    let mut result = LookupResult {
        reference_url: page_url.to_string(),
        page_text: page_text(&doc),
        ..Default::default()
    };

    let Some(infobox) = doc.select(&INFOBOX_SEL).next() else {
        return result;
    };

    result.website = website(infobox, page_url);
    result.headquarters = cell_text(infobox, "Headquarters").unwrap_or_default();
    result.founded = cell_text(infobox, "Founded").unwrap_or_default();
    result.aum = AUM_LABELS
        .iter()
        .filter_map(|label| cell_text(infobox, label))
        .find(|text| !text.trim().is_empty())
        .unwrap_or_default();

    result
}

/// The value cell of the first row whose header contains `label`.
fn value_cell<'a>(infobox: ElementRef<'a>, label: &str) -> Option<ElementRef<'a>> {
    let needle = label.to_lowercase();

    infobox
        .select(&ROW_SEL)
        .find(|row| {
            row.select(&TH_SEL)
                .any(|th| element_text(th).to_lowercase().contains(&needle))
        })
        .and_then(|row| row.select(&TD_SEL).next())
}

/// Whitespace-normalised text of the value cell for `label`.
fn cell_text(infobox: ElementRef<'_>, label: &str) -> Option<String> {
    value_cell(infobox, label).map(element_text)
}

/// Website link, preferring the anchor's resolved href over the cell text.
fn website(infobox: ElementRef<'_>, page_url: &Url) -> String {
    let Some(cell) = value_cell(infobox, "Website") else {
        return String::new();
    };

    cell.select(&LINK_SEL)
        .filter_map(|a| a.value().attr("href"))
        .find_map(|href| page_url.join(href).ok())
        .map(|url| url.to_string())
        .unwrap_or_else(|| element_text(cell))
}

/// Collapse an element's text nodes into single-spaced text.
fn element_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

/// All visible document text, skipping script and style bodies.
fn page_text(doc: &Html) -> String {
    let mut out = String::new();

    for node in doc.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| e.name()))
            .is_some_and(|name| matches!(name, "script" | "style" | "noscript"));
        if !hidden {
            out.push_str(text);
            out.push(' ');
        }
    }

    collapse_whitespace(&out)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_url() -> Url {
        Url::parse("https://en.wikipedia.org/wiki/Example_Capital").unwrap()
    }

    fn load_fixture(name: &str) -> String {
        let path = format!("{}/../../../fixtures/html/{name}", env!("CARGO_MANIFEST_DIR"));
        std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
    }

    #[test]
    fn parses_full_infobox() {
        let html = load_fixture("firm_infobox.html");
        let result = parse_firm_page(&html, &page_url());

        assert_eq!(result.reference_url, "https://en.wikipedia.org/wiki/Example_Capital");
        assert_eq!(result.website, "https://www.example-capital.com/");
        assert_eq!(result.headquarters, "250 Park Avenue, New York City, U.S.");
        assert_eq!(result.founded, "1985; 39 years ago");
        assert!(result.aum.starts_with("US$ 12.4 billion"));
        assert!(result.page_text.contains("infrastructure"));
        assert!(!result.page_text.contains("trackPageView"));
    }

    #[test]
    fn missing_infobox_still_yields_result() {
        let html = "<html><body><p>Example Capital is a buyout firm.</p></body></html>";
        let result = parse_firm_page(html, &page_url());

        assert_eq!(result.reference_url, page_url().to_string());
        assert!(result.website.is_empty());
        assert!(result.aum.is_empty());
        assert_eq!(result.page_text, "Example Capital is a buyout firm.");
    }

    #[test]
    fn aum_labels_tried_in_order() {
        let html = r#"<html><body><table class="infobox">
            <tr><th>Total assets</th><td>US$ 3 billion</td></tr>
            <tr><th>Assets under management</th><td>   </td></tr>
        </table></body></html>"#;
        let result = parse_firm_page(html, &page_url());
        assert_eq!(result.aum, "US$ 3 billion");
    }

    #[test]
    fn label_match_is_case_insensitive() {
        let html = r#"<html><body><table class="infobox vcard">
            <tr><th>HEADQUARTERS</th><td>London, <a href="/wiki/UK">UK</a></td></tr>
            <tr><th>Website</th><td>example.co.uk</td></tr>
        </table></body></html>"#;
        let result = parse_firm_page(html, &page_url());
        assert_eq!(result.headquarters, "London, UK");
        assert_eq!(result.website, "example.co.uk");
    }

    #[test]
    fn search_hit_resolves_relative_link() {
        let html = r#"<html><body><ul>
            <li><div class="mw-search-result-heading"><a href="/wiki/Example_Capital">Example Capital</a></div></li>
            <li><div class="mw-search-result-heading"><a href="/wiki/Other">Other</a></div></li>
        </ul></body></html>"#;
        let base = Url::parse("https://en.wikipedia.org").unwrap();
        let hit = first_search_hit(html, &base).unwrap();
        assert_eq!(hit.as_str(), "https://en.wikipedia.org/wiki/Example_Capital");
    }

    #[test]
    fn no_search_hit() {
        let base = Url::parse("https://en.wikipedia.org").unwrap();
        assert!(first_search_hit("<html><body>No results</body></html>", &base).is_none());
    }
}
