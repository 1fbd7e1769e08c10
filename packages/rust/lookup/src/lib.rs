//! Firm lookup against a public encyclopedia.
//!
//! A lookup is a two-step, best-effort affair: search for
//! `"<firm name> <qualifier>"`, open the first hit (or guess the canonical
//! `/wiki/<Firm_Name>` page when there is none), then read the page's info
//! panel. Any failure along the way means "not found"; there are no retries.

mod infobox;

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info, instrument};
use url::Url;

use firmrank_shared::{FirmRankError, LookupConfig, LookupResult, Result};

pub use infobox::{AUM_LABELS, first_search_hit, parse_firm_page};

/// Maximum number of redirects to follow per request.
const MAX_REDIRECTS: usize = 5;

/// Maximum response size we consider valid (10 MB).
const MAX_RESPONSE_SIZE: u64 = 10 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Lookup seam
// ---------------------------------------------------------------------------

/// Source of raw firm data.
///
/// `None` means "not found" for any reason: no page, HTTP error, timeout,
/// unreadable body. Callers treat it as "no data available" and move on.
pub trait FirmLookup {
    fn fetch(&self, firm_name: &str) -> impl Future<Output = Option<LookupResult>> + Send;
}

// ---------------------------------------------------------------------------
// WikiLookupClient
// ---------------------------------------------------------------------------

/// Production lookup client backed by a MediaWiki site.
pub struct WikiLookupClient {
    client: Client,
    base: Url,
    qualifier: String,
}

impl WikiLookupClient {
    /// Create a client with the configured timeout and user agent.
    pub fn new(config: &LookupConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url).map_err(|e| {
            FirmRankError::config(format!("invalid lookup base URL '{}': {e}", config.base_url))
        })?;

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FirmRankError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base,
            qualifier: config.query_qualifier.clone(),
        })
    }

    /// Search page URL for a firm.
    pub fn search_url(&self, firm_name: &str) -> Result<Url> {
        let mut url = self
            .base
            .join("/w/index.php")
            .map_err(|e| FirmRankError::validation(format!("bad search URL: {e}")))?;

        let query = if self.qualifier.trim().is_empty() {
            firm_name.trim().to_string()
        } else {
            format!("{} {}", firm_name.trim(), self.qualifier.trim())
        };
        url.query_pairs_mut().append_pair("search", &query);
        Ok(url)
    }

    /// Canonical page guess used when the search has no hits.
    pub fn fallback_url(&self, firm_name: &str) -> Result<Url> {
        let title = firm_name.trim().replace(' ', "_");
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| {
                FirmRankError::validation(format!("base URL cannot hold a path: {}", self.base))
            })?
            .clear()
            .push("wiki")
            .push(&title);
        Ok(url)
    }

    /// Look a firm up, surfacing the reason when nothing could be fetched.
    #[instrument(skip(self), fields(base = %self.base))]
    pub async fn lookup(&self, firm_name: &str) -> Result<LookupResult> {
        let search_url = self.search_url(firm_name)?;
        debug!(%search_url, "searching");

        let search_html = fetch_html(&self.client, &search_url).await?;

        let page_url = match first_search_hit(&search_html, &self.base) {
            Some(hit) => hit,
            None => {
                let guess = self.fallback_url(firm_name)?;
                debug!(%guess, "no search hits, guessing page");
                guess
            }
        };

        let page_html = fetch_html(&self.client, &page_url).await?;
        let result = parse_firm_page(&page_html, &page_url);

        debug!(
            url = %result.reference_url,
            has_aum = !result.aum.is_empty(),
            has_hq = !result.headquarters.is_empty(),
            "page parsed"
        );

        Ok(result)
    }
}

impl FirmLookup for WikiLookupClient {
    async fn fetch(&self, firm_name: &str) -> Option<LookupResult> {
        match self.lookup(firm_name).await {
            Ok(result) => Some(result),
            Err(e) => {
                info!(firm = firm_name, error = %e, "lookup failed, treating as not found");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Fetch a URL and return its body, rejecting non-success statuses.
async fn fetch_html(client: &Client, url: &Url) -> Result<String> {
    let response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| FirmRankError::Network(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FirmRankError::Network(format!("{url}: HTTP {status}")));
    }

    if let Some(len) = response.content_length() {
        if len > MAX_RESPONSE_SIZE {
            return Err(FirmRankError::validation(format!(
                "{url}: response too large ({len} bytes, max {MAX_RESPONSE_SIZE})"
            )));
        }
    }

    response
        .text()
        .await
        .map_err(|e| FirmRankError::Network(format!("{url}: failed to read body: {e}")))
}
