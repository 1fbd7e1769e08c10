//! Application configuration for firmrank.
//!
//! User config lives at `~/.firmrank/firmrank.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FirmRankError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "firmrank.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".firmrank";

// ---------------------------------------------------------------------------
// Config structs (matching firmrank.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Input/output workbook locations.
    #[serde(default)]
    pub dataset: DatasetConfig,

    /// Enrichment pass limits.
    #[serde(default)]
    pub enrichment: EnrichmentSettings,

    /// External lookup settings.
    #[serde(default)]
    pub lookup: LookupSettings,
}

/// `[dataset]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Source workbook.
    #[serde(default = "default_input")]
    pub input: String,

    /// Name of the data sheet inside the source workbook.
    #[serde(default = "default_sheet")]
    pub sheet: String,

    /// Filtered/ranked report workbook.
    #[serde(default = "default_report")]
    pub report: String,

    /// Where the enriched workbook is saved. Defaults to `<input stem>_enriched.xlsx`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enriched: Option<String>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            input: default_input(),
            sheet: default_sheet(),
            report: default_report(),
            enriched: None,
        }
    }
}

fn default_input() -> String {
    "PEI300_SampleInput.xlsx".into()
}
fn default_sheet() -> String {
    "PEI 300".into()
}
fn default_report() -> String {
    "PEI300_SortedFile.xlsx".into()
}

/// `[enrichment]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentSettings {
    /// Whether `run` enriches before reporting.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum candidate rows looked up per run.
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,

    /// Fixed delay in ms before each lookup.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_rows: default_max_rows(),
            delay_ms: default_delay_ms(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_max_rows() -> usize {
    50
}
fn default_delay_ms() -> u64 {
    350
}

/// `[lookup]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupSettings {
    /// Origin of the encyclopedia used for lookups.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Appended to the firm name to bias search results.
    #[serde(default = "default_query_qualifier")]
    pub query_qualifier: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for LookupSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            query_qualifier: default_query_qualifier(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_base_url() -> String {
    "https://en.wikipedia.org".into()
}
fn default_query_qualifier() -> String {
    "private equity".into()
}
fn default_timeout_secs() -> u64 {
    12
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; PEI-IA/1.0)".into()
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime enrichment configuration.
#[derive(Debug, Clone)]
pub struct EnrichmentConfig {
    /// Per-run cap on candidate rows.
    pub max_rows: usize,
    /// Delay in ms before each lookup. Zero disables throttling.
    pub delay_ms: u64,
}

impl From<&AppConfig> for EnrichmentConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_rows: config.enrichment.max_rows,
            delay_ms: config.enrichment.delay_ms,
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

/// Runtime lookup configuration.
#[derive(Debug, Clone)]
pub struct LookupConfig {
    pub base_url: String,
    pub query_qualifier: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl From<&AppConfig> for LookupConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            base_url: config.lookup.base_url.clone(),
            query_qualifier: config.lookup.query_qualifier.clone(),
            timeout_secs: config.lookup.timeout_secs,
            user_agent: config.lookup.user_agent.clone(),
        }
    }
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.firmrank/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| FirmRankError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.firmrank/firmrank.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| FirmRankError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        FirmRankError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| FirmRankError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| FirmRankError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| FirmRankError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject values the rest of the pipeline cannot work with.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.dataset.sheet.trim().is_empty() {
        return Err(FirmRankError::config("dataset.sheet must not be empty"));
    }
    if config.lookup.timeout_secs == 0 {
        return Err(FirmRankError::config("lookup.timeout_secs must be at least 1"));
    }
    if !config.lookup.base_url.starts_with("http://")
        && !config.lookup.base_url.starts_with("https://")
    {
        return Err(FirmRankError::config(format!(
            "lookup.base_url must be an http(s) URL, got '{}'",
            config.lookup.base_url
        )));
    }
    Ok(())
}
