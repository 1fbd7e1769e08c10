//! Shared types, error model, and configuration for firmrank.
//!
//! This crate is the foundation depended on by all other firmrank crates.
//! It provides:
//! - [`FirmRankError`], the unified error type
//! - Domain types ([`FirmRecord`], [`LookupResult`], [`Criteria`], [`RunId`])
//! - Configuration ([`AppConfig`], [`EnrichmentConfig`], [`LookupConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DatasetConfig, EnrichmentConfig, EnrichmentSettings, LookupConfig,
    LookupSettings, config_dir, config_file_path, init_config, load_config, load_config_from,
    validate_config,
};
pub use error::{FirmRankError, Result};
pub use types::{
    Criteria, DEFAULT_PRIORITY, EnrichmentMetadata, FirmRecord, LookupResult, PriorityKey,
    RunId, parse_cell_number, parse_operator_number, parse_priority_list,
};
