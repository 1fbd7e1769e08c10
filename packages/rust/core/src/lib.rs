//! Core workflows for firmrank.
//!
//! This crate ties the lookup client, field extractor and dataset layer
//! together into the enrichment pass and the filter/rank report.

pub mod enrichment;
pub mod pipeline;
pub mod report;
