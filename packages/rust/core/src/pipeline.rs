//! End-to-end workflows: load → enrich → save → filter/rank → report.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{info, instrument};

use firmrank_dataset::{Dataset, write_report};
use firmrank_lookup::FirmLookup;
use firmrank_shared::{Criteria, EnrichmentConfig, FirmRecord, Result};

use crate::enrichment::{self, EnrichmentProgress, EnrichmentSummary};
use crate::report;

/// Number of ranked firms echoed back to the operator.
pub const TOP_ROWS: usize = 12;

/// Where a workflow reads and writes.
#[derive(Debug, Clone)]
pub struct WorkbookPaths {
    /// Source workbook.
    pub input: PathBuf,
    /// Data sheet inside the source workbook.
    pub sheet: String,
    /// Destination of the enriched workbook. May equal `input`.
    pub enriched: PathBuf,
    /// Destination of the report workbook.
    pub report: PathBuf,
}

/// `<dir>/<stem>_enriched.xlsx` next to the input.
pub fn default_enriched_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dataset".to_string());
    input.with_file_name(format!("{stem}_enriched.xlsx"))
}

/// Configuration for [`run`].
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub paths: WorkbookPaths,
    /// Skip the enrichment pass entirely.
    pub enrich: bool,
    pub enrichment: EnrichmentConfig,
    pub criteria: Criteria,
}

/// Result of writing a report.
#[derive(Debug, Clone)]
pub struct ReportOutcome {
    pub path: PathBuf,
    /// Number of firms that passed the filters.
    pub matched: usize,
    /// The highest-ranked firms, at most [`TOP_ROWS`].
    pub top: Vec<FirmRecord>,
}

/// Result of the full [`run`] workflow.
#[derive(Debug)]
pub struct RunResult {
    /// `None` when enrichment was skipped.
    pub enrichment: Option<EnrichmentSummary>,
    /// Path the enriched workbook was saved to, if it was saved.
    pub enriched_path: Option<PathBuf>,
    pub report: ReportOutcome,
    pub elapsed: Duration,
}

/// Load, enrich and save. Returns the run summary.
#[instrument(skip_all, fields(input = %paths.input.display(), sheet = %paths.sheet))]
pub async fn enrich_workbook<L: FirmLookup>(
    paths: &WorkbookPaths,
    config: &EnrichmentConfig,
    lookup: &L,
    progress: &dyn EnrichmentProgress,
) -> Result<EnrichmentSummary> {
    progress.phase("Loading dataset");
    let mut dataset = Dataset::load(&paths.input, &paths.sheet)?;

    let summary = enrichment::run_enrichment(&mut dataset, lookup, config, progress).await?;

    progress.phase("Saving enriched workbook");
    dataset.save(&paths.enriched)?;
    info!(path = %paths.enriched.display(), "enriched workbook saved");

    Ok(summary)
}

/// Load, filter, rank and write the report. No network access.
#[instrument(skip_all, fields(input = %paths.input.display(), sheet = %paths.sheet))]
pub fn report_workbook(paths: &WorkbookPaths, criteria: &Criteria) -> Result<ReportOutcome> {
    let dataset = Dataset::load(&paths.input, &paths.sheet)?;
    write_dataset_report(&dataset, criteria, &paths.report)
}

/// Run the whole workflow on one in-memory dataset.
///
/// 1. Load the data sheet
/// 2. Enrich incomplete rows (unless disabled)
/// 3. Save the enriched workbook
/// 4. Filter and rank
/// 5. Write the report
#[instrument(skip_all, fields(input = %config.paths.input.display(), enrich = config.enrich))]
pub async fn run<L: FirmLookup>(
    config: &RunConfig,
    lookup: &L,
    progress: &dyn EnrichmentProgress,
) -> Result<RunResult> {
    let start = Instant::now();
    let paths = &config.paths;

    progress.phase("Loading dataset");
    let mut dataset = Dataset::load(&paths.input, &paths.sheet)?;

    let (summary, enriched_path) = if config.enrich {
        let summary =
            enrichment::run_enrichment(&mut dataset, lookup, &config.enrichment, progress).await?;

        progress.phase("Saving enriched workbook");
        dataset.save(&paths.enriched)?;
        (Some(summary), Some(paths.enriched.clone()))
    } else {
        info!("enrichment disabled");
        (None, None)
    };

    progress.phase("Ranking firms");
    let report = write_dataset_report(&dataset, &config.criteria, &paths.report)?;

    let result = RunResult {
        enrichment: summary,
        enriched_path,
        report,
        elapsed: start.elapsed(),
    };

    info!(
        matched = result.report.matched,
        elapsed_ms = result.elapsed.as_millis(),
        "run complete"
    );

    Ok(result)
}

fn write_dataset_report(
    dataset: &Dataset,
    criteria: &Criteria,
    path: &Path,
) -> Result<ReportOutcome> {
    let (ranked, sheet) = report::build_report(dataset, criteria);
    write_report(path, &sheet)?;

    info!(path = %path.display(), matched = ranked.len(), "report written");
    Ok(ReportOutcome {
        path: path.to_path_buf(),
        matched: ranked.len(),
        top: ranked.top(TOP_ROWS).cloned().collect(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use firmrank_dataset::{CellValue, RequiredColumn, WEBSITE_COLUMN};
    use firmrank_shared::LookupResult;

    use super::*;
    use crate::enrichment::SilentEnrichmentProgress;

    struct OneFirmLookup;

    impl FirmLookup for OneFirmLookup {
        async fn fetch(&self, firm_name: &str) -> Option<LookupResult> {
            (firm_name == "Hillhouse").then(|| LookupResult {
                reference_url: "https://en.wikipedia.org/wiki/Hillhouse_Investment".into(),
                website: "https://www.hillhouseinvestment.com/".into(),
                headquarters: "Beijing, China".into(),
                founded: "2005".into(),
                aum: "US$100 billion".into(),
                page_text: "growth equity and buyout".into(),
            })
        }
    }

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("firmrank-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    fn seed(path: &Path) {
        let headers = [
            "Rank",
            "Firm Name",
            "Region",
            "Primary Focus",
            "Capital Raised (USD M, 2020\u{2013}24)",
            "Latest Fund Size (USD B)",
            "AUM (USD B)",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let row = |rank: f64, name: &str, aum: CellValue| {
            vec![
                CellValue::Number(rank),
                CellValue::text(name),
                CellValue::Empty,
                CellValue::Empty,
                CellValue::Number(1000.0),
                CellValue::Number(5.0),
                aum,
            ]
        };
        let ds = Dataset::from_table(
            "PEI 300",
            headers,
            vec![
                row(1.0, "Blackstone", CellValue::Number(1000.0)),
                row(2.0, "Hillhouse", CellValue::Empty),
                row(3.0, "Unknown Partners", CellValue::Empty),
            ],
        )
        .unwrap();
        ds.save(path).unwrap();
    }

    fn paths(dir: &Path) -> WorkbookPaths {
        let input = dir.join("PEI300_SampleInput.xlsx");
        WorkbookPaths {
            enriched: default_enriched_path(&input),
            report: dir.join("PEI300_SortedFile.xlsx"),
            sheet: "PEI 300".into(),
            input,
        }
    }

    #[test]
    fn enriched_path_sits_next_to_input() {
        assert_eq!(
            default_enriched_path(Path::new("/data/PEI300.xlsx")),
            PathBuf::from("/data/PEI300_enriched.xlsx")
        );
    }

    #[tokio::test]
    async fn run_enriches_saves_and_reports() {
        let dir = temp_dir();
        let paths = paths(&dir);
        seed(&paths.input);

        let config = RunConfig {
            paths: paths.clone(),
            enrich: true,
            enrichment: EnrichmentConfig {
                max_rows: 50,
                delay_ms: 0,
            },
            criteria: Criteria {
                min_aum: 50.0,
                ..Default::default()
            },
        };
        let result = run(&config, &OneFirmLookup, &SilentEnrichmentProgress)
            .await
            .unwrap();

        let summary = result.enrichment.unwrap();
        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.filled, 1);
        assert_eq!(summary.not_found, 1);

        assert_eq!(result.report.matched, 2);
        assert_eq!(result.report.top[0].name, "Blackstone");
        assert_eq!(result.report.top[1].name, "Hillhouse");
        assert_eq!(result.report.top[1].region, "Asia-Pacific");

        let enriched = Dataset::load(&paths.enriched, "PEI 300").unwrap();
        assert_eq!(enriched.number(1, enriched.required(RequiredColumn::Aum)), 100.0);
        assert_eq!(
            enriched.text(1, enriched.column(WEBSITE_COLUMN).unwrap()),
            "https://www.hillhouseinvestment.com/"
        );
        assert!(paths.report.exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn run_without_enrichment_leaves_input_alone() {
        let dir = temp_dir();
        let paths = paths(&dir);
        seed(&paths.input);

        let config = RunConfig {
            paths: paths.clone(),
            enrich: false,
            enrichment: EnrichmentConfig::default(),
            criteria: Criteria::default(),
        };
        let result = run(&config, &OneFirmLookup, &SilentEnrichmentProgress)
            .await
            .unwrap();

        assert!(result.enrichment.is_none());
        assert!(result.enriched_path.is_none());
        assert!(!paths.enriched.exists());
        assert_eq!(result.report.matched, 3);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn report_workbook_missing_input_is_fatal() {
        let dir = temp_dir();
        let paths = paths(&dir);

        let err = report_workbook(&paths, &Criteria::default()).unwrap_err();
        assert!(err.to_string().contains("not found"));
        assert!(!paths.report.exists());

        std::fs::remove_dir_all(&dir).ok();
    }
}
