//! Enrichment orchestrator.
//!
//! Scans the dataset for firms missing their AUM figure, looks each one up
//! through a [`FirmLookup`], and merges the extracted fields back into the
//! row. Rows are processed strictly one after another with a fixed delay
//! before every lookup.

use std::time::{Duration, Instant};

use chrono::{SecondsFormat, Utc};
use tracing::{debug, info, instrument, warn};

use firmrank_dataset::{
    CellValue, ColumnHandle, Dataset, FOUNDED_COLUMN, LAST_ENRICHED_COLUMN, RequiredColumn,
    SOURCE_URL_COLUMN, WEBSITE_COLUMN,
};
use firmrank_extract::ExtractedFields;
use firmrank_lookup::FirmLookup;
use firmrank_shared::{EnrichmentConfig, FirmRankError, LookupResult, Result, RunId};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What happened to one candidate row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    /// At least one of AUM, Region or Primary Focus was written.
    Filled { fields: Vec<&'static str> },
    /// The lookup succeeded but every primary field was already populated or
    /// nothing usable was extracted. Metadata may still have been written.
    NoNewData,
    /// The lookup returned nothing.
    NotFound,
    /// Writing the row failed; the row was left untouched.
    Failed { reason: String },
}

/// Outcome for a single attempted row.
#[derive(Debug, Clone)]
pub struct RowReport {
    /// Zero-based data row.
    pub row: usize,
    pub rank: Option<i64>,
    pub firm: String,
    pub outcome: RowOutcome,
}

/// Summary of one enrichment run.
#[derive(Debug, Clone)]
pub struct EnrichmentSummary {
    pub run_id: RunId,
    /// Rows eligible for enrichment before the cap was applied.
    pub candidates: usize,
    /// Rows actually looked up.
    pub attempted: usize,
    pub filled: usize,
    pub not_found: usize,
    pub failed: usize,
    /// Eligible rows left for a later run by the cap.
    pub deferred: usize,
    pub rows: Vec<RowReport>,
    pub elapsed: Duration,
}

impl EnrichmentSummary {
    fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            candidates: 0,
            attempted: 0,
            filled: 0,
            not_found: 0,
            failed: 0,
            deferred: 0,
            rows: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    fn record(&mut self, report: RowReport) {
        match report.outcome {
            RowOutcome::Filled { .. } => self.filled += 1,
            RowOutcome::NotFound => self.not_found += 1,
            RowOutcome::Failed { .. } => self.failed += 1,
            RowOutcome::NoNewData => {}
        }
        self.rows.push(report);
    }
}

// ---------------------------------------------------------------------------
// Progress trait
// ---------------------------------------------------------------------------

/// Progress callback for enrichment operations.
pub trait EnrichmentProgress: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Row-level progress within the current phase.
    fn task_progress(&self, current: usize, total: usize, detail: &str);
}

/// No-op enrichment progress.
pub struct SilentEnrichmentProgress;

impl EnrichmentProgress for SilentEnrichmentProgress {
    fn phase(&self, _name: &str) {}
    fn task_progress(&self, _current: usize, _total: usize, _detail: &str) {}
}

// ---------------------------------------------------------------------------
// Candidate selection
// ---------------------------------------------------------------------------

/// Rows with a firm name and no usable AUM, in source order.
pub fn candidate_rows(dataset: &Dataset) -> Vec<usize> {
    let name = dataset.required(RequiredColumn::FirmName);
    let aum = dataset.required(RequiredColumn::Aum);

    (0..dataset.row_count())
        .filter(|&row| !dataset.text(row, name).is_empty() && dataset.number(row, aum) <= 0.0)
        .collect()
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Enrich up to `config.max_rows` candidate rows in place.
///
/// A row whose lookup fails or whose writes cannot be applied is left
/// unchanged and the run moves on; only dataset-level problems abort.
#[instrument(skip_all, fields(run_id = tracing::field::Empty, max_rows = config.max_rows))]
pub async fn run_enrichment<L: FirmLookup>(
    dataset: &mut Dataset,
    lookup: &L,
    config: &EnrichmentConfig,
    progress: &dyn EnrichmentProgress,
) -> Result<EnrichmentSummary> {
    let start = Instant::now();
    let mut summary = EnrichmentSummary::new(RunId::new());
    tracing::Span::current().record("run_id", tracing::field::display(&summary.run_id));

    progress.phase("Scanning for incomplete rows");
    let candidates = candidate_rows(dataset);
    summary.candidates = candidates.len();

    let selected: Vec<usize> = candidates.iter().copied().take(config.max_rows).collect();
    summary.deferred = candidates.len() - selected.len();

    info!(
        candidates = summary.candidates,
        selected = selected.len(),
        deferred = summary.deferred,
        "enrichment candidates selected"
    );

    if selected.is_empty() {
        summary.elapsed = start.elapsed();
        return Ok(summary);
    }

    let columns = MetadataColumns::ensure(dataset);
    let name_col = dataset.required(RequiredColumn::FirmName);
    let delay = Duration::from_millis(config.delay_ms);
    let total = selected.len();

    progress.phase("Looking up firms");
    for (i, &row) in selected.iter().enumerate() {
        let firm = dataset.text(row, name_col);
        let rank = dataset.rank_of(row);
        progress.task_progress(i + 1, total, &firm);

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        summary.attempted += 1;
        let result = lookup.fetch(&firm).await;
        let outcome = enrich_row(dataset, row, &firm, result.as_ref(), &columns);

        debug!(firm = %firm, ?outcome, "row processed");
        summary.record(RowReport {
            row,
            rank,
            firm,
            outcome,
        });
    }

    summary.elapsed = start.elapsed();
    info!(
        run_id = %summary.run_id,
        candidates = summary.candidates,
        attempted = summary.attempted,
        filled = summary.filled,
        not_found = summary.not_found,
        failed = summary.failed,
        deferred = summary.deferred,
        elapsed_ms = summary.elapsed.as_millis(),
        "enrichment complete"
    );

    Ok(summary)
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// Provenance columns, ensured once per run.
#[derive(Debug, Clone, Copy)]
struct MetadataColumns {
    source_url: ColumnHandle,
    website: ColumnHandle,
    founded: ColumnHandle,
    last_enriched: ColumnHandle,
}

impl MetadataColumns {
    fn ensure(dataset: &mut Dataset) -> Self {
        Self {
            source_url: dataset.ensure_column(SOURCE_URL_COLUMN),
            website: dataset.ensure_column(WEBSITE_COLUMN),
            founded: dataset.ensure_column(FOUNDED_COLUMN),
            last_enriched: dataset.ensure_column(LAST_ENRICHED_COLUMN),
        }
    }
}

/// Every write a row will receive, decided before anything is written.
#[derive(Debug, Default)]
struct WritePlan {
    writes: Vec<(ColumnHandle, CellValue)>,
    primary: Vec<&'static str>,
}

impl WritePlan {
    fn fill(&mut self, column: ColumnHandle, label: &'static str, value: CellValue) {
        self.writes.push((column, value));
        self.primary.push(label);
    }
}

/// Decide which cells of `row` the extracted fields may fill.
///
/// Primary fields are only written into empty cells. Metadata is written
/// whenever the lookup produced a value for it.
fn plan_writes(
    dataset: &Dataset,
    row: usize,
    fields: &ExtractedFields,
    columns: &MetadataColumns,
) -> WritePlan {
    let mut plan = WritePlan::default();

    let aum = dataset.required(RequiredColumn::Aum);
    let aum_missing = dataset
        .cell(row, aum)
        .is_none_or(|c| !c.is_formula() && c.as_number() <= 0.0);
    if fields.aum_billions > 0.0 && aum_missing {
        plan.fill(aum, "AUM", CellValue::Number(fields.aum_billions));
    }

    let region = dataset.required(RequiredColumn::Region);
    if !fields.region.is_empty() && dataset.is_blank(row, region) {
        plan.fill(region, "Region", CellValue::text(&fields.region));
    }

    let focus = dataset.required(RequiredColumn::PrimaryFocus);
    if !fields.focus.is_empty() && dataset.is_blank(row, focus) {
        plan.fill(focus, "Primary Focus", CellValue::text(&fields.focus));
    }

    if !fields.source_url.is_empty() {
        plan.writes
            .push((columns.source_url, CellValue::text(&fields.source_url)));
    }
    if !fields.website.is_empty() {
        plan.writes
            .push((columns.website, CellValue::text(&fields.website)));
    }
    if let Some(year) = fields.founded_year {
        plan.writes
            .push((columns.founded, CellValue::Number(f64::from(year))));
    }

    let produced_any = fields.aum_billions > 0.0
        || !fields.region.is_empty()
        || !fields.focus.is_empty()
        || !plan.writes.is_empty();
    if produced_any {
        let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        plan.writes
            .push((columns.last_enriched, CellValue::text(stamp)));
    }

    plan
}

/// Merge one lookup result into `row`. Never fails; errors become
/// [`RowOutcome::Failed`] with the row left as it was.
fn enrich_row(
    dataset: &mut Dataset,
    row: usize,
    firm: &str,
    result: Option<&LookupResult>,
    columns: &MetadataColumns,
) -> RowOutcome {
    let Some(result) = result else {
        info!(firm = %firm, "no lookup result, row left unchanged");
        return RowOutcome::NotFound;
    };

    let fields = firmrank_extract::extract(result);
    match apply_fields(dataset, row, &fields, columns) {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(firm = %firm, error = %e, "enrichment failed, row left unchanged");
            RowOutcome::Failed {
                reason: e.to_string(),
            }
        }
    }
}

/// Plan, validate, then apply all writes for one row.
fn apply_fields(
    dataset: &mut Dataset,
    row: usize,
    fields: &ExtractedFields,
    columns: &MetadataColumns,
) -> Result<RowOutcome> {
    let plan = plan_writes(dataset, row, fields, columns);

    if let Some((column, _)) = plan
        .writes
        .iter()
        .find(|(column, _)| dataset.cell(row, *column).is_none())
    {
        return Err(FirmRankError::validation(format!(
            "cell (row {row}, column {}) is outside the sheet",
            column.index()
        )));
    }

    for (column, value) in plan.writes {
        dataset.write_field(row, column, value)?;
    }

    if plan.primary.is_empty() {
        Ok(RowOutcome::NoNewData)
    } else {
        Ok(RowOutcome::Filled {
            fields: plan.primary,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
