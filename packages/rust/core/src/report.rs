//! Filter, rank and render the dataset as a report sheet.

use std::cmp::Ordering;

use tracing::{debug, instrument};

use firmrank_dataset::{CellValue, ColumnHandle, Dataset, ReportSheet, RequiredColumn};
use firmrank_shared::{Criteria, FirmRecord, PriorityKey};

/// Sheet name of the report workbook.
pub const REPORT_SHEET: &str = "Results";

/// A filtered, ranked view of the dataset.
#[derive(Debug, Clone)]
pub struct RankedFirms {
    /// (data row, record) pairs in rank order.
    pub firms: Vec<(usize, FirmRecord)>,
}

impl RankedFirms {
    pub fn len(&self) -> usize {
        self.firms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.firms.is_empty()
    }

    /// The first `n` records in rank order.
    pub fn top(&self, n: usize) -> impl Iterator<Item = &FirmRecord> {
        self.firms.iter().take(n).map(|(_, r)| r)
    }
}

// ---------------------------------------------------------------------------
// Filtering
// ---------------------------------------------------------------------------

/// Whether a record satisfies every criterion.
pub fn matches(record: &FirmRecord, criteria: &Criteria) -> bool {
    let region = criteria.region_equals.trim();
    if !region.is_empty() && !record.region.trim().eq_ignore_ascii_case(region) {
        return false;
    }

    if record.aum < criteria.min_aum
        || record.latest_fund_size < criteria.min_latest_fund_size
        || record.capital_raised < criteria.min_capital_raised
    {
        return false;
    }

    let focus = criteria.focus_contains.trim().to_lowercase();
    focus.is_empty() || record.primary_focus.to_lowercase().contains(&focus)
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

fn compare_by(key: PriorityKey, a: &FirmRecord, b: &FirmRecord) -> Ordering {
    match key {
        PriorityKey::Aum => b.aum.total_cmp(&a.aum),
        PriorityKey::LatestFundSize => b.latest_fund_size.total_cmp(&a.latest_fund_size),
        PriorityKey::CapitalRaised => b.capital_raised.total_cmp(&a.capital_raised),
        PriorityKey::Rank => a.rank.cmp(&b.rank),
    }
}

/// Stable sort: metrics descending, rank ascending, keys in priority order.
pub fn rank(firms: &mut [(usize, FirmRecord)], priority: &[PriorityKey]) {
    firms.sort_by(|(_, a), (_, b)| {
        priority
            .iter()
            .map(|key| compare_by(*key, a, b))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    });
}

/// Filter the dataset's named rows and rank the survivors.
#[instrument(skip_all, fields(priority = ?criteria.priority))]
pub fn select(dataset: &Dataset, criteria: &Criteria) -> RankedFirms {
    let mut firms: Vec<_> = dataset
        .records()
        .into_iter()
        .filter(|(_, record)| matches(record, criteria))
        .collect();
    rank(&mut firms, &criteria.priority);

    debug!(matched = firms.len(), "firms selected");
    RankedFirms { firms }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn priority_column(dataset: &Dataset, key: PriorityKey) -> ColumnHandle {
    let column = match key {
        PriorityKey::Aum => RequiredColumn::Aum,
        PriorityKey::LatestFundSize => RequiredColumn::LatestFundSize,
        PriorityKey::CapitalRaised => RequiredColumn::CapitalRaised,
        PriorityKey::Rank => RequiredColumn::Rank,
    };
    dataset.required(column)
}

/// Report column order: rank, the priority metrics, then every other column
/// in sheet order. No column appears twice.
pub fn column_order(dataset: &Dataset, priority: &[PriorityKey]) -> Vec<ColumnHandle> {
    let mut order = vec![dataset.required(RequiredColumn::Rank)];

    for key in priority {
        let column = priority_column(dataset, *key);
        if !order.contains(&column) {
            order.push(column);
        }
    }

    for column in dataset.columns() {
        if !order.contains(&column) {
            order.push(column);
        }
    }

    order
}

/// Label/value rows describing the criteria.
pub fn criteria_preamble(criteria: &Criteria) -> Vec<(String, String)> {
    let priority: Vec<&str> = criteria.priority.iter().map(PriorityKey::as_str).collect();

    vec![
        ("Region equals".into(), criteria.region_equals.trim().to_string()),
        ("Min AUM (USD B)".into(), format_threshold(criteria.min_aum)),
        (
            "Min Latest Fund Size (USD B)".into(),
            format_threshold(criteria.min_latest_fund_size),
        ),
        (
            "Min Capital Raised (USD M)".into(),
            format_threshold(criteria.min_capital_raised),
        ),
        ("Primary Focus contains".into(), criteria.focus_contains.trim().to_string()),
        ("Priority".into(), priority.join(", ")),
    ]
}

fn format_threshold(value: f64) -> String {
    CellValue::Number(value).as_text()
}

/// Build the report sheet for `criteria`.
///
/// Formula cells are rendered as their cached values, since column
/// references would not survive the reordering.
pub fn build_report(dataset: &Dataset, criteria: &Criteria) -> (RankedFirms, ReportSheet) {
    let ranked = select(dataset, criteria);
    let order = column_order(dataset, &criteria.priority);

    let headers = order.iter().map(|c| dataset.header(*c).to_string()).collect();
    let rows = ranked
        .firms
        .iter()
        .map(|(row, _)| {
            order
                .iter()
                .map(|c| match dataset.cell(*row, *c) {
                    Some(CellValue::Formula { cached, .. }) => (**cached).clone(),
                    Some(cell) => cell.clone(),
                    None => CellValue::Empty,
                })
                .collect()
        })
        .collect();

    let sheet = ReportSheet {
        name: REPORT_SHEET.to_string(),
        preamble: criteria_preamble(criteria),
        headers,
        rows,
    };
    (ranked, sheet)
}
