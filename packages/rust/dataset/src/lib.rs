//! Firm dataset held in memory, keyed by normalised column headers.
//!
//! The [`Dataset`] wraps the data sheet of a workbook: one header row, then
//! one row per firm. Columns are addressed through [`ColumnHandle`]s resolved
//! from normalised header text, so `"AUM (USD B)"` and `"aum usd b"` are the
//! same column.
//!
//! **Write rules:**
//! - Writes replace a single cell; no other cell in the row is touched.
//! - Columns are only ever appended, never removed or reordered.
//! - Rows are never added or removed.

mod cell;
mod header;
mod workbook;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::warn;

use firmrank_shared::{EnrichmentMetadata, FirmRankError, FirmRecord, Result};

pub use cell::CellValue;
pub use header::{
    ColumnHandle, FOUNDED_COLUMN, LAST_ENRICHED_COLUMN, RequiredColumn, SOURCE_URL_COLUMN,
    WEBSITE_COLUMN, normalize_header,
};
pub use workbook::{ReportSheet, write_report};

/// A sheet other than the data sheet, kept verbatim for re-saving.
#[derive(Debug, Clone)]
pub(crate) struct RawSheet {
    pub(crate) name: String,
    /// Absolute (row, col) of the top-left cell of `cells`.
    pub(crate) origin: (u32, u32),
    pub(crate) cells: Vec<Vec<CellValue>>,
}

/// Workbook sheet order, so saving reproduces the original layout.
#[derive(Debug, Clone)]
pub(crate) enum SheetSlot {
    Data,
    Other(RawSheet),
}

/// Handles for the required columns, resolved once at load.
#[derive(Debug, Clone, Copy)]
struct RequiredHandles {
    rank: ColumnHandle,
    name: ColumnHandle,
    region: ColumnHandle,
    focus: ColumnHandle,
    capital_raised: ColumnHandle,
    latest_fund_size: ColumnHandle,
    aum: ColumnHandle,
}

impl RequiredHandles {
    fn get(&self, column: RequiredColumn) -> ColumnHandle {
        match column {
            RequiredColumn::Rank => self.rank,
            RequiredColumn::FirmName => self.name,
            RequiredColumn::Region => self.region,
            RequiredColumn::PrimaryFocus => self.focus,
            RequiredColumn::CapitalRaised => self.capital_raised,
            RequiredColumn::LatestFundSize => self.latest_fund_size,
            RequiredColumn::Aum => self.aum,
        }
    }
}

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// The data sheet plus the rest of its workbook.
#[derive(Debug, Clone)]
pub struct Dataset {
    sheet_name: String,
    /// Absolute (row, col) of the header row's first cell.
    origin: (u32, u32),
    headers: Vec<String>,
    /// Normalised header → column. First occurrence wins.
    index: HashMap<String, ColumnHandle>,
    rows: Vec<Vec<CellValue>>,
    required: RequiredHandles,
    rank_index: HashMap<i64, usize>,
    sheets: Vec<SheetSlot>,
}

impl Dataset {
    /// Build a dataset from a header row and data rows.
    ///
    /// Fails when a required column is missing or two named rows share a rank.
    pub fn from_table(
        sheet_name: impl Into<String>,
        headers: Vec<String>,
        rows: Vec<Vec<CellValue>>,
    ) -> Result<Self> {
        Self::assemble(sheet_name.into(), (0, 0), headers, rows, vec![SheetSlot::Data])
    }

    pub(crate) fn assemble(
        sheet_name: String,
        origin: (u32, u32),
        headers: Vec<String>,
        mut rows: Vec<Vec<CellValue>>,
        sheets: Vec<SheetSlot>,
    ) -> Result<Self> {
        let mut index = HashMap::new();
        for (i, header) in headers.iter().enumerate() {
            let key = normalize_header(header);
            if !key.is_empty() {
                index.entry(key).or_insert(ColumnHandle(i));
            }
        }

        let required = resolve_required(&index)?;

        let width = headers.len();
        for row in &mut rows {
            row.resize(width, CellValue::Empty);
        }

        let mut dataset = Self {
            sheet_name,
            origin,
            headers,
            index,
            rows,
            required,
            rank_index: HashMap::new(),
            sheets,
        };
        dataset.rank_index = dataset.build_rank_index()?;
        Ok(dataset)
    }

    fn build_rank_index(&self) -> Result<HashMap<i64, usize>> {
        let mut ranks = HashMap::new();

        for row in 0..self.rows.len() {
            if self.text(row, self.required.name).trim().is_empty() {
                continue;
            }
            let Some(rank) = self.rank_of(row) else {
                warn!(
                    row = self.sheet_row(row),
                    rank = %self.text(row, self.required.rank),
                    "row has a firm name but no usable rank; it cannot be joined by rank"
                );
                continue;
            };
            if let Some(previous) = ranks.insert(rank, row) {
                return Err(FirmRankError::dataset(format!(
                    "duplicate rank {rank} in sheet '{}' (rows {} and {})",
                    self.sheet_name,
                    self.sheet_row(previous),
                    self.sheet_row(row)
                )));
            }
        }

        Ok(ranks)
    }

    /// 1-based sheet row number of a data row, as shown in a spreadsheet app.
    fn sheet_row(&self, row: usize) -> usize {
        self.origin.0 as usize + row + 2
    }

    // -----------------------------------------------------------------------
    // Schema
    // -----------------------------------------------------------------------

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Look a column up by any spelling of its header.
    pub fn column(&self, name: &str) -> Option<ColumnHandle> {
        self.index.get(&normalize_header(name)).copied()
    }

    /// Handle of a required column. Always present once loaded.
    pub fn required(&self, column: RequiredColumn) -> ColumnHandle {
        self.required.get(column)
    }

    /// Every column in sheet order.
    pub fn columns(&self) -> impl Iterator<Item = ColumnHandle> + '_ {
        (0..self.headers.len()).map(ColumnHandle)
    }

    /// Header text of a column.
    pub fn header(&self, column: ColumnHandle) -> &str {
        self.headers.get(column.0).map(String::as_str).unwrap_or("")
    }

    /// Return the column named `name`, appending it when absent.
    ///
    /// Idempotent: a second call with any spelling that normalises the same
    /// returns the same handle and adds nothing.
    pub fn ensure_column(&mut self, name: &str) -> ColumnHandle {
        let key = normalize_header(name);
        if let Some(handle) = self.index.get(&key) {
            return *handle;
        }

        let handle = ColumnHandle(self.headers.len());
        self.headers.push(name.to_string());
        for row in &mut self.rows {
            row.push(CellValue::Empty);
        }
        if !key.is_empty() {
            self.index.insert(key, handle);
        }
        tracing::debug!(column = name, index = handle.0, "appended column");
        handle
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Whole row, or `None` past the end.
    pub fn row(&self, row: usize) -> Option<&[CellValue]> {
        self.rows.get(row).map(Vec::as_slice)
    }

    pub fn cell(&self, row: usize, column: ColumnHandle) -> Option<&CellValue> {
        self.rows.get(row).and_then(|r| r.get(column.0))
    }

    /// Trimmed display text; empty for missing cells.
    pub fn text(&self, row: usize, column: ColumnHandle) -> String {
        self.cell(row, column)
            .map(|c| c.as_text().trim().to_string())
            .unwrap_or_default()
    }

    /// Non-negative number; `0.0` for missing or unparseable cells.
    pub fn number(&self, row: usize, column: ColumnHandle) -> f64 {
        self.cell(row, column).map(CellValue::as_number).unwrap_or(0.0)
    }

    pub fn is_blank(&self, row: usize, column: ColumnHandle) -> bool {
        self.cell(row, column).is_none_or(CellValue::is_blank)
    }

    /// Rank of a row, truncated to an integer.
    ///
    /// `None` when the cell is blank, not numeric (`"12="`, `"n/a"`) or below 1.
    pub fn rank_of(&self, row: usize) -> Option<i64> {
        let rank = self.cell(row, self.required.rank)?.as_number();
        (rank >= 1.0).then_some(rank as i64)
    }

    /// Row holding `rank`, if any.
    pub fn row_for_rank(&self, rank: i64) -> Option<usize> {
        self.rank_index.get(&rank).copied()
    }

    /// The row as a typed record. `None` for rows without a firm name.
    pub fn record(&self, row: usize) -> Option<FirmRecord> {
        let name = self.text(row, self.required.name);
        if name.is_empty() {
            return None;
        }

        Some(FirmRecord {
            rank: self.rank_of(row).unwrap_or(0),
            name,
            region: self.text(row, self.required.region),
            primary_focus: self.text(row, self.required.focus),
            capital_raised: self.number(row, self.required.capital_raised),
            latest_fund_size: self.number(row, self.required.latest_fund_size),
            aum: self.number(row, self.required.aum),
            metadata: self.metadata(row),
        })
    }

    /// All named rows in source order, paired with their row index.
    pub fn records(&self) -> Vec<(usize, FirmRecord)> {
        (0..self.rows.len())
            .filter_map(|row| self.record(row).map(|r| (row, r)))
            .collect()
    }

    /// Provenance columns for a row, when present.
    pub fn metadata(&self, row: usize) -> EnrichmentMetadata {
        let text_of = |name: &str| {
            self.column(name)
                .map(|c| self.text(row, c))
                .filter(|t| !t.is_empty())
        };

        EnrichmentMetadata {
            source_url: text_of(SOURCE_URL_COLUMN),
            website: text_of(WEBSITE_COLUMN),
            founded_year: text_of(FOUNDED_COLUMN)
                .and_then(|t| t.parse::<f64>().ok())
                .map(|y| y as i32),
            last_enriched: text_of(LAST_ENRICHED_COLUMN)
                .and_then(|t| DateTime::parse_from_rfc3339(&t).ok())
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Replace one cell.
    pub fn write_field(
        &mut self,
        row: usize,
        column: ColumnHandle,
        value: CellValue,
    ) -> Result<()> {
        let width = self.headers.len();
        let cells = self.rows.get_mut(row).ok_or_else(|| {
            FirmRankError::validation(format!("row {row} is out of range"))
        })?;
        let cell = cells.get_mut(column.0).ok_or_else(|| {
            FirmRankError::validation(format!(
                "column {} is out of range (width {width})",
                column.0
            ))
        })?;
        *cell = value;
        Ok(())
    }
}

/// Resolve every required column or fail with the first missing one.
fn resolve_required(index: &HashMap<String, ColumnHandle>) -> Result<RequiredHandles> {
    let find = |column: RequiredColumn| -> Result<ColumnHandle> {
        column
            .synonyms()
            .iter()
            .find_map(|s| index.get(&normalize_header(s)).copied())
            .ok_or_else(|| {
                FirmRankError::dataset(format!(
                    "Missing column header: '{}'",
                    column.canonical()
                ))
            })
    };

    Ok(RequiredHandles {
        rank: find(RequiredColumn::Rank)?,
        name: find(RequiredColumn::FirmName)?,
        region: find(RequiredColumn::Region)?,
        focus: find(RequiredColumn::PrimaryFocus)?,
        capital_raised: find(RequiredColumn::CapitalRaised)?,
        latest_fund_size: find(RequiredColumn::LatestFundSize)?,
        aum: find(RequiredColumn::Aum)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers() -> Vec<String> {
        [
            "Rank",
            "Firm Name",
            "Region",
            "Primary Focus",
            "Capital Raised (USD M, 2020\u{2013}24)",
            "Latest Fund Size (USD B)",
            "AUM (USD B)",
            "Notes",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn row(rank: f64, name: &str, aum: CellValue) -> Vec<CellValue> {
        vec![
            CellValue::Number(rank),
            CellValue::text(name),
            CellValue::text("North America"),
            CellValue::text("Buyout"),
            CellValue::text("12,000"),
            CellValue::Number(20.5),
            aum,
            CellValue::Formula {
                expr: "F2*2".into(),
                cached: Box::new(CellValue::Number(41.0)),
            },
        ]
    }

    fn sample() -> Dataset {
        Dataset::from_table(
            "PEI 300",
            headers(),
            vec![
                row(1.0, "Blackstone", CellValue::Number(1000.0)),
                row(2.0, "KKR", CellValue::Empty),
                vec![CellValue::Empty; 8],
            ],
        )
        .expect("valid table")
    }

    #[test]
    fn ensure_column_is_idempotent() {
        let mut ds = sample();
        let width = ds.headers().len();

        let first = ds.ensure_column("Website (wiki)");
        let second = ds.ensure_column("Website (wiki)");
        let third = ds.ensure_column("  website WIKI ");

        assert_eq!(first, second);
        assert_eq!(first, third);
        assert_eq!(first.index(), width);
        assert_eq!(ds.headers().len(), width + 1);
        assert_eq!(ds.row(0).unwrap().len(), width + 1);
    }

    #[test]
    fn ensure_column_returns_existing_required_column() {
        let mut ds = sample();
        let aum = ds.ensure_column("aum (usd b)");
        assert_eq!(aum, ds.required(RequiredColumn::Aum));
    }

    #[test]
    fn missing_required_column_is_fatal() {
        let mut hdrs = headers();
        hdrs.retain(|h| h != "AUM (USD B)");
        let err = Dataset::from_table("PEI 300", hdrs, vec![]).unwrap_err();
        assert!(err.to_string().contains("Missing column header: 'AUM (USD B)'"));
    }

    #[test]
    fn short_header_synonyms_are_accepted() {
        let hdrs = [
            "rank",
            "firm name",
            "region",
            "primary focus",
            "capital raised",
            "latest fund size",
            "aum",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert!(Dataset::from_table("Sheet1", hdrs, vec![]).is_ok());
    }

    #[test]
    fn duplicate_rank_is_fatal() {
        let rows = vec![
            row(3.0, "Apollo", CellValue::Empty),
            row(3.0, "Carlyle", CellValue::Empty),
        ];
        let err = Dataset::from_table("PEI 300", headers(), rows).unwrap_err();
        assert!(err.to_string().contains("duplicate rank 3"));
    }

    #[test]
    fn unusable_ranks_are_skipped_not_fatal() {
        let mut tied = row(0.0, "Apollo", CellValue::Empty);
        tied[0] = CellValue::text("12=");
        let mut unknown = row(0.0, "Carlyle", CellValue::Empty);
        unknown[0] = CellValue::text("n/a");
        let zero = row(0.0, "Ardian", CellValue::Empty);
        let rows = vec![tied, unknown, zero, row(12.0, "EQT", CellValue::Empty)];

        let ds = Dataset::from_table("PEI 300", headers(), rows).expect("loads");
        assert_eq!(ds.rank_of(0), None);
        assert_eq!(ds.rank_of(1), None);
        assert_eq!(ds.rank_of(2), None);
        assert_eq!(ds.row_for_rank(12), Some(3));
        assert_eq!(ds.records().len(), 4);
    }

    #[test]
    fn duplicate_rank_reports_sheet_rows() {
        let rows = vec![
            row(3.0, "Apollo", CellValue::Empty),
            row(3.0, "Carlyle", CellValue::Empty),
        ];
        // Header on the fourth sheet row.
        let sheets = vec![SheetSlot::Data];
        let err = Dataset::assemble("PEI 300".into(), (3, 0), headers(), rows, sheets).unwrap_err();
        assert!(err.to_string().contains("(rows 5 and 6)"), "{err}");
    }

    #[test]
    fn records_skip_unnamed_rows() {
        let ds = sample();
        let records = ds.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].1.name, "Blackstone");
        assert_eq!(records[0].1.capital_raised, 12000.0);
        assert_eq!(records[1].1.aum, 0.0);
        assert!(records[1].1.needs_enrichment());
    }

    #[test]
    fn rank_lookup() {
        let ds = sample();
        assert_eq!(ds.row_for_rank(2), Some(1));
        assert_eq!(ds.row_for_rank(99), None);
    }

    #[test]
    fn write_field_touches_one_cell() {
        let mut ds = sample();
        let aum = ds.required(RequiredColumn::Aum);
        let before = ds.row(1).unwrap().to_vec();

        ds.write_field(1, aum, CellValue::Number(553.0)).unwrap();

        let after = ds.row(1).unwrap();
        for (i, (a, b)) in before.iter().zip(after).enumerate() {
            if i == aum.index() {
                assert_eq!(b, &CellValue::Number(553.0));
            } else {
                assert_eq!(a, b);
            }
        }
    }

    #[test]
    fn write_field_out_of_range() {
        let mut ds = sample();
        let aum = ds.required(RequiredColumn::Aum);
        assert!(ds.write_field(10, aum, CellValue::Empty).is_err());
        assert!(ds.write_field(0, ColumnHandle(42), CellValue::Empty).is_err());
    }

    #[test]
    fn metadata_reads_back() {
        let mut ds = sample();
        let founded = ds.ensure_column(FOUNDED_COLUMN);
        let stamp = ds.ensure_column(LAST_ENRICHED_COLUMN);
        ds.write_field(1, founded, CellValue::Number(1976.0)).unwrap();
        ds.write_field(1, stamp, CellValue::text("2026-10-18T09:30:00+00:00"))
            .unwrap();

        let meta = ds.metadata(1);
        assert_eq!(meta.founded_year, Some(1976));
        assert!(meta.last_enriched.is_some());
        assert!(meta.website.is_none());
    }
}
