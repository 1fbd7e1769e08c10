//! Workbook I/O: calamine for reading, rust_xlsxwriter for writing.
//!
//! Cell styles are not carried across a load/save cycle. Values and formulas
//! are, for every sheet in the workbook.

use std::path::Path;

use calamine::{Data, Range, Reader, open_workbook_auto};
use rust_xlsxwriter::{Format, Formula, Workbook, Worksheet};
use tracing::{debug, info, instrument};

use firmrank_shared::{FirmRankError, Result};

use crate::cell::has_time;
use crate::{CellValue, Dataset, RawSheet, SheetSlot};

impl Dataset {
    /// Load the named sheet of a workbook as the data sheet.
    ///
    /// Every other sheet is kept as-is so [`Dataset::save`] can write it back.
    #[instrument(skip_all, fields(path = %path.display(), sheet = %sheet))]
    pub fn load(path: &Path, sheet: &str) -> Result<Self> {
        if !path.exists() {
            return Err(FirmRankError::dataset(format!(
                "Input workbook not found: {}",
                path.display()
            )));
        }

        let mut workbook = open_workbook_auto(path).map_err(|e| {
            FirmRankError::Spreadsheet(format!("failed to open {}: {e}", path.display()))
        })?;

        let names = workbook.sheet_names().to_vec();
        if !names.iter().any(|n| n == sheet) {
            return Err(FirmRankError::dataset(format!(
                "Sheet '{sheet}' not found in {} (available: {})",
                path.display(),
                names.join(", ")
            )));
        }

        let mut slots = Vec::with_capacity(names.len());
        let mut data: Option<RawSheet> = None;

        for name in &names {
            let values = workbook.worksheet_range(name).map_err(|e| {
                FirmRankError::Spreadsheet(format!("failed to read sheet '{name}': {e}"))
            })?;
            // Some formats (csv, ods without formulas) have none; treat as empty.
            let formulas = workbook.worksheet_formula(name).ok();

            let raw = merge_sheet(name, &values, formulas.as_ref());
            debug!(sheet = %name, rows = raw.cells.len(), "read sheet");

            if name == sheet {
                data = Some(raw);
                slots.push(SheetSlot::Data);
            } else {
                slots.push(SheetSlot::Other(raw));
            }
        }

        let data =
            data.ok_or_else(|| FirmRankError::dataset(format!("Sheet '{sheet}' not found")))?;
        let mut rows = data.cells.into_iter();
        let headers: Vec<String> = rows
            .next()
            .unwrap_or_default()
            .iter()
            .map(|c| c.as_text().trim().to_string())
            .collect();

        let dataset = Self::assemble(data.name, data.origin, headers, rows.collect(), slots)?;
        info!(
            rows = dataset.row_count(),
            columns = dataset.headers().len(),
            "dataset loaded"
        );
        Ok(dataset)
    }

    /// Write the whole workbook to `path`, data sheet included.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut workbook = Workbook::new();

        for slot in &self.sheets {
            match slot {
                SheetSlot::Data => {
                    let worksheet = add_named_sheet(&mut workbook, &self.sheet_name)?;
                    let (row0, col0) = self.origin;
                    for (c, header) in self.headers.iter().enumerate() {
                        write_cell(worksheet, row0, col0 + c as u32, &CellValue::text(header))?;
                    }
                    for (r, row) in self.rows.iter().enumerate() {
                        let abs_row = row0 + 1 + r as u32;
                        for (c, cell) in row.iter().enumerate() {
                            write_cell(worksheet, abs_row, col0 + c as u32, cell)?;
                        }
                    }
                }
                SheetSlot::Other(raw) => {
                    let worksheet = add_named_sheet(&mut workbook, &raw.name)?;
                    write_block(worksheet, raw.origin, &raw.cells)?;
                }
            }
        }

        ensure_parent(path)?;
        workbook.save(path).map_err(|e| {
            FirmRankError::Spreadsheet(format!("failed to save {}: {e}", path.display()))
        })?;
        info!(sheets = self.sheets.len(), "workbook saved");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Report output
// ---------------------------------------------------------------------------

/// A single-sheet report: a criteria preamble, then a table.
#[derive(Debug, Clone, Default)]
pub struct ReportSheet {
    pub name: String,
    /// Label/value pairs written above the table.
    pub preamble: Vec<(String, String)>,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

/// Write a report workbook, replacing any file at `path`.
#[instrument(skip_all, fields(path = %path.display(), rows = report.rows.len()))]
pub fn write_report(path: &Path, report: &ReportSheet) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = add_named_sheet(&mut workbook, &report.name)?;
    let bold = Format::new().set_bold();

    let mut row = 0u32;
    for (label, value) in &report.preamble {
        write_cell(worksheet, row, 0, &CellValue::text(label))?;
        write_cell(worksheet, row, 1, &CellValue::text(value))?;
        row += 1;
    }
    // Blank spacer between criteria and table.
    if !report.preamble.is_empty() {
        row += 1;
    }

    for (c, header) in report.headers.iter().enumerate() {
        worksheet
            .write_string_with_format(row, column_index(c as u32)?, header, &bold)
            .map_err(|e| FirmRankError::Spreadsheet(format!("failed to write header: {e}")))?;
    }
    row += 1;

    write_block(worksheet, (row, 0), &report.rows)?;

    ensure_parent(path)?;
    workbook.save(path).map_err(|e| {
        FirmRankError::Spreadsheet(format!("failed to save {}: {e}", path.display()))
    })?;
    info!("report written");
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Combine a value range and an optional formula range by absolute position.
fn merge_sheet(name: &str, values: &Range<Data>, formulas: Option<&Range<String>>) -> RawSheet {
    let formulas = formulas.filter(|f| f.start().is_some());

    let bounds = [values.start().zip(values.end()), formulas.and_then(|f| f.start().zip(f.end()))];
    let mut start: Option<(u32, u32)> = None;
    let mut end: Option<(u32, u32)> = None;
    for (s, e) in bounds.into_iter().flatten() {
        start = Some(start.map_or(s, |(r, c)| (r.min(s.0), c.min(s.1))));
        end = Some(end.map_or(e, |(r, c)| (r.max(e.0), c.max(e.1))));
    }

    let (Some(start), Some(end)) = (start, end) else {
        return RawSheet {
            name: name.to_string(),
            origin: (0, 0),
            cells: Vec::new(),
        };
    };

    let mut cells = Vec::with_capacity((end.0 - start.0 + 1) as usize);
    for r in start.0..=end.0 {
        let mut row = Vec::with_capacity((end.1 - start.1 + 1) as usize);
        for c in start.1..=end.1 {
            let value = values
                .get_value((r, c))
                .map(CellValue::from)
                .unwrap_or_default();
            let formula = formulas
                .and_then(|f| f.get_value((r, c)))
                .map(|f| f.trim())
                .filter(|f| !f.is_empty());

            row.push(match formula {
                Some(expr) => CellValue::Formula {
                    expr: expr.trim_start_matches('=').to_string(),
                    cached: Box::new(value),
                },
                None => value,
            });
        }
        cells.push(row);
    }

    RawSheet {
        name: name.to_string(),
        origin: start,
        cells,
    }
}

fn add_named_sheet<'a>(workbook: &'a mut Workbook, name: &str) -> Result<&'a mut Worksheet> {
    workbook
        .add_worksheet()
        .set_name(name)
        .map_err(|e| FirmRankError::Spreadsheet(format!("failed to create sheet '{name}': {e}")))
}

fn write_block(
    worksheet: &mut Worksheet,
    origin: (u32, u32),
    cells: &[Vec<CellValue>],
) -> Result<()> {
    for (r, row) in cells.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            write_cell(worksheet, origin.0 + r as u32, origin.1 + c as u32, cell)?;
        }
    }
    Ok(())
}

fn write_cell(worksheet: &mut Worksheet, row: u32, col: u32, cell: &CellValue) -> Result<()> {
    let col = column_index(col)?;
    let written = match cell {
        CellValue::Empty => return Ok(()),
        CellValue::Text(s) if s.is_empty() => return Ok(()),
        CellValue::Text(s) => worksheet.write_string(row, col, s).map(|_| ()),
        CellValue::Number(n) => worksheet.write_number(row, col, *n).map(|_| ()),
        CellValue::Bool(b) => worksheet.write_boolean(row, col, *b).map(|_| ()),
        CellValue::Date(serial) => {
            let pattern = if has_time(*serial) { "yyyy-mm-dd hh:mm:ss" } else { "yyyy-mm-dd" };
            let format = Format::new().set_num_format(pattern);
            worksheet.write_number_with_format(row, col, *serial, &format).map(|_| ())
        }
        CellValue::Formula { expr, cached } => {
            let formula = Formula::new(format!("={expr}")).set_result(cached.as_text());
            worksheet.write_formula(row, col, formula).map(|_| ())
        }
    };
    written.map_err(|e| {
        FirmRankError::Spreadsheet(format!("failed to write cell ({row}, {col}): {e}"))
    })
}

fn column_index(col: u32) -> Result<u16> {
    u16::try_from(col)
        .map_err(|_| FirmRankError::Spreadsheet(format!("column {col} exceeds the sheet width")))
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent).map_err(|e| FirmRankError::io(parent, e))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::{LAST_ENRICHED_COLUMN, RequiredColumn, WEBSITE_COLUMN};

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("firmrank-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    /// Builds a two-sheet workbook with a formula in the data sheet.
    fn write_fixture(path: &Path) {
        let mut wb = Workbook::new();

        let notes = wb.add_worksheet().set_name("Notes").unwrap();
        notes.write_string(0, 0, "Source").unwrap();
        notes.write_string(1, 0, "PEI 300, 2024 edition").unwrap();
        let date = Format::new().set_num_format("yyyy-mm-dd");
        notes.write_number_with_format(2, 0, 45292.0, &date).unwrap();

        let data = wb.add_worksheet().set_name("PEI 300").unwrap();
        let headers = [
            "Rank",
            "Firm Name",
            "Region",
            "Primary Focus",
            "Capital Raised (USD M, 2020\u{2013}24)",
            "Latest Fund Size (USD B)",
            "AUM (USD B)",
            "Double Fund",
        ];
        for (c, h) in headers.iter().enumerate() {
            data.write_string(0, c as u16, *h).unwrap();
        }
        data.write_number(1, 0, 1.0).unwrap();
        data.write_string(1, 1, "Blackstone").unwrap();
        data.write_string(1, 2, "North America").unwrap();
        data.write_string(1, 3, "Buyout").unwrap();
        data.write_number(1, 4, 52000.0).unwrap();
        data.write_number(1, 5, 30.4).unwrap();
        data.write_number(1, 6, 1000.0).unwrap();
        data.write_formula(1, 7, Formula::new("=F2*2").set_result("60.8")).unwrap();

        data.write_number(2, 0, 2.0).unwrap();
        data.write_string(2, 1, "Hillhouse").unwrap();

        wb.save(path).unwrap();
    }

    #[test]
    fn load_reads_data_sheet_and_formulas() {
        let dir = temp_dir();
        let path = dir.join("firms.xlsx");
        write_fixture(&path);

        let ds = Dataset::load(&path, "PEI 300").unwrap();
        assert_eq!(ds.row_count(), 2);
        assert_eq!(ds.text(0, ds.required(RequiredColumn::FirmName)), "Blackstone");

        let double = ds.column("Double Fund").unwrap();
        let cell = ds.cell(0, double).unwrap();
        assert!(cell.is_formula());
        assert_eq!(cell.as_number(), 60.8);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_sheet_is_fatal() {
        let dir = temp_dir();
        let path = dir.join("firms.xlsx");
        write_fixture(&path);

        let err = Dataset::load(&path, "Sheet9").unwrap_err();
        assert!(err.to_string().contains("Sheet 'Sheet9' not found"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_file_is_fatal() {
        let err = Dataset::load(Path::new("/nonexistent/firms.xlsx"), "PEI 300").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn save_preserves_other_sheets_and_new_columns() {
        let dir = temp_dir();
        let input = dir.join("firms.xlsx");
        let output = dir.join("out").join("firms_enriched.xlsx");
        write_fixture(&input);

        let mut ds = Dataset::load(&input, "PEI 300").unwrap();
        let website = ds.ensure_column(WEBSITE_COLUMN);
        let stamp = ds.ensure_column(LAST_ENRICHED_COLUMN);
        let aum = ds.required(RequiredColumn::Aum);
        ds.write_field(1, aum, CellValue::Number(103.0)).unwrap();
        ds.write_field(1, website, CellValue::text("https://www.hillhouseinvestment.com/"))
            .unwrap();
        ds.write_field(1, stamp, CellValue::text("2026-10-18T09:30:00+00:00"))
            .unwrap();
        ds.save(&output).unwrap();

        let reloaded = Dataset::load(&output, "PEI 300").unwrap();
        assert_eq!(reloaded.headers().len(), 10);
        assert_eq!(reloaded.number(1, reloaded.required(RequiredColumn::Aum)), 103.0);
        assert_eq!(
            reloaded.text(1, reloaded.column(WEBSITE_COLUMN).unwrap()),
            "https://www.hillhouseinvestment.com/"
        );
        // Untouched row and formula survive.
        assert_eq!(reloaded.number(0, reloaded.required(RequiredColumn::Aum)), 1000.0);
        let double = reloaded.column("Double Fund").unwrap();
        assert!(reloaded.cell(0, double).unwrap().is_formula());

        let mut wb = open_workbook_auto(&output).unwrap();
        assert_eq!(wb.sheet_names().to_vec(), vec!["Notes".to_string(), "PEI 300".to_string()]);
        let notes = wb.worksheet_range("Notes").unwrap();
        assert_eq!(
            notes.get_value((1, 0)),
            Some(&Data::String("PEI 300, 2024 edition".into()))
        );
        // Dates keep a date format instead of turning into serial numbers.
        match notes.get_value((2, 0)) {
            Some(Data::DateTime(dt)) => assert_eq!(dt.as_f64(), 45292.0),
            other => panic!("expected a date cell, got {other:?}"),
        }

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn report_layout() {
        let dir = temp_dir();
        let path = dir.join("report.xlsx");
        let report = ReportSheet {
            name: "Results".into(),
            preamble: vec![
                ("Region equals".into(), "Europe".into()),
                ("Min AUM (USD B)".into(), "10".into()),
            ],
            headers: vec!["Rank".into(), "Firm Name".into()],
            rows: vec![vec![CellValue::Number(4.0), CellValue::text("CVC")]],
        };
        write_report(&path, &report).unwrap();

        let mut wb = open_workbook_auto(&path).unwrap();
        let range = wb.worksheet_range("Results").unwrap();
        assert_eq!(range.get_value((0, 0)), Some(&Data::String("Region equals".into())));
        assert_eq!(range.get_value((1, 1)), Some(&Data::String("10".into())));
        assert_eq!(range.get_value((3, 1)), Some(&Data::String("Firm Name".into())));
        assert_eq!(range.get_value((4, 1)), Some(&Data::String("CVC".into())));

        std::fs::remove_dir_all(&dir).ok();
    }
}
