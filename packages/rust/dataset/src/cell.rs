//! Cell values as read from, and written back to, a workbook.

use calamine::Data;
use chrono::{NaiveDate, TimeDelta};

use firmrank_shared::parse_cell_number;

/// One spreadsheet cell.
///
/// Formulas keep their source expression together with the result cached in
/// the file, so a round-trip through [`crate::Dataset::save`] re-emits the
/// formula rather than a frozen value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// Excel serial date (1900 date system), re-written with a date format.
    Date(f64),
    Formula {
        /// Expression without the leading `=`.
        expr: String,
        /// Last computed result stored in the file.
        cached: Box<CellValue>,
    },
}

impl CellValue {
    /// Convenience constructor for text cells.
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// True for empty cells, whitespace-only text, and formulas whose
    /// cached result is blank.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(_) | Self::Bool(_) | Self::Date(_) => false,
            Self::Formula { cached, .. } => cached.is_blank(),
        }
    }

    /// Display text. Whole numbers render without a decimal point.
    pub fn as_text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.clone(),
            Self::Number(n) => format_number(*n),
            Self::Bool(true) => "TRUE".to_string(),
            Self::Bool(false) => "FALSE".to_string(),
            Self::Date(serial) => format_serial_date(*serial),
            Self::Formula { cached, .. } => cached.as_text(),
        }
    }

    /// Non-negative numeric value; anything unusable reads as `0.0`.
    ///
    /// Formulas evaluate to their cached result.
    pub fn as_number(&self) -> f64 {
        match self {
            Self::Number(n) | Self::Date(n) if n.is_finite() && *n > 0.0 => *n,
            Self::Number(_) | Self::Date(_) | Self::Empty | Self::Bool(_) => 0.0,
            Self::Text(s) => parse_cell_number(s),
            Self::Formula { cached, .. } => cached.as_number(),
        }
    }

    pub fn is_formula(&self) -> bool {
        matches!(self, Self::Formula { .. })
    }
}

impl From<&Data> for CellValue {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => Self::Empty,
            Data::String(s) if s.is_empty() => Self::Empty,
            Data::String(s) => Self::Text(s.clone()),
            Data::Float(f) => Self::Number(*f),
            Data::Int(i) => Self::Number(*i as f64),
            Data::Bool(b) => Self::Bool(*b),
            Data::DateTime(dt) if dt.is_duration() => Self::Number(dt.as_f64()),
            Data::DateTime(dt) => Self::Date(dt.as_f64()),
            other => Self::Text(other.to_string()),
        }
    }
}

/// Whether a serial date carries a time of day.
pub(crate) fn has_time(serial: f64) -> bool {
    serial.fract().abs() > f64::EPSILON
}

/// ISO rendering of an Excel serial date. Out-of-range serials fall back to
/// the plain number.
fn format_serial_date(serial: f64) -> String {
    let seconds = (serial * 86_400.0).round() as i64;
    let stamp = NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|epoch| epoch.and_hms_opt(0, 0, 0))
        .and_then(|epoch| epoch.checked_add_signed(TimeDelta::try_seconds(seconds)?));

    match stamp {
        Some(dt) if has_time(serial) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        Some(dt) => dt.format("%Y-%m-%d").to_string(),
        None => format_number(serial),
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}
