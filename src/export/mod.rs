//! Spreadsheet and document I/O.
//!
//! Reading goes through `calamine` (first worksheet, first row = headers);
//! writing goes through `rust_xlsxwriter` / `docx-rs`.

pub mod documents;
pub mod excel;
pub mod search_console;

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use crate::core::error::{SeoError, SeoResult};

/// The first worksheet of a workbook, split into trimmed headers and data rows.
#[derive(Debug, Clone, Default)]
pub struct SheetTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Data>>,
}

impl SheetTable {
    /// Index of the first header equal to `name` (exact match).
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell text at (`row`, `col`), empty when out of range.
    pub fn text(&self, row: &[Data], col: usize) -> String {
        row.get(col).map(cell_text).unwrap_or_default()
    }
}

/// Read the first worksheet of `path`.
pub fn read_first_sheet(path: &Path) -> SeoResult<SheetTable> {
    if !path.exists() {
        return Err(SeoError::NotFound(path.to_path_buf()));
    }
    let mut workbook = open_workbook_auto(path)?;
    let range = match workbook.worksheet_range_at(0) {
        Some(r) => r?,
        None => return Ok(SheetTable::default()),
    };

    let mut rows = range.rows();
    let headers = match rows.next() {
        Some(h) => h.iter().map(|c| cell_text(c).trim().to_string()).collect(),
        None => return Ok(SheetTable::default()),
    };
    let rows = rows.map(|r| r.to_vec()).collect();
    Ok(SheetTable { headers, rows })
}

/// Render a cell as text. Whole floats print without a fractional part.
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Numeric value of a cell; strings are parsed after trimming. `None` when not numeric.
pub fn cell_number(cell: &Data) -> Option<f64> {
    match cell {
        Data::Int(i) => Some(*i as f64),
        Data::Float(f) if f.is_finite() => Some(*f),
        Data::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Data::String(s) => s.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_text_formats_whole_floats_as_integers() {
        assert_eq!(cell_text(&Data::Float(42.0)), "42");
        assert_eq!(cell_text(&Data::Float(4.5)), "4.5");
        assert_eq!(cell_text(&Data::Empty), "");
        assert_eq!(cell_text(&Data::String("سلام".into())), "سلام");
    }

    #[test]
    fn test_cell_number_parses_strings() {
        assert_eq!(cell_number(&Data::String(" 1,234 ".into())), Some(1234.0));
        assert_eq!(cell_number(&Data::String("abc".into())), None);
        assert_eq!(cell_number(&Data::Int(7)), Some(7.0));
        assert_eq!(cell_number(&Data::Empty), None);
    }
}
