//! Input file reading
//!
//! Produces the rows of the first worksheet (or of a CSV file) as plain
//! strings, header row included. Interpretation of the cells is left to the
//! normalizer.

use anyhow::{Context, Result, bail};
use calamine::{Data, Reader, open_workbook_auto};
use std::path::Path;

/// Supported input formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Workbook,
    Csv,
}

impl InputFormat {
    /// Detect the format from the file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_lowercase();
        match extension.as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Some(InputFormat::Workbook),
            "csv" => Some(InputFormat::Csv),
            _ => None,
        }
    }
}

/// Render a cell the way it reads in the sheet
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            // Whole numbers come back from Excel as floats
            if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => {
            if *b {
                "TRUE".to_string()
            } else {
                "FALSE".to_string()
            }
        }
        Data::DateTime(dt) => dt.to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
}

/// Render a worksheet row without the empty cells the range pads it with
fn workbook_row(cells: &[Data]) -> Vec<String> {
    let len = cells
        .iter()
        .rposition(|cell| !matches!(cell, Data::Empty))
        .map_or(0, |last| last + 1);
    cells[..len].iter().map(cell_to_string).collect()
}

/// Read every row of the first worksheet of a workbook
///
/// Trailing empty cells are dropped, so a row keeps the length it was
/// written with rather than the width of the widest row.
pub fn read_workbook_rows<P: AsRef<Path>>(path: P) -> Result<Vec<Vec<String>>> {
    let path = path.as_ref();
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Failed to open spreadsheet: {}", path.display()))?;

    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range
            .with_context(|| format!("Failed to read first sheet of {}", path.display()))?,
        None => bail!("Spreadsheet has no sheets: {}", path.display()),
    };

    let rows = range.rows().map(workbook_row).collect();
    Ok(rows)
}

/// Read every record of a CSV file, header included
pub fn read_csv_rows<P: AsRef<Path>>(path: P) -> Result<Vec<Vec<String>>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record =
            record.with_context(|| format!("Failed to read CSV record {}", index + 1))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

/// Read the input file, picking the reader from its extension
pub fn read_rows<P: AsRef<Path>>(path: P) -> Result<Vec<Vec<String>>> {
    let path = path.as_ref();
    if !path.exists() {
        bail!("Input file does not exist: {}", path.display());
    }

    let rows = match InputFormat::from_path(path) {
        Some(InputFormat::Workbook) => read_workbook_rows(path)?,
        Some(InputFormat::Csv) => read_csv_rows(path)?,
        None => bail!(
            "Unsupported input file (expected .xlsx, .xls, .ods or .csv): {}",
            path.display()
        ),
    };

    log::info!("Read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}
