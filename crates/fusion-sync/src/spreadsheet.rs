//! Spreadsheet to tab-delimited conversion
//!
//! FusionGDB2 is published as an Excel workbook. The loader only speaks
//! delimited text, so the first worksheet is written out as TSV: header row
//! kept, no synthetic row-index column.

use crate::error::{Result, SyncError};
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;
use tracing::debug;

/// Shape of a converted sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetStats {
    /// Data rows, header excluded
    pub rows: usize,
    pub columns: usize,
}

/// Convert the first worksheet of `input` into a tab-delimited `output`
pub fn convert_to_tsv(input: &Path, output: &Path) -> Result<SheetStats> {
    let mut workbook = open_workbook_auto(input)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| SyncError::Spreadsheet(format!("{} has no worksheets", input.display())))??;

    if range.is_empty() {
        return Err(SyncError::Spreadsheet(format!(
            "first worksheet of {} is empty",
            input.display()
        )));
    }

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(output)?;

    let mut rows = 0usize;
    for row in range.rows() {
        writer.write_record(row.iter().map(cell_text))?;
        rows += 1;
    }
    writer.flush()?;

    let stats = SheetStats {
        rows: rows.saturating_sub(1),
        columns: range.width(),
    };
    debug!(
        input = %input.display(),
        output = %output.display(),
        rows = stats.rows,
        columns = stats.columns,
        "Converted worksheet to TSV"
    );
    Ok(stats)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(true) => "True".to_string(),
        Data::Bool(false) => "False".to_string(),
        other => other.to_string(),
    }
}
