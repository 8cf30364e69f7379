//! In-memory metadata workbooks.
//!
//! The harvester parses every "Batch KVP Spreadsheet" it finds into a
//! [`Workbook`] straight away, so the associator works on plain rows of
//! cell text and never touches the xlsx reader.

use std::io::Cursor;

use calamine::{Data, Reader, Xlsx};
use tracing::debug;

use crate::error::HarvestError;

/// One sheet as rows of cells; row 0 is the header row. Empty cells are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Option<String>>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    pub fn header(&self) -> &[Option<String>] {
        self.rows.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Rows below the header.
    pub fn data_rows(&self) -> &[Vec<Option<String>>] {
        self.rows.get(1..).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    /// Archive-internal path the workbook was read from.
    pub source: String,
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }
}

/// Reads an xlsx document fully into memory.
pub fn parse_xlsx(source: &str, bytes: Vec<u8>) -> Result<Workbook, HarvestError> {
    let workbook_error = |reason: String| HarvestError::Workbook {
        entry: source.to_string(),
        reason,
    };

    let mut xlsx: Xlsx<_> =
        Xlsx::new(Cursor::new(bytes)).map_err(|e| workbook_error(e.to_string()))?;

    let mut sheets = Vec::new();
    for name in xlsx.sheet_names() {
        let range = xlsx
            .worksheet_range(&name)
            .map_err(|e| workbook_error(format!("sheet {name}: {e}")))?;

        // Ranges start at the first used cell; pad so column indexes stay absolute.
        let leading = range.start().map(|(_, col)| col as usize).unwrap_or(0);
        let rows = range
            .rows()
            .map(|row| {
                std::iter::repeat(None)
                    .take(leading)
                    .chain(row.iter().map(cell_text))
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();

        debug!(workbook = %source, sheet = %name, rows = rows.len(), "Parsed sheet");
        sheets.push(Sheet::new(name, rows));
    }

    Ok(Workbook {
        source: source.to_string(),
        sheets,
    })
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) if s.is_empty() => None,
        other => Some(other.to_string()),
    }
}
