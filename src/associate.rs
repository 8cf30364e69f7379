//! Workbook associator: joins spreadsheet rows to harvested documents.
//!
//! Data sheets follow a fixed column layout agreed with the capture tool:
//! columns 0–2 identify the page (document type, page, filename) and every
//! second column from 6 onwards holds a key-value cell, keyed by its header.
//! Workbooks that deviate from this layout are joined anyway and produce
//! meaningless records; the layout is not validated.

use tracing::{debug, info};

use crate::contract::{Attribute, KeyValueRecord, ResultTree};
use crate::workbook::{Sheet, Workbook};

pub const IDENTITY_COLUMNS: usize = 3;
pub const FILENAME_COLUMN: usize = 2;
pub const FIRST_VALUE_COLUMN: usize = 6;
pub const VALUE_COLUMN_STEP: usize = 2;

/// Attaches one record per matching row of every data sheet of `workbook`
/// to the documents of `batch` in `tree`.
///
/// Sheet 0 is the summary sheet and is never joined; a workbook with only a
/// summary contributes nothing. Rows naming a document that is not in the
/// batch are dropped. Records are appended, so associating the same
/// workbook twice duplicates them.
pub fn associate(workbook: &Workbook, batch: &str, tree: &mut ResultTree) {
    if workbook.sheet_count() < 2 {
        debug!(workbook = %workbook.source, "[ASSOCIATE] Summary-only workbook, nothing to join");
        return;
    }

    let mut attached = 0usize;
    let mut dropped = 0usize;

    for sheet in &workbook.sheets[1..] {
        if sheet.data_rows().is_empty() {
            debug!(
                workbook = %workbook.source,
                sheet = %sheet.name,
                "[ASSOCIATE] Empty sheet skipped"
            );
            continue;
        }
        for row in sheet.data_rows() {
            let Some(record) = row_record(sheet, row) else {
                dropped += 1;
                continue;
            };
            let filename = record.filename.clone();
            if tree.attach_record(batch, record) {
                attached += 1;
            } else {
                debug!(
                    batch = %batch,
                    filename = %filename,
                    "[ASSOCIATE] No document for row, dropped"
                );
                dropped += 1;
            }
        }
    }

    info!(
        workbook = %workbook.source,
        batch = %batch,
        attached,
        dropped,
        "[ASSOCIATE] Workbook joined"
    );
}

fn column_name(sheet: &Sheet, index: usize) -> String {
    sheet
        .header()
        .get(index)
        .cloned()
        .flatten()
        .unwrap_or_else(|| format!("Unnamed: {index}"))
}

/// Builds the record for one data row; `None` when the row has no filename.
fn row_record(sheet: &Sheet, row: &[Option<String>]) -> Option<KeyValueRecord> {
    let filename = row.get(FILENAME_COLUMN).cloned().flatten()?;
    let cell = |index: usize| row.get(index).cloned().flatten();

    let identity = (0..IDENTITY_COLUMNS)
        .map(|i| Attribute::new(column_name(sheet, i), cell(i)))
        .collect();

    let width = sheet.header().len().max(row.len());
    let attributes = (FIRST_VALUE_COLUMN..width)
        .step_by(VALUE_COLUMN_STEP)
        .map(|i| Attribute::new(column_name(sheet, i), cell(i)))
        .collect();

    Some(KeyValueRecord {
        filename,
        identity,
        attributes,
    })
}
