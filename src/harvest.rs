//! Archive harvester.
//!
//! Finds the zip archives below a located output directory and splits each
//! archive's entries into searchable PDFs and "Batch KVP Spreadsheet"
//! workbooks. Archives are read fully into memory first: zip parsing needs
//! random access, which a remote transfer cannot provide.

use std::io::{Cursor, Read};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::contract::{DocumentEntry, SourceBackend};
use crate::error::{HarvestError, SourceError};
use crate::source::entry_name;
use crate::workbook::{parse_xlsx, Workbook};

pub const ARCHIVE_SUFFIX: &str = ".zip";
/// Path segment marking searchable PDFs inside an archive.
pub const SEARCHABLE_PDF_MARKER: &str = "Searchable PDF";
/// Literal suffix the capture tool appends to searchable PDF names.
pub const SEARCHABLE_PDF_SUFFIX: &str = " - Searchable PDF.pdf";
const BATCH_SPREADSHEET_PATTERN: &str = r"^.*Batch KVP Spreadsheet\.xlsx$";

/// Largest entry that is extracted; bigger entries are skipped.
pub const MAX_ENTRY_BYTES: u64 = 512 * 1024 * 1024;
/// Deflate expands by at most about this factor.
const MAX_EXPANSION: u64 = 1032;
const MAX_RESERVE: u64 = 64 * 1024 * 1024;

/// Everything useful pulled out of one archive.
#[derive(Debug, Default)]
pub struct Harvest {
    pub archive: String,
    pub documents: Vec<DocumentEntry>,
    pub workbooks: Vec<Workbook>,
}

pub fn is_archive(path: &str) -> bool {
    entry_name(path).to_ascii_lowercase().ends_with(ARCHIVE_SUFFIX)
}

/// Batch identifier of an archive: its file name without the `.zip` suffix.
pub fn batch_id(archive_path: &str) -> String {
    let name = entry_name(archive_path);
    match name.len().checked_sub(ARCHIVE_SUFFIX.len()) {
        Some(cut) if name[cut..].eq_ignore_ascii_case(ARCHIVE_SUFFIX) => name[..cut].to_string(),
        _ => name.to_string(),
    }
}

pub fn is_document(entry: &str) -> bool {
    entry.contains(SEARCHABLE_PDF_MARKER)
}

pub fn is_batch_workbook(entry: &str) -> bool {
    static BATCH_SPREADSHEET: OnceLock<Regex> = OnceLock::new();
    BATCH_SPREADSHEET
        .get_or_init(|| Regex::new(BATCH_SPREADSHEET_PATTERN).expect("static regex"))
        .is_match(entry)
}

/// Display filename of a document entry: last path segment, searchable-PDF
/// suffix stripped when present.
pub fn display_filename(entry: &str) -> String {
    let name = entry_name(entry);
    name.strip_suffix(SEARCHABLE_PDF_SUFFIX)
        .unwrap_or(name)
        .to_string()
}

/// Collects every archive at or below `dir`, depth-first in listing order.
/// If `dir` is itself an archive it is the only result.
pub fn find_archives(
    backend: &mut dyn SourceBackend,
    dir: &str,
) -> Result<Vec<String>, SourceError> {
    if !backend.is_dir(dir)? {
        return Ok(if is_archive(dir) {
            vec![dir.to_string()]
        } else {
            Vec::new()
        });
    }

    let mut archives = Vec::new();
    let mut pending: Vec<String> = backend.list(dir)?.into_iter().rev().collect();

    while let Some(path) = pending.pop() {
        match backend.is_dir(&path) {
            Ok(true) => match backend.list(&path) {
                Ok(children) => pending.extend(children.into_iter().rev()),
                Err(e) => warn!(path = %path, error = %e, "[HARVEST] Could not list directory"),
            },
            Ok(false) if is_archive(&path) => archives.push(path),
            Ok(false) => debug!(path = %path, "[HARVEST] Ignoring non-archive file"),
            Err(e) => warn!(path = %path, error = %e, "[HARVEST] Could not stat entry"),
        }
    }

    debug!(dir = %dir, count = archives.len(), "[HARVEST] Archives found");
    Ok(archives)
}

/// Reads the archive at `archive_path` through `backend` and harvests it.
pub fn harvest(
    backend: &mut dyn SourceBackend,
    archive_path: &str,
) -> Result<Harvest, HarvestError> {
    let bytes = backend.read_all(archive_path)?;
    harvest_bytes(archive_path, bytes)
}

/// Harvests an archive already held in memory.
///
/// Fails with [`HarvestError::CorruptArchive`] when the zip container itself
/// is unreadable. Individual entries that cannot be read, and workbooks that
/// do not parse, are logged and left out.
pub fn harvest_bytes(archive_path: &str, bytes: Vec<u8>) -> Result<Harvest, HarvestError> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|source| HarvestError::CorruptArchive {
            path: archive_path.to_string(),
            source,
        })?;

    let mut harvest = Harvest {
        archive: archive_path.to_string(),
        ..Harvest::default()
    };

    for index in 0..archive.len() {
        let mut entry = match archive.by_index(index) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(archive = %archive_path, index, error = %e, "[HARVEST] Unreadable entry");
                continue;
            }
        };
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let wanted_document = is_document(&name);
        let wanted_workbook = is_batch_workbook(&name);
        if !wanted_document && !wanted_workbook {
            continue;
        }

        // Sizes in the central directory are whatever the archive claims.
        let capacity = initial_capacity(entry.size(), entry.compressed_size());
        let content = match read_entry(&mut entry, capacity, MAX_ENTRY_BYTES) {
            Ok(Some(content)) => content,
            Ok(None) => {
                warn!(
                    archive = %archive_path,
                    entry = %name,
                    limit = MAX_ENTRY_BYTES,
                    "[HARVEST] Entry too large, skipping"
                );
                continue;
            }
            Err(e) => {
                warn!(
                    archive = %archive_path,
                    entry = %name,
                    error = %e,
                    "[HARVEST] Failed to read entry"
                );
                continue;
            }
        };

        if wanted_workbook {
            match parse_xlsx(&name, content.clone()) {
                Ok(workbook) => {
                    debug!(
                        entry = %name,
                        sheets = workbook.sheet_count(),
                        "[HARVEST] Workbook loaded"
                    );
                    harvest.workbooks.push(workbook);
                }
                Err(e) => {
                    warn!(archive = %archive_path, error = %e, "[HARVEST] Skipping workbook")
                }
            }
        }
        if wanted_document {
            let filename = display_filename(&name);
            debug!(entry = %name, filename = %filename, "[HARVEST] Document extracted");
            harvest.documents.push(DocumentEntry {
                filename,
                archive_path: name,
                content,
            });
        }
    }

    info!(
        archive = %archive_path,
        documents = harvest.documents.len(),
        workbooks = harvest.workbooks.len(),
        "[HARVEST] Archive harvested"
    );
    Ok(harvest)
}

fn initial_capacity(declared: u64, compressed: u64) -> usize {
    declared
        .min(compressed.saturating_mul(MAX_EXPANSION))
        .min(MAX_RESERVE) as usize
}

/// Reads at most `limit` bytes; `None` when the entry holds more.
fn read_entry(entry: impl Read, capacity: usize, limit: u64) -> std::io::Result<Option<Vec<u8>>> {
    let mut content = Vec::with_capacity(capacity);
    entry.take(limit.saturating_add(1)).read_to_end(&mut content)?;
    Ok((content.len() as u64 <= limit).then_some(content))
}
