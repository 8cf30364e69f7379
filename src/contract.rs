//! # contract: data model and seams of the harvest pipeline
//!
//! This module holds the plain data types that flow between the pipeline
//! stages and the two traits the rest of the crate is written against:
//!
//! - [`SourceBackend`]: listing and reading over one storage medium. The
//!   local filesystem and the remote FTP(S) session both implement it.
//! - [`Publisher`]: the hand-off to whatever stores the harvested documents.
//!   Uploading to a document store lives outside this crate; the
//!   [`crate::publish::ExportPublisher`] writes to a local directory instead.
//!
//! ## Mocking & Testing
//! Both traits are annotated for `mockall` (behind `test-export-mocks`) so the
//! locator, harvester and publish step can be driven without a real server.

use std::collections::BTreeMap;

use async_trait::async_trait;
use mockall::automock;
use serde::Serialize;

use crate::error::SourceError;

/// Uniform listing/read operations over one storage medium.
///
/// Paths are opaque strings scoped to the backend that produced them.
/// Listing returns child paths that can be passed straight back into
/// `list`, `is_dir` or `read_all`.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait SourceBackend: Send {
    /// Child paths of `path`, in listing order.
    fn list(&mut self, path: &str) -> Result<Vec<String>, SourceError>;

    fn is_dir(&mut self, path: &str) -> Result<bool, SourceError>;

    /// Full byte content of the file at `path`.
    fn read_all(&mut self, path: &str) -> Result<Vec<u8>, SourceError>;

    /// Whether a listed entry is a real path worth considering. Remote
    /// listings can carry noise entries; local listings never do.
    fn accepts_entry(&self, path: &str) -> bool;
}

/// One extracted renderable file.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentEntry {
    /// Display filename: last path segment with the searchable-PDF suffix removed.
    pub filename: String,
    /// Path of the entry inside its archive.
    pub archive_path: String,
    pub content: Vec<u8>,
}

/// A single named cell value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    pub key: String,
    pub value: Option<String>,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: Option<String>) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// One workbook row's key-value data, tagged with the filename it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyValueRecord {
    pub filename: String,
    /// The identity block (document type, page, filename) as named by the sheet header.
    pub identity: Vec<Attribute>,
    /// Key-value cells in column order.
    pub attributes: Vec<Attribute>,
}

impl KeyValueRecord {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .and_then(|a| a.value.as_deref())
    }
}

/// A document together with every record joined to it.
#[derive(Debug, Clone, PartialEq)]
pub struct HarvestedDocument {
    pub document: DocumentEntry,
    /// Empty until at least one workbook row matches the document's filename.
    pub records: Vec<KeyValueRecord>,
}

/// Documents of one batch, keyed by display filename.
pub type Batch = BTreeMap<String, HarvestedDocument>;

/// The artifact produced by a pipeline run: batch id → filename → document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTree {
    batches: BTreeMap<String, Batch>,
}

impl ResultTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch(&self, batch: &str) -> Option<&Batch> {
        self.batches.get(batch)
    }

    pub fn document(&self, batch: &str, filename: &str) -> Option<&HarvestedDocument> {
        self.batches.get(batch).and_then(|b| b.get(filename))
    }

    /// Records a document under `batch`, replacing any earlier document with
    /// the same display filename.
    pub fn insert_document(&mut self, batch: &str, document: DocumentEntry) {
        let documents = self.batches.entry(batch.to_string()).or_default();
        documents.insert(
            document.filename.clone(),
            HarvestedDocument {
                document,
                records: Vec::new(),
            },
        );
    }

    /// Appends `record` to the document it names within `batch`.
    /// Returns false, leaving the tree untouched, when no such document exists.
    pub fn attach_record(&mut self, batch: &str, record: KeyValueRecord) -> bool {
        match self
            .batches
            .get_mut(batch)
            .and_then(|b| b.get_mut(&record.filename))
        {
            Some(entry) => {
                entry.records.push(record);
                true
            }
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    pub fn document_count(&self) -> usize {
        self.batches.values().map(|b| b.len()).sum()
    }

    pub fn record_count(&self) -> usize {
        self.batches
            .values()
            .flat_map(|b| b.values())
            .map(|d| d.records.len())
            .sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Batch)> {
        self.batches.iter()
    }
}

/// What a publisher reports back for one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedItem {
    pub batch: String,
    pub filename: String,
    /// Where the document ended up (a path, URL or remote id).
    pub location: String,
    pub records: usize,
}

/// Trait for handing harvested documents to a storage destination.
///
/// Implementors own their transport and authentication; the pipeline only
/// hands over the batch id, the display filename and the joined document.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(
        &self,
        batch: &str,
        filename: &str,
        document: &HarvestedDocument,
    ) -> Result<PublishedItem, Box<dyn std::error::Error + Send + Sync>>;
}
