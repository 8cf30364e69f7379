//! Hand-off of a finished [`ResultTree`] to a [`Publisher`].
//!
//! Uploading to the document store is someone else's job; this module only
//! walks the tree and calls the publisher once per document. The bundled
//! [`ExportPublisher`] writes documents and their records to a local
//! directory, which is enough to inspect a run or feed a separate uploader.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::future::try_join_all;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info};

use crate::contract::{HarvestedDocument, KeyValueRecord, PublishedItem, Publisher, ResultTree};

#[derive(Debug, Default, Serialize)]
pub struct PublishReport {
    pub items: Vec<PublishedItem>,
}

impl PublishReport {
    pub fn record_count(&self) -> usize {
        self.items.iter().map(|i| i.records).sum()
    }
}

/// Publishes every document of every batch. Documents within a batch are
/// published concurrently; the first failure stops the hand-off.
pub async fn publish_all<P>(tree: &ResultTree, publisher: &P) -> Result<PublishReport, String>
where
    P: Publisher + ?Sized,
{
    let mut report = PublishReport::default();

    for (batch, documents) in tree.iter() {
        info!(batch = %batch, documents = documents.len(), "[PUBLISH] Publishing batch");
        let uploads = documents
            .iter()
            .map(|(filename, document)| publisher.publish(batch, filename, document));
        match try_join_all(uploads).await {
            Ok(items) => report.items.extend(items),
            Err(e) => {
                error!(batch = %batch, error = ?e, "[PUBLISH][ERROR] Batch publish failed");
                return Err(format!("[PUBLISH fail @ batch={batch}]: {e}"));
            }
        }
    }

    info!(
        items = report.items.len(),
        records = report.record_count(),
        "[PUBLISH] Hand-off complete"
    );
    Ok(report)
}

/// Sidecar written next to every exported document.
#[derive(Debug, Serialize)]
struct Sidecar<'a> {
    batch: &'a str,
    filename: &'a str,
    archive_path: &'a str,
    content_hash: String,
    records: &'a [KeyValueRecord],
}

/// Writes `<dir>/<batch>/<filename>` and `<filename>.kvp.json` for each document.
#[derive(Debug, Clone)]
pub struct ExportPublisher {
    dir: PathBuf,
}

impl ExportPublisher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn path_safe(name: &str) -> String {
    name.replace('/', "_").replace('\\', "_")
}

#[async_trait]
impl Publisher for ExportPublisher {
    async fn publish(
        &self,
        batch: &str,
        filename: &str,
        document: &HarvestedDocument,
    ) -> Result<PublishedItem, Box<dyn std::error::Error + Send + Sync>> {
        let batch_dir = self.dir.join(path_safe(batch));
        tokio::fs::create_dir_all(&batch_dir).await?;

        let target = batch_dir.join(path_safe(filename));
        tokio::fs::write(&target, &document.document.content).await?;

        let content_hash = {
            let mut hasher = Sha256::new();
            hasher.update(&document.document.content);
            format!("{:x}", hasher.finalize())
        };
        let sidecar = Sidecar {
            batch,
            filename,
            archive_path: &document.document.archive_path,
            content_hash,
            records: &document.records,
        };
        let sidecar_path = batch_dir.join(format!("{}.kvp.json", path_safe(filename)));
        tokio::fs::write(&sidecar_path, serde_json::to_vec_pretty(&sidecar)?).await?;

        debug!(
            target = %target.display(),
            records = document.records.len(),
            "[PUBLISH] Exported document"
        );
        Ok(PublishedItem {
            batch: batch.to_string(),
            filename: filename.to_string(),
            location: target.display().to_string(),
            records: document.records.len(),
        })
    }
}
