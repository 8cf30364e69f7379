//! High-level pipeline: orchestrates locate → harvest → associate for one run.
//!
//! A run works against a single [`SourceBackend`] and produces a
//! [`ResultTree`] that the caller hands on to a publisher. Two modes:
//!   - [`RunMode::WholeTree`]: every output directory below a root (optionally
//!     scoped to one contract); each archive is its own batch, named after the
//!     archive file.
//!   - [`RunMode::SingleJob`]: the archives of one job directory
//!     (`<root>/Job <code>`), all filed under the job code.
//!
//! # Error Handling
//! Failures below the start path are contained per item: an unreadable
//! directory, a missing or corrupt archive is logged, recorded in the
//! [`RunReport`] and skipped. A missing start path, or one without any
//! output, is reported through [`RunStatus::EmptySource`]. Any other failure
//! to read the start path itself (lost login, refused data channel) fails the
//! run, so an unusable source is never mistaken for an empty one.

use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::associate::associate;
use crate::contract::{ResultTree, SourceBackend};
use crate::error::SourceError;
use crate::harvest::{batch_id, find_archives, harvest};
use crate::locate::{locate, LocatorRules};
use crate::source::join;
use crate::workbook::Workbook;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    WholeTree {
        root: String,
        contract: Option<String>,
    },
    SingleJob {
        root: String,
        job: String,
    },
}

impl RunMode {
    /// Directory the run starts from.
    pub fn start_path(&self) -> String {
        match self {
            RunMode::WholeTree {
                root,
                contract: Some(contract),
            } => join(root, contract),
            RunMode::WholeTree { root, contract: None } => root.clone(),
            RunMode::SingleJob { root, job } => join(root, &format!("Job {job}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Harvested,
    /// No output directory (or job archive) was found.
    EmptySource,
}

/// An item the run gave up on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedItem {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub archives_found: usize,
    pub archives_harvested: usize,
    pub workbooks: usize,
    pub skipped: Vec<SkippedItem>,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub tree: ResultTree,
    pub status: RunStatus,
    pub report: RunReport,
}

pub struct Pipeline<'a> {
    backend: &'a mut dyn SourceBackend,
    rules: LocatorRules,
}

impl<'a> Pipeline<'a> {
    pub fn new(backend: &'a mut dyn SourceBackend, rules: LocatorRules) -> Self {
        Self { backend, rules }
    }

    /// Runs `mode`, accumulating into `tree`. On an empty source the tree is
    /// returned unchanged.
    pub fn run(&mut self, mode: &RunMode, tree: ResultTree) -> Result<RunOutcome, SourceError> {
        let started = Instant::now();
        let start = mode.start_path();
        info!(mode = ?mode, start = %start, "[PIPELINE] Starting run");

        let mut report = RunReport::default();
        let archives = match mode {
            RunMode::WholeTree { .. } => self.archives_below_outputs(&start, &mut report)?,
            RunMode::SingleJob { .. } => self.archives_of_job(&start, &mut report)?,
        };
        info!(
            archives = archives.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "[PIPELINE] Discovery finished"
        );

        let mut outcome = if archives.is_empty() {
            warn!(start = %start, "[PIPELINE] Source is empty");
            RunOutcome {
                tree,
                status: RunStatus::EmptySource,
                report,
            }
        } else {
            let batch_of = |archive: &str| match mode {
                RunMode::SingleJob { job, .. } => job.clone(),
                RunMode::WholeTree { .. } => batch_id(archive),
            };
            let tree = self.harvest_all(&archives, batch_of, tree, &mut report);
            RunOutcome {
                tree,
                status: RunStatus::Harvested,
                report,
            }
        };

        outcome.report.elapsed = started.elapsed();
        info!(
            status = ?outcome.status,
            batches = outcome.tree.batch_count(),
            documents = outcome.tree.document_count(),
            records = outcome.tree.record_count(),
            skipped = outcome.report.skipped.len(),
            elapsed_ms = outcome.report.elapsed.as_millis() as u64,
            "[PIPELINE] Run finished"
        );
        Ok(outcome)
    }

    /// Records a missing start path as skipped; any other failure is returned.
    fn unavailable_start(
        start: &str,
        error: SourceError,
        report: &mut RunReport,
    ) -> Result<Vec<String>, SourceError> {
        if !error.is_not_found() {
            error!(start = %start, error = %error, "[PIPELINE] Source unavailable, aborting run");
            return Err(error);
        }
        warn!(
            start = %start,
            error = %error,
            "[PIPELINE] Start path not found, check paths and contract name"
        );
        report.skipped.push(SkippedItem {
            path: start.to_string(),
            reason: error.to_string(),
        });
        Ok(Vec::new())
    }

    fn archives_below_outputs(
        &mut self,
        start: &str,
        report: &mut RunReport,
    ) -> Result<Vec<String>, SourceError> {
        let harvestable = match locate(self.backend, start, &self.rules) {
            Ok(entries) => entries,
            Err(e) => return Self::unavailable_start(start, e, report),
        };

        let mut archives = Vec::new();
        for entry in harvestable {
            match find_archives(self.backend, &entry) {
                Ok(found) => archives.extend(found),
                Err(e) => {
                    warn!(path = %entry, error = %e, "[PIPELINE] Skipping output entry");
                    report.skipped.push(SkippedItem {
                        path: entry,
                        reason: e.to_string(),
                    });
                }
            }
        }
        report.archives_found = archives.len();
        Ok(archives)
    }

    fn archives_of_job(
        &mut self,
        job_dir: &str,
        report: &mut RunReport,
    ) -> Result<Vec<String>, SourceError> {
        match find_archives(self.backend, job_dir) {
            Ok(archives) => {
                report.archives_found = archives.len();
                Ok(archives)
            }
            Err(e) => Self::unavailable_start(job_dir, e, report),
        }
    }

    /// Harvests every archive into `tree`, then joins every collected workbook.
    fn harvest_all(
        &mut self,
        archives: &[String],
        batch_of: impl Fn(&str) -> String,
        mut tree: ResultTree,
        report: &mut RunReport,
    ) -> ResultTree {
        let stage = Instant::now();
        let mut workbooks: Vec<(Workbook, String)> = Vec::new();

        for archive in archives {
            let batch = batch_of(archive);
            match harvest(self.backend, archive) {
                Ok(harvested) => {
                    debug!(
                        archive = %harvested.archive,
                        batch = %batch,
                        documents = harvested.documents.len(),
                        "[PIPELINE] Filing archive under batch"
                    );
                    for document in harvested.documents {
                        tree.insert_document(&batch, document);
                    }
                    workbooks.extend(harvested.workbooks.into_iter().map(|w| (w, batch.clone())));
                    report.archives_harvested += 1;
                }
                Err(e) => {
                    warn!(
                        archive = %archive,
                        batch = %batch,
                        error = %e,
                        "[PIPELINE] Skipping archive"
                    );
                    report.skipped.push(SkippedItem {
                        path: archive.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        report.workbooks = workbooks.len();
        info!(
            harvested = report.archives_harvested,
            workbooks = report.workbooks,
            elapsed_ms = stage.elapsed().as_millis() as u64,
            "[PIPELINE] Harvest finished"
        );

        let stage = Instant::now();
        for (workbook, batch) in &workbooks {
            associate(workbook, batch, &mut tree);
        }
        info!(
            records = tree.record_count(),
            elapsed_ms = stage.elapsed().as_millis() as u64,
            "[PIPELINE] Association finished"
        );
        tree
    }
}
