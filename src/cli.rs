/// CLI glue for kvp-harvest: argument parsing, backend construction and the
/// hand-off of the harvested tree. All harvesting logic lives in the library
/// modules; this module only wires them together for the binary and tests.
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::contract::ResultTree;
use crate::load_config::{load_config, HarvestConfig};
use crate::pipeline::{Pipeline, RunMode, RunOutcome, RunStatus};
use crate::publish::{publish_all, ExportPublisher};
use crate::source;

/// CLI for kvp-harvest: pair searchable PDFs with their key-value records.
#[derive(Parser)]
#[clap(
    name = "kvp-harvest",
    version,
    about = "Harvest OCR batch output archives into documents with key-value records"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Harvest every output directory of the configured source, or a single job
    Harvest {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Harvest only this job (reads `<root>/Job <code>`)
        #[clap(long)]
        job: Option<String>,
        /// Export documents and records to this directory (overrides the config)
        #[clap(long)]
        export_dir: Option<PathBuf>,
    },
}

/// Connects the configured backend and runs the pipeline once. Blocking.
pub fn harvest_source(loaded: &HarvestConfig, job: Option<&str>) -> Result<RunOutcome> {
    let source_config = &loaded.config.source;
    let mut backend = source::connect(&source_config.backend, loaded.credentials.as_ref())
        .context("Failed to connect to source")?;

    let mode = match job {
        Some(job) => RunMode::SingleJob {
            root: source_config.root.clone(),
            job: job.to_string(),
        },
        None => RunMode::WholeTree {
            root: source_config.root.clone(),
            contract: source_config.contract.clone(),
        },
    };

    let mut pipeline = Pipeline::new(backend.as_mut(), loaded.rules.clone());
    pipeline
        .run(&mode, ResultTree::new())
        .context("Source could not be read")
}

fn print_summary(outcome: &RunOutcome) {
    println!("Harvest complete.");
    for (batch, documents) in outcome.tree.iter() {
        let records: usize = documents.values().map(|d| d.records.len()).sum();
        println!(
            "  {batch}: {} documents, {records} records",
            documents.len()
        );
    }
    for skipped in &outcome.report.skipped {
        println!("  skipped {}: {}", skipped.path, skipped.reason);
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Harvest {
            config,
            job,
            export_dir,
        } => {
            let loaded = load_config(config)?;
            let export_dir =
                export_dir.or_else(|| loaded.config.export.as_ref().map(|e| e.dir.clone()));
            tracing::info!(
                command = "harvest",
                job = job.as_deref().unwrap_or("-"),
                "Starting harvest"
            );

            let outcome =
                tokio::task::spawn_blocking(move || harvest_source(&loaded, job.as_deref()))
                    .await
                    .context("Harvest task panicked")??;

            if outcome.status == RunStatus::EmptySource {
                println!("Source is empty, nothing harvested.");
                return Ok(());
            }
            print_summary(&outcome);

            if let Some(dir) = export_dir {
                let publisher = ExportPublisher::new(dir);
                let report = publish_all(&outcome.tree, &publisher)
                    .await
                    .map_err(anyhow::Error::msg)?;
                println!(
                    "Exported {} documents to {}",
                    report.items.len(),
                    publisher.dir().display()
                );
            }
            Ok(())
        }
    }
}
