#![doc = "kvp-harvest: turns OCR batch output archives into documents with key-value records."]

//! The pipeline runs in three stages against a [`contract::SourceBackend`]
//! (local disk or an FTP(S) session):
//!
//! 1. [`locate`] finds the output directories of the source tree
//! 2. [`harvest`] opens every archive below them and extracts searchable PDFs
//!    and batch spreadsheets
//! 3. [`associate`] joins spreadsheet rows to documents by filename
//!
//! [`pipeline`] drives the stages and returns a [`contract::ResultTree`];
//! [`publish`] hands that tree to a [`contract::Publisher`].

pub mod associate;
pub mod cli;
pub mod config;
pub mod contract;
pub mod error;
pub mod harvest;
pub mod load_config;
pub mod locate;
pub mod pipeline;
pub mod publish;
pub mod source;
pub mod workbook;

pub use cli::{run, Cli, Commands};
