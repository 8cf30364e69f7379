//! Output locator: finds the finished-output directories of a source tree.
//!
//! The capture pipeline leaves each batch's results under a directory named
//! `output` somewhere below the source root, next to working folders (input,
//! catalogued, failed, …) that must never be harvested. The search walks the
//! tree depth-first in listing order:
//!
//! - a directory whose name matches a skip pattern is ignored with everything below it
//! - a directory whose name matches the output pattern ends the search on that
//!   branch and contributes its immediate children (never itself, never deeper)
//! - any other directory is searched recursively
//!
//! The walk uses an explicit stack, so pathological depth cannot overflow.

use regex::Regex;
use tracing::{debug, info, warn};

use crate::contract::SourceBackend;
use crate::error::SourceError;
use crate::source::entry_name;

pub const DEFAULT_SKIP_PATTERNS: [&str; 5] =
    ["Input", "Catalogued", "Invalid", "Failed", "For Processing"];
/// Matches a directory named exactly `output`, in any case. Anchored on
/// purpose: names that merely contain the word, such as "Output 2024" or
/// "outputs", are searched like any other directory and never harvested.
pub const DEFAULT_OUTPUT_PATTERN: &str = "(?i)^output$";

/// Name rules for the search. Patterns are searched in the entry's last path segment.
#[derive(Debug, Clone)]
pub struct LocatorRules {
    pub skip: Vec<Regex>,
    pub output: Regex,
}

impl LocatorRules {
    pub fn new<S: AsRef<str>>(skip: &[S], output: &str) -> Result<Self, regex::Error> {
        let skip = skip
            .iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            skip,
            output: Regex::new(output)?,
        })
    }

    pub fn is_skipped(&self, name: &str) -> bool {
        self.skip.iter().any(|re| re.is_match(name))
    }

    pub fn is_output(&self, name: &str) -> bool {
        self.output.is_match(name)
    }
}

impl Default for LocatorRules {
    fn default() -> Self {
        Self::new(&DEFAULT_SKIP_PATTERNS[..], DEFAULT_OUTPUT_PATTERN)
            .expect("default patterns compile")
    }
}

/// Returns the children of every output directory found below `root`.
///
/// Fails only when `root` itself cannot be listed. Unreadable subdirectories
/// are logged and skipped. An empty result means the source holds no output.
pub fn locate(
    backend: &mut dyn SourceBackend,
    root: &str,
    rules: &LocatorRules,
) -> Result<Vec<String>, SourceError> {
    info!(root = %root, "[LOCATE] Searching for output directories");

    let mut harvestable = Vec::new();
    let mut pending: Vec<String> = backend.list(root)?.into_iter().rev().collect();

    while let Some(path) = pending.pop() {
        let name = entry_name(&path);
        if rules.is_skipped(name) {
            debug!(path = %path, "[LOCATE] Skipping excluded directory");
            continue;
        }
        if !backend.accepts_entry(&path) {
            debug!(path = %path, "[LOCATE] Ignoring non-path listing entry");
            continue;
        }
        match backend.is_dir(&path) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                warn!(path = %path, error = %e, "[LOCATE] Could not stat entry, skipping");
                continue;
            }
        }

        let children = match backend.list(&path) {
            Ok(children) => children,
            Err(e) => {
                warn!(
                    path = %path,
                    error = %e,
                    "[LOCATE] Could not list directory, skipping branch"
                );
                continue;
            }
        };

        if rules.is_output(name) {
            info!(path = %path, entries = children.len(), "[LOCATE] Found output directory");
            harvestable.extend(children);
        } else {
            pending.extend(children.into_iter().rev());
        }
    }

    info!(root = %root, found = harvestable.len(), "[LOCATE] Search finished");
    Ok(harvestable)
}
