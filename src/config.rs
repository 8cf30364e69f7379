// kvp-harvest/src/config.rs

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::locate::{DEFAULT_OUTPUT_PATTERN, DEFAULT_SKIP_PATTERNS};

/// Static configuration as written in the YAML file. Holds no secrets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(default)]
    pub locator: LocatorConfig,
    #[serde(default)]
    pub export: Option<ExportConfig>,
}

impl Config {
    pub fn trace_loaded(&self) {
        info!(
            root = %self.source.root,
            contract = self.source.contract.as_deref().unwrap_or("-"),
            backend = ?self.source.backend,
            "Loaded Config"
        );
        debug!(?self, "Config loaded (full debug)");
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Root path on the selected backend.
    pub root: String,
    /// Optional contract folder below `root` that scopes whole-tree runs.
    #[serde(default)]
    pub contract: Option<String>,
    pub backend: BackendConfig,
}

/// Selects the storage medium the source tree lives on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    Local,
    /// FTP(S) server, `host` or `host:port`. Credentials come from the environment.
    Remote { server: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocatorConfig {
    #[serde(default = "default_skip_patterns")]
    pub skip_patterns: Vec<String>,
    #[serde(default = "default_output_pattern")]
    pub output_pattern: String,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            skip_patterns: default_skip_patterns(),
            output_pattern: default_output_pattern(),
        }
    }
}

fn default_skip_patterns() -> Vec<String> {
    DEFAULT_SKIP_PATTERNS.iter().map(|p| p.to_string()).collect()
}

fn default_output_pattern() -> String {
    DEFAULT_OUTPUT_PATTERN.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    pub dir: PathBuf,
}
