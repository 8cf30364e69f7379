/// `load_config` module: loads the static YAML config and injects secrets from the environment.
///
/// # Responsibilities
/// - Parse the YAML file into [`Config`]
/// - Compile the locator patterns, so a bad regex fails at load time
/// - Read `FTP_USER` / `FTP_PASS` when the remote backend is selected
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{error, info};

use crate::config::{BackendConfig, Config};
use crate::locate::LocatorRules;
use crate::source::RemoteCredentials;

pub const FTP_USER_VAR: &str = "FTP_USER";
pub const FTP_PASS_VAR: &str = "FTP_PASS";

/// Config file merged with environment secrets and compiled patterns.
#[derive(Debug)]
pub struct HarvestConfig {
    pub config: Config,
    pub rules: LocatorRules,
    /// Present only for the remote backend.
    pub credentials: Option<RemoteCredentials>,
}

/// Loads a static YAML config file (no secrets) and injects required env vars for secrets.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<HarvestConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let config: Config = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    let rules = LocatorRules::new(
        config.locator.skip_patterns.as_slice(),
        &config.locator.output_pattern,
    )
    .context("Invalid locator pattern in config")?;

    let credentials = match &config.source.backend {
        BackendConfig::Local => None,
        BackendConfig::Remote { server } => {
            let username = required_env(FTP_USER_VAR)?;
            let password = required_env(FTP_PASS_VAR)?;
            info!(server = %server, user = %username, "Remote credentials found in env");
            Some(RemoteCredentials { username, password })
        }
    };

    config.trace_loaded();
    Ok(HarvestConfig {
        config,
        rules,
        credentials,
    })
}

fn required_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        Ok(_) => {
            error!(var = name, "Environment variable is empty");
            anyhow::bail!("{name} environment variable is empty")
        }
        Err(e) => {
            error!(error = ?e, var = name, "Environment variable not set");
            anyhow::bail!("{name} environment variable not set: {e}")
        }
    }
}
