use std::env;
use std::fs::write;
use std::path::PathBuf;

use kvp_harvest::config::BackendConfig;
use kvp_harvest::load_config::load_config;
use serial_test::serial;
use tempfile::NamedTempFile;

fn config_file(yaml: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), yaml).unwrap();
    file
}

/// A local config needs no secrets and falls back to the default locator rules.
#[test]
#[serial]
fn test_load_config_local_backend_uses_defaults() {
    env::remove_var("FTP_USER");
    env::remove_var("FTP_PASS");
    let file = config_file(
        r#"
source:
  root: /srv/scans
  contract: ACME
  backend:
    type: local
export:
  dir: ./tmp/export
"#,
    );

    let loaded = load_config(file.path()).expect("Config should load");

    assert_eq!(loaded.config.source.root, "/srv/scans");
    assert_eq!(loaded.config.source.contract.as_deref(), Some("ACME"));
    assert_eq!(loaded.config.source.backend, BackendConfig::Local);
    assert!(loaded.credentials.is_none());
    assert_eq!(
        loaded.config.export.map(|e| e.dir),
        Some(PathBuf::from("./tmp/export"))
    );
    assert!(loaded.rules.is_skipped("Input"));
    assert!(loaded.rules.is_output("Output"));
    assert!(!loaded.rules.is_output("outputs"));
}

/// The remote backend takes its credentials from the environment.
#[test]
#[serial]
fn test_load_config_remote_injects_env_credentials() {
    env::set_var("FTP_USER", "scanner");
    env::set_var("FTP_PASS", "top-secret");
    let file = config_file(
        r#"
source:
  root: /Contracts
  backend:
    type: remote
    server: ftp.example.com
locator:
  skip_patterns: ["Archive"]
"#,
    );

    let loaded = load_config(file.path()).expect("Config should load");

    assert_eq!(
        loaded.config.source.backend,
        BackendConfig::Remote {
            server: "ftp.example.com".into()
        }
    );
    let creds = loaded.credentials.expect("credentials injected");
    assert_eq!(creds.username, "scanner");
    assert_eq!(creds.password, "top-secret");
    assert!(loaded.rules.is_skipped("Archive 2023"));
    assert!(!loaded.rules.is_skipped("Input"));
}

#[test]
#[serial]
fn test_load_config_remote_errors_on_missing_env() {
    env::remove_var("FTP_USER");
    env::set_var("FTP_PASS", "present");
    let file = config_file(
        r#"
source:
  root: /Contracts
  backend:
    type: remote
    server: ftp.example.com
"#,
    );

    let msg = load_config(file.path()).unwrap_err().to_string();
    assert!(msg.contains("FTP_USER"), "Must name the missing var, got: {msg}");
}

#[test]
#[serial]
fn test_load_config_errors_for_invalid_file() {
    let file = config_file("not-yaml: [:::");
    let msg = load_config(file.path()).unwrap_err().to_string();
    assert!(
        msg.contains("parse") || msg.contains("YAML"),
        "Parse error expected, got: {msg}"
    );
}

#[test]
#[serial]
fn test_load_config_errors_for_invalid_pattern() {
    let file = config_file(
        r#"
source:
  root: /srv/scans
  backend:
    type: local
locator:
  output_pattern: "(unclosed"
"#,
    );
    let msg = load_config(file.path()).unwrap_err().to_string();
    assert!(msg.contains("locator pattern"), "got: {msg}");
}

#[test]
#[serial]
fn test_load_config_errors_for_missing_file() {
    let msg = load_config("/definitely/not/here.yaml")
        .unwrap_err()
        .to_string();
    assert!(msg.contains("Failed to read config file"), "got: {msg}");
}
