//! Tests for configuration resolution and graceful degradation
//!
//! Tests that manipulate BLOOM_* environment variables are marked with
//! #[serial] so they never run in parallel with each other.

use bloom_common::config::{
    load_toml_file, CompiledDefaults, ConfigOverrides, ConfigResolver, ServerConfig,
    ENV_PORT, ENV_PYTHON_URL, ENV_ROOT_FOLDER, ENV_SERVERLESS,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;

fn clear_env() {
    env::remove_var(ENV_ROOT_FOLDER);
    env::remove_var(ENV_PORT);
    env::remove_var(ENV_PYTHON_URL);
    env::remove_var(ENV_SERVERLESS);
}

/// Resolver pinned to a config path that does not exist, so the user's own
/// config file never leaks into the test
fn isolated_resolver(mut overrides: ConfigOverrides) -> ConfigResolver {
    if overrides.config_path.is_none() {
        overrides.config_path = Some(PathBuf::from("/nonexistent/brandbloom/config.toml"));
    }
    ConfigResolver::new(overrides)
}

#[test]
fn test_compiled_defaults() {
    let defaults = CompiledDefaults::for_current_platform();
    assert!(!defaults.root_folder.as_os_str().is_empty());
    assert!(defaults.root_folder.to_string_lossy().contains("brandbloom"));
    assert_eq!(defaults.port, 3001);
    assert_eq!(defaults.max_upload_bytes, 10 * 1024 * 1024);
    assert_eq!(defaults.log_level, "info");
}

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_defaults() {
    clear_env();

    let config = isolated_resolver(ConfigOverrides::default()).resolve();
    let defaults = CompiledDefaults::for_current_platform();

    assert_eq!(config.root_folder, defaults.root_folder);
    assert_eq!(config.port, defaults.port);
    assert_eq!(config.python_base_url, defaults.python_base_url);
    assert!(!config.serverless);
}

#[test]
#[serial]
fn test_env_overrides_defaults() {
    clear_env();
    env::set_var(ENV_ROOT_FOLDER, "/tmp/bloom-env-root");
    env::set_var(ENV_PORT, "4100");
    env::set_var(ENV_PYTHON_URL, "http://python:9000");
    env::set_var(ENV_SERVERLESS, "true");

    let config = isolated_resolver(ConfigOverrides::default()).resolve();

    assert_eq!(config.root_folder, PathBuf::from("/tmp/bloom-env-root"));
    assert_eq!(config.port, 4100);
    assert_eq!(config.python_base_url, "http://python:9000");
    assert!(config.serverless);

    clear_env();
}

#[test]
#[serial]
fn test_cli_takes_precedence_over_env() {
    clear_env();
    env::set_var(ENV_ROOT_FOLDER, "/tmp/bloom-env-root");
    env::set_var(ENV_PORT, "4100");

    let config = isolated_resolver(ConfigOverrides {
        root_folder: Some(PathBuf::from("/tmp/bloom-cli-root")),
        port: Some(5000),
        ..Default::default()
    })
    .resolve();

    assert_eq!(config.root_folder, PathBuf::from("/tmp/bloom-cli-root"));
    assert_eq!(config.port, 5000);

    clear_env();
}

#[test]
#[serial]
fn test_invalid_env_port_falls_back() {
    clear_env();
    env::set_var(ENV_PORT, "not-a-port");

    let config = isolated_resolver(ConfigOverrides::default()).resolve();
    assert_eq!(config.port, 3001);

    clear_env();
}

#[test]
#[serial]
fn test_toml_tier_applies_below_env() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
root_folder = "/tmp/bloom-toml-root"
port = 4200
max_upload_bytes = 2048
serverless = true

[python]
base_url = "http://toml-python:8000"
timeout_secs = 5

[logging]
level = "debug"
"#,
    )
    .unwrap();

    env::set_var(ENV_PORT, "4300");

    let config = ConfigResolver::new(ConfigOverrides {
        config_path: Some(path),
        ..Default::default()
    })
    .resolve();

    assert_eq!(config.root_folder, PathBuf::from("/tmp/bloom-toml-root"));
    assert_eq!(config.port, 4300, "env beats TOML");
    assert_eq!(config.max_upload_bytes, 2048);
    assert!(config.serverless);
    assert_eq!(config.python_base_url, "http://toml-python:8000");
    assert_eq!(config.python_timeout_secs, 5);
    assert_eq!(config.log_level, "debug");

    clear_env();
}

#[test]
#[serial]
fn test_malformed_toml_does_not_abort() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "port = [this is not toml").unwrap();

    assert!(load_toml_file(&path).is_err());

    let config = ConfigResolver::new(ConfigOverrides {
        config_path: Some(path),
        ..Default::default()
    })
    .resolve();
    assert_eq!(config.port, 3001);
}

#[test]
fn test_ensure_directories_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let config = ServerConfig::for_root(dir.path().join("data"));

    config.ensure_directories().unwrap();
    config.ensure_directories().unwrap();

    assert!(config.uploads_dir().is_dir());
    assert!(config.processed_dir().is_dir());
    assert!(config.analyses_dir().is_dir());
    assert!(config.concatenation_states_dir().is_dir());
    assert!(config.filter_states_dir().is_dir());
    assert!(config.nonmmm_states_dir().is_dir());
}
