// filepath: tests/config_file_tests.rs
//
// 配置加载: TOML 文件 + 环境变量覆盖

use hdwallet_bridge::core::config::{BusyPolicy, WalletConfig};
use serial_test::serial;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(body: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(body.as_bytes()).unwrap();
    file
}

fn clear_env() {
    std::env::remove_var("HDWALLET_BUSY_POLICY");
    std::env::remove_var("HDWALLET_LOG");
}

#[test]
#[serial]
fn test_load_from_file() {
    clear_env();
    let file = write_config(
        r#"
busy_policy = "fail_fast"
emit_diagnostics = false
log_filter = "hdwallet_bridge=debug"
"#,
    );

    let config = WalletConfig::from_file(file.path()).unwrap();
    assert_eq!(config.busy_policy, BusyPolicy::FailFast);
    assert!(!config.emit_diagnostics);
    assert_eq!(config.log_filter, "hdwallet_bridge=debug");
}

#[test]
#[serial]
fn test_missing_file_has_context() {
    let err = WalletConfig::from_file("/nonexistent/hdwallet.toml").unwrap_err();
    assert!(format!("{:#}", err).contains("reading config"));
}

#[test]
#[serial]
fn test_env_overrides_file() {
    clear_env();
    let file = write_config("busy_policy = \"queue\"\n");
    std::env::set_var("HDWALLET_BUSY_POLICY", "fail-fast");
    std::env::set_var("HDWALLET_LOG", "warn");

    let config = WalletConfig::from_file(file.path())
        .unwrap()
        .with_env_overrides()
        .unwrap();
    clear_env();

    assert_eq!(config.busy_policy, BusyPolicy::FailFast);
    assert_eq!(config.log_filter, "warn");
    assert!(config.emit_diagnostics);
}

#[test]
#[serial]
fn test_bad_env_policy_rejected() {
    clear_env();
    std::env::set_var("HDWALLET_BUSY_POLICY", "whenever");
    let result = WalletConfig::from_env();
    clear_env();

    let err = result.unwrap_err();
    assert!(format!("{:#}", err).contains("HDWALLET_BUSY_POLICY"));
}

#[test]
#[serial]
fn test_env_defaults() {
    clear_env();
    assert_eq!(WalletConfig::from_env().unwrap(), WalletConfig::default());
}
