use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What a device handle does when a call arrives while another is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BusyPolicy {
    /// Wait for the outstanding call to finish.
    #[default]
    Queue,
    /// Fail immediately with a device-busy error.
    FailFast,
}

impl std::str::FromStr for BusyPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "queue" => Ok(BusyPolicy::Queue),
            "fail_fast" | "fail-fast" => Ok(BusyPolicy::FailFast),
            other => anyhow::bail!("unknown busy policy: {}", other),
        }
    }
}

/// Per-handle wallet configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalletConfig {
    #[serde(default)]
    pub busy_policy: BusyPolicy,

    /// Forward translated vendor failures to the transport's event sink
    #[serde(default = "WalletConfig::default_emit_diagnostics")]
    pub emit_diagnostics: bool,

    /// Default tracing filter, `RUST_LOG` takes precedence
    #[serde(default = "WalletConfig::default_log_filter")]
    pub log_filter: String,
}

impl WalletConfig {
    fn default_emit_diagnostics() -> bool { true }
    fn default_log_filter() -> String { "info".to_string() }

    /// Parse a TOML document; missing keys fall back to defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("invalid wallet config")
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml_str(&raw)
    }

    /// Defaults overridden by `HDWALLET_BUSY_POLICY` and `HDWALLET_LOG`.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(policy) = std::env::var("HDWALLET_BUSY_POLICY") {
            self.busy_policy = policy
                .parse()
                .context("HDWALLET_BUSY_POLICY")?;
        }
        if let Ok(filter) = std::env::var("HDWALLET_LOG") {
            self.log_filter = filter;
        }
        Ok(self)
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            busy_policy: BusyPolicy::default(),
            emit_diagnostics: Self::default_emit_diagnostics(),
            log_filter: Self::default_log_filter(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WalletConfig::default();
        assert_eq!(config.busy_policy, BusyPolicy::Queue);
        assert!(config.emit_diagnostics);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = WalletConfig::from_toml_str("busy_policy = \"fail_fast\"").unwrap();
        assert_eq!(config.busy_policy, BusyPolicy::FailFast);
        assert!(config.emit_diagnostics);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = WalletConfig::from_toml_str("").unwrap();
        assert_eq!(config, WalletConfig::default());
    }

    #[test]
    fn test_invalid_toml_rejected() {
        assert!(WalletConfig::from_toml_str("busy_policy = \"sometimes\"").is_err());
        assert!(WalletConfig::from_toml_str("emit_diagnostics = 3").is_err());
    }

    #[test]
    fn test_busy_policy_parse() {
        assert_eq!("queue".parse::<BusyPolicy>().unwrap(), BusyPolicy::Queue);
        assert_eq!("Fail-Fast".parse::<BusyPolicy>().unwrap(), BusyPolicy::FailFast);
        assert!("later".parse::<BusyPolicy>().is_err());
    }
}
