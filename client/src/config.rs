//! Client configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use market_gateway::pinata::{DEFAULT_GATEWAY_HOST, DEFAULT_UPLOAD_URL};
use market_types::{Address, Wei};

use crate::ClientError;

/// Configuration for the marketplace client.
///
/// Can be loaded from a TOML file via [`ClientConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Signing bridge endpoint.
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,

    /// The single marketplace contract every call targets.
    #[serde(default)]
    pub contract_address: Option<Address>,

    /// Host serving pinned images, e.g. "ipfs.io".
    #[serde(default = "default_ipfs_gateway")]
    pub ipfs_gateway: String,

    #[serde(default = "default_pinata_upload_url")]
    pub pinata_upload_url: String,

    /// Pinata API token. Only needed for product creation.
    #[serde(default)]
    pub pinata_jwt: Option<String>,

    /// Listing fee in ether, e.g. "0.001". Read from the contract when unset.
    #[serde(default)]
    pub product_creation_fee: Option<String>,

    #[serde(default = "default_page_size")]
    pub page_size: usize,

    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,

    /// Receipt polling interval while awaiting confirmation.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Minimum feedback comment length, in characters after trimming.
    #[serde(default = "default_min_comment_len")]
    pub min_comment_len: usize,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Dump Prometheus metrics to stderr on exit.
    #[serde(default)]
    pub enable_metrics: bool,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_gateway_url() -> String {
    "http://127.0.0.1:8545/bridge".to_string()
}

fn default_ipfs_gateway() -> String {
    DEFAULT_GATEWAY_HOST.to_string()
}

fn default_pinata_upload_url() -> String {
    DEFAULT_UPLOAD_URL.to_string()
}

fn default_page_size() -> usize {
    12
}

fn default_confirmation_timeout_secs() -> u64 {
    120
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_min_comment_len() -> usize {
    10
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl ClientConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ClientError::Config(format!("{}: {e}", path.as_ref().display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ClientError> {
        let config: Self = toml::from_str(s).map_err(|e| ClientError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("ClientConfig is always serializable to TOML")
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if !(self.gateway_url.starts_with("http://") || self.gateway_url.starts_with("https://"))
        {
            return Err(ClientError::Config(format!(
                "gateway_url must be an http(s) URL, got {:?}",
                self.gateway_url
            )));
        }
        if self.page_size == 0 {
            return Err(ClientError::Config("page_size must be at least 1".into()));
        }
        if self.confirmation_timeout_secs == 0 {
            return Err(ClientError::Config(
                "confirmation_timeout_secs must be at least 1".into(),
            ));
        }
        if self.min_comment_len == 0 {
            return Err(ClientError::Config(
                "min_comment_len must be at least 1".into(),
            ));
        }
        self.creation_fee_override()?;
        Ok(())
    }

    /// The configured contract, or a config error when none is set.
    pub fn contract(&self) -> Result<Address, ClientError> {
        self.contract_address
            .ok_or_else(|| ClientError::Config("contract_address is not configured".into()))
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn creation_fee_override(&self) -> Result<Option<Wei>, ClientError> {
        self.product_creation_fee
            .as_deref()
            .map(|fee| {
                Wei::from_ether_str(fee)
                    .map_err(|e| ClientError::Config(format!("product_creation_fee: {e}")))
            })
            .transpose()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            gateway_url: default_gateway_url(),
            contract_address: None,
            ipfs_gateway: default_ipfs_gateway(),
            pinata_upload_url: default_pinata_upload_url(),
            pinata_jwt: None,
            product_creation_fee: None,
            page_size: default_page_size(),
            confirmation_timeout_secs: default_confirmation_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            min_comment_len: default_min_comment_len(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            enable_metrics: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = ClientConfig {
            contract_address: Some(Address::new([0x11; 20])),
            product_creation_fee: Some("0.001".into()),
            ..ClientConfig::default()
        };
        let toml_str = config.to_toml_string();
        let parsed = ClientConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed.contract_address, config.contract_address);
        assert_eq!(parsed.page_size, config.page_size);
        assert_eq!(
            parsed.creation_fee_override().unwrap(),
            Some(Wei::new(1_000_000_000_000_000))
        );
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = ClientConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.page_size, 12);
        assert_eq!(config.confirmation_timeout(), Duration::from_secs(120));
        assert_eq!(config.min_comment_len, 10);
        assert_eq!(config.ipfs_gateway, "ipfs.io");
        assert_eq!(config.log_format, "human");
        assert!(config.contract().is_err());
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            contract_address = "0xF3d2a1b4c5e6f708192a3b4c5d6e7f8091a2b3c4"
            page_size = 24
        "#;
        let config = ClientConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.page_size, 24);
        assert!(config.contract().is_ok());
        assert_eq!(config.confirmation_timeout_secs, 120); // default
    }

    #[test]
    fn invalid_values_are_config_errors() {
        for toml in [
            r#"contract_address = "0x1234""#,
            "page_size = 0",
            r#"gateway_url = "ftp://bridge""#,
            r#"product_creation_fee = "free""#,
        ] {
            let err = ClientConfig::from_toml_str(toml).unwrap_err();
            assert!(matches!(err, ClientError::Config(_)), "{toml}: {err}");
        }
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "confirmation_timeout_secs = 30").unwrap();
        let config = ClientConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.confirmation_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = ClientConfig::from_toml_file("/nonexistent/market.toml");
        assert!(matches!(result, Err(ClientError::Config(_))));
    }
}
