use rps_core::{Network, Result, RpsError, WalletConfig};
use rps_match::MatchConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "config.json";

/// Settings read from `<data-dir>/config.json`; every field is optional
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub default_network: Network,
    /// Seconds a new game stays joinable; `null` disables expiry
    pub game_ttl_secs: Option<u64>,
    pub poll_interval_ms: u64,
    pub demo_delay_ms: u64,
    /// Default for `wait` when `--timeout` is not given
    pub result_timeout_secs: Option<u64>,
    /// Look up the balance before betting
    pub check_balance: bool,
    pub balance_retries: u32,
    pub retry_base_delay_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            default_network: Network::Mainnet,
            game_ttl_secs: Some(3600),
            poll_interval_ms: 500,
            demo_delay_ms: 3000,
            result_timeout_secs: Some(300),
            check_balance: true,
            balance_retries: 2,
            retry_base_delay_ms: 1000,
            request_timeout_secs: 10,
        }
    }
}

impl CliConfig {
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rps-wager")
    }

    /// Missing file means defaults
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| RpsError::config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(RpsError::config("poll_interval_ms must be greater than 0"));
        }
        if self.game_ttl_secs == Some(0) {
            return Err(RpsError::config("game_ttl_secs must be greater than 0"));
        }
        Ok(())
    }

    pub fn match_config(&self) -> MatchConfig {
        MatchConfig {
            game_ttl: self.game_ttl_secs.map(Duration::from_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            demo_delay: Duration::from_millis(self.demo_delay_ms),
            result_timeout: self.result_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn wallet_config(&self, network: Network) -> WalletConfig {
        let mut config = WalletConfig::new(network);
        config.max_retries = self.balance_retries;
        config.retry_base_delay = Duration::from_millis(self.retry_base_delay_ms);
        config.request_timeout = Duration::from_secs(self.request_timeout_secs);
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = CliConfig::load(dir.path()).unwrap();
        assert_eq!(config.default_network, Network::Mainnet);
        assert_eq!(config.match_config().demo_delay, Duration::from_secs(3));
    }

    #[test]
    fn test_partial_file_overrides() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{"default_network":"testnet","game_ttl_secs":null,"balance_retries":0}"#,
        )
        .unwrap();

        let config = CliConfig::load(dir.path()).unwrap();
        assert_eq!(config.default_network, Network::Testnet);
        assert_eq!(config.match_config().game_ttl, None);
        assert_eq!(config.wallet_config(Network::Testnet).max_retries, 0);
        assert_eq!(config.poll_interval_ms, 500);
    }

    #[test]
    fn test_invalid_file_rejected() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), r#"{"poll_interval_ms":0}"#).unwrap();
        assert!(CliConfig::load(dir.path()).is_err());

        std::fs::write(dir.path().join(CONFIG_FILE), "not json").unwrap();
        assert!(matches!(
            CliConfig::load(dir.path()),
            Err(RpsError::Config(_))
        ));
    }
}
