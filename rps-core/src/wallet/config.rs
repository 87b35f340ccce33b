use crate::balance::{default_providers, BalanceProvider};
use crate::error::{Result, RpsError};
use crate::types::Network;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    pub network: Network,
    /// Tried in order; the first well-formed response wins
    pub balance_providers: Vec<BalanceProvider>,
    /// Extra full passes over the provider list after the first one fails
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub request_timeout: Duration,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self::new(Network::Mainnet)
    }
}

impl WalletConfig {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            balance_providers: default_providers(network),
            max_retries: 2,
            retry_base_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(10),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.balance_providers.is_empty() {
            return Err(RpsError::config("At least one balance provider is required"));
        }

        for provider in &self.balance_providers {
            if provider.url_template.is_empty() {
                return Err(RpsError::config(format!(
                    "Balance provider '{}' has an empty URL",
                    provider.name
                )));
            }
            if !provider.url_template.contains("{address}") {
                return Err(RpsError::config(format!(
                    "Balance provider '{}' URL lacks an {{address}} placeholder",
                    provider.name
                )));
            }
        }

        if self.request_timeout.is_zero() {
            return Err(RpsError::config("Request timeout must be greater than 0"));
        }

        Ok(())
    }
}
