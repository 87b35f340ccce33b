//! Wallet balance lookups against external balance APIs.
//!
//! Providers are tried in order and the first well-formed answer wins. When a
//! whole pass fails the fetcher retries a bounded number of times with a
//! linearly growing delay, then gives up with a terminal error.

pub mod providers;

pub use providers::{default_providers, BalanceProvider, ProviderKind};

use crate::error::{Result, RpsError};
use crate::types::{Amount, Network};
use crate::wallet::WalletConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Plain GET returning the response body
#[async_trait]
pub trait BalanceTransport: Send + Sync {
    async fn get(&self, url: &str) -> Result<String>;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &WalletConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl BalanceTransport for HttpTransport {
    async fn get(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub address: String,
    pub network: Network,
    pub amount: Amount,
    pub provider: String,
    pub fetched_at: DateTime<Utc>,
}

impl BalanceSnapshot {
    /// Display units, 4 decimals
    pub fn display(&self) -> String {
        self.amount.to_display()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceState {
    Idle,
    Loading,
    Ready(BalanceSnapshot),
    Unavailable { reason: String },
}

pub struct BalanceFetcher {
    transport: Arc<dyn BalanceTransport>,
    config: WalletConfig,
}

impl BalanceFetcher {
    pub fn new(config: WalletConfig) -> Result<Self> {
        config.validate()?;
        let transport = Arc::new(HttpTransport::new(&config)?);
        Ok(Self { transport, config })
    }

    pub fn with_transport(config: WalletConfig, transport: Arc<dyn BalanceTransport>) -> Self {
        Self { transport, config }
    }

    fn providers_for(&self, network: Network) -> Vec<BalanceProvider> {
        if network == self.config.network {
            self.config.balance_providers.clone()
        } else {
            default_providers(network)
        }
    }

    /// One pass over the provider list
    async fn fetch_once(&self, address: &str, network: Network) -> Result<BalanceSnapshot> {
        let mut last_error = RpsError::provider("no balance providers configured");

        for provider in self.providers_for(network) {
            let url = provider.url_for(address);
            let outcome = match self.transport.get(&url).await {
                Ok(body) => provider.parse(&body),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(amount) => {
                    tracing::debug!("Balance for {} from {}: {}", address, provider.name, amount);
                    return Ok(BalanceSnapshot {
                        address: address.to_string(),
                        network,
                        amount,
                        provider: provider.name.clone(),
                        fetched_at: Utc::now(),
                    });
                }
                Err(e) => {
                    tracing::debug!("Balance provider {} failed: {}", provider.name, e);
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    /// Full lookup with retries; `Err` means the balance is unavailable
    pub async fn fetch(&self, address: &str, network: Network) -> Result<BalanceSnapshot> {
        let attempts = self.config.max_retries + 1;
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.config.retry_base_delay * attempt;
                tracing::debug!(
                    "Retrying balance for {} in {:?} (attempt {}/{})",
                    address,
                    delay,
                    attempt + 1,
                    attempts
                );
                tokio::time::sleep(delay).await;
            }

            match self.fetch_once(address, network).await {
                Ok(snapshot) => return Ok(snapshot),
                Err(e) => last_error = Some(e),
            }
        }

        Err(RpsError::provider(format!(
            "balance unavailable after {} attempts: {}",
            attempts,
            last_error.map_or_else(|| "unknown error".to_string(), |e| e.to_string())
        )))
    }
}

/// Balance of the currently connected wallet.
///
/// Refetches when the watched address or network changes. A manual refresh
/// may overlap with one in flight; whichever finishes last wins.
pub struct BalanceTracker {
    fetcher: Arc<BalanceFetcher>,
    state: RwLock<BalanceState>,
    watched: Mutex<Option<(String, Network)>>,
}

impl BalanceTracker {
    pub fn new(fetcher: Arc<BalanceFetcher>) -> Self {
        Self {
            fetcher,
            state: RwLock::new(BalanceState::Idle),
            watched: Mutex::new(None),
        }
    }

    pub fn state(&self) -> BalanceState {
        self.state.read().clone()
    }

    /// Last fetched amount, if one is known
    pub fn known_balance(&self) -> Option<Amount> {
        match &*self.state.read() {
            BalanceState::Ready(snapshot) => Some(snapshot.amount),
            _ => None,
        }
    }

    pub fn display(&self) -> String {
        match &*self.state.read() {
            BalanceState::Ready(snapshot) => snapshot.display(),
            BalanceState::Loading => "...".to_string(),
            BalanceState::Idle => "-".to_string(),
            BalanceState::Unavailable { .. } => "unavailable".to_string(),
        }
    }

    /// Track the connected wallet; fetches only when the target changed
    pub async fn observe(&self, address: Option<&str>, network: Network) -> bool {
        let target = address.map(|a| (a.to_string(), network));
        {
            let mut watched = self.watched.lock();
            if *watched == target {
                return false;
            }
            *watched = target;
        }

        self.refresh().await;
        true
    }

    pub async fn refresh(&self) {
        let target = self.watched.lock().clone();
        let Some((address, network)) = target else {
            *self.state.write() = BalanceState::Idle;
            return;
        };

        *self.state.write() = BalanceState::Loading;

        let next = match self.fetcher.fetch(&address, network).await {
            Ok(snapshot) => BalanceState::Ready(snapshot),
            Err(e) => {
                tracing::warn!("Balance for {} unavailable: {}", address, e);
                BalanceState::Unavailable {
                    reason: e.to_string(),
                }
            }
        };

        *self.state.write() = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::time::Duration;

    /// Canned responses keyed by host
    #[derive(Default)]
    struct ScriptedTransport {
        responses: Mutex<HashMap<String, VecDeque<Result<String>>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn push(&self, host: &str, response: Result<String>) {
            self.responses
                .lock()
                .entry(host.to_string())
                .or_default()
                .push_back(response);
        }

        fn calls(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl BalanceTransport for ScriptedTransport {
        async fn get(&self, url: &str) -> Result<String> {
            self.calls.lock().push(url.to_string());
            let mut responses = self.responses.lock();
            let host = responses
                .keys()
                .find(|host| url.contains(host.as_str()))
                .cloned();
            host.and_then(|h| responses.get_mut(&h).and_then(VecDeque::pop_front))
                .unwrap_or_else(|| Err(RpsError::provider("connection refused")))
        }
    }

    fn test_config() -> WalletConfig {
        let mut config = WalletConfig::new(Network::Mainnet);
        config.retry_base_delay = Duration::from_millis(1);
        config
    }

    #[tokio::test]
    async fn test_falls_back_after_malformed_json() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push("https://toncenter.com", Ok("{not json".to_string()));
        transport.push("https://tonapi.io", Ok(r#"{"balance":1000000000}"#.to_string()));

        let fetcher = Arc::new(BalanceFetcher::with_transport(test_config(), transport.clone()));
        let tracker = BalanceTracker::new(fetcher);

        assert!(tracker.observe(Some("EQaddr"), Network::Mainnet).await);

        assert_eq!(tracker.display(), "1.0000");
        assert!(!matches!(tracker.state(), BalanceState::Unavailable { .. }));
        assert_eq!(tracker.known_balance(), Some(Amount::from_nano(1_000_000_000)));
        match tracker.state() {
            BalanceState::Ready(snapshot) => assert_eq!(snapshot.provider, "tonapi"),
            other => panic!("unexpected state {:?}", other),
        }
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_retries_then_unavailable() {
        let transport = Arc::new(ScriptedTransport::default());
        let fetcher = Arc::new(BalanceFetcher::with_transport(test_config(), transport.clone()));
        let tracker = BalanceTracker::new(fetcher);

        tracker.observe(Some("EQaddr"), Network::Mainnet).await;

        assert!(matches!(tracker.state(), BalanceState::Unavailable { .. }));
        assert_eq!(tracker.display(), "unavailable");
        assert_eq!(tracker.known_balance(), None);
        // 1 pass + 2 retries, 2 providers each
        assert_eq!(transport.calls(), 6);
    }

    #[tokio::test]
    async fn test_recovers_on_retry() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push("https://toncenter.com", Err(RpsError::provider("503")));
        transport.push("https://toncenter.com", Ok(r#"{"ok":true,"result":{"balance":"5"}}"#.to_string()));

        let fetcher = BalanceFetcher::with_transport(test_config(), transport.clone());
        let snapshot = fetcher.fetch("EQaddr", Network::Mainnet).await.unwrap();

        assert_eq!(snapshot.amount.to_nano(), 5);
        assert_eq!(snapshot.provider, "toncenter");
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_observe_only_refetches_on_change() {
        let transport = Arc::new(ScriptedTransport::default());
        for _ in 0..3 {
            transport.push("https://tonapi.io", Ok(r#"{"balance":1}"#.to_string()));
        }
        for _ in 0..3 {
            transport.push("https://toncenter.com", Err(RpsError::provider("down")));
        }

        let fetcher = Arc::new(BalanceFetcher::with_transport(test_config(), transport.clone()));
        let tracker = BalanceTracker::new(fetcher);

        assert!(tracker.observe(Some("EQa"), Network::Mainnet).await);
        assert!(!tracker.observe(Some("EQa"), Network::Mainnet).await);
        assert_eq!(transport.calls(), 2);

        // Network switch uses the testnet table, which has no scripted answers
        assert!(tracker.observe(Some("EQa"), Network::Testnet).await);
        assert!(matches!(tracker.state(), BalanceState::Unavailable { .. }));

        assert!(tracker.observe(None, Network::Testnet).await);
        assert_eq!(tracker.state(), BalanceState::Idle);
    }
}
