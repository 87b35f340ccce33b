use crate::error::Result;
use crate::types::Network;
use crate::wallet::{ConnectionState, WalletConfig, WalletConnector};
use async_trait::async_trait;
use parking_lot::RwLock;

/// Named wallet identity kept in the local database
pub struct LocalWallet {
    id: String,
    name: String,
    address: String,
    config: WalletConfig,
    state: RwLock<ConnectionState>,
}

impl LocalWallet {
    pub fn new(id: String, name: String, address: String, config: WalletConfig) -> Self {
        Self {
            id,
            name,
            address,
            config,
            state: RwLock::new(ConnectionState::Disconnected),
        }
    }

    // Wallet metadata
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    /// Address regardless of connection state
    pub fn stored_address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl WalletConnector for LocalWallet {
    async fn connect(&self) -> Result<()> {
        *self.state.write() = ConnectionState::Connected;
        tracing::debug!("Wallet '{}' connected as {}", self.name, self.address);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        *self.state.write() = ConnectionState::Disconnected;
        tracing::debug!("Wallet '{}' disconnected", self.name);
        Ok(())
    }

    fn address(&self) -> Option<String> {
        match *self.state.read() {
            ConnectionState::Connected => Some(self.address.clone()),
            ConnectionState::Disconnected => None,
        }
    }

    fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    fn network(&self) -> Network {
        self.config.network
    }
}

impl std::fmt::Debug for LocalWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalWallet")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("network", &self.config.network)
            .field("state", &*self.state.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_address_only_while_connected() {
        let wallet = LocalWallet::new(
            "id".to_string(),
            "alice".to_string(),
            "EQalice".to_string(),
            WalletConfig::new(Network::Testnet),
        );

        assert!(!wallet.is_connected());
        assert_eq!(wallet.address(), None);

        wallet.connect().await.unwrap();
        assert!(wallet.is_connected());
        assert_eq!(wallet.address().as_deref(), Some("EQalice"));
        assert_eq!(wallet.network(), Network::Testnet);

        wallet.disconnect().await.unwrap();
        assert_eq!(wallet.address(), None);
    }
}
