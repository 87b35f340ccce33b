use crate::error::{Result, RpsError};
use crate::storage::wallet_store::WalletData;
use crate::storage::{Storage, WalletStore};
use crate::types::Network;
use crate::wallet::{validate_address, LocalWallet, WalletConfig};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

pub struct WalletManager {
    storage: Arc<Storage>,
    wallets: Arc<RwLock<HashMap<String, Arc<LocalWallet>>>>,
}

impl WalletManager {
    pub async fn new(data_dir: &Path) -> Result<Self> {
        let db_path = data_dir.join("rps.db");
        let storage = Arc::new(Storage::new(&db_path).await?);
        Ok(Self::with_storage(storage))
    }

    pub fn with_storage(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            wallets: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn add_wallet(
        &self,
        name: &str,
        address: &str,
        network: Network,
    ) -> Result<Arc<LocalWallet>> {
        // Check if wallet already exists
        let wallet_store = WalletStore::new(&self.storage);
        if wallet_store.wallet_exists(name).await? {
            return Err(RpsError::config(format!(
                "Wallet '{}' already exists",
                name
            )));
        }

        validate_address(address)?;

        let config = WalletConfig::new(network);
        config.validate()?;

        let wallet_data = WalletData {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            address: address.to_string(),
            network,
            created_at: Utc::now(),
        };
        wallet_store.save_wallet(&wallet_data).await?;

        let wallet = Arc::new(LocalWallet::new(
            wallet_data.id,
            wallet_data.name,
            wallet_data.address,
            config,
        ));

        // Cache the wallet
        {
            let mut wallets = self.wallets.write();
            wallets.insert(name.to_string(), wallet.clone());
        }

        tracing::info!("Added wallet '{}' ({}) on {}", name, address, network);
        Ok(wallet)
    }

    pub async fn load_wallet(&self, name: &str) -> Result<Arc<LocalWallet>> {
        // Check cache first
        if let Some(wallet) = self.wallets.read().get(name) {
            return Ok(wallet.clone());
        }

        let wallet_data = WalletStore::new(&self.storage).load_wallet(name).await?;
        let config = WalletConfig::new(wallet_data.network);

        let wallet = Arc::new(LocalWallet::new(
            wallet_data.id,
            wallet_data.name,
            wallet_data.address,
            config,
        ));

        // Cache the wallet
        {
            let mut wallets = self.wallets.write();
            wallets.insert(name.to_string(), wallet.clone());
        }

        Ok(wallet)
    }

    pub async fn list_wallets(&self) -> Result<Vec<WalletData>> {
        WalletStore::new(&self.storage).list_wallets().await
    }

    pub async fn delete_wallet(&self, name: &str) -> Result<()> {
        let removed = WalletStore::new(&self.storage).delete_wallet(name).await?;
        if !removed {
            return Err(RpsError::WalletNotFound {
                name: name.to_string(),
            });
        }

        self.wallets.write().remove(name);

        tracing::info!("Deleted wallet '{}'", name);
        Ok(())
    }
}
