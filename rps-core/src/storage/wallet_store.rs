use crate::error::{Result, RpsError};
use crate::storage::Storage;
use crate::types::Network;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletData {
    pub id: String,
    pub name: String,
    pub address: String,
    pub network: Network,
    pub created_at: DateTime<Utc>,
}

pub struct WalletStore<'a> {
    storage: &'a Storage,
}

impl<'a> WalletStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn save_wallet(&self, wallet_data: &WalletData) -> Result<()> {
        let conn = self.storage.get_connection().await;

        conn.execute(
            "INSERT OR REPLACE INTO wallets (id, name, address, network, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                wallet_data.id,
                wallet_data.name,
                wallet_data.address,
                wallet_data.network.as_str(),
                wallet_data.created_at.timestamp(),
            ],
        )?;

        Ok(())
    }

    pub async fn load_wallet(&self, name: &str) -> Result<WalletData> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT id, name, address, network, created_at
             FROM wallets WHERE name = ?1",
        )?;

        match stmt.query_row(params![name], wallet_from_row) {
            Ok(wallet) => Ok(wallet),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(RpsError::WalletNotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(RpsError::Storage(e)),
        }
    }

    pub async fn list_wallets(&self) -> Result<Vec<WalletData>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT id, name, address, network, created_at
             FROM wallets ORDER BY created_at DESC",
        )?;

        let wallet_iter = stmt.query_map([], wallet_from_row)?;

        let mut wallets = Vec::new();
        for wallet in wallet_iter {
            wallets.push(wallet?);
        }

        Ok(wallets)
    }

    pub async fn delete_wallet(&self, name: &str) -> Result<bool> {
        let conn = self.storage.get_connection().await;
        let removed = conn.execute("DELETE FROM wallets WHERE name = ?1", params![name])?;
        Ok(removed > 0)
    }

    pub async fn wallet_exists(&self, name: &str) -> Result<bool> {
        let conn = self.storage.get_connection().await;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM wallets WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        Ok(count > 0)
    }
}

fn wallet_from_row(row: &Row<'_>) -> rusqlite::Result<WalletData> {
    let network_str: String = row.get(3)?;
    let network = network_str.parse().unwrap_or_default();

    Ok(WalletData {
        id: row.get(0)?,
        name: row.get(1)?,
        address: row.get(2)?,
        network,
        created_at: DateTime::from_timestamp(row.get(4)?, 0).unwrap_or_else(Utc::now),
    })
}
