pub mod balance;
pub mod game;
pub mod play;
pub mod wallet;

pub use wallet::{handle_wallet_command, WalletCommands};

use crate::config::CliConfig;
use rps_core::storage::Storage;
use rps_core::{
    BalanceFetcher, BalanceTracker, LocalWallet, Network, RpsError, SqliteRepository,
    WalletConnector, WalletManager,
};
use rps_match::{MatchController, MatchError};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] RpsError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error("Invalid game id '{0}'")]
    InvalidGameId(String),

    #[error("Prompt failed: {0}")]
    Dialog(String),
}

impl From<dialoguer::Error> for CliError {
    fn from(err: dialoguer::Error) -> Self {
        CliError::Dialog(err.to_string())
    }
}

/// Everything a command needs, sharing one database connection
pub struct App {
    pub config: CliConfig,
    pub manager: WalletManager,
    pub repository: Arc<SqliteRepository>,
}

impl App {
    pub async fn open(data_dir: &Path, config: CliConfig) -> Result<Self> {
        let storage = Arc::new(Storage::new(&data_dir.join("rps.db")).await?);
        let repository = Arc::new(SqliteRepository::new(
            storage.clone(),
            config.match_config().repository_config(),
        ));
        Ok(Self {
            manager: WalletManager::with_storage(storage),
            repository,
            config,
        })
    }

    /// Load and connect a wallet
    pub async fn connect(&self, name: &str) -> Result<Arc<LocalWallet>> {
        let wallet = self.manager.load_wallet(name).await?;
        wallet.connect().await?;
        Ok(wallet)
    }

    pub fn balance_tracker(&self, network: Network) -> Result<Arc<BalanceTracker>> {
        let fetcher = BalanceFetcher::new(self.config.wallet_config(network))?;
        Ok(Arc::new(BalanceTracker::new(Arc::new(fetcher))))
    }

    /// Controller acting as the named wallet; the balance is fetched on demand
    pub async fn controller(&self, wallet_name: &str) -> Result<(MatchController, Arc<LocalWallet>)> {
        let wallet = self.connect(wallet_name).await?;
        let mut controller = MatchController::new(
            self.repository.clone(),
            wallet.clone(),
            self.config.match_config(),
        );

        if self.config.check_balance {
            let tracker = self.balance_tracker(wallet.network())?;
            controller = controller.with_balance(tracker);
        }

        Ok((controller, wallet))
    }
}

pub fn parse_game_id(input: &str) -> Result<Uuid> {
    Uuid::parse_str(input.trim()).map_err(|_| CliError::InvalidGameId(input.to_string()))
}

/// Shorten an address for tables
pub fn short_address(address: &str) -> String {
    if address.chars().count() <= 14 {
        return address.to_string();
    }
    let head: String = address.chars().take(6).collect();
    let tail: String = address
        .chars()
        .rev()
        .take(6)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("{}...{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_address() {
        assert_eq!(short_address("EQshort"), "EQshort");
        assert_eq!(
            short_address("0:aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaab"),
            "0:aaaa...aaaaab"
        );
    }

    #[test]
    fn test_parse_game_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_game_id(&format!(" {} ", id)).unwrap(), id);
        assert!(matches!(parse_game_id("nope"), Err(CliError::InvalidGameId(_))));
    }
}
