//! Core library for rock-paper-scissors wagers
//!
//! Game and player records, the result rules, a SQLite-backed game repository
//! with conditional updates and change subscriptions, wallet identities and
//! balance lookups.

pub mod balance;
pub mod error;
pub mod repository;
pub mod rules;
pub mod storage;
pub mod types;
pub mod wallet;

pub use balance::{BalanceFetcher, BalanceState, BalanceTracker};
pub use error::{Result, RpsError};
pub use repository::{GameRepository, GameSubscription, RepositoryConfig, SqliteRepository};
pub use rules::{evaluate, prize_for, Move, Outcome};
pub use types::{Amount, Game, GameFilter, GameStatus, GameUpdate, Network, PlayerRecord, Role};
pub use wallet::{LocalWallet, WalletConfig, WalletConnector, WalletManager};

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_repository_on_disk() {
        let temp_dir = tempdir().unwrap();
        let repo = SqliteRepository::open(temp_dir.path(), RepositoryConfig::default())
            .await
            .unwrap();

        let game = repo
            .insert_game("EQcreator", Amount::from_nano(1_000_000_000))
            .await
            .unwrap();
        drop(repo);

        let reopened = SqliteRepository::open(temp_dir.path(), RepositoryConfig::default())
            .await
            .unwrap();
        let loaded = reopened.get_game(game.id).await.unwrap();
        assert_eq!(loaded.creator_address, "EQcreator");
        assert_eq!(loaded.status, GameStatus::Waiting);
    }
}
