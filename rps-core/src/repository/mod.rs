//! Game record repository: the contract the match controller depends on and
//! its SQLite implementation.

pub mod subscription;

pub use subscription::{GameSubscription, SubscriptionGuard, SubscriptionTracker};

use crate::error::{Result, RpsError};
use crate::storage::{GameStore, PlayerStore, Storage};
use crate::types::{Amount, Game, GameFilter, GameStatus, GameUpdate, PlayerRecord};
use async_trait::async_trait;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

#[async_trait]
pub trait GameRepository: Send + Sync {
    /// Insert a new `waiting` game
    async fn insert_game(&self, creator_address: &str, bet_amount: Amount) -> Result<Game>;

    async fn get_game(&self, id: Uuid) -> Result<Game>;

    /// Write only if the stored status equals `expected`, else `RpsError::Conflict`
    async fn conditional_update_game(
        &self,
        id: Uuid,
        expected: GameStatus,
        update: GameUpdate,
    ) -> Result<Game>;

    async fn update_game(&self, id: Uuid, update: GameUpdate) -> Result<Game>;

    /// Create the player if absent, else bump its games-played counter
    async fn upsert_player(&self, address: &str) -> Result<()>;

    async fn get_player(&self, address: &str) -> Result<Option<PlayerRecord>>;

    async fn list_games(&self, filter: GameFilter) -> Result<Vec<Game>>;

    async fn subscribe(&self, id: Uuid) -> Result<GameSubscription>;
}

#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    /// How often subscriptions re-read the row to catch writes from other processes
    pub poll_interval: Duration,
    /// Lifetime of a `waiting` game before it can no longer be joined
    pub game_ttl: Option<Duration>,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            game_ttl: Some(Duration::from_secs(3600)), // 1 hour
        }
    }
}

pub struct SqliteRepository {
    storage: Arc<Storage>,
    config: RepositoryConfig,
    notifier: broadcast::Sender<Game>,
    tracker: SubscriptionTracker,
}

impl SqliteRepository {
    pub async fn open(data_dir: &Path, config: RepositoryConfig) -> Result<Self> {
        let storage = Arc::new(Storage::new(&data_dir.join("rps.db")).await?);
        Ok(Self::new(storage, config))
    }

    pub async fn in_memory() -> Result<Self> {
        let storage = Arc::new(Storage::in_memory().await?);
        Ok(Self::new(storage, RepositoryConfig::default()))
    }

    pub fn new(storage: Arc<Storage>, config: RepositoryConfig) -> Self {
        let (notifier, _) = broadcast::channel(64);
        Self {
            storage,
            config,
            notifier,
            tracker: SubscriptionTracker::new(),
        }
    }

    pub fn storage(&self) -> Arc<Storage> {
        self.storage.clone()
    }

    pub fn active_subscriptions(&self, id: &Uuid) -> usize {
        self.tracker.count(id)
    }

    fn publish(&self, game: &Game) {
        // No receivers is fine
        let _ = self.notifier.send(game.clone());
    }

    async fn write(
        &self,
        id: Uuid,
        expected: Option<GameStatus>,
        update: GameUpdate,
    ) -> Result<Game> {
        let game = GameStore::new(&self.storage)
            .update_game(id, expected, &update)
            .await?;

        tracing::debug!("Game {} now {} (v{})", game.id, game.status, game.version);
        self.publish(&game);
        Ok(game)
    }
}

#[async_trait]
impl GameRepository for SqliteRepository {
    async fn insert_game(&self, creator_address: &str, bet_amount: Amount) -> Result<Game> {
        if bet_amount.is_zero() {
            return Err(RpsError::InvalidAmount("bet must be positive".to_string()));
        }

        let expires_at = match self.config.game_ttl {
            Some(ttl) => Some(
                Utc::now()
                    + chrono::Duration::from_std(ttl)
                        .map_err(|e| RpsError::config(format!("Invalid game ttl: {}", e)))?,
            ),
            None => None,
        };

        let game = Game::new(creator_address.to_string(), bet_amount, expires_at);
        GameStore::new(&self.storage).insert_game(&game).await?;

        tracing::info!(
            "Game {} created by {} with bet {}",
            game.id,
            creator_address,
            bet_amount
        );
        self.publish(&game);
        Ok(game)
    }

    async fn get_game(&self, id: Uuid) -> Result<Game> {
        GameStore::new(&self.storage).load_game(id).await
    }

    async fn conditional_update_game(
        &self,
        id: Uuid,
        expected: GameStatus,
        update: GameUpdate,
    ) -> Result<Game> {
        self.write(id, Some(expected), update).await
    }

    async fn update_game(&self, id: Uuid, update: GameUpdate) -> Result<Game> {
        self.write(id, None, update).await
    }

    async fn upsert_player(&self, address: &str) -> Result<()> {
        PlayerStore::new(&self.storage).upsert_player(address).await
    }

    async fn get_player(&self, address: &str) -> Result<Option<PlayerRecord>> {
        PlayerStore::new(&self.storage).load_player(address).await
    }

    async fn list_games(&self, filter: GameFilter) -> Result<Vec<Game>> {
        GameStore::new(&self.storage).list_games(&filter).await
    }

    async fn subscribe(&self, id: Uuid) -> Result<GameSubscription> {
        // Receiver first, so nothing published after the version read is missed
        let mut updates = self.notifier.subscribe();
        let mut last_version = GameStore::new(&self.storage)
            .game_version(id)
            .await?
            .ok_or(RpsError::GameNotFound(id))?;

        let guard = self.tracker.register(id);
        let (tx, rx) = mpsc::channel(16);
        let storage = self.storage.clone();
        let poll_interval = self.config.poll_interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut broadcast_open = true;

            loop {
                let candidate = tokio::select! {
                    biased;

                    received = updates.recv(), if broadcast_open => match received {
                        Ok(game) if game.id == id => Some(game),
                        Ok(_) => None,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::debug!("Subscription for {} lagged by {}", id, skipped);
                            load_game(&storage, id).await
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            broadcast_open = false;
                            None
                        }
                    },
                    _ = ticker.tick() => load_game(&storage, id).await,
                };

                if let Some(game) = candidate {
                    if game.version > last_version {
                        last_version = game.version;
                        if tx.send(game).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        tracing::debug!("Subscribed to game {}", id);
        Ok(GameSubscription::new(id, rx, task, guard))
    }
}

async fn load_game(storage: &Storage, id: Uuid) -> Option<Game> {
    match GameStore::new(storage).find_game(id).await {
        Ok(game) => game,
        Err(e) => {
            tracing::warn!("Failed to poll game {}: {}", id, e);
            None
        }
    }
}
