use crate::types::{GameStatus, Role};
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, RpsError>;

#[derive(Error, Debug)]
pub enum RpsError {
    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Balance provider error: {0}")]
    Provider(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Game not found: {0}")]
    GameNotFound(Uuid),

    #[error("Conflict on game {id}: expected status {expected}, found {actual}")]
    Conflict {
        id: Uuid,
        expected: GameStatus,
        actual: GameStatus,
    },

    #[error("The {role} choice for game {id} is already set")]
    ChoiceAlreadySet { id: Uuid, role: Role },

    #[error("Invalid game update: {0}")]
    InvalidUpdate(String),

    #[error("Wallet not found: {name}")]
    WalletNotFound { name: String },

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid move: {0}")]
    InvalidMove(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RpsError {
    pub fn wallet(msg: impl Into<String>) -> Self {
        Self::Wallet(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    pub fn invalid_update(msg: impl Into<String>) -> Self {
        Self::InvalidUpdate(msg.into())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
