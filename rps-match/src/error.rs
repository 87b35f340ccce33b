use crate::session::Screen;
use rps_core::{Amount, RpsError};
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, MatchError>;

#[derive(Error, Debug)]
pub enum MatchError {
    #[error("Wallet not connected")]
    NotConnected,

    #[error("Insufficient funds: need {need}, have {available}")]
    InsufficientFunds { need: Amount, available: Amount },

    #[error("Game {0} was already taken by another player")]
    JoinConflict(Uuid),

    #[error("Repository failure: {0}")]
    Repository(RpsError),

    #[error("Balance unavailable: {0}")]
    BalanceUnavailable(String),

    #[error("Invalid bet: {0}")]
    InvalidBet(String),

    #[error("Cannot {action} on the {screen} screen: {reason}")]
    InvalidAction {
        action: &'static str,
        screen: Screen,
        reason: String,
    },

    #[error("Choice already submitted")]
    ChoiceAlreadySubmitted,

    #[error("Game not found: {0}")]
    GameNotFound(Uuid),

    #[error("Timed out: {0}")]
    Timeout(String),
}

impl MatchError {
    pub fn invalid_action(action: &'static str, screen: Screen, reason: impl Into<String>) -> Self {
        Self::InvalidAction {
            action,
            screen,
            reason: reason.into(),
        }
    }

    /// Local checks that block an action before anything is written
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::InsufficientFunds { .. } | Self::InvalidBet(_)
        )
    }
}

impl From<RpsError> for MatchError {
    fn from(err: RpsError) -> Self {
        match err {
            RpsError::GameNotFound(id) => MatchError::GameNotFound(id),
            RpsError::ChoiceAlreadySet { .. } => MatchError::ChoiceAlreadySubmitted,
            other => MatchError::Repository(other),
        }
    }
}
