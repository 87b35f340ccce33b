//! Match flow for two-player rock-paper-scissors wagers
//!
//! A [`MatchSession`] holds one player's view of a game and the screen it is
//! on. [`MatchController`] moves it between screens, writing through a
//! [`rps_core::GameRepository`] and reacting to its change notifications.

pub mod commitment;
pub mod controller;
pub mod demo;
pub mod error;
pub mod session;

pub use commitment::ChoiceCommitment;
pub use controller::{MatchConfig, MatchController};
pub use demo::DemoOpponent;
pub use error::{MatchError, Result};
pub use session::{MatchResult, MatchSession, Screen};
