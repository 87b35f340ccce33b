//! Rock-paper-scissors rules: move dominance, outcome and prize.

use crate::error::{Result, RpsError};
use crate::types::{Amount, Game, GameStatus, Role};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Move {
    Rock,
    Paper,
    Scissors,
}

impl Move {
    pub const ALL: [Move; 3] = [Move::Rock, Move::Paper, Move::Scissors];

    pub fn as_str(&self) -> &'static str {
        match self {
            Move::Rock => "rock",
            Move::Paper => "paper",
            Move::Scissors => "scissors",
        }
    }

    /// The move this one defeats
    pub fn beats(&self) -> Move {
        match self {
            Move::Rock => Move::Scissors,
            Move::Scissors => Move::Paper,
            Move::Paper => Move::Rock,
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Move {
    type Err = RpsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rock" => Ok(Move::Rock),
            "paper" => Ok(Move::Paper),
            "scissors" => Ok(Move::Scissors),
            other => Err(RpsError::InvalidMove(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Lose,
    Draw,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Win => f.write_str("win"),
            Outcome::Lose => f.write_str("lose"),
            Outcome::Draw => f.write_str("draw"),
        }
    }
}

/// Outcome for the holder of `own` against `opponent`
pub fn evaluate(own: Move, opponent: Move) -> Outcome {
    if own == opponent {
        Outcome::Draw
    } else if own.beats() == opponent {
        Outcome::Win
    } else {
        Outcome::Lose
    }
}

/// Payout to one player: the whole pot on a win, the stake back on a draw.
/// `None` when the pot does not fit in an `Amount`.
pub fn prize_for(outcome: Outcome, bet: Amount) -> Option<Amount> {
    match outcome {
        Outcome::Win => bet.checked_mul(2),
        Outcome::Draw => Some(bet),
        Outcome::Lose => Some(Amount::ZERO),
    }
}

/// Record winner and prize on a game whose two choices are both known
pub(crate) fn settle(game: &mut Game) -> Result<()> {
    let (Some(creator), Some(joiner)) = (game.creator_choice, game.joiner_choice) else {
        return Err(RpsError::internal(format!(
            "game {} cannot settle before both choices are in",
            game.id
        )));
    };

    let outcome = evaluate(creator, joiner);
    game.winner_address = match outcome {
        Outcome::Win => Role::Creator.address_in(game).map(str::to_string),
        Outcome::Lose => Role::Joiner.address_in(game).map(str::to_string),
        Outcome::Draw => None,
    };
    let prize = match outcome {
        Outcome::Draw => prize_for(Outcome::Draw, game.bet_amount),
        _ => prize_for(Outcome::Win, game.bet_amount),
    };
    game.prize_amount = Some(prize.ok_or_else(|| {
        RpsError::internal(format!("prize for game {} overflows", game.id))
    })?);
    game.status = GameStatus::Completed;

    tracing::info!(
        "Game {} settled: creator {} vs joiner {} -> creator {}",
        game.id,
        creator,
        joiner,
        outcome
    );
    Ok(())
}
