//! Per-player match state.
//!
//! A `MatchSession` is a plain value owned by whoever drives the match, so any
//! number of them can run side by side. Only the controller mutates it.

use crate::commitment::ChoiceCommitment;
use rps_core::{evaluate, prize_for, Amount, Game, GameStatus, GameSubscription, Move, Outcome, Role};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Screens in flow order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Screen {
    Create,
    Join,
    Selection,
    Waiting,
    Result,
}

impl Screen {
    /// Target of the back action, if the screen has one
    pub fn back_target(&self) -> Option<Screen> {
        match self {
            Screen::Join => Some(Screen::Create),
            Screen::Selection => Some(Screen::Join),
            Screen::Waiting => Some(Screen::Selection),
            Screen::Create | Screen::Result => None,
        }
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Screen::Create => "create",
            Screen::Join => "join",
            Screen::Selection => "selection",
            Screen::Waiting => "waiting",
            Screen::Result => "result",
        };
        f.write_str(name)
    }
}

/// Outcome of a finished match from one player's point of view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub game_id: Uuid,
    pub outcome: Outcome,
    pub own_move: Move,
    pub opponent_move: Move,
    pub prize: Amount,
}

impl MatchResult {
    /// `None` when the prize does not fit in an `Amount`
    pub fn compute(game_id: Uuid, own_move: Move, opponent_move: Move, bet: Amount) -> Option<Self> {
        let outcome = evaluate(own_move, opponent_move);
        Some(Self {
            game_id,
            outcome,
            own_move,
            opponent_move,
            prize: prize_for(outcome, bet)?,
        })
    }

    /// Result for `role` once both choices are stored
    pub fn from_game(game: &Game, role: Role) -> Option<Self> {
        let own = role.choice_in(game)?;
        let opponent = role.opponent_choice_in(game)?;
        Self::compute(game.id, own, opponent, game.bet_amount)
    }
}

#[derive(Debug)]
pub struct MatchSession {
    pub(crate) screen: Screen,
    pub(crate) game: Option<Game>,
    pub(crate) role: Option<Role>,
    pub(crate) chosen: Option<Move>,
    pub(crate) commitment: Option<ChoiceCommitment>,
    pub(crate) result: Option<MatchResult>,
    pub(crate) subscription: Option<GameSubscription>,
}

impl Default for MatchSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchSession {
    pub fn new() -> Self {
        Self {
            screen: Screen::Create,
            game: None,
            role: None,
            chosen: None,
            commitment: None,
            result: None,
            subscription: None,
        }
    }

    /// Rebuild a session from a stored game.
    ///
    /// Returns `None` when `address` plays no part in the game. A cancelled
    /// game yields a fresh session on the create screen.
    pub fn resume(game: Game, address: &str) -> Option<Self> {
        let role = Role::of(&game, address)?;
        let own_choice = role.choice_in(&game);

        let screen = match game.status {
            GameStatus::Cancelled => return Some(Self::new()),
            GameStatus::Waiting => Screen::Join,
            GameStatus::Completed => Screen::Result,
            GameStatus::Active | GameStatus::Revealing => {
                if own_choice.is_some() {
                    Screen::Waiting
                } else {
                    Screen::Selection
                }
            }
        };

        let result = if screen == Screen::Result {
            MatchResult::from_game(&game, role)
        } else {
            None
        };

        Some(Self {
            screen,
            role: Some(role),
            chosen: own_choice,
            commitment: None,
            result,
            game: Some(game),
            subscription: None,
        })
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn game(&self) -> Option<&Game> {
        self.game.as_ref()
    }

    pub fn game_id(&self) -> Option<Uuid> {
        self.game.as_ref().map(|g| g.id)
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn chosen(&self) -> Option<Move> {
        self.chosen
    }

    pub fn commitment(&self) -> Option<&ChoiceCommitment> {
        self.commitment.as_ref()
    }

    pub fn result(&self) -> Option<&MatchResult> {
        self.result.as_ref()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Drop the subscription and everything tied to the current game
    pub(crate) fn clear(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.game = None;
        self.role = None;
        self.chosen = None;
        self.commitment = None;
        self.result = None;
        self.screen = Screen::Create;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rps_core::GameUpdate;

    fn game_between(creator: &str, joiner: &str) -> Game {
        let mut game = Game::new(creator.to_string(), Amount::from_nano(1_000), None);
        game.apply(&GameUpdate::join(joiner)).unwrap();
        game
    }

    #[test]
    fn test_back_targets() {
        assert_eq!(Screen::Join.back_target(), Some(Screen::Create));
        assert_eq!(Screen::Selection.back_target(), Some(Screen::Join));
        assert_eq!(Screen::Waiting.back_target(), Some(Screen::Selection));
        assert_eq!(Screen::Result.back_target(), None);
        assert_eq!(Screen::Create.back_target(), None);
    }

    #[test]
    fn test_resume_screens() {
        let waiting = Game::new("EQc".to_string(), Amount::from_nano(1_000), None);
        let session = MatchSession::resume(waiting.clone(), "EQc").unwrap();
        assert_eq!(session.screen(), Screen::Join);
        assert_eq!(session.role(), Some(Role::Creator));
        assert!(MatchSession::resume(waiting, "EQstranger").is_none());

        let mut game = game_between("EQc", "EQj");
        let session = MatchSession::resume(game.clone(), "EQj").unwrap();
        assert_eq!(session.screen(), Screen::Selection);
        assert_eq!(session.role(), Some(Role::Joiner));

        game.apply(&GameUpdate::choice(Role::Joiner, Move::Paper, None))
            .unwrap();
        let joiner = MatchSession::resume(game.clone(), "EQj").unwrap();
        assert_eq!(joiner.screen(), Screen::Waiting);
        assert_eq!(joiner.chosen(), Some(Move::Paper));
        let creator = MatchSession::resume(game.clone(), "EQc").unwrap();
        assert_eq!(creator.screen(), Screen::Selection);

        game.apply(&GameUpdate::choice(Role::Creator, Move::Rock, None))
            .unwrap();
        let creator = MatchSession::resume(game, "EQc").unwrap();
        assert_eq!(creator.screen(), Screen::Result);
        let result = creator.result().unwrap();
        assert_eq!(result.outcome, Outcome::Lose);
        assert_eq!(result.prize, Amount::ZERO);
    }

    #[test]
    fn test_resume_cancelled_starts_over() {
        let mut game = Game::new("EQc".to_string(), Amount::from_nano(1_000), None);
        game.apply(&GameUpdate::cancel()).unwrap();
        let session = MatchSession::resume(game, "EQc").unwrap();
        assert_eq!(session.screen(), Screen::Create);
        assert!(session.game().is_none());
    }

    #[test]
    fn test_result_picks_opponent_by_role() {
        let mut game = game_between("EQc", "EQj");
        game.apply(&GameUpdate::choice(Role::Creator, Move::Scissors, None))
            .unwrap();
        game.apply(&GameUpdate::choice(Role::Joiner, Move::Paper, None))
            .unwrap();

        let creator = MatchResult::from_game(&game, Role::Creator).unwrap();
        assert_eq!(creator.outcome, Outcome::Win);
        assert_eq!(creator.opponent_move, Move::Paper);
        assert_eq!(creator.prize, Amount::from_nano(2_000));

        let joiner = MatchResult::from_game(&game, Role::Joiner).unwrap();
        assert_eq!(joiner.outcome, Outcome::Lose);
        assert_eq!(joiner.opponent_move, Move::Scissors);
    }
}
