use crate::controller::{MatchConfig, MatchController};
use crate::error::Result;
use crate::session::MatchSession;
use rand::seq::SliceRandom;
use rps_core::{GameRepository, LocalWallet, Move, Network, WalletConfig, WalletConnector};
use std::sync::Arc;
use uuid::Uuid;

/// House player for single-player demo matches.
///
/// It joins the player's game like any other opponent, but never writes its
/// move; the player's controller resolves the match on a timer instead.
pub struct DemoOpponent {
    controller: MatchController,
    session: MatchSession,
}

impl DemoOpponent {
    pub const ADDRESS: &'static str = "0:0000000000000000000000000000000000000000000000000000000000000000";

    pub async fn new(repository: Arc<dyn GameRepository>, config: MatchConfig) -> Result<Self> {
        let wallet = Arc::new(LocalWallet::new(
            "house".to_string(),
            "house".to_string(),
            Self::ADDRESS.to_string(),
            WalletConfig::new(Network::Testnet),
        ));
        wallet.connect().await?;

        Ok(Self {
            controller: MatchController::new(repository, wallet, config),
            session: MatchSession::new(),
        })
    }

    /// Take the player's open game
    pub async fn join(&mut self, game_id: Uuid) -> Result<()> {
        self.controller.reset(&mut self.session);
        self.controller.open_game(&mut self.session, game_id).await?;
        self.controller.join_game(&mut self.session).await?;
        tracing::debug!("House joined demo game {}", game_id);
        Ok(())
    }

    pub fn pick_move(&self) -> Move {
        *Move::ALL
            .choose(&mut rand::thread_rng())
            .unwrap_or(&Move::Rock)
    }

    /// Leave the current game
    pub fn release(&mut self) {
        self.controller.reset(&mut self.session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Screen;
    use rps_core::{Amount, GameStatus, Outcome, SqliteRepository};
    use std::time::Duration;

    #[tokio::test]
    async fn test_demo_match_resolves_on_timer() {
        let repo = Arc::new(SqliteRepository::in_memory().await.unwrap());
        let config = MatchConfig {
            demo_delay: Duration::from_millis(10),
            poll_interval: Duration::from_millis(20),
            ..Default::default()
        };

        let player = Arc::new(LocalWallet::new(
            "p".to_string(),
            "player".to_string(),
            "EQplayer".to_string(),
            WalletConfig::new(Network::Testnet),
        ));
        player.connect().await.unwrap();
        let controller = MatchController::new(repo.clone(), player, config.clone());
        let mut house = DemoOpponent::new(repo.clone(), config).await.unwrap();

        let mut session = MatchSession::new();
        let game = controller
            .create_game(&mut session, Amount::from_nano(500))
            .await
            .unwrap();
        house.join(game.id).await.unwrap();

        controller
            .wait_for_opponent(&mut session, Some(Duration::from_secs(5)))
            .await
            .unwrap();
        controller.submit_choice(&mut session, Move::Paper).await.unwrap();

        let result = controller
            .resolve_after_timer(&mut session, Move::Rock)
            .await
            .unwrap();
        assert_eq!(result.outcome, Outcome::Win);
        assert_eq!(result.prize, Amount::from_nano(1_000));
        assert_eq!(session.screen(), Screen::Result);

        // The house move is never stored
        let stored = repo.get_game(game.id).await.unwrap();
        assert_eq!(stored.status, GameStatus::Revealing);
        assert_eq!(stored.joiner_choice, None);

        house.release();
        assert!(Move::ALL.contains(&house.pick_move()));
    }
}
