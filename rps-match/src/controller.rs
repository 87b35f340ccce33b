//! Screen state machine for one player's match.
//!
//! Forward transitions (`create`, `join`, `submit`) each perform one repository
//! write and only touch the session once that write succeeded. Everything past
//! a write is driven by the stored game: `Waiting → Result` follows change
//! notifications or, in demo mode, a timer.

use crate::commitment::ChoiceCommitment;
use crate::error::{MatchError, Result};
use crate::session::{MatchResult, MatchSession, Screen};
use rps_core::{
    Amount, BalanceState, BalanceTracker, Game, GameRepository, GameStatus, GameUpdate, Move,
    RepositoryConfig, Role, RpsError, WalletConnector,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// How long a `waiting` game stays joinable
    pub game_ttl: Option<Duration>,
    pub poll_interval: Duration,
    /// Delay before a demo match resolves
    pub demo_delay: Duration,
    /// Upper bound for `wait_for_result`; `None` waits forever
    pub result_timeout: Option<Duration>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        let repository = RepositoryConfig::default();
        Self {
            game_ttl: repository.game_ttl,
            poll_interval: repository.poll_interval,
            demo_delay: Duration::from_secs(3),
            result_timeout: None,
        }
    }
}

impl MatchConfig {
    pub fn repository_config(&self) -> RepositoryConfig {
        RepositoryConfig {
            poll_interval: self.poll_interval,
            game_ttl: self.game_ttl,
        }
    }
}

pub struct MatchController {
    repository: Arc<dyn GameRepository>,
    wallet: Arc<dyn WalletConnector>,
    balance: Option<Arc<BalanceTracker>>,
    config: MatchConfig,
}

impl MatchController {
    pub fn new(
        repository: Arc<dyn GameRepository>,
        wallet: Arc<dyn WalletConnector>,
        config: MatchConfig,
    ) -> Self {
        Self {
            repository,
            wallet,
            balance: None,
            config,
        }
    }

    pub fn with_balance(mut self, tracker: Arc<BalanceTracker>) -> Self {
        self.balance = Some(tracker);
        self
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn repository(&self) -> &Arc<dyn GameRepository> {
        &self.repository
    }

    fn address(&self) -> Result<String> {
        self.wallet.address().ok_or(MatchError::NotConnected)
    }

    /// Point the balance tracker at the connected wallet, if one is attached
    pub async fn refresh_balance(&self) {
        if let Some(tracker) = &self.balance {
            let address = self.wallet.address();
            if !tracker.observe(address.as_deref(), self.wallet.network()).await {
                tracker.refresh().await;
            }
        }
    }

    pub fn balance(&self) -> Result<Amount> {
        let Some(tracker) = &self.balance else {
            return Err(MatchError::BalanceUnavailable(
                "no balance source attached".to_string(),
            ));
        };
        match tracker.state() {
            BalanceState::Ready(snapshot) => Ok(snapshot.amount),
            BalanceState::Unavailable { reason } => Err(MatchError::BalanceUnavailable(reason)),
            BalanceState::Loading => Err(MatchError::BalanceUnavailable("loading".to_string())),
            BalanceState::Idle => Err(MatchError::BalanceUnavailable("not fetched".to_string())),
        }
    }

    /// Only a known balance can block a bet
    fn check_funds(&self, need: Amount) -> Result<()> {
        let known = self.balance.as_ref().and_then(|t| t.known_balance());
        match known {
            Some(available) if need > available => {
                Err(MatchError::InsufficientFunds { need, available })
            }
            _ => Ok(()),
        }
    }

    fn expect_screen(session: &MatchSession, screen: Screen, action: &'static str) -> Result<()> {
        if session.screen != screen {
            return Err(MatchError::invalid_action(
                action,
                session.screen,
                format!("only allowed on the {} screen", screen),
            ));
        }
        Ok(())
    }

    async fn record_player(&self, address: &str) {
        if let Err(e) = self.repository.upsert_player(address).await {
            tracing::warn!("Failed to record player {}: {}", address, e);
        }
    }

    async fn ensure_subscribed(&self, session: &mut MatchSession) -> Result<()> {
        if session.subscription.is_some() {
            return Ok(());
        }
        let id = session
            .game_id()
            .ok_or_else(|| MatchError::invalid_action("subscribe", session.screen, "no game"))?;
        session.subscription = Some(self.repository.subscribe(id).await?);
        Ok(())
    }

    /// A failure here is logged only; `wait_for` subscribes again
    async fn subscribe_after_write(&self, session: &mut MatchSession) {
        if let Err(e) = self.ensure_subscribed(session).await {
            tracing::warn!("Subscription for {:?} failed: {}", session.game_id(), e);
        }
    }

    pub async fn create_game(&self, session: &mut MatchSession, bet: Amount) -> Result<Game> {
        Self::expect_screen(session, Screen::Create, "create a game")?;
        let address = self.address()?;
        if bet.is_zero() {
            return Err(MatchError::InvalidBet("bet must be greater than zero".to_string()));
        }
        if bet.checked_mul(2).is_none() {
            return Err(MatchError::InvalidBet(format!("{} is too large", bet)));
        }
        self.check_funds(bet)?;

        let game = self.repository.insert_game(&address, bet).await?;
        self.record_player(&address).await;

        session.game = Some(game.clone());
        session.role = Some(Role::Creator);
        session.screen = Screen::Join;
        self.subscribe_after_write(session).await;

        Ok(game)
    }

    /// Load a stored game to join it, or to resume it as a participant
    pub async fn open_game(&self, session: &mut MatchSession, id: Uuid) -> Result<Game> {
        Self::expect_screen(session, Screen::Create, "open a game")?;
        let address = self.address()?;
        let game = self.repository.get_game(id).await?;
        if game.status == GameStatus::Cancelled {
            return Err(MatchError::invalid_action("open", session.screen, "game was cancelled"));
        }

        if Role::of(&game, &address).is_some() {
            if let Some(resumed) = MatchSession::resume(game.clone(), &address) {
                *session = resumed;
            }
        } else {
            if game.status != GameStatus::Waiting || game.is_expired(chrono::Utc::now()) {
                return Err(MatchError::JoinConflict(id));
            }
            session.game = Some(game.clone());
            session.role = None;
            session.screen = Screen::Join;
        }

        if session.game.as_ref().map_or(false, |g| !g.status.is_terminal()) {
            self.subscribe_after_write(session).await;
        }
        Ok(game)
    }

    pub async fn join_game(&self, session: &mut MatchSession) -> Result<Game> {
        Self::expect_screen(session, Screen::Join, "join")?;
        let address = self.address()?;
        let game = session
            .game
            .clone()
            .ok_or_else(|| MatchError::invalid_action("join", session.screen, "no game selected"))?;

        if session.role == Some(Role::Creator) || game.creator_address == address {
            return Err(MatchError::invalid_action(
                "join",
                session.screen,
                "creator cannot join own game",
            ));
        }
        // Back on a game we already hold the joiner seat of
        if game.joiner_address.as_deref() == Some(address.as_str()) {
            session.role = Some(Role::Joiner);
            session.screen = Screen::Selection;
            Self::advance(session);
            return Ok(game);
        }
        self.check_funds(game.bet_amount)?;
        if game.is_expired(chrono::Utc::now()) {
            return Err(MatchError::JoinConflict(game.id));
        }

        let joined = match self
            .repository
            .conditional_update_game(game.id, GameStatus::Waiting, GameUpdate::join(&address))
            .await
        {
            Ok(joined) => joined,
            Err(RpsError::Conflict { id, actual, .. }) => {
                tracing::info!("Join of {} lost: game is {}", id, actual);
                return Err(MatchError::JoinConflict(id));
            }
            Err(e) => return Err(e.into()),
        };
        self.record_player(&address).await;

        tracing::info!("{} joined game {}", address, joined.id);
        session.game = Some(joined.clone());
        session.role = Some(Role::Joiner);
        session.screen = Screen::Selection;
        self.subscribe_after_write(session).await;

        Ok(joined)
    }

    pub async fn submit_choice(&self, session: &mut MatchSession, choice: Move) -> Result<Game> {
        Self::expect_screen(session, Screen::Selection, "choose")?;
        self.address()?;
        let (id, role) = match (&session.game, session.role) {
            (Some(game), Some(role)) => (game.id, role),
            _ => {
                return Err(MatchError::invalid_action(
                    "choose",
                    session.screen,
                    "not a participant of this game",
                ))
            }
        };
        if session.chosen.is_some() {
            return Err(MatchError::ChoiceAlreadySubmitted);
        }

        let commitment = ChoiceCommitment::new(choice);
        let update = GameUpdate::choice(role, choice, Some(commitment.hash_hex()));
        let stored = self.repository.update_game(id, update).await?;

        tracing::debug!("{} chose in game {} (commitment {})", role, id, commitment.hash_hex());
        session.chosen = Some(choice);
        session.commitment = Some(commitment);
        session.game = Some(stored.clone());
        session.screen = Screen::Waiting;

        Ok(stored)
    }

    /// Feed a change notification into the session.
    ///
    /// Ignores notifications for other games and versions not newer than the
    /// one held. Returns whether the session changed.
    pub fn apply_update(&self, session: &mut MatchSession, game: Game) -> bool {
        let current = match &session.game {
            Some(current) if current.id == game.id => current.version,
            _ => return false,
        };
        if game.version <= current {
            return false;
        }
        self.absorb(session, game);
        true
    }

    fn absorb(&self, session: &mut MatchSession, game: Game) {
        if game.status == GameStatus::Cancelled {
            tracing::info!("Game {} was cancelled", game.id);
            session.clear();
            return;
        }
        session.game = Some(game);
        Self::advance(session);
    }

    /// Edges driven by the stored game rather than by the player.
    ///
    /// Follows them as far as the game allows, so a participant who stepped
    /// back is carried forward again by the next notification.
    fn advance(session: &mut MatchSession) {
        loop {
            let Some(game) = &session.game else { return };
            let next = match session.screen {
                Screen::Join if session.role.is_some() && game.joiner_address.is_some() => {
                    Screen::Selection
                }
                Screen::Selection if session.chosen.is_some() => Screen::Waiting,
                Screen::Waiting if game.both_choices_made() => {
                    match session.role.and_then(|role| MatchResult::from_game(game, role)) {
                        Some(result) => {
                            session.result = Some(result);
                            Screen::Result
                        }
                        None => return,
                    }
                }
                _ => return,
            };
            session.screen = next;
        }
    }

    /// Drive the session from its subscription until it reaches `target` or
    /// a later screen
    pub async fn wait_for(
        &self,
        session: &mut MatchSession,
        target: Screen,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            Self::advance(session);
            if session.screen >= target {
                return Ok(());
            }
            if session.game.is_none() {
                return Err(MatchError::invalid_action(
                    "wait",
                    session.screen,
                    "game is no longer available",
                ));
            }
            self.ensure_subscribed(session).await?;

            // Catch anything written before the subscription existed
            if let Some(id) = session.game_id() {
                let latest = self.repository.get_game(id).await?;
                if self.apply_update(session, latest) {
                    continue;
                }
            }

            let Some(subscription) = session.subscription.as_mut() else {
                continue;
            };
            let next = match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, subscription.next())
                    .await
                    .map_err(|_| {
                        MatchError::Timeout(format!("no {} screen before deadline", target))
                    })?,
                None => subscription.next().await,
            };

            match next {
                Some(game) => {
                    self.apply_update(session, game);
                }
                None => {
                    // Watcher gone; resubscribe on the next pass
                    session.subscription = None;
                }
            }
        }
    }

    /// Wait on the result of a submitted move. Also picks the match back up
    /// from `Selection` or `Join` when the move is already in.
    pub async fn wait_for_result<'a>(
        &self,
        session: &'a mut MatchSession,
    ) -> Result<&'a MatchResult> {
        Self::advance(session);
        if session.screen != Screen::Result {
            Self::expect_screen(session, Screen::Waiting, "wait for the result")?;
            self.wait_for(session, Screen::Result, self.config.result_timeout)
                .await?;
        }
        session
            .result
            .as_ref()
            .ok_or_else(|| MatchError::invalid_action("wait", session.screen, "no result"))
    }

    /// Creator side of `Join`: wait until someone takes the game
    pub async fn wait_for_opponent(
        &self,
        session: &mut MatchSession,
        timeout: Option<Duration>,
    ) -> Result<()> {
        Self::expect_screen(session, Screen::Join, "wait for an opponent")?;
        if session.role != Some(Role::Creator) {
            return Err(MatchError::invalid_action(
                "wait for an opponent",
                session.screen,
                "only the creator waits for an opponent",
            ));
        }
        self.wait_for(session, Screen::Selection, timeout).await
    }

    /// Demo fallback: resolve against a house move after a fixed delay,
    /// without touching the repository
    pub async fn resolve_after_timer<'a>(
        &self,
        session: &'a mut MatchSession,
        opponent_move: Move,
    ) -> Result<&'a MatchResult> {
        Self::expect_screen(session, Screen::Waiting, "resolve")?;
        let (Some(own), Some(game)) = (session.chosen, session.game.as_ref()) else {
            return Err(MatchError::invalid_action("resolve", session.screen, "no choice made"));
        };
        let (id, bet) = (game.id, game.bet_amount);

        tokio::time::sleep(self.config.demo_delay).await;

        let result = MatchResult::compute(id, own, opponent_move, bet)
            .ok_or_else(|| MatchError::InvalidBet(format!("prize for {} overflows", bet)))?;
        tracing::info!(
            "Demo game {}: {} vs {} -> {}",
            id,
            own,
            opponent_move,
            result.outcome
        );
        session.screen = Screen::Result;
        Ok(session.result.insert(result))
    }

    /// Go one screen back. Leaving `Join` discards the game. No-op on `Create`
    /// and `Result`.
    pub fn back(&self, session: &mut MatchSession) -> Screen {
        match session.screen.back_target() {
            Some(Screen::Create) => session.clear(),
            Some(target) => session.screen = target,
            None => {}
        }
        session.screen
    }

    /// Home / play again
    pub fn reset(&self, session: &mut MatchSession) {
        session.clear();
    }

    /// Withdraw a game nobody joined yet
    pub async fn cancel_game(&self, session: &mut MatchSession) -> Result<Game> {
        Self::expect_screen(session, Screen::Join, "cancel")?;
        let address = self.address()?;
        let id = match (&session.game, session.role) {
            (Some(game), Some(Role::Creator)) if game.creator_address == address => game.id,
            _ => {
                return Err(MatchError::invalid_action(
                    "cancel",
                    session.screen,
                    "only the creator can cancel",
                ))
            }
        };

        let cancelled = match self
            .repository
            .conditional_update_game(id, GameStatus::Waiting, GameUpdate::cancel())
            .await
        {
            Ok(game) => game,
            Err(e) if e.is_conflict() => return Err(MatchError::JoinConflict(id)),
            Err(e) => return Err(e.into()),
        };

        tracing::info!("Game {} cancelled by creator", id);
        session.clear();
        Ok(cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rps_core::balance::BalanceTransport;
    use rps_core::{BalanceFetcher, LocalWallet, Network, Outcome, SqliteRepository, WalletConfig};

    fn wallet(name: &str) -> Arc<LocalWallet> {
        Arc::new(LocalWallet::new(
            format!("{}-id", name),
            name.to_string(),
            format!("EQ{}", name),
            WalletConfig::new(Network::Testnet),
        ))
    }

    async fn connected(name: &str) -> Arc<LocalWallet> {
        let w = wallet(name);
        w.connect().await.unwrap();
        w
    }

    fn controller(repo: &Arc<SqliteRepository>, wallet: Arc<LocalWallet>) -> MatchController {
        let config = MatchConfig {
            poll_interval: Duration::from_millis(20),
            demo_delay: Duration::from_millis(10),
            result_timeout: Some(Duration::from_secs(5)),
            ..Default::default()
        };
        MatchController::new(repo.clone(), wallet, config)
    }

    fn one() -> Amount {
        Amount::from_nano(1_000_000_000)
    }

    async fn repo() -> Arc<SqliteRepository> {
        Arc::new(SqliteRepository::in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_end_to_end_creator_wins() {
        let repo = repo().await;
        let alice = controller(&repo, connected("alice").await);
        let bob = controller(&repo, connected("bob").await);

        let mut creator = MatchSession::new();
        let game = alice.create_game(&mut creator, one()).await.unwrap();
        assert_eq!(game.status, GameStatus::Waiting);
        assert_eq!(creator.screen(), Screen::Join);

        let mut joiner = MatchSession::new();
        bob.open_game(&mut joiner, game.id).await.unwrap();
        let joined = bob.join_game(&mut joiner).await.unwrap();
        assert_eq!(joined.status, GameStatus::Active);
        assert_eq!(joined.joiner_address.as_deref(), Some("EQbob"));
        assert_eq!(joiner.screen(), Screen::Selection);

        alice
            .wait_for_opponent(&mut creator, Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(creator.screen(), Screen::Selection);

        alice.submit_choice(&mut creator, Move::Rock).await.unwrap();
        assert_eq!(creator.screen(), Screen::Waiting);
        let settled = bob.submit_choice(&mut joiner, Move::Scissors).await.unwrap();
        assert_eq!(settled.status, GameStatus::Completed);
        // The settling write still leaves the submitter waiting
        assert_eq!(joiner.screen(), Screen::Waiting);
        assert!(joiner.result().is_none());
        bob.wait_for_result(&mut joiner).await.unwrap();
        assert_eq!(joiner.screen(), Screen::Result);

        let result = alice.wait_for_result(&mut creator).await.unwrap().clone();
        assert_eq!(result.outcome, Outcome::Win);
        assert_eq!(result.prize, Amount::from_nano(2_000_000_000));
        assert_eq!(result.opponent_move, Move::Scissors);

        let loser = joiner.result().unwrap();
        assert_eq!(loser.outcome, Outcome::Lose);
        assert_eq!(loser.prize, Amount::ZERO);

        let stored = repo.get_game(game.id).await.unwrap();
        assert_eq!(stored.status, GameStatus::Completed);
        assert_eq!(stored.winner_address.as_deref(), Some("EQalice"));
        assert_eq!(stored.prize_amount, Some(Amount::from_nano(2_000_000_000)));
        assert!(stored.creator_choice_hash.is_some());
        assert_eq!(repo.get_player("EQbob").await.unwrap().unwrap().games_played, 1);
    }

    #[tokio::test]
    async fn test_concurrent_joins_one_wins() {
        let repo = repo().await;
        let alice = controller(&repo, connected("alice").await);
        let bob = controller(&repo, connected("bob").await);
        let carol = controller(&repo, connected("carol").await);

        let mut creator = MatchSession::new();
        let game = alice.create_game(&mut creator, one()).await.unwrap();

        let mut s1 = MatchSession::new();
        let mut s2 = MatchSession::new();
        bob.open_game(&mut s1, game.id).await.unwrap();
        carol.open_game(&mut s2, game.id).await.unwrap();

        let (r1, r2) = tokio::join!(bob.join_game(&mut s1), carol.join_game(&mut s2));

        let outcomes = [r1.is_ok(), r2.is_ok()];
        assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
        let loser = if r1.is_ok() { r2 } else { r1 };
        assert!(matches!(loser, Err(MatchError::JoinConflict(id)) if id == game.id));

        let stored = repo.get_game(game.id).await.unwrap();
        let winner_session = if outcomes[0] { &s1 } else { &s2 };
        let loser_session = if outcomes[0] { &s2 } else { &s1 };
        assert_eq!(winner_session.screen(), Screen::Selection);
        assert_eq!(loser_session.screen(), Screen::Join);
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn test_join_non_waiting_game_leaves_row() {
        let repo = repo().await;
        let alice = controller(&repo, connected("alice").await);
        let bob = controller(&repo, connected("bob").await);
        let carol = controller(&repo, connected("carol").await);

        let mut creator = MatchSession::new();
        let game = alice.create_game(&mut creator, one()).await.unwrap();

        let mut late = MatchSession::new();
        carol.open_game(&mut late, game.id).await.unwrap();

        let mut s = MatchSession::new();
        bob.open_game(&mut s, game.id).await.unwrap();
        bob.join_game(&mut s).await.unwrap();
        let before = repo.get_game(game.id).await.unwrap();

        let err = carol.join_game(&mut late).await.unwrap_err();
        assert!(matches!(err, MatchError::JoinConflict(_)));
        assert_eq!(repo.get_game(game.id).await.unwrap(), before);

        // Opening an already active game is refused up front
        let mut again = MatchSession::new();
        assert!(matches!(
            carol.open_game(&mut again, game.id).await,
            Err(MatchError::JoinConflict(_))
        ));
    }

    #[tokio::test]
    async fn test_double_submit_keeps_first_choice() {
        let repo = repo().await;
        let alice = controller(&repo, connected("alice").await);
        let bob = controller(&repo, connected("bob").await);

        let mut creator = MatchSession::new();
        let game = alice.create_game(&mut creator, one()).await.unwrap();
        let mut joiner = MatchSession::new();
        bob.open_game(&mut joiner, game.id).await.unwrap();
        bob.join_game(&mut joiner).await.unwrap();
        bob.submit_choice(&mut joiner, Move::Paper).await.unwrap();

        // A second session for the same player, resumed before the first write
        let mut stale = MatchSession::new();
        stale.game = Some(repo.get_game(game.id).await.unwrap());
        stale.role = Some(Role::Joiner);
        stale.screen = Screen::Selection;
        let err = bob.submit_choice(&mut stale, Move::Rock).await.unwrap_err();
        assert!(matches!(err, MatchError::ChoiceAlreadySubmitted));

        bob.back(&mut joiner);
        assert_eq!(joiner.screen(), Screen::Selection);
        let err = bob.submit_choice(&mut joiner, Move::Rock).await.unwrap_err();
        assert!(matches!(err, MatchError::ChoiceAlreadySubmitted));

        let stored = repo.get_game(game.id).await.unwrap();
        assert_eq!(stored.joiner_choice, Some(Move::Paper));
    }

    #[tokio::test]
    async fn test_preconditions_block_writes() {
        let repo = repo().await;
        let offline = controller(&repo, wallet("dave"));
        let mut session = MatchSession::new();

        let err = offline.create_game(&mut session, one()).await.unwrap_err();
        assert!(matches!(err, MatchError::NotConnected));
        assert!(err.is_precondition());

        let alice = controller(&repo, connected("alice").await);
        let err = alice.create_game(&mut session, Amount::ZERO).await.unwrap_err();
        assert!(matches!(err, MatchError::InvalidBet(_)));
        assert_eq!(session.screen(), Screen::Create);

        assert!(repo
            .list_games(rps_core::GameFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_back_and_reset_unsubscribe() {
        let repo = repo().await;
        let alice = controller(&repo, connected("alice").await);

        let mut session = MatchSession::new();
        let game = alice.create_game(&mut session, one()).await.unwrap();
        assert!(session.is_subscribed());
        assert_eq!(repo.active_subscriptions(&game.id), 1);

        assert_eq!(alice.back(&mut session), Screen::Create);
        assert!(session.game().is_none());
        assert_eq!(repo.active_subscriptions(&game.id), 0);
        assert_eq!(alice.back(&mut session), Screen::Create);

        let game = alice.create_game(&mut session, one()).await.unwrap();
        assert_eq!(repo.active_subscriptions(&game.id), 1);
        alice.reset(&mut session);
        assert_eq!(session.screen(), Screen::Create);
        assert_eq!(repo.active_subscriptions(&game.id), 0);
    }

    #[tokio::test]
    async fn test_cancel_waiting_game() {
        let repo = repo().await;
        let alice = controller(&repo, connected("alice").await);
        let bob = controller(&repo, connected("bob").await);

        let mut creator = MatchSession::new();
        let game = alice.create_game(&mut creator, one()).await.unwrap();

        let mut joiner = MatchSession::new();
        bob.open_game(&mut joiner, game.id).await.unwrap();
        assert!(matches!(
            bob.cancel_game(&mut joiner).await,
            Err(MatchError::InvalidAction { .. })
        ));

        let cancelled = alice.cancel_game(&mut creator).await.unwrap();
        assert_eq!(cancelled.status, GameStatus::Cancelled);
        assert_eq!(cancelled.joiner_address, None);
        assert_eq!(creator.screen(), Screen::Create);

        assert!(matches!(
            bob.join_game(&mut joiner).await,
            Err(MatchError::JoinConflict(_))
        ));

        let mut reopened = MatchSession::new();
        assert!(matches!(
            alice.open_game(&mut reopened, game.id).await,
            Err(MatchError::InvalidAction { .. })
        ));
    }

    #[tokio::test]
    async fn test_stale_and_foreign_updates_ignored() {
        let repo = repo().await;
        let alice = controller(&repo, connected("alice").await);

        let mut session = MatchSession::new();
        let game = alice.create_game(&mut session, one()).await.unwrap();

        assert!(!alice.apply_update(&mut session, game.clone()));
        let other = Game::new("EQx".to_string(), one(), None);
        assert!(!alice.apply_update(&mut session, other));
        assert_eq!(session.screen(), Screen::Join);
    }

    #[tokio::test]
    async fn test_resume_from_store_then_wait() {
        let repo = repo().await;
        let alice = controller(&repo, connected("alice").await);
        let bob = controller(&repo, connected("bob").await);

        let mut creator = MatchSession::new();
        let game = alice.create_game(&mut creator, one()).await.unwrap();
        let mut joiner = MatchSession::new();
        bob.open_game(&mut joiner, game.id).await.unwrap();
        bob.join_game(&mut joiner).await.unwrap();
        bob.submit_choice(&mut joiner, Move::Rock).await.unwrap();
        drop(creator);

        // Fresh invocation for the creator
        let mut resumed = MatchSession::new();
        alice.open_game(&mut resumed, game.id).await.unwrap();
        assert_eq!(resumed.screen(), Screen::Selection);
        assert_eq!(resumed.role(), Some(Role::Creator));

        alice.submit_choice(&mut resumed, Move::Rock).await.unwrap();
        let own = alice.wait_for_result(&mut resumed).await.unwrap();
        assert_eq!(own.outcome, Outcome::Draw);
        assert_eq!(own.prize, one());

        let result = bob.wait_for_result(&mut joiner).await.unwrap();
        assert_eq!(result.outcome, Outcome::Draw);
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let repo = repo().await;
        let alice = controller(&repo, connected("alice").await);
        let mut session = MatchSession::new();
        alice.create_game(&mut session, one()).await.unwrap();

        let err = alice
            .wait_for_opponent(&mut session, Some(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert!(matches!(err, MatchError::Timeout(_)));
        assert_eq!(session.screen(), Screen::Join);
    }

    #[tokio::test]
    async fn test_back_then_forward_again() {
        let repo = repo().await;
        let alice = controller(&repo, connected("alice").await);
        let bob = controller(&repo, connected("bob").await);

        let mut creator = MatchSession::new();
        let game = alice.create_game(&mut creator, one()).await.unwrap();
        let mut joiner = MatchSession::new();
        bob.open_game(&mut joiner, game.id).await.unwrap();
        bob.join_game(&mut joiner).await.unwrap();
        bob.submit_choice(&mut joiner, Move::Paper).await.unwrap();

        assert_eq!(bob.back(&mut joiner), Screen::Selection);
        assert_eq!(bob.back(&mut joiner), Screen::Join);
        let version = repo.get_game(game.id).await.unwrap().version;

        // Joining again re-enters the game we already sit in, without a write
        let rejoined = bob.join_game(&mut joiner).await.unwrap();
        assert_eq!(rejoined.joiner_address.as_deref(), Some("EQbob"));
        assert_eq!(joiner.screen(), Screen::Waiting);
        assert_eq!(repo.get_game(game.id).await.unwrap().version, version);

        bob.back(&mut joiner);
        bob.back(&mut joiner);
        assert_eq!(joiner.screen(), Screen::Join);

        alice
            .wait_for_opponent(&mut creator, Some(Duration::from_secs(5)))
            .await
            .unwrap();
        alice.submit_choice(&mut creator, Move::Rock).await.unwrap();

        // The settling notification carries the stepped-back joiner to the result
        let settled = repo.get_game(game.id).await.unwrap();
        assert!(bob.apply_update(&mut joiner, settled));
        assert_eq!(joiner.screen(), Screen::Result);
        assert_eq!(joiner.result().unwrap().outcome, Outcome::Win);

        let lost = alice.wait_for_result(&mut creator).await.unwrap();
        assert_eq!(lost.outcome, Outcome::Lose);
    }

    #[tokio::test]
    async fn test_wait_for_result_resumes_from_selection() {
        let repo = repo().await;
        let alice = controller(&repo, connected("alice").await);
        let bob = controller(&repo, connected("bob").await);

        let mut creator = MatchSession::new();
        let game = alice.create_game(&mut creator, one()).await.unwrap();
        let mut joiner = MatchSession::new();
        bob.open_game(&mut joiner, game.id).await.unwrap();
        bob.join_game(&mut joiner).await.unwrap();
        bob.submit_choice(&mut joiner, Move::Scissors).await.unwrap();
        assert_eq!(bob.back(&mut joiner), Screen::Selection);

        let mut resumed = MatchSession::new();
        alice.open_game(&mut resumed, game.id).await.unwrap();
        alice.submit_choice(&mut resumed, Move::Scissors).await.unwrap();

        let result = bob.wait_for_result(&mut joiner).await.unwrap();
        assert_eq!(result.outcome, Outcome::Draw);
        assert_eq!(joiner.screen(), Screen::Result);
    }

    /// Answers every balance lookup with the same TonAPI body
    struct FixedBalance(u64);

    #[async_trait::async_trait]
    impl BalanceTransport for FixedBalance {
        async fn get(&self, url: &str) -> rps_core::Result<String> {
            if url.contains("tonapi") {
                Ok(format!(r#"{{"balance":{}}}"#, self.0))
            } else {
                Err(RpsError::provider("unreachable"))
            }
        }
    }

    fn with_balance(controller: MatchController, nano: u64) -> MatchController {
        let fetcher = BalanceFetcher::with_transport(
            WalletConfig::new(Network::Testnet),
            Arc::new(FixedBalance(nano)),
        );
        controller.with_balance(Arc::new(BalanceTracker::new(Arc::new(fetcher))))
    }

    #[tokio::test]
    async fn test_insufficient_funds_blocks_create_and_join() {
        let repo = repo().await;
        let alice = with_balance(controller(&repo, connected("alice").await), 500_000_000);
        alice.refresh_balance().await;
        assert_eq!(alice.balance().unwrap(), Amount::from_nano(500_000_000));

        let mut session = MatchSession::new();
        let err = alice.create_game(&mut session, one()).await.unwrap_err();
        assert!(matches!(
            err,
            MatchError::InsufficientFunds { need, available }
                if need == one() && available == Amount::from_nano(500_000_000)
        ));
        assert!(err.is_precondition());
        assert_eq!(session.screen(), Screen::Create);
        assert!(session.game().is_none());
        assert!(repo
            .list_games(rps_core::GameFilter::default())
            .await
            .unwrap()
            .is_empty());

        let bob = controller(&repo, connected("bob").await);
        let mut creator = MatchSession::new();
        let game = bob.create_game(&mut creator, one()).await.unwrap();

        alice.open_game(&mut session, game.id).await.unwrap();
        let err = alice.join_game(&mut session).await.unwrap_err();
        assert!(matches!(err, MatchError::InsufficientFunds { .. }));
        assert_eq!(session.screen(), Screen::Join);
        assert_eq!(session.role(), None);
        let stored = repo.get_game(game.id).await.unwrap();
        assert_eq!(stored.status, GameStatus::Waiting);
        assert_eq!(stored.joiner_address, None);
        assert_eq!(stored.version, game.version);

        // A bet within the balance goes through
        alice.reset(&mut session);
        let small = Amount::from_nano(250_000_000);
        assert!(alice.create_game(&mut session, small).await.is_ok());
    }

    #[tokio::test]
    async fn test_balance_unknown_does_not_block() {
        let repo = repo().await;
        let alice = controller(&repo, connected("alice").await);
        assert!(matches!(alice.balance(), Err(MatchError::BalanceUnavailable(_))));

        let mut session = MatchSession::new();
        assert!(alice.create_game(&mut session, one()).await.is_ok());
    }
}
