use super::game::{games_table, print_result};
use super::{short_address, App, CliError, Result};
use dialoguer::{Input, Select};
use rps_core::storage::Storage;
use rps_core::{
    Amount, GameFilter, GameRepository, GameStatus, Move, Role, SqliteRepository, WalletConnector,
};
use rps_match::{DemoOpponent, MatchController, MatchError, MatchSession, Screen};
use std::sync::Arc;

/// Interactive match loop. With `demo`, games live in memory and the house
/// plays the other side.
pub async fn play(app: &App, wallet_name: &str, demo: bool) -> Result<()> {
    let (controller, house, address) = if demo {
        let wallet = app.connect(wallet_name).await?;
        let repository = Arc::new(SqliteRepository::new(
            Arc::new(Storage::in_memory().await?),
            app.config.match_config().repository_config(),
        ));
        let config = app.config.match_config();
        let house = DemoOpponent::new(repository.clone(), config.clone()).await?;
        (MatchController::new(repository, wallet, config), Some(house), None)
    } else {
        let (controller, wallet) = app.controller(wallet_name).await?;
        controller.refresh_balance().await;
        (controller, None, wallet.address())
    };

    let mut player = Player {
        controller,
        session: MatchSession::new(),
        house,
        address,
    };

    if demo {
        println!("Demo mode: games are not saved and the house picks a random move.");
    }

    loop {
        match player.step().await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e @ CliError::Dialog(_)) => return Err(e),
            Err(e) => eprintln!("Error: {}", e),
        }
    }

    player.controller.reset(&mut player.session);
    Ok(())
}

struct Player {
    controller: MatchController,
    session: MatchSession,
    house: Option<DemoOpponent>,
    /// Set outside demo mode, to find our own unfinished games
    address: Option<String>,
}

impl Player {
    /// One screen's worth of interaction; `false` quits
    async fn step(&mut self) -> Result<bool> {
        match self.session.screen() {
            Screen::Create => self.create_screen().await,
            Screen::Join => self.join_screen().await,
            Screen::Selection => self.selection_screen().await,
            Screen::Waiting => self.waiting_screen().await,
            Screen::Result => self.result_screen(),
        }
    }

    async fn create_screen(&mut self) -> Result<bool> {
        let options = if self.house.is_some() {
            vec!["Start a demo game", "Quit"]
        } else {
            vec![
                "Create a game",
                "Join an open game",
                "Resume one of my games",
                "Show balance",
                "Quit",
            ]
        };
        let selection = Select::new()
            .with_prompt("What would you like to do?")
            .items(&options)
            .default(0)
            .interact()?;

        match options[selection] {
            "Create a game" | "Start a demo game" => {
                let input: String = Input::new().with_prompt("Bet amount").interact_text()?;
                let bet = Amount::from_display(&input)?;
                let game = self.controller.create_game(&mut self.session, bet).await?;
                println!("Game {} created with bet {}", game.id, game.bet_amount);

                if let Some(house) = &mut self.house {
                    house.join(game.id).await?;
                    println!("The house joined your game.");
                }
            }
            "Join an open game" => self.pick_open_game().await?,
            "Resume one of my games" => self.pick_own_game().await?,
            "Show balance" => {
                self.controller.refresh_balance().await;
                match self.controller.balance() {
                    Ok(amount) => println!("Balance: {}", amount),
                    Err(MatchError::BalanceUnavailable(reason)) => {
                        println!("Balance unavailable: {}", reason)
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    async fn pick_open_game(&mut self) -> Result<()> {
        let games = self
            .controller
            .repository()
            .list_games(GameFilter::open())
            .await?;
        if games.is_empty() {
            println!("No open games right now.");
            return Ok(());
        }

        println!("{}", games_table(&games));
        let labels: Vec<String> = games
            .iter()
            .map(|g| format!("{} by {} for {}", g.id, short_address(&g.creator_address), g.bet_amount))
            .collect();
        let selection = Select::new()
            .with_prompt("Which game?")
            .items(&labels)
            .default(0)
            .interact()?;

        let game = self
            .controller
            .open_game(&mut self.session, games[selection].id)
            .await?;
        if self.session.role().is_none() {
            self.controller.join_game(&mut self.session).await?;
            println!("Joined game {} (bet {})", game.id, game.bet_amount);
        } else {
            println!("Resumed game {}", game.id);
        }
        Ok(())
    }

    async fn pick_own_game(&mut self) -> Result<()> {
        let Some(address) = self.address.clone() else {
            return Ok(());
        };
        let games: Vec<_> = self
            .controller
            .repository()
            .list_games(GameFilter::involving(address))
            .await?
            .into_iter()
            .filter(|g| !g.status.is_terminal())
            .collect();
        if games.is_empty() {
            println!("You have no unfinished games.");
            return Ok(());
        }

        println!("{}", games_table(&games));
        let labels: Vec<String> = games
            .iter()
            .map(|g| format!("{} ({}) for {}", g.id, g.status, g.bet_amount))
            .collect();
        let selection = Select::new()
            .with_prompt("Which game?")
            .items(&labels)
            .default(0)
            .interact()?;

        let game = self
            .controller
            .open_game(&mut self.session, games[selection].id)
            .await?;
        println!("Resumed game {} on the {} screen", game.id, self.session.screen());
        Ok(())
    }

    async fn join_screen(&mut self) -> Result<bool> {
        if self.session.role() != Some(Role::Creator) {
            let selection = Select::new()
                .with_prompt("Join this game?")
                .items(&["Join", "Back"])
                .default(0)
                .interact()?;
            if selection == 0 {
                self.controller.join_game(&mut self.session).await?;
            } else {
                self.controller.back(&mut self.session);
            }
            return Ok(true);
        }

        if self.house.is_some() {
            // The house is already in; just pick up the notification
            self.controller.wait_for_opponent(&mut self.session, None).await?;
            return Ok(true);
        }

        if let Some(id) = self.session.game_id() {
            println!("Share with your opponent: rps join <their-wallet> {}", id);
        }
        let selection = Select::new()
            .with_prompt("Waiting for an opponent")
            .items(&["Wait", "Cancel game", "Back"])
            .default(0)
            .interact()?;

        match selection {
            0 => {
                let timeout = self.controller.config().result_timeout;
                match self.controller.wait_for_opponent(&mut self.session, timeout).await {
                    Ok(()) => println!("Opponent joined!"),
                    Err(MatchError::Timeout(_)) => println!("Nobody joined yet."),
                    Err(e) => return Err(e.into()),
                }
            }
            1 => {
                let game = self.controller.cancel_game(&mut self.session).await?;
                println!("Game {} cancelled.", game.id);
            }
            _ => {
                self.controller.back(&mut self.session);
            }
        }
        Ok(true)
    }

    async fn selection_screen(&mut self) -> Result<bool> {
        if let Some(chosen) = self.session.chosen() {
            println!("You already chose {}.", chosen);
            let selection = Select::new()
                .items(&["Wait for the result", "Back"])
                .default(0)
                .interact()?;
            if selection == 0 {
                self.await_result().await?;
            } else {
                self.controller.back(&mut self.session);
            }
            return Ok(true);
        }

        let mut options: Vec<String> = Move::ALL.iter().map(|m| m.to_string()).collect();
        options.push("Back".to_string());

        let selection = Select::new()
            .with_prompt("Choose your move")
            .items(&options)
            .default(0)
            .interact()?;

        match Move::ALL.get(selection) {
            Some(choice) => {
                self.controller.submit_choice(&mut self.session, *choice).await?;
                if let Some(commitment) = self.session.commitment() {
                    println!("Commitment: {}", commitment.hash_hex());
                }
            }
            None => {
                self.controller.back(&mut self.session);
            }
        }
        Ok(true)
    }

    async fn waiting_screen(&mut self) -> Result<bool> {
        if let Some(house) = &self.house {
            let house_move = house.pick_move();
            println!("The house is thinking...");
            self.controller
                .resolve_after_timer(&mut self.session, house_move)
                .await?;
            return Ok(true);
        }

        // Our own move may have settled the game already
        if self.session.game().map_or(false, |g| g.status == GameStatus::Completed) {
            self.await_result().await?;
            return Ok(true);
        }

        let selection = Select::new()
            .with_prompt("Waiting for your opponent's move")
            .items(&["Wait", "Back"])
            .default(0)
            .interact()?;

        if selection == 0 {
            self.await_result().await?;
        } else {
            self.controller.back(&mut self.session);
        }
        Ok(true)
    }

    async fn await_result(&mut self) -> Result<()> {
        match self.controller.wait_for_result(&mut self.session).await {
            Ok(_) => Ok(()),
            Err(MatchError::Timeout(_)) => {
                println!("No move from your opponent yet.");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn result_screen(&mut self) -> Result<bool> {
        if let Some(result) = self.session.result() {
            print_result(result);
        }

        let selection = Select::new()
            .items(&["Play again", "Quit"])
            .default(0)
            .interact()?;

        self.controller.reset(&mut self.session);
        if let Some(house) = &mut self.house {
            house.release();
        }
        Ok(selection == 0)
    }
}
