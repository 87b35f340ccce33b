use super::{parse_game_id, short_address, App, Result};
use comfy_table::{presets::UTF8_FULL, Table};
use rps_core::{Amount, Game, GameFilter, GameRepository, GameStatus, Move, Role};
use rps_match::{MatchError, MatchResult, MatchSession, Screen};
use std::time::Duration;

pub async fn create_game(app: &App, wallet_name: &str, amount: &str) -> Result<()> {
    let bet = Amount::from_display(amount)?;
    let (controller, wallet) = app.controller(wallet_name).await?;
    controller.refresh_balance().await;

    let mut session = MatchSession::new();
    let game = controller.create_game(&mut session, bet).await?;

    println!("Created new game!");
    println!("Game ID: {}", game.id);
    println!("Creator: {} ({})", wallet.name(), game.creator_address);
    println!("Bet Amount: {}", game.bet_amount);
    if let Some(expires_at) = game.expires_at {
        println!("Open until: {}", expires_at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!();
    println!("Share this command with another player:");
    println!("rps join <their-wallet> {}", game.id);
    println!("Then pick your move with: rps choose {} {} <rock|paper|scissors>", wallet_name, game.id);

    Ok(())
}

pub async fn join_game(app: &App, wallet_name: &str, game_id: &str) -> Result<()> {
    let game_id = parse_game_id(game_id)?;
    let (controller, _wallet) = app.controller(wallet_name).await?;

    let mut session = MatchSession::new();
    controller.open_game(&mut session, game_id).await?;
    if session.role().is_some() {
        println!("You are already part of game {}.", game_id);
        print_next_step(wallet_name, &session);
        return Ok(());
    }

    controller.refresh_balance().await;
    let game = controller.join_game(&mut session).await?;

    println!("Joined game {}!", game.id);
    println!("Bet Amount: {}", game.bet_amount);
    println!("Opponent: {}", game.creator_address);
    println!();
    print_next_step(wallet_name, &session);

    Ok(())
}

pub async fn submit_choice(app: &App, wallet_name: &str, game_id: &str, choice: &str) -> Result<()> {
    let choice: Move = choice.parse()?;
    let game_id = parse_game_id(game_id)?;
    let (controller, _wallet) = app.controller(wallet_name).await?;

    let mut session = MatchSession::new();
    controller.open_game(&mut session, game_id).await?;
    ensure_participant(&session, "choose")?;

    let stored = controller.submit_choice(&mut session, choice).await?;

    println!("Choice submitted: {}", choice);
    if let Some(commitment) = session.commitment() {
        println!("Commitment: {}", commitment.hash_hex());
    }

    if stored.status == GameStatus::Completed {
        let result = controller.wait_for_result(&mut session).await?;
        print_result(result);
    } else {
        println!("Waiting for your opponent...");
        println!("Check back with: rps wait {} {}", wallet_name, game_id);
    }

    Ok(())
}

pub async fn wait_for_game(
    app: &App,
    wallet_name: &str,
    game_id: &str,
    timeout_secs: Option<u64>,
) -> Result<()> {
    let game_id = parse_game_id(game_id)?;
    let (controller, _wallet) = app.controller(wallet_name).await?;
    let timeout = timeout_secs
        .map(Duration::from_secs)
        .or(controller.config().result_timeout);

    let mut session = MatchSession::new();
    controller.open_game(&mut session, game_id).await?;
    ensure_participant(&session, "wait")?;

    if session.screen() == Screen::Join {
        println!("Waiting for an opponent to join...");
        controller.wait_for_opponent(&mut session, timeout).await?;
        println!("Opponent joined!");
    }

    match session.screen() {
        Screen::Selection => {
            println!("Both players are in. Pick your move:");
            println!("rps choose {} {} <rock|paper|scissors>", wallet_name, game_id);
        }
        Screen::Waiting => {
            println!("Waiting for your opponent's move...");
            controller.wait_for(&mut session, Screen::Result, timeout).await?;
            if let Some(result) = session.result() {
                print_result(result);
            }
        }
        Screen::Result => {
            if let Some(result) = session.result() {
                print_result(result);
            }
        }
        Screen::Create | Screen::Join => {
            println!("Game {} is no longer active.", game_id);
        }
    }

    Ok(())
}

pub async fn cancel_game(app: &App, wallet_name: &str, game_id: &str) -> Result<()> {
    let game_id = parse_game_id(game_id)?;
    let (controller, _wallet) = app.controller(wallet_name).await?;

    let mut session = MatchSession::new();
    controller.open_game(&mut session, game_id).await?;
    let game = controller.cancel_game(&mut session).await?;

    println!("Game {} cancelled.", game.id);
    Ok(())
}

pub async fn show_game_status(app: &App, game_id: &str) -> Result<()> {
    let game_id = parse_game_id(game_id)?;
    let game = app.repository.get_game(game_id).await?;

    println!("Game Status: {}", game.id);
    println!("═══════════════════════════════════");
    println!("State: {}", game.status);
    println!("Bet Amount: {}", game.bet_amount);
    if let Some(pool) = game.prize_pool() {
        println!("Prize Pool: {}", pool);
    }
    println!("Created: {}", game.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    if let Some(expires_at) = game.expires_at {
        let note = if game.status == GameStatus::Waiting && game.is_expired(chrono::Utc::now()) {
            " (expired)"
        } else {
            ""
        };
        println!("Open until: {}{}", expires_at.format("%Y-%m-%d %H:%M:%S UTC"), note);
    }

    println!();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Role", "Address", "Chosen", "Commitment"]);

    for role in [Role::Creator, Role::Joiner] {
        let Some(address) = role.address_in(&game) else {
            table.add_row(vec![role.to_string(), "-".to_string(), "-".to_string(), "-".to_string()]);
            continue;
        };
        // Moves stay hidden until the game is settled
        let chosen = match (role.choice_in(&game), game.status) {
            (Some(choice), GameStatus::Completed) => choice.to_string(),
            (Some(_), _) => "yes".to_string(),
            (None, _) => "no".to_string(),
        };
        let commitment = match role {
            Role::Creator => game.creator_choice_hash.as_deref(),
            Role::Joiner => game.joiner_choice_hash.as_deref(),
        };
        table.add_row(vec![
            role.to_string(),
            address.to_string(),
            chosen,
            commitment.map_or("-".to_string(), |h| h.chars().take(16).collect()),
        ]);
    }

    println!("{}", table);

    if game.status == GameStatus::Completed {
        println!();
        match &game.winner_address {
            Some(winner) => println!("Winner: {}", winner),
            None => println!("Draw"),
        }
        if let Some(prize) = game.prize_amount {
            println!("Prize: {}", prize);
        }
    }

    Ok(())
}

pub async fn list_games(app: &App, all: bool) -> Result<()> {
    let filter = if all {
        GameFilter {
            include_expired: true,
            ..Default::default()
        }
    } else {
        GameFilter::open()
    };
    let games = app.repository.list_games(filter).await?;

    if games.is_empty() {
        if all {
            println!("No games yet.");
        } else {
            println!("No open games.");
            println!("Start one with: rps create <wallet> <amount>");
        }
        return Ok(());
    }

    println!("{}", games_table(&games));
    Ok(())
}

pub fn games_table(games: &[Game]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Game ID", "State", "Creator", "Joiner", "Bet Amount", "Created"]);

    for game in games {
        table.add_row(vec![
            game.id.to_string(),
            game.status.to_string(),
            short_address(&game.creator_address),
            game.joiner_address
                .as_deref()
                .map_or("-".to_string(), short_address),
            game.bet_amount.to_string(),
            game.created_at.format("%Y-%m-%d %H:%M").to_string(),
        ]);
    }
    table
}

pub fn print_result(result: &MatchResult) {
    println!();
    println!("Result: {}", result.outcome);
    println!("  You: {}", result.own_move);
    println!("  Opponent: {}", result.opponent_move);
    println!("  Prize: {}", result.prize);
}

fn ensure_participant(session: &MatchSession, action: &'static str) -> Result<()> {
    if session.role().is_none() {
        return Err(MatchError::invalid_action(action, session.screen(), "not a participant of this game").into());
    }
    Ok(())
}

fn print_next_step(wallet_name: &str, session: &MatchSession) {
    let Some(id) = session.game_id() else { return };
    match session.screen() {
        Screen::Selection => {
            println!("Pick your move with: rps choose {} {} <rock|paper|scissors>", wallet_name, id)
        }
        Screen::Join | Screen::Waiting => println!("Follow along with: rps wait {} {}", wallet_name, id),
        Screen::Result => {
            if let Some(result) = session.result() {
                print_result(result);
            }
        }
        Screen::Create => {}
    }
}
