mod commands;
mod config;

use clap::{Parser, Subcommand};
use commands::{App, CliError};
use config::CliConfig;
use rps_core::RpsError;
use rps_match::MatchError;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "rps")]
#[command(about = "Rock-paper-scissors wagers between two wallets")]
#[command(version)]
struct Cli {
    /// Data directory for wallets, games and config.json
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Wallet management commands
    #[command(subcommand)]
    Wallet(commands::WalletCommands),

    /// Create a new game
    Create {
        /// Wallet name to use
        wallet: String,
        /// Bet amount, e.g. 1 or 0.25
        amount: String,
    },
    /// Join an open game
    Join {
        /// Wallet name to use
        wallet: String,
        /// Game ID to join
        game_id: String,
    },
    /// Submit your move
    Choose {
        /// Wallet name
        wallet: String,
        /// Game ID
        game_id: String,
        /// rock, paper or scissors
        #[arg(value_name = "MOVE")]
        choice: String,
    },
    /// Wait for an opponent or for the result
    Wait {
        /// Wallet name
        wallet: String,
        /// Game ID
        game_id: String,
        /// Give up after this many seconds
        #[arg(short, long)]
        timeout: Option<u64>,
    },
    /// Show game status
    Status {
        /// Game ID
        game_id: String,
    },
    /// List open games
    List {
        /// Include games that are no longer open
        #[arg(short, long)]
        all: bool,
    },
    /// Cancel a game nobody joined yet
    Cancel {
        /// Wallet name
        wallet: String,
        /// Game ID
        game_id: String,
    },
    /// Play interactively
    Play {
        /// Wallet name
        wallet: String,
        /// Play against the house without saving anything
        #[arg(long)]
        demo: bool,
    },
    /// Show wallet balance
    Balance {
        /// Wallet name
        wallet: String,
        /// Network to query (mainnet, testnet); defaults to the wallet's
        #[arg(short, long)]
        network: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "rps={},rps_core={},rps_match={}",
            log_level, log_level, log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let data_dir = cli.data_dir.unwrap_or_else(CliConfig::default_data_dir);
    tokio::fs::create_dir_all(&data_dir).await?;

    let config = CliConfig::load(&data_dir)?;
    let app = App::open(&data_dir, config).await?;

    let result = match cli.command {
        Commands::Wallet(cmd) => commands::handle_wallet_command(cmd, &app).await,
        Commands::Create { wallet, amount } => {
            commands::game::create_game(&app, &wallet, &amount).await
        }
        Commands::Join { wallet, game_id } => {
            commands::game::join_game(&app, &wallet, &game_id).await
        }
        Commands::Choose {
            wallet,
            game_id,
            choice,
        } => commands::game::submit_choice(&app, &wallet, &game_id, &choice).await,
        Commands::Wait {
            wallet,
            game_id,
            timeout,
        } => commands::game::wait_for_game(&app, &wallet, &game_id, timeout).await,
        Commands::Status { game_id } => commands::game::show_game_status(&app, &game_id).await,
        Commands::List { all } => commands::game::list_games(&app, all).await,
        Commands::Cancel { wallet, game_id } => {
            commands::game::cancel_game(&app, &wallet, &game_id).await
        }
        Commands::Play { wallet, demo } => commands::play::play(&app, &wallet, demo).await,
        Commands::Balance { wallet, network } => {
            commands::balance::show_balance(&app, &wallet, network.as_deref()).await
        }
    };

    if let Err(e) = result {
        report(&e);
        std::process::exit(1);
    }

    Ok(())
}

fn report(err: &CliError) {
    match err {
        CliError::Core(RpsError::WalletNotFound { name }) => {
            eprintln!("Error: Wallet '{}' not found", name);
            eprintln!("Use 'rps wallet list' to see available wallets");
        }
        CliError::Match(MatchError::InsufficientFunds { need, available }) => {
            eprintln!("Error: Insufficient funds");
            eprintln!("Need: {}, Available: {}", need, available);
        }
        CliError::Match(MatchError::JoinConflict(id)) => {
            eprintln!("Error: Game {} is no longer open", id);
            eprintln!("Use 'rps list' to find another game");
        }
        CliError::Core(RpsError::InvalidAddress(addr)) => {
            eprintln!("Error: Invalid address: {}", addr);
        }
        CliError::Core(RpsError::InvalidMove(choice)) => {
            eprintln!("Error: Invalid move '{}'", choice);
            eprintln!("Pick one of: rock, paper, scissors");
        }
        _ => {
            eprintln!("Error: {}", err);
        }
    }
}
