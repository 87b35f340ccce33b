use super::{App, CliError, Result};
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use dialoguer::Confirm;
use rps_core::{GameFilter, GameRepository, Network, RpsError};

#[derive(Subcommand)]
pub enum WalletCommands {
    /// Register a wallet address under a local name
    Add {
        /// Wallet name
        name: String,
        /// Wallet address (raw `0:<hex>` or user-friendly form)
        address: String,
        /// Network (mainnet, testnet); defaults to the configured network
        #[arg(short, long)]
        network: Option<String>,
    },
    /// List all wallets
    List,
    /// Show wallet information
    Show {
        /// Wallet name
        name: String,
    },
    /// Remove a wallet
    Remove {
        /// Wallet name
        name: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

pub async fn handle_wallet_command(cmd: WalletCommands, app: &App) -> Result<()> {
    let manager = &app.manager;

    match cmd {
        WalletCommands::Add {
            name,
            address,
            network,
        } => {
            let network = parse_network(network.as_deref(), app.config.default_network)?;
            let wallet = manager.add_wallet(&name, &address, network).await?;

            println!("Wallet added successfully!");
            println!("  Name: {}", wallet.name());
            println!("  ID: {}", wallet.id());
            println!("  Address: {}", wallet.stored_address());
            println!("  Network: {}", network);
        }

        WalletCommands::List => {
            let wallets = manager.list_wallets().await?;

            if wallets.is_empty() {
                println!("No wallets found.");
                println!("Add one with: rps wallet add <name> <address>");
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Name", "Network", "Address", "Added"]);

            for wallet in wallets {
                table.add_row(vec![
                    wallet.name,
                    wallet.network.to_string(),
                    wallet.address,
                    wallet.created_at.format("%Y-%m-%d %H:%M").to_string(),
                ]);
            }

            println!("{}", table);
        }

        WalletCommands::Show { name } => {
            let wallet = manager.load_wallet(&name).await?;
            let address = wallet.stored_address();

            println!("Wallet Information:");
            println!("  Name: {}", wallet.name());
            println!("  ID: {}", wallet.id());
            println!("  Address: {}", address);
            println!("  Network: {}", wallet.config().network);

            match app.repository.get_player(address).await? {
                Some(player) => {
                    println!();
                    println!("Games played: {}", player.games_played);
                    println!("First seen: {}", player.first_seen.format("%Y-%m-%d %H:%M:%S UTC"));
                    println!("Last seen: {}", player.last_seen.format("%Y-%m-%d %H:%M:%S UTC"));
                }
                None => {
                    println!();
                    println!("No games played yet.");
                }
            }

            let open = app
                .repository
                .list_games(GameFilter::involving(address))
                .await?
                .into_iter()
                .filter(|g| !g.status.is_terminal())
                .count();
            if open > 0 {
                println!("Unfinished games: {}", open);
            }
        }

        WalletCommands::Remove { name, force } => {
            if !force {
                let confirm = Confirm::new()
                    .with_prompt(format!("Remove wallet '{}'? Its games stay on record.", name))
                    .default(false)
                    .interact()?;

                if !confirm {
                    println!("Removal cancelled.");
                    return Ok(());
                }
            }

            manager.delete_wallet(&name).await?;
            println!("Wallet '{}' removed.", name);
        }
    }

    Ok(())
}

pub fn parse_network(network: Option<&str>, default: Network) -> Result<Network> {
    match network {
        None => Ok(default),
        Some(name) => name.parse().map_err(|_| {
            CliError::from(RpsError::config(format!(
                "Invalid network: {}. Supported networks: mainnet, testnet",
                name
            )))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_network() {
        assert_eq!(parse_network(None, Network::Testnet).unwrap(), Network::Testnet);
        assert_eq!(
            parse_network(Some("MAINNET"), Network::Testnet).unwrap(),
            Network::Mainnet
        );
        assert!(parse_network(Some("regtest"), Network::Mainnet).is_err());
    }
}
