use super::wallet::parse_network;
use super::{App, Result};
use rps_core::{BalanceState, WalletConnector};

pub async fn show_balance(app: &App, wallet_name: &str, network: Option<&str>) -> Result<()> {
    let wallet = app.connect(wallet_name).await?;
    let network = parse_network(network, wallet.network())?;
    let tracker = app.balance_tracker(network)?;

    println!("Balance for wallet '{}' on {}:", wallet.name(), network);
    tracker.observe(wallet.address().as_deref(), network).await;

    match tracker.state() {
        BalanceState::Ready(snapshot) => {
            println!("  Address: {}", snapshot.address);
            println!(
                "  Balance: {} ({} nano)",
                snapshot.display(),
                snapshot.amount.to_nano()
            );
            println!("  Source: {}", snapshot.provider);
            println!(
                "  Fetched: {}",
                snapshot.fetched_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
        BalanceState::Unavailable { reason } => {
            println!("  Balance: unavailable");
            println!("  Reason: {}", reason);
        }
        BalanceState::Idle | BalanceState::Loading => {
            println!("  Balance: {}", tracker.display());
        }
    }

    Ok(())
}
