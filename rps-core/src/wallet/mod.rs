pub mod config;
pub mod instance;
pub mod manager;

pub use config::WalletConfig;
pub use instance::LocalWallet;
pub use manager::WalletManager;

use crate::error::{Result, RpsError};
use crate::types::Network;
use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// Wallet collaborator the match flow depends on
#[async_trait]
pub trait WalletConnector: Send + Sync {
    async fn connect(&self) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    /// Current address; absent while disconnected
    fn address(&self) -> Option<String>;

    fn state(&self) -> ConnectionState;

    fn network(&self) -> Network;

    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
}

/// Accepts raw (`<workchain>:<64 hex>`) and 48-char user-friendly addresses
pub fn validate_address(address: &str) -> Result<()> {
    let invalid = |why: &str| RpsError::InvalidAddress(format!("{}: {}", address, why));

    if let Some((workchain, hash)) = address.split_once(':') {
        workchain
            .parse::<i32>()
            .map_err(|_| invalid("bad workchain"))?;
        let bytes = hex::decode(hash).map_err(|_| invalid("hash is not hex"))?;
        if bytes.len() != 32 {
            return Err(invalid("hash must be 32 bytes"));
        }
        return Ok(());
    }

    if address.len() != 48 {
        return Err(invalid("expected 48 characters"));
    }

    let bytes = URL_SAFE
        .decode(address)
        .or_else(|_| STANDARD.decode(address))
        .map_err(|_| invalid("not base64"))?;
    if bytes.len() != 36 {
        return Err(invalid("decoded length must be 36 bytes"));
    }

    let expected = crc16(&bytes[..34]);
    let actual = u16::from_be_bytes([bytes[34], bytes[35]]);
    if expected != actual {
        return Err(invalid("checksum mismatch"));
    }

    Ok(())
}

/// CRC-16/XMODEM as used by user-friendly addresses
fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for byte in data {
        crc ^= (*byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}
