use crate::error::{Result, RpsError};
use crate::types::{Amount, Network};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderKind {
    /// `{"ok": true, "result": {"balance": "<nano>"}}`
    TonCenter,
    /// `{"balance": <nano>, ...}`
    TonApi,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceProvider {
    pub name: String,
    /// Request URL with an `{address}` placeholder
    pub url_template: String,
    pub kind: ProviderKind,
}

impl BalanceProvider {
    pub fn new(name: &str, url_template: &str, kind: ProviderKind) -> Self {
        Self {
            name: name.to_string(),
            url_template: url_template.to_string(),
            kind,
        }
    }

    pub fn url_for(&self, address: &str) -> String {
        self.url_template.replace("{address}", address)
    }

    /// Extract the balance in smallest units from a response body
    pub fn parse(&self, body: &str) -> Result<Amount> {
        let json: Value = serde_json::from_str(body)?;

        let balance = match self.kind {
            ProviderKind::TonCenter => {
                if json.get("ok").and_then(Value::as_bool) != Some(true) {
                    let reason = json
                        .get("error")
                        .and_then(Value::as_str)
                        .unwrap_or("ok flag not set");
                    return Err(RpsError::provider(format!("{}: {}", self.name, reason)));
                }
                match json.get("result") {
                    Some(result) if result.is_object() => result.get("balance"),
                    other => other,
                }
            }
            ProviderKind::TonApi => json.get("balance"),
        };

        balance
            .and_then(nano_value)
            .map(Amount::from_nano)
            .ok_or_else(|| RpsError::provider(format!("{}: no balance field in response", self.name)))
    }
}

fn nano_value(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

/// Two interchangeable providers per network
pub fn default_providers(network: Network) -> Vec<BalanceProvider> {
    match network {
        Network::Mainnet => vec![
            BalanceProvider::new(
                "toncenter",
                "https://toncenter.com/api/v2/getAddressInformation?address={address}",
                ProviderKind::TonCenter,
            ),
            BalanceProvider::new(
                "tonapi",
                "https://tonapi.io/v2/accounts/{address}",
                ProviderKind::TonApi,
            ),
        ],
        Network::Testnet => vec![
            BalanceProvider::new(
                "toncenter-testnet",
                "https://testnet.toncenter.com/api/v2/getAddressInformation?address={address}",
                ProviderKind::TonCenter,
            ),
            BalanceProvider::new(
                "tonapi-testnet",
                "https://testnet.tonapi.io/v2/accounts/{address}",
                ProviderKind::TonApi,
            ),
        ],
    }
}
