use crate::config::read_env_or_file;
use anyhow::{anyhow, Result};
use dotenvy::dotenv;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Absent in paper mode.
    #[serde(skip_serializing)]
    pub private_key: Option<String>,
    pub rpc_url: String,
    pub network: String,
}

impl ExchangeConfig {
    /// Address of the signing wallet, or the zero address without a key.
    pub fn owner_address(&self) -> Result<Address> {
        match &self.private_key {
            Some(key) => {
                let wallet: LocalWallet = key
                    .parse()
                    .map_err(|e| anyhow!("Invalid private key: {}", e))?;
                Ok(wallet.address())
            }
            None => Ok(Address::zero()),
        }
    }
}

pub fn load_exchange_config() -> Result<ExchangeConfig> {
    dotenv().ok(); // Load .env file if it exists, ignore if missing (env vars might be set otherwise)

    let private_key = read_env_or_file("RANGE_BOT_PRIVATE_KEY").ok();

    let rpc_url =
        env::var("RANGE_BOT_RPC_URL").unwrap_or_else(|_| "http://127.0.0.1:8545".to_string());

    let network = env::var("RANGE_BOT_NETWORK").unwrap_or_else(|_| "paper".to_string());

    Ok(ExchangeConfig {
        private_key,
        rpc_url,
        network,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_address_from_key() {
        // Well-known anvil account #0
        let config = ExchangeConfig {
            private_key: Some(
                "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80".to_string(),
            ),
            rpc_url: String::new(),
            network: "paper".to_string(),
        };
        let expected: Address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap();
        assert_eq!(config.owner_address().unwrap(), expected);

        let keyless = ExchangeConfig {
            private_key: None,
            ..config.clone()
        };
        assert_eq!(keyless.owner_address().unwrap(), Address::zero());

        let bad = ExchangeConfig {
            private_key: Some("not-a-key".to_string()),
            ..config
        };
        assert!(bad.owner_address().is_err());
    }
}
