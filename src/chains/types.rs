//! Types describing chains known to the application

use crate::utils::to_hex_chain_id;

use serde::{Deserialize, Serialize};

/// Namespace tag for EVM chains (CAIP-2).
pub const EIP155_NAMESPACE: &str = "eip155";

fn default_decimals() -> u8 {
    18
}

/// Immutable metadata describing a chain.
///
/// Descriptors are looked up by chain identifier and never mutated once registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainDescriptor {
    /// Namespace tag, e.g. `eip155`.
    pub chain_namespace: String,
    /// Chain identifier in decimal form for EVM chains.
    pub chain_id: String,
    /// Ticker symbol of the native currency.
    pub ticker: String,
    /// Full name of the native currency.
    pub ticker_name: String,
    /// Human readable network name.
    pub display_name: String,
    /// Decimals of the native currency.
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    /// Public RPC endpoints.
    #[serde(default)]
    pub rpc_urls: Vec<String>,
    /// Block explorer URLs.
    #[serde(default)]
    pub block_explorer_urls: Vec<String>,
}

impl ChainDescriptor {
    /// Ethereum mainnet.
    pub fn mainnet() -> Self {
        Self {
            chain_namespace: EIP155_NAMESPACE.to_string(),
            chain_id: "1".to_string(),
            ticker: "ETH".to_string(),
            ticker_name: "Ethereum".to_string(),
            display_name: "Ethereum".to_string(),
            decimals: 18,
            rpc_urls: vec!["https://cloudflare-eth.com".to_string()],
            block_explorer_urls: vec!["https://etherscan.io".to_string()],
        }
    }

    /// Build the `wallet_addEthereumChain` payload for this chain.
    ///
    /// Returns `None` when the chain identifier is not numeric and therefore cannot be
    /// expressed as an EVM chain id.
    pub fn to_add_chain_parameter(&self) -> Option<AddChainParameter> {
        let chain_id = to_hex_chain_id(&self.chain_id)?;
        Some(AddChainParameter {
            chain_id,
            chain_name: self.display_name.clone(),
            native_currency: NativeCurrency {
                name: self.ticker_name.clone(),
                symbol: self.ticker.clone(),
                decimals: self.decimals,
            },
            rpc_urls: self.rpc_urls.clone(),
            block_explorer_urls: self.block_explorer_urls.clone(),
        })
    }
}

/// Native currency section of an add-chain request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Payload of the `wallet_addEthereumChain` request (EIP-3085).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddChainParameter {
    /// Hex encoded chain id, e.g. `0x89`.
    pub chain_id: String,
    pub chain_name: String,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub block_explorer_urls: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_chain_parameter_schema() {
        let payload = ChainDescriptor::mainnet().to_add_chain_parameter().unwrap();
        let value = serde_json::to_value(&payload).unwrap();

        assert_eq!(value["chainId"], "0x1");
        assert_eq!(value["chainName"], "Ethereum");
        assert_eq!(value["nativeCurrency"]["symbol"], "ETH");
        assert_eq!(value["nativeCurrency"]["decimals"], 18);
        assert_eq!(value["rpcUrls"][0], "https://cloudflare-eth.com");
        assert_eq!(value["blockExplorerUrls"][0], "https://etherscan.io");
    }

    #[test]
    fn test_non_numeric_chain_has_no_add_payload() {
        let mut descriptor = ChainDescriptor::mainnet();
        descriptor.chain_namespace = "solana".to_string();
        descriptor.chain_id = "mainnet-beta".to_string();
        assert!(descriptor.to_add_chain_parameter().is_none());
    }

    #[test]
    fn test_descriptor_defaults_when_deserializing() {
        let descriptor: ChainDescriptor = serde_json::from_str(
            r#"{
				"chainNamespace": "eip155",
				"chainId": "137",
				"ticker": "MATIC",
				"tickerName": "Polygon",
				"displayName": "Polygon Mainnet"
			}"#,
        )
        .unwrap();

        assert_eq!(descriptor.decimals, 18);
        assert!(descriptor.rpc_urls.is_empty());
        let payload = descriptor.to_add_chain_parameter().unwrap();
        assert_eq!(payload.chain_id, "0x89");
        let value = serde_json::to_value(&payload).unwrap();
        assert!(value.get("blockExplorerUrls").is_none());
    }
}
