//! ENS reverse resolution.
//!
//! `resolve_did` maps an address to its primary ENS name: look up the resolver of
//! `<address>.addr.reverse` in the ENS registry, ask it for `name(node)`, then check that the name
//! resolves forward to the same address. All reads go through `eth_call` on the connected
//! provider, so this only works on the chain where the ENS registry is deployed.

use crate::provider::{Provider, ProviderError};

use serde_json::json;
use sha3::{Digest, Keccak256};
use tracing::debug;

/// ENS registry address on Ethereum mainnet.
pub const ENS_REGISTRY_ADDRESS: &str = "0x00000000000C2E074eC69A0dFb2997BA6C7d2e1e";

/// EIP-137 namehash of a dot separated name.
pub fn namehash(name: &str) -> [u8; 32] {
    let mut node = [0u8; 32];
    if name.is_empty() {
        return node;
    }

    for label in name.rsplit('.') {
        let label_hash = Keccak256::digest(label.as_bytes());
        let mut hasher = Keccak256::new();
        hasher.update(node);
        hasher.update(label_hash);
        node.copy_from_slice(&hasher.finalize());
    }
    node
}

/// First four bytes of the Keccak-256 hash of a function signature.
fn selector(signature: &str) -> [u8; 4] {
    let hash = Keccak256::digest(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Calldata for a function taking a single `bytes32` node.
fn encode_node_call(signature: &str, node: &[u8; 32]) -> String {
    format!("0x{}{}", hex::encode(selector(signature)), hex::encode(node))
}

async fn eth_call(provider: &dyn Provider, to: &str, data: String) -> Result<Vec<u8>, ProviderError> {
    let result = provider
        .request("eth_call", vec![json!({ "to": to, "data": data }), json!("latest")])
        .await?;

    let raw = result
        .as_str()
        .ok_or_else(|| ProviderError::invalid_response("eth_call", "expected a hex string"))?;
    hex::decode(raw.trim_start_matches("0x"))
        .map_err(|e| ProviderError::invalid_response("eth_call", e.to_string()))
}

/// Decode an ABI encoded `address` return value; the zero address decodes to `None`.
fn decode_address(data: &[u8]) -> Option<String> {
    let word = data.get(..32)?;
    let address = &word[12..];
    if address.iter().all(|b| *b == 0) {
        return None;
    }
    Some(format!("0x{}", hex::encode(address)))
}

fn read_word(data: &[u8], offset: usize) -> Option<usize> {
    let word = data.get(offset..offset.checked_add(32)?)?;
    if word[..24].iter().any(|b| *b != 0) {
        return None;
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&word[24..]);
    usize::try_from(u64::from_be_bytes(bytes)).ok()
}

/// Decode an ABI encoded dynamic `string` return value.
fn decode_string(data: &[u8]) -> Option<String> {
    let offset = read_word(data, 0)?;
    let len = read_word(data, offset)?;
    let start = offset.checked_add(32)?;
    let bytes = data.get(start..start.checked_add(len)?)?;
    String::from_utf8(bytes.to_vec()).ok()
}

async fn resolver_for(provider: &dyn Provider, node: &[u8; 32]) -> Result<Option<String>, ProviderError> {
    let data = eth_call(
        provider,
        ENS_REGISTRY_ADDRESS,
        encode_node_call("resolver(bytes32)", node),
    )
    .await?;
    Ok(decode_address(&data))
}

/// Resolve the primary ENS name of `address`.
///
/// Returns `Ok(None)` when no reverse record exists or when the name does not resolve back to
/// the address.
pub async fn lookup_address(
    provider: &dyn Provider,
    address: &str,
) -> Result<Option<String>, ProviderError> {
    let address = address.trim_start_matches("0x").to_lowercase();
    let reverse_node = namehash(&format!("{}.addr.reverse", address));

    let Some(resolver) = resolver_for(provider, &reverse_node).await? else {
        debug!("No reverse resolver for 0x{}", address);
        return Ok(None);
    };

    let data = eth_call(provider, &resolver, encode_node_call("name(bytes32)", &reverse_node)).await?;
    let Some(name) = decode_string(&data).filter(|name| !name.is_empty()) else {
        return Ok(None);
    };

    let forward_node = namehash(&name);
    let Some(forward_resolver) = resolver_for(provider, &forward_node).await? else {
        debug!("Name {} has no resolver, ignoring reverse record", name);
        return Ok(None);
    };
    let data = eth_call(
        provider,
        &forward_resolver,
        encode_node_call("addr(bytes32)", &forward_node),
    )
    .await?;

    match decode_address(&data) {
        Some(resolved) if resolved.trim_start_matches("0x") == address => Ok(Some(name)),
        _ => {
            debug!("Name {} does not resolve back to 0x{}", name, address);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockProvider;
    use serde_json::Value;

    const OWNER: &str = "0xd8da6bf26964af9d7eed9e03e53415d37aa96045";
    const RESOLVER: &str = "0x231b0ee14048e9dccd1d247744d114a4eb5e8e63";

    fn address_word(address: &str) -> String {
        format!("0x{:0>64}", address.trim_start_matches("0x"))
    }

    fn abi_string(value: &str) -> String {
        let mut data = vec![0u8; 64];
        data[31] = 32;
        data[56..64].copy_from_slice(&(value.len() as u64).to_be_bytes());
        let mut bytes = value.as_bytes().to_vec();
        bytes.resize(value.len().div_ceil(32) * 32, 0);
        data.extend(bytes);
        format!("0x{}", hex::encode(data))
    }

    fn ens_provider(name: &'static str, forward: &'static str) -> MockProvider {
        MockProvider::new(move |method, params| {
            assert_eq!(method, "eth_call");
            let to = params[0]["to"].as_str().unwrap().to_lowercase();
            let data = params[0]["data"].as_str().unwrap().to_string();
            let reverse = namehash(&format!("{}.addr.reverse", &OWNER[2..]));
            let forward_node = namehash(name);

            let result = if to == ENS_REGISTRY_ADDRESS.to_lowercase() {
                address_word(RESOLVER)
            } else if data == encode_node_call("name(bytes32)", &reverse) {
                abi_string(name)
            } else if data == encode_node_call("addr(bytes32)", &forward_node) {
                address_word(forward)
            } else {
                "0x".to_string()
            };
            Ok(Value::String(result))
        })
    }

    #[test]
    fn test_namehash_vectors() {
        assert_eq!(namehash(""), [0u8; 32]);
        assert_eq!(
            hex::encode(namehash("eth")),
            "93cdeb708b7545dc668eb9280176169d1c33cfd8ed6f04690a0bcc88a93fc4ae"
        );
        assert_eq!(
            hex::encode(namehash("foo.eth")),
            "de9b09fd7c5f901e23a3f19fecc54828e9c848539801e86591bd9801b019f84f"
        );
    }

    #[test]
    fn test_selectors() {
        assert_eq!(hex::encode(selector("addr(bytes32)")), "3b3b57de");
        assert_eq!(hex::encode(selector("name(bytes32)")), "691f3431");
        assert_eq!(hex::encode(selector("resolver(bytes32)")), "0178b8bf");
    }

    #[test]
    fn test_abi_decoding() {
        let encoded = hex::decode(abi_string("vitalik.eth").trim_start_matches("0x")).unwrap();
        assert_eq!(decode_string(&encoded).as_deref(), Some("vitalik.eth"));
        assert_eq!(decode_string(&[]), None);

        let word = hex::decode(address_word(RESOLVER).trim_start_matches("0x")).unwrap();
        assert_eq!(decode_address(&word).as_deref(), Some(RESOLVER));
        assert_eq!(decode_address(&[0u8; 32]), None);
    }

    #[tokio::test]
    async fn test_lookup_verified_name() {
        let provider = ens_provider("vitalik.eth", OWNER);
        let name = lookup_address(&provider, OWNER).await.unwrap();
        assert_eq!(name.as_deref(), Some("vitalik.eth"));
        assert_eq!(provider.count("eth_call"), 4);
    }

    #[tokio::test]
    async fn test_lookup_rejects_unverified_name() {
        let provider = ens_provider("vitalik.eth", "0x0000000000000000000000000000000000000001");
        assert_eq!(lookup_address(&provider, OWNER).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_lookup_without_resolver() {
        let provider = MockProvider::new(|_, _| Ok(Value::String("0x".to_string())));
        assert_eq!(lookup_address(&provider, OWNER).await.unwrap(), None);
        assert_eq!(provider.count("eth_call"), 1);
    }
}
