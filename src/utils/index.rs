use serde_json::Value;

/// Encode a decimal (or already `0x`-prefixed) chain identifier as a minimal hex quantity.
///
/// `"137"` becomes `"0x89"`. Returns `None` when the identifier is not numeric.
pub fn to_hex_chain_id(chain_id: &str) -> Option<String> {
    let chain_id = chain_id.trim();
    let value = match chain_id.strip_prefix("0x").or_else(|| chain_id.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok()?,
        None => chain_id.parse::<u64>().ok()?,
    };
    Some(format!("{:#x}", value))
}

/// Normalize a chain identifier reported by a provider into its decimal string form.
///
/// Providers answer `eth_chainId` with a hex quantity, but some older ones answer with a
/// decimal string or a JSON number.
pub fn chain_id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => n.as_u64().map(|n| n.to_string()),
        Value::String(s) => {
            let s = s.trim();
            match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                Some(hex) => u64::from_str_radix(hex, 16).ok().map(|n| n.to_string()),
                None => s.parse::<u64>().ok().map(|n| n.to_string()),
            }
        }
        _ => None,
    }
}

/// Decimal form of a chain identifier given in decimal or `0x` hex.
///
/// `"0x89"` and `"137"` both become `"137"`. Returns `None` when the identifier is not numeric.
pub fn normalize_chain_id(chain_id: &str) -> Option<String> {
    chain_id_from_value(&Value::String(chain_id.to_string()))
}

/// Hex encode a UTF-8 message the way `personal_sign` expects it.
pub fn hex_encode_message(message: &str) -> String {
    format!("0x{}", hex::encode(message.as_bytes()))
}
