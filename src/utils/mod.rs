//!
//! Utility module for wallet connectors.
//!
//! Re-exports chain identifier and hex helpers shared by the provider, connector and chain layers.
/// Chain identifier and hex encoding helpers
pub mod index;

pub use index::{chain_id_from_value, hex_encode_message, normalize_chain_id, to_hex_chain_id};
