//! Chain metadata for wallet connectors
//!
//! This module provides the static descriptors connectors use to display networks and to ask a
//! wallet to add a network it does not know yet. The registry is pure data: it is built once at
//! startup and shared read-only afterwards.

/// Registry of chain descriptors keyed by chain identifier
mod registry;
/// Chain descriptor and add-chain payload types
mod types;

pub use registry::ChainRegistry;
pub use types::*;
