//! Shared chain-facing types: addresses, transaction hashes, account records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 20-byte account or contract address, kept in 0x-prefixed hex form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Wrap a 0x-prefixed hex address, normalizing to lowercase.
    ///
    /// Callers are expected to have checked well-formedness with
    /// `validation::is_address_valid` first; this does not re-validate.
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A 32-byte transaction hash in 0x-prefixed hex form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(String);

impl TxHash {
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An account visible to the node, used for the contract-owner picker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountInfo {
    pub address: Address,
    /// Human-readable name, when the node tracks one.
    #[serde(default)]
    pub name: Option<String>,
}

impl AccountInfo {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            name: None,
        }
    }

    /// Label shown in the owner picker.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("{} ({})", name, self.address),
            None => self.address.to_string(),
        }
    }
}

/// Metadata recorded against a freshly deployed contract address.
///
/// Field names match what the node's account registry expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountMeta {
    pub abi: serde_json::Value,
    pub contract: bool,
    /// Creation time in unix milliseconds.
    pub timestamp: i64,
    pub deleted: bool,
    pub source: String,
    pub description: String,
}

impl AccountMeta {
    /// Metadata for a contract deployed right now.
    pub fn for_new_contract(abi: serde_json::Value, source: String, description: String) -> Self {
        Self {
            abi,
            contract: true,
            timestamp: chrono::Utc::now().timestamp_millis(),
            deleted: false,
            source,
            description,
        }
    }
}
