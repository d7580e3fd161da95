//! Typed parameters for each method
//!
//! Deserialization is the shape check: a missing or wrong-typed field fails
//! here, before the handler does any work. Structs that carry secrets wipe
//! their strings on drop.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::Method;
use crate::ipc::protocol::RpcError;

pub(crate) fn parse<T: DeserializeOwned>(method: Method, params: Value) -> Result<T, RpcError> {
    serde_json::from_value(params).map_err(|e| {
        RpcError::bad_request(format!("invalid params for {method}: {e}"))
            .with_data(json!({ "method": method.name() }))
    })
}

/// Reject empty identifiers that would otherwise reach the wallet library
pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<(), RpcError> {
    if value.trim().is_empty() {
        return Err(RpcError::bad_request(format!("{field} must not be empty"))
            .with_data(json!({ "field": field })));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateEntropy {
    pub word_count: u32,
}

#[derive(Deserialize, Zeroize, ZeroizeOnDrop)]
pub(crate) struct EncryptSecret {
    /// Base64 plaintext
    pub secret: String,
}

#[derive(Deserialize, Zeroize, ZeroizeOnDrop)]
pub(crate) struct SplitSecret {
    pub secret: String,
    pub shares: usize,
    pub threshold: usize,
}

#[derive(Deserialize, Zeroize, ZeroizeOnDrop)]
pub(crate) struct CombineShares {
    pub shares: Vec<String>,
}

#[derive(Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InitializeWdk {
    pub encrypted_seed: String,
    pub encryption_key: String,
    pub nonce: String,
    /// Network name to network configuration
    #[zeroize(skip)]
    pub config: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CallMethod {
    pub network: String,
    pub account_index: u32,
    pub method_name: String,
    #[serde(default)]
    pub args: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RegisterWallet {
    pub network: String,
    pub config: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RegisterProtocol {
    pub network: String,
    pub label: String,
    pub protocol: String,
    pub config: Map<String, Value>,
}
