//! JSON-RPC `ChainBackend` for Ethereum-compatible nodes with a
//! Parity-style signer queue.
//!
//! The deployment path is: estimate gas, post the transaction to the signer
//! queue, poll the queue until the user confirms (or rejects), poll for the
//! receipt, then verify code exists at the new address. Each stage emits the
//! lifecycle event the tracker maps to a user-facing phase.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::chain::{ChainBackend, ChainError, DeployOptions, ProgressEvent, ProgressSender};
use crate::types::{AccountInfo, AccountMeta, Address, TxHash};

/// Delay between signer-queue and receipt polls.
const POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Headroom applied to the node's gas estimate, in percent. Deployments run
/// constructor code the estimate sometimes undershoots.
const GAS_HEADROOM_PERCENT: u128 = 20;

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct Receipt {
    #[serde(rename = "contractAddress")]
    contract_address: Option<String>,
    #[serde(rename = "blockNumber")]
    block_number: Option<String>,
}

pub struct RpcClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ChainError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, ChainError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(method, id, "rpc call");

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?;
        let parsed: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| ChainError::BadResponse(e.to_string()))?;

        if let Some(err) = parsed.error {
            return Err(ChainError::from_rpc(err.code, err.message));
        }
        parsed
            .result
            .ok_or_else(|| ChainError::BadResponse(format!("{method} returned no result")))
    }

    /// Like `call`, but treats a JSON `null` result as `None` instead of a
    /// protocol error (receipt and signer polls return null while pending).
    async fn call_nullable<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<Option<T>, ChainError> {
        match self.call::<Option<T>>(method, params).await {
            Ok(value) => Ok(value),
            Err(ChainError::BadResponse(msg)) if msg.ends_with("no result") => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn emit(progress: &ProgressSender, event: ProgressEvent) {
        // The receiver going away must not abort the deployment itself.
        let _ = progress.send(Ok(event));
    }

    /// Poll the signer queue until the request is confirmed or rejected.
    async fn await_confirmation(&self, request_id: &str) -> Result<TxHash, ChainError> {
        loop {
            match self
                .call_nullable::<String>("parity_checkRequest", json!([request_id]))
                .await?
            {
                Some(hash) => return Ok(TxHash::new(hash)),
                None => tokio::time::sleep(POLL_INTERVAL).await,
            }
        }
    }

    /// Poll for the deployment receipt until it is mined with a contract
    /// address.
    async fn await_receipt(&self, txhash: &TxHash) -> Result<Address, ChainError> {
        loop {
            let receipt = self
                .call_nullable::<Receipt>("eth_getTransactionReceipt", json!([txhash.as_str()]))
                .await?;
            match receipt {
                Some(Receipt {
                    contract_address: Some(address),
                    block_number: Some(_),
                }) => return Ok(Address::new(address)),
                _ => tokio::time::sleep(POLL_INTERVAL).await,
            }
        }
    }
}

#[async_trait]
impl ChainBackend for RpcClient {
    async fn accounts(&self) -> Result<Vec<AccountInfo>, ChainError> {
        let addresses: Vec<String> = self.call("eth_accounts", json!([])).await?;

        // Names are best-effort; nodes without the parity namespace still
        // yield a usable picker.
        let infos: Option<serde_json::Value> = self
            .call_nullable("parity_accountsInfo", json!([]))
            .await
            .unwrap_or(None);

        Ok(addresses
            .into_iter()
            .map(|hex| {
                let address = Address::new(hex);
                let name = infos
                    .as_ref()
                    .and_then(|m| m.get(address.as_str()))
                    .and_then(|info| info.get("name"))
                    .and_then(|n| n.as_str())
                    .map(ToString::to_string);
                AccountInfo { address, name }
            })
            .collect())
    }

    async fn deploy(
        &self,
        options: DeployOptions,
        progress: ProgressSender,
    ) -> Result<Address, ChainError> {
        let tx = json!({
            "from": options.from.as_str(),
            "data": options.data,
        });

        Self::emit(&progress, ProgressEvent::new("estimateGas"));
        let estimate: String = self.call("eth_estimateGas", json!([tx])).await?;
        let gas = scale_gas(&estimate)?;

        let tx = json!({
            "from": options.from.as_str(),
            "data": options.data,
            "gas": gas,
        });

        Self::emit(&progress, ProgressEvent::new("postTransaction"));
        let request_id: String = self.call("parity_postTransaction", json!([tx])).await?;

        Self::emit(&progress, ProgressEvent::new("checkRequest"));
        let txhash = self.await_confirmation(&request_id).await?;

        Self::emit(
            &progress,
            ProgressEvent::with_txhash("getTransactionReceipt", txhash.clone()),
        );
        let address = self.await_receipt(&txhash).await?;

        Self::emit(&progress, ProgressEvent::new("hasReceipt"));
        Self::emit(&progress, ProgressEvent::new("getCode"));
        let code: String = self
            .call("eth_getCode", json!([address.as_str(), "latest"]))
            .await?;
        if code == "0x" || code.is_empty() {
            return Err(ChainError::CodeMissing(address));
        }

        Self::emit(&progress, ProgressEvent::new("completed"));
        Ok(address)
    }

    async fn set_account_name(&self, address: &Address, name: &str) -> Result<(), ChainError> {
        let _: bool = self
            .call("parity_setAccountName", json!([address.as_str(), name]))
            .await?;
        Ok(())
    }

    async fn set_account_meta(
        &self,
        address: &Address,
        meta: &AccountMeta,
    ) -> Result<(), ChainError> {
        // The registry stores metadata as a JSON string.
        let serialized = serde_json::to_string(meta)
            .map_err(|e| ChainError::BadResponse(e.to_string()))?;
        let _: bool = self
            .call(
                "parity_setAccountMeta",
                json!([address.as_str(), serialized]),
            )
            .await?;
        Ok(())
    }
}

/// Add headroom to a hex gas estimate, returning a hex quantity.
fn scale_gas(estimate: &str) -> Result<String, ChainError> {
    let raw = estimate.strip_prefix("0x").unwrap_or(estimate);
    let value = u128::from_str_radix(raw, 16)
        .map_err(|_| ChainError::BadResponse(format!("bad gas estimate '{estimate}'")))?;
    let scaled = value + value * GAS_HEADROOM_PERCENT / 100;
    Ok(format!("{scaled:#x}"))
}
