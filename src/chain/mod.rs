//! Ports onto the chain-interaction backend.
//!
//! The wizard core depends only on the traits here; `rpc` provides the
//! JSON-RPC implementation against a live node.

pub mod rpc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::types::{AccountInfo, AccountMeta, Address, TxHash};

/// JSON-RPC error code a Parity-style signer returns when the user declines
/// to authorize a request.
pub const REQUEST_REJECTED_CODE: i64 = -32003;

#[derive(Debug, Clone, Error)]
pub enum ChainError {
    /// The user declined the transaction in the signer. Expected, benign.
    #[error("the deployment was rejected in the signer")]
    Rejected,
    #[error("node rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected response from node: {0}")]
    BadResponse(String),
    #[error("no code present at {0} after deployment")]
    CodeMissing(Address),
}

impl ChainError {
    /// Whether this failure is the user-rejection classification, which
    /// terminates a deployment without being treated as an error.
    pub fn is_rejection(&self) -> bool {
        matches!(self, ChainError::Rejected)
    }

    /// Map a JSON-RPC error object onto the taxonomy.
    pub fn from_rpc(code: i64, message: String) -> Self {
        if code == REQUEST_REJECTED_CODE {
            ChainError::Rejected
        } else {
            ChainError::Rpc { code, message }
        }
    }
}

/// A raw backend lifecycle event observed while a deployment is in flight.
///
/// `state` is the backend's event name; names the tracker does not recognize
/// are ignored, so new backend states degrade gracefully.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub state: String,
    pub txhash: Option<TxHash>,
}

impl ProgressEvent {
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            txhash: None,
        }
    }

    pub fn with_txhash(state: impl Into<String>, txhash: TxHash) -> Self {
        Self {
            state: state.into(),
            txhash: Some(txhash),
        }
    }
}

/// Channel on which a backend reports lifecycle events. An `Err` item is a
/// progress-callback error: logged by the tracker, never terminal.
pub type ProgressSender = mpsc::UnboundedSender<Result<ProgressEvent, ChainError>>;

/// Transaction-level options for a contract-creation transaction.
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Deployment bytecode with encoded constructor args appended,
    /// 0x-prefixed.
    pub data: String,
    pub from: Address,
}

/// The chain-interaction backend the deployment tracker drives.
#[async_trait]
pub trait ChainBackend: Send + Sync + 'static {
    /// Accounts available as contract owners.
    async fn accounts(&self) -> Result<Vec<AccountInfo>, ChainError>;

    /// Submit a contract-creation transaction and follow it to a deployed
    /// address. Emits zero or more `ProgressEvent`s on `progress` before
    /// resolving.
    async fn deploy(
        &self,
        options: DeployOptions,
        progress: ProgressSender,
    ) -> Result<Address, ChainError>;

    /// Record a human-readable name for an address.
    async fn set_account_name(&self, address: &Address, name: &str) -> Result<(), ChainError>;

    /// Attach structured metadata to an address.
    async fn set_account_meta(
        &self,
        address: &Address,
        meta: &AccountMeta,
    ) -> Result<(), ChainError>;
}

/// Capability for reporting non-rejection deployment failures, injected into
/// the tracker so failure routing carries no global state.
pub trait ErrorSink: Send + Sync + 'static {
    fn report(&self, error: &ChainError);
}

/// Sink that forwards failures to the tracing error stream; used by the
/// non-interactive CLI path.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogErrorSink;

impl ErrorSink for LogErrorSink {
    fn report(&self, error: &ChainError) {
        tracing::error!(%error, "contract deployment failed");
    }
}
