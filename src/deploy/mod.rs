//! Deployment Tracker: drives one contract deployment on the backend and
//! translates its lifecycle events into wizard-facing updates.
//!
//! Runs as a single background task per wizard session; the UI loop applies
//! the resulting `DeployUpdate`s sequentially, so the wizard state never
//! sees concurrent mutation.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::abi::encode_constructor_args;
use crate::chain::{ChainBackend, ChainError, DeployOptions, ErrorSink, ProgressEvent};
use crate::types::{AccountMeta, Address, TxHash};
use crate::wizard::DeployRequest;

/// Coarse user-facing stage of an in-flight deployment, derived from the
/// finer-grained backend lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployPhase {
    Estimating,
    AwaitingConfirmation,
    AwaitingReceipt,
    ValidatingCode,
    Done,
}

/// Backend event name → phase. Names absent from this table are ignored, so
/// extending it is a data change rather than a new code path.
const EVENT_PHASES: &[(&str, DeployPhase)] = &[
    ("estimateGas", DeployPhase::Estimating),
    ("postTransaction", DeployPhase::Estimating),
    ("checkRequest", DeployPhase::AwaitingConfirmation),
    ("getTransactionReceipt", DeployPhase::AwaitingReceipt),
    ("hasReceipt", DeployPhase::ValidatingCode),
    ("getCode", DeployPhase::ValidatingCode),
    ("completed", DeployPhase::Done),
];

impl DeployPhase {
    /// Look up the phase for a raw backend event name.
    pub fn for_event(name: &str) -> Option<Self> {
        EVENT_PHASES
            .iter()
            .find(|(event, _)| *event == name)
            .map(|(_, phase)| *phase)
    }

    /// The human-readable status line shown while in this phase.
    pub fn message(self) -> &'static str {
        match self {
            DeployPhase::Estimating => "Preparing transaction for network transmission",
            DeployPhase::AwaitingConfirmation => {
                "Waiting for confirmation of the transaction in the secure signer"
            }
            DeployPhase::AwaitingReceipt => {
                "Waiting for the contract deployment transaction receipt"
            }
            DeployPhase::ValidatingCode => "Validating the deployed contract code",
            DeployPhase::Done => "The contract deployment has been completed",
        }
    }
}

/// Updates the tracker emits toward the wizard. Zero or more `Phase`s are
/// followed by exactly one terminal variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployUpdate {
    Phase {
        phase: DeployPhase,
        txhash: Option<TxHash>,
    },
    Completed {
        address: Address,
    },
    Rejected,
    Failed {
        detail: String,
    },
}

/// Start a deployment on a background task, returning the update stream.
///
/// The wizard's one-way step transition guarantees this is called at most
/// once per session.
pub fn spawn<B, E>(
    backend: Arc<B>,
    sink: E,
    request: DeployRequest,
) -> mpsc::UnboundedReceiver<DeployUpdate>
where
    B: ChainBackend,
    E: ErrorSink,
{
    let (update_tx, update_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        run(backend, sink, request, update_tx).await;
    });
    update_rx
}

/// Drive one deployment to its terminal outcome.
pub async fn run<B, E>(
    backend: Arc<B>,
    sink: E,
    request: DeployRequest,
    update_tx: mpsc::UnboundedSender<DeployUpdate>,
) where
    B: ChainBackend,
    E: ErrorSink,
{
    let options = match build_options(&request) {
        Ok(options) => options,
        Err(detail) => {
            // Bad constructor arguments surface like any other deploy error.
            let err = ChainError::BadResponse(detail.clone());
            sink.report(&err);
            let _ = update_tx.send(DeployUpdate::Failed { detail });
            return;
        }
    };

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    let deploy = backend.deploy(options, progress_tx);
    tokio::pin!(deploy);

    let mut progress_open = true;
    let result = loop {
        tokio::select! {
            event = progress_rx.recv(), if progress_open => {
                match event {
                    Some(event) => handle_event(&update_tx, event),
                    None => progress_open = false,
                }
            }
            result = &mut deploy => break result,
        }
    };

    // The backend has settled; deliver any events that raced the resolution.
    while let Ok(event) = progress_rx.try_recv() {
        handle_event(&update_tx, event);
    }

    match result {
        Ok(address) => {
            info!(%address, "contract deployed");
            // The settled deploy future still borrows `backend` until it is
            // dropped at the end of this scope.
            record_metadata(backend.clone(), &request, address.clone());
            let _ = update_tx.send(DeployUpdate::Completed { address });
        }
        Err(err) if err.is_rejection() => {
            // Expected user action; never reported to the error sink.
            info!("deployment rejected in the signer");
            let _ = update_tx.send(DeployUpdate::Rejected);
        }
        Err(err) => {
            error!(%err, "contract deployment failed");
            sink.report(&err);
            let _ = update_tx.send(DeployUpdate::Failed {
                detail: err.to_string(),
            });
        }
    }
}

/// Compose the transaction payload: bytecode plus encoded constructor args.
fn build_options(request: &DeployRequest) -> Result<DeployOptions, String> {
    let encoded = encode_constructor_args(request.abi.constructor_params(), &request.params)
        .map_err(|e| e.to_string())?;

    let code = request.code.strip_prefix("0x").unwrap_or(&request.code);
    let data = format!("0x{}{}", code, hex::encode(encoded));

    Ok(DeployOptions {
        data,
        from: request.from.clone(),
    })
}

fn handle_event(
    update_tx: &mpsc::UnboundedSender<DeployUpdate>,
    event: Result<ProgressEvent, ChainError>,
) {
    let event = match event {
        Ok(event) => event,
        Err(err) => {
            // A progress-callback error is non-fatal; the terminal outcome
            // comes from the deploy future alone.
            warn!(%err, "deployment progress callback reported an error");
            return;
        }
    };

    let Some(phase) = DeployPhase::for_event(&event.state) else {
        debug!(state = %event.state, "unknown contract deployment state");
        return;
    };

    // The hash is only trusted off the receipt-wait event, mirroring when
    // the backend first knows it.
    let txhash = if phase == DeployPhase::AwaitingReceipt {
        event.txhash
    } else {
        None
    };

    let _ = update_tx.send(DeployUpdate::Phase { phase, txhash });
}

/// Fire-and-forget recording of the contract's name and metadata. Completion
/// of the wizard does not wait on these; failures are only logged.
fn record_metadata<B: ChainBackend>(backend: Arc<B>, request: &DeployRequest, address: Address) {
    let name = request.name.clone();
    let meta = AccountMeta::for_new_contract(
        request.abi.to_json(),
        request.source.clone(),
        request.description.clone(),
    );

    tokio::spawn(async move {
        if let Err(err) = backend.set_account_name(&address, &name).await {
            warn!(%address, %err, "failed to record contract name");
        }
        if let Err(err) = backend.set_account_meta(&address, &meta).await {
            warn!(%address, %err, "failed to record contract metadata");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_backend_event_maps_to_its_phase() {
        assert_eq!(
            DeployPhase::for_event("estimateGas"),
            Some(DeployPhase::Estimating)
        );
        assert_eq!(
            DeployPhase::for_event("postTransaction"),
            Some(DeployPhase::Estimating)
        );
        assert_eq!(
            DeployPhase::for_event("checkRequest"),
            Some(DeployPhase::AwaitingConfirmation)
        );
        assert_eq!(
            DeployPhase::for_event("getTransactionReceipt"),
            Some(DeployPhase::AwaitingReceipt)
        );
        assert_eq!(
            DeployPhase::for_event("hasReceipt"),
            Some(DeployPhase::ValidatingCode)
        );
        assert_eq!(
            DeployPhase::for_event("getCode"),
            Some(DeployPhase::ValidatingCode)
        );
        assert_eq!(DeployPhase::for_event("completed"), Some(DeployPhase::Done));
    }

    #[test]
    fn test_unknown_event_names_are_a_no_op() {
        assert_eq!(DeployPhase::for_event("estimategas"), None);
        assert_eq!(DeployPhase::for_event(""), None);
        assert_eq!(DeployPhase::for_event("somethingNew"), None);
    }

    #[test]
    fn test_phase_messages() {
        assert_eq!(
            DeployPhase::Done.message(),
            "The contract deployment has been completed"
        );
        assert_eq!(
            DeployPhase::AwaitingConfirmation.message(),
            "Waiting for confirmation of the transaction in the secure signer"
        );
    }

    #[test]
    fn test_handle_event_forwards_txhash_only_on_receipt_wait() {
        let (tx, mut rx) = mpsc::unbounded_channel();

        handle_event(
            &tx,
            Ok(ProgressEvent::with_txhash("checkRequest", TxHash::new("0x1"))),
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            DeployUpdate::Phase {
                phase: DeployPhase::AwaitingConfirmation,
                txhash: None
            }
        );

        handle_event(
            &tx,
            Ok(ProgressEvent::with_txhash(
                "getTransactionReceipt",
                TxHash::new("0xabc"),
            )),
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            DeployUpdate::Phase {
                phase: DeployPhase::AwaitingReceipt,
                txhash: Some(TxHash::new("0xabc"))
            }
        );
    }

    #[test]
    fn test_handle_event_swallows_unknown_and_errored_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();

        handle_event(&tx, Ok(ProgressEvent::new("mystery")));
        handle_event(&tx, Err(ChainError::Transport("socket closed".to_string())));

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_build_options_appends_encoded_args() {
        use crate::abi::Abi;
        use crate::wizard::DeployRequest;

        let abi = Abi::parse(
            r#"[{"type":"constructor","inputs":[{"name":"flag","type":"bool"}]}]"#,
        )
        .unwrap();
        let request = DeployRequest {
            code: "0x6060".to_string(),
            from: Address::new("0x0000000000000000000000000000000000000001"),
            abi,
            params: vec!["true".to_string()],
            name: "Token".to_string(),
            description: String::new(),
            source: String::new(),
        };

        let options = build_options(&request).unwrap();
        assert!(options.data.starts_with("0x6060"));
        assert_eq!(options.data.len(), 2 + 4 + 64);
        assert!(options.data.ends_with('1'));
    }

    #[test]
    fn test_build_options_rejects_bad_args() {
        use crate::abi::Abi;
        use crate::wizard::DeployRequest;

        let abi = Abi::parse(
            r#"[{"type":"constructor","inputs":[{"name":"supply","type":"uint256"}]}]"#,
        )
        .unwrap();
        let request = DeployRequest {
            code: "0x6060".to_string(),
            from: Address::new("0x0000000000000000000000000000000000000001"),
            abi,
            params: vec!["not a number".to_string()],
            name: "Token".to_string(),
            description: String::new(),
            source: String::new(),
        };

        assert!(build_options(&request).is_err());
    }
}
