//! End-to-end deployment flow over a scripted backend: the wizard collects
//! the fields, the tracker drives the backend and the wizard applies the
//! resulting updates.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;

use deployer::abi::Abi;
use deployer::chain::{
    ChainBackend, ChainError, DeployOptions, ErrorSink, ProgressEvent, ProgressSender,
};
use deployer::deploy::{self, DeployPhase, DeployUpdate};
use deployer::types::{AccountInfo, AccountMeta, Address, TxHash};
use deployer::wizard::{DeployRequest, Outcome, Prefill, Step, Wizard};

const OWNER: &str = "0x63cf90d3f0410092fc0fca41846f596223979195";
const CONTRACT: &str = "0x00000000000000000000000000000000000000aa";
const SIMPLE_ABI: &str =
    r#"[{"type":"constructor","inputs":[{"name":"supply","type":"uint256"}]}]"#;

/// Backend that replays a fixed event script and resolves with a fixed
/// result, recording the metadata calls it receives.
struct MockBackend {
    script: Vec<Result<ProgressEvent, ChainError>>,
    result: Result<Address, ChainError>,
    names: Mutex<Vec<(Address, String)>>,
    metas: Mutex<Vec<(Address, AccountMeta)>>,
}

impl MockBackend {
    fn new(script: Vec<Result<ProgressEvent, ChainError>>, result: Result<Address, ChainError>) -> Self {
        Self {
            script,
            result,
            names: Mutex::new(Vec::new()),
            metas: Mutex::new(Vec::new()),
        }
    }

    fn success_script() -> Vec<Result<ProgressEvent, ChainError>> {
        vec![
            Ok(ProgressEvent::new("estimateGas")),
            Ok(ProgressEvent::new("postTransaction")),
            Ok(ProgressEvent::new("checkRequest")),
            Ok(ProgressEvent::with_txhash(
                "getTransactionReceipt",
                TxHash::new("0xabc"),
            )),
            Ok(ProgressEvent::new("hasReceipt")),
            Ok(ProgressEvent::new("getCode")),
            // Unrecognized event names must be ignored, not fatal.
            Ok(ProgressEvent::new("somethingNew")),
            Ok(ProgressEvent::new("completed")),
        ]
    }
}

#[async_trait]
impl ChainBackend for MockBackend {
    async fn accounts(&self) -> Result<Vec<AccountInfo>, ChainError> {
        Ok(vec![AccountInfo::new(Address::new(OWNER))])
    }

    async fn deploy(
        &self,
        _options: DeployOptions,
        progress: ProgressSender,
    ) -> Result<Address, ChainError> {
        for item in &self.script {
            let _ = progress.send(item.clone());
        }
        self.result.clone()
    }

    async fn set_account_name(&self, address: &Address, name: &str) -> Result<(), ChainError> {
        self.names
            .lock()
            .unwrap()
            .push((address.clone(), name.to_string()));
        Ok(())
    }

    async fn set_account_meta(
        &self,
        address: &Address,
        meta: &AccountMeta,
    ) -> Result<(), ChainError> {
        self.metas
            .lock()
            .unwrap()
            .push((address.clone(), meta.clone()));
        Ok(())
    }
}

/// Sink that only counts how often it is hit.
#[derive(Clone, Default)]
struct CountingSink {
    hits: Arc<AtomicUsize>,
}

impl ErrorSink for CountingSink {
    fn report(&self, _error: &ChainError) {
        self.hits.fetch_add(1, Ordering::SeqCst);
    }
}

/// Walk a wizard to the point of deployment and hand back the request.
fn prepared_wizard() -> (Wizard, DeployRequest) {
    let mut wizard = Wizard::new(vec![AccountInfo::new(Address::new(OWNER))], Prefill::default());
    wizard.set_name("My Token");
    wizard.set_description("a test token");
    wizard.set_abi(SIMPLE_ABI);
    wizard.set_code("0x6060604052");
    wizard.set_params(vec!["1000".to_string()]);
    wizard.advance().unwrap();
    let request = wizard.begin_deployment().unwrap();
    (wizard, request)
}

fn request_only() -> DeployRequest {
    DeployRequest {
        code: "0x6060604052".to_string(),
        from: Address::new(OWNER),
        abi: Abi::parse(SIMPLE_ABI).unwrap(),
        params: vec!["1000".to_string()],
        name: "My Token".to_string(),
        description: "a test token".to_string(),
        source: String::new(),
    }
}

async fn collect_updates(
    mut rx: tokio::sync::mpsc::UnboundedReceiver<DeployUpdate>,
) -> Vec<DeployUpdate> {
    timeout(Duration::from_secs(5), async {
        let mut updates = Vec::new();
        while let Some(update) = rx.recv().await {
            updates.push(update);
        }
        updates
    })
    .await
    .expect("deployment did not settle in time")
}

#[tokio::test]
async fn successful_deployment_walks_phases_and_completes_the_wizard() {
    let backend = Arc::new(MockBackend::new(
        MockBackend::success_script(),
        Ok(Address::new(CONTRACT)),
    ));
    let sink = CountingSink::default();
    let (mut wizard, request) = prepared_wizard();

    let rx = deploy::spawn(backend.clone(), sink.clone(), request);
    let updates = collect_updates(rx).await;

    let phases: Vec<DeployPhase> = updates
        .iter()
        .filter_map(|u| match u {
            DeployUpdate::Phase { phase, .. } => Some(*phase),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        vec![
            DeployPhase::Estimating,
            DeployPhase::Estimating,
            DeployPhase::AwaitingConfirmation,
            DeployPhase::AwaitingReceipt,
            DeployPhase::ValidatingCode,
            DeployPhase::ValidatingCode,
            DeployPhase::Done,
        ]
    );
    assert_eq!(
        updates.last(),
        Some(&DeployUpdate::Completed {
            address: Address::new(CONTRACT)
        })
    );

    for update in updates {
        apply(&mut wizard, update);
    }
    assert_eq!(wizard.step(), Step::Completed);
    assert_eq!(wizard.deployed_address().unwrap().as_str(), CONTRACT);
    assert_eq!(wizard.transaction_hash().unwrap().as_str(), "0xabc");
    assert!(wizard.outcome().is_none());
    assert_eq!(sink.hits.load(Ordering::SeqCst), 0);

    // Name and metadata recording is fire-and-forget; give it a moment.
    let recorded = timeout(Duration::from_secs(5), async {
        loop {
            if !backend.metas.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(recorded.is_ok(), "metadata was never recorded");

    let names = backend.names.lock().unwrap();
    assert_eq!(names.len(), 1);
    assert_eq!(names[0].0.as_str(), CONTRACT);
    assert_eq!(names[0].1, "My Token");

    let metas = backend.metas.lock().unwrap();
    let meta = &metas[0].1;
    assert!(meta.contract);
    assert!(!meta.deleted);
    assert_eq!(meta.description, "a test token");
}

#[tokio::test]
async fn signer_rejection_is_terminal_but_not_an_error() {
    let backend = Arc::new(MockBackend::new(
        vec![
            Ok(ProgressEvent::new("estimateGas")),
            Ok(ProgressEvent::new("checkRequest")),
        ],
        Err(ChainError::Rejected),
    ));
    let sink = CountingSink::default();
    let (mut wizard, request) = prepared_wizard();

    let rx = deploy::spawn(backend, sink.clone(), request);
    let updates = collect_updates(rx).await;

    assert_eq!(updates.last(), Some(&DeployUpdate::Rejected));
    // A rejection is an expected user action, never reported to the sink.
    assert_eq!(sink.hits.load(Ordering::SeqCst), 0);

    for update in updates {
        apply(&mut wizard, update);
    }
    assert_eq!(wizard.outcome(), Some(&Outcome::Rejected));
    assert_eq!(wizard.step(), Step::Deployment);
    assert!(wizard.deployed_address().is_none());
}

#[tokio::test]
async fn backend_failure_is_reported_to_the_sink_exactly_once() {
    let backend = Arc::new(MockBackend::new(
        vec![Ok(ProgressEvent::new("estimateGas"))],
        Err(ChainError::Rpc {
            code: -32000,
            message: "out of gas".to_string(),
        }),
    ));
    let sink = CountingSink::default();
    let (mut wizard, request) = prepared_wizard();

    let rx = deploy::spawn(backend, sink.clone(), request);
    let updates = collect_updates(rx).await;

    match updates.last() {
        Some(DeployUpdate::Failed { detail }) => assert!(detail.contains("out of gas")),
        other => panic!("expected a failure update, got {other:?}"),
    }
    assert_eq!(sink.hits.load(Ordering::SeqCst), 1);

    for update in updates {
        apply(&mut wizard, update);
    }
    match wizard.outcome() {
        Some(Outcome::Failed(detail)) => assert!(detail.contains("out of gas")),
        other => panic!("expected a failed outcome, got {other:?}"),
    }
}

#[tokio::test]
async fn progress_callback_errors_do_not_terminate_the_deployment() {
    let backend = Arc::new(MockBackend::new(
        vec![
            Ok(ProgressEvent::new("estimateGas")),
            Err(ChainError::Transport("socket closed".to_string())),
            Ok(ProgressEvent::new("completed")),
        ],
        Ok(Address::new(CONTRACT)),
    ));
    let sink = CountingSink::default();

    let rx = deploy::spawn(backend, sink.clone(), request_only());
    let updates = collect_updates(rx).await;

    // The errored progress item vanishes; the deployment still completes.
    assert!(updates
        .iter()
        .all(|u| !matches!(u, DeployUpdate::Failed { .. } | DeployUpdate::Rejected)));
    assert_eq!(
        updates.last(),
        Some(&DeployUpdate::Completed {
            address: Address::new(CONTRACT)
        })
    );
    assert_eq!(sink.hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unencodable_constructor_arguments_fail_before_the_backend_runs() {
    let backend = Arc::new(MockBackend::new(Vec::new(), Ok(Address::new(CONTRACT))));
    let sink = CountingSink::default();

    let mut request = request_only();
    request.params = vec!["not a number".to_string()];

    let rx = deploy::spawn(backend, sink.clone(), request);
    let updates = collect_updates(rx).await;

    assert_eq!(updates.len(), 1);
    assert!(matches!(updates[0], DeployUpdate::Failed { .. }));
    assert_eq!(sink.hits.load(Ordering::SeqCst), 1);
}

/// Mirror of how the TUI applies tracker updates to the wizard.
fn apply(wizard: &mut Wizard, update: DeployUpdate) {
    match update {
        DeployUpdate::Phase { phase, txhash } => wizard.apply_phase(phase, txhash),
        DeployUpdate::Completed { address } => wizard.complete(address),
        DeployUpdate::Rejected => wizard.reject(),
        DeployUpdate::Failed { detail } => wizard.fail(detail),
    }
}
