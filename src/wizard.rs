//! Wizard Controller: the deployment wizard's step state machine.
//!
//! Owns every collected form field and its validity, gates step advancement
//! on per-step validity conjunctions, and applies the terminal events the
//! deployment tracker reports back. Holds no async state itself, so the
//! whole control flow is unit-testable without a backend or a terminal.

use serde::{Deserialize, Serialize};

use crate::abi::Abi;
use crate::deploy::DeployPhase;
use crate::types::{AccountInfo, Address, TxHash};
use crate::validation::{
    self, is_address_valid, validate_abi, validate_code, validate_name,
};

/// Wizard position, strictly forward-ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Step {
    Details,
    Parameters,
    Deployment,
    Completed,
}

impl Step {
    pub fn title(self) -> &'static str {
        match self {
            Step::Details => "contract details",
            Step::Parameters => "contract parameters",
            Step::Deployment => "deployment",
            Step::Completed => "completed",
        }
    }

    pub fn all() -> &'static [Step] {
        &[
            Step::Details,
            Step::Parameters,
            Step::Deployment,
            Step::Completed,
        ]
    }

    fn next(self) -> Option<Step> {
        match self {
            Step::Details => Some(Step::Parameters),
            Step::Parameters => Some(Step::Deployment),
            Step::Deployment => Some(Step::Completed),
            Step::Completed => None,
        }
    }
}

/// How the user supplies the ABI and bytecode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    /// Manual input of the ABI and the bytecode.
    Manual,
    /// Parse the ABI and the bytecode from solc output.
    Solc,
}

impl InputType {
    pub fn label(self) -> &'static str {
        match self {
            InputType::Manual => "Manually",
            InputType::Solc => "From solc",
        }
    }

    pub fn all() -> &'static [InputType] {
        &[InputType::Manual, InputType::Solc]
    }
}

/// Terminal classification of a deployment attempt. Set at most once and
/// never cleared within a wizard session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The user declined the transaction in the signer. Not an error.
    Rejected,
    /// The backend failed; detail is shown inline and reported to the sink.
    Failed(String),
}

/// Why `advance` refused to move.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdvanceError {
    #[error("required fields for the {} step are not all valid", .0.title())]
    ValidationFailed(Step),
    #[error("a deployment is already in progress")]
    AlreadyDeploying,
    #[error("the wizard has already completed")]
    Finished,
}

/// Finalized parameter set handed to the deployment tracker.
#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub code: String,
    pub from: Address,
    pub abi: Abi,
    pub params: Vec<String>,
    pub name: String,
    pub description: String,
    pub source: String,
}

/// Externally supplied abi/code when re-entering from a prior screen.
#[derive(Debug, Clone, Default)]
pub struct Prefill {
    pub abi: Option<String>,
    pub code: Option<String>,
    pub source: String,
    pub read_only: bool,
}

/// All wizard session state. Mutated only through the field-update and
/// event-applier methods; discarded when the wizard closes.
#[derive(Debug)]
pub struct Wizard {
    step: Step,
    accounts: Vec<AccountInfo>,

    pub name: String,
    pub name_error: Option<String>,
    pub description: String,
    pub description_error: Option<String>,
    from_address: Option<Address>,
    pub from_address_error: Option<String>,
    pub input_type: InputType,
    pub abi: String,
    pub abi_error: Option<String>,
    parsed_abi: Option<Abi>,
    pub code: String,
    pub code_error: Option<String>,
    params: Vec<String>,
    pub read_only: bool,
    source: String,

    outcome: Option<Outcome>,
    deployed_address: Option<Address>,
    transaction_hash: Option<TxHash>,
    progress_message: String,
    deploy_started: bool,
}

impl Wizard {
    /// Open a wizard session over the given accounts, optionally pre-seeded
    /// with abi/code from a previous screen.
    ///
    /// The owner defaults to the first account. Prefill is applied only when
    /// both abi and code are present, and runs through the same validators
    /// as manual input.
    pub fn new(accounts: Vec<AccountInfo>, prefill: Prefill) -> Self {
        let from_address = accounts.first().map(|a| a.address.clone());
        let from_address_error = if from_address.is_some() {
            None
        } else {
            Some(validation::ERR_INVALID_OWNER.to_string())
        };

        let mut wizard = Self {
            step: Step::Details,
            accounts,
            name: String::new(),
            name_error: Some(validation::ERR_INVALID_NAME.to_string()),
            description: String::new(),
            description_error: None,
            from_address,
            from_address_error,
            input_type: InputType::Manual,
            abi: String::new(),
            abi_error: Some(validation::ERR_INVALID_ABI.to_string()),
            parsed_abi: None,
            code: String::new(),
            code_error: Some(validation::ERR_INVALID_CODE.to_string()),
            params: Vec::new(),
            read_only: prefill.read_only,
            source: prefill.source.clone(),
            outcome: None,
            deployed_address: None,
            transaction_hash: None,
            progress_message: String::new(),
            deploy_started: false,
        };

        if let (Some(abi), Some(code)) = (prefill.abi, prefill.code) {
            wizard.set_abi(&abi);
            wizard.set_code(&code);
        }
        wizard
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn accounts(&self) -> &[AccountInfo] {
        &self.accounts
    }

    pub fn from_address(&self) -> Option<&Address> {
        self.from_address.as_ref()
    }

    pub fn parsed_abi(&self) -> Option<&Abi> {
        self.parsed_abi.as_ref()
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    pub fn deployed_address(&self) -> Option<&Address> {
        self.deployed_address.as_ref()
    }

    pub fn transaction_hash(&self) -> Option<&TxHash> {
        self.transaction_hash.as_ref()
    }

    pub fn progress_message(&self) -> &str {
        &self.progress_message
    }

    // ── Field updates ────────────────────────────────────────────────────

    pub fn set_name(&mut self, value: &str) {
        let result = validate_name(value);
        self.name = result.name;
        self.name_error = result.error;
    }

    /// Description never blocks progression; its error slot is cleared
    /// unconditionally.
    pub fn set_description(&mut self, value: &str) {
        self.description = value.to_string();
        self.description_error = None;
    }

    pub fn set_from_address(&mut self, value: &str) {
        if is_address_valid(value) {
            self.from_address = Some(Address::new(value));
            self.from_address_error = None;
        } else {
            self.from_address = None;
            self.from_address_error = Some(validation::ERR_INVALID_OWNER.to_string());
        }
    }

    /// Pure selection; does not touch the abi/code fields.
    pub fn set_input_type(&mut self, value: InputType) {
        self.input_type = value;
    }

    pub fn set_abi(&mut self, value: &str) {
        let result = validate_abi(value);
        self.abi = result.abi;
        self.abi_error = result.error;
        self.parsed_abi = result.parsed;
        // Constructor arity may have changed; resize the value slots.
        let arity = self
            .parsed_abi
            .as_ref()
            .map_or(0, |abi| abi.constructor_params().len());
        self.params.resize(arity, String::new());
    }

    pub fn set_code(&mut self, value: &str) {
        let result = validate_code(value);
        self.code = result.code;
        self.code_error = result.error;
    }

    /// Constructor values are trusted from the parameter-entry form; arity
    /// is the caller's responsibility.
    pub fn set_params(&mut self, values: Vec<String>) {
        self.params = values;
    }

    pub fn set_param(&mut self, index: usize, value: String) {
        if let Some(slot) = self.params.get_mut(index) {
            *slot = value;
        }
    }

    // ── Gating ───────────────────────────────────────────────────────────

    /// The Details "Next" gate: name, description and owner all valid.
    pub fn details_valid(&self) -> bool {
        self.name_error.is_none()
            && self.description_error.is_none()
            && self.from_address_error.is_none()
    }

    /// The Parameters "Create" gate: abi and code both valid.
    pub fn parameters_valid(&self) -> bool {
        self.abi_error.is_none() && self.code_error.is_none()
    }

    /// Whether the current step's advancing control should be enabled.
    /// Recomputed from field errors on every call, never cached.
    pub fn can_advance(&self) -> bool {
        match self.step {
            Step::Details => self.details_valid(),
            Step::Parameters => self.parameters_valid(),
            Step::Deployment | Step::Completed => false,
        }
    }

    /// Move to the next step in the fixed order, if the current step's
    /// validity gate passes. Steps only ever move forward.
    pub fn advance(&mut self) -> Result<Step, AdvanceError> {
        match self.step {
            Step::Details if !self.details_valid() => {
                Err(AdvanceError::ValidationFailed(Step::Details))
            }
            Step::Parameters if !self.parameters_valid() => {
                Err(AdvanceError::ValidationFailed(Step::Parameters))
            }
            Step::Details | Step::Parameters => {
                self.step = self.step.next().expect("details/parameters have a next");
                Ok(self.step)
            }
            Step::Deployment => Err(AdvanceError::AlreadyDeploying),
            Step::Completed => Err(AdvanceError::Finished),
        }
    }

    /// Finalize the collected fields into a deployment request and enter the
    /// Deployment step. Callable at most once per session.
    pub fn begin_deployment(&mut self) -> Result<DeployRequest, AdvanceError> {
        if self.deploy_started {
            return Err(AdvanceError::AlreadyDeploying);
        }
        if self.step != Step::Parameters {
            return Err(AdvanceError::ValidationFailed(self.step));
        }
        self.advance()?;

        let abi = self
            .parsed_abi
            .clone()
            .expect("parameters gate guarantees a parsed abi");
        let from = self
            .from_address
            .clone()
            .expect("details gate guarantees an owner address");

        self.deploy_started = true;
        Ok(DeployRequest {
            code: self.code.clone(),
            from,
            abi,
            params: self.params.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            source: self.source.clone(),
        })
    }

    // ── Tracker event appliers ───────────────────────────────────────────

    /// Apply a progress phase. Ignored once a terminal outcome is set; the
    /// transaction hash is captured the first time one is reported and never
    /// reverts.
    pub fn apply_phase(&mut self, phase: DeployPhase, txhash: Option<TxHash>) {
        if self.outcome.is_some() {
            return;
        }
        self.progress_message = phase.message().to_string();
        if self.transaction_hash.is_none() {
            self.transaction_hash = txhash;
        }
    }

    /// The backend resolved with a deployed address: enter Completed.
    pub fn complete(&mut self, address: Address) {
        if self.outcome.is_some() || self.step != Step::Deployment {
            return;
        }
        self.deployed_address = Some(address);
        self.step = Step::Completed;
    }

    /// The user declined the transaction in the signer.
    pub fn reject(&mut self) {
        self.set_outcome(Outcome::Rejected);
    }

    /// The deployment failed for any non-rejection reason.
    pub fn fail(&mut self, detail: String) {
        self.set_outcome(Outcome::Failed(detail));
    }

    // Outcome is set at most once; later terminals are ignored.
    fn set_outcome(&mut self, outcome: Outcome) {
        if self.outcome.is_none() && self.step != Step::Completed {
            self.outcome = Some(outcome);
        }
    }
}
