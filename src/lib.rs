//! Deployer - terminal wizard for deploying contracts to an
//! Ethereum-compatible node with a Parity-style signer.
//!
//! The wizard state machine (`wizard`) and the deployment tracker
//! (`deploy`) are plain library code; `ui` wraps them in a ratatui
//! front end and `chain::rpc` talks to the node.

pub mod abi;
pub mod chain;
pub mod config;
pub mod deploy;
pub mod logging;
pub mod types;
pub mod ui;
pub mod validation;
pub mod wizard;
