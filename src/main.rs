use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use deployer::chain::rpc::RpcClient;
use deployer::chain::{ChainBackend, LogErrorSink};
use deployer::config::Config;
use deployer::deploy::{self, DeployPhase, DeployUpdate};
use deployer::logging;
use deployer::ui::{terminal_guard, App};
use deployer::wizard::{Prefill, Wizard};

#[derive(Parser)]
#[command(name = "deployer")]
#[command(about = "Contract deployment wizard for gbqr.us")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Pre-fill the wizard with this abi json file (TUI mode)
    #[arg(long)]
    abi: Option<PathBuf>,

    /// Pre-fill the wizard with this compiled bytecode file (TUI mode)
    #[arg(long)]
    code: Option<PathBuf>,

    /// Lock the pre-filled abi and bytecode against editing
    #[arg(long)]
    read_only: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the accounts available as contract owners
    Accounts,

    /// Write the effective configuration to .deployer/config.toml
    Init,

    /// Deploy a contract without the interactive wizard
    Deploy {
        /// Contract name to record against the deployed address
        #[arg(short, long)]
        name: String,

        /// Path to the abi json file
        #[arg(long)]
        abi: PathBuf,

        /// Path to the compiled bytecode file
        #[arg(long)]
        code: PathBuf,

        /// Owner account address (default: the node's first account)
        #[arg(short, long)]
        from: Option<String>,

        /// Constructor argument, repeatable, in declaration order
        #[arg(short, long = "param")]
        params: Vec<String>,

        /// Contract description to record in the metadata
        #[arg(long)]
        description: Option<String>,

        /// Source label to record in the metadata
        #[arg(long)]
        source: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first (needed for logging setup)
    let config = Config::load(cli.config.as_deref())?;

    // TUI mode = no subcommand
    let is_tui_mode = cli.command.is_none();
    let logging_handle = logging::init_logging(&config, is_tui_mode, cli.debug)?;

    match cli.command {
        Some(Commands::Accounts) => {
            cmd_accounts(&config).await?;
        }
        Some(Commands::Init) => {
            cmd_init(&config)?;
        }
        Some(Commands::Deploy {
            name,
            abi,
            code,
            from,
            params,
            description,
            source,
        }) => {
            cmd_deploy(&config, name, abi, code, from, params, description, source).await?;
        }
        None => {
            let prefill = load_prefill(&cli)?;
            run_tui(config, prefill, logging_handle.log_file_path).await?;
        }
    }

    Ok(())
}

/// Read the optional --abi/--code files into a wizard prefill.
fn load_prefill(cli: &Cli) -> Result<Prefill> {
    let abi = cli
        .abi
        .as_ref()
        .map(|path| {
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read abi file {}", path.display()))
        })
        .transpose()?;
    let code = cli
        .code
        .as_ref()
        .map(|path| {
            std::fs::read_to_string(path)
                .map(|text| text.trim().to_string())
                .with_context(|| format!("Failed to read bytecode file {}", path.display()))
        })
        .transpose()?;
    let source = cli
        .abi
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_default();

    Ok(Prefill {
        abi,
        code,
        source,
        read_only: cli.read_only,
    })
}

async fn run_tui(config: Config, prefill: Prefill, log_file_path: Option<PathBuf>) -> Result<()> {
    terminal_guard::install_panic_hook();

    let mut app = App::new(config, prefill).await?;
    let result = app.run().await;

    // Print log file path on exit if logs were written
    if let Some(log_path) = log_file_path {
        if log_path.exists() {
            if let Ok(metadata) = log_path.metadata() {
                if metadata.len() > 0 {
                    eprintln!("Session log: {}", log_path.display());
                }
            }
        }
    }

    result
}

/// Materialize the effective config so it can be edited in place.
fn cmd_init(config: &Config) -> Result<()> {
    let path = Config::project_config_path();
    if path.exists() {
        println!("Config already exists at {}", path.display());
        return Ok(());
    }

    config.save()?;
    println!("Wrote {}", path.display());
    Ok(())
}

async fn cmd_accounts(config: &Config) -> Result<()> {
    let backend = RpcClient::new(&config.node.url, config.node.request_timeout())?;
    let accounts = backend.accounts().await?;

    if accounts.is_empty() {
        println!("No accounts available on {}", config.node.url);
        return Ok(());
    }

    println!("Accounts on {} ({})", config.node.url, accounts.len());
    println!("{}", "─".repeat(60));
    for account in &accounts {
        match &account.name {
            Some(name) => println!("{}  {}", account.address, name),
            None => println!("{}", account.address),
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn cmd_deploy(
    config: &Config,
    name: String,
    abi_path: PathBuf,
    code_path: PathBuf,
    from: Option<String>,
    params: Vec<String>,
    description: Option<String>,
    source: Option<String>,
) -> Result<()> {
    let abi_text = std::fs::read_to_string(&abi_path)
        .with_context(|| format!("Failed to read abi file {}", abi_path.display()))?;
    let code_text = std::fs::read_to_string(&code_path)
        .with_context(|| format!("Failed to read bytecode file {}", code_path.display()))?;

    let backend = Arc::new(RpcClient::new(
        &config.node.url,
        config.node.request_timeout(),
    )?);
    let accounts = backend.accounts().await?;

    // The same state machine the TUI walks, driven straight through.
    let mut wizard = Wizard::new(
        accounts,
        Prefill {
            source: source.unwrap_or_default(),
            ..Prefill::default()
        },
    );
    wizard.set_name(&name);
    if let Some(description) = description {
        wizard.set_description(&description);
    }
    if let Some(from) = from {
        wizard.set_from_address(&from);
    }
    wizard.set_abi(&abi_text);
    wizard.set_code(code_text.trim());
    wizard.set_params(params);

    if let Some(ref err) = wizard.name_error {
        bail!("invalid --name: {err}");
    }
    if let Some(ref err) = wizard.from_address_error {
        bail!("invalid --from: {err}");
    }
    if let Some(ref err) = wizard.abi_error {
        bail!("invalid abi file: {err}");
    }
    if let Some(ref err) = wizard.code_error {
        bail!("invalid bytecode file: {err}");
    }
    let arity = wizard
        .parsed_abi()
        .map_or(0, |abi| abi.constructor_params().len());
    if wizard.params().len() != arity {
        bail!(
            "constructor takes {} argument(s), {} given",
            arity,
            wizard.params().len()
        );
    }

    wizard.advance()?;
    let request = wizard.begin_deployment()?;
    let mut updates = deploy::spawn(backend, LogErrorSink, request);

    let mut last_phase: Option<DeployPhase> = None;
    while let Some(update) = updates.recv().await {
        match update {
            DeployUpdate::Phase { phase, txhash } => {
                if last_phase != Some(phase) {
                    eprintln!("{}", phase.message());
                    last_phase = Some(phase);
                }
                if let Some(txhash) = txhash {
                    eprintln!("Transaction: {txhash}");
                }
            }
            DeployUpdate::Completed { address } => {
                println!("{address}");
                return Ok(());
            }
            DeployUpdate::Rejected => {
                eprintln!("The deployment request has been rejected in the signer.");
                eprintln!("The contract deployment will not occur.");
                return Ok(());
            }
            DeployUpdate::Failed { detail } => {
                bail!("deployment failed: {detail}");
            }
        }
    }

    bail!("the deployment ended without reporting an outcome")
}
