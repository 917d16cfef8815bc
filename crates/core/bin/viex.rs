use std::{path::PathBuf, sync::Arc};

use alloy::{primitives::Address, signers::local::PrivateKeySigner};
use clap::{Args, Parser, Subcommand};
use eyre::{Result, WrapErr as _};
use serde_json::json;
use viex_core::{
    AccountRegistryClient, ClaimProver, Config, ContractLedger, Ledger as _, ProofVerifierClient,
    gate,
    primitives::{Claim, ProofCalldata, commit_account, commit_id},
    proof::{CircomBackend, CircuitArtifacts},
};

/// Client for the Viex account-binding protocol.
#[derive(Parser)]
#[command(name = "viex", version, about)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct ConnectionArgs {
    /// JSON configuration file. Flags and environment variables override its values.
    #[arg(long, env = "VIEX_CONFIG")]
    config: Option<PathBuf>,

    /// RPC endpoint of the chain the verifier is deployed on.
    #[arg(long, env = "RPC_URL")]
    rpc_url: Option<String>,

    /// Address of the `ViexProofVerifier` contract.
    #[arg(long, env = "VERIFIER_ADDRESS")]
    verifier_address: Option<Address>,

    /// Directory with the compiled circuit and the proving key.
    #[arg(long, env = "CIRCUIT_DIR")]
    circuit_dir: Option<PathBuf>,

    /// The signer wallet private key (hex) that will submit transactions (pays for gas)
    #[arg(long, env = "WALLET_PRIVATE_KEY", hide_env_values = true)]
    wallet_private_key: Option<String>,
}

#[derive(Args)]
struct ClaimArgs {
    /// Subject identifier issued by the identity provider.
    #[arg(long)]
    subject: String,

    /// Audience the claim was issued for.
    #[arg(long)]
    audience: String,
}

impl ClaimArgs {
    fn claim(&self) -> Claim {
        Claim::new(self.subject.as_str(), self.audience.as_str())
    }
}

#[derive(Subcommand)]
enum Command {
    /// Print `idHash` and, with an address, `accountHash` for a claim.
    Commit {
        #[command(flatten)]
        claim: ClaimArgs,
        #[arg(long)]
        address: Option<Address>,
    },
    /// Register a claim for an address (defaults to the signer).
    Register {
        #[command(flatten)]
        claim: ClaimArgs,
        #[arg(long)]
        address: Option<Address>,
        /// Only issue the bindings that are missing on-chain, retrying transient failures.
        #[arg(long)]
        resume: bool,
    },
    /// Show the registration state of a claim for an address.
    Status {
        #[command(flatten)]
        claim: ClaimArgs,
        #[arg(long)]
        address: Address,
    },
    /// Generate an account proof for a registered claim and print its calldata.
    Prove {
        #[command(flatten)]
        claim: ClaimArgs,
        /// Write the calldata JSON to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Verify proof calldata (as written by `prove`) on-chain.
    Verify {
        /// Path of the calldata JSON.
        #[arg(long)]
        proof: PathBuf,
    },
    /// Inspect or administer the whitelist.
    #[command(subcommand)]
    Whitelist(WhitelistCommand),
}

#[derive(Subcommand)]
enum WhitelistCommand {
    /// Check whether an address is whitelisted.
    Check {
        #[arg(long)]
        address: Address,
    },
    /// Whitelist an address. Only the contract owner can do this.
    Add {
        #[arg(long)]
        address: Address,
    },
}

impl ConnectionArgs {
    fn config(&self) -> Result<Config> {
        let config = match &self.config {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .wrap_err_with(|| format!("cannot read config {}", path.display()))?;
                let mut config = Config::from_json(&json)?;
                if let Some(rpc_url) = &self.rpc_url {
                    config = config.with_rpc_url(rpc_url.as_str());
                }
                if let Some(verifier_address) = self.verifier_address {
                    config = config.with_verifier_address(verifier_address);
                }
                config
            }
            None => {
                let rpc_url = self
                    .rpc_url
                    .clone()
                    .ok_or_else(|| eyre::eyre!("--rpc-url or RPC_URL is required"))?;
                let verifier_address = self
                    .verifier_address
                    .ok_or_else(|| eyre::eyre!("--verifier-address or VERIFIER_ADDRESS is required"))?;
                Config::new(rpc_url, verifier_address)
            }
        };
        Ok(match &self.circuit_dir {
            Some(dir) => config.with_circuit_dir(dir),
            None => config,
        })
    }

    /// The configured signer. Read-only commands fall back to a throwaway key.
    fn signer(&self, required: bool) -> Result<PrivateKeySigner> {
        match &self.wallet_private_key {
            Some(key) => key
                .parse::<PrivateKeySigner>()
                .wrap_err("invalid WALLET_PRIVATE_KEY"),
            None if required => Err(eyre::eyre!(
                "--wallet-private-key or WALLET_PRIVATE_KEY is required for this command"
            )),
            None => Ok(PrivateKeySigner::random()),
        }
    }

    fn ledger(&self, signer_required: bool) -> Result<Arc<ContractLedger>> {
        let config = self.config()?;
        let ledger = ContractLedger::connect(&config, self.signer(signer_required)?)?;
        Ok(Arc::new(ledger))
    }
}

fn install_tracing(json: bool) {
    use tracing_subscriber::{
        EnvFilter,
        fmt::{self},
        prelude::*,
    };

    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("viex=info"))
        .expect("default filter is valid");
    let registry = tracing_subscriber::registry().with(filter_layer);

    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_line_number(false))
            .init();
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    install_tracing(cli.json_logs);
    let connection = &cli.connection;

    match cli.command {
        Command::Commit { claim, address } => {
            let claim = claim.claim();
            let id_hash = commit_id(&claim)?;
            let account_hash = address
                .map(|address| commit_account(&claim, address))
                .transpose()?;
            print_json(&json!({ "idHash": id_hash, "accountHash": account_hash }))?;
        }
        Command::Register {
            claim,
            address,
            resume,
        } => {
            let ledger = connection.ledger(true)?;
            let address = address.unwrap_or_else(|| ledger.sender());
            let registry = AccountRegistryClient::new(Arc::clone(&ledger), ledger);
            let claim = claim.claim();

            let result = if resume {
                let id_hash = commit_id(&claim)?;
                let account_hash = commit_account(&claim, address)?;
                registry.resume(id_hash, address, account_hash).await?
            } else {
                registry.register_claim(&claim, address).await?
            };
            print_json(&result)?;
        }
        Command::Status { claim, address } => {
            let ledger = connection.ledger(false)?;
            let claim = claim.claim();
            let id_hash = commit_id(&claim)?;
            let account_hash = commit_account(&claim, address)?;
            let status = AccountRegistryClient::new(Arc::clone(&ledger), ledger)
                .status(id_hash, address, account_hash)
                .await?;
            print_json(&status)?;
        }
        Command::Prove { claim, output } => {
            let config = connection.config()?;
            let backend = CircomBackend::load(&CircuitArtifacts::from_config(&config))?;
            let ledger = connection.ledger(false)?;
            let prover = ClaimProver::new(ledger, Arc::new(backend));

            let proof = prover.prove(&claim.claim()).await?;
            let calldata = serde_json::to_string_pretty(&proof.calldata())?;
            match output {
                Some(path) => std::fs::write(&path, calldata)
                    .wrap_err_with(|| format!("cannot write {}", path.display()))?,
                None => println!("{calldata}"),
            }
        }
        Command::Verify { proof } => {
            let json = std::fs::read_to_string(&proof)
                .wrap_err_with(|| format!("cannot read {}", proof.display()))?;
            let calldata: ProofCalldata = serde_json::from_str(&json)?;
            let verifier = ProofVerifierClient::new(connection.ledger(false)?);
            let valid = verifier.verify_calldata(&calldata).await?;
            print_json(&json!({ "valid": valid }))?;
        }
        Command::Whitelist(WhitelistCommand::Check { address }) => {
            let ledger = connection.ledger(false)?;
            let whitelisted = gate::is_whitelisted(ledger.as_ref(), address).await?;
            print_json(&json!({ "address": address, "whitelisted": whitelisted }))?;
        }
        Command::Whitelist(WhitelistCommand::Add { address }) => {
            let ledger = connection.ledger(true)?;
            let confirmation = gate::add_whitelisted(ledger.as_ref(), address).await?;
            print_json(&json!({ "address": address, "confirmation": confirmation }))?;
        }
    }

    Ok(())
}
