//! rotate-keys
//!
//! Rotates one account to role-based keys and proves the new keys work.
//!
//! # Architecture Overview
//!
//! ```text
//!   config file + env ──▶ RotateConfig ──▶ KeyringContainer (current keyring)
//!                                                │
//!                                                ▼
//!                      ┌──────────────── KeyRotation ────────────────┐
//!                      │ prepare: keys → keyring → account            │
//!                      │ (new keys written to --keys-out)             │
//!                      │ execute: update → sign(old) → submit → poll  │
//!                      │          → verify → install → probe          │
//!                      └───────────────────┬─────────────────────────┘
//!                                          │ ChainRpc
//!                           ┌──────────────┴──────────────┐
//!                           ▼                             ▼
//!                   RpcClient (remote node)      MemoryChain (--simulate)
//! ```
//!
//! The run result is printed as JSON on stdout; logs go to stderr.

use alloy::primitives::{Address, U256};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use role_key_rotation::account::{
    AccountKey, Keyring, KeyringFile, PublicKey, Role, WeightedPublicKey,
};
use role_key_rotation::config::{load_config, RotateConfig};
use role_key_rotation::observability::logging::init_logging;
use role_key_rotation::rotation::{KeyRotation, ProbeOptions, RotationError, RotationOptions};
use role_key_rotation::rpc::{ChainRpc, MemoryChain, RpcClient};
use role_key_rotation::transaction::PollingReceiptProcessor;
use role_key_rotation::wallet::KeyringContainer;

/// Chain id used by `--simulate` when none is configured (Kairos testnet).
const SIMULATED_CHAIN_ID: u64 = 1001;

#[derive(Parser)]
#[command(name = "rotate-keys")]
#[command(about = "Rotate an account to role-based keys and prove the new keys work", long_about = None)]
struct Cli {
    /// TOML configuration file. Blank fields fall back to the environment.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run against an in-memory ledger instead of a node.
    #[arg(long)]
    simulate: bool,

    /// Write the new private keys here before the update is sent. The file
    /// must not exist yet.
    #[arg(long)]
    keys_out: Option<PathBuf>,
}

#[derive(Debug)]
enum RunError {
    Setup(String),
    Rotation(RotationError),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref(), !cli.simulate) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };

    init_logging(&config.observability);
    tracing::info!(simulate = cli.simulate, "rotate-keys v0.1.0 starting");

    let result = if cli.simulate {
        simulate(&cli, &config).await
    } else {
        remote(&cli, &config).await
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(RunError::Setup(message)) => {
            eprintln!("Error: {}", message);
            ExitCode::from(2)
        }
        Err(RunError::Rotation(e)) => {
            eprintln!("Error: {}", e);
            if e.needs_manual_intervention() {
                tracing::error!(
                    step = %e.step,
                    "The account is rotated on-chain but the new keys failed; the old keys are revoked. Manual intervention required"
                );
            } else if e.is_irreversible() {
                tracing::error!(
                    step = %e.step,
                    "The account update may be on-chain. Check the account key before running again"
                );
            }
            ExitCode::FAILURE
        }
    }
}

async fn remote(cli: &Cli, config: &RotateConfig) -> Result<(), RunError> {
    // Without a copy of the new keys a successful rotation locks the account.
    if cli.keys_out.is_none() {
        return Err(RunError::Setup(
            "--keys-out is required when rotating on a remote node".to_string(),
        ));
    }
    let chain_id = config
        .node
        .chain_id
        .ok_or_else(|| RunError::Setup("node.chain_id must be set".to_string()))?;
    let client = RpcClient::new(&config.node, chain_id)
        .await
        .map_err(|e| RunError::Setup(e.to_string()))?;
    let keyring = sender_keyring(config)?;
    run(&client, chain_id, config, keyring, cli.keys_out.as_ref()).await
}

async fn simulate(cli: &Cli, config: &RotateConfig) -> Result<(), RunError> {
    let chain_id = config.node.chain_id.unwrap_or(SIMULATED_CHAIN_ID);
    let chain = MemoryChain::new(chain_id);
    let keyring = sender_keyring(config)?;

    // 100 KAIA
    chain.fund(keyring.address(), U256::from(10).pow(U256::from(20)));
    if let Some(key) = simulated_account_key(&keyring) {
        chain.set_account_key(keyring.address(), key);
    }
    tracing::info!(address = %keyring.address(), chain_id, "Simulated account funded");

    run(&chain, chain_id, config, keyring, cli.keys_out.as_ref()).await
}

/// Key the simulated ledger must hold for `keyring` to be able to sign.
///
/// A key whose own address is the account needs none (legacy); otherwise
/// every key of a role is required.
fn simulated_account_key(keyring: &Keyring) -> Option<AccountKey> {
    let role_key = |role: Role| {
        let keys: Vec<PublicKey> = keyring
            .role_keys(role)
            .iter()
            .map(PublicKey::from_signer)
            .collect();
        match keys.len() {
            0 => AccountKey::Nil,
            1 => AccountKey::Public(keys[0]),
            n => AccountKey::WeightedMultiSig {
                threshold: n as u64,
                keys: keys
                    .into_iter()
                    .map(|key| WeightedPublicKey { weight: 1, key })
                    .collect(),
            },
        }
    };

    let roles: Vec<AccountKey> = Role::ALL.into_iter().map(role_key).collect();
    if roles.iter().all(|key| *key == roles[0]) {
        match &roles[0] {
            AccountKey::Public(key) if key.to_address() == keyring.address() => None,
            key => Some(key.clone()),
        }
    } else {
        Some(AccountKey::RoleBased(roles))
    }
}

fn sender_keyring(config: &RotateConfig) -> Result<Keyring, RunError> {
    let sender = &config.sender;
    if let Some(path) = &sender.keyring_file {
        return KeyringFile::load(Path::new(path))
            .and_then(KeyringFile::into_keyring)
            .map_err(|e| RunError::Setup(e.to_string()));
    }
    let address: Address = sender
        .address
        .trim()
        .parse()
        .map_err(|e| RunError::Setup(format!("sender.address: {}", e)))?;
    Keyring::single(address, &sender.private_key).map_err(|e| RunError::Setup(e.to_string()))
}

async fn run<R: ChainRpc>(
    rpc: &R,
    chain_id: u64,
    config: &RotateConfig,
    keyring: Keyring,
    keys_out: Option<&PathBuf>,
) -> Result<(), RunError> {
    let address = keyring.address();
    let recipient: Address = config
        .sender
        .recipient_address
        .trim()
        .parse()
        .map_err(|e| RunError::Setup(format!("sender.recipient_address: {}", e)))?;

    let mut wallet = KeyringContainer::new();
    wallet
        .add(keyring)
        .map_err(|e| RunError::Setup(e.to_string()))?;

    let receipts = PollingReceiptProcessor::new(
        std::time::Duration::from_millis(config.polling.interval_ms),
        config.polling.max_attempts,
    );
    let options = RotationOptions {
        update_gas: config.rotation.gas,
        probe: ProbeOptions {
            recipient,
            value: U256::from(config.probe.value),
            gas: config.probe.gas,
        },
    };
    let policies = config.rotation.role_policies();

    let mut rotation = KeyRotation::new(rpc, &mut wallet, chain_id, receipts);
    let prepared = rotation
        .prepare(address, config.rotation.role_key_counts, &policies)
        .map_err(RunError::Rotation)?;

    if let Some(path) = keys_out {
        KeyringFile::from(prepared.keyring())
            .save(path)
            .map_err(|e| RunError::Setup(e.to_string()))?;
        tracing::info!(path = %path.display(), "New keys written");
    } else {
        tracing::warn!("No --keys-out given; the new private keys are only held in memory");
    }

    let result = rotation
        .execute(prepared, &options)
        .await
        .map_err(RunError::Rotation)?;

    let json = serde_json::to_string_pretty(&result)
        .map_err(|e| RunError::Setup(e.to_string()))?;
    println!("{}", json);
    Ok(())
}
