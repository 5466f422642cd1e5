//! Role-based key rotation for Klaytn/Kaia accounts.
//!
//! Replaces an account's key with fresh per-role keys (transaction,
//! account update, fee payer), each under its own weighted threshold,
//! then proves the new keys work with a probe transfer.

pub mod account;
pub mod config;
pub mod observability;
pub mod rotation;
pub mod rpc;
pub mod transaction;
pub mod wallet;

mod encoding;

pub use account::{Account, AccountKey, Keyring, Role, RolePolicies, RolePolicy};
pub use config::RotateConfig;
pub use rotation::{KeyRotation, RotationError, RotationOptions, RotationResult};
pub use rpc::{ChainRpc, MemoryChain, RpcClient};
pub use wallet::KeyringContainer;
