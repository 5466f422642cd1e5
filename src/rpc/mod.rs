//! Chain access: the capability interface the workflow consumes and its implementations.
//!
//! # Data Flow
//! ```text
//! Rotation workflow
//!     → ChainRpc (narrow capability trait)
//!         → RpcClient   (JSON-RPC over HTTP, auth headers, timeouts)
//!         → MemoryChain (ledger in memory, same semantics, for tests and --simulate)
//! ```
//!
//! # Security Constraints
//! - Access-key secrets are never logged
//! - Every remote call has a timeout

pub mod client;
pub mod memory;
pub mod types;

use alloy::primitives::{Address, TxHash};
use std::future::Future;

use crate::account::AccountKey;
use crate::transaction::Transaction;

pub use client::RpcClient;
pub use memory::MemoryChain;
pub use types::{RpcError, RpcResult, TransactionReceipt};

/// What the workflow needs from a chain.
pub trait ChainRpc: Send + Sync {
    /// Chain id the node runs.
    fn chain_id(&self) -> impl Future<Output = RpcResult<u64>> + Send;

    /// Current gas price.
    fn gas_price(&self) -> impl Future<Output = RpcResult<u128>> + Send;

    /// Next nonce for `address`, counting pending transactions.
    fn get_transaction_count(&self, address: Address)
        -> impl Future<Output = RpcResult<u64>> + Send;

    /// Submit a signed transaction and return its hash.
    fn send_raw_transaction(&self, tx: &Transaction)
        -> impl Future<Output = RpcResult<TxHash>> + Send;

    /// Receipt of an included transaction, `None` while pending or unknown.
    fn get_transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> impl Future<Output = RpcResult<Option<TransactionReceipt>>> + Send;

    /// Current account key of `address`, `None` if the account does not exist.
    fn get_account_key(
        &self,
        address: Address,
    ) -> impl Future<Output = RpcResult<Option<AccountKey>>> + Send;
}
