//! Transaction building, signing, and confirmation monitoring.
//!
//! # Data Flow
//! ```text
//! TxBuilder (nonce + gas price from the chain, chain id from config)
//!     → Transaction (unsigned, empty signature list)
//!     → KeyringContainer::sign (one signature per key of the required role)
//!     → ChainRpc::send_raw_transaction (tx hash)
//!     → PollingReceiptProcessor (fixed interval, bounded attempts)
//! ```

pub mod builder;
pub mod receipt;
pub mod types;

pub use builder::TxBuilder;
pub use receipt::{PollingReceiptProcessor, ReceiptError};
pub use types::{Transaction, TxError, TxPayload, TxResult, TxSignature};
