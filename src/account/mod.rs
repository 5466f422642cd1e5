//! Account model: roles, keys, policies and keyrings.
//!
//! # Data Flow
//! ```text
//! generate_role_based_keys (fresh random keys per role)
//!     → Keyring::role_based (same address, new keys)
//!     → Keyring::to_account + RolePolicies (weighted thresholds per role)
//!     → Account (address + AccountKey::RoleBased)
//!     → carried by an account-update transaction
//! ```

pub mod key;
pub mod keyring;
pub mod policy;
pub mod role;

use alloy::primitives::Address;
use serde::Serialize;
use thiserror::Error;

pub use key::{AccountKey, AuthorizationError, PublicKey, WeightedPublicKey};
pub use keyring::{generate_role_based_keys, Keyring, KeyringFile};
pub use policy::{RolePolicies, RolePolicy, MAX_WEIGHTED_KEYS};
pub use role::{Role, ROLE_COUNT};

/// Errors building keyrings and account descriptors.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("{0}")]
    InvalidPrivateKey(String),

    #[error("keyring for {0} holds no keys")]
    EmptyKeyring(Address),

    #[error("{role} role has {keys} keys but a single-signer policy allows at most one")]
    SingleSignerKeyCount { role: Role, keys: usize },

    #[error("{role} role has {keys} keys but its policy lists {weights} weights")]
    WeightCountMismatch { role: Role, keys: usize, weights: usize },

    #[error("{role} role has {keys} keys, more than the maximum of {max}")]
    TooManyKeys { role: Role, keys: usize, max: usize },

    #[error("{role} role threshold must be greater than zero")]
    ZeroThreshold { role: Role },

    #[error("{role} role has a zero weight")]
    ZeroWeight { role: Role },

    #[error("{role} role weights sum to {sum}, below threshold {threshold}")]
    ThresholdNotMet { role: Role, sum: u64, threshold: u64 },

    #[error("keyring file error: {0}")]
    KeyringFile(String),
}

impl AccountError {
    /// True when a policy can never be satisfied, as opposed to a key/policy shape problem.
    pub fn is_policy_violation(&self) -> bool {
        matches!(
            self,
            AccountError::ZeroThreshold { .. }
                | AccountError::ZeroWeight { .. }
                | AccountError::ThresholdNotMet { .. }
        )
    }
}

/// An address bound to the key structure that should authorize it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    address: Address,
    account_key: AccountKey,
}

impl Account {
    pub fn new(address: Address, account_key: AccountKey) -> Self {
        Self {
            address,
            account_key,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn account_key(&self) -> &AccountKey {
        &self.account_key
    }
}
