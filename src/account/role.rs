//! Functional key roles.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of roles in a role-based account key.
pub const ROLE_COUNT: usize = 3;

/// The function a key set authorizes on a role-based account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Signs ordinary transactions.
    Transaction,
    /// Signs account-update transactions.
    AccountUpdate,
    /// Signs as fee payer for fee-delegated transactions.
    FeePayer,
}

impl Role {
    /// All roles in on-chain order.
    pub const ALL: [Role; ROLE_COUNT] = [Role::Transaction, Role::AccountUpdate, Role::FeePayer];

    /// Position of the role inside a role-based key.
    pub fn index(self) -> usize {
        match self {
            Role::Transaction => 0,
            Role::AccountUpdate => 1,
            Role::FeePayer => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Transaction => "transaction",
            Role::AccountUpdate => "account_update",
            Role::FeePayer => "fee_payer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
