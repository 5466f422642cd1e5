//! In-memory wallet holding one keyring per address.
//!
//! # Security
//! - Keyrings are never logged; only addresses and key counts are
//! - Signing picks the keys of the role the transaction requires

use alloy::primitives::Address;
use std::collections::HashMap;
use thiserror::Error;

use crate::account::{Keyring, Role};
use crate::transaction::{Transaction, TxError};

/// Wallet errors.
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("no keyring registered for {0}")]
    NotFound(Address),

    #[error("a keyring for {0} is already registered")]
    AlreadyExists(Address),

    #[error("transaction sender {from} does not match signing address {address}")]
    SenderMismatch { address: Address, from: Address },

    #[error("keyring for {address} has no key for the {role} role")]
    NoKeyForRole { address: Address, role: Role },

    #[error(transparent)]
    Transaction(#[from] TxError),
}

/// Result type for wallet operations.
pub type WalletResult<T> = Result<T, WalletError>;

/// Keyrings indexed by address.
#[derive(Debug, Default)]
pub struct KeyringContainer {
    keyrings: HashMap<Address, Keyring>,
}

impl KeyringContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a keyring for a new address.
    pub fn add(&mut self, keyring: Keyring) -> WalletResult<()> {
        let address = keyring.address();
        if self.keyrings.contains_key(&address) {
            return Err(WalletError::AlreadyExists(address));
        }
        tracing::info!(address = %address, key_counts = ?keyring.key_counts(), "Keyring added");
        self.keyrings.insert(address, keyring);
        Ok(())
    }

    /// Replace the keyring of an already registered address.
    ///
    /// Returns the superseded keyring.
    pub fn update(&mut self, keyring: Keyring) -> WalletResult<Keyring> {
        let address = keyring.address();
        let slot = self
            .keyrings
            .get_mut(&address)
            .ok_or(WalletError::NotFound(address))?;
        tracing::info!(address = %address, key_counts = ?keyring.key_counts(), "Keyring updated");
        Ok(std::mem::replace(slot, keyring))
    }

    pub fn remove(&mut self, address: &Address) -> WalletResult<Keyring> {
        self.keyrings
            .remove(address)
            .ok_or(WalletError::NotFound(*address))
    }

    pub fn get(&self, address: &Address) -> Option<&Keyring> {
        self.keyrings.get(address)
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.keyrings.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.keyrings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keyrings.is_empty()
    }

    /// Sign `tx` with every key `address` holds for the transaction's role.
    pub fn sign(&self, address: &Address, tx: &mut Transaction) -> WalletResult<()> {
        let keyring = self.get(address).ok_or(WalletError::NotFound(*address))?;
        if tx.from != *address {
            return Err(WalletError::SenderMismatch {
                address: *address,
                from: tx.from,
            });
        }

        let role = tx.required_role();
        let keys = keyring.signing_keys(role);
        if keys.is_empty() {
            return Err(WalletError::NoKeyForRole {
                address: *address,
                role,
            });
        }

        for key in keys {
            tx.sign_with(key)?;
        }

        tracing::debug!(
            address = %address,
            tx_type = tx.type_name(),
            role = %role,
            signatures = tx.signatures().len(),
            "Transaction signed"
        );
        Ok(())
    }
}
