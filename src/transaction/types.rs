//! Typed transactions, their signature hash and raw encoding.

use alloy::primitives::{keccak256, Address, Bytes, TxHash, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::{Signature, SignerSync};
use serde::Serialize;
use thiserror::Error;

use crate::account::{Account, AccountKey, PublicKey, Role};
use crate::encoding::{encode_item, encode_list, list_of_encoded};
use crate::rpc::RpcError;

pub const TX_TYPE_VALUE_TRANSFER: u8 = 0x08;
pub const TX_TYPE_ACCOUNT_UPDATE: u8 = 0x20;

/// Base gas charged for every transaction.
pub const TX_GAS_BASE: u64 = 21_000;
/// Extra gas per public key validated by an account update.
pub const TX_GAS_PER_ACCOUNT_KEY: u64 = 15_000;

/// Errors building or signing transactions.
#[derive(Debug, Error)]
pub enum TxError {
    #[error("gas limit must be greater than zero")]
    ZeroGas,

    #[error("sender {from} does not own account {account}")]
    AccountMismatch { from: Address, account: Address },

    #[error("transaction is missing nonce, gas price or chain id")]
    NotFilled,

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error(transparent)]
    Rpc(#[from] RpcError),
}

/// Result type for transaction operations.
pub type TxResult<T> = Result<T, TxError>;

/// Type-specific fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxPayload {
    ValueTransfer { to: Address, value: U256 },
    AccountUpdate { account_key: AccountKey },
}

/// One `[v, r, s]` entry of a transaction's signature list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TxSignature {
    pub v: u64,
    pub r: U256,
    pub s: U256,
}

/// `chain_id * 2 + 35`, the `v` of a signature with recovery id 0.
fn v_base(chain_id: u64) -> TxResult<u64> {
    chain_id
        .checked_mul(2)
        .and_then(|v| v.checked_add(35))
        .ok_or_else(|| TxError::InvalidSignature(format!("chain id {} is too large", chain_id)))
}

impl TxSignature {
    fn from_signature(signature: &Signature, chain_id: u64) -> TxResult<Self> {
        let v = v_base(chain_id)?
            .checked_add(u64::from(signature.v()))
            .ok_or_else(|| TxError::InvalidSignature(format!("chain id {} is too large", chain_id)))?;
        Ok(Self {
            v,
            r: signature.r(),
            s: signature.s(),
        })
    }

    /// Recover the public key that produced this signature over `hash`.
    pub fn recover(&self, hash: &B256, chain_id: u64) -> TxResult<PublicKey> {
        let parity = match self.v.checked_sub(v_base(chain_id)?) {
            Some(0) => false,
            Some(1) => true,
            _ => {
                return Err(TxError::InvalidSignature(format!(
                    "v {} does not match chain id {}",
                    self.v, chain_id
                )))
            }
        };
        Signature::new(self.r, self.s, parity)
            .recover_from_prehash(hash)
            .map(PublicKey::from)
            .map_err(|e| TxError::InvalidSignature(e.to_string()))
    }

    fn encoded(&self) -> Vec<u8> {
        encode_list(&[&self.v, &self.r, &self.s])
    }
}

/// A typed transaction. Unsigned until [`Transaction::sign_with`] is called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub from: Address,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas: u64,
    pub chain_id: u64,
    pub payload: TxPayload,
    signatures: Vec<TxSignature>,
}

impl Transaction {
    fn unfilled(from: Address, gas: u64, payload: TxPayload) -> Self {
        Self {
            from,
            nonce: 0,
            gas_price: 0,
            gas,
            chain_id: 0,
            payload,
            signatures: Vec::new(),
        }
    }

    /// Unfilled value transfer; nonce, gas price and chain id are set by the builder.
    pub fn value_transfer(from: Address, to: Address, value: U256, gas: u64) -> Self {
        Self::unfilled(from, gas, TxPayload::ValueTransfer { to, value })
    }

    /// Unfilled account update installing `account`'s key.
    pub fn account_update(account: &Account, gas: u64) -> Self {
        Self::unfilled(
            account.address(),
            gas,
            TxPayload::AccountUpdate {
                account_key: account.account_key().clone(),
            },
        )
    }

    pub fn tx_type(&self) -> u8 {
        match self.payload {
            TxPayload::ValueTransfer { .. } => TX_TYPE_VALUE_TRANSFER,
            TxPayload::AccountUpdate { .. } => TX_TYPE_ACCOUNT_UPDATE,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self.payload {
            TxPayload::ValueTransfer { .. } => "TxTypeValueTransfer",
            TxPayload::AccountUpdate { .. } => "TxTypeAccountUpdate",
        }
    }

    /// Role whose keys must sign this transaction.
    pub fn required_role(&self) -> Role {
        match self.payload {
            TxPayload::AccountUpdate { .. } => Role::AccountUpdate,
            TxPayload::ValueTransfer { .. } => Role::Transaction,
        }
    }

    /// Value moved by the transaction.
    pub fn value(&self) -> U256 {
        match self.payload {
            TxPayload::ValueTransfer { value, .. } => value,
            TxPayload::AccountUpdate { .. } => U256::ZERO,
        }
    }

    /// Gas consumed before any execution.
    pub fn intrinsic_gas(&self) -> u64 {
        match &self.payload {
            TxPayload::ValueTransfer { .. } => TX_GAS_BASE,
            TxPayload::AccountUpdate { account_key } => {
                TX_GAS_BASE + TX_GAS_PER_ACCOUNT_KEY * account_key.public_key_count() as u64
            }
        }
    }

    pub fn is_filled(&self) -> bool {
        self.chain_id != 0 && self.gas_price != 0
    }

    pub fn signatures(&self) -> &[TxSignature] {
        &self.signatures
    }

    fn payload_fields(&self) -> Vec<Vec<u8>> {
        match &self.payload {
            TxPayload::ValueTransfer { to, value } => vec![
                encode_item(to),
                encode_item(value),
                encode_item(&self.from),
            ],
            TxPayload::AccountUpdate { account_key } => vec![
                encode_item(&self.from),
                encode_item(&account_key.rlp_encoded()),
            ],
        }
    }

    /// Hash every signer signs: `keccak(rlp([rlp([type, nonce, gasPrice, gas, ...]), chainId, 0, 0]))`.
    pub fn sig_hash(&self) -> B256 {
        let mut fields = vec![
            encode_item(&self.tx_type()),
            encode_item(&self.nonce),
            encode_item(&self.gas_price),
            encode_item(&self.gas),
        ];
        fields.extend(self.payload_fields());
        let inner = Bytes::from(list_of_encoded(&fields));
        keccak256(encode_list(&[&inner, &self.chain_id, &0u64, &0u64]))
    }

    /// Network encoding: `type || rlp([nonce, gasPrice, gas, ..., signatures])`.
    pub fn raw(&self) -> Bytes {
        let mut fields = vec![
            encode_item(&self.nonce),
            encode_item(&self.gas_price),
            encode_item(&self.gas),
        ];
        fields.extend(self.payload_fields());
        let signatures: Vec<Vec<u8>> = self.signatures.iter().map(TxSignature::encoded).collect();
        fields.push(list_of_encoded(&signatures));

        let mut out = vec![self.tx_type()];
        out.extend(list_of_encoded(&fields));
        out.into()
    }

    /// Transaction hash, `keccak(raw)`.
    pub fn hash(&self) -> TxHash {
        keccak256(self.raw())
    }

    /// Append a signature from `signer`. Signing twice with one key is a no-op.
    pub fn sign_with(&mut self, signer: &PrivateKeySigner) -> TxResult<TxSignature> {
        if !self.is_filled() {
            return Err(TxError::NotFilled);
        }
        let signature = signer
            .sign_hash_sync(&self.sig_hash())
            .map_err(|e| TxError::Signing(e.to_string()))?;
        let entry = TxSignature::from_signature(&signature, self.chain_id)?;
        if !self.signatures.contains(&entry) {
            self.signatures.push(entry);
        }
        Ok(entry)
    }

    /// Public keys behind every signature.
    pub fn recover_signers(&self) -> TxResult<Vec<PublicKey>> {
        let hash = self.sig_hash();
        self.signatures
            .iter()
            .map(|signature| signature.recover(&hash, self.chain_id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_transfer() -> Transaction {
        let mut tx = Transaction::value_transfer(
            Address::repeat_byte(1),
            Address::repeat_byte(2),
            U256::from(1),
            150_000,
        );
        tx.nonce = 3;
        tx.gas_price = 25_000_000_000;
        tx.chain_id = 1001;
        tx
    }

    #[test]
    fn test_unfilled_transaction_cannot_sign() {
        let mut tx = Transaction::value_transfer(
            Address::ZERO,
            Address::ZERO,
            U256::ZERO,
            21_000,
        );
        let err = tx.sign_with(&PrivateKeySigner::random()).unwrap_err();
        assert!(matches!(err, TxError::NotFilled));
    }

    #[test]
    fn test_sign_and_recover() {
        let mut tx = filled_transfer();
        let signer = PrivateKeySigner::random();
        let entry = tx.sign_with(&signer).unwrap();

        assert!(entry.v == 1001 * 2 + 35 || entry.v == 1001 * 2 + 36);
        assert_eq!(tx.recover_signers().unwrap(), vec![PublicKey::from_signer(&signer)]);
    }

    #[test]
    fn test_signing_twice_is_idempotent() {
        let mut tx = filled_transfer();
        let signer = PrivateKeySigner::random();
        tx.sign_with(&signer).unwrap();
        tx.sign_with(&signer).unwrap();
        assert_eq!(tx.signatures().len(), 1);
    }

    #[test]
    fn test_signatures_do_not_change_sig_hash() {
        let mut tx = filled_transfer();
        let before = tx.sig_hash();
        let raw_before = tx.raw();
        tx.sign_with(&PrivateKeySigner::random()).unwrap();
        assert_eq!(tx.sig_hash(), before);
        assert_ne!(tx.raw(), raw_before);
    }

    #[test]
    fn test_raw_encoding_prefix() {
        let tx = filled_transfer();
        assert_eq!(tx.raw()[0], TX_TYPE_VALUE_TRANSFER);
        // unsigned: signature list is the empty list at the very end
        assert_eq!(*tx.raw().last().unwrap(), 0xc0);
    }

    #[test]
    fn test_oversized_chain_id_is_rejected() {
        let mut tx = filled_transfer();
        tx.chain_id = u64::MAX / 2 + 1;
        let err = tx.sign_with(&PrivateKeySigner::random()).unwrap_err();
        assert!(matches!(err, TxError::InvalidSignature(_)));
        assert!(tx.signatures().is_empty());

        let entry = TxSignature { v: 37, r: U256::from(1), s: U256::from(1) };
        assert!(matches!(
            entry.recover(&B256::ZERO, u64::MAX),
            Err(TxError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_wrong_chain_id_fails_recovery() {
        let mut tx = filled_transfer();
        tx.sign_with(&PrivateKeySigner::random()).unwrap();
        let hash = tx.sig_hash();
        assert!(tx.signatures()[0].recover(&hash, 8217).is_err());
    }

    #[test]
    fn test_account_update_gas_and_role() {
        let key = AccountKey::RoleBased(vec![
            AccountKey::Public(PublicKey::from_signer(&PrivateKeySigner::random())),
            AccountKey::Nil,
            AccountKey::Nil,
        ]);
        let tx = Transaction::account_update(&Account::new(Address::ZERO, key), 150_000);
        assert_eq!(tx.tx_type(), TX_TYPE_ACCOUNT_UPDATE);
        assert_eq!(tx.required_role(), Role::AccountUpdate);
        assert_eq!(tx.intrinsic_gas(), TX_GAS_BASE + TX_GAS_PER_ACCOUNT_KEY);
        assert_eq!(tx.value(), U256::ZERO);
    }
}
