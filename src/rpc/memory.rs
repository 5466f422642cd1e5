//! A ledger that runs in memory and implements [`ChainRpc`].
//!
//! It validates transactions the way a node does (chain id, nonce, funds,
//! signatures against the sender's current account key) and applies value
//! transfers and account updates. Receipts can be delayed or withheld to
//! exercise receipt polling.

use alloy::primitives::{Address, TxHash, U256, U64};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::account::AccountKey;
use crate::rpc::types::{RpcError, RpcResult, TransactionReceipt};
use crate::rpc::ChainRpc;
use crate::transaction::{Transaction, TxPayload};

/// Default gas price, 25 ston.
pub const DEFAULT_UNIT_PRICE: u128 = 25_000_000_000;

/// Error code used for rejected transactions.
const TX_REJECTED: i64 = -32000;

/// Failure code recorded in receipts of transactions that ran out of gas.
const TX_ERROR_OUT_OF_GAS: &str = "0x66";

#[derive(Debug, Clone)]
struct LedgerAccount {
    balance: U256,
    nonce: u64,
    key: AccountKey,
}

impl Default for LedgerAccount {
    fn default() -> Self {
        Self {
            balance: U256::ZERO,
            nonce: 0,
            key: AccountKey::Legacy,
        }
    }
}

#[derive(Debug)]
struct StoredReceipt {
    receipt: TransactionReceipt,
    hidden_polls: u32,
}

#[derive(Debug, Default)]
struct LedgerState {
    accounts: HashMap<Address, LedgerAccount>,
    receipts: HashMap<TxHash, StoredReceipt>,
    block_number: u64,
    receipt_delay: u32,
    withhold_receipts: bool,
}

/// In-memory ledger.
#[derive(Debug)]
pub struct MemoryChain {
    chain_id: u64,
    unit_price: u128,
    state: Mutex<LedgerState>,
}

fn rejected(message: impl Into<String>) -> RpcError {
    RpcError::Node {
        code: TX_REJECTED,
        message: message.into(),
    }
}

impl MemoryChain {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            unit_price: DEFAULT_UNIT_PRICE,
            state: Mutex::new(LedgerState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn unit_price(&self) -> u128 {
        self.unit_price
    }

    /// Credit `amount` to `address`, creating a legacy account if needed.
    pub fn fund(&self, address: Address, amount: U256) {
        let mut state = self.state();
        let account = state.accounts.entry(address).or_default();
        account.balance = account.balance.saturating_add(amount);
    }

    /// Hide each new receipt for `polls` receipt queries.
    pub fn set_receipt_delay(&self, polls: u32) {
        self.state().receipt_delay = polls;
    }

    /// Never report receipts, as if transactions stayed pending forever.
    pub fn withhold_receipts(&self, withhold: bool) {
        self.state().withhold_receipts = withhold;
    }

    /// Overwrite an account's key directly, bypassing transactions.
    pub fn set_account_key(&self, address: Address, key: AccountKey) {
        self.state().accounts.entry(address).or_default().key = key;
    }

    pub fn balance(&self, address: &Address) -> U256 {
        self.state()
            .accounts
            .get(address)
            .map(|a| a.balance)
            .unwrap_or_default()
    }

    pub fn nonce(&self, address: &Address) -> u64 {
        self.state().accounts.get(address).map(|a| a.nonce).unwrap_or(0)
    }

    pub fn account_key(&self, address: &Address) -> Option<AccountKey> {
        self.state().accounts.get(address).map(|a| a.key.clone())
    }

    pub fn block_number(&self) -> u64 {
        self.state().block_number
    }

    fn submit(&self, tx: &Transaction) -> RpcResult<TxHash> {
        if tx.chain_id != self.chain_id {
            return Err(rejected(format!(
                "invalid chain id {} (expected {})",
                tx.chain_id, self.chain_id
            )));
        }
        if tx.gas_price < self.unit_price {
            return Err(rejected(format!(
                "gas price {} below unit price {}",
                tx.gas_price, self.unit_price
            )));
        }

        let signers = tx
            .recover_signers()
            .map_err(|e| rejected(format!("invalid transaction v, r, s values: {}", e)))?;

        let hash = tx.hash();
        let mut state = self.state();
        if state.receipts.contains_key(&hash) {
            return Err(rejected("known transaction"));
        }

        let sender = state.accounts.get(&tx.from).cloned().unwrap_or_default();
        if tx.nonce < sender.nonce {
            return Err(rejected("nonce too low"));
        }
        if tx.nonce > sender.nonce {
            return Err(rejected("nonce too high"));
        }

        sender
            .key
            .authorizes(tx.from, tx.required_role(), &signers)
            .map_err(|e| rejected(format!("invalid {} signature: {}", tx.required_role(), e)))?;

        let max_fee = U256::from(tx.gas) * U256::from(tx.gas_price);
        if sender.balance < max_fee + tx.value() {
            return Err(rejected("insufficient funds for gas * price + value"));
        }

        // Accepted from here on: the nonce is consumed whatever the outcome.
        let intrinsic = tx.intrinsic_gas();
        let out_of_gas = tx.gas < intrinsic;
        let gas_used = if out_of_gas { tx.gas } else { intrinsic };
        let fee = U256::from(gas_used) * U256::from(tx.gas_price);

        state.block_number += 1;
        let block_number = state.block_number;

        let mut updated = sender;
        updated.nonce += 1;
        updated.balance -= fee;
        let mut credit = None;
        if !out_of_gas {
            match &tx.payload {
                TxPayload::ValueTransfer { to, value } => {
                    updated.balance -= *value;
                    credit = Some((*to, *value));
                }
                TxPayload::AccountUpdate { account_key } => {
                    updated.key = account_key.merged_over(&updated.key);
                }
            }
        }
        state.accounts.insert(tx.from, updated);
        if let Some((to, value)) = credit {
            let recipient = state.accounts.entry(to).or_default();
            recipient.balance = recipient.balance.saturating_add(value);
        }

        let receipt = self.receipt_for(tx, hash, block_number, gas_used, !out_of_gas);
        let hidden_polls = state.receipt_delay;
        state.receipts.insert(
            hash,
            StoredReceipt {
                receipt,
                hidden_polls,
            },
        );

        tracing::debug!(
            tx_hash = %hash,
            tx_type = tx.type_name(),
            block_number,
            gas_used,
            success = !out_of_gas,
            "Transaction applied"
        );

        Ok(hash)
    }

    fn receipt_for(
        &self,
        tx: &Transaction,
        hash: TxHash,
        block_number: u64,
        gas_used: u64,
        success: bool,
    ) -> TransactionReceipt {
        let mut other = Map::new();
        other.insert("type".into(), Value::from(tx.type_name()));
        other.insert("typeInt".into(), Value::from(tx.tx_type()));
        other.insert("nonce".into(), Value::from(format!("{:#x}", tx.nonce)));
        other.insert("gas".into(), Value::from(format!("{:#x}", tx.gas)));
        other.insert("gasPrice".into(), Value::from(format!("{:#x}", tx.gas_price)));
        other.insert(
            "signatures".into(),
            serde_json::to_value(tx.signatures()).unwrap_or(Value::Null),
        );

        let to = match tx.payload {
            TxPayload::ValueTransfer { to, .. } => Some(to),
            TxPayload::AccountUpdate { .. } => None,
        };

        TransactionReceipt {
            transaction_hash: hash,
            status: U64::from(u64::from(success)),
            block_number: Some(U64::from(block_number)),
            gas_used: Some(U64::from(gas_used)),
            from: Some(tx.from),
            to,
            tx_error: (!success).then(|| TX_ERROR_OUT_OF_GAS.to_string()),
            other,
        }
    }
}

impl ChainRpc for MemoryChain {
    async fn chain_id(&self) -> RpcResult<u64> {
        Ok(self.chain_id)
    }

    async fn gas_price(&self) -> RpcResult<u128> {
        Ok(self.unit_price)
    }

    async fn get_transaction_count(&self, address: Address) -> RpcResult<u64> {
        Ok(self.nonce(&address))
    }

    async fn send_raw_transaction(&self, tx: &Transaction) -> RpcResult<TxHash> {
        self.submit(tx)
    }

    async fn get_transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> RpcResult<Option<TransactionReceipt>> {
        let mut state = self.state();
        if state.withhold_receipts {
            return Ok(None);
        }
        let Some(stored) = state.receipts.get_mut(&tx_hash) else {
            return Ok(None);
        };
        if stored.hidden_polls > 0 {
            stored.hidden_polls -= 1;
            return Ok(None);
        }
        Ok(Some(stored.receipt.clone()))
    }

    async fn get_account_key(&self, address: Address) -> RpcResult<Option<AccountKey>> {
        Ok(self.account_key(&address))
    }
}
