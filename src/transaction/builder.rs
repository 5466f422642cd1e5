//! Transaction construction with nonce and gas price taken from the chain.

use alloy::primitives::{Address, U256};

use crate::account::Account;
use crate::rpc::ChainRpc;
use crate::transaction::types::{Transaction, TxError, TxResult};

/// Builds filled, unsigned transactions for one chain.
pub struct TxBuilder<'a, R> {
    rpc: &'a R,
    chain_id: u64,
}

impl<'a, R: ChainRpc> TxBuilder<'a, R> {
    pub fn new(rpc: &'a R, chain_id: u64) -> Self {
        Self { rpc, chain_id }
    }

    /// Account update installing `account`'s key, sent by `from`.
    pub async fn account_update(
        &self,
        from: Address,
        account: &Account,
        gas: u64,
    ) -> TxResult<Transaction> {
        if from != account.address() {
            return Err(TxError::AccountMismatch {
                from,
                account: account.address(),
            });
        }
        self.fill(Transaction::account_update(account, gas)).await
    }

    /// Plain value transfer.
    pub async fn value_transfer(
        &self,
        from: Address,
        to: Address,
        value: U256,
        gas: u64,
    ) -> TxResult<Transaction> {
        self.fill(Transaction::value_transfer(from, to, value, gas))
            .await
    }

    async fn fill(&self, mut tx: Transaction) -> TxResult<Transaction> {
        if tx.gas == 0 {
            return Err(TxError::ZeroGas);
        }

        // Pending count so queued transactions from this sender are not reused
        tx.nonce = self.rpc.get_transaction_count(tx.from).await?;
        tx.gas_price = self.rpc.gas_price().await?;
        tx.chain_id = self.chain_id;

        tracing::debug!(
            tx_type = tx.type_name(),
            from = %tx.from,
            nonce = tx.nonce,
            gas = tx.gas,
            gas_price = tx.gas_price,
            "Transaction built"
        );

        Ok(tx)
    }
}
