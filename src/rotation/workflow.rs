//! The rotation sequence.
//!
//! # Steps
//! ```text
//! prepare:  1. generate keys → 2. build keyring → 3. derive account
//! execute:  4. build update → 5. sign with the OLD keyring → 6. submit
//!           → 7. await receipt → 8. read back the account key
//!           → 9. install the new keyring → 10. probe transfer with the new keys
//! ```
//!
//! Every failure aborts the run and names its step. Nothing is retried
//! here; the only retry loop is receipt polling.

use alloy::primitives::{Address, TxHash, U256};
use serde::Serialize;

use crate::account::{generate_role_based_keys, Account, AccountKey, Keyring, RolePolicies, ROLE_COUNT};
use crate::observability::metrics;
use crate::rotation::error::{ErrorKind, RotationError, Step};
use crate::rpc::{ChainRpc, TransactionReceipt};
use crate::transaction::{PollingReceiptProcessor, Transaction, TxBuilder};
use crate::wallet::KeyringContainer;

/// Transfer sent with the new keys once the update is confirmed.
#[derive(Debug, Clone)]
pub struct ProbeOptions {
    pub recipient: Address,
    pub value: U256,
    pub gas: u64,
}

/// Caller-supplied limits for one rotation.
#[derive(Debug, Clone)]
pub struct RotationOptions {
    /// Gas limit of the account update.
    pub update_gas: u64,
    pub probe: ProbeOptions,
}

/// New keys and the account descriptor they form, not yet on-chain.
#[derive(Debug, Clone)]
pub struct PreparedRotation {
    keyring: Keyring,
    account: Account,
}

impl PreparedRotation {
    pub fn keyring(&self) -> &Keyring {
        &self.keyring
    }

    pub fn account(&self) -> &Account {
        &self.account
    }
}

/// Outcome of a completed rotation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationResult {
    /// Private keys never leave the process through serialization.
    #[serde(skip)]
    pub new_keyring: Keyring,
    pub address: Address,
    pub key_counts: [usize; ROLE_COUNT],
    /// Key sent in the update. Nil roles keep whatever the account held.
    pub account_key: AccountKey,
    /// Key the node reports after the update.
    pub onchain_account_key: AccountKey,
    pub update_tx_hash: TxHash,
    pub update_receipt: TransactionReceipt,
    pub probe_tx_hash: TxHash,
    pub probe_receipt: TransactionReceipt,
}

/// Rotates accounts held in `wallet` to fresh role-based keys.
pub struct KeyRotation<'a, R> {
    rpc: &'a R,
    wallet: &'a mut KeyringContainer,
    chain_id: u64,
    receipts: PollingReceiptProcessor,
}

fn fail(step: Step, kind: ErrorKind) -> RotationError {
    tracing::error!(step = %step, error = %kind, "Rotation step failed");
    metrics::record_failure(step.as_str());
    RotationError::new(step, kind)
}

impl<'a, R: ChainRpc> KeyRotation<'a, R> {
    pub fn new(
        rpc: &'a R,
        wallet: &'a mut KeyringContainer,
        chain_id: u64,
        receipts: PollingReceiptProcessor,
    ) -> Self {
        Self {
            rpc,
            wallet,
            chain_id,
            receipts,
        }
    }

    /// Replace the on-chain key of `address` with freshly generated
    /// role-based keys, then prove the new keys work.
    pub async fn rotate_to_role_based_keys(
        &mut self,
        address: Address,
        role_key_counts: [usize; ROLE_COUNT],
        policies: &RolePolicies,
        options: &RotationOptions,
    ) -> Result<RotationResult, RotationError> {
        let prepared = self.prepare(address, role_key_counts, policies)?;
        self.execute(prepared, options).await
    }

    /// Steps 1 to 3: generate keys and derive the account descriptor.
    ///
    /// Touches neither the chain nor the wallet.
    pub fn prepare(
        &self,
        address: Address,
        role_key_counts: [usize; ROLE_COUNT],
        policies: &RolePolicies,
    ) -> Result<PreparedRotation, RotationError> {
        let keys = generate_role_based_keys(role_key_counts);
        tracing::info!(address = %address, key_counts = ?role_key_counts, "Generated new role keys");

        // An unreachable threshold is a policy problem whatever the key counts.
        policies
            .validate()
            .map_err(|e| fail(Step::DeriveAccount, ErrorKind::PolicyViolation(e)))?;
        policies
            .check_shape(&role_key_counts)
            .map_err(|e| fail(Step::BuildCredential, ErrorKind::CredentialConstruction(e)))?;
        let keyring = Keyring::role_based(address, keys)
            .map_err(|e| fail(Step::BuildCredential, ErrorKind::CredentialConstruction(e)))?;

        let account = keyring.to_account(policies).map_err(|e| {
            let kind = if e.is_policy_violation() {
                ErrorKind::PolicyViolation(e)
            } else {
                ErrorKind::CredentialConstruction(e)
            };
            fail(Step::DeriveAccount, kind)
        })?;
        tracing::info!(
            address = %address,
            account_key_type = account.account_key().key_type(),
            public_keys = account.account_key().public_key_count(),
            "Derived account descriptor"
        );

        Ok(PreparedRotation { keyring, account })
    }

    /// Steps 4 to 10: install the prepared account on-chain and locally.
    pub async fn execute(
        &mut self,
        prepared: PreparedRotation,
        options: &RotationOptions,
    ) -> Result<RotationResult, RotationError> {
        let PreparedRotation { keyring, account } = prepared;
        let address = account.address();
        let builder = TxBuilder::new(self.rpc, self.chain_id);

        let mut update = builder
            .account_update(address, &account, options.update_gas)
            .await
            .map_err(|e| fail(Step::BuildUpdate, ErrorKind::TransactionBuild(e)))?;

        // The current keyring authorizes the change; the new keys are not valid yet.
        self.wallet
            .sign(&address, &mut update)
            .map_err(|e| fail(Step::SignUpdate, ErrorKind::Signing(e)))?;

        let update_tx_hash = self
            .submit(&update)
            .await
            .map_err(|kind| fail(Step::SubmitUpdate, kind))?;
        tracing::warn!(
            address = %address,
            tx_hash = %update_tx_hash,
            "Account update submitted; the old keys stop working once it is included"
        );

        let update_receipt = self
            .confirm(&update, update_tx_hash)
            .await
            .map_err(|kind| fail(Step::ConfirmUpdate, kind))?;

        let onchain_account_key = self
            .verify_account_key(&account)
            .await
            .map_err(|kind| fail(Step::VerifyAccountKey, kind))?;

        let key_counts = keyring.key_counts();
        self.wallet
            .update(keyring.clone())
            .map_err(|e| fail(Step::InstallCredential, ErrorKind::CredentialInstall(e)))?;
        tracing::info!(address = %address, key_counts = ?key_counts, "New keyring installed");

        let (probe_tx_hash, probe_receipt) = self
            .probe(address, &options.probe)
            .await
            .map_err(|kind| fail(Step::Probe, ErrorKind::ProbeFailed(Box::new(kind))))?;

        tracing::info!(
            address = %address,
            update_tx_hash = %update_tx_hash,
            probe_tx_hash = %probe_tx_hash,
            "Key rotation complete"
        );

        Ok(RotationResult {
            new_keyring: keyring,
            address,
            key_counts,
            account_key: account.account_key().clone(),
            onchain_account_key,
            update_tx_hash,
            update_receipt,
            probe_tx_hash,
            probe_receipt,
        })
    }

    async fn submit(&self, tx: &Transaction) -> Result<TxHash, ErrorKind> {
        let tx_hash = self
            .rpc
            .send_raw_transaction(tx)
            .await
            .map_err(ErrorKind::Submission)?;
        metrics::record_submitted(tx.type_name());
        tracing::info!(
            tx_type = tx.type_name(),
            tx_hash = %tx_hash,
            nonce = tx.nonce,
            signatures = tx.signatures().len(),
            "Transaction submitted"
        );
        Ok(tx_hash)
    }

    async fn confirm(&self, tx: &Transaction, tx_hash: TxHash) -> Result<TransactionReceipt, ErrorKind> {
        let receipt = self
            .receipts
            .wait_for_receipt(self.rpc, tx_hash)
            .await
            .map_err(|error| ErrorKind::ConfirmationTimeout { error })?;

        if !receipt.succeeded() {
            return Err(ErrorKind::TransactionReverted {
                tx_hash,
                receipt: Box::new(receipt),
            });
        }

        metrics::record_confirmed(tx.type_name());
        tracing::info!(
            tx_type = tx.type_name(),
            tx_hash = %tx_hash,
            block_number = ?receipt.block_number,
            gas_used = ?receipt.gas_used,
            "Transaction confirmed"
        );
        Ok(receipt)
    }

    async fn verify_account_key(&self, expected: &Account) -> Result<AccountKey, ErrorKind> {
        let expected_key = expected.account_key();
        let verification = |reason: String, actual: Option<AccountKey>| ErrorKind::Verification {
            reason,
            expected: Box::new(expected_key.clone()),
            actual: actual.map(Box::new),
        };

        let onchain = self
            .rpc
            .get_account_key(expected.address())
            .await
            .map_err(|e| verification(format!("account key query failed: {}", e), None))?
            .ok_or_else(|| verification(format!("account {} not found", expected.address()), None))?;

        if !expected_key.matches(&onchain) {
            return Err(verification(
                "on-chain key differs from the installed key".to_string(),
                Some(onchain),
            ));
        }

        tracing::info!(
            address = %expected.address(),
            account_key_type = onchain.key_type(),
            "On-chain account key verified"
        );
        Ok(onchain)
    }

    async fn probe(
        &self,
        address: Address,
        probe: &ProbeOptions,
    ) -> Result<(TxHash, TransactionReceipt), ErrorKind> {
        let mut transfer = TxBuilder::new(self.rpc, self.chain_id)
            .value_transfer(address, probe.recipient, probe.value, probe.gas)
            .await
            .map_err(ErrorKind::TransactionBuild)?;
        self.wallet
            .sign(&address, &mut transfer)
            .map_err(ErrorKind::Signing)?;

        let tx_hash = self.submit(&transfer).await?;
        let receipt = self.confirm(&transfer, tx_hash).await?;
        Ok((tx_hash, receipt))
    }
}
