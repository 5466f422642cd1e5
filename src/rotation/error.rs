//! Rotation failures: which step aborted and why.

use alloy::primitives::TxHash;
use serde::Serialize;
use thiserror::Error;

use crate::account::{AccountError, AccountKey};
use crate::rpc::{RpcError, TransactionReceipt};
use crate::transaction::{ReceiptError, TxError};
use crate::wallet::WalletError;

/// Workflow steps that can fail, in execution order. Key generation
/// cannot fail and has no entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    BuildCredential,
    DeriveAccount,
    BuildUpdate,
    SignUpdate,
    SubmitUpdate,
    ConfirmUpdate,
    VerifyAccountKey,
    InstallCredential,
    Probe,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Step::BuildCredential => "build_credential",
            Step::DeriveAccount => "derive_account",
            Step::BuildUpdate => "build_update",
            Step::SignUpdate => "sign_update",
            Step::SubmitUpdate => "submit_update",
            Step::ConfirmUpdate => "confirm_update",
            Step::VerifyAccountKey => "verify_account_key",
            Step::InstallCredential => "install_credential",
            Step::Probe => "probe",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What went wrong.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// Key counts do not fit the policy shapes.
    #[error("credential construction failed: {0}")]
    CredentialConstruction(AccountError),

    /// A role's weights can never reach its threshold.
    #[error("policy violation: {0}")]
    PolicyViolation(AccountError),

    /// The transaction could not be built (zero gas, nonce or gas price unavailable).
    #[error("transaction build failed: {0}")]
    TransactionBuild(TxError),

    /// The credential lacks a key for the required role.
    #[error("signing failed: {0}")]
    Signing(WalletError),

    /// The node rejected the transaction.
    #[error("submission rejected: {0}")]
    Submission(RpcError),

    /// No receipt within the polling bound. The transaction's fate is unknown.
    #[error("{error}")]
    ConfirmationTimeout { error: ReceiptError },

    /// The transaction was included with a failure status.
    #[error("transaction {tx_hash} reverted{}", tx_error_suffix(.receipt))]
    TransactionReverted {
        tx_hash: TxHash,
        receipt: Box<TransactionReceipt>,
    },

    /// The account key read back from the chain is not the one installed.
    #[error("account key verification failed: {reason}")]
    Verification {
        reason: String,
        expected: Box<AccountKey>,
        actual: Option<Box<AccountKey>>,
    },

    /// The new keyring could not replace the old one locally.
    #[error("credential install failed: {0}")]
    CredentialInstall(WalletError),

    /// The new keys could not move funds. The old keys are already revoked.
    #[error("probe transaction failed: {0}")]
    ProbeFailed(Box<ErrorKind>),
}

fn tx_error_suffix(receipt: &TransactionReceipt) -> String {
    receipt
        .tx_error
        .as_deref()
        .map(|code| format!(" (txError {})", code))
        .unwrap_or_default()
}

/// A rotation aborted at `step`.
#[derive(Debug, Error)]
#[error("rotation failed at {step}: {kind}")]
pub struct RotationError {
    pub step: Step,
    pub kind: ErrorKind,
}

impl RotationError {
    pub fn new(step: Step, kind: ErrorKind) -> Self {
        Self { step, kind }
    }

    /// True once the account update may have reached the chain.
    ///
    /// From submission on the old keys may already be revoked, so rerunning
    /// the rotation blindly could lock the account out.
    pub fn is_irreversible(&self) -> bool {
        self.step >= Step::SubmitUpdate
            && !matches!(
                (&self.step, &self.kind),
                (Step::SubmitUpdate, ErrorKind::Submission(_))
                    | (Step::ConfirmUpdate, ErrorKind::TransactionReverted { .. })
            )
    }

    /// True when the account is rotated on-chain but unusable with the new keys.
    pub fn needs_manual_intervention(&self) -> bool {
        matches!(self.kind, ErrorKind::ProbeFailed(_))
    }
}
