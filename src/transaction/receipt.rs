//! Receipt polling with a fixed interval and a bounded number of attempts.

use alloy::primitives::TxHash;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

use crate::rpc::{ChainRpc, TransactionReceipt};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 15;

/// Receipt polling errors.
#[derive(Debug, Error)]
pub enum ReceiptError {
    /// The receipt never appeared; the transaction's fate is unknown.
    #[error("transaction {tx_hash} not confirmed after {attempts} attempts")]
    Timeout {
        tx_hash: TxHash,
        attempts: u32,
        last_error: Option<String>,
    },
}

/// Polls for a receipt every `interval`, at most `max_attempts` times.
#[derive(Debug, Clone, Copy)]
pub struct PollingReceiptProcessor {
    interval: Duration,
    max_attempts: u32,
}

impl Default for PollingReceiptProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_MAX_ATTEMPTS)
    }
}

impl PollingReceiptProcessor {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait until the node reports a receipt for `tx_hash`.
    ///
    /// RPC errors count as a failed attempt. A receipt is returned whatever
    /// its status; callers decide what a failed status means.
    pub async fn wait_for_receipt<R: ChainRpc>(
        &self,
        rpc: &R,
        tx_hash: TxHash,
    ) -> Result<TransactionReceipt, ReceiptError> {
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            match rpc.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    tracing::debug!(tx_hash = %tx_hash, attempt, "Receipt found");
                    return Ok(receipt);
                }
                Ok(None) => {
                    tracing::debug!(tx_hash = %tx_hash, attempt, "Transaction pending");
                }
                Err(e) => {
                    tracing::warn!(tx_hash = %tx_hash, attempt, error = %e, "Receipt query failed");
                    last_error = Some(e.to_string());
                }
            }

            if attempt < self.max_attempts {
                sleep(self.interval).await;
            }
        }

        Err(ReceiptError::Timeout {
            tx_hash,
            attempts: self.max_attempts,
            last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::MemoryChain;

    #[test]
    fn test_defaults() {
        let processor = PollingReceiptProcessor::default();
        assert_eq!(processor.interval(), Duration::from_millis(1000));
        assert_eq!(processor.max_attempts(), 15);
        assert_eq!(PollingReceiptProcessor::new(Duration::ZERO, 0).max_attempts(), 1);
    }

    #[tokio::test]
    async fn test_unknown_transaction_times_out() {
        let chain = MemoryChain::new(1001);
        let processor = PollingReceiptProcessor::new(Duration::from_millis(1), 3);
        let tx_hash = TxHash::repeat_byte(0xab);

        let err = processor.wait_for_receipt(&chain, tx_hash).await.unwrap_err();
        let ReceiptError::Timeout { tx_hash: hash, attempts, last_error } = err;
        assert_eq!(hash, tx_hash);
        assert_eq!(attempts, 3);
        assert!(last_error.is_none());
    }
}
