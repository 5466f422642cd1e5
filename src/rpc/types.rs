//! Wire types shared by every [`ChainRpc`](crate::rpc::ChainRpc) implementation.

use alloy::primitives::{Address, TxHash, U64};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors talking to a node.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Connection or HTTP failure.
    #[error("RPC error: {0}")]
    Transport(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// The node answered with a JSON-RPC error object.
    #[error("node error {code}: {message}")]
    Node { code: i64, message: String },

    /// The node answered with something we could not decode.
    #[error("invalid RPC response: {0}")]
    Decode(String),

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },
}

/// Result type for RPC operations.
pub type RpcResult<T> = Result<T, RpcError>;

/// Outcome record of an included transaction.
///
/// Only the fields the workflow inspects are typed; everything else the
/// node returns is kept in `other` so it can be printed back verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: TxHash,

    pub status: U64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<U64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<U64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,

    /// Node-specific failure code, present when `status` is 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_error: Option<String>,

    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        self.status == U64::from(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_node_receipt() {
        let json = r#"{
            "blockHash": "0x0ab8d3b6b8a4c3b29c9b4c94d0d93e3ed0c7f0d4a1e0b1e4f1c4f3e3e2d1c0b1",
            "blockNumber": "0x5a8c1b",
            "from": "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
            "gas": "0x249f0",
            "gasUsed": "0x1b1b8",
            "status": "0x1",
            "to": null,
            "transactionHash": "0x8f3a1d5d9b3c6e3b4a2f1e0d9c8b7a6f5e4d3c2b1a0f9e8d7c6b5a4f3e2d1c0b",
            "type": "TxTypeAccountUpdate",
            "typeInt": 32
        }"#;
        let receipt: TransactionReceipt = serde_json::from_str(json).unwrap();
        assert!(receipt.succeeded());
        assert_eq!(receipt.block_number, Some(U64::from(0x5a8c1b)));
        assert_eq!(receipt.to, None);
        assert_eq!(receipt.other["type"], "TxTypeAccountUpdate");
        assert_eq!(receipt.other["typeInt"], 32);
    }

    #[test]
    fn test_failed_status() {
        let json = r#"{
            "transactionHash": "0x8f3a1d5d9b3c6e3b4a2f1e0d9c8b7a6f5e4d3c2b1a0f9e8d7c6b5a4f3e2d1c0b",
            "status": "0x0",
            "txError": "0x66"
        }"#;
        let receipt: TransactionReceipt = serde_json::from_str(json).unwrap();
        assert!(!receipt.succeeded());
        assert_eq!(receipt.tx_error.as_deref(), Some("0x66"));
    }

    #[test]
    fn test_error_display() {
        let err = RpcError::Timeout(10);
        assert_eq!(err.to_string(), "RPC timeout after 10 seconds");

        let err = RpcError::Node {
            code: -32000,
            message: "insufficient funds".into(),
        };
        assert!(err.to_string().contains("insufficient funds"));
    }
}
