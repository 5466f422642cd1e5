//! JSON-RPC client with timeout and error handling.
//!
//! # Responsibilities
//! - Talk JSON-RPC 2.0 over alloy's HTTP transport to a node or node-API gateway
//! - Attach basic-auth credentials and the `x-chain-id` header
//! - Surface node error objects with their original message
//! - Verify the node's chain id at startup

use alloy::primitives::{hex, Address, TxHash, U128, U64};
use alloy::rpc::client::{ClientBuilder, RpcClient as JsonRpcClient};
use alloy::transports::http::reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use alloy::transports::http::{reqwest, Http};
use alloy::transports::{Authorization, RpcError as TransportRpcError, TransportError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::time::Duration;
use tokio::time::timeout;
use url::Url;

use crate::account::AccountKey;
use crate::config::NodeConfig;
use crate::rpc::types::{RpcError, RpcResult, TransactionReceipt};
use crate::rpc::ChainRpc;
use crate::transaction::Transaction;

/// Header carrying the chain id expected by node-API gateways.
pub const CHAIN_ID_HEADER: &str = "x-chain-id";

/// JSON-RPC client for one node endpoint.
#[derive(Clone)]
pub struct RpcClient {
    client: JsonRpcClient,
    endpoint: Url,
    authenticated: bool,
    namespace: String,
    chain_id: u64,
    timeout_duration: Duration,
}

impl RpcClient {
    /// Create a client for `config.api_url`.
    ///
    /// Fails on an invalid URL. A chain id mismatch is logged, not fatal.
    pub async fn new(config: &NodeConfig, chain_id: u64) -> RpcResult<Self> {
        let endpoint: Url = config.api_url.parse().map_err(|e| {
            RpcError::Transport(format!("Invalid RPC URL '{}': {}", config.api_url, e))
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(
            CHAIN_ID_HEADER,
            HeaderValue::from_str(&chain_id.to_string())
                .map_err(|e| RpcError::Transport(e.to_string()))?,
        );
        let authenticated = !config.access_key_id.is_empty();
        if authenticated {
            let auth = Authorization::basic(&config.access_key_id, &config.secret_access_key);
            let mut value = HeaderValue::from_str(&auth.to_string())
                .map_err(|e| RpcError::Transport(format!("Invalid credentials: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        let transport = Http::with_client(http, endpoint.clone());
        let is_local = transport.guess_local();

        let client = Self {
            client: ClientBuilder::default().transport(transport, is_local),
            endpoint,
            authenticated,
            namespace: config.rpc_namespace.clone(),
            chain_id,
            timeout_duration: Duration::from_secs(config.rpc_timeout_secs),
        };

        match client.verify_chain_id().await {
            Ok(()) => {
                tracing::info!(
                    api_url = %client.endpoint,
                    chain_id,
                    "RPC client initialized"
                );
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "RPC client initialized but chain verification failed"
                );
            }
        }

        Ok(client)
    }

    /// Verify the connected chain id matches configuration.
    pub async fn verify_chain_id(&self) -> RpcResult<()> {
        let actual = self.chain_id().await?;
        if actual != self.chain_id {
            return Err(RpcError::ChainMismatch {
                expected: self.chain_id,
                actual,
            });
        }
        Ok(())
    }

    async fn call<P, T>(&self, method: &str, params: P) -> RpcResult<T>
    where
        P: Serialize + Clone + Debug + Send + Sync + Unpin + 'static,
        T: DeserializeOwned + Debug + Send + Sync + Unpin + 'static,
    {
        let method = format!("{}_{}", self.namespace, method);
        let request = self.client.request(method.clone(), params);
        match timeout(self.timeout_duration, request).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(node_error(&method, e)),
            Err(_) => {
                tracing::warn!(method = %method, "RPC timeout");
                Err(RpcError::Timeout(self.timeout_duration.as_secs()))
            }
        }
    }

    async fn call_without_params<T>(&self, method: &str) -> RpcResult<T>
    where
        T: DeserializeOwned + Debug + Send + Sync + Unpin + 'static,
    {
        self.call(method, ()).await
    }
}

/// Keep the node's own error object; everything else is transport trouble.
fn node_error(method: &str, error: TransportError) -> RpcError {
    match error {
        TransportRpcError::ErrorResp(payload) => {
            tracing::debug!(
                method = %method,
                code = payload.code,
                message = %payload.message,
                "Node returned error"
            );
            RpcError::Node {
                code: payload.code,
                message: payload.message.to_string(),
            }
        }
        TransportRpcError::DeserError { err, .. } => {
            RpcError::Decode(format!("{}: {}", method, err))
        }
        other => RpcError::Transport(other.to_string()),
    }
}

impl ChainRpc for RpcClient {
    async fn chain_id(&self) -> RpcResult<u64> {
        let id: U64 = self.call_without_params("chainID").await?;
        Ok(id.to::<u64>())
    }

    async fn gas_price(&self) -> RpcResult<u128> {
        let price: U128 = self.call_without_params("gasPrice").await?;
        Ok(price.to::<u128>())
    }

    async fn get_transaction_count(&self, address: Address) -> RpcResult<u64> {
        let count: U64 = self.call("getTransactionCount", (address, "pending")).await?;
        Ok(count.to::<u64>())
    }

    async fn send_raw_transaction(&self, tx: &Transaction) -> RpcResult<TxHash> {
        let raw = hex::encode_prefixed(tx.raw());
        self.call("sendRawTransaction", [raw]).await
    }

    async fn get_transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> RpcResult<Option<TransactionReceipt>> {
        self.call("getTransactionReceipt", [tx_hash]).await
    }

    async fn get_account_key(&self, address: Address) -> RpcResult<Option<AccountKey>> {
        self.call("getAccountKey", (address, "latest")).await
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("api_url", &self.endpoint.as_str())
            .field("chain_id", &self.chain_id)
            .field("namespace", &self.namespace)
            .field("timeout", &self.timeout_duration)
            .field("authenticated", &self.authenticated)
            .finish()
    }
}
