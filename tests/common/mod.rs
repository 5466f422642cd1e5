//! Shared utilities for integration tests.

#![allow(dead_code)]

use alloy::primitives::{Address, U256};
use alloy::signers::local::PrivateKeySigner;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use role_key_rotation::account::{Keyring, RolePolicies, RolePolicy};
use role_key_rotation::config::NodeConfig;
use role_key_rotation::rotation::{ProbeOptions, RotationOptions};
use role_key_rotation::rpc::MemoryChain;
use role_key_rotation::transaction::PollingReceiptProcessor;
use role_key_rotation::wallet::KeyringContainer;

pub const CHAIN_ID: u64 = 1001;

/// 100 KAIA.
pub fn initial_balance() -> U256 {
    U256::from(10).pow(U256::from(20))
}

/// A ledger with one funded legacy account, and that account's key.
pub fn funded_chain() -> (MemoryChain, PrivateKeySigner) {
    let chain = MemoryChain::new(CHAIN_ID);
    let signer = PrivateKeySigner::random();
    chain.fund(signer.address(), initial_balance());
    (chain, signer)
}

/// Wallet holding `signer` as the keyring of its own address.
pub fn wallet_for(signer: &PrivateKeySigner) -> KeyringContainer {
    let keyring =
        Keyring::from_private_key(&alloy::primitives::hex::encode(signer.to_bytes())).unwrap();
    let mut wallet = KeyringContainer::new();
    wallet.add(keyring).unwrap();
    wallet
}

/// Transaction role 2-of-[1,1], single update key, fee payer 3-of-[2,1,1].
pub fn reference_policies() -> RolePolicies {
    RolePolicies::new(
        RolePolicy::weighted(2, vec![1, 1]),
        RolePolicy::SingleSigner,
        RolePolicy::weighted(3, vec![2, 1, 1]),
    )
}

pub fn options(update_gas: u64) -> RotationOptions {
    RotationOptions {
        update_gas,
        probe: ProbeOptions {
            recipient: Address::repeat_byte(0xee),
            value: U256::from(1),
            gas: 150_000,
        },
    }
}

pub fn fast_receipts() -> PollingReceiptProcessor {
    PollingReceiptProcessor::new(Duration::from_millis(1), 5)
}

pub fn node_config(addr: SocketAddr) -> NodeConfig {
    NodeConfig {
        api_url: format!("http://{}", addr),
        access_key_id: "access-key".to_string(),
        secret_access_key: "secret-key".to_string(),
        chain_id: Some(CHAIN_ID),
        rpc_timeout_secs: 2,
        rpc_namespace: "klay".to_string(),
    }
}

/// One HTTP request seen by the mock node.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub head: String,
    pub body: Value,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<String> {
        self.head.lines().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim().to_string())
        })
    }
}

/// Start a JSON-RPC node on a free port. `handler` maps (method, params) to
/// either a result or an error object.
pub async fn start_mock_node<F>(handler: F) -> (SocketAddr, Arc<Mutex<Vec<RecordedRequest>>>)
where
    F: Fn(&str, &Value) -> Result<Value, (i64, String)> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let handler = Arc::new(handler);

    let seen = requests.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let handler = handler.clone();
                    let seen = seen.clone();
                    tokio::spawn(async move {
                        serve_one(socket, handler.as_ref(), &seen).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, requests)
}

async fn serve_one<F>(mut socket: TcpStream, handler: &F, seen: &Mutex<Vec<RecordedRequest>>)
where
    F: Fn(&str, &Value) -> Result<Value, (i64, String)>,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let (head, body) = loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);

        let Some(split) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..split]).to_string();
        let length = head
            .lines()
            .find_map(|line| {
                let (key, value) = line.split_once(':')?;
                key.trim()
                    .eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        if buf.len() >= split + 4 + length {
            break (head, buf[split + 4..split + 4 + length].to_vec());
        }
    };

    let request: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    seen.lock().unwrap().push(RecordedRequest {
        head,
        body: request.clone(),
    });

    let method = request["method"].as_str().unwrap_or_default();
    let response = match handler(method, &request["params"]) {
        Ok(result) => serde_json::json!({"jsonrpc": "2.0", "id": request["id"], "result": result}),
        Err((code, message)) => serde_json::json!({
            "jsonrpc": "2.0",
            "id": request["id"],
            "error": {"code": code, "message": message}
        }),
    };
    let body = response.to_string();
    let response_str = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let _ = socket.write_all(response_str.as_bytes()).await;
    let _ = socket.shutdown().await;
}
