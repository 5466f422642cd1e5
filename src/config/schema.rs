//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Every section has defaults so a minimal file (or none, with the
//! environment filling in credentials) describes a complete run.

use serde::{Deserialize, Serialize};

use crate::account::{RolePolicies, RolePolicy, ROLE_COUNT};

pub const ENV_NODE_API_URL: &str = "NODE_API_URL";
pub const ENV_ACCESS_KEY_ID: &str = "ACCESS_KEY_ID";
pub const ENV_SECRET_ACCESS_KEY: &str = "SECRET_ACCESS_KEY";
pub const ENV_CHAIN_ID: &str = "CHAIN_ID";
pub const ENV_SENDER_ADDRESS: &str = "SENDER_ADDRESS";
pub const ENV_SENDER_PRIVATE_KEY: &str = "SENDER_PRIVATE_KEY";
pub const ENV_RECIPIENT_ADDRESS: &str = "RECIPIENT_ADDRESS";

/// Root configuration for a key rotation run.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RotateConfig {
    /// Node endpoint and credentials.
    pub node: NodeConfig,

    /// The account being rotated.
    pub sender: SenderConfig,

    /// New key layout.
    pub rotation: RotationConfig,

    /// Transfer sent with the new keys after the update.
    pub probe: ProbeConfig,

    /// Receipt polling.
    pub polling: PollingConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,
}

impl RotateConfig {
    /// Fill blank fields from the environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    /// Fill blank fields from `lookup`. Values already set are kept.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let fill = |field: &mut String, name: &str| {
            if field.trim().is_empty() {
                if let Some(value) = lookup(name).filter(|v| !v.trim().is_empty()) {
                    *field = value.trim().to_string();
                }
            }
        };

        fill(&mut self.node.api_url, ENV_NODE_API_URL);
        fill(&mut self.node.access_key_id, ENV_ACCESS_KEY_ID);
        fill(&mut self.node.secret_access_key, ENV_SECRET_ACCESS_KEY);
        fill(&mut self.sender.address, ENV_SENDER_ADDRESS);
        fill(&mut self.sender.private_key, ENV_SENDER_PRIVATE_KEY);
        fill(&mut self.sender.recipient_address, ENV_RECIPIENT_ADDRESS);

        if self.node.chain_id.is_none() {
            self.node.chain_id = lookup(ENV_CHAIN_ID).and_then(|v| v.trim().parse().ok());
        }
    }
}

/// Node endpoint configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NodeConfig {
    /// JSON-RPC endpoint URL.
    pub api_url: String,

    /// Access key id for basic auth. Empty disables authentication.
    pub access_key_id: String,

    /// Secret access key for basic auth.
    pub secret_access_key: String,

    /// Chain id (1001 for Kairos, 8217 for mainnet).
    pub chain_id: Option<u64>,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// JSON-RPC method namespace ("klay" or "kaia").
    pub rpc_namespace: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            chain_id: None,
            rpc_timeout_secs: 10,
            rpc_namespace: "klay".to_string(),
        }
    }
}

impl std::fmt::Debug for NodeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeConfig")
            .field("api_url", &self.api_url)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("chain_id", &self.chain_id)
            .field("rpc_timeout_secs", &self.rpc_timeout_secs)
            .field("rpc_namespace", &self.rpc_namespace)
            .finish()
    }
}

/// The account whose keys are rotated.
#[derive(Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SenderConfig {
    /// Account address (0x-prefixed hex).
    pub address: String,

    /// Current private key (hex). Ignored when `keyring_file` is set.
    pub private_key: String,

    /// Recipient of the probe transfer.
    pub recipient_address: String,

    /// Keyring file holding the current keys, for accounts rotated before.
    pub keyring_file: Option<String>,
}

impl std::fmt::Debug for SenderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SenderConfig")
            .field("address", &self.address)
            .field("private_key", &"<redacted>")
            .field("recipient_address", &self.recipient_address)
            .field("keyring_file", &self.keyring_file)
            .finish()
    }
}

/// Layout of the new role-based key.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Keys to generate for the transaction, account-update and fee-payer roles.
    pub role_key_counts: [usize; ROLE_COUNT],

    /// One policy per role, in the same order.
    pub policies: Vec<RolePolicyConfig>,

    /// Gas limit of the account-update transaction.
    pub gas: u64,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            role_key_counts: [2, 1, 3],
            policies: vec![
                RolePolicyConfig::weighted(2, vec![1, 1]),
                RolePolicyConfig::default(),
                RolePolicyConfig::weighted(3, vec![2, 1, 1]),
            ],
            gas: 150_000,
        }
    }
}

impl RotationConfig {
    /// Policies in role order. Missing entries default to a single signer.
    pub fn role_policies(&self) -> RolePolicies {
        let policy = |i: usize| {
            self.policies
                .get(i)
                .map(RolePolicyConfig::to_policy)
                .unwrap_or_default()
        };
        RolePolicies::new(policy(0), policy(1), policy(2))
    }
}

/// Policy of one role. No threshold means a single required signer.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct RolePolicyConfig {
    pub threshold: Option<u64>,
    pub weights: Vec<u64>,
}

impl RolePolicyConfig {
    pub fn weighted(threshold: u64, weights: Vec<u64>) -> Self {
        Self {
            threshold: Some(threshold),
            weights,
        }
    }

    pub fn to_policy(&self) -> RolePolicy {
        match self.threshold {
            Some(threshold) => RolePolicy::weighted(threshold, self.weights.clone()),
            None => RolePolicy::SingleSigner,
        }
    }
}

/// Probe transfer settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Amount sent, in the smallest unit.
    pub value: u64,

    /// Gas limit of the probe transfer.
    pub gas: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            value: 1,
            gas: 150_000,
        }
    }
}

/// Receipt polling settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Delay between receipt queries in milliseconds.
    pub interval_ms: u64,

    /// Receipt queries before giving up.
    pub max_attempts: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            max_attempts: 15,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` overrides it.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
}
