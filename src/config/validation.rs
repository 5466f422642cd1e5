//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check addresses and keys parse, and that the key layout fits its policies
//! - Validate value ranges (gas > 0, timeouts > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RotateConfig → Result<(), Vec<ValidationError>>
//! - Node settings are only required when talking to a remote node

use alloy::primitives::Address;
use url::Url;

use crate::account::keyring::parse_private_key;
use crate::account::{Role, ROLE_COUNT};
use crate::config::schema::RotateConfig;

/// One failed check, naming the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate `config`. `require_node` demands a usable endpoint and chain id.
pub fn validate_config(config: &RotateConfig, require_node: bool) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if require_node {
        let node = &config.node;
        if node.api_url.trim().is_empty() {
            errors.push(ValidationError::new("node.api_url", "must be set"));
        } else if let Err(e) = Url::parse(&node.api_url) {
            errors.push(ValidationError::new("node.api_url", format!("invalid URL: {}", e)));
        }
        if node.chain_id.is_none() {
            errors.push(ValidationError::new("node.chain_id", "must be set"));
        }
        if node.access_key_id.is_empty() != node.secret_access_key.is_empty() {
            errors.push(ValidationError::new(
                "node.secret_access_key",
                "access_key_id and secret_access_key must be set together",
            ));
        }
    }
    if config.node.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("node.rpc_timeout_secs", "must be greater than zero"));
    }
    if config.node.rpc_namespace.trim().is_empty() {
        errors.push(ValidationError::new("node.rpc_namespace", "must be set"));
    }

    let sender = &config.sender;
    if sender.keyring_file.is_none() {
        if sender.address.trim().is_empty() {
            errors.push(ValidationError::new("sender.address", "must be set"));
        } else if sender.address.parse::<Address>().is_err() {
            errors.push(ValidationError::new("sender.address", "not a valid address"));
        }
        if sender.private_key.trim().is_empty() {
            errors.push(ValidationError::new("sender.private_key", "must be set"));
        } else if let Err(e) = parse_private_key(&sender.private_key) {
            errors.push(ValidationError::new("sender.private_key", e.to_string()));
        }
    }
    if sender.recipient_address.trim().is_empty() {
        errors.push(ValidationError::new("sender.recipient_address", "must be set"));
    } else if sender.recipient_address.parse::<Address>().is_err() {
        errors.push(ValidationError::new("sender.recipient_address", "not a valid address"));
    }

    let rotation = &config.rotation;
    if rotation.policies.len() != ROLE_COUNT {
        errors.push(ValidationError::new(
            "rotation.policies",
            format!("expected {} entries, got {}", ROLE_COUNT, rotation.policies.len()),
        ));
    }
    if rotation.role_key_counts.iter().all(|count| *count == 0) {
        errors.push(ValidationError::new("rotation.role_key_counts", "at least one role needs keys"));
    }
    if rotation.role_key_counts[Role::Transaction.index()] == 0 {
        errors.push(ValidationError::new(
            "rotation.role_key_counts",
            "the transaction role needs keys to sign the probe transfer",
        ));
    }
    let policies = rotation.role_policies();
    if let Err(e) = policies.validate() {
        errors.push(ValidationError::new("rotation.policies", e.to_string()));
    } else if let Err(e) = policies.check_shape(&rotation.role_key_counts) {
        errors.push(ValidationError::new("rotation.policies", e.to_string()));
    }
    if rotation.gas == 0 {
        errors.push(ValidationError::new("rotation.gas", "must be greater than zero"));
    }

    if config.probe.gas == 0 {
        errors.push(ValidationError::new("probe.gas", "must be greater than zero"));
    }
    if config.polling.max_attempts == 0 {
        errors.push(ValidationError::new("polling.max_attempts", "must be greater than zero"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
