//! Account key structures, their canonical encoding and their JSON form.
//!
//! An [`AccountKey`] describes how an address is authorized on-chain. The
//! canonical RLP encoding is what an account-update transaction carries and
//! signs over; the JSON form is what a node returns from `getAccountKey`.

use alloy::primitives::{Address, Bytes, U256};
use alloy::signers::local::PrivateKeySigner;
use k256::ecdsa::VerifyingKey;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use thiserror::Error;

use crate::account::role::{Role, ROLE_COUNT};
use crate::encoding::{encode_item, encode_list, list_of_encoded};

const KEY_TYPE_NIL: u8 = 0x00;
const KEY_TYPE_LEGACY: u8 = 0x01;
const KEY_TYPE_PUBLIC: u8 = 0x02;
const KEY_TYPE_FAIL: u8 = 0x03;
const KEY_TYPE_WEIGHTED_MULTISIG: u8 = 0x04;
const KEY_TYPE_ROLE_BASED: u8 = 0x05;

/// Errors decoding a node's JSON account key.
#[derive(Debug, Error)]
pub enum KeyDecodeError {
    #[error("unknown account key type {0}")]
    UnknownType(u8),

    #[error("malformed {what}: {detail}")]
    Malformed { what: &'static str, detail: String },
}

fn malformed(what: &'static str, detail: impl fmt::Display) -> KeyDecodeError {
    KeyDecodeError::Malformed {
        what,
        detail: detail.to_string(),
    }
}

/// A secp256k1 public key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    pub fn from_signer(signer: &PrivateKeySigner) -> Self {
        Self(*signer.credential().verifying_key())
    }

    /// Build a key from big-endian affine coordinates.
    pub fn from_coordinates(x: U256, y: U256) -> Result<Self, KeyDecodeError> {
        let mut sec1 = [0u8; 65];
        sec1[0] = 0x04;
        sec1[1..33].copy_from_slice(&x.to_be_bytes::<32>());
        sec1[33..].copy_from_slice(&y.to_be_bytes::<32>());
        VerifyingKey::from_sec1_bytes(&sec1)
            .map(Self)
            .map_err(|e| malformed("public key", e))
    }

    /// 33-byte SEC1 compressed form, as carried in the canonical encoding.
    pub fn compressed(&self) -> Bytes {
        Bytes::copy_from_slice(self.0.to_encoded_point(true).as_bytes())
    }

    /// Affine `(x, y)` coordinates.
    pub fn coordinates(&self) -> (U256, U256) {
        let point = self.0.to_encoded_point(false);
        let bytes = point.as_bytes();
        (
            U256::from_be_slice(&bytes[1..33]),
            U256::from_be_slice(&bytes[33..65]),
        )
    }

    /// The address a legacy account with this key would have.
    pub fn to_address(&self) -> Address {
        Address::from_public_key(&self.0)
    }

    fn to_json(self) -> Value {
        let (x, y) = self.coordinates();
        json!({ "x": format!("0x{x:x}"), "y": format!("0x{y:x}") })
    }

    fn from_json(value: &Value) -> Result<Self, KeyDecodeError> {
        let coordinate = |name: &str| -> Result<U256, KeyDecodeError> {
            value
                .get(name)
                .and_then(Value::as_str)
                .ok_or_else(|| malformed("public key", format!("missing `{name}`")))?
                .parse::<U256>()
                .map_err(|e| malformed("public key", e))
        };
        Self::from_coordinates(coordinate("x")?, coordinate("y")?)
    }
}

impl From<VerifyingKey> for PublicKey {
    fn from(key: VerifyingKey) -> Self {
        Self(key)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.compressed())
    }
}

/// A key with its weight inside a weighted multi-sig key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightedPublicKey {
    pub weight: u64,
    pub key: PublicKey,
}

/// Authorization structure of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AccountKeyJson", into = "AccountKeyJson")]
pub enum AccountKey {
    /// Placeholder inside a role-based key: keep whatever the role has now.
    Nil,
    /// Signer address must equal the account address.
    Legacy,
    /// One specific public key.
    Public(PublicKey),
    /// Nothing can sign for the account.
    Fail,
    /// A weighted quorum of keys must reach the threshold.
    WeightedMultiSig {
        threshold: u64,
        keys: Vec<WeightedPublicKey>,
    },
    /// One key per role, in [`Role::ALL`] order.
    RoleBased(Vec<AccountKey>),
}

impl AccountKey {
    pub fn key_type(&self) -> u8 {
        match self {
            AccountKey::Nil => KEY_TYPE_NIL,
            AccountKey::Legacy => KEY_TYPE_LEGACY,
            AccountKey::Public(_) => KEY_TYPE_PUBLIC,
            AccountKey::Fail => KEY_TYPE_FAIL,
            AccountKey::WeightedMultiSig { .. } => KEY_TYPE_WEIGHTED_MULTISIG,
            AccountKey::RoleBased(_) => KEY_TYPE_ROLE_BASED,
        }
    }

    /// Canonical encoding carried by account-update transactions.
    pub fn rlp_encoded(&self) -> Bytes {
        let mut out = Vec::new();
        match self {
            AccountKey::Nil => out.push(0x80),
            AccountKey::Legacy | AccountKey::Fail => {
                out.push(self.key_type());
                out.push(0xc0);
            }
            AccountKey::Public(key) => {
                out.push(KEY_TYPE_PUBLIC);
                out.extend(encode_item(&key.compressed()));
            }
            AccountKey::WeightedMultiSig { threshold, keys } => {
                let entries: Vec<Vec<u8>> = keys
                    .iter()
                    .map(|k| encode_list(&[&k.weight, &k.key.compressed()]))
                    .collect();
                out.push(KEY_TYPE_WEIGHTED_MULTISIG);
                out.extend(list_of_encoded(&[
                    encode_item(threshold),
                    list_of_encoded(&entries),
                ]));
            }
            AccountKey::RoleBased(roles) => {
                let entries: Vec<Vec<u8>> = roles
                    .iter()
                    .map(|role_key| encode_item(&role_key.rlp_encoded()))
                    .collect();
                out.push(KEY_TYPE_ROLE_BASED);
                out.extend(list_of_encoded(&entries));
            }
        }
        out.into()
    }

    /// Number of public keys the node has to validate when installing this key.
    pub fn public_key_count(&self) -> usize {
        match self {
            AccountKey::Public(_) => 1,
            AccountKey::WeightedMultiSig { keys, .. } => keys.len(),
            AccountKey::RoleBased(roles) => roles.iter().map(AccountKey::public_key_count).sum(),
            AccountKey::Nil | AccountKey::Legacy | AccountKey::Fail => 0,
        }
    }

    /// Key used for `role`. Missing or nil roles fall back to the transaction role.
    pub fn for_role(&self, role: Role) -> &AccountKey {
        match self {
            AccountKey::RoleBased(roles) => match roles.get(role.index()) {
                Some(AccountKey::Nil) | None => roles.first().unwrap_or(&AccountKey::Nil),
                Some(key) => key,
            },
            other => other,
        }
    }

    /// Key that results from installing `self` over `current`.
    pub fn merged_over(&self, current: &AccountKey) -> AccountKey {
        match (self, current) {
            (AccountKey::Nil, _) => current.clone(),
            (AccountKey::RoleBased(new_roles), AccountKey::RoleBased(old_roles)) => {
                let merged = (0..ROLE_COUNT.max(new_roles.len()))
                    .map(|i| match (new_roles.get(i), old_roles.get(i)) {
                        (Some(AccountKey::Nil) | None, Some(old)) => old.clone(),
                        (Some(new), _) => new.clone(),
                        (None, None) => AccountKey::Nil,
                    })
                    .collect();
                AccountKey::RoleBased(merged)
            }
            (new, _) => new.clone(),
        }
    }

    /// Whether an on-chain key matches this expected key. Nil roles match anything.
    pub fn matches(&self, onchain: &AccountKey) -> bool {
        match (self, onchain) {
            (AccountKey::Nil, _) => true,
            (AccountKey::RoleBased(expected), AccountKey::RoleBased(actual)) => {
                expected.len() <= actual.len()
                    && expected.iter().zip(actual).all(|(e, a)| e.matches(a))
            }
            (expected, actual) => expected == actual,
        }
    }

    /// Check that `signers` authorize `role` for the account at `address`.
    pub fn authorizes(
        &self,
        address: Address,
        role: Role,
        signers: &[PublicKey],
    ) -> Result<(), AuthorizationError> {
        if signers.is_empty() {
            return Err(AuthorizationError::NoSignatures);
        }
        match self.for_role(role) {
            AccountKey::Nil | AccountKey::Legacy => {
                if let Some(signer) = signers.iter().find(|s| s.to_address() != address) {
                    return Err(AuthorizationError::UnknownSigner(signer.to_address()));
                }
                Ok(())
            }
            AccountKey::Public(key) => {
                if let Some(signer) = signers.iter().find(|s| *s != key) {
                    return Err(AuthorizationError::UnknownSigner(signer.to_address()));
                }
                Ok(())
            }
            AccountKey::Fail => Err(AuthorizationError::KeyFail),
            AccountKey::WeightedMultiSig { threshold, keys } => {
                let mut seen: Vec<&PublicKey> = Vec::with_capacity(signers.len());
                let mut weight = 0u64;
                for signer in signers {
                    let entry = keys
                        .iter()
                        .find(|k| k.key == *signer)
                        .ok_or(AuthorizationError::UnknownSigner(signer.to_address()))?;
                    if !seen.contains(&signer) {
                        seen.push(signer);
                        weight = weight.saturating_add(entry.weight);
                    }
                }
                if weight < *threshold {
                    return Err(AuthorizationError::BelowThreshold {
                        weight,
                        threshold: *threshold,
                    });
                }
                Ok(())
            }
            AccountKey::RoleBased(_) => Err(AuthorizationError::NestedRoleBased),
        }
    }
}

/// Why a set of signers does not authorize a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    #[error("transaction carries no signatures")]
    NoSignatures,

    #[error("account key is AccountKeyFail")]
    KeyFail,

    #[error("signer {0} is not part of the account key")]
    UnknownSigner(Address),

    #[error("signature weight {weight} is below threshold {threshold}")]
    BelowThreshold { weight: u64, threshold: u64 },

    #[error("role-based keys cannot be nested")]
    NestedRoleBased,
}

/// Wire form returned by `getAccountKey`: `{"keyType": n, "key": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountKeyJson {
    pub key_type: u8,
    #[serde(default)]
    pub key: Value,
}

impl From<AccountKey> for AccountKeyJson {
    fn from(key: AccountKey) -> Self {
        let key_type = key.key_type();
        let key = match key {
            AccountKey::Nil | AccountKey::Legacy | AccountKey::Fail => json!({}),
            AccountKey::Public(pk) => pk.to_json(),
            AccountKey::WeightedMultiSig { threshold, keys } => json!({
                "threshold": threshold,
                "keys": keys
                    .iter()
                    .map(|k| json!({ "weight": k.weight, "key": k.key.to_json() }))
                    .collect::<Vec<_>>(),
            }),
            AccountKey::RoleBased(roles) => Value::Array(
                roles
                    .into_iter()
                    .map(|r| {
                        let role = AccountKeyJson::from(r);
                        json!({ "keyType": role.key_type, "key": role.key })
                    })
                    .collect(),
            ),
        };
        Self { key_type, key }
    }
}

impl TryFrom<AccountKeyJson> for AccountKey {
    type Error = KeyDecodeError;

    fn try_from(json: AccountKeyJson) -> Result<Self, Self::Error> {
        match json.key_type {
            KEY_TYPE_NIL => Ok(AccountKey::Nil),
            KEY_TYPE_LEGACY => Ok(AccountKey::Legacy),
            KEY_TYPE_FAIL => Ok(AccountKey::Fail),
            KEY_TYPE_PUBLIC => PublicKey::from_json(&json.key).map(AccountKey::Public),
            KEY_TYPE_WEIGHTED_MULTISIG => {
                let threshold = json
                    .key
                    .get("threshold")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| malformed("weighted multisig key", "missing `threshold`"))?;
                let keys = json
                    .key
                    .get("keys")
                    .and_then(Value::as_array)
                    .ok_or_else(|| malformed("weighted multisig key", "missing `keys`"))?
                    .iter()
                    .map(|entry| {
                        let weight = entry
                            .get("weight")
                            .and_then(Value::as_u64)
                            .ok_or_else(|| malformed("weighted key", "missing `weight`"))?;
                        let key = entry
                            .get("key")
                            .ok_or_else(|| malformed("weighted key", "missing `key`"))?;
                        Ok(WeightedPublicKey {
                            weight,
                            key: PublicKey::from_json(key)?,
                        })
                    })
                    .collect::<Result<Vec<_>, KeyDecodeError>>()?;
                Ok(AccountKey::WeightedMultiSig { threshold, keys })
            }
            KEY_TYPE_ROLE_BASED => {
                let roles = json
                    .key
                    .as_array()
                    .ok_or_else(|| malformed("role-based key", "expected an array"))?;
                roles
                    .iter()
                    .map(|role| {
                        serde_json::from_value::<AccountKeyJson>(role.clone())
                            .map_err(|e| malformed("role key", e))
                            .and_then(AccountKey::try_from)
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(AccountKey::RoleBased)
            }
            other => Err(KeyDecodeError::UnknownType(other)),
        }
    }
}
