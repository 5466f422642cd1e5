//! Keyrings: an address bound to the private keys that sign for it.
//!
//! # Security
//! - Private keys never appear in `Debug` output or logs
//! - [`KeyringFile`] is the only form that exposes key material

use alloy::primitives::{hex, Address};
use alloy::signers::local::PrivateKeySigner;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::account::key::{AccountKey, PublicKey, WeightedPublicKey};
use crate::account::policy::{RolePolicies, RolePolicy};
use crate::account::role::{Role, ROLE_COUNT};
use crate::account::{Account, AccountError};

/// Key material held by a keyring.
#[derive(Clone)]
pub enum KeyringKeys {
    /// One key used for every role.
    Single(PrivateKeySigner),
    /// Several keys used for every role.
    Multiple(Vec<PrivateKeySigner>),
    /// A separate key list per role.
    RoleBased([Vec<PrivateKeySigner>; ROLE_COUNT]),
}

/// An address and the keys that sign for it.
#[derive(Clone)]
pub struct Keyring {
    address: Address,
    keys: KeyringKeys,
}

/// Parse a hex private key, with or without `0x` prefix.
pub fn parse_private_key(private_key_hex: &str) -> Result<PrivateKeySigner, AccountError> {
    let key_hex = private_key_hex.trim();
    let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);
    key_hex
        .parse()
        .map_err(|e| AccountError::InvalidPrivateKey(format!("Invalid private key format: {}", e)))
}

/// Generate `count` fresh random keys.
pub fn generate_keys(count: usize) -> Vec<PrivateKeySigner> {
    (0..count).map(|_| PrivateKeySigner::random()).collect()
}

/// Generate fresh random keys for each role.
pub fn generate_role_based_keys(counts: [usize; ROLE_COUNT]) -> [Vec<PrivateKeySigner>; ROLE_COUNT] {
    counts.map(generate_keys)
}

impl Keyring {
    /// Keyring whose address is derived from the key.
    pub fn from_private_key(private_key_hex: &str) -> Result<Self, AccountError> {
        let signer = parse_private_key(private_key_hex)?;
        Ok(Self {
            address: signer.address(),
            keys: KeyringKeys::Single(signer),
        })
    }

    /// Keyring for an address that may no longer match its key (a decoupled account).
    pub fn single(address: Address, private_key_hex: &str) -> Result<Self, AccountError> {
        Ok(Self {
            address,
            keys: KeyringKeys::Single(parse_private_key(private_key_hex)?),
        })
    }

    pub fn multiple(address: Address, keys: Vec<PrivateKeySigner>) -> Result<Self, AccountError> {
        if keys.is_empty() {
            return Err(AccountError::EmptyKeyring(address));
        }
        Ok(Self {
            address,
            keys: KeyringKeys::Multiple(keys),
        })
    }

    /// Role-based keyring. At least one role must hold a key.
    pub fn role_based(
        address: Address,
        keys: [Vec<PrivateKeySigner>; ROLE_COUNT],
    ) -> Result<Self, AccountError> {
        if keys.iter().all(Vec::is_empty) {
            return Err(AccountError::EmptyKeyring(address));
        }
        Ok(Self {
            address,
            keys: KeyringKeys::RoleBased(keys),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn keys(&self) -> &KeyringKeys {
        &self.keys
    }

    /// Keys configured for `role` without any fallback.
    pub fn role_keys(&self, role: Role) -> &[PrivateKeySigner] {
        match &self.keys {
            KeyringKeys::Single(signer) => std::slice::from_ref(signer),
            KeyringKeys::Multiple(signers) => signers,
            KeyringKeys::RoleBased(roles) => &roles[role.index()],
        }
    }

    /// Keys that sign for `role`. An empty role falls back to the transaction role.
    pub fn signing_keys(&self, role: Role) -> &[PrivateKeySigner] {
        let keys = self.role_keys(role);
        if keys.is_empty() && role != Role::Transaction {
            tracing::debug!(
                address = %self.address,
                role = %role,
                "No keys for role, falling back to transaction role"
            );
            return self.role_keys(Role::Transaction);
        }
        keys
    }

    /// Number of keys per role.
    pub fn key_counts(&self) -> [usize; ROLE_COUNT] {
        Role::ALL.map(|role| self.role_keys(role).len())
    }

    /// Public keys per role.
    pub fn public_keys(&self) -> [Vec<PublicKey>; ROLE_COUNT] {
        Role::ALL.map(|role| self.role_keys(role).iter().map(PublicKey::from_signer).collect())
    }

    /// Build the account descriptor this keyring would install.
    ///
    /// Role-based keyrings take one policy per role; a multiple-key keyring
    /// uses the transaction role's policy; a single key becomes a public key.
    pub fn to_account(&self, policies: &RolePolicies) -> Result<Account, AccountError> {
        let account_key = match &self.keys {
            KeyringKeys::Single(signer) => AccountKey::Public(PublicKey::from_signer(signer)),
            KeyringKeys::Multiple(signers) => {
                let policy = policies.get(Role::Transaction);
                if matches!(policy, RolePolicy::SingleSigner) {
                    return Err(AccountError::SingleSignerKeyCount {
                        role: Role::Transaction,
                        keys: signers.len(),
                    });
                }
                role_key(Role::Transaction, signers, policy)?
            }
            KeyringKeys::RoleBased(roles) => {
                policies.validate()?;
                policies.check_shape(&self.key_counts())?;
                let role_keys = Role::ALL
                    .iter()
                    .map(|role| role_key(*role, &roles[role.index()], policies.get(*role)))
                    .collect::<Result<Vec<_>, _>>()?;
                AccountKey::RoleBased(role_keys)
            }
        };
        Ok(Account::new(self.address, account_key))
    }
}

fn role_key(
    role: Role,
    signers: &[PrivateKeySigner],
    policy: &RolePolicy,
) -> Result<AccountKey, AccountError> {
    policy.validate(role)?;
    policy.check_shape(role, signers.len())?;
    match policy {
        RolePolicy::SingleSigner => Ok(signers
            .first()
            .map(|signer| AccountKey::Public(PublicKey::from_signer(signer)))
            .unwrap_or(AccountKey::Nil)),
        RolePolicy::Weighted { threshold, weights } => Ok(AccountKey::WeightedMultiSig {
            threshold: *threshold,
            keys: signers
                .iter()
                .zip(weights)
                .map(|(signer, weight)| WeightedPublicKey {
                    weight: *weight,
                    key: PublicKey::from_signer(signer),
                })
                .collect(),
        }),
    }
}

impl fmt::Debug for Keyring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.keys {
            KeyringKeys::Single(_) => "single",
            KeyringKeys::Multiple(_) => "multiple",
            KeyringKeys::RoleBased(_) => "role_based",
        };
        f.debug_struct("Keyring")
            .field("address", &self.address)
            .field("kind", &kind)
            .field("key_counts", &self.key_counts())
            .finish()
    }
}

/// On-disk form of a keyring: the address and hex private keys per role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyringFile {
    pub address: Address,
    pub keys: [Vec<String>; ROLE_COUNT],
}

impl KeyringFile {
    pub fn load(path: &Path) -> Result<Self, AccountError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AccountError::KeyringFile(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| AccountError::KeyringFile(format!("{}: {}", path.display(), e)))
    }

    /// Write a new file. An existing file is never replaced: it may hold the
    /// only copy of keys that are still in force.
    pub fn save(&self, path: &Path) -> Result<(), AccountError> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| AccountError::KeyringFile(e.to_string()))?;
        let file_error =
            |e: std::io::Error| AccountError::KeyringFile(format!("{}: {}", path.display(), e));
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(file_error)?;
        file.write_all(content.as_bytes()).map_err(file_error)
    }

    pub fn into_keyring(self) -> Result<Keyring, AccountError> {
        let mut roles: [Vec<PrivateKeySigner>; ROLE_COUNT] = Default::default();
        for (role_keys, hex_keys) in roles.iter_mut().zip(&self.keys) {
            *role_keys = hex_keys
                .iter()
                .map(|k| parse_private_key(k))
                .collect::<Result<_, _>>()?;
        }
        Keyring::role_based(self.address, roles)
    }
}

impl From<&Keyring> for KeyringFile {
    fn from(keyring: &Keyring) -> Self {
        Self {
            address: keyring.address(),
            keys: Role::ALL.map(|role| {
                keyring
                    .role_keys(role)
                    .iter()
                    .map(|signer| hex::encode_prefixed(signer.to_bytes()))
                    .collect()
            }),
        }
    }
}
