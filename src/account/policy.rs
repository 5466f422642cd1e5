//! Weighted multi-sig policies, one per role.

use serde::Serialize;

use crate::account::role::{Role, ROLE_COUNT};
use crate::account::AccountError;

/// Maximum number of keys a weighted multi-sig key may hold.
pub const MAX_WEIGHTED_KEYS: usize = 10;

/// How the keys of one role are combined on-chain.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RolePolicy {
    /// One required signer (implicit weight 1, threshold 1). Zero keys leave
    /// the role unchanged.
    #[default]
    SingleSigner,
    /// Explicit threshold with one weight per key.
    Weighted { threshold: u64, weights: Vec<u64> },
}

impl RolePolicy {
    pub fn weighted(threshold: u64, weights: impl Into<Vec<u64>>) -> Self {
        RolePolicy::Weighted {
            threshold,
            weights: weights.into(),
        }
    }

    /// Check that `key_count` keys fit this policy.
    pub fn check_shape(&self, role: Role, key_count: usize) -> Result<(), AccountError> {
        match self {
            RolePolicy::SingleSigner if key_count > 1 => {
                Err(AccountError::SingleSignerKeyCount { role, keys: key_count })
            }
            RolePolicy::SingleSigner => Ok(()),
            RolePolicy::Weighted { weights, .. } => {
                if key_count > MAX_WEIGHTED_KEYS {
                    return Err(AccountError::TooManyKeys {
                        role,
                        keys: key_count,
                        max: MAX_WEIGHTED_KEYS,
                    });
                }
                if weights.len() != key_count {
                    return Err(AccountError::WeightCountMismatch {
                        role,
                        keys: key_count,
                        weights: weights.len(),
                    });
                }
                Ok(())
            }
        }
    }

    /// Check that the policy can ever be satisfied.
    pub fn validate(&self, role: Role) -> Result<(), AccountError> {
        let RolePolicy::Weighted { threshold, weights } = self else {
            return Ok(());
        };
        if *threshold == 0 {
            return Err(AccountError::ZeroThreshold { role });
        }
        if weights.contains(&0) {
            return Err(AccountError::ZeroWeight { role });
        }
        let sum = weights.iter().fold(0u64, |acc, w| acc.saturating_add(*w));
        if sum < *threshold {
            return Err(AccountError::ThresholdNotMet {
                role,
                sum,
                threshold: *threshold,
            });
        }
        Ok(())
    }
}

/// One policy per role, in [`Role::ALL`] order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RolePolicies(pub [RolePolicy; ROLE_COUNT]);

impl RolePolicies {
    pub fn new(transaction: RolePolicy, account_update: RolePolicy, fee_payer: RolePolicy) -> Self {
        Self([transaction, account_update, fee_payer])
    }

    pub fn get(&self, role: Role) -> &RolePolicy {
        &self.0[role.index()]
    }

    /// Check per-role key counts against the policy shapes.
    pub fn check_shape(&self, key_counts: &[usize; ROLE_COUNT]) -> Result<(), AccountError> {
        for role in Role::ALL {
            self.get(role).check_shape(role, key_counts[role.index()])?;
        }
        Ok(())
    }

    /// Check that every role's weights can reach its threshold.
    pub fn validate(&self) -> Result<(), AccountError> {
        for role in Role::ALL {
            self.get(role).validate(role)?;
        }
        Ok(())
    }
}
