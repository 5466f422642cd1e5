//! Key rotation: replace an account's key with per-role keys and prove they work.
//!
//! # Data Flow
//! ```text
//! RotateConfig (counts, policies, gas, probe)
//!     → KeyRotation::prepare   (new Keyring + Account, nothing sent)
//!     → KeyRotation::execute   (update signed by the old keyring, confirmed,
//!                               read back, new keyring installed, probe sent)
//!     → RotationResult | RotationError { step, kind }
//! ```
//!
//! # Safety Constraints
//! - The old keyring signs the update; new keys never authorize their own installation
//! - The wallet switches to the new keyring only after the chain shows the new key
//! - No rollback: a failed probe leaves the account rotated and needs an operator

pub mod error;
pub mod workflow;

pub use error::{ErrorKind, RotationError, Step};
pub use workflow::{KeyRotation, PreparedRotation, ProbeOptions, RotationOptions, RotationResult};
