//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Workflow steps produce:
//!     → logging.rs (structured log events on stderr)
//!     → metrics.rs (counters through the `metrics` facade)
//!
//! Consumers:
//!     → Operator terminal or log aggregation
//!     → Whatever recorder the embedding process installs
//! ```
//!
//! # Design Decisions
//! - Structured fields, never private keys or access secrets
//! - Stdout is reserved for the run result; logs go to stderr
//! - Counters are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
