//! Rotation metrics.
//!
//! # Metrics
//! - `rotation_tx_submitted_total` (counter): transactions accepted by the node, by type
//! - `rotation_tx_confirmed_total` (counter): successful receipts, by type
//! - `rotation_failures_total` (counter): aborted rotations, by step

use metrics::counter;

pub fn record_submitted(tx_type: &'static str) {
    counter!("rotation_tx_submitted_total", "type" => tx_type).increment(1);
}

pub fn record_confirmed(tx_type: &'static str) {
    counter!("rotation_tx_confirmed_total", "type" => tx_type).increment(1);
}

pub fn record_failure(step: &'static str) {
    counter!("rotation_failures_total", "step" => step).increment(1);
}
