//! RLP helpers for the heterogeneous lists used by account keys and transactions.

use alloy::rlp::{Encodable, Header};

/// Encode a list whose items are already RLP-encoded.
pub(crate) fn list_of_encoded(items: &[Vec<u8>]) -> Vec<u8> {
    let payload_length = items.iter().map(Vec::len).sum();
    let mut out = Vec::with_capacity(payload_length + 9);
    Header {
        list: true,
        payload_length,
    }
    .encode(&mut out);
    for item in items {
        out.extend_from_slice(item);
    }
    out
}

/// Encode a single value.
pub(crate) fn encode_item(item: &dyn Encodable) -> Vec<u8> {
    let mut out = Vec::with_capacity(item.length());
    item.encode(&mut out);
    out
}

/// Encode a list of mixed values.
pub(crate) fn encode_list(items: &[&dyn Encodable]) -> Vec<u8> {
    let encoded: Vec<Vec<u8>> = items.iter().map(|item| encode_item(*item)).collect();
    list_of_encoded(&encoded)
}
