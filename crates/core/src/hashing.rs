//! Shared SHA-256 hex digest utility.
//!
//! Record identities are derived from the original file name so that
//! re-ingesting the same archive maps onto the same records and the same
//! remote object keys.

use sha2::{Digest, Sha256};

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Derive the record id for an ingested file from its original file name.
pub fn record_id_for_file_name(file_name: &str) -> String {
    sha256_hex(file_name.as_bytes())
}
