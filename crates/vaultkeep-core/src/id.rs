//! ID generation utilities.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Prefix carried by client-side placeholder IDs until the store assigns one.
pub const PENDING_PREFIX: &str = "pending-";

/// Generate a new UUID v4.
pub fn uuid() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a placeholder ID for an optimistic insert.
pub fn pending_id() -> String {
    format!("{}{}", PENDING_PREFIX, uuid())
}

/// Check whether an ID is a client-side placeholder.
pub fn is_pending(id: &str) -> bool {
    id.starts_with(PENDING_PREFIX)
}

/// Generate a SHA256 hash of the input.
pub fn sha256(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
