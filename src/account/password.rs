/// Salted SHA-256 password digests
use sha2::{Digest, Sha256};

/// Hash a password with the process-wide salt
///
/// Lowercase hex SHA-256 of the password followed by the salt. The salt is
/// shared by every account, so rotating it invalidates all stored hashes.
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}

/// Check a candidate password against a stored digest
pub fn verify_password(password: &str, salt: &str, stored_hash: &str) -> bool {
    let candidate = hash_password(password, salt);
    if candidate.len() != stored_hash.len() {
        return false;
    }

    candidate
        .bytes()
        .zip(stored_hash.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
