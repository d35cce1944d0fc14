//! Opaque session and invite tokens

use rand::{rngs::OsRng, RngCore};

/// Raw token size in bytes
pub const TOKEN_BYTES: usize = 32;

/// Hex-encoded token length
pub const TOKEN_LEN: usize = TOKEN_BYTES * 2;

/// Generate a secure random token
///
/// Returns 32 bytes from the OS random source, hex-encoded (64 characters)
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Cheap shape check before any store lookup
pub fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_LEN && token.bytes().all(|b| b.is_ascii_hexdigit())
}
