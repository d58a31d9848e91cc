//! Challenge-response password hashing.
//!
//! The server keeps `B64(HMAC-SHA256(salt, password))`. At login it hands out the salt and a
//! one-time nonce, and expects `B64(HMAC-SHA256(nonce, B64(HMAC-SHA256(salt, password))))`, so
//! neither the password nor the stored hash crosses the wire.

use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// `B64(HMAC-SHA256(key, message))` with standard, padded Base64.
pub fn hmac_sha256(key: &str, message: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(message.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

/// Password proof submitted to the login endpoint.
pub fn password_hash(salt: &str, nonce: &str, password: &str) -> String {
    let salted = Zeroizing::new(hmac_sha256(salt, password));
    hmac_sha256(nonce, &salted)
}
