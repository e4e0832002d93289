//! HMAC-SHA256 helpers shared by order authentication and the invoice
//! webhook callback.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// `HMAC-SHA256(key, data)`, hex-encoded.
pub fn hmac_sha256_hex(key: &str, data: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(data.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_input_is_deterministic() {
        let a = hmac_sha256_hex("key", "data");
        let b = hmac_sha256_hex("key", "data");
        assert_eq!(a, b);
    }

    #[test]
    fn different_keys_produce_different_digests() {
        let a = hmac_sha256_hex("key-a", "data");
        let b = hmac_sha256_hex("key-b", "data");
        assert_ne!(a, b);
    }
}
