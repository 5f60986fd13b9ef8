use anyhow::Context;
use base64::{engine::general_purpose::URL_SAFE, Engine};
use hmac::Mac;
use sha2::Sha256;

type HmacSha256 = hmac::Hmac<Sha256>;

/// Keyed HMAC-SHA256 used to tokenize remember tokens for storage.
#[derive(Clone)]
pub struct Hmac {
    mac: HmacSha256,
}

impl Hmac {
    pub fn new(key: &str) -> anyhow::Result<Self> {
        let mac = HmacSha256::new_from_slice(key.as_bytes()).context("init hmac key")?;
        Ok(Self { mac })
    }

    /// URL-safe base64 digest of `input` under this key.
    pub fn hash(&self, input: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(input.as_bytes());
        URL_SAFE.encode(mac.finalize().into_bytes())
    }
}

impl std::fmt::Debug for Hmac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Hmac(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_same_input_same_digest() {
        let h = Hmac::new("secret-key").expect("hmac");
        assert_eq!(h.hash("token"), h.hash("token"));
        assert_ne!(h.hash("token"), h.hash("token2"));
    }

    #[test]
    fn different_keys_disagree() {
        let a = Hmac::new("key-a").expect("hmac");
        let b = Hmac::new("key-b").expect("hmac");
        assert_ne!(a.hash("token"), b.hash("token"));
    }

    #[test]
    fn digest_is_url_safe_and_fixed_length() {
        let h = Hmac::new("secret-key").expect("hmac");
        for input in ["", "a", "a much longer input with spaces / and + signs"] {
            let d = h.hash(input);
            // 32 byte digest, padded base64
            assert_eq!(d.len(), 44);
            assert!(!d.contains('+') && !d.contains('/'));
        }
    }

    #[test]
    fn matches_rfc4231_case_2() {
        let h = Hmac::new("Jefe").expect("hmac");
        let expected = URL_SAFE.encode([
            0x5b, 0xdc, 0xc1, 0x46, 0xbf, 0x60, 0x75, 0x4e, 0x6a, 0x04, 0x24, 0x26, 0x08, 0x95,
            0x75, 0xc7, 0x5a, 0x00, 0x3f, 0x08, 0x9d, 0x27, 0x39, 0x83, 0x9d, 0xec, 0x58, 0xb9,
            0x64, 0xec, 0x38, 0x43,
        ]);
        assert_eq!(h.hash("what do ya want for nothing?"), expected);
    }
}
