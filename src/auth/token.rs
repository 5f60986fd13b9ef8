use anyhow::Context;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{rngs::OsRng, RngCore};

/// Size of a freshly issued remember token, in bytes of entropy.
pub const REMEMBER_TOKEN_BYTES: usize = 32;

/// `n` bytes from the OS CSPRNG.
pub fn bytes(n: usize) -> anyhow::Result<Vec<u8>> {
    let mut buf = vec![0u8; n];
    OsRng
        .try_fill_bytes(&mut buf)
        .context("read from os rng")?;
    Ok(buf)
}

/// `n` random bytes as unpadded URL-safe base64, usable verbatim as a
/// cookie value.
pub fn string(n: usize) -> anyhow::Result<String> {
    Ok(URL_SAFE_NO_PAD.encode(bytes(n)?))
}

pub fn remember_token() -> anyhow::Result<String> {
    string(REMEMBER_TOKEN_BYTES)
}

/// Number of bytes encoded in an unpadded URL-safe base64 string.
pub fn n_bytes(encoded: &str) -> Result<usize, base64::DecodeError> {
    Ok(URL_SAFE_NO_PAD.decode(encoded)?.len())
}
