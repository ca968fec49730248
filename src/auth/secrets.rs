// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Random identifiers and one-time codes.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const HANDLE_PREFIX: &str = "CA";
const HANDLE_LEN: usize = 10;
const HANDLE_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecretError {
    #[error("system random generator failed")]
    Rng,

    #[error("stored hash is malformed")]
    InvalidHash,

    #[error("password hashing failed: {0}")]
    Hashing(String),
}

/// Fill a fixed-size buffer from the system CSPRNG.
pub fn random_bytes<const N: usize>() -> Result<[u8; N], SecretError> {
    let mut buf = [0u8; N];
    SystemRandom::new().fill(&mut buf).map_err(|_| SecretError::Rng)?;
    Ok(buf)
}

/// New opaque session id: 256 random bits, unpadded base64url.
pub fn new_session_id() -> Result<String, SecretError> {
    let bytes: [u8; 32] = random_bytes()?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Uniformly random decimal code of `digits` digits (zero-padded).
pub fn numeric_code(digits: u32) -> Result<String, SecretError> {
    let modulus = 10u32.pow(digits);
    let limit = u32::MAX - u32::MAX % modulus;
    loop {
        let value = u32::from_be_bytes(random_bytes()?);
        if value < limit {
            return Ok(format!("{:0width$}", value % modulus, width = digits as usize));
        }
    }
}

/// Account handle: `CA` followed by 10 characters from `A-Z0-9`.
pub fn account_handle() -> Result<String, SecretError> {
    // 252 = 36 * 7, keeps the draw unbiased
    const LIMIT: u8 = 252;
    let mut handle = String::with_capacity(HANDLE_PREFIX.len() + HANDLE_LEN);
    handle.push_str(HANDLE_PREFIX);
    while handle.len() < HANDLE_PREFIX.len() + HANDLE_LEN {
        let [byte]: [u8; 1] = random_bytes()?;
        if byte < LIMIT {
            handle.push(HANDLE_ALPHABET[(byte % 36) as usize] as char);
        }
    }
    Ok(handle)
}

/// Keyed digests of one-time codes so plaintext codes never reach storage.
#[derive(Clone)]
pub struct CodeDigester {
    key: Vec<u8>,
}

impl CodeDigester {
    pub fn new(key: &[u8]) -> Self {
        Self { key: key.to_vec() }
    }

    fn mac(&self, code: &str) -> HmacSha256 {
        // HMAC accepts keys of any length
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.key)
            .unwrap_or_else(|_| unreachable!("HMAC key length is unrestricted"));
        mac.update(code.as_bytes());
        mac
    }

    pub fn digest(&self, code: &str) -> String {
        Base64UrlUnpadded::encode_string(&self.mac(code).finalize().into_bytes())
    }

    /// Constant-time comparison against a stored digest.
    pub fn verify(&self, code: &str, digest: &str) -> bool {
        match Base64UrlUnpadded::decode_vec(digest) {
            Ok(expected) => self.mac(code).verify_slice(&expected).is_ok(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_256_bit_and_unique() {
        let a = new_session_id().unwrap();
        let b = new_session_id().unwrap();
        assert_ne!(a, b);
        assert_eq!(Base64UrlUnpadded::decode_vec(&a).unwrap().len(), 32);
    }

    #[test]
    fn numeric_code_has_requested_width() {
        for _ in 0..50 {
            let code = numeric_code(6).unwrap();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn account_handle_shape() {
        let handle = account_handle().unwrap();
        assert_eq!(handle.len(), 12);
        assert!(handle.starts_with("CA"));
        assert!(handle[2..]
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn code_digest_verifies_only_matching_code() {
        let digester = CodeDigester::new(b"key");
        let digest = digester.digest("123456");
        assert_ne!(digest, "123456");
        assert!(digester.verify("123456", &digest));
        assert!(!digester.verify("654321", &digest));
        assert!(!CodeDigester::new(b"other").verify("123456", &digest));
        assert!(!digester.verify("123456", "%%%"));
    }
}
