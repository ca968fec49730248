// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Password and passcode hashing using Argon2id.
//!
//! Hashes are stored as PHC strings (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`),
//! so the parameters travel with each record.

use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use super::secrets::{random_bytes, SecretError};

const SALT_LEN: usize = 16;

/// Hash a secret with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, SecretError> {
    let salt: [u8; SALT_LEN] = random_bytes()?;
    let salt = SaltString::encode_b64(&salt).map_err(|e| SecretError::Hashing(e.to_string()))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| SecretError::Hashing(e.to_string()))
}

/// Verify a secret against a PHC-format hash.
///
/// Returns `Ok(true)` on match, `Ok(false)` on mismatch, or
/// `Err(SecretError::InvalidHash)` if the stored hash is malformed.
pub fn verify_password(password: &str, encoded: &str) -> Result<bool, SecretError> {
    let parsed = PasswordHash::new(encoded).map_err(|_| SecretError::InvalidHash)?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(_) => Err(SecretError::InvalidHash),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_password_matches() {
        let hash = hash_password("hunter2").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("hunter2", &hash).unwrap());
    }

    #[test]
    fn wrong_password_does_not_match() {
        let hash = hash_password("hunter2").unwrap();
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn salts_differ_between_hashes() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert_eq!(verify_password("x", "not-a-hash"), Err(SecretError::InvalidHash));
        assert_eq!(
            verify_password("x", "pbkdf2-sha256$100000$AAAA$AAAA"),
            Err(SecretError::InvalidHash)
        );
    }

    #[test]
    fn foreign_phc_algorithm_is_rejected() {
        let hash = "$scrypt$ln=15,r=8,p=1$c2FsdHNhbHQ$aGFzaGhhc2hoYXNoaGFzaA";
        assert!(verify_password("x", hash).is_err());
    }
}
