//! Password hashing and verification.
//!
//! A verifier is the Argon2id-derived key and the salt it was derived with, both hex encoded and
//! joined with a `.`:
//!
//! ```text
//! 3f9c...e1 (64 hex chars, 32-byte key) . a07b...42 (32 hex chars, 16-byte salt)
//! ```
//!
//! The encoding does not carry the derivation parameters, so every verifier is produced and
//! checked with [`Argon2Params::default`]. Changing those parameters invalidates stored verifiers.

use argon2::{Algorithm, Argon2, Params, Version};
use once_cell::sync::Lazy;
use rand::prelude::RngExt;
use rand::rng;
use subtle::ConstantTimeEq;

use crate::errors::Error;

/// Length of the derived key in bytes.
pub const KEY_LEN: usize = 32;
/// Length of the per-verifier salt in bytes.
pub const SALT_LEN: usize = 16;

const DELIMITER: char = '.';

/// Argon2 hashing parameters.
#[derive(Debug, Clone, Copy)]
pub struct Argon2Params {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Argon2Params {
    /// Create Argon2 instance with these parameters.
    fn to_argon2(self) -> Result<Argon2<'static>, Error> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, Some(KEY_LEN)).map_err(|e| Error::Internal {
            operation: format!("create argon2 params: {e}"),
        })?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

impl Default for Argon2Params {
    /// Secure defaults for production (Argon2id RFC recommendations)
    fn default() -> Self {
        Self {
            memory_kib: 19456, // 19 MB
            iterations: 2,
            parallelism: 1,
        }
    }
}

fn derive_key(input: &str, salt: &[u8]) -> Result<[u8; KEY_LEN], Error> {
    let argon2 = Argon2Params::default().to_argon2()?;
    let mut key = [0u8; KEY_LEN];
    argon2.hash_password_into(input.as_bytes(), salt, &mut key).map_err(|e| Error::Internal {
        operation: format!("derive key: {e}"),
    })?;
    Ok(key)
}

/// Hash a password into a `<key>.<salt>` verifier using a fresh random salt.
pub fn hash_string(input: &str) -> Result<String, Error> {
    let mut salt = [0u8; SALT_LEN];
    rng().fill(&mut salt);

    let key = derive_key(input, &salt)?;
    Ok(format!("{}{DELIMITER}{}", hex::encode(key), hex::encode(salt)))
}

/// Verify a password against a stored verifier.
///
/// Anything that does not parse as a verifier yields `false`.
pub fn verify_string(input: &str, verifier: &str) -> bool {
    let Some((key_hex, salt_hex)) = verifier.split_once(DELIMITER) else {
        return false;
    };
    let (Ok(expected), Ok(salt)) = (hex::decode(key_hex), hex::decode(salt_hex)) else {
        return false;
    };
    if expected.len() != KEY_LEN || salt.is_empty() {
        return false;
    }

    match derive_key(input, &salt) {
        Ok(candidate) => candidate.as_slice().ct_eq(expected.as_slice()).into(),
        Err(e) => {
            tracing::warn!("Password verification failed to derive key: {e}");
            false
        }
    }
}

/// Verifier for a random throwaway password.
///
/// Login checks unknown usernames against this so both failure paths do the same amount of work.
static DUMMY_VERIFIER: Lazy<Option<String>> = Lazy::new(|| {
    let mut bytes = [0u8; 16];
    rng().fill(&mut bytes);
    hash_string(&hex::encode(bytes)).ok()
});

/// Burn one verification worth of CPU without a real verifier. Always returns `false`.
pub fn verify_dummy(input: &str) -> bool {
    if let Some(verifier) = DUMMY_VERIFIER.as_deref() {
        let _ = verify_string(input, verifier);
    }
    false
}

/// Hash off the async executor.
pub async fn hash_string_blocking(input: String) -> Result<String, Error> {
    tokio::task::spawn_blocking(move || hash_string(&input))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })?
}

/// Verify off the async executor. `None` checks against the dummy verifier and returns `false`.
pub async fn verify_string_blocking(input: String, verifier: Option<String>) -> Result<bool, Error> {
    tokio::task::spawn_blocking(move || match verifier {
        Some(verifier) => verify_string(&input, &verifier),
        None => verify_dummy(&input),
    })
    .await
    .map_err(|e| Error::Internal {
        operation: format!("spawn password verification task: {e}"),
    })
}
