//! Password hashing for the drop password gate
//!
//! New hashes are Argon2id PHC strings. Records written before hashing existed
//! store the password itself; [`verify_password`] still accepts those through
//! a constant-time comparison.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Size of the random salt consumed by [`hash_password`].
pub const PASSWORD_SALT_SIZE: usize = 16;

/// PHC prefix shared by every hash this module produces.
const PHC_PREFIX: &str = "$argon2";

/// Errors from password hashing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordError {
    /// Work-factor parameters rejected by Argon2
    #[error("invalid password hashing parameters: {0}")]
    InvalidParams(String),

    /// Hashing itself failed
    #[error("password hashing failed: {0}")]
    Hash(String),
}

/// Argon2id work factor.
///
/// The default matches Argon2's recommended interactive cost (19 MiB, two
/// passes, one lane).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordParams {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes
    pub iterations: u32,
    /// Degree of parallelism
    pub parallelism: u32,
}

impl PasswordParams {
    /// Explicit work factor.
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Self {
        Self { memory_kib, iterations, parallelism }
    }
}

impl Default for PasswordParams {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

/// Hash a password into an Argon2id PHC string.
///
/// The caller provides the salt so hashing stays deterministic under test.
pub fn hash_password(
    password: &str,
    salt: [u8; PASSWORD_SALT_SIZE],
    params: &PasswordParams,
) -> Result<String, PasswordError> {
    let argon_params = Params::new(params.memory_kib, params.iterations, params.parallelism, None)
        .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let salt = SaltString::encode_b64(&salt).map_err(|e| PasswordError::Hash(e.to_string()))?;
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::Hash(e.to_string()))?;

    Ok(hash.to_string())
}

/// Check a password against a stored value.
///
/// PHC strings are verified with the parameters they carry. Anything else is a
/// legacy unhashed record and is compared in constant time. A malformed PHC
/// string never verifies.
pub fn verify_password(password: &str, stored: &str) -> bool {
    if stored.starts_with(PHC_PREFIX) {
        let Ok(parsed) = PasswordHash::new(stored) else {
            return false;
        };
        return Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok();
    }

    password.as_bytes().ct_eq(stored.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> PasswordParams {
        PasswordParams::new(64, 1, 1)
    }

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("correct horse", [7u8; PASSWORD_SALT_SIZE], &cheap()).unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("battery staple", &hash));
    }

    #[test]
    fn hash_never_contains_password() {
        let hash = hash_password("hunter2hunter2", [1u8; PASSWORD_SALT_SIZE], &cheap()).unwrap();
        assert!(!hash.contains("hunter2"));
    }

    #[test]
    fn different_salts_produce_different_hashes() {
        let a = hash_password("pw", [1u8; PASSWORD_SALT_SIZE], &cheap()).unwrap();
        let b = hash_password("pw", [2u8; PASSWORD_SALT_SIZE], &cheap()).unwrap();

        assert_ne!(a, b);
        assert!(verify_password("pw", &a));
        assert!(verify_password("pw", &b));
    }

    #[test]
    fn work_factor_is_recorded() {
        let hash =
            hash_password("pw", [3u8; PASSWORD_SALT_SIZE], &PasswordParams::new(128, 2, 1))
                .unwrap();
        assert!(hash.contains("m=128,t=2,p=1"));
    }

    #[test]
    fn invalid_params_rejected() {
        let result = hash_password("pw", [0u8; PASSWORD_SALT_SIZE], &PasswordParams::new(1, 0, 0));
        assert!(matches!(result, Err(PasswordError::InvalidParams(_))));
    }

    #[test]
    fn legacy_plaintext_record_still_verifies() {
        assert!(verify_password("letmein", "letmein"));
        assert!(!verify_password("letmein", "letmeout"));
        assert!(!verify_password("letmein", "letmein "));
    }

    #[test]
    fn malformed_phc_never_verifies() {
        assert!(!verify_password("$argon2id$garbage", "$argon2id$garbage"));
    }
}
