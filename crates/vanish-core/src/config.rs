//! Drop service configuration

use std::time::Duration;

use vanish_crypto::PasswordParams;

/// Tunables of the drop service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Lifetime of a minted access token
    pub token_ttl: Duration,
    /// Lifetime of a temporary object URL
    pub pointer_ttl: Duration,
    /// Lifetime of a password clearance
    pub clearance_ttl: Duration,
    /// Tries per storage operation before a transient error surfaces
    pub storage_attempts: u32,
    /// Argon2id work factor for new password hashes
    pub password: PasswordParams,
}

impl ServiceConfig {
    /// Default lifetime of access tokens (5 minutes).
    pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(5 * 60);
    /// Default lifetime of temporary object URLs (5 minutes).
    pub const DEFAULT_POINTER_TTL: Duration = Duration::from_secs(5 * 60);
    /// Default lifetime of password clearances (30 minutes).
    pub const DEFAULT_CLEARANCE_TTL: Duration = Duration::from_secs(30 * 60);
    /// Default storage attempts.
    pub const DEFAULT_STORAGE_ATTEMPTS: u32 = 3;
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            token_ttl: Self::DEFAULT_TOKEN_TTL,
            pointer_ttl: Self::DEFAULT_POINTER_TTL,
            clearance_ttl: Self::DEFAULT_CLEARANCE_TTL,
            storage_attempts: Self::DEFAULT_STORAGE_ATTEMPTS,
            password: PasswordParams::default(),
        }
    }
}
