//! Password gate
//!
//! Hashes creation passwords with fresh salt and records per-session
//! clearances once a viewer proves they know the password.

use std::time::Duration;

use vanish_crypto::{PASSWORD_SALT_SIZE, PasswordParams, hash_password, verify_password};

use crate::{
    env::{Environment, duration_millis},
    error::DropError,
    model::{Clearance, DropRecord, SessionId},
    storage::DropStore,
};

/// Password hashing and per-session clearance.
#[derive(Debug, Clone)]
pub struct PasswordGate<E, S> {
    env: E,
    store: S,
    params: PasswordParams,
    clearance_ttl: Duration,
}

impl<E: Environment, S: DropStore> PasswordGate<E, S> {
    /// Gate hashing with `params` and granting clearances for `clearance_ttl`.
    pub fn new(env: E, store: S, params: PasswordParams, clearance_ttl: Duration) -> Self {
        Self { env, store, params, clearance_ttl }
    }

    /// Hash a creation password. Empty passwords are rejected.
    pub fn hash(&self, password: &str) -> Result<String, DropError> {
        if password.is_empty() {
            return Err(DropError::invalid("password must not be empty"));
        }
        let salt: [u8; PASSWORD_SALT_SIZE] = self.env.random_array();
        Ok(hash_password(password, salt, &self.params)?)
    }

    /// Check `password` against the drop and record a clearance on success.
    ///
    /// Drops without a password always pass and get no clearance.
    pub fn verify(
        &self,
        record: &DropRecord,
        password: &str,
        session: SessionId,
    ) -> Result<bool, DropError> {
        let Some(stored) = record.password_hash.as_deref() else {
            return Ok(true);
        };

        if !verify_password(password, stored) {
            tracing::warn!(drop_id = %record.id, "password verification failed");
            return Ok(false);
        }

        let clearance = Clearance {
            drop_id: record.id,
            session,
            expires_at_ms: self
                .env
                .wall_clock_millis()
                .saturating_add(duration_millis(self.clearance_ttl)),
        };
        self.store.put_clearance(&clearance)?;

        tracing::debug!(drop_id = %record.id, "password verified");
        Ok(true)
    }

    /// Whether `session` may see the content of `record`.
    ///
    /// # Errors
    ///
    /// - `PasswordRequired`: the drop has a password and the session has no
    ///   live clearance
    pub fn ensure_cleared(
        &self,
        record: &DropRecord,
        session: Option<SessionId>,
    ) -> Result<(), DropError> {
        if !record.is_password_protected() {
            return Ok(());
        }
        let Some(session) = session else {
            return Err(DropError::PasswordRequired);
        };

        let now_ms = self.env.wall_clock_millis();
        match self.store.load_clearance(record.id, session)? {
            Some(clearance) if !clearance.is_expired(now_ms) => Ok(()),
            _ => Err(DropError::PasswordRequired),
        }
    }
}
