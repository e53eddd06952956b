//! Access token broker
//!
//! A QR code only carries a drop id. Every fetch without a live token is
//! answered with a freshly minted one, and only a token-bearing request gets
//! through, so the printed URL can never act as a durable link.
//!
//! Token lifecycle:
//!
//! ```text
//! minted ──redeem──> redeemed (record deleted)
//!    │
//!    └──deadline──> expired (rejected on redeem, deleted by the sweep)
//! ```

use std::time::Duration;

use crate::{
    env::{Environment, duration_millis},
    error::DropError,
    model::{AccessToken, DropId, TokenValue},
    storage::DropStore,
};

/// Outcome of an access request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessGrant {
    /// A fresh token was minted
    Minted(AccessToken),
    /// The presented token is still live for this drop; nothing was minted
    AlreadyValid,
}

/// Mints and redeems single-use access tokens.
#[derive(Debug, Clone)]
pub struct TokenBroker<E, S> {
    env: E,
    store: S,
    ttl: Duration,
}

impl<E: Environment, S: DropStore> TokenBroker<E, S> {
    /// Broker minting tokens that live for `ttl`.
    pub fn new(env: E, store: S, ttl: Duration) -> Self {
        Self { env, store, ttl }
    }

    /// Mint a fresh token for `drop_id`.
    ///
    /// Does not touch the drop itself.
    pub fn mint(&self, drop_id: DropId) -> Result<AccessToken, DropError> {
        let token = AccessToken {
            token: TokenValue::random(&self.env),
            drop_id,
            expires_at_ms: self.env.wall_clock_millis().saturating_add(duration_millis(self.ttl)),
        };
        self.store.put_token(&token)?;

        tracing::debug!(%drop_id, expires_at_ms = token.expires_at_ms, "access token minted");
        Ok(token)
    }

    /// Mint unless `presented` is already a live token for `drop_id`.
    pub fn request_access(
        &self,
        drop_id: DropId,
        presented: Option<&TokenValue>,
    ) -> Result<AccessGrant, DropError> {
        if let Some(presented) = presented {
            let now_ms = self.env.wall_clock_millis();
            let live = self.store.load_token(presented)?.is_some_and(|t| t.unlocks(drop_id, now_ms));
            if live {
                return Ok(AccessGrant::AlreadyValid);
            }
        }

        self.mint(drop_id).map(AccessGrant::Minted)
    }

    /// Redeem a token, consuming it.
    ///
    /// # Errors
    ///
    /// - `AccessDenied`: absent, already redeemed, issued for another drop, or
    ///   past its deadline
    pub fn redeem(&self, drop_id: DropId, token: &TokenValue) -> Result<(), DropError> {
        let now_ms = self.env.wall_clock_millis();

        match self.store.take_token(token, drop_id)? {
            Some(taken) if !taken.is_expired(now_ms) => {
                tracing::debug!(%drop_id, "access token redeemed");
                Ok(())
            },
            Some(_) => {
                tracing::warn!(%drop_id, "expired access token presented");
                Err(DropError::AccessDenied)
            },
            None => {
                tracing::warn!(%drop_id, "unknown or foreign access token presented");
                Err(DropError::AccessDenied)
            },
        }
    }
}
