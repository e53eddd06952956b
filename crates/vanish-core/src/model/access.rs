//! Short-lived access records: single-use tokens and password clearances.

use serde::{Deserialize, Serialize};

use super::ids::{DropId, SessionId, TokenValue};

/// A minted, not yet redeemed access token.
///
/// Redeeming removes the record, so a token exists in storage exactly as long
/// as it is usable or until the sweep collects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    /// Token value handed to the viewer
    pub token: TokenValue,
    /// Drop this token unlocks
    pub drop_id: DropId,
    /// Wall-clock deadline in Unix milliseconds
    pub expires_at_ms: u64,
}

impl AccessToken {
    /// A token is dead from its deadline onwards.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }

    /// Live token issued for `drop_id`.
    pub fn unlocks(&self, drop_id: DropId, now_ms: u64) -> bool {
        self.drop_id == drop_id && !self.is_expired(now_ms)
    }
}

/// Evidence that one session passed a drop's password gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clearance {
    /// Drop whose password was verified
    pub drop_id: DropId,
    /// Session that verified it
    pub session: SessionId,
    /// Wall-clock deadline in Unix milliseconds
    pub expires_at_ms: u64,
}

impl Clearance {
    /// A clearance is dead from its deadline onwards.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }
}
