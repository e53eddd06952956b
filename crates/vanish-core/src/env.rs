//! Time and randomness, injected.
//!
//! Every expiry decision compares against a clock and every token, key and id
//! comes from an RNG. Both are reached through [`Environment`] so the service
//! runs on a virtual clock with a seeded RNG under test and on the system
//! clock with OS entropy in production.

use std::time::Duration;

/// Source of time and randomness for the drop service.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - neither clock goes backwards
/// - `random_bytes()` draws from a cryptographically secure source in
///   production, since access tokens and master keys come from it
/// - methods do not fail short of exceptional conditions such as OS entropy
///   exhaustion
pub trait Environment: Clone + Send + Sync + 'static {
    /// Monotonic instant type.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current monotonic time. Only used to pace background work.
    fn now(&self) -> Self::Instant;

    /// Current wall-clock time as milliseconds since the Unix epoch.
    ///
    /// Every persisted timestamp and every expiry comparison uses this clock,
    /// so records stay meaningful across restarts.
    fn wall_clock_millis(&self) -> u64;

    /// Sleep for `duration`.
    ///
    /// The only async method here. Drop logic never calls it; the sweeper
    /// task does.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fill `buffer` with random bytes.
    ///
    /// Deterministic for a given seed in simulation.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Random `u64`.
    fn random_u64(&self) -> u64 {
        u64::from_be_bytes(self.random_array())
    }

    /// Random `u128`, the width of drop and session ids.
    fn random_u128(&self) -> u128 {
        u128::from_be_bytes(self.random_array())
    }

    /// Random fixed-size array: keys, salts, nonces, tokens.
    fn random_array<const N: usize>(&self) -> [u8; N] {
        let mut bytes = [0u8; N];
        self.random_bytes(&mut bytes);
        bytes
    }
}

/// Milliseconds in a duration, saturating at `u64::MAX`.
pub(crate) fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
