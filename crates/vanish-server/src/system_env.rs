//! The real clock and OS entropy.
//!
//! Drop deadlines, token lifetimes and clearances are all persisted as
//! wall-clock milliseconds, so records written before a restart keep their
//! meaning after it. The monotonic clock only paces the sweeper.

use std::time::Duration;

use vanish_core::Environment;

/// Production environment using system time and cryptographic RNG.
///
/// # Security
///
/// The RNG uses getrandom which provides OS-level cryptographic randomness.
/// Access tokens and master keys come straight from it.
///
/// # Panics
///
/// Panics if the OS RNG fails. A drop server without working entropy would
/// hand out guessable tokens, so there is nothing sensible to continue with.
#[derive(Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    #[allow(clippy::disallowed_methods)]
    fn wall_clock_millis(&self) -> u64 {
        // A clock before 1970 reads as the epoch.
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer)
            .expect("invariant: OS RNG failure is unrecoverable - tokens would be guessable");
    }
}
