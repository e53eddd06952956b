//! Simulated environment: virtual clock and seeded RNG.
//!
//! Time only moves when a test calls [`SimEnv::advance`] or something awaits
//! [`Environment::sleep`]. The same seed always yields the same drop ids,
//! tokens and keys, so a failing run can be replayed exactly.

use std::{
    ops::Sub,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use vanish_core::env::Environment;

/// Default wall-clock origin: 2023-11-14T22:13:20Z.
pub const DEFAULT_EPOCH_MS: u64 = 1_700_000_000_000;

/// Instant on the virtual clock (time since the environment was created).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimInstant(Duration);

impl Sub for SimInstant {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Duration {
        self.0.saturating_sub(rhs.0)
    }
}

struct SimState {
    elapsed: Duration,
    epoch_ms: u64,
    rng: ChaCha20Rng,
}

/// Deterministic [`Environment`].
///
/// Clones share the clock and the RNG, so a service and the test driving it
/// observe the same time.
#[derive(Clone)]
pub struct SimEnv {
    state: Arc<Mutex<SimState>>,
}

impl SimEnv {
    /// Environment seeded with `seed`, starting at [`DEFAULT_EPOCH_MS`].
    pub fn with_seed(seed: u64) -> Self {
        Self::starting_at(seed, DEFAULT_EPOCH_MS)
    }

    /// Environment seeded with `seed`, with the wall clock at `epoch_ms`.
    pub fn starting_at(seed: u64, epoch_ms: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                elapsed: Duration::ZERO,
                epoch_ms,
                rng: ChaCha20Rng::seed_from_u64(seed),
            })),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut state = self.state();
        state.elapsed = state.elapsed.saturating_add(by);
    }

    /// Time since creation.
    pub fn elapsed(&self) -> Duration {
        self.state().elapsed
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        // A panicking test thread must not take the clock down with it.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Environment for SimEnv {
    type Instant = SimInstant;

    fn now(&self) -> Self::Instant {
        SimInstant(self.state().elapsed)
    }

    fn wall_clock_millis(&self) -> u64 {
        let state = self.state();
        let elapsed_ms = u64::try_from(state.elapsed.as_millis()).unwrap_or(u64::MAX);
        state.epoch_ms.saturating_add(elapsed_ms)
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        let env = self.clone();
        async move {
            tokio::time::sleep(duration).await;
            env.advance(duration);
        }
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.state().rng.fill_bytes(buffer);
    }
}
