//! Ready-made drop services for tests.

use std::time::Duration;

use vanish_core::{
    DropService, ServiceConfig,
    storage::{MemoryDropStore, MemoryObjectStore, PointerSigner},
};
use vanish_crypto::{POINTER_SECRET_SIZE, PasswordParams};

use crate::sim_env::SimEnv;

/// Public base URL used by simulated object stores.
pub const SIM_BASE_URL: &str = "http://vanish.test";

/// Default config with a cheap password hash so tests stay fast.
pub fn test_config() -> ServiceConfig {
    ServiceConfig { password: PasswordParams::new(64, 1, 1), ..ServiceConfig::default() }
}

/// A drop service over in-memory backends, with handles to everything.
#[derive(Clone)]
pub struct SimService {
    /// Shared virtual environment
    pub env: SimEnv,
    /// The service under test
    pub service: DropService<SimEnv, MemoryDropStore, MemoryObjectStore>,
    /// Metadata backend, for direct inspection
    pub store: MemoryDropStore,
    /// Blob backend, for direct inspection
    pub objects: MemoryObjectStore,
}

impl SimService {
    /// Move the virtual clock forward.
    pub fn advance(&self, by: Duration) {
        self.env.advance(by);
    }
}

/// Build a [`SimService`] seeded with `seed` and [`test_config`].
pub fn sim_service(seed: u64) -> SimService {
    let env = SimEnv::with_seed(seed);
    let store = MemoryDropStore::new();
    let objects = MemoryObjectStore::new(PointerSigner::new(SIM_BASE_URL, [0x5E; POINTER_SECRET_SIZE]));
    let service = DropService::new(env.clone(), store.clone(), objects.clone(), test_config());

    SimService { env, service, store, objects }
}
