//! Deterministic simulation harness for vanish testing.
//!
//! Provides [`SimEnv`], an [`Environment`](vanish_core::Environment) with a
//! virtual clock and a seeded RNG, plus fixtures that build a drop service
//! over in-memory backends, and [`FaultyStore`] for stalling or failing storage calls.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod faulty_store;
pub mod fixture;
pub mod sim_env;

pub use faulty_store::{FaultyStore, StoreCall};
pub use fixture::{SIM_BASE_URL, SimService, sim_service, test_config};
pub use sim_env::{DEFAULT_EPOCH_MS, SimEnv, SimInstant};
