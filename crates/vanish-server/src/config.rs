//! Runtime configuration for the production server.

use std::{path::PathBuf, time::Duration};

use vanish_core::ServiceConfig;
use vanish_crypto::POINTER_SECRET_SIZE;

use crate::error::ServerError;

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:8080")
    pub bind_address: String,
    /// Public base URL, used when building temporary object URLs
    pub public_url: String,
    /// Directory holding the redb database and file blobs.
    ///
    /// `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,
    /// Key for signing temporary object URLs.
    ///
    /// `None` draws a random one at startup, which invalidates every URL
    /// issued before a restart.
    pub signing_secret: Option<[u8; POINTER_SECRET_SIZE]>,
    /// Time between sweep passes
    pub sweep_interval: Duration,
    /// How long one sweep pass may run before it is reported as stuck
    pub sweep_timeout: Duration,
    /// Upper bound on one request's storage work
    pub request_timeout: Duration,
    /// Drop service tunables (token TTL, retries, password cost)
    pub service: ServiceConfig,
}

impl ServerRuntimeConfig {
    /// Default sweep interval (10 minutes).
    pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);
    /// Default sweep pass timeout (1 minute).
    pub const DEFAULT_SWEEP_TIMEOUT: Duration = Duration::from_secs(60);
    /// Default per-request timeout (5 seconds).
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            public_url: "http://localhost:8080".to_string(),
            data_dir: None,
            signing_secret: None,
            sweep_interval: Self::DEFAULT_SWEEP_INTERVAL,
            sweep_timeout: Self::DEFAULT_SWEEP_TIMEOUT,
            request_timeout: Self::DEFAULT_REQUEST_TIMEOUT,
            service: ServiceConfig::default(),
        }
    }
}

/// Parse a hex-encoded URL signing secret.
///
/// # Errors
///
/// `ServerError::Config` unless the input is exactly
/// [`POINTER_SECRET_SIZE`] bytes of hex.
pub fn parse_signing_secret(hex_secret: &str) -> Result<[u8; POINTER_SECRET_SIZE], ServerError> {
    let bytes = hex::decode(hex_secret.trim())
        .map_err(|e| ServerError::Config(format!("signing secret is not hex: {e}")))?;
    <[u8; POINTER_SECRET_SIZE]>::try_from(bytes.as_slice()).map_err(|_| {
        ServerError::Config(format!(
            "signing secret must be {POINTER_SECRET_SIZE} bytes, got {}",
            bytes.len()
        ))
    })
}
