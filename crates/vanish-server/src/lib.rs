//! Vanish production server.
//!
//! Wraps [`vanish_core`]'s synchronous drop logic with real I/O: system time
//! and OS randomness, durable storage, a scheduled sweeper and an HTTP
//! surface.
//!
//! # Architecture
//!
//! ```text
//!   HTTP (axum) ──spawn_blocking──▶ DropService<SystemEnv, S, O>
//!                                        │
//!   Sweeper (tokio task) ──sweep()──────┘
//! ```
//!
//! # Components
//!
//! - [`Server`]: binds a listener and runs the router and the sweeper
//! - [`http::router`]: the axum routes
//! - [`Sweeper`]: periodic expiry sweep
//! - [`storage`]: redb, filesystem and fault-injecting backends
//! - [`SystemEnv`]: production environment (real time, crypto RNG)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
pub mod http;
pub mod storage;
mod sweeper;
mod system_env;

use std::{future::Future, net::SocketAddr};

pub use config::{ServerRuntimeConfig, parse_signing_secret};
pub use error::ServerError;
pub use sweeper::{Sweeper, SweeperHandle};
pub use system_env::SystemEnv;
use tokio::net::TcpListener;
use vanish_core::{
    DropService, Environment,
    storage::{DropStore, ObjectStore, PointerSigner},
};

/// Production Vanish server.
///
/// Generic over the storage backends so the same runtime serves from memory
/// or from disk.
pub struct Server<S, O> {
    service: DropService<SystemEnv, S, O>,
    listener: TcpListener,
    config: ServerRuntimeConfig,
}

impl<S: DropStore, O: ObjectStore> Server<S, O> {
    /// Create the drop service and bind the listener.
    ///
    /// # Errors
    ///
    /// `ServerError::Io` if the address cannot be bound.
    pub async fn bind(
        config: ServerRuntimeConfig,
        env: SystemEnv,
        store: S,
        objects: O,
    ) -> Result<Self, ServerError> {
        let service = DropService::new(env, store, objects, config.service);
        let listener = TcpListener::bind(&config.bind_address).await?;

        Ok(Self { service, listener, config })
    }

    /// Address the listener is bound to.
    ///
    /// # Errors
    ///
    /// `ServerError::Io` if the socket cannot report its address.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// The drop service behind the routes.
    pub fn service(&self) -> &DropService<SystemEnv, S, O> {
        &self.service
    }

    /// Serve until Ctrl-C.
    ///
    /// # Errors
    ///
    /// `ServerError::Io` if the listener fails.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await
    }

    /// Serve until `shutdown` resolves, then stop the sweeper.
    ///
    /// # Errors
    ///
    /// `ServerError::Io` if the listener fails.
    pub async fn run_until(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        tracing::info!("Server listening on {}", self.listener.local_addr()?);

        let sweeper = Sweeper::start(
            self.service.clone(),
            self.config.sweep_interval,
            self.config.sweep_timeout,
        );
        let app = http::router(self.service, self.config.request_timeout);

        let served = axum::serve(self.listener, app).with_graceful_shutdown(shutdown).await;

        let passes = sweeper.stop().await?;
        tracing::info!(sweeps = passes, "Server stopped");
        served.map_err(ServerError::from)
    }
}

/// URL signer for `config`, with a random secret when none is configured.
pub fn pointer_signer<E: Environment>(config: &ServerRuntimeConfig, env: &E) -> PointerSigner {
    let secret = config.signing_secret.unwrap_or_else(|| {
        tracing::warn!("No signing secret configured - object URLs will not survive a restart");
        env.random_array()
    });
    PointerSigner::new(config.public_url.clone(), secret)
}
