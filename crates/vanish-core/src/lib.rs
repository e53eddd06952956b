//! Vanish core: ephemeral drops.
//!
//! A drop is one piece of shareable content (file, bundle, text or links) with
//! a policy saying when it stops being retrievable. This crate holds the drop
//! logic and nothing else: no sockets, no files, no clock of its own.
//!
//! # Architecture
//!
//! ```text
//!              ┌──────────────────────────────┐
//! request ───▶ │ DropService                  │
//!              │   TokenBroker   (tokens)     │
//!              │   ExpiryEngine  (lifetime)   │
//!              │   PasswordGate  (clearance)  │
//!              └──────┬──────────────┬────────┘
//!                     ▼              ▼
//!                DropStore      ObjectStore
//! ```
//!
//! Time and randomness come from an [`Environment`], so the whole service runs
//! under a virtual clock in tests and the real one in production.
//!
//! # Components
//!
//! - [`DropService`]: create, fetch, verify password, download, delete, check
//! - [`TokenBroker`]: single-use access tokens
//! - [`ExpiryEngine`]: lazy expiry checks, cascading deletion, sweep
//! - [`PasswordGate`]: password hashing and per-session clearance
//! - [`Deadline`]: commit latch for callers that time out
//! - [`storage`]: backend traits, in-memory backends and URL signing

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod broker;
mod config;
mod deadline;
pub mod env;
mod error;
mod expiry;
mod gate;
pub mod model;
mod service;
pub mod storage;

pub use broker::{AccessGrant, TokenBroker};
pub use config::ServiceConfig;
pub use deadline::Deadline;
pub use env::Environment;
pub use error::{DropError, StorageError};
pub use expiry::{Access, ExpiryEngine, ExpiryReason, SweepReport, expiry_reason};
pub use gate::PasswordGate;
pub use service::DropService;
