//! Application layer for bridge-server.
//!
//! The application layer orchestrates the bridge's lifecycle: it knows
//! *what* happens in which order (start the broker, wait for readiness, open
//! the listener, accept until shutdown, drain, stop), but delegates *how* to
//! the infrastructure layer.
//!
//! # Responsibilities
//!
//! - Startup sequencing and the fatal-error taxonomy ([`FatalError`])
//! - The shutdown coordinator: `Running → Draining → Stopped`
//! - Handing the embedding a programmatic shutdown trigger
//!
//! # What does NOT belong here?
//!
//! - Opening sockets or adapting descriptors (that is infrastructure)
//! - Relaying bytes (that is infrastructure)
//! - CLI parsing (that is `main.rs`)

pub mod service;

// Re-export so callers can write `application::BridgeService`.
pub use service::{BridgeService, FatalError, LifecycleState};
