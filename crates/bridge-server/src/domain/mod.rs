//! Domain layer for bridge-server.
//!
//! The domain layer contains pure configuration types with no dependencies
//! on I/O, networking, or external frameworks.  This makes them easy to test
//! in isolation and trivial to construct in integration tests.
//!
//! # What belongs in the domain layer?
//!
//! - The listener-source selection (inherited descriptor vs. direct bind)
//! - The server configuration structure
//!
//! # What does NOT belong here?
//!
//! - Any `tokio` or `TcpListener` types
//! - Descriptor adaptation or socket syscalls (that is infrastructure)
//! - CLI or environment variable parsing (that is done in `main.rs`)

pub mod config;

// Re-export the commonly needed types at the domain module boundary so
// callers can write `domain::ServerConfig` instead of the longer path.
pub use config::{ListenerSource, ServerConfig, DEFAULT_INHERITED_FD};
