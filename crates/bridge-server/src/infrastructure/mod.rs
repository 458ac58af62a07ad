//! Infrastructure layer for bridge-server.
//!
//! The infrastructure layer handles all I/O: turning the configured listener
//! source into a live async listener, admitting client connections, pairing
//! each with an in-process broker session, and relaying bytes between the
//! two until either side closes.
//!
//! # Responsibilities
//!
//! - Adapting an inherited raw descriptor into a `tokio::net::TcpListener`
//!   (or binding one directly for tests and direct deployment)
//! - Running the accept loop and tracking in-flight bridges for drain
//! - Relaying bytes client ↔ session, full-duplex, until either side ends
//! - Hosting the loopback development broker used by the binary and tests
//!
//! # What does NOT belong here?
//!
//! - Startup/shutdown orchestration (that is the application layer)
//! - Configuration types (that is the domain layer)
//! - Any interpretation of the relayed bytes — the broker wire protocol is
//!   opaque to this entire crate

pub mod accept_loop;
pub mod listener;
pub mod loopback;
pub mod relay;

// Re-export the primary entry points so `main.rs` and the application layer
// can call them concisely.
pub use accept_loop::run_accept_loop;
pub use listener::{open_listener, AdaptError};
pub use loopback::LoopbackBroker;
