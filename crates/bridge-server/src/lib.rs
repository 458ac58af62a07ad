//! bridge-server library crate.
//!
//! This crate bridges client connections arriving on a single inherited
//! socket handle to a message broker embedded in the same process.  The
//! broker never listens on a network socket of its own; every accepted
//! client is paired with one in-process broker session and the two byte
//! streams are relayed verbatim in both directions.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Clients (broker wire protocol, opaque to the bridge)
//!         ↕
//! [bridge-server]
//!   ├── domain/           Pure types: ListenerSource, ServerConfig
//!   ├── application/      BridgeService: startup, shutdown coordination
//!   └── infrastructure/
//!         ├── listener/     Adapt an inherited descriptor, or bind directly
//!         ├── accept_loop/  Admit clients, pair each with a broker session
//!         ├── relay/        Bidirectional byte relay for one pair
//!         └── loopback/     In-process development broker (line echo)
//!         ↕
//! Embedded broker engine (behind the bridge_core::Broker facade)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no external dependencies (no I/O, no async, no frameworks).
//! - `application` depends on `domain`, `bridge-core`, and the entry points
//!   of `infrastructure`.
//! - `infrastructure` depends on all other layers plus `tokio`.
//!
//! # The deployment model
//!
//! In the sandboxed-host deployment the process never opens its own listening
//! socket: the host hands it a descriptor (conventionally fd 3) that is
//! already bound and listening, delivered in blocking mode.  The listener
//! adapter takes sole ownership of that descriptor, flips it non-blocking,
//! and wraps it as an ordinary async listener.  For direct deployment and
//! tests the same accept loop runs over a normally bound listener instead —
//! nothing downstream of the adapter knows the difference.

/// Domain layer: pure configuration types (no I/O).
pub mod domain;

/// Application layer: service orchestration and shutdown coordination.
pub mod application;

/// Infrastructure layer: listener adapters, accept loop, relay, loopback broker.
pub mod infrastructure;
