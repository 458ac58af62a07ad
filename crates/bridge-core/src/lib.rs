//! # bridge-core
//!
//! Shared foundation for SockBridge: the facade through which the bridge
//! talks to an embedded message broker, and the programmatic shutdown
//! primitive that coordinates teardown.
//!
//! # Architecture overview
//!
//! SockBridge relays client connections arriving on a single inherited socket
//! handle to a message-broker engine embedded in the same process.  The broker
//! never opens a network listener of its own; every client byte stream is
//! paired with an in-process session opened through the [`broker::Broker`]
//! facade and relayed verbatim in both directions.
//!
//! This crate defines the two seams that the server crate (and any out-of-tree
//! embedding) builds against:
//!
//! - **`broker`** – The [`broker::Broker`] trait: `start`, ready-wait, open
//!   internal session, `shutdown`, wait-for-shutdown.  The broker engine
//!   itself lives behind this trait; SockBridge never interprets the bytes a
//!   session carries.
//!
//! - **`shutdown`** – A one-way, idempotent cancellation handle.  The hosts
//!   this bridge is deployed under stop handling sockets correctly when the
//!   guest installs OS signal handlers, so shutdown is only ever triggered
//!   programmatically.  The outermost embedding decides what (if anything)
//!   gets wired to the trigger.
//!
//! This crate has no dependency on sockets, CLI parsing, or any concrete
//! broker engine.

pub mod broker;
pub mod shutdown;

// Re-export the most-used types at the crate root so callers can write
// `bridge_core::Broker` instead of `bridge_core::broker::Broker`.
pub use broker::{Broker, BrokerError, BrokerOptions};
pub use shutdown::{ShutdownController, ShutdownSignal};
