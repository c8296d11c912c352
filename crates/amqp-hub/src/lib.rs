//! Broker-facing side of amqp-relay.
//!
//! Physical AMQP connections are expensive and shared: every output that
//! points at the same broker URL gets its own channel over one connection.
//! This crate owns that sharing.
//!
//! - `ConnectionHub` hands out channels keyed by URL and tears connections
//!   down once nobody uses them
//! - `BrokerChannel` is the small set of broker commands an output needs
//! - `WaitGroup`, `UsageRef` and `ConnectionRef` are the counting barriers
//!   that sequence teardown
//! - `CloseSignal` reports broker-initiated channel closure
//!
//! `LapinHub` is the production implementation. `MemoryHub` records calls in
//! memory and is what the test suites run against.

/// Counting barriers used to sequence connection teardown
pub mod barrier;

/// Broker channel trait and declaration options
pub mod channel;

/// One-shot notification of broker-side channel closure
pub mod close;
pub mod error;

/// Connection hub trait, channel leases and dial options
pub mod hub;
pub mod lapin_hub;
pub mod memory;

pub use barrier::{ConnectionRef, UsageRef, WaitGroup};
pub use channel::{BrokerChannel, ExchangeDeclareOptions, QueueDeclareOptions, QueueInfo};
pub use close::{close_signal, CloseNotifier, CloseReason, CloseSignal};
pub use error::{Error, Result};
pub use hub::{ChannelLease, ConnectionHub, Dialer, TlsIdentity, TlsSettings};
pub use lapin_hub::{LapinChannel, LapinHub};
pub use memory::{BrokerCall, MemoryHub};
