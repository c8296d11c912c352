//! AMQP output: publishes encoded pipeline records to a broker exchange.
//!
//! An `AmqpOutput` goes through the usual output lifecycle:
//!
//! 1. `init` validates the configuration, leases a channel from the
//!    `ConnectionHub` and, in static mode, declares the exchange
//! 2. `run` consumes packs until the input closes, the broker closes the
//!    channel, or a publish fails, then always runs the shutdown sequence
//! 3. `cleanup_for_restart` is a no-op
//!
//! In dynamic-per-message mode (`queue = true`) each message's `logger`
//! names an exchange, a queue and the binding between them, and the message
//! is published there instead of to the configured exchange.

pub mod error;
pub mod output;
pub mod runner;

mod publish;
mod shutdown;
mod topology;
mod watcher;

pub use error::{Error, Result};
pub use output::{AmqpOutput, RunStats, Termination};
pub use runner::{Output, OutputRunner};
