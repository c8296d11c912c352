//! amqp-relay library
//!
//! Publishes pipeline records to an AMQP 0-9-1 broker.
//!
//! # Crates
//!
//! - `amqp_types` - configuration, pipeline records, encoders and envelopes
//! - `amqp_hub` - shared broker connections, channels and close notification
//! - `amqp_output` - the publish engine (`AmqpOutput`)
//!
//! # CLI Usage
//!
//! ```bash
//! # Publish JSON-lines messages from a file
//! amqp-relay --config output.toml --input messages.jsonl
//!
//! # Publish from stdin
//! tail -F app.jsonl | amqp-relay --config output.toml
//! ```

pub mod relay;

pub use amqp_hub::{ConnectionHub, LapinHub, MemoryHub};
pub use amqp_output::{AmqpOutput, Output, OutputRunner, RunStats, Termination};
pub use amqp_types::{AmqpOutputConfig, EncoderKind, Message};
pub use relay::{read_messages, relay, ReadStats, RelaySummary};
