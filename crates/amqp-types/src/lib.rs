//! Shared types for the amqp-relay publish engine.
//!
//! This crate has no broker dependency. It defines:
//!
//! - **Configuration**: `AmqpOutputConfig`, loaded from TOML and validated once
//! - **Pipeline records**: `Message`, `PipelinePack` and the `PackRecycler` pool contract
//! - **Encoders**: the `Encoder` trait plus JSON and raw-payload implementations
//! - **Envelopes**: `Publishing` and `DeliveryMode`, the broker-agnostic publish payload
//!
//! Both `amqp-hub` (broker side) and `amqp-output` (engine side) depend on
//! this crate, never the other way around.

pub mod config;
pub mod encoder;
pub mod error;
pub mod pipeline;
pub mod publishing;

pub use config::{AmqpOutputConfig, ExchangeKind, TlsConfig, QUEUE_TTL_UNDEFINED};
pub use encoder::{Encoder, EncoderKind, JsonEncoder, PayloadEncoder};
pub use error::{ConfigError, EncodeError};
pub use pipeline::{Message, PackPool, PackRecycler, PipelinePack};
pub use publishing::{ArgumentValue, Arguments, DeliveryMode, Publishing};
