//! Broker-agnostic publish envelope and declaration arguments.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Whether the broker should persist a message to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    #[default]
    Transient,
    Persistent,
}

impl DeliveryMode {
    pub fn from_persistent(persistent: bool) -> Self {
        if persistent {
            DeliveryMode::Persistent
        } else {
            DeliveryMode::Transient
        }
    }

    /// AMQP 0-9-1 `delivery-mode` property value.
    pub fn as_amqp(self) -> u8 {
        match self {
            DeliveryMode::Transient => 1,
            DeliveryMode::Persistent => 2,
        }
    }
}

/// A single message ready to be handed to a broker channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Publishing {
    pub delivery_mode: DeliveryMode,
    pub timestamp: DateTime<Utc>,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl Publishing {
    /// Build an envelope stamped with the current time.
    pub fn new(delivery_mode: DeliveryMode, content_type: &str, body: Vec<u8>) -> Self {
        Self {
            delivery_mode,
            timestamp: Utc::now(),
            content_type: content_type.to_string(),
            body,
        }
    }
}

/// Value of an optional declaration argument (e.g. `x-message-ttl`).
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentValue {
    Int(i32),
    Long(i64),
    Bool(bool),
    Text(String),
}

/// Extra arguments passed with exchange/queue/binding declarations.
pub type Arguments = BTreeMap<String, ArgumentValue>;
