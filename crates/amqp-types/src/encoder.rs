//! Turning a pack into the bytes that get published.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::EncodeError;
use crate::pipeline::PipelinePack;

/// Encodes a pack into a message body.
///
/// `Ok(None)` means there is nothing to send for this pack; it is not an error.
pub trait Encoder: Send + Sync {
    fn encode(&self, pack: &PipelinePack) -> Result<Option<Vec<u8>>, EncodeError>;
}

/// Serializes the whole message as a JSON object.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

impl Encoder for JsonEncoder {
    fn encode(&self, pack: &PipelinePack) -> Result<Option<Vec<u8>>, EncodeError> {
        Ok(Some(serde_json::to_vec(&pack.message)?))
    }
}

/// Sends only the message payload. Empty payloads produce nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadEncoder;

impl Encoder for PayloadEncoder {
    fn encode(&self, pack: &PipelinePack) -> Result<Option<Vec<u8>>, EncodeError> {
        if pack.message.payload.is_empty() {
            return Ok(None);
        }
        Ok(Some(pack.message.payload.clone().into_bytes()))
    }
}

/// Encoder selection by name in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncoderKind {
    #[default]
    Json,
    Payload,
}

impl EncoderKind {
    pub fn build(self) -> Arc<dyn Encoder> {
        match self {
            EncoderKind::Json => Arc::new(JsonEncoder),
            EncoderKind::Payload => Arc::new(PayloadEncoder),
        }
    }
}
