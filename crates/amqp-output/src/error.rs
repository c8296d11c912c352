use amqp_types::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Broker error: {0}")]
    Broker(#[from] amqp_hub::Error),

    #[error("Encoder required.")]
    EncoderRequired,

    #[error("Output has not been initialized")]
    NotInitialized,

    #[error("Output is already initialized")]
    AlreadyInitialized,

    #[error("Queue mode requires a logger on every message (message {0} has none)")]
    MissingQueueName(String),
}

impl Error {
    /// The broker had already closed the channel the command was sent on.
    pub fn is_channel_closed(&self) -> bool {
        matches!(self, Error::Broker(amqp_hub::Error::Closed(_)))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
