use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid broker URL: {0}")]
    InvalidUrl(String),

    #[error("TLS init error: {0}")]
    Tls(String),

    #[error("Failed to connect: {0}")]
    Dial(String),

    #[error("Failed to get channel: {0}")]
    Channel(String),

    #[error("Failed to declare {0}")]
    Declare(String),

    #[error("Failed to bind queue: {0}")]
    Bind(String),

    #[error("Failed to publish: {0}")]
    Publish(String),

    #[error("Channel closed: {0}")]
    Closed(String),
}

pub type Result<T> = std::result::Result<T, Error>;
