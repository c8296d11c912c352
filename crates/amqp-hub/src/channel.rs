use amqp_types::{Arguments, ExchangeKind, Publishing};
use async_trait::async_trait;

use crate::close::CloseSignal;
use crate::error::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExchangeDeclareOptions {
    pub durable: bool,
    pub auto_delete: bool,
    pub internal: bool,
    pub no_wait: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueDeclareOptions {
    pub durable: bool,
    pub auto_delete: bool,
    pub exclusive: bool,
    pub no_wait: bool,
}

/// Broker's answer to a queue declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueInfo {
    pub name: String,
    pub messages: u32,
    pub consumers: u32,
}

/// A logical AMQP channel.
///
/// Commands are issued one at a time by a single owner; implementations do
/// not need to support concurrent callers on the same channel.
#[async_trait]
pub trait BrokerChannel: Send + Sync {
    async fn exchange_declare(
        &self,
        name: &str,
        kind: ExchangeKind,
        options: ExchangeDeclareOptions,
        args: &Arguments,
    ) -> Result<()>;

    async fn queue_declare(
        &self,
        name: &str,
        options: QueueDeclareOptions,
        args: &Arguments,
    ) -> Result<QueueInfo>;

    /// Bind `queue` to `exchange` for messages carrying `routing_key`.
    async fn queue_bind(
        &self,
        queue: &str,
        routing_key: &str,
        exchange: &str,
        no_wait: bool,
        args: &Arguments,
    ) -> Result<()>;

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        mandatory: bool,
        immediate: bool,
        publishing: Publishing,
    ) -> Result<()>;

    /// Register for broker-side closure of this channel.
    fn notify_close(&self) -> CloseSignal;

    async fn close(&self) -> Result<()>;
}
