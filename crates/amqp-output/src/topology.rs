//! Exchange, queue and binding declarations.

use amqp_hub::{BrokerChannel, ExchangeDeclareOptions, QueueDeclareOptions};
use amqp_types::{AmqpOutputConfig, Arguments};
use std::collections::HashSet;
use tracing::debug;

/// Declare `name` as an exchange with the configured type and flags.
pub(crate) async fn declare_exchange(
    channel: &dyn BrokerChannel,
    name: &str,
    config: &AmqpOutputConfig,
) -> amqp_hub::Result<()> {
    channel
        .exchange_declare(
            name,
            config.exchange_type,
            ExchangeDeclareOptions {
                durable: config.exchange_durability,
                auto_delete: config.exchange_auto_delete,
                internal: false,
                no_wait: false,
            },
            &Arguments::new(),
        )
        .await
}

/// Identifiers whose exchange/queue/binding already exist on the broker.
///
/// Declarations are idempotent for unchanged parameters, so each identifier
/// only needs one round trip per output lifetime.
#[derive(Debug, Default)]
pub(crate) struct QueueCache {
    declared: HashSet<String>,
}

impl QueueCache {
    /// Make sure exchange, queue and binding named `identifier` exist.
    pub(crate) async fn ensure(
        &mut self,
        channel: &dyn BrokerChannel,
        config: &AmqpOutputConfig,
        identifier: &str,
    ) -> amqp_hub::Result<()> {
        if self.declared.contains(identifier) {
            return Ok(());
        }

        declare_exchange(channel, identifier, config).await?;

        let queue = channel
            .queue_declare(
                identifier,
                QueueDeclareOptions {
                    durable: config.queue_durability,
                    auto_delete: config.queue_auto_delete,
                    exclusive: config.queue_exclusive,
                    no_wait: false,
                },
                &config.queue_arguments(),
            )
            .await?;
        debug!(
            "Declared queue {} ({} messages, {} consumers)",
            queue.name, queue.messages, queue.consumers
        );

        channel
            .queue_bind(identifier, identifier, identifier, false, &Arguments::new())
            .await?;

        self.declared.insert(identifier.to_string());
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.declared.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amqp_hub::{BrokerCall, ConnectionHub, Dialer, MemoryHub};
    use amqp_types::{ArgumentValue, ExchangeKind};

    fn dynamic_config() -> AmqpOutputConfig {
        AmqpOutputConfig {
            url: "amqp://localhost/".to_string(),
            exchange_type: ExchangeKind::Topic,
            queue: true,
            queue_durability: true,
            queue_ttl: 60_000,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_ensure_declares_once_per_identifier() {
        let hub = MemoryHub::new();
        let lease = hub
            .get_channel("amqp://localhost/", &Dialer::default())
            .await
            .unwrap();
        let config = dynamic_config();
        let mut cache = QueueCache::default();

        cache.ensure(lease.channel.as_ref(), &config, "orders").await.unwrap();
        cache.ensure(lease.channel.as_ref(), &config, "orders").await.unwrap();
        assert_eq!(cache.len(), 1);

        let calls = hub.calls();
        assert_eq!(calls.len(), 3);
        assert!(matches!(
            &calls[0],
            BrokerCall::ExchangeDeclare { name, kind: ExchangeKind::Topic, .. } if name == "orders"
        ));
        match &calls[1] {
            BrokerCall::QueueDeclare {
                name,
                options,
                args,
            } => {
                assert_eq!(name, "orders");
                assert!(options.durable);
                assert!(options.auto_delete);
                assert!(!options.exclusive);
                assert_eq!(args.get("x-message-ttl"), Some(&ArgumentValue::Int(60_000)));
            }
            other => panic!("expected queue declare, got {other:?}"),
        }
        assert_eq!(
            calls[2],
            BrokerCall::QueueBind {
                queue: "orders".to_string(),
                routing_key: "orders".to_string(),
                exchange: "orders".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_failed_bind_is_not_cached() {
        let hub = MemoryHub::new();
        hub.fail_queue_bind();
        let lease = hub
            .get_channel("amqp://localhost/", &Dialer::default())
            .await
            .unwrap();
        let mut cache = QueueCache::default();

        let result = cache
            .ensure(lease.channel.as_ref(), &dynamic_config(), "orders")
            .await;
        assert!(matches!(result, Err(amqp_hub::Error::Bind(_))));
        assert_eq!(cache.len(), 0);
    }
}
