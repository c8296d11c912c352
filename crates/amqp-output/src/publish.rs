use amqp_hub::BrokerChannel;
use amqp_types::{AmqpOutputConfig, Encoder, PackRecycler, PipelinePack, Publishing};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::output::{RunStats, Termination};
use crate::topology::QueueCache;

/// The steady-state record loop of a running output.
///
/// Packs are handled strictly in arrival order, one publish at a time.
pub(crate) struct PublishLoop<'a> {
    pub(crate) config: &'a AmqpOutputConfig,
    pub(crate) channel: &'a dyn BrokerChannel,
    pub(crate) encoder: &'a dyn Encoder,
    pub(crate) recycler: &'a dyn PackRecycler,
    pub(crate) queues: QueueCache,
    pub(crate) stats: &'a mut RunStats,
}

impl PublishLoop<'_> {
    /// Consume `input` until it closes or `stop` is cancelled.
    ///
    /// A publish or declaration failure ends the loop with that error; it is
    /// not retried. A failure on a channel the broker has already closed ends
    /// the loop as `BrokerClosed` instead, whether or not the close watcher
    /// has cancelled `stop` yet.
    pub(crate) async fn run(
        &mut self,
        input: &mut mpsc::Receiver<PipelinePack>,
        stop: &CancellationToken,
    ) -> Result<Termination> {
        loop {
            let pack = tokio::select! {
                biased;
                _ = stop.cancelled() => return Ok(Termination::BrokerClosed),
                next = input.recv() => match next {
                    Some(pack) => pack,
                    None => return Ok(Termination::InputExhausted),
                },
            };
            match self.process(pack).await {
                Ok(()) => {}
                Err(e) if stop.is_cancelled() || e.is_channel_closed() => {
                    debug!("Broker command failed after channel close: {e}");
                    return Ok(Termination::BrokerClosed);
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn process(&mut self, pack: PipelinePack) -> Result<()> {
        let queue = if self.config.queue {
            match self.declare_queue_for(&pack).await {
                Ok(name) => Some(name),
                Err(e) => {
                    self.recycler.recycle(pack);
                    return Err(e);
                }
            }
        } else {
            None
        };

        let encoded = self.encoder.encode(&pack);
        // The pack's storage is reused as soon as it is back in the pool.
        self.recycler.recycle(pack);

        let body = match encoded {
            Ok(Some(body)) if !body.is_empty() => body,
            Ok(_) => {
                self.stats.skipped += 1;
                return Ok(());
            }
            Err(e) => {
                error!("Error encoding message: {e}");
                self.stats.encode_failures += 1;
                return Ok(());
            }
        };

        let publishing = Publishing::new(
            self.config.delivery_mode(),
            &self.config.content_type,
            body,
        );
        let (exchange, routing_key) = match &queue {
            Some(name) => (name.as_str(), name.as_str()),
            None => (self.config.exchange.as_str(), self.config.routing_key.as_str()),
        };

        self.channel
            .publish(exchange, routing_key, false, false, publishing)
            .await?;
        self.stats.published += 1;
        debug!("Published message to exchange '{exchange}' with routing key '{routing_key}'");
        Ok(())
    }

    /// Declare the exchange/queue/binding named by the pack's logger.
    async fn declare_queue_for(&mut self, pack: &PipelinePack) -> Result<String> {
        let name = &pack.message.logger;
        if name.is_empty() {
            return Err(Error::MissingQueueName(pack.message.uuid.to_string()));
        }
        self.queues.ensure(self.channel, self.config, name).await?;
        Ok(name.clone())
    }
}
