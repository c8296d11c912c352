use amqp_hub::{BrokerChannel, CloseSignal, ConnectionHub, ConnectionRef, Dialer, LapinHub, UsageRef};
use amqp_types::{AmqpOutputConfig, PackRecycler};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::publish::PublishLoop;
use crate::runner::{Output, OutputRunner};
use crate::shutdown::Teardown;
use crate::topology::{declare_exchange, QueueCache};
use crate::watcher;

/// Name the output reports to the broker for its connection.
const CONNECTION_NAME: &str = "amqp-relay";

/// Why the publish loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The upstream input channel was closed.
    InputExhausted,
    /// The broker closed the channel or connection.
    BrokerClosed,
    /// A publish or declaration failed.
    Failed,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Termination::InputExhausted => "input exhausted",
            Termination::BrokerClosed => "broker closed channel",
            Termination::Failed => "broker command failed",
        };
        f.write_str(s)
    }
}

/// Counters for the most recent `run`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub termination: Option<Termination>,
    pub published: u64,
    pub encode_failures: u64,
    /// Packs the encoder had nothing to emit for.
    pub skipped: u64,
    /// Packs still queued on the input when the loop stopped.
    pub abandoned: u64,
}

/// A leased channel between `init` and `run`.
struct Session {
    channel: Box<dyn BrokerChannel>,
    usage: UsageRef,
    connection: ConnectionRef,
    close: CloseSignal,
}

/// Publishes pipeline packs to an AMQP exchange.
pub struct AmqpOutput {
    hub: Arc<dyn ConnectionHub>,
    config: Option<AmqpOutputConfig>,
    session: Option<Session>,
    stats: RunStats,
}

impl AmqpOutput {
    pub fn new(hub: Arc<dyn ConnectionHub>) -> Self {
        Self {
            hub,
            config: None,
            session: None,
            stats: RunStats::default(),
        }
    }

    /// Output backed by the process-wide `LapinHub`.
    pub fn with_lapin_hub() -> Self {
        Self::new(LapinHub::shared())
    }

    pub fn config(&self) -> Option<&AmqpOutputConfig> {
        self.config.as_ref()
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }
}

#[async_trait]
impl Output for AmqpOutput {
    type Config = AmqpOutputConfig;

    async fn init(&mut self, config: AmqpOutputConfig) -> Result<()> {
        if self.session.is_some() {
            return Err(Error::AlreadyInitialized);
        }
        config.validate()?;

        let dialer = Dialer::from_config(&config)?.with_connection_name(CONNECTION_NAME);
        let lease = self.hub.get_channel(&config.url, &dialer).await?;
        let close = lease.channel.notify_close();

        // Queue mode declares per message instead.
        if !config.queue {
            if let Err(e) = declare_exchange(lease.channel.as_ref(), &config.exchange, &config).await
            {
                lease.usage.release();
                return Err(e.into());
            }
        }

        info!(
            exchange = %config.exchange,
            exchange_type = %config.exchange_type,
            queue_mode = config.queue,
            "AMQP output initialized"
        );
        self.session = Some(Session {
            channel: lease.channel,
            usage: lease.usage,
            connection: lease.connection,
            close,
        });
        self.config = Some(config);
        Ok(())
    }

    async fn run(&mut self, runner: OutputRunner) -> Result<()> {
        let OutputRunner {
            mut input,
            encoder,
            recycler,
        } = runner;
        let Some(encoder) = encoder else {
            abandon_input(&mut input, recycler.as_ref());
            return Err(Error::EncoderRequired);
        };
        let (config, session) = match (self.config.as_ref(), self.session.take()) {
            (Some(config), Some(session)) => (config, session),
            (_, session) => {
                self.session = session;
                abandon_input(&mut input, recycler.as_ref());
                return Err(Error::NotInitialized);
            }
        };
        self.stats = RunStats::default();

        let stop = CancellationToken::new();
        let watcher = watcher::spawn(session.close, stop.clone());

        let outcome = PublishLoop {
            config,
            channel: session.channel.as_ref(),
            encoder: encoder.as_ref(),
            recycler: recycler.as_ref(),
            queues: QueueCache::default(),
            stats: &mut self.stats,
        }
        .run(&mut input, &stop)
        .await;

        let termination = match &outcome {
            Ok(termination) => *termination,
            Err(e) => {
                warn!("AMQP output stopping after error: {e}");
                Termination::Failed
            }
        };
        self.stats.termination = Some(termination);
        self.stats.abandoned = abandon_input(&mut input, recycler.as_ref());
        info!(
            published = self.stats.published,
            encode_failures = self.stats.encode_failures,
            skipped = self.stats.skipped,
            abandoned = self.stats.abandoned,
            "AMQP publish loop ended: {termination}"
        );

        Teardown {
            channel: session.channel,
            usage: session.usage,
            connection: session.connection,
            watcher,
            stop,
        }
        .run(self.hub.as_ref(), &config.url)
        .await;

        outcome.map(|_| ())
    }

    fn cleanup_for_restart(&mut self) {}
}

/// Close the input and hand any packs still queued back to the pool.
fn abandon_input(
    input: &mut mpsc::Receiver<amqp_types::PipelinePack>,
    recycler: &dyn PackRecycler,
) -> u64 {
    input.close();
    let mut count = 0;
    while let Ok(pack) = input.try_recv() {
        recycler.recycle(pack);
        count += 1;
    }
    count
}
