use amqp_hub::{BrokerChannel, ConnectionHub, ConnectionRef, UsageRef};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::watcher;

/// Everything an output holds on a leased channel once `run` has started.
pub(crate) struct Teardown {
    pub(crate) channel: Box<dyn BrokerChannel>,
    pub(crate) usage: UsageRef,
    pub(crate) connection: ConnectionRef,
    pub(crate) watcher: JoinHandle<()>,
    pub(crate) stop: CancellationToken,
}

impl Teardown {
    /// Release the channel and wait for the shared connection to drain.
    ///
    /// Consumes `self`, so it runs once per `run` no matter how the publish
    /// loop ended. Nothing here is retried; a broker that already closed the
    /// channel is expected and only logged.
    pub(crate) async fn run(self, hub: &dyn ConnectionHub, url: &str) {
        let Teardown {
            channel,
            usage,
            connection,
            watcher,
            stop,
        } = self;

        if let Err(e) = channel.close().await {
            debug!("Channel close during shutdown: {e}");
        }
        usage.release();

        hub.close(url, &connection).await;
        connection.wait().await;

        watcher::drain(watcher, &stop).await;
        info!("AMQP output shut down");
    }
}
