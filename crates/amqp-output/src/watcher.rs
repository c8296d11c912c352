use amqp_hub::CloseSignal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Wait for the broker to close the channel and then cancel `stop`.
///
/// Runs as its own task so a close is noticed even while the publish loop
/// is blocked inside a broker call. This task is the only reader of `close`.
pub(crate) fn spawn(close: CloseSignal, stop: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        match close.recv().await {
            Some(reason) => warn!("AMQP channel closed by broker: {reason}"),
            None => debug!("AMQP channel closed"),
        }
        stop.cancel();
    })
}

/// Make sure the watcher is gone without waiting on a close that may never come.
pub(crate) async fn drain(watcher: JoinHandle<()>, stop: &CancellationToken) {
    if !stop.is_cancelled() {
        watcher.abort();
    }
    match watcher.await {
        Ok(()) => {}
        Err(e) if e.is_cancelled() => debug!("Close watcher cancelled"),
        Err(e) => warn!("Close watcher failed: {e}"),
    }
    stop.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use amqp_hub::{close_signal, CloseReason};
    use std::time::Duration;

    #[tokio::test]
    async fn test_close_cancels_stop() {
        let (notifier, signal) = close_signal();
        let stop = CancellationToken::new();
        let watcher = spawn(signal, stop.clone());

        notifier.notify(Some(CloseReason {
            code: 320,
            text: "CONNECTION_FORCED".to_string(),
        }));
        // Second close is ignored.
        notifier.notify(None);

        tokio::time::timeout(Duration::from_secs(1), stop.cancelled())
            .await
            .expect("stop should be cancelled");
        drain(watcher, &stop).await;
    }

    #[tokio::test]
    async fn test_drain_without_close_does_not_block() {
        let (_notifier, signal) = close_signal();
        let stop = CancellationToken::new();
        let watcher = spawn(signal, stop.clone());

        tokio::time::timeout(Duration::from_secs(1), drain(watcher, &stop))
            .await
            .expect("drain must not wait for a close");
        assert!(stop.is_cancelled());
    }
}
