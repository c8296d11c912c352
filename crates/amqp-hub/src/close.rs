use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;

/// Why the broker closed a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub code: u16,
    pub text: String,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.text)
    }
}

/// Create a linked notifier/signal pair.
pub fn close_signal() -> (CloseNotifier, CloseSignal) {
    let (tx, rx) = oneshot::channel();
    (
        CloseNotifier {
            tx: Arc::new(Mutex::new(Some(tx))),
        },
        CloseSignal { rx },
    )
}

/// Sending half, held by whoever observes the broker connection.
///
/// Only the first `notify` is delivered; later calls are no-ops.
#[derive(Debug, Clone)]
pub struct CloseNotifier {
    tx: Arc<Mutex<Option<oneshot::Sender<Option<CloseReason>>>>>,
}

impl CloseNotifier {
    /// Fire the signal. Returns `false` if it had already fired.
    pub fn notify(&self, reason: Option<CloseReason>) -> bool {
        let sender = self
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match sender {
            // The receiver may already be gone; the close still counts as delivered.
            Some(tx) => {
                let _ = tx.send(reason);
                true
            }
            None => false,
        }
    }

    pub fn is_notified(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

/// Receiving half. Consumed by `recv`, so it can only be awaited once.
#[derive(Debug)]
pub struct CloseSignal {
    rx: oneshot::Receiver<Option<CloseReason>>,
}

impl CloseSignal {
    /// Resolve when the channel closes.
    ///
    /// `None` means a graceful close, or that every notifier was dropped,
    /// which also means nobody is watching the channel any more.
    pub async fn recv(self) -> Option<CloseReason> {
        self.rx.await.ok().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_notify_wins() {
        let (notifier, signal) = close_signal();
        let reason = CloseReason {
            code: 320,
            text: "CONNECTION_FORCED".to_string(),
        };

        assert!(notifier.notify(Some(reason.clone())));
        assert!(!notifier.clone().notify(None));
        assert!(notifier.is_notified());

        assert_eq!(signal.recv().await, Some(reason));
    }

    #[tokio::test]
    async fn test_dropped_notifier_resolves_signal() {
        let (notifier, signal) = close_signal();
        drop(notifier);
        assert_eq!(signal.recv().await, None);
    }
}
