use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// An async counting barrier.
///
/// `add` raises the count, `done` lowers it, and `wait` resolves once the
/// count is zero. All mutation is atomic; the count never wraps below zero.
#[derive(Debug, Clone, Default)]
pub struct WaitGroup {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    count: AtomicUsize,
    notify: Notify,
}

impl WaitGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, n: usize) {
        self.inner.count.fetch_add(n, Ordering::SeqCst);
    }

    pub fn done(&self) {
        let previous =
            self.inner
                .count
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                    count.checked_sub(1)
                });
        match previous {
            Ok(1) => self.inner.notify.notify_waiters(),
            Ok(_) => {}
            Err(_) => tracing::warn!("WaitGroup::done called on a zero count, ignoring"),
        }
    }

    pub fn count(&self) -> usize {
        self.inner.count.load(Ordering::SeqCst)
    }

    /// Wait until the count reaches zero.
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent `done` cannot slip between.
            notified.as_mut().enable();
            if self.count() == 0 {
                return;
            }
            notified.await;
        }
    }

    pub fn ptr_eq(&self, other: &WaitGroup) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// One unit of usage on a shared connection.
///
/// Acquiring increments the connection's usage barrier; `release` (or drop)
/// decrements it exactly once.
#[derive(Debug)]
pub struct UsageRef {
    group: Option<WaitGroup>,
}

impl UsageRef {
    pub fn acquire(group: &WaitGroup) -> Self {
        group.add(1);
        Self {
            group: Some(group.clone()),
        }
    }

    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(group) = self.group.take() {
            group.done();
        }
    }
}

impl Drop for UsageRef {
    fn drop(&mut self) {
        self.release_inner();
    }
}

/// Handle on the "logical connection in use" barrier.
///
/// The hub creates one per physical connection with a count of one and calls
/// `complete` after the connection is fully closed. Outputs clone it and
/// `wait` during shutdown.
#[derive(Debug, Clone)]
pub struct ConnectionRef {
    group: WaitGroup,
}

impl ConnectionRef {
    pub fn new() -> Self {
        let group = WaitGroup::new();
        group.add(1);
        Self { group }
    }

    pub fn complete(&self) {
        self.group.done();
    }

    pub fn is_complete(&self) -> bool {
        self.group.count() == 0
    }

    pub async fn wait(&self) {
        self.group.wait().await
    }

    /// Whether both handles refer to the same physical connection.
    pub fn same_connection(&self, other: &ConnectionRef) -> bool {
        self.group.ptr_eq(&other.group)
    }
}

impl Default for ConnectionRef {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_returns_immediately_at_zero() {
        let wg = WaitGroup::new();
        tokio::time::timeout(Duration::from_secs(1), wg.wait())
            .await
            .expect("wait should not block on an empty group");
    }

    #[tokio::test]
    async fn test_wait_blocks_until_done() {
        let wg = WaitGroup::new();
        wg.add(2);

        let waiter = {
            let wg = wg.clone();
            tokio::spawn(async move { wg.wait().await })
        };

        wg.done();
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        wg.done();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish")
            .unwrap();
    }

    #[test]
    fn test_done_never_wraps() {
        let wg = WaitGroup::new();
        wg.done();
        assert_eq!(wg.count(), 0);
    }

    #[test]
    fn test_usage_ref_releases_once() {
        let wg = WaitGroup::new();
        let usage = UsageRef::acquire(&wg);
        let other = UsageRef::acquire(&wg);
        assert_eq!(wg.count(), 2);

        usage.release();
        assert_eq!(wg.count(), 1);

        drop(other);
        assert_eq!(wg.count(), 0);
    }

    #[tokio::test]
    async fn test_connection_ref() {
        let conn = ConnectionRef::new();
        let clone = conn.clone();
        assert!(conn.same_connection(&clone));
        assert!(!conn.same_connection(&ConnectionRef::new()));
        assert!(!conn.is_complete());

        clone.complete();
        assert!(conn.is_complete());
        conn.wait().await;
    }
}
