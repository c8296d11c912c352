//! In-process `ConnectionHub` that records broker commands instead of
//! sending them.
//!
//! Failures and broker-side closes can be injected, which makes it the
//! double used by the output test suites.

use amqp_types::{Arguments, ExchangeKind, Publishing};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::barrier::{ConnectionRef, UsageRef, WaitGroup};
use crate::channel::{BrokerChannel, ExchangeDeclareOptions, QueueDeclareOptions, QueueInfo};
use crate::close::{close_signal, CloseNotifier, CloseReason, CloseSignal};
use crate::error::{Error, Result};
use crate::hub::{ChannelLease, ConnectionHub, Dialer};

/// A broker command as seen by the `MemoryHub`.
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerCall {
    ExchangeDeclare {
        name: String,
        kind: ExchangeKind,
        options: ExchangeDeclareOptions,
        args: Arguments,
    },
    QueueDeclare {
        name: String,
        options: QueueDeclareOptions,
        args: Arguments,
    },
    QueueBind {
        queue: String,
        routing_key: String,
        exchange: String,
    },
    Publish {
        exchange: String,
        routing_key: String,
        publishing: Publishing,
    },
    ChannelClose,
}

#[derive(Default)]
struct State {
    calls: Vec<BrokerCall>,
    publish_attempts: usize,
    channels_opened: usize,
    hub_closes: usize,
    fail_get_channel: bool,
    fail_exchange_declare: bool,
    fail_queue_declare: bool,
    fail_queue_bind: bool,
    fail_publish_at: Option<usize>,
    close_after_publishes: Option<usize>,
    notifiers: Vec<CloseNotifier>,
    /// Closed flags of channels a close has not reached yet.
    open_channels: Vec<Arc<AtomicBool>>,
    connection: Option<ConnectionRef>,
}

/// Cloneable handle; all clones share the same recorded state.
#[derive(Clone, Default)]
pub struct MemoryHub {
    state: Arc<Mutex<State>>,
    usage: WaitGroup,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn fail_get_channel(&self) {
        self.state().fail_get_channel = true;
    }

    pub fn fail_exchange_declare(&self) {
        self.state().fail_exchange_declare = true;
    }

    pub fn fail_queue_declare(&self) {
        self.state().fail_queue_declare = true;
    }

    pub fn fail_queue_bind(&self) {
        self.state().fail_queue_bind = true;
    }

    /// Fail the `n`th publish attempt (1-based).
    pub fn fail_publish_at(&self, n: usize) {
        self.state().fail_publish_at = Some(n);
    }

    /// Close the channel right after the `n`th successful publish.
    pub fn close_after_publishes(&self, n: usize) {
        self.state().close_after_publishes = Some(n);
    }

    /// Simulate the broker closing every open channel. Closed channels
    /// refuse further commands with `Error::Closed`. Returns how many close
    /// signals were actually delivered.
    pub fn fire_close(&self) -> usize {
        fire(&self.state)
    }

    pub fn calls(&self) -> Vec<BrokerCall> {
        self.state().calls.clone()
    }

    /// Successful publishes as `(exchange, routing_key, publishing)`.
    pub fn publishes(&self) -> Vec<(String, String, Publishing)> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                BrokerCall::Publish {
                    exchange,
                    routing_key,
                    publishing,
                } => Some((exchange.clone(), routing_key.clone(), publishing.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn exchange_declares(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| matches!(call, BrokerCall::ExchangeDeclare { .. }))
            .count()
    }

    pub fn channels_opened(&self) -> usize {
        self.state().channels_opened
    }

    /// Channels whose usage reference has not been released yet.
    pub fn usage_in_flight(&self) -> usize {
        self.usage.count()
    }

    /// Number of `ConnectionHub::close` requests received.
    pub fn hub_closes(&self) -> usize {
        self.state().hub_closes
    }
}

fn fire(state: &Mutex<State>) -> usize {
    let notifiers: Vec<CloseNotifier> = {
        let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
        for closed in state.open_channels.drain(..) {
            closed.store(true, Ordering::SeqCst);
        }
        state.notifiers.drain(..).collect()
    };
    notifiers
        .iter()
        .filter(|notifier| {
            notifier.notify(Some(CloseReason {
                code: 320,
                text: "CONNECTION_FORCED - broker forced connection closure".to_string(),
            }))
        })
        .count()
}

#[async_trait]
impl ConnectionHub for MemoryHub {
    async fn get_channel(&self, url: &str, _dialer: &Dialer) -> Result<ChannelLease> {
        if !url.starts_with("amqp://") && !url.starts_with("amqps://") {
            return Err(Error::InvalidUrl(url.to_string()));
        }

        let closed = Arc::new(AtomicBool::new(false));
        let connection = {
            let mut state = self.state();
            if state.fail_get_channel {
                return Err(Error::Channel("injected failure".to_string()));
            }
            state.channels_opened += 1;
            state.open_channels.push(Arc::clone(&closed));
            state.connection.get_or_insert_with(ConnectionRef::new).clone()
        };

        Ok(ChannelLease {
            channel: Box::new(MemoryChannel {
                state: Arc::clone(&self.state),
                closed,
            }),
            usage: UsageRef::acquire(&self.usage),
            connection,
        })
    }

    async fn close(&self, _url: &str, connection: &ConnectionRef) {
        let retiring = {
            let mut state = self.state();
            state.hub_closes += 1;
            match state.connection.take() {
                Some(current) if current.same_connection(connection) => Some(current),
                other => {
                    state.connection = other;
                    None
                }
            }
        };

        if let Some(connection) = retiring {
            let usage = self.usage.clone();
            tokio::spawn(async move {
                usage.wait().await;
                connection.complete();
            });
        }
    }
}

struct MemoryChannel {
    state: Arc<Mutex<State>>,
    closed: Arc<AtomicBool>,
}

impl MemoryChannel {
    /// Lock the shared state, or fail the way a closed channel does.
    fn open_state(&self, command: &str) -> Result<MutexGuard<'_, State>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Closed(format!("{command} on closed channel")));
        }
        Ok(self.state.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl BrokerChannel for MemoryChannel {
    async fn exchange_declare(
        &self,
        name: &str,
        kind: ExchangeKind,
        options: ExchangeDeclareOptions,
        args: &Arguments,
    ) -> Result<()> {
        let mut state = self.open_state("exchange.declare")?;
        if state.fail_exchange_declare {
            return Err(Error::Declare(format!("exchange '{name}': injected failure")));
        }
        state.calls.push(BrokerCall::ExchangeDeclare {
            name: name.to_string(),
            kind,
            options,
            args: args.clone(),
        });
        Ok(())
    }

    async fn queue_declare(
        &self,
        name: &str,
        options: QueueDeclareOptions,
        args: &Arguments,
    ) -> Result<QueueInfo> {
        let mut state = self.open_state("queue.declare")?;
        if state.fail_queue_declare {
            return Err(Error::Declare(format!("queue '{name}': injected failure")));
        }
        state.calls.push(BrokerCall::QueueDeclare {
            name: name.to_string(),
            options,
            args: args.clone(),
        });
        Ok(QueueInfo {
            name: name.to_string(),
            ..Default::default()
        })
    }

    async fn queue_bind(
        &self,
        queue: &str,
        routing_key: &str,
        exchange: &str,
        _no_wait: bool,
        _args: &Arguments,
    ) -> Result<()> {
        let mut state = self.open_state("queue.bind")?;
        if state.fail_queue_bind {
            return Err(Error::Bind(format!("{queue} -> {exchange}: injected failure")));
        }
        state.calls.push(BrokerCall::QueueBind {
            queue: queue.to_string(),
            routing_key: routing_key.to_string(),
            exchange: exchange.to_string(),
        });
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        _mandatory: bool,
        _immediate: bool,
        publishing: Publishing,
    ) -> Result<()> {
        let close_now = {
            let mut state = self.open_state("basic.publish")?;
            state.publish_attempts += 1;
            let attempt = state.publish_attempts;
            if state.fail_publish_at == Some(attempt) {
                return Err(Error::Publish(format!("injected failure on publish {attempt}")));
            }
            state.calls.push(BrokerCall::Publish {
                exchange: exchange.to_string(),
                routing_key: routing_key.to_string(),
                publishing,
            });
            state.close_after_publishes == Some(attempt)
        };

        if close_now {
            fire(&self.state);
        }
        Ok(())
    }

    fn notify_close(&self) -> CloseSignal {
        let (notifier, signal) = close_signal();
        if self.closed.load(Ordering::SeqCst) {
            notifier.notify(Some(CloseReason {
                code: 504,
                text: "CHANNEL_ERROR - channel already closed".to_string(),
            }));
        } else {
            self.state().notifiers.push(notifier);
        }
        signal
    }

    async fn close(&self) -> Result<()> {
        self.state().calls.push(BrokerCall::ChannelClose);
        Ok(())
    }
}
