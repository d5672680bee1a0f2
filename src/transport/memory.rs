//! In-process queue transport.
//!
//! Every subscriber on a topic receives every message published to it.
//! `publish` awaits each subscriber's callback in subscription order, so
//! a message has been fully processed when `publish` returns. Callback
//! failures do not fail the publish; they are logged and kept as
//! [`Rejected`] entries, the way a broker would dead-letter a nacked
//! message. At most [`DEFAULT_REJECTED_CAPACITY`] entries are kept (see
//! [`MemoryBroker::with_rejected_capacity`]); the oldest is dropped first.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;

use super::{MessageCallback, QueueTransport, Subscription};
use crate::config::ConnectionOptions;
use crate::error::{Result, RpcError};

/// Default number of rejected deliveries kept before the oldest is dropped.
pub const DEFAULT_REJECTED_CAPACITY: usize = 1024;

/// A delivery whose callback returned an error.
#[derive(Debug)]
pub struct Rejected {
    /// Topic the message was published to.
    pub topic: String,
    /// Body as published.
    pub body: Bytes,
    /// Error returned by the subscriber.
    pub error: RpcError,
}

struct Subscriber {
    id: u64,
    callback: MessageCallback,
    options: ConnectionOptions,
}

struct BrokerInner {
    topics: Mutex<HashMap<String, Vec<Subscriber>>>,
    rejected: Mutex<VecDeque<Rejected>>,
    rejected_capacity: usize,
    next_id: AtomicU64,
    shut_down: AtomicBool,
}

impl BrokerInner {
    fn topics(&self) -> MutexGuard<'_, HashMap<String, Vec<Subscriber>>> {
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn rejected(&self) -> MutexGuard<'_, VecDeque<Rejected>> {
        self.rejected.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reject(&self, rejected: Rejected) {
        if self.rejected_capacity == 0 {
            return;
        }
        let mut log = self.rejected();
        if log.len() == self.rejected_capacity {
            log.pop_front();
        }
        log.push_back(rejected);
    }

    fn ensure_open(&self) -> Result<()> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(RpcError::Transport("broker is shut down".into()));
        }
        Ok(())
    }

    fn remove(&self, topic: &str, id: u64) {
        let mut topics = self.topics();
        if let Some(subscribers) = topics.get_mut(topic) {
            subscribers.retain(|s| s.id != id);
            if subscribers.is_empty() {
                topics.remove(topic);
            }
        }
    }
}

/// In-process broker. Clones share the same topics.
#[derive(Clone)]
pub struct MemoryBroker {
    inner: Arc<BrokerInner>,
}

impl MemoryBroker {
    /// Create a new broker with no topics.
    pub fn new() -> Self {
        Self::with_rejected_capacity(DEFAULT_REJECTED_CAPACITY)
    }

    /// Create a broker keeping at most `capacity` rejected deliveries.
    ///
    /// A capacity of 0 keeps none; rejections are then only logged.
    pub fn with_rejected_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                topics: Mutex::new(HashMap::new()),
                rejected: Mutex::new(VecDeque::new()),
                rejected_capacity: capacity,
                next_id: AtomicU64::new(0),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// Number of active subscribers on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner.topics().get(topic).map_or(0, Vec::len)
    }

    /// Connection options the subscribers on `topic` were created with.
    pub fn subscriber_options(&self, topic: &str) -> Vec<ConnectionOptions> {
        self.inner
            .topics()
            .get(topic)
            .map(|subs| subs.iter().map(|s| s.options.clone()).collect())
            .unwrap_or_default()
    }

    /// Drain the deliveries that subscribers rejected so far, oldest first.
    pub fn take_rejected(&self) -> Vec<Rejected> {
        self.inner.rejected().drain(..).collect()
    }

    /// Refuse every further subscribe and publish and drop all subscribers.
    pub fn shutdown(&self) {
        self.inner.shut_down.store(true, Ordering::Release);
        self.inner.topics().clear();
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueTransport for MemoryBroker {
    async fn subscribe(
        &self,
        topic: &str,
        callback: MessageCallback,
        options: &ConnectionOptions,
    ) -> Result<Box<dyn Subscription>> {
        self.inner.ensure_open()?;

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .topics()
            .entry(topic.to_string())
            .or_default()
            .push(Subscriber {
                id,
                callback,
                options: options.clone(),
            });

        let applied: Vec<&str> = options.explicit().into_iter().map(|(name, _)| name).collect();
        tracing::debug!(
            "Subscribed #{} to {} (applied options: {:?})",
            id,
            topic,
            applied
        );
        Ok(Box::new(MemorySubscription {
            broker: self.inner.clone(),
            topic: topic.to_string(),
            id,
            active: true,
        }))
    }

    async fn publish(&self, topic: &str, body: Bytes, _options: &ConnectionOptions) -> Result<()> {
        self.inner.ensure_open()?;

        let callbacks: Vec<MessageCallback> = self
            .inner
            .topics()
            .get(topic)
            .map(|subs| subs.iter().map(|s| s.callback.clone()).collect())
            .unwrap_or_default();

        if callbacks.is_empty() {
            tracing::debug!("No subscriber on {}, dropping {} bytes", topic, body.len());
            return Ok(());
        }

        for callback in callbacks {
            if let Err(error) = callback(body.clone()).await {
                tracing::warn!("Delivery on {} rejected: {}", topic, error);
                self.inner.reject(Rejected {
                    topic: topic.to_string(),
                    body: body.clone(),
                    error,
                });
            }
        }
        Ok(())
    }
}

/// Subscription handle returned by [`MemoryBroker`].
pub struct MemorySubscription {
    broker: Arc<BrokerInner>,
    topic: String,
    id: u64,
    active: bool,
}

#[async_trait]
impl Subscription for MemorySubscription {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn cancel(&mut self) -> Result<()> {
        if self.active {
            self.broker.remove(&self.topic, self.id);
            self.active = false;
            tracing::debug!("Unsubscribed #{} from {}", self.id, self.topic);
        }
        Ok(())
    }
}
