//! Queue transport abstraction.
//!
//! The transport moves opaque message bodies between named topics. It
//! knows nothing about RPC records; delivery, acknowledgment and retry are
//! its own business. A broker client (AMQP or otherwise) plugs in by
//! implementing [`QueueTransport`].
//!
//! [`MemoryBroker`] is an in-process implementation used by the demos and
//! the test suite.

mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::ConnectionOptions;
use crate::error::Result;
use crate::handler::{BoxFuture, Dispatch};

pub use memory::{MemoryBroker, MemorySubscription, Rejected};

/// Callback invoked for every message delivered on a subscribed topic.
///
/// An `Err` tells the transport the message was not processed; what it
/// does with that (nack, requeue, dead-letter, log) is up to the transport.
pub type MessageCallback = Arc<dyn Fn(Bytes) -> BoxFuture<'static, Result<Dispatch>> + Send + Sync>;

/// Handle for an active subscription.
#[async_trait]
pub trait Subscription: Send + Sync {
    /// Topic this subscription listens on.
    fn topic(&self) -> &str;

    /// Stop delivery to the callback and release it.
    ///
    /// Completes once the transport has unsubscribed.
    async fn cancel(&mut self) -> Result<()>;
}

/// Publish/subscribe primitives consumed by [`RpcManager`](crate::RpcManager).
///
/// This trait is object-safe (`Arc<dyn QueueTransport>`).
#[async_trait]
pub trait QueueTransport: Send + Sync + 'static {
    /// Subscribe `callback` to `topic`.
    ///
    /// Only options that are set in `options` override transport defaults.
    async fn subscribe(
        &self,
        topic: &str,
        callback: MessageCallback,
        options: &ConnectionOptions,
    ) -> Result<Box<dyn Subscription>>;

    /// Send `body` to `topic`. Best effort.
    async fn publish(&self, topic: &str, body: Bytes, options: &ConnectionOptions) -> Result<()>;
}
