//! Subscription lifecycle and outbound sends.
//!
//! An [`RpcManager`] owns a [`HandlerRegistry`] and at most one
//! subscription on `rpc.<client_name>`. The lifecycle is:
//!
//! 1. Register handlers.
//! 2. [`connect`](RpcManager::connect) subscribes the registry's intake to
//!    the topic.
//! 3. [`cancel`](RpcManager::cancel) unsubscribes. Connecting again after
//!    that is allowed.
//!
//! While connected the registry is shared with the transport callback and
//! cannot be modified; registration fails with
//! [`RpcError::RegistryFrozen`] until the subscription is cancelled and
//! the transport has released the callback.
//!
//! Dropping a connected manager does not unsubscribe. Call `cancel` first.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use mq_rpc::{MemoryBroker, RpcContent, RpcManager};
//!
//! let broker = Arc::new(MemoryBroker::new());
//! let mut manager = RpcManager::new("nixos", broker);
//!
//! manager.register_handler("hello", |rpc: RpcContent| async move {
//!     println!("hello from {}", rpc.sender());
//!     Ok(())
//! })?;
//!
//! manager.connect().await?;
//! // ...
//! manager.cancel().await?;
//! ```

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use rmpv::Value;

use crate::config::{ConnectionOptions, RpcConfig};
use crate::content::{Kwargs, RpcContent};
use crate::error::{Result, RpcError};
use crate::handler::{BoxFuture, Checker, Dispatch, HandlerRegistry, HandlerResult};
use crate::transport::{MessageCallback, QueueTransport, Subscription};

/// Prefix of every RPC topic.
pub const TOPIC_PREFIX: &str = "rpc.";

/// Topic a client named `client_name` listens on.
pub fn topic_for(client_name: &str) -> String {
    format!("{}{}", TOPIC_PREFIX, client_name)
}

/// Registry plus a single subscription on `rpc.<client_name>`.
pub struct RpcManager {
    client_name: String,
    options: ConnectionOptions,
    transport: Arc<dyn QueueTransport>,
    registry: Arc<HandlerRegistry>,
    subscription: Option<Box<dyn Subscription>>,
}

impl RpcManager {
    /// Create an unconnected manager with default connection options.
    pub fn new(client_name: impl Into<String>, transport: Arc<dyn QueueTransport>) -> Self {
        Self {
            client_name: client_name.into(),
            options: ConnectionOptions::default(),
            transport,
            registry: Arc::new(HandlerRegistry::new()),
            subscription: None,
        }
    }

    /// Create an unconnected manager from a loaded config.
    pub fn from_config(config: RpcConfig, transport: Arc<dyn QueueTransport>) -> Self {
        Self::new(config.client_name, transport).with_options(config.connection)
    }

    /// Replace the connection options.
    pub fn with_options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the connection options used by the next `connect` and by sends.
    pub fn set_options(&mut self, options: ConnectionOptions) {
        self.options = options;
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    /// Topic this manager listens on.
    pub fn topic(&self) -> String {
        topic_for(&self.client_name)
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Whether a subscription is active.
    pub fn is_connected(&self) -> bool {
        self.subscription.is_some()
    }

    fn registry_mut(&mut self) -> Result<&mut HandlerRegistry> {
        Arc::get_mut(&mut self.registry).ok_or(RpcError::RegistryFrozen)
    }

    /// Register a handler that accepts every record for `method`.
    pub fn register_handler<F, Fut>(&mut self, method: &str, handler: F) -> Result<()>
    where
        F: Fn(RpcContent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.registry_mut()?.register(method, handler)
    }

    /// Register a handler gated by `checker`.
    pub fn register_checked<F, Fut>(&mut self, method: &str, checker: Checker, handler: F) -> Result<()>
    where
        F: Fn(RpcContent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.registry_mut()?.register_checked(method, checker, handler)
    }

    /// Dispatch a record directly, bypassing the transport.
    pub async fn dispatch(&self, rpc: RpcContent) -> Result<Dispatch> {
        self.registry.dispatch(rpc).await
    }

    /// Subscribe the registry to `rpc.<client_name>`.
    ///
    /// # Errors
    ///
    /// - [`RpcError::AlreadyBound`] if a subscription is active.
    /// - [`RpcError::Transport`] if the transport cannot subscribe; the
    ///   manager stays unconnected.
    pub async fn connect(&mut self) -> Result<()> {
        if self.subscription.is_some() {
            return Err(RpcError::AlreadyBound);
        }

        let registry = self.registry.clone();
        let callback: MessageCallback =
            Arc::new(move |body: Bytes| -> BoxFuture<'static, Result<Dispatch>> {
                let registry = registry.clone();
                Box::pin(async move { registry.intake(body).await })
            });

        let topic = self.topic();
        let subscription = self
            .transport
            .subscribe(&topic, callback, &self.options)
            .await?;

        tracing::debug!(
            "Listening on {} with {} method(s)",
            topic,
            self.registry.len()
        );
        self.subscription = Some(subscription);
        Ok(())
    }

    /// Cancel the active subscription, if any.
    ///
    /// Does nothing when not connected. If the transport fails to
    /// unsubscribe, the manager stays connected.
    pub async fn cancel(&mut self) -> Result<()> {
        if let Some(subscription) = self.subscription.as_mut() {
            subscription.cancel().await?;
            tracing::debug!("Stopped listening on {}", subscription.topic());
            self.subscription = None;
        }
        Ok(())
    }

    /// Publish an already built record to `rpc.<recipient>`.
    pub async fn send(&self, recipient: &str, rpc: &RpcContent) -> Result<()> {
        let body = rpc.encode()?;
        let topic = topic_for(recipient);
        tracing::debug!("Sending {} to {} ({} bytes)", rpc.method(), topic, body.len());
        self.transport
            .publish(&topic, Bytes::from(body), &self.options)
            .await
    }

    /// Build a record from this client and publish it to `rpc.<recipient>`.
    pub async fn call(
        &self,
        recipient: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: Kwargs,
    ) -> Result<()> {
        let rpc = RpcContent::new(self.client_name.as_str(), method)
            .with_args(args)
            .with_kwargs(kwargs);
        self.send(recipient, &rpc).await
    }
}
