//! Handler registry and dispatch.
//!
//! The registry maps method names to a handler and an optional
//! [`Checker`]. It is filled once at startup and then shared read-only
//! with the subscription; there is no way to remove a method.
//!
//! Dispatch has two entry points:
//!
//! - [`HandlerRegistry::dispatch`] takes an already decoded record and
//!   reports [`RpcError::UnknownMethod`] or [`RpcError::Handler`] directly.
//! - [`HandlerRegistry::intake`] takes a raw message body, as delivered by
//!   the queue transport, and wraps decode failures in
//!   [`RpcError::InvalidMessage`] and dispatch failures in
//!   [`RpcError::DispatchFailed`].
//!
//! No lock is held across dispatches. Two records for the same method may
//! run interleaved if the transport delivers them concurrently.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

use bytes::Bytes;

use super::Checker;
use crate::content::RpcContent;
use crate::error::{BoxError, Result, RpcError};

/// Result type for handler functions.
pub type HandlerResult = std::result::Result<(), BoxError>;

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait for handler functions.
pub trait Handler: Send + Sync + 'static {
    /// Handle a decoded record.
    fn call(&self, rpc: RpcContent) -> BoxFuture<'static, HandlerResult>;
}

/// Adapter turning an async closure into a [`Handler`].
pub struct FnHandler<F, Fut>
where
    F: Fn(RpcContent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    handler: F,
    _phantom: PhantomData<fn() -> Fut>,
}

impl<F, Fut> FnHandler<F, Fut>
where
    F: Fn(RpcContent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    /// Create a new closure handler.
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<F, Fut> Handler for FnHandler<F, Fut>
where
    F: Fn(RpcContent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, rpc: RpcContent) -> BoxFuture<'static, HandlerResult> {
        Box::pin((self.handler)(rpc))
    }
}

/// Registered checker and handler for one method.
pub struct HandlerEntry {
    checker: Option<Checker>,
    handler: Box<dyn Handler>,
}

impl HandlerEntry {
    /// The admission gate, if any.
    pub fn checker(&self) -> Option<&Checker> {
        self.checker.as_ref()
    }

    /// The handler.
    pub fn handler(&self) -> &dyn Handler {
        self.handler.as_ref()
    }
}

impl fmt::Debug for HandlerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerEntry")
            .field("checker", &self.checker)
            .finish_non_exhaustive()
    }
}

/// What happened to a dispatched record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The handler ran to completion.
    Handled,
    /// The checker declined the record; the handler was not called.
    Declined,
}

/// Registry mapping method names to handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    methods: HashMap<String, HandlerEntry>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler that accepts every record for `method`.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::RegistrationConflict`] if `method` is taken.
    pub fn register<F, Fut>(&mut self, method: &str, handler: F) -> Result<()>
    where
        F: Fn(RpcContent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.insert(method, None, Box::new(FnHandler::new(handler)))
    }

    /// Register a handler gated by `checker`.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::RegistrationConflict`] if `method` is taken.
    pub fn register_checked<F, Fut>(
        &mut self,
        method: &str,
        checker: Checker,
        handler: F,
    ) -> Result<()>
    where
        F: Fn(RpcContent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.insert(method, Some(checker), Box::new(FnHandler::new(handler)))
    }

    /// Register a boxed handler with an optional checker.
    ///
    /// The existing entry is left untouched on conflict.
    pub fn insert(
        &mut self,
        method: &str,
        checker: Option<Checker>,
        handler: Box<dyn Handler>,
    ) -> Result<()> {
        if self.methods.contains_key(method) {
            return Err(RpcError::RegistrationConflict(method.to_string()));
        }

        tracing::debug!(
            "Registered handler for method {} (checker: {:?})",
            method,
            checker
        );
        self.methods
            .insert(method.to_string(), HandlerEntry { checker, handler });
        Ok(())
    }

    /// Get the entry for a method.
    pub fn lookup(&self, method: &str) -> Option<&HandlerEntry> {
        self.methods.get(method)
    }

    /// Whether a method has a handler.
    pub fn contains(&self, method: &str) -> bool {
        self.methods.contains_key(method)
    }

    /// Registered method names, in no particular order.
    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    /// Number of registered methods.
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Whether no method is registered.
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Dispatch a decoded record to its handler.
    ///
    /// 1. Resolve the method, failing with [`RpcError::UnknownMethod`].
    /// 2. Evaluate the checker, if any. A `false` answer returns
    ///    [`Dispatch::Declined`] without calling the handler.
    /// 3. Call the handler. A failure becomes [`RpcError::Handler`].
    pub async fn dispatch(&self, rpc: RpcContent) -> Result<Dispatch> {
        let Some(entry) = self.lookup(rpc.method()) else {
            tracing::warn!("No handler for method {} (sender {})", rpc.method(), rpc.sender());
            return Err(RpcError::UnknownMethod(rpc.method().to_string()));
        };

        if let Some(checker) = &entry.checker {
            if !checker.admit(&rpc).await {
                tracing::debug!(
                    "Checker declined method {} from sender {}",
                    rpc.method(),
                    rpc.sender()
                );
                return Ok(Dispatch::Declined);
            }
        }

        let method = rpc.method().to_string();
        match entry.handler.call(rpc).await {
            Ok(()) => Ok(Dispatch::Handled),
            Err(source) => {
                tracing::error!("Handler error for method {}: {}", method, source);
                Err(RpcError::Handler { method, source })
            }
        }
    }

    /// Decode a raw message body and dispatch it.
    ///
    /// # Errors
    ///
    /// - [`RpcError::InvalidMessage`] carrying the body if it does not decode
    ///   to a valid record.
    /// - [`RpcError::DispatchFailed`] wrapping the dispatch error otherwise.
    pub async fn intake(&self, body: Bytes) -> Result<Dispatch> {
        let rpc = match RpcContent::decode(&body) {
            Ok(rpc) => rpc,
            Err(e) => {
                tracing::warn!("Invalid message ({} bytes): {}", body.len(), e);
                return Err(RpcError::InvalidMessage {
                    body,
                    source: Box::new(e),
                });
            }
        };

        self.dispatch(rpc)
            .await
            .map_err(|e| RpcError::DispatchFailed(Box::new(e)))
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.methods.iter()).finish()
    }
}
