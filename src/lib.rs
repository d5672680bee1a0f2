//! # mq-rpc
//!
//! Fire-and-forget RPC dispatch over a message queue.
//!
//! A caller publishes a MessagePack-encoded [`RpcContent`] to the topic
//! `rpc.<recipient>`. The recipient's [`RpcManager`] decodes it, looks up
//! the handler registered for the method, runs the optional [`Checker`]
//! and calls the handler. There is no reply envelope.
//!
//! ## Architecture
//!
//! - **Content** ([`content`], [`codec`]): the 4-field record and its wire format
//! - **Registry** ([`handler`]): method → (checker, handler), dispatch and intake
//! - **Lifecycle** ([`RpcManager`]): one subscription per manager, connect/cancel
//! - **Transport** ([`transport`]): the broker seam, plus an in-process broker
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use mq_rpc::{MemoryBroker, RpcContent, RpcManager};
//!
//! #[tokio::main]
//! async fn main() -> mq_rpc::Result<()> {
//!     let broker = Arc::new(MemoryBroker::new());
//!
//!     let mut listener = RpcManager::new("nixos", broker.clone());
//!     listener.register_handler("hello", |rpc: RpcContent| async move {
//!         println!("hello from {}", rpc.sender());
//!         Ok(())
//!     })?;
//!     listener.connect().await?;
//!
//!     let sender = RpcManager::new("pi", broker);
//!     sender.send("nixos", &RpcContent::new("pi", "hello")).await?;
//!
//!     listener.cancel().await
//! }
//! ```

pub mod codec;
pub mod config;
pub mod content;
pub mod error;
pub mod handler;
pub mod transport;

mod manager;

pub use config::{ConnectionOptions, RpcConfig};
pub use content::{Kwargs, RpcContent};
pub use error::{BoxError, Result, RpcError, ValidationField};
pub use handler::{Checker, Dispatch, HandlerRegistry};
pub use manager::{topic_for, RpcManager, TOPIC_PREFIX};
pub use transport::{MemoryBroker, QueueTransport, Subscription};

// Re-exported so callers can build kwargs without a direct dependency.
pub use rmpv::Value;
