//! Handler module - method registry and dispatch.
//!
//! Provides:
//! - [`HandlerRegistry`] - maps method names to handlers and dispatches records
//! - [`Checker`] - optional per-method admission gate, sync or async
//!
//! # Example
//!
//! ```ignore
//! use mq_rpc::handler::{Checker, Dispatch, HandlerRegistry};
//! use mq_rpc::RpcContent;
//!
//! let mut registry = HandlerRegistry::new();
//!
//! registry.register_checked(
//!     "hello",
//!     Checker::immediate(|rpc| rpc.sender() == "pi"),
//!     |rpc: RpcContent| async move {
//!         println!("hello from {}", rpc.sender());
//!         Ok(())
//!     },
//! )?;
//!
//! let outcome = registry.dispatch(RpcContent::new("pc", "hello")).await?;
//! assert_eq!(outcome, Dispatch::Declined);
//! ```

mod checker;
mod registry;

pub use checker::Checker;
pub use registry::{BoxFuture, Dispatch, FnHandler, Handler, HandlerEntry, HandlerRegistry, HandlerResult};
