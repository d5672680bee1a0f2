//! Admission gate evaluated before a handler runs.
//!
//! A checker either answers immediately or hands back a future. The
//! dispatcher only suspends for the second kind, so a synchronous gate
//! never yields to the scheduler.

use std::fmt;
use std::future::Future;

use super::BoxFuture;
use crate::content::RpcContent;

type ImmediateFn = dyn Fn(&RpcContent) -> bool + Send + Sync;
type DeferredFn = dyn Fn(&RpcContent) -> BoxFuture<'static, bool> + Send + Sync;

/// Per-method predicate deciding whether a record is handled.
///
/// Returning `false` skips the handler; it is not an error.
pub enum Checker {
    /// Answers synchronously.
    Immediate(Box<ImmediateFn>),
    /// Answers through a future that the dispatcher awaits.
    Deferred(Box<DeferredFn>),
}

impl Checker {
    /// Wrap a synchronous predicate.
    pub fn immediate<F>(check: F) -> Self
    where
        F: Fn(&RpcContent) -> bool + Send + Sync + 'static,
    {
        Checker::Immediate(Box::new(check))
    }

    /// Wrap an asynchronous predicate.
    ///
    /// The returned future must own whatever it needs from the record.
    pub fn deferred<F, Fut>(check: F) -> Self
    where
        F: Fn(&RpcContent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        Checker::Deferred(Box::new(
            move |rpc: &RpcContent| -> BoxFuture<'static, bool> { Box::pin(check(rpc)) },
        ))
    }

    /// Evaluate the gate for a record.
    pub async fn admit(&self, rpc: &RpcContent) -> bool {
        match self {
            Checker::Immediate(check) => check(rpc),
            Checker::Deferred(check) => check(rpc).await,
        }
    }

    /// Whether evaluating this checker may suspend.
    #[inline]
    pub fn is_deferred(&self) -> bool {
        matches!(self, Checker::Deferred(_))
    }
}

impl fmt::Debug for Checker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Checker::Immediate(_) => f.write_str("Checker::Immediate"),
            Checker::Deferred(_) => f.write_str("Checker::Deferred"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_immediate_checker() {
        let checker = Checker::immediate(|rpc| rpc.sender() == "pi");

        assert!(!checker.is_deferred());
        assert!(checker.admit(&RpcContent::new("pi", "hello")).await);
        assert!(!checker.admit(&RpcContent::new("pc", "hello")).await);
    }

    #[tokio::test]
    async fn test_deferred_checker() {
        let checker = Checker::deferred(|rpc| {
            let allowed = rpc.args().iter().any(|a| a.as_str() == Some("ok"));
            async move {
                tokio::task::yield_now().await;
                allowed
            }
        });

        assert!(checker.is_deferred());
        let admitted = RpcContent::new("pi", "hello").with_args(vec!["ok".into()]);
        assert!(checker.admit(&admitted).await);
        assert!(!checker.admit(&RpcContent::new("pi", "hello")).await);
    }

    #[test]
    fn test_debug_names_variant() {
        let checker = Checker::immediate(|_| true);
        assert_eq!(format!("{checker:?}"), "Checker::Immediate");
    }
}
