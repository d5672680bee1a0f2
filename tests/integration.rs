//! Integration tests for mq-rpc.
//!
//! These drive the public API end to end over the in-process broker.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use mq_rpc::transport::QueueTransport;
use mq_rpc::{
    BoxError, Checker, ConnectionOptions, Dispatch, Kwargs, MemoryBroker, RpcContent, RpcError, RpcManager,
    Value,
};

type Seen = Arc<Mutex<Vec<RpcContent>>>;

/// Listener named `nixos` with a `hello` handler that records its records.
async fn listener(broker: &MemoryBroker, checker: Option<Checker>) -> (RpcManager, Seen) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let handler = move |rpc: RpcContent| {
        let sink = sink.clone();
        async move {
            sink.lock().unwrap().push(rpc);
            Ok(())
        }
    };

    let mut manager = RpcManager::new("nixos", Arc::new(broker.clone()));
    match checker {
        Some(checker) => manager.register_checked("hello", checker, handler).unwrap(),
        None => manager.register_handler("hello", handler).unwrap(),
    }
    manager.connect().await.unwrap();
    (manager, seen)
}

async fn publish_raw(broker: &MemoryBroker, body: &'static [u8]) {
    broker
        .publish("rpc.nixos", Bytes::from_static(body), &ConnectionOptions::default())
        .await
        .unwrap();
}

/// A decoded `hello` record reaches the handler exactly once, unchanged.
#[tokio::test]
async fn test_hello_scenario() {
    let broker = MemoryBroker::new();
    let (_listener, seen) = listener(&broker, None).await;

    let mut kwargs = Kwargs::new();
    kwargs.insert("x".to_string(), Value::from(1));
    let rpc = RpcContent::new("pi", "hello")
        .with_args(vec![Value::from("a"), Value::from("b")])
        .with_kwargs(kwargs);

    let sender = RpcManager::new("pi", Arc::new(broker.clone()));
    sender.send("nixos", &rpc).await.unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![rpc]);
    assert!(broker.take_rejected().is_empty());
}

/// Garbage on the topic is rejected as an invalid message carrying the body.
#[tokio::test]
async fn test_malformed_body_rejected() {
    let broker = MemoryBroker::new();
    let (_listener, seen) = listener(&broker, None).await;

    publish_raw(&broker, b"\xc1\xc1").await;

    let rejected = broker.take_rejected();
    assert_eq!(rejected.len(), 1);
    match &rejected[0].error {
        RpcError::InvalidMessage { body, source } => {
            assert_eq!(&body[..], b"\xc1\xc1");
            assert!(matches!(**source, RpcError::Decode(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(seen.lock().unwrap().is_empty());
}

/// A 4-tuple with a non-string key in kwargs fails validation at intake.
#[tokio::test]
async fn test_invalid_record_rejected() {
    let broker = MemoryBroker::new();
    let (_listener, _) = listener(&broker, None).await;

    // [ "pi", "hello", [], { 1: "v" } ]
    publish_raw(&broker, b"\x94\xa2pi\xa5hello\x90\x81\x01\xa1v").await;

    let rejected = broker.take_rejected();
    assert_eq!(rejected.len(), 1);
    match &rejected[0].error {
        RpcError::InvalidMessage { source, .. } => {
            assert!(matches!(**source, RpcError::Validation(mq_rpc::ValidationField::KwargsKey)));
        }
        other => panic!("unexpected error: {other}"),
    }
}

/// A valid record followed by junk is not a valid message.
#[tokio::test]
async fn test_trailing_bytes_rejected() {
    let broker = MemoryBroker::new();
    let (_listener, seen) = listener(&broker, None).await;

    let mut body = RpcContent::new("pi", "hello").encode().unwrap();
    body.extend_from_slice(b"\xc1\xc1junk");
    broker
        .publish("rpc.nixos", Bytes::from(body.clone()), &ConnectionOptions::default())
        .await
        .unwrap();

    let rejected = broker.take_rejected();
    assert_eq!(rejected.len(), 1);
    match &rejected[0].error {
        RpcError::InvalidMessage { body: kept, source } => {
            assert_eq!(&kept[..], &body[..]);
            assert!(matches!(**source, RpcError::Decode(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(seen.lock().unwrap().is_empty());
}

/// Non-string positional arguments from other peers are delivered as-is.
#[tokio::test]
async fn test_integer_args_delivered() {
    let broker = MemoryBroker::new();
    let (_listener, seen) = listener(&broker, None).await;

    // [ "pi", "hello", [1, 2], {} ]
    publish_raw(&broker, b"\x94\xa2pi\xa5hello\x92\x01\x02\x80").await;

    assert!(broker.take_rejected().is_empty());
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].args(), [Value::from(1), Value::from(2)]);
}

/// Unknown methods surface as dispatch failures, not silent drops.
#[tokio::test]
async fn test_unknown_method_rejected() {
    let broker = MemoryBroker::new();
    let (_listener, seen) = listener(&broker, None).await;

    let sender = RpcManager::new("pi", Arc::new(broker.clone()));
    sender
        .call("nixos", "goodbye", Vec::new(), Kwargs::new())
        .await
        .unwrap();

    let rejected = broker.take_rejected();
    assert_eq!(rejected.len(), 1);
    match &rejected[0].error {
        RpcError::DispatchFailed(inner) => {
            assert!(matches!(**inner, RpcError::UnknownMethod(ref m) if m == "goodbye"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(seen.lock().unwrap().is_empty());
}

/// A declining checker skips the handler without rejecting the delivery.
#[tokio::test]
async fn test_checker_filters_by_sender() {
    let broker = MemoryBroker::new();
    let checker = Checker::deferred(|rpc| {
        let trusted = rpc.sender() == "pi";
        async move { trusted }
    });
    let (_listener, seen) = listener(&broker, Some(checker)).await;

    for sender in ["pi", "stranger", "pi"] {
        let client = RpcManager::new(sender, Arc::new(broker.clone()));
        client
            .call("nixos", "hello", Vec::new(), Kwargs::new())
            .await
            .unwrap();
    }

    assert!(broker.take_rejected().is_empty());
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|rpc| rpc.sender() == "pi"));
}

/// A failing handler does not take the subscription down.
#[tokio::test]
async fn test_subscription_survives_handler_error() {
    let broker = MemoryBroker::new();
    let mut manager = RpcManager::new("nixos", Arc::new(broker.clone()));
    manager
        .register_handler("fail", |_rpc: RpcContent| async {
            Err::<(), BoxError>("disk full".into())
        })
        .unwrap();
    manager
        .register_handler("ok", |_rpc: RpcContent| async { Ok(()) })
        .unwrap();
    manager.connect().await.unwrap();

    let sender = RpcManager::new("pi", Arc::new(broker.clone()));
    sender.call("nixos", "fail", Vec::new(), Kwargs::new()).await.unwrap();
    sender.call("nixos", "ok", Vec::new(), Kwargs::new()).await.unwrap();

    let rejected = broker.take_rejected();
    assert_eq!(rejected.len(), 1);
    match &rejected[0].error {
        RpcError::DispatchFailed(inner) => match &**inner {
            RpcError::Handler { method, source } => {
                assert_eq!(method, "fail");
                assert_eq!(source.to_string(), "disk full");
            }
            other => panic!("unexpected inner error: {other}"),
        },
        other => panic!("unexpected error: {other}"),
    }

    assert!(manager.is_connected());
    assert_eq!(
        manager.dispatch(RpcContent::new("pi", "ok")).await.unwrap(),
        Dispatch::Handled
    );
}

/// Nothing is delivered after cancel; reconnecting resumes delivery.
#[tokio::test]
async fn test_cancel_and_reconnect() {
    let broker = MemoryBroker::new();
    let (mut manager, seen) = listener(&broker, None).await;
    let sender = RpcManager::new("pi", Arc::new(broker.clone()));

    manager.cancel().await.unwrap();
    sender.call("nixos", "hello", Vec::new(), Kwargs::new()).await.unwrap();
    assert!(seen.lock().unwrap().is_empty());

    manager.connect().await.unwrap();
    sender.call("nixos", "hello", Vec::new(), Kwargs::new()).await.unwrap();
    assert_eq!(seen.lock().unwrap().len(), 1);
}
