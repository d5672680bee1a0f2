//! Hello listener and sender over the in-process broker.
//!
//! The listener registers a `hello` handler under its client name, gated so
//! that only `pi` gets an answer, then a second manager sends to it.
//!
//! ```text
//! cargo run --example hello -- [config.json]
//! RUST_LOG=mq_rpc=debug cargo run --example hello
//! ```
//!
//! The optional config file holds `client_name` and connection options.

use std::sync::Arc;

use mq_rpc::{Checker, Kwargs, MemoryBroker, RpcConfig, RpcContent, RpcManager, Value};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => RpcConfig::from_file(path)?,
        None => RpcConfig::new("nixos"),
    };
    let client_name = config.client_name.clone();

    let broker = Arc::new(MemoryBroker::new());

    let mut listener = RpcManager::from_config(config, broker.clone());
    listener.register_checked(
        "hello",
        Checker::immediate(|rpc| rpc.sender() == "pi"),
        |rpc: RpcContent| async move {
            let name = rpc.kwarg("name").and_then(Value::as_str).unwrap_or("world");
            println!("hello, {}! (from {})", name, rpc.sender());
            Ok(())
        },
    )?;
    listener.connect().await?;

    let pi = RpcManager::new("pi", broker.clone());
    let mut kwargs = Kwargs::new();
    kwargs.insert("name".to_string(), Value::from("nixos"));
    pi.call(&client_name, "hello", Vec::new(), kwargs).await?;

    // Declined by the checker: nothing is printed and nothing is rejected.
    let stranger = RpcManager::new("stranger", broker.clone());
    stranger.send(&client_name, &RpcContent::new("stranger", "hello")).await?;

    // No such method: the delivery is rejected.
    pi.call(&client_name, "goodbye", Vec::new(), Kwargs::new()).await?;
    for rejected in broker.take_rejected() {
        println!("rejected on {}: {}", rejected.topic, rejected.error);
    }

    listener.cancel().await?;
    Ok(())
}
