//! Codec module - MessagePack encoding for RPC records.
//!
//! - [`MsgPackCodec`] - generic MessagePack helpers over `rmp-serde`
//!
//! The record-level wire format (a 4-element array of
//! `sender, method, args, kwargs`) lives on [`RpcContent`](crate::RpcContent)
//! as `encode`/`decode` and goes through this codec.
//!
//! # Example
//!
//! ```
//! use mq_rpc::codec::MsgPackCodec;
//!
//! let encoded = MsgPackCodec::encode(&("pi", "hello")).unwrap();
//! let decoded: (String, String) = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, ("pi".to_string(), "hello".to_string()));
//! ```

mod msgpack;

pub use msgpack::MsgPackCodec;
