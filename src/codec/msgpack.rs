//! MsgPack codec using `rmp-serde`.
//!
//! Tuples and sequences encode as MessagePack arrays, maps with string keys
//! encode as MessagePack maps, and `rmpv::Value` round-trips every scalar the
//! format supports (integers, floats, booleans, nil, binary).
//!
//! Encoding uses `to_vec_named` so any struct passed in ends up as a map
//! keyed by field name, which is what non-Rust peers expect.

use serde::de::IgnoredAny;
use serde::Deserialize;

use crate::error::{Result, RpcError};

/// MessagePack codec for structured data.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode MsgPack bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Decode`](crate::RpcError::Decode) if the bytes are
    /// not a valid encoding of `T`.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }

    /// Decode exactly one MsgPack value from `bytes`.
    ///
    /// Unlike [`decode`](Self::decode), the whole input must be consumed.
    /// Strings with invalid UTF-8 are kept as `Value::String` so callers
    /// can tell them apart from binary.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Decode`](crate::RpcError::Decode) on malformed
    /// input or trailing bytes.
    pub fn decode_value(bytes: &[u8]) -> Result<rmpv::Value> {
        // rmp-serde rejects the reserved marker, which rmpv reads as nil.
        let mut rest = bytes;
        IgnoredAny::deserialize(&mut rmp_serde::Deserializer::new(&mut rest))?;
        if !rest.is_empty() {
            return Err(RpcError::Decode(format!(
                "{} trailing bytes after value",
                rest.len()
            )));
        }

        Ok(rmpv::decode::read_value(&mut &bytes[..])?)
    }
}
