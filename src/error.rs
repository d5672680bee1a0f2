//! Error types for mq-rpc.

use std::fmt;

use bytes::Bytes;
use thiserror::Error;

/// Boxed error used for handler and transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Record field that failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationField {
    /// `sender` is not a string.
    Sender,
    /// `method` is not a string.
    Method,
    /// `args` is not a list.
    Args,
    /// `kwargs` is not a map.
    Kwargs,
    /// A `kwargs` key is not a string.
    KwargsKey,
}

impl ValidationField {
    /// Field name as it appears in the record.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sender => "sender",
            Self::Method => "method",
            Self::Args => "args",
            Self::Kwargs => "kwargs",
            Self::KwargsKey => "kwargs key",
        }
    }
}

impl fmt::Display for ValidationField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::Sender => "sender must be a string",
            Self::Method => "method must be a string",
            Self::Args => "args must be a list",
            Self::Kwargs => "kwargs must be a map",
            Self::KwargsKey => "kwargs keys must be strings",
        };
        f.write_str(msg)
    }
}

/// Main error type for all mq-rpc operations.
#[derive(Debug, Error)]
pub enum RpcError {
    /// A record field violates its invariant.
    #[error("Validation error: {0}")]
    Validation(ValidationField),

    /// Bytes do not parse as a MessagePack 4-tuple.
    #[error("Decode error: {0}")]
    Decode(String),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// A transport-delivered body could not be turned into a record.
    #[error("Invalid message ({} bytes)", .body.len())]
    InvalidMessage {
        /// Raw body as delivered, kept for diagnostics.
        body: Bytes,
        #[source]
        source: Box<RpcError>,
    },

    /// The method already has a handler.
    #[error("Method already registered: {0}")]
    RegistrationConflict(String),

    /// Registration attempted while an active subscription shares the registry.
    #[error("Registry is in use by an active subscription")]
    RegistryFrozen,

    /// No handler is registered for the method.
    #[error("No handler for method: {0}")]
    UnknownMethod(String),

    /// A registered handler failed.
    #[error("Handler for method {method} failed")]
    Handler {
        method: String,
        #[source]
        source: BoxError,
    },

    /// A well-formed message could not be dispatched.
    #[error("Error when calling rpc handler")]
    DispatchFailed(#[source] Box<RpcError>),

    /// `connect` called while a subscription is active.
    #[error("Already connected")]
    AlreadyBound,

    /// Queue transport failure (subscribe, publish or unsubscribe).
    #[error("Transport error: {0}")]
    Transport(#[source] BoxError),

    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(String),

    /// I/O error while reading configuration.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while parsing configuration.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<rmp_serde::decode::Error> for RpcError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        RpcError::Decode(e.to_string())
    }
}

impl From<rmpv::decode::Error> for RpcError {
    fn from(e: rmpv::decode::Error) -> Self {
        RpcError::Decode(e.to_string())
    }
}

/// Result type alias using RpcError.
pub type Result<T> = std::result::Result<T, RpcError>;
