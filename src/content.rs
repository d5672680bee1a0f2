//! The RPC record carried in every message body.
//!
//! On the wire a record is a MessagePack array of exactly four elements:
//!
//! ```text
//! [ sender: str, method: str, args: [any, ...], kwargs: {str: any} ]
//! ```
//!
//! There is no envelope, version tag or checksum. A nil `args` or `kwargs`
//! element decodes as an empty list or map. The body must hold exactly one
//! MessagePack value, and every string in it must be valid UTF-8.
//!
//! # Example
//!
//! ```
//! use mq_rpc::{Kwargs, RpcContent};
//!
//! let mut kwargs = Kwargs::new();
//! kwargs.insert("x".to_string(), 1.into());
//!
//! let content = RpcContent::new("pi", "hello")
//!     .with_args(vec!["a".into(), "b".into()])
//!     .with_kwargs(kwargs);
//!
//! let bytes = content.encode().unwrap();
//! assert_eq!(RpcContent::decode(&bytes).unwrap(), content);
//! ```

use std::collections::BTreeMap;

use rmpv::Value;

use crate::codec::MsgPackCodec;
use crate::error::{Result, RpcError, ValidationField};

/// Named arguments of a record.
pub type Kwargs = BTreeMap<String, Value>;

/// A single RPC invocation.
///
/// Fields are private so a record can only be obtained through a
/// constructor, and all constructors validate.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcContent {
    sender: String,
    method: String,
    args: Vec<Value>,
    kwargs: Kwargs,
}

impl RpcContent {
    /// Create a record with empty `args` and `kwargs`.
    pub fn new(sender: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            method: method.into(),
            args: Vec::new(),
            kwargs: Kwargs::new(),
        }
    }

    /// Replace the positional arguments.
    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    /// Replace the named arguments.
    pub fn with_kwargs(mut self, kwargs: Kwargs) -> Self {
        self.kwargs = kwargs;
        self
    }

    /// Build a record from dynamically typed fields.
    ///
    /// `args` and `kwargs` may be nil, in which case they default to empty.
    ///
    /// # Errors
    ///
    /// - [`RpcError::Validation`] naming the first offending field.
    /// - [`RpcError::Decode`] if a string anywhere in the fields is not
    ///   valid UTF-8.
    pub fn from_values(sender: Value, method: Value, args: Value, kwargs: Value) -> Result<Self> {
        let sender = field_string(sender, ValidationField::Sender)?;
        let method = field_string(method, ValidationField::Method)?;

        let args = match args {
            Value::Nil => Vec::new(),
            Value::Array(items) => {
                items.iter().try_for_each(|item| check_utf8(item, "args"))?;
                items
            }
            _ => return Err(RpcError::Validation(ValidationField::Args)),
        };

        let kwargs = match kwargs {
            Value::Nil => Kwargs::new(),
            Value::Map(entries) => {
                let mut map = Kwargs::new();
                for (key, value) in entries {
                    let key = field_string(key, ValidationField::KwargsKey)?;
                    check_utf8(&value, "kwargs")?;
                    map.insert(key, value);
                }
                map
            }
            _ => return Err(RpcError::Validation(ValidationField::Kwargs)),
        };

        Ok(Self {
            sender,
            method,
            args,
            kwargs,
        })
    }

    /// Identifier of the originating party.
    #[inline]
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Name of the operation to invoke.
    #[inline]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Positional arguments.
    #[inline]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Positional argument at `index`, if it is a string.
    pub fn arg_str(&self, index: usize) -> Option<&str> {
        self.args.get(index).and_then(Value::as_str)
    }

    /// Named arguments.
    #[inline]
    pub fn kwargs(&self) -> &Kwargs {
        &self.kwargs
    }

    /// Look up a single named argument.
    pub fn kwarg(&self, key: &str) -> Option<&Value> {
        self.kwargs.get(key)
    }

    /// Split the record into `(sender, method, args, kwargs)`.
    pub fn into_parts(self) -> (String, String, Vec<Value>, Kwargs) {
        (self.sender, self.method, self.args, self.kwargs)
    }

    /// Encode the record as a MessagePack 4-element array.
    pub fn encode(&self) -> Result<Vec<u8>> {
        MsgPackCodec::encode(&(&self.sender, &self.method, &self.args, &self.kwargs))
    }

    /// Decode and validate a record.
    ///
    /// # Errors
    ///
    /// - [`RpcError::Decode`] if the bytes are not exactly one MessagePack
    ///   4-element array, or hold a string that is not UTF-8.
    /// - [`RpcError::Validation`] if an element has the wrong type.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let fields = match MsgPackCodec::decode_value(bytes)? {
            Value::Array(fields) => fields,
            other => {
                return Err(RpcError::Decode(format!(
                    "expected a 4-element array, got {}",
                    type_name(&other)
                )))
            }
        };

        let [sender, method, args, kwargs]: [Value; 4] =
            fields.try_into().map_err(|fields: Vec<Value>| {
                RpcError::Decode(format!(
                    "expected a 4-element array, got {} elements",
                    fields.len()
                ))
            })?;

        Self::from_values(sender, method, args, kwargs)
    }
}

/// A string field; invalid UTF-8 is a decode failure, not a type error.
fn field_string(value: Value, field: ValidationField) -> Result<String> {
    match value {
        Value::String(s) => s
            .into_str()
            .ok_or_else(|| RpcError::Decode(format!("{} is not valid UTF-8", field.name()))),
        _ => Err(RpcError::Validation(field)),
    }
}

fn check_utf8(value: &Value, field: &str) -> Result<()> {
    match value {
        Value::String(s) if s.is_err() => {
            Err(RpcError::Decode(format!("string in {} is not valid UTF-8", field)))
        }
        Value::Array(items) => items.iter().try_for_each(|item| check_utf8(item, field)),
        Value::Map(entries) => entries.iter().try_for_each(|(key, value)| {
            check_utf8(key, field)?;
            check_utf8(value, field)
        }),
        _ => Ok(()),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Nil => "nil",
        Value::Boolean(_) => "boolean",
        Value::Integer(_) => "integer",
        Value::F32(_) | Value::F64(_) => "float",
        Value::String(_) => "string",
        Value::Binary(_) => "binary",
        Value::Array(_) => "array",
        Value::Map(_) => "map",
        Value::Ext(..) => "ext",
    }
}
