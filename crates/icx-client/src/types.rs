//! Wire-level response type shared by every tax-validation lookup.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Status code and JSON body of one lookup.
///
/// Non-2xx answers are ordinary values of this type. A transport failure is
/// encoded as status 500 with an `error` message in the body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// Status-500 encoding of a transport failure.
    ///
    /// `defaults` supplies the operation-specific fields a caller expects
    /// to find (for example `"valid": false`); `error` is added on top.
    pub fn transport_failure(message: impl Into<String>, defaults: &Value) -> Self {
        let mut body = match defaults {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        body.insert("error".to_string(), Value::String(message.into()));
        Self::new(500, Value::Object(body))
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }

    /// `body[key]` as a bool; absent or non-bool is `false`.
    pub fn flag(&self, key: &str) -> bool {
        self.body.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// `body[key]` as a string slice.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.body.get(key).and_then(Value::as_str)
    }
}
