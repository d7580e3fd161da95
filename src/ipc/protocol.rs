//! Wire protocol types for IPC
//!
//! Every frame carries one JSON-RPC style envelope:
//! ```text
//! Request:
//!   {"jsonrpc":"2.0","id":<u64>,"method":<string>,"params":<object>}
//!
//! Response:
//!   {"jsonrpc":"2.0","id":<u64>,"result":<any>}
//!   {"jsonrpc":"2.0","id":<u64>,"error":{"code":<string>,"message":<string>,"data"?:<any>}}
//! ```

use std::fmt;
use std::io;
use std::time::Duration;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::ipc::codec::FrameError;

/// Protocol version written into every envelope
pub const JSONRPC_VERSION: &str = "2.0";

/// Largest integer a JSON number can carry without precision loss in an
/// IEEE-754 double
pub const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

/// Errors that can occur during IPC operations
#[derive(Debug, Error)]
pub enum IpcError {
    #[error("framing error: {0}")]
    Frame(#[from] FrameError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("remote error: {0}")]
    Remote(#[from] RpcError),

    #[error("call {id} timed out after {after:?}")]
    Timeout { id: u64, after: Duration },

    #[error("too many pending calls (limit {limit})")]
    Backpressure { limit: usize },

    #[error("connection closed: {0}")]
    Disconnected(String),
}

/// Stable error codes carried in the `error.code` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed envelope, missing or mistyped parameter, failed validation
    BadRequest,
    /// Method name not in the supported set
    UnknownMethod,
    /// Wallet session missing (or otherwise in the wrong state)
    WdkManagerInit,
    /// The wallet library raised while handling the call
    WdkManagerCall,
    /// Anything else; indicates a bug on the worker side
    InternalError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::UnknownMethod => "UNKNOWN_METHOD",
            Self::WdkManagerInit => "WDK_MANAGER_INIT",
            Self::WdkManagerCall => "WDK_MANAGER_CALL",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error returned in a response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{code}: {message}")]
pub struct RpcError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn unknown_method(method: &str) -> Self {
        Self::new(ErrorCode::UnknownMethod, format!("unknown method: {method}"))
            .with_data(serde_json::json!({ "method": method }))
    }

    pub fn not_initialized() -> Self {
        Self::new(
            ErrorCode::WdkManagerInit,
            "wallet session has not been initialized",
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// A call issued by one peer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    pub id: u64,
    pub method: String,
    pub params: Value,
}

impl Request {
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            id,
            method: method.into(),
            params,
        }
    }

    /// Serialize to the JSON body of a frame
    pub fn to_vec(&self) -> Result<Vec<u8>, IpcError> {
        #[derive(Serialize)]
        struct Envelope<'a> {
            jsonrpc: &'static str,
            #[serde(flatten)]
            request: &'a Request,
        }

        Ok(serde_json::to_vec(&Envelope {
            jsonrpc: JSONRPC_VERSION,
            request: self,
        })?)
    }
}

/// The answer to a [`Request`]
///
/// `id` is `None` only when the request was too malformed to recover one.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub id: Option<u64>,
    pub outcome: Result<Value, RpcError>,
}

impl Response {
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            id: Some(id),
            outcome: Ok(result),
        }
    }

    pub fn failure(id: Option<u64>, error: RpcError) -> Self {
        Self {
            id,
            outcome: Err(error),
        }
    }

    /// Serialize to the JSON body of a frame
    pub fn to_vec(&self) -> Result<Vec<u8>, IpcError> {
        Ok(serde_json::to_vec(self)?)
    }
}

impl Serialize for Response {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("jsonrpc", JSONRPC_VERSION)?;
        map.serialize_entry("id", &self.id)?;
        match &self.outcome {
            Ok(result) => map.serialize_entry("result", result)?,
            Err(error) => map.serialize_entry("error", error)?,
        }
        map.end()
    }
}

/// A decoded envelope of either direction
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request(Request),
    Response(Response),
}

/// An envelope that could not be interpreted
///
/// Carries the request id when one could be recovered so the receiver can
/// still answer the right caller.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidMessage {
    pub id: Option<u64>,
    pub error: RpcError,
}

impl InvalidMessage {
    fn new(id: Option<u64>, message: impl Into<String>) -> Self {
        Self {
            id,
            error: RpcError::bad_request(message),
        }
    }
}

impl Message {
    /// Parse the JSON body of one frame
    pub fn from_slice(data: &[u8]) -> Result<Self, InvalidMessage> {
        let value: Value = serde_json::from_slice(data)
            .map_err(|e| InvalidMessage::new(None, format!("malformed JSON body: {e}")))?;

        let Value::Object(mut obj) = value else {
            return Err(InvalidMessage::new(None, "envelope must be a JSON object"));
        };

        let id = obj.get("id").and_then(Value::as_u64).filter(|id| *id > 0);

        if let Some(method) = obj.remove("method") {
            let Value::String(method) = method else {
                return Err(InvalidMessage::new(id, "`method` must be a string"));
            };
            let Some(id) = id else {
                return Err(InvalidMessage::new(None, "`id` must be a positive integer"));
            };
            let params = match obj.remove("params") {
                None | Some(Value::Null) => Value::Object(Map::new()),
                Some(params @ Value::Object(_)) => params,
                Some(_) => return Err(InvalidMessage::new(Some(id), "`params` must be an object")),
            };
            return Ok(Self::Request(Request { id, method, params }));
        }

        let has_result = obj.contains_key("result");
        let has_error = obj.contains_key("error");
        if !has_result && !has_error {
            return Err(InvalidMessage::new(
                id,
                "envelope has neither `method` nor `result`/`error`",
            ));
        }
        // A peer answers `id: null` when it could not tell which request failed
        let id = match (id, obj.get("id")) {
            (Some(id), _) => Some(id),
            (None, Some(Value::Null)) if has_error && !has_result => None,
            (None, _) => {
                return Err(InvalidMessage::new(None, "`id` must be a positive integer"));
            }
        };

        let outcome = match obj.remove("error") {
            Some(raw) => Err(parse_error_object(raw)),
            None => Ok(obj.remove("result").unwrap_or(Value::Null)),
        };
        Ok(Self::Response(Response { id, outcome }))
    }
}

fn parse_error_object(raw: Value) -> RpcError {
    match serde_json::from_value::<RpcError>(raw.clone()) {
        Ok(error) => error,
        Err(e) => RpcError::internal(format!("peer sent an unrecognized error object: {e}"))
            .with_data(raw),
    }
}

/// Replace integers outside the IEEE-754 safe range with their decimal string
pub fn stringify_large_integers(value: &mut Value) {
    match value {
        Value::Number(n) => {
            let unsafe_int = match (n.as_u64(), n.as_i64()) {
                (Some(u), _) => u > MAX_SAFE_INTEGER,
                (None, Some(i)) => i.unsigned_abs() > MAX_SAFE_INTEGER,
                (None, None) => false,
            };
            if unsafe_int {
                let text = n.to_string();
                *value = Value::String(text);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(stringify_large_integers),
        Value::Object(map) => map.values_mut().for_each(stringify_large_integers),
        _ => {}
    }
}
