//! Outcome of a single outbound call

use error::CallError;
use serde_json::Value;

/// Body of a failed response: decoded JSON when possible, raw text otherwise
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

impl ResponseBody {
    /// Decode `text` as JSON, keeping the raw text if it is not JSON
    pub fn from_text(text: String) -> Self {
        match serde_json::from_str(&text) {
            Ok(value) => ResponseBody::Json(value),
            Err(_) => ResponseBody::Text(text),
        }
    }

    /// Collapse into a JSON value; raw text becomes a JSON string
    pub fn into_value(self) -> Value {
        match self {
            ResponseBody::Json(value) => value,
            ResponseBody::Text(text) => Value::String(text),
        }
    }
}

/// Tagged outcome of a call; exactly one variant per call
#[derive(Debug, Clone, PartialEq)]
pub enum CallResult {
    /// 2xx with a decoded body (`null` when the body was empty)
    Success { status: u16, body: Value },
    /// Non-2xx response
    HttpError { status: u16, body: ResponseBody },
    /// Connection failure, decode failure or a fault in the operation
    TransportError(String),
    /// The bridge deadline elapsed
    Timeout,
}

impl CallResult {
    pub fn is_success(&self) -> bool {
        matches!(self, CallResult::Success { .. })
    }

    /// HTTP status, if the remote side answered
    pub fn status(&self) -> Option<u16> {
        match self {
            CallResult::Success { status, .. } | CallResult::HttpError { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// Split into the decoded success pair or a `CallError`
    pub fn into_result(self) -> Result<(u16, Value), CallError> {
        match self {
            CallResult::Success { status, body } => Ok((status, body)),
            CallResult::HttpError { status, body } => Err(CallError::Http {
                status,
                body: body.into_value(),
            }),
            CallResult::TransportError(message) => Err(CallError::Transport(message)),
            CallResult::Timeout => Err(CallError::Timeout),
        }
    }
}

impl From<CallError> for CallResult {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Transport(message) => CallResult::TransportError(message),
            CallError::Http { status, body } => CallResult::HttpError {
                status,
                body: ResponseBody::Json(body),
            },
            CallError::Timeout => CallResult::Timeout,
        }
    }
}
