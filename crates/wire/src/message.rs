//! Wire message definitions

use serde::{Deserialize, Serialize};

/// Request frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Correlation id, echoed back in the response
    pub id: u64,
    pub body: RequestBody,
}

/// Request payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestBody {
    /// Liveness probe
    Ping,
    /// Invoke `function` on the master owning `bucket_id`.
    /// `args` carry a JSON document.
    Call {
        bucket_id: u32,
        function: String,
        args: Vec<u8>,
    },
}

/// Response frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    pub body: ResponseBody,
}

/// Response payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseBody {
    Pong,
    /// Successful call; `value` carries a JSON document
    Ok { value: Vec<u8> },
    Error { code: ErrorCode, message: String },
}

/// Remote failure categories carried over the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// No replicaset or master known for the bucket
    NoRoute,
    /// The master could not be reached after the bounded retry
    Unreachable,
    /// The call deadline passed
    Timeout,
    /// The target instance does not register this function
    UnknownFunction,
    /// Malformed arguments
    BadRequest,
    Internal,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCode::NoRoute => write!(f, "no_route"),
            ErrorCode::Unreachable => write!(f, "unreachable"),
            ErrorCode::Timeout => write!(f, "timeout"),
            ErrorCode::UnknownFunction => write!(f, "unknown_function"),
            ErrorCode::BadRequest => write!(f, "bad_request"),
            ErrorCode::Internal => write!(f, "internal"),
        }
    }
}
