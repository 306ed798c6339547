//! Storage node function registry
//!
//! A storage instance answers `call` requests routed to it by a router. The
//! built-in functions cover identity and a small JSON key/value store; both
//! arguments and results travel as JSON.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use wire::ErrorCode;

/// Call execution errors
#[derive(Debug, Error)]
pub enum CallError {
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("bad arguments: {0}")]
    BadArgs(String),
    #[error("{0}")]
    Internal(String),
}

impl CallError {
    pub fn code(&self) -> ErrorCode {
        match self {
            CallError::UnknownFunction(_) => ErrorCode::UnknownFunction,
            CallError::BadArgs(_) => ErrorCode::BadRequest,
            CallError::Internal(_) => ErrorCode::Internal,
        }
    }
}

#[derive(Debug, Deserialize)]
struct KvPutArgs {
    key: String,
    value: Value,
}

#[derive(Debug, Deserialize)]
struct KvGetArgs {
    key: String,
}

/// A storage instance
pub struct StorageNode {
    instance_uuid: Uuid,
    replicaset_uuid: Uuid,
    kv: RwLock<HashMap<String, Value>>,
}

impl StorageNode {
    pub fn new(instance_uuid: Uuid, replicaset_uuid: Uuid) -> Self {
        Self {
            instance_uuid,
            replicaset_uuid,
            kv: RwLock::new(HashMap::new()),
        }
    }

    pub fn instance_uuid(&self) -> Uuid {
        self.instance_uuid
    }

    pub fn replicaset_uuid(&self) -> Uuid {
        self.replicaset_uuid
    }

    /// Execute a routed function call. Arguments and the result are JSON.
    pub fn handle_call(&self, function: &str, args: &[u8]) -> Result<Vec<u8>, CallError> {
        debug!("Executing function '{}'", function);
        let result = match function {
            "get_uuid" => json!(self.instance_uuid.to_string()),
            "kv_put" => {
                let args: KvPutArgs = parse_args(args)?;
                self.kv.write().insert(args.key, args.value);
                json!(true)
            }
            "kv_get" => {
                let args: KvGetArgs = parse_args(args)?;
                self.kv
                    .read()
                    .get(&args.key)
                    .cloned()
                    .unwrap_or(Value::Null)
            }
            other => return Err(CallError::UnknownFunction(other.to_string())),
        };

        serde_json::to_vec(&result).map_err(|e| CallError::Internal(e.to_string()))
    }
}

fn parse_args<'a, T: Deserialize<'a>>(args: &'a [u8]) -> Result<T, CallError> {
    serde_json::from_slice(args).map_err(|e| CallError::BadArgs(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> StorageNode {
        StorageNode::new(Uuid::new_v4(), Uuid::new_v4())
    }

    #[test]
    fn test_get_uuid() {
        let node = node();
        let result = node.handle_call("get_uuid", b"null").unwrap();
        let uuid: String = serde_json::from_slice(&result).unwrap();
        assert_eq!(uuid, node.instance_uuid().to_string());
    }

    #[test]
    fn test_kv_roundtrip() {
        let node = node();
        let put = serde_json::to_vec(&json!({"key": "k1", "value": 42})).unwrap();
        node.handle_call("kv_put", &put).unwrap();

        let get = serde_json::to_vec(&json!({"key": "k1"})).unwrap();
        let result = node.handle_call("kv_get", &get).unwrap();
        let value: Value = serde_json::from_slice(&result).unwrap();
        assert_eq!(value, json!(42));
    }

    #[test]
    fn test_kv_get_missing_is_null() {
        let node = node();
        let get = serde_json::to_vec(&json!({"key": "absent"})).unwrap();
        let result = node.handle_call("kv_get", &get).unwrap();
        let value: Value = serde_json::from_slice(&result).unwrap();
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn test_unknown_function() {
        let node = node();
        let err = node.handle_call("explode", b"null").unwrap_err();
        assert!(matches!(err, CallError::UnknownFunction(_)));
        assert_eq!(err.code(), ErrorCode::UnknownFunction);
    }

    #[test]
    fn test_bad_args() {
        let node = node();
        let err = node.handle_call("kv_get", b"{}").unwrap_err();
        assert_eq!(err.code(), ErrorCode::BadRequest);
    }
}
