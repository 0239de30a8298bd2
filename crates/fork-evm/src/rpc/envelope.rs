use alloy_primitives::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{node::NodeError, tracers::decode_revert_reason, ForkError, StateError};

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Always `"2.0"`.
    #[serde(default = "version")]
    pub jsonrpc: String,
    /// Echoed in the response.
    #[serde(default)]
    pub id: Value,
    /// The procedure.
    pub method: String,
    /// Positional parameters.
    #[serde(default)]
    pub params: Value,
}

fn version() -> String {
    "2.0".to_string()
}

impl Request {
    /// A request with positional `params`.
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self { jsonrpc: version(), id: id.into(), method: method.into(), params }
    }
}

/// A JSON-RPC 2.0 response: exactly one of `result` and `error` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// The request id.
    pub id: Value,
    /// The result of a successful request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Why the request failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    /// A response to request `id`.
    pub fn new(id: Value, outcome: Result<Value, RpcError>) -> Self {
        let (result, error) = match outcome {
            Ok(result) => (Some(result), None),
            Err(error) => (None, Some(error)),
        };
        Self { jsonrpc: version(), id, result, error }
    }
}

/// The machine-readable class of an [`RpcError`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
pub enum ErrorKind {
    /// The request is not valid JSON.
    ParseError,
    /// The request is not a valid JSON-RPC request.
    InvalidRequest,
    /// The procedure does not exist.
    MethodNotFound,
    /// The parameters do not match the procedure.
    InvalidParams,
    /// The node failed.
    InternalError,
    /// The upstream of a forked node could not be reached.
    UpstreamError,
    /// The transaction is invalid.
    InvalidTransaction,
    /// The block or transaction does not exist.
    ResourceNotFound,
    /// The call reverted.
    ExecutionReverted,
    /// The call halted exceptionally.
    ExecutionHalted,
}

impl ErrorKind {
    /// The JSON-RPC error code.
    pub const fn code(self) -> i64 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::UpstreamError => -32005,
            Self::InvalidTransaction => -32003,
            Self::ResourceNotFound => -32001,
            Self::ExecutionReverted => 3,
            Self::ExecutionHalted => -32015,
        }
    }
}

/// A JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct RpcError {
    /// The JSON-RPC error code.
    pub code: i64,
    /// A human-readable description.
    pub message: String,
    /// The machine-readable class.
    pub kind: ErrorKind,
    /// Extra data, such as revert data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    /// An error of `kind`.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { code: kind.code(), message: message.into(), kind, data: None }
    }

    /// An [`ErrorKind::InvalidParams`] error.
    pub fn invalid_params(message: impl std::fmt::Display) -> Self {
        Self::new(ErrorKind::InvalidParams, message.to_string())
    }

    /// An [`ErrorKind::MethodNotFound`] error.
    pub fn method_not_found(method: &str) -> Self {
        Self::new(ErrorKind::MethodNotFound, format!("method {method} not found"))
    }

    /// An [`ErrorKind::ExecutionReverted`] error carrying the revert data.
    pub fn reverted(output: &Bytes) -> Self {
        let message = match decode_revert_reason(output) {
            Some(reason) => format!("execution reverted: {reason}"),
            None => "execution reverted".to_string(),
        };
        Self {
            data: Some(Value::String(output.to_string())),
            ..Self::new(ErrorKind::ExecutionReverted, message)
        }
    }
}

impl From<StateError> for RpcError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::Fork(err) => err.into(),
            err => Self::new(ErrorKind::InternalError, err.to_string()),
        }
    }
}

impl From<ForkError> for RpcError {
    fn from(err: ForkError) -> Self {
        Self::new(ErrorKind::UpstreamError, err.to_string())
    }
}

impl From<NodeError> for RpcError {
    fn from(err: NodeError) -> Self {
        match err {
            NodeError::InvalidTransaction(err) => {
                Self::new(ErrorKind::InvalidTransaction, err.to_string())
            }
            NodeError::State(err) => err.into(),
            NodeError::Fork(err) => err.into(),
            NodeError::TransactionNotFound(_) | NodeError::BlockNotFound(_) => {
                Self::new(ErrorKind::ResourceNotFound, err.to_string())
            }
            NodeError::Runtime(err) => Self::new(ErrorKind::InternalError, err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_layout() {
        let ok = serde_json::to_value(Response::new(json!(1), Ok(json!("0x1")))).unwrap();
        assert_eq!(ok, json!({ "jsonrpc": "2.0", "id": 1, "result": "0x1" }));

        let null = serde_json::to_value(Response::new(json!(2), Ok(Value::Null))).unwrap();
        assert_eq!(null, json!({ "jsonrpc": "2.0", "id": 2, "result": null }));

        let err = Response::new(json!("a"), Err(RpcError::method_not_found("eth_foo")));
        assert_eq!(
            serde_json::to_value(err).unwrap(),
            json!({
                "jsonrpc": "2.0",
                "id": "a",
                "error": {
                    "code": -32601,
                    "message": "method eth_foo not found",
                    "kind": "MethodNotFound",
                },
            })
        );
    }

    #[test]
    fn test_revert_error_carries_data() {
        let err = RpcError::reverted(&Bytes::from_static(&[0xde, 0xad]));
        assert_eq!(err.code, 3);
        assert_eq!(err.kind, ErrorKind::ExecutionReverted);
        assert_eq!(err.data, Some(json!("0xdead")));
        assert_eq!(err.message, "execution reverted");
    }

    #[test]
    fn test_request_defaults() {
        let request: Request = serde_json::from_str(r#"{"method":"eth_chainId"}"#).unwrap();
        assert_eq!(request.jsonrpc, "2.0");
        assert_eq!(request.id, Value::Null);
        assert_eq!(request.params, Value::Null);
    }
}
