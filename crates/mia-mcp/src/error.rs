//! Typed errors for MCP traffic

use std::time::Duration;
use thiserror::Error;

use crate::protocol::{INTERNAL_ERROR, INVALID_PARAMS, JsonRpcError, RESOURCE_NOT_FOUND};

/// Client-side failures talking to an MCP server
#[derive(Debug, Error)]
pub enum McpError {
    /// No response within the request deadline
    #[error("MCP request '{method}' timed out after {after:?}")]
    Timeout { method: String, after: Duration },

    /// The server closed its end of the channel
    #[error("MCP server closed connection")]
    Closed,

    /// The server answered with a JSON-RPC error object
    #[error("MCP error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The server sent something that is not valid MCP
    #[error("Invalid MCP message: {0}")]
    Protocol(String),

    #[error("MCP I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl McpError {
    /// Whether the failure is in the channel rather than the request
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Closed | Self::Io(_) | Self::Protocol(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl From<JsonRpcError> for McpError {
    fn from(error: JsonRpcError) -> Self {
        Self::Rpc {
            code: error.code,
            message: error.message,
        }
    }
}

/// Server-side failures raised by resource and prompt providers
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidParams(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ProviderError {
    /// JSON-RPC error code reported to the client
    pub fn code(&self) -> i64 {
        match self {
            Self::NotFound(_) => RESOURCE_NOT_FOUND,
            Self::InvalidParams(_) => INVALID_PARAMS,
            Self::Internal(_) => INTERNAL_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_classification() {
        assert!(McpError::Closed.is_transport());
        assert!(McpError::Protocol("not json".into()).is_transport());
        assert!(
            !McpError::Rpc {
                code: INVALID_PARAMS,
                message: "bad".into()
            }
            .is_transport()
        );
        let timeout = McpError::Timeout {
            method: "tools/call".into(),
            after: Duration::from_secs(30),
        };
        assert!(timeout.is_timeout());
        assert!(!timeout.is_transport());
        assert!(timeout.to_string().contains("tools/call"));
    }

    #[test]
    fn test_provider_error_codes() {
        assert_eq!(ProviderError::NotFound("file:///x".into()).code(), -32002);
        assert_eq!(ProviderError::InvalidParams("missing code".into()).code(), -32602);
        assert_eq!(ProviderError::Internal(anyhow::anyhow!("disk")).code(), -32603);
    }

    #[test]
    fn test_from_jsonrpc_error() {
        let err: McpError = JsonRpcError {
            code: -32601,
            message: "Unknown method: foo".into(),
            data: None,
        }
        .into();
        assert!(matches!(err, McpError::Rpc { code: -32601, .. }));
    }
}
