//! Error types and RFC 9457-style problem details for the MCP server
//!
//! Every failure leaving the router is an [`Error`]. It carries an HTTP-like
//! status code which selects the JSON-RPC error code, and the whole problem
//! document travels in the JSON-RPC `error.data` member.

use macrostrat_lib::{NotFoundKind, UpstreamError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Result type for MCP operations
pub type Result<T> = std::result::Result<T, Error>;

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// MCP Server error type implementing RFC 9457 Problem Details
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq)]
#[error("{message}")]
pub struct Error {
    /// HTTP status-like code (e.g., 400, 404, 502)
    pub code: i32,

    /// Human-readable error message
    pub message: String,

    /// Machine-readable problem type URI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,

    /// Additional error context (e.g., offending field, upstream status)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl Error {
    /// Create a new error with a code and message
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            r#type: None,
            context: None,
        }
    }

    /// Add a problem type URI
    pub fn with_type(mut self, type_uri: impl Into<String>) -> Self {
        self.r#type = Some(type_uri.into());
        self
    }

    /// Add context information as JSON
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    /// Invalid parameter error
    pub fn invalid_param(param: impl Into<String>, reason: impl Into<String>) -> Self {
        let p = param.into();
        let reason = reason.into();
        Self::new(400, format!("Invalid parameter '{}': {}", p, reason))
            .with_type("https://macrostrat.local/errors/invalid-parameter")
            .with_context(json!({
                "parameter": p,
                "reason": reason
            }))
    }

    /// Unknown tool, prompt, resource or root role
    pub fn not_found(kind: NotFoundKind, name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(404, format!("Unknown {}: {}", kind, name))
            .with_type("https://macrostrat.local/errors/not-found")
            .with_context(json!({
                "kind": kind.to_string(),
                "name": name
            }))
    }

    /// Upstream Macrostrat failure, reported with its status when one exists
    pub fn upstream(err: &UpstreamError) -> Self {
        Self::new(502, err.to_string())
            .with_type("https://macrostrat.local/errors/upstream")
            .with_context(json!({
                "status": err.status,
                "status_text": err.status_text
            }))
    }

    /// Protocol method the router does not know
    pub fn method_not_found(method: impl Into<String>) -> Self {
        let method = method.into();
        Self::new(405, format!("Method not found: {}", method))
            .with_type("https://macrostrat.local/errors/method-not-found")
            .with_context(json!({ "method": method }))
    }

    /// Well-formed JSON that is not a valid request
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::new(422, format!("Invalid request: {}", reason.into()))
            .with_type("https://macrostrat.local/errors/invalid-request")
    }

    /// A line that is not JSON at all
    pub fn parse_error(reason: impl Into<String>) -> Self {
        Self::new(PARSE_ERROR, format!("Parse error: {}", reason.into()))
            .with_type("https://macrostrat.local/errors/parse-error")
    }

    /// Internal server error
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::new(500, format!("Internal server error: {}", reason.into()))
            .with_type("https://macrostrat.local/errors/internal-error")
    }

    /// JSON-RPC error code for this problem
    pub fn rpc_code(&self) -> i32 {
        match self.code {
            400 | 404 => INVALID_PARAMS,
            405 => METHOD_NOT_FOUND,
            422 => INVALID_REQUEST,
            PARSE_ERROR => PARSE_ERROR,
            _ => INTERNAL_ERROR,
        }
    }
}

impl From<macrostrat_lib::Error> for Error {
    fn from(err: macrostrat_lib::Error) -> Self {
        use macrostrat_lib::Error as LibError;
        match err {
            LibError::Validation { field, constraint } => Error::invalid_param(field, constraint),
            LibError::NotFound { kind, name } => Error::not_found(kind, name),
            LibError::Upstream(upstream) => Error::upstream(&upstream),
            LibError::ImageFetch(image) => Error::new(502, image.to_string())
                .with_type("https://macrostrat.local/errors/image-fetch")
                .with_context(json!({ "url": image.url })),
            other => Error::internal(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::internal(err.to_string())
    }
}
