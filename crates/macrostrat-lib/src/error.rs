use std::fmt;

use thiserror::Error;

/// Convenient result alias for the Macrostrat gateway library.
pub type Result<T> = std::result::Result<T, Error>;

/// Identifier families that can be looked up by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundKind {
    Tool,
    Prompt,
    Resource,
    RootRole,
}

impl fmt::Display for NotFoundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NotFoundKind::Tool => "tool",
            NotFoundKind::Prompt => "prompt",
            NotFoundKind::Resource => "resource",
            NotFoundKind::RootRole => "root role",
        };
        f.write_str(label)
    }
}

/// Failure reported by the upstream Macrostrat API.
///
/// `status` is `None` when the request never produced an HTTP response
/// (connection refused, DNS failure, timeout).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", format_upstream(.status, .status_text))]
pub struct UpstreamError {
    pub status: Option<u16>,
    pub status_text: String,
}

impl UpstreamError {
    pub fn http(status: u16, status_text: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            status_text: status_text.into(),
        }
    }

    pub fn transport(reason: impl Into<String>) -> Self {
        Self {
            status: None,
            status_text: reason.into(),
        }
    }
}

fn format_upstream(status: &Option<u16>, text: &str) -> String {
    match status {
        Some(code) => format!("upstream request failed: {} {}", code, text),
        None => format!("upstream request failed: {}", text),
    }
}

/// Failure while retrieving a binary map tile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to fetch image: {reason}")]
pub struct ImageFetchError {
    pub url: String,
    pub reason: String,
}

/// Top-level library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// A tool or prompt argument is missing or violates its constraint.
    #[error("invalid argument '{field}': {constraint}")]
    Validation { field: String, constraint: String },

    /// An unknown tool, prompt, resource or root role was requested.
    #[error("unknown {kind}: {name}")]
    NotFound { kind: NotFoundKind, name: String },

    /// A root role resolved to more than one root entry.
    #[error("root role {role} is ambiguous: {count} roots match")]
    AmbiguousRoot { role: String, count: usize },

    /// The gateway configuration is inconsistent.
    #[error("invalid gateway configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    ImageFetch(#[from] ImageFetchError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn validation(field: impl Into<String>, constraint: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            constraint: constraint.into(),
        }
    }

    pub fn not_found(kind: NotFoundKind, name: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// True for errors caused by the caller (bad arguments, unknown names).
    pub fn is_caller_fault(&self) -> bool {
        matches!(self, Error::Validation { .. } | Error::NotFound { .. })
    }
}
