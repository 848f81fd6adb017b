//! MCP (Model Context Protocol) server for the Macrostrat geology API
//!
//! This crate exposes the gateway in `macrostrat-lib` to AI assistants as a
//! stdio MCP server.
//!
//! # Architecture
//!
//! - `server`: dispatch router and line-delimited JSON-RPC transport
//! - `tools`: tool catalog and `tools/call`
//! - `prompts`: prompt templates, with optional pre-fetched unit digests
//! - `resources`: JSON-schema resources and upstream roots
//! - `types`: JSON-RPC envelope and MCP result payloads
//! - `error`: Error types and RFC 9457 problem details
//!
//! # Transport
//!
//! One JSON-RPC 2.0 message per line on stdin, one response per line on
//! stdout. All logging goes to stderr to keep stdout clean for the protocol.

pub mod error;
pub mod prompts;
pub mod resources;
pub mod server;
pub mod tools;
pub mod types;

pub use error::{Error, Result};
pub use server::{CapabilityRequest, McpServerState};
