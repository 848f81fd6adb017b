//! Macrostrat gateway library entry points.
//!
//! This crate holds everything the gateway decides or computes: the upstream
//! root table, argument validation, the web-mercator tile projector, request
//! translation against the Macrostrat API, and response shaping. Protocol
//! front-ends (the MCP server) should only depend on the items exported here
//! instead of reimplementing behavior.
//!
//! # Testing Support
//!
//! The [`test_utils`] module provides a local stand-in for the Macrostrat API
//! and tile server. Enable the `test-utils` feature to access it from dependent
//! crates.

pub mod config;
pub mod error;
pub mod inputs;
pub mod projection;
pub mod schemas;
pub mod shaping;
pub mod translate;
pub mod upstream;
pub mod validate;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{GatewayConfig, Root, RootRole};
pub use error::{Error, ImageFetchError, NotFoundKind, Result, UpstreamError};
pub use projection::{project, TileCoordinate, MAX_ZOOM};
pub use schemas::SchemaResource;
pub use shaping::{ContentPart, UnitDigest};
pub use translate::{Gateway, ToolOutput};
pub use upstream::{HttpUpstream, Upstream};
pub use validate::{Enumerated, ResponseType, TileScale, ToolCall, ToolName, UnitsQuery};
