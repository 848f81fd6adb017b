//! MCP resources and roots
//!
//! Resources are the JSON-schema documents bundled with the library, one per
//! upstream entity type. Roots are the upstream endpoints the gateway talks to.

use macrostrat_lib::{schemas, GatewayConfig};

use crate::types::{ListResourcesResult, ListRootsResult, ReadResourceResult, ResourceContents};
use crate::Result;

/// Every schema resource in listing order
pub fn list_resources() -> ListResourcesResult {
    ListResourcesResult {
        resources: schemas::all(),
    }
}

/// Read one schema document by URI
pub fn read_resource(uri: &str) -> Result<ReadResourceResult> {
    let schema = schemas::get(uri)?;
    Ok(ReadResourceResult {
        contents: vec![ResourceContents {
            uri: schema.uri.to_string(),
            mime_type: schema.mime_type,
            text: schema.pretty_text()?,
        }],
    })
}

/// Upstream endpoints declared by the configuration
pub fn list_roots(config: &GatewayConfig) -> ListRootsResult {
    ListRootsResult {
        roots: config.roots.clone(),
    }
}
