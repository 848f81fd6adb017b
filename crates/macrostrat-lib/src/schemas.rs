//! Registry of JSON-schema documents describing upstream entity types.
//!
//! Schema documents live under `schemas/` and are compiled into the binary.
//! They are served as-is; no `$ref` resolution happens here.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, NotFoundKind, Result};

/// MIME type reported for every schema resource.
pub const SCHEMA_MIME_TYPE: &str = "application/schema+json";

/// A readable schema resource.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaResource {
    pub uri: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub mime_type: &'static str,
    #[serde(skip)]
    document: &'static str,
}

impl SchemaResource {
    const fn new(
        uri: &'static str,
        name: &'static str,
        description: &'static str,
        document: &'static str,
    ) -> Self {
        Self {
            uri,
            name,
            description,
            mime_type: SCHEMA_MIME_TYPE,
            document,
        }
    }

    /// Parse the schema document.
    pub fn document(&self) -> Result<Value> {
        Ok(serde_json::from_str(self.document)?)
    }

    /// Schema document rendered for a resource read.
    pub fn pretty_text(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.document()?)?)
    }
}

static SCHEMAS: [SchemaResource; 12] = [
    SchemaResource::new(
        "api_response",
        "API Response Wrapper Schema",
        "JSON schema for the standard Macrostrat API response wrapper containing success \
         metadata and data array",
        include_str!("../schemas/api_response.json"),
    ),
    SchemaResource::new(
        "units",
        "Units Response Schema",
        "JSON schema for the response from the units endpoint",
        include_str!("../schemas/units.json"),
    ),
    SchemaResource::new(
        "columns",
        "Columns Response Schema",
        "JSON schema for the response from the columns endpoint",
        include_str!("../schemas/columns.json"),
    ),
    SchemaResource::new(
        "minerals",
        "Minerals Response Schema",
        "JSON schema for the response from the defs/minerals endpoint",
        include_str!("../schemas/minerals.json"),
    ),
    SchemaResource::new(
        "lithologies",
        "Lithologies Response Schema",
        "JSON schema for the response from the defs/lithologies endpoint",
        include_str!("../schemas/lithologies.json"),
    ),
    SchemaResource::new(
        "environments",
        "Environments Response Schema",
        "JSON schema for the response from the defs/environments endpoint",
        include_str!("../schemas/environments.json"),
    ),
    SchemaResource::new(
        "timescales",
        "Timescales Response Schema",
        "JSON schema for the response from the defs/timescales endpoint",
        include_str!("../schemas/timescales.json"),
    ),
    SchemaResource::new(
        "intervals",
        "Intervals Response Schema",
        "JSON schema for the response from the defs/intervals endpoint",
        include_str!("../schemas/intervals.json"),
    ),
    SchemaResource::new(
        "econs",
        "Economic Uses Response Schema",
        "JSON schema for the response from the defs/econs endpoint",
        include_str!("../schemas/econs.json"),
    ),
    SchemaResource::new(
        "strat_names",
        "Stratigraphic Names Response Schema",
        "JSON schema for the response from the defs/strat_names endpoint",
        include_str!("../schemas/strat_names.json"),
    ),
    SchemaResource::new(
        "structures",
        "Structures Response Schema",
        "JSON schema for the response from the defs/structures endpoint",
        include_str!("../schemas/structures.json"),
    ),
    SchemaResource::new(
        "measurements",
        "Measurements Response Schema",
        "JSON schema for the response from the defs/measurements endpoint",
        include_str!("../schemas/measurements.json"),
    ),
];

static BY_URI: Lazy<HashMap<&'static str, &'static SchemaResource>> =
    Lazy::new(|| SCHEMAS.iter().map(|schema| (schema.uri, schema)).collect());

/// All schema resources in listing order.
pub fn all() -> &'static [SchemaResource] {
    &SCHEMAS
}

/// Look up a schema resource by URI.
pub fn get(uri: &str) -> Result<&'static SchemaResource> {
    BY_URI
        .get(uri)
        .copied()
        .ok_or_else(|| Error::not_found(NotFoundKind::Resource, uri))
}
