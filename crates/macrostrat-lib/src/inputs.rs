//! Typed tool inputs
//!
//! Each tool's arguments deserialize into one of these structs. Their
//! `JsonSchema` derive is the input schema published in the tool catalog, so
//! the schema and the decoder cannot drift apart. Range checks that a schema
//! cannot express (tile indices bounded by the zoom) live in
//! [`crate::validate`].

use schemars::JsonSchema;
use serde::Deserialize;

use crate::validate::{DefsEndpoint, ResponseType, TileFormat, TileScale};

// ============================================================================
// ENTITY QUERIES
// ============================================================================

/// Input for the find-columns tool
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct FindColumnsInput {
    /// A valid latitude in decimal degrees
    #[schemars(range(min = -90, max = 90))]
    pub lat: f64,

    /// A valid longitude in decimal degrees
    #[schemars(range(min = -180, max = 180))]
    pub lng: f64,

    /// Include adjacent columns
    #[serde(default)]
    pub adjacents: bool,

    /// The length of response long or short
    #[serde(default, rename = "responseType")]
    pub response_type: ResponseType,
}

/// Input for the find-units tool
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct FindUnitsInput {
    /// A valid latitude in decimal degrees
    #[schemars(range(min = -90, max = 90))]
    pub lat: f64,

    /// A valid longitude in decimal degrees
    #[schemars(range(min = -180, max = 180))]
    pub lng: f64,

    /// The length of response long or short. Long provides lots of good details
    #[serde(default, rename = "responseType")]
    pub response_type: ResponseType,
}

/// Input for the defs tool
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DefsInput {
    /// The endpoint to query
    pub endpoint: DefsEndpoint,

    /// Parameters to pass to the endpoint, in query-string form (e.g. mineral=quartz)
    pub parameters: String,
}

/// Input for the defs-autocomplete tool
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DefsAutocompleteInput {
    /// The search term
    #[schemars(length(min = 1))]
    pub query: String,
}

/// Input for the mineral-info tool. Use one property.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct MineralInfoInput {
    /// The name of the mineral
    #[serde(default)]
    pub mineral: Option<String>,

    /// The type of mineral
    #[serde(default)]
    pub mineral_type: Option<String>,

    /// An element that the mineral is made of
    #[serde(default)]
    pub element: Option<String>,
}

/// Input for the timescale tool
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct TimescaleInput {
    /// Age in millions of years before present
    #[serde(default)]
    #[schemars(range(min = 0))]
    pub age: Option<f64>,
}

// ============================================================================
// MAP TILES
// ============================================================================

/// Input for the lat-lng-to-tile tool
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct LatLngToTileInput {
    /// Latitude in decimal degrees (-90 to 90)
    #[schemars(range(min = -90, max = 90))]
    pub lat: f64,

    /// Longitude in decimal degrees (-180 to 180)
    #[schemars(range(min = -180, max = 180))]
    pub lng: f64,

    /// Zoom level (0-18)
    #[schemars(range(max = 18))]
    pub zoom: u8,
}

/// Input for the map-tiles tool
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct MapTilesInput {
    /// Map scale layer. 'carto' selects the detail level from the zoom; other
    /// scales (tiny, small, medium, large) may have limited coverage.
    #[serde(default)]
    pub scale: TileScale,

    /// Zoom level (0-18). Typical values: z=3 (continent), z=6 (country),
    /// z=10 (city), z=15 (neighborhood)
    #[schemars(range(max = 18))]
    pub z: u8,

    /// Tile X coordinate; use the lat-lng-to-tile tool to calculate it
    pub x: u32,

    /// Tile Y coordinate; use the lat-lng-to-tile tool to calculate it
    pub y: u32,

    /// Tile format: 'png' for images, 'mvt' for vector tiles
    #[serde(default)]
    pub format: TileFormat,

    /// Fetch the PNG tile and return it as an image for visual analysis
    #[serde(default)]
    pub fetch_image: bool,
}
