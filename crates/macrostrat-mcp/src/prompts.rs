//! MCP prompt templates for common geology questions
//!
//! Prompts guide an assistant through the Macrostrat tools. When the caller
//! supplies coordinates, a prompt pre-fetches what it can and appends a short
//! digest; a failed fetch is replaced by an apology paragraph so that
//! `prompts/get` itself only fails on bad arguments or unknown names.

use std::fmt::Write as _;

use macrostrat_lib::validate::{Coordinates, TileFormat};
use macrostrat_lib::{
    project, Enumerated, Gateway, NotFoundKind, ResponseType, TileScale, UnitDigest, UnitsQuery,
    MAX_ZOOM,
};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::types::{GetPromptParams, GetPromptResult, PromptMessage};
use crate::{Error, Result};

/// Units listed in a prompt digest before the list is cut short
const DIGEST_LIMIT: usize = 15;

const DEFAULT_ZOOM: &str = "10";

/// Prompt descriptor for MCP prompts/list
#[derive(Debug, Clone, Serialize)]
pub struct PromptDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub arguments: Vec<PromptArgument>,
}

/// Argument definition for prompt templates
#[derive(Debug, Clone, Serialize)]
pub struct PromptArgument {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
}

impl PromptArgument {
    const fn required(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            required: true,
        }
    }

    const fn optional(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            required: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptName {
    GeologicHistory,
    Bedrock,
    GeologicMap,
}

impl Enumerated for PromptName {
    const ALL: &'static [Self] = &[
        PromptName::GeologicHistory,
        PromptName::Bedrock,
        PromptName::GeologicMap,
    ];

    fn as_str(self) -> &'static str {
        match self {
            PromptName::GeologicHistory => "geologic-history",
            PromptName::Bedrock => "bedrock",
            PromptName::GeologicMap => "geologic-map",
        }
    }
}

impl PromptName {
    pub fn parse(name: &str) -> Result<Self> {
        Self::from_name(name).ok_or_else(|| Error::not_found(NotFoundKind::Prompt, name))
    }

    pub fn descriptor(self) -> PromptDescriptor {
        let lat = PromptArgument::optional(
            "lat",
            "Latitude of the location in decimal degrees; with lng, unit data is fetched \
             up front",
        );
        let lng = PromptArgument::optional(
            "lng",
            "Longitude of the location in decimal degrees; with lat, unit data is fetched \
             up front",
        );
        match self {
            PromptName::GeologicHistory => PromptDescriptor {
                name: self.as_str(),
                description: "Get the geologic history of a location",
                arguments: vec![
                    PromptArgument::required(
                        "location",
                        "The location to get the geologic history of",
                    ),
                    lat,
                    lng,
                    PromptArgument::optional(
                        "age",
                        "Age of interest in millions of years; selects units of that age",
                    ),
                ],
            },
            PromptName::Bedrock => PromptDescriptor {
                name: self.as_str(),
                description: "Get information about bedrock geology",
                arguments: vec![
                    PromptArgument::required(
                        "location",
                        "The location to get the bedrock information of",
                    ),
                    lat,
                    lng,
                ],
            },
            PromptName::GeologicMap => PromptDescriptor {
                name: self.as_str(),
                description: "Generate map tiles for visualizing geology of an area",
                arguments: vec![
                    PromptArgument::required(
                        "location",
                        "The location to create a geologic map for",
                    ),
                    PromptArgument::optional(
                        "zoom_level",
                        "Zoom level for the map (0-18, higher = more detailed)",
                    ),
                    PromptArgument::optional(
                        "scale",
                        "Map scale: carto (adaptive, default), tiny, small, medium, large",
                    ),
                    lat,
                    lng,
                ],
            },
        }
    }
}

/// Get all available prompt templates
pub fn list_prompts() -> Vec<PromptDescriptor> {
    PromptName::ALL.iter().map(|p| p.descriptor()).collect()
}

/// Render a prompt by name
pub async fn get_prompt(gateway: &Gateway, params: GetPromptParams) -> Result<GetPromptResult> {
    let prompt = PromptName::parse(&params.name)?;
    let args = PromptArgs::new(params.arguments.as_ref());
    info!(prompt = prompt.as_str(), "prompts/get");

    let text = match prompt {
        PromptName::GeologicHistory => geologic_history(gateway, &args).await?,
        PromptName::Bedrock => bedrock(gateway, &args).await?,
        PromptName::GeologicMap => geologic_map(gateway, &args)?,
    };

    Ok(GetPromptResult {
        description: prompt.descriptor().description.to_string(),
        messages: vec![PromptMessage::user(text)],
    })
}

async fn geologic_history(gateway: &Gateway, args: &PromptArgs<'_>) -> Result<String> {
    let location = args.required_text("location")?;
    let age = args.number("age")?;

    let mut text = format!(
        "Generate a comprehensive geologic history for the location: {location}. \
         Use the Macrostrat API to find columns and units in the area. \
         Use long responses to get detailed information."
    );
    if let Some(age) = age {
        let _ = write!(text, " Pay particular attention to the interval around {age} Ma.");
    }

    if let Some(coords) = args.coordinates()? {
        let query = UnitsQuery::new(coords.lat, coords.lng, ResponseType::Long, age)?;
        text.push_str(&units_section(gateway, &query).await);
    }
    Ok(text)
}

async fn bedrock(gateway: &Gateway, args: &PromptArgs<'_>) -> Result<String> {
    let location = args.required_text("location")?;

    let mut text = format!(
        "Get information about bedrock geology for the location {location} by using the \
         Macrostrat API to find the upper most units in the area. \
         Use long responses to get detailed information."
    );

    if let Some(coords) = args.coordinates()? {
        let query = UnitsQuery::new(coords.lat, coords.lng, ResponseType::Long, None)?;
        text.push_str(&units_section(gateway, &query).await);
    }
    Ok(text)
}

fn geologic_map(gateway: &Gateway, args: &PromptArgs<'_>) -> Result<String> {
    let location = args.required_text("location")?;
    let zoom = args.zoom("zoom_level")?;
    let scale = args.scale("scale")?;
    let scale_name = scale.as_str();

    let mut text = format!(
        "Create a geologic map visualization for {location}.\n\n\
         Step 1: Convert the location to precise latitude/longitude coordinates.\n\n\
         Step 2: Use the lat-lng-to-tile tool to convert the coordinates to tile coordinates \
         (x, y) for zoom level {zoom}.\n\n\
         Step 3: Use the map-tiles tool with the calculated x, y coordinates and zoom level \
         {zoom}, using \"{scale_name}\" scale. \
         Set fetch_image=true to retrieve the actual tile image for visual analysis.\n\n\
         Step 4: Analyze the geological map tile image to identify:\n\
         - Rock unit colors and patterns\n\
         - Geological formations and structures\n\
         - Fault lines and other linear features\n\
         - Age relationships between units\n\n\
         Step 5: Consider getting adjacent tiles (x±1, y±1) with fetch_image=true to show a \
         broader geological context.\n\n\
         Step 6: Provide both the tile URLs and detailed analysis of the geological features \
         visible in the map images."
    );

    if let Some(Coordinates { lat, lng }) = args.coordinates()? {
        let tile = project(lat, lng, zoom);
        let url = gateway.tile_url(scale, tile, TileFormat::Png)?;
        let _ = write!(
            text,
            "\n\nSteps 1 and 2 are already done for ({lat}, {lng}): \
             at zoom {z} the tile is x={x}, y={y}.\nTile URL: {url}",
            z = tile.z,
            x = tile.x,
            y = tile.y,
        );
    }
    Ok(text)
}

/// Fetch units and render them, or apologise when the fetch fails.
async fn units_section(gateway: &Gateway, query: &UnitsQuery) -> String {
    let (lat, lng) = (query.coords.lat, query.coords.lng);
    match gateway.fetch_units(query).await {
        Ok(units) => {
            let digest = UnitDigest::from_units(&units);
            format!(
                "\n\n## Macrostrat {} at ({lat}, {lng})\n\n{}",
                query.source_label(),
                digest.render(DIGEST_LIMIT)
            )
        }
        Err(err) => {
            warn!(error = %err, lat, lng, "prompt data fetch failed");
            format!(
                "\n\nI'm sorry, I could not retrieve {} from Macrostrat for ({lat}, {lng}): {err}. \
                 Please query the find-units and find-columns tools directly instead.",
                query.source_label()
            )
        }
    }
}

/// Prompt arguments. MCP sends them as strings; numbers are tolerated.
struct PromptArgs<'a> {
    map: Option<&'a Map<String, Value>>,
}

impl<'a> PromptArgs<'a> {
    fn new(map: Option<&'a Map<String, Value>>) -> Self {
        Self { map }
    }

    /// Trimmed, non-empty text form of an argument.
    fn text(&self, name: &str) -> Option<String> {
        let value = self.map?.get(name)?;
        let text = match value {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        (!text.is_empty()).then_some(text)
    }

    fn required_text(&self, name: &str) -> Result<String> {
        self.text(name)
            .ok_or_else(|| Error::invalid_param(name, "is required"))
    }

    fn number(&self, name: &str) -> Result<Option<f64>> {
        match self.text(name) {
            None => Ok(None),
            Some(raw) => raw
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Some)
                .ok_or_else(|| Error::invalid_param(name, "must be a number")),
        }
    }

    /// Both coordinates or neither, range-checked like tool coordinates.
    fn coordinates(&self) -> Result<Option<Coordinates>> {
        match (self.number("lat")?, self.number("lng")?) {
            (Some(lat), Some(lng)) => Ok(Some(Coordinates::new(lat, lng)?)),
            (None, None) => Ok(None),
            (Some(_), None) => Err(Error::invalid_param("lng", "is required when lat is given")),
            (None, Some(_)) => Err(Error::invalid_param("lat", "is required when lng is given")),
        }
    }

    fn zoom(&self, name: &str) -> Result<u8> {
        let raw = self.text(name).unwrap_or_else(|| DEFAULT_ZOOM.to_string());
        raw.parse::<u8>()
            .ok()
            .filter(|z| *z <= MAX_ZOOM)
            .ok_or_else(|| {
                Error::invalid_param(name, format!("must be an integer between 0 and {MAX_ZOOM}"))
            })
    }

    fn scale(&self, name: &str) -> Result<TileScale> {
        match self.text(name) {
            None => Ok(TileScale::Carto),
            Some(raw) => TileScale::from_name(&raw).ok_or_else(|| {
                Error::invalid_param(name, format!("must be one of: {}", TileScale::allowed()))
            }),
        }
    }
}
