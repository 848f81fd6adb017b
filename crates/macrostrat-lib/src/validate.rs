//! Tool argument validation.
//!
//! Every tool call arrives as a loosely typed JSON argument bag. This module
//! is the only place that looks at that bag: it decodes it into the tool's
//! typed input from [`crate::inputs`] (declared defaults fill absent fields),
//! checks the ranges, and produces a typed [`ToolCall`]. Nothing downstream
//! ever sees the raw arguments.

use std::fmt;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, NotFoundKind, Result};
use crate::inputs::{
    DefsAutocompleteInput, DefsInput, FindColumnsInput, FindUnitsInput, LatLngToTileInput,
    MapTilesInput, MineralInfoInput, TimescaleInput,
};
use crate::projection::{tiles_per_axis, TileCoordinate, MAX_ZOOM};

/// A closed set of string values accepted by an argument.
pub trait Enumerated: Sized + Copy + 'static {
    const ALL: &'static [Self];

    fn as_str(self) -> &'static str;

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.as_str() == name)
    }

    fn allowed() -> String {
        Self::ALL
            .iter()
            .map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Declare a closed string enum. The wire name of each variant is given once
/// and drives both `as_str` and the serde representation.
macro_rules! enumerated {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident => $text:tt),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
        )]
        pub enum $name {
            $($(#[$vmeta])* #[serde(rename = $text)] $variant),+
        }

        impl Enumerated for $name {
            const ALL: &'static [Self] = &[$($name::$variant),+];

            fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

enumerated! {
    /// Every tool the gateway exposes.
    ToolName {
        FindColumns => "find-columns",
        FindUnits => "find-units",
        Defs => "defs",
        DefsAutocomplete => "defs-autocomplete",
        MineralInfo => "mineral-info",
        Timescale => "timescale",
        LatLngToTile => "lat-lng-to-tile",
        MapTiles => "map-tiles",
    }
}

impl ToolName {
    /// Resolve a tool name; unknown names are an error, never a no-op.
    pub fn parse(name: &str) -> Result<Self> {
        Self::from_name(name).ok_or_else(|| Error::not_found(NotFoundKind::Tool, name))
    }
}

enumerated! {
    /// Upstream response verbosity.
    #[derive(Default)]
    ResponseType {
        #[default]
        Long => "long",
        Short => "short",
    }
}

enumerated! {
    /// Dictionary routes under `/defs`.
    DefsEndpoint {
        Lithologies => "lithologies",
        Structures => "structures",
        Columns => "columns",
        Econs => "econs",
        Minerals => "minerals",
        Timescales => "timescales",
        Environments => "environments",
        StratNames => "strat_names",
        Measurements => "measurements",
        Intervals => "intervals",
    }
}

enumerated! {
    /// Tile layer scale on the tile server.
    #[derive(Default)]
    TileScale {
        #[default]
        Carto => "carto",
        Tiny => "tiny",
        Small => "small",
        Medium => "medium",
        Large => "large",
    }
}

enumerated! {
    /// Tile encoding.
    #[derive(Default)]
    TileFormat {
        #[default]
        Png => "png",
        Mvt => "mvt",
    }
}

/// A validated latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Result<Self> {
        Ok(Self {
            lat: check_range("lat", lat, -90.0, 90.0)?,
            lng: check_range("lng", lng, -180.0, 180.0)?,
        })
    }
}

fn check_range(field: &str, value: f64, min: f64, max: f64) -> Result<f64> {
    if !value.is_finite() || value < min || value > max {
        return Err(Error::validation(
            field,
            format!("must be a number between {} and {}", min, max),
        ));
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnsQuery {
    pub coords: Coordinates,
    pub adjacents: bool,
    pub response: ResponseType,
}

/// Units lookup. With an `age` the units endpoint is queried directly;
/// without one the map-units endpoint is used.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitsQuery {
    pub coords: Coordinates,
    pub response: ResponseType,
    pub age: Option<f64>,
}

impl UnitsQuery {
    pub fn new(lat: f64, lng: f64, response: ResponseType, age: Option<f64>) -> Result<Self> {
        Ok(Self {
            coords: Coordinates::new(lat, lng)?,
            response,
            age: age.map(check_age).transpose()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DefsQuery {
    pub endpoint: DefsEndpoint,
    pub parameters: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MineralQuery {
    pub mineral: Option<String>,
    pub mineral_type: Option<String>,
    pub element: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileProjectionArgs {
    pub coords: Coordinates,
    pub zoom: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapTileArgs {
    pub scale: TileScale,
    pub tile: TileCoordinate,
    pub format: TileFormat,
    pub fetch_image: bool,
}

/// A validated tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    FindColumns(ColumnsQuery),
    FindUnits(UnitsQuery),
    Defs(DefsQuery),
    DefsAutocomplete { query: String },
    MineralInfo(MineralQuery),
    Timescale { age: Option<f64> },
    LatLngToTile(TileProjectionArgs),
    MapTiles(MapTileArgs),
}

impl ToolCall {
    /// Validate `arguments` for the tool called `name`.
    pub fn parse(name: &str, arguments: Option<&Value>) -> Result<Self> {
        let tool = ToolName::parse(name)?;
        Self::from_arguments(tool, arguments)
    }

    pub fn from_arguments(tool: ToolName, arguments: Option<&Value>) -> Result<Self> {
        let args = argument_map(arguments)?;
        let call = match tool {
            ToolName::FindColumns => {
                ToolCall::FindColumns(decode::<FindColumnsInput>(&args)?.validate()?)
            }
            ToolName::FindUnits => {
                ToolCall::FindUnits(decode::<FindUnitsInput>(&args)?.validate()?)
            }
            ToolName::Defs => {
                let input: DefsInput = decode(&args)?;
                ToolCall::Defs(DefsQuery {
                    endpoint: input.endpoint,
                    parameters: parse_query_string(&input.parameters),
                })
            }
            ToolName::DefsAutocomplete => {
                let input: DefsAutocompleteInput = decode(&args)?;
                if input.query.trim().is_empty() {
                    return Err(Error::validation("query", "must not be empty"));
                }
                ToolCall::DefsAutocomplete { query: input.query }
            }
            ToolName::MineralInfo => {
                let input: MineralInfoInput = decode(&args)?;
                ToolCall::MineralInfo(MineralQuery {
                    mineral: non_empty(input.mineral),
                    mineral_type: non_empty(input.mineral_type),
                    element: non_empty(input.element),
                })
            }
            ToolName::Timescale => {
                let input: TimescaleInput = decode(&args)?;
                ToolCall::Timescale {
                    age: input.age.map(check_age).transpose()?,
                }
            }
            ToolName::LatLngToTile => {
                ToolCall::LatLngToTile(decode::<LatLngToTileInput>(&args)?.validate()?)
            }
            ToolName::MapTiles => {
                ToolCall::MapTiles(decode::<MapTilesInput>(&args)?.validate()?)
            }
        };
        Ok(call)
    }

    pub fn name(&self) -> ToolName {
        match self {
            ToolCall::FindColumns(_) => ToolName::FindColumns,
            ToolCall::FindUnits(_) => ToolName::FindUnits,
            ToolCall::Defs(_) => ToolName::Defs,
            ToolCall::DefsAutocomplete { .. } => ToolName::DefsAutocomplete,
            ToolCall::MineralInfo(_) => ToolName::MineralInfo,
            ToolCall::Timescale { .. } => ToolName::Timescale,
            ToolCall::LatLngToTile(_) => ToolName::LatLngToTile,
            ToolCall::MapTiles(_) => ToolName::MapTiles,
        }
    }
}

/// Split a `key=value&...` string into decoded pairs. A leading `?` is ignored.
pub fn parse_query_string(raw: &str) -> Vec<(String, String)> {
    let trimmed = raw.trim().trim_start_matches('?');
    url::form_urlencoded::parse(trimmed.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

impl FindColumnsInput {
    fn validate(self) -> Result<ColumnsQuery> {
        Ok(ColumnsQuery {
            coords: Coordinates::new(self.lat, self.lng)?,
            adjacents: self.adjacents,
            response: self.response_type,
        })
    }
}

impl FindUnitsInput {
    fn validate(self) -> Result<UnitsQuery> {
        UnitsQuery::new(self.lat, self.lng, self.response_type, None)
    }
}

impl LatLngToTileInput {
    fn validate(self) -> Result<TileProjectionArgs> {
        Ok(TileProjectionArgs {
            coords: Coordinates::new(self.lat, self.lng)?,
            zoom: check_zoom("zoom", self.zoom)?,
        })
    }
}

impl MapTilesInput {
    fn validate(self) -> Result<MapTileArgs> {
        let z = check_zoom("z", self.z)?;
        let max_index = tiles_per_axis(z) - 1;
        for (field, index) in [("x", self.x), ("y", self.y)] {
            if index > max_index {
                return Err(Error::validation(
                    field,
                    format!("must be an integer between 0 and {}", max_index),
                ));
            }
        }
        Ok(MapTileArgs {
            scale: self.scale,
            tile: TileCoordinate {
                x: self.x,
                y: self.y,
                z,
            },
            format: self.format,
            fetch_image: self.fetch_image,
        })
    }
}

fn check_zoom(field: &str, zoom: u8) -> Result<u8> {
    if zoom > MAX_ZOOM {
        return Err(Error::validation(
            field,
            format!("must be an integer between 0 and {}", MAX_ZOOM),
        ));
    }
    Ok(zoom)
}

fn check_age(age: f64) -> Result<f64> {
    if !age.is_finite() || age < 0.0 {
        return Err(Error::validation(
            "age",
            "must be a non-negative age in millions of years",
        ));
    }
    Ok(age)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// The argument bag as an object. `null` members count as absent.
fn argument_map(arguments: Option<&Value>) -> Result<Map<String, Value>> {
    match arguments {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()),
        Some(_) => Err(Error::validation("arguments", "must be a JSON object")),
    }
}

/// Deserialize a typed input, naming the offending argument on failure.
fn decode<T: DeserializeOwned>(args: &Map<String, Value>) -> Result<T> {
    let message = match serde_json::from_value(Value::Object(args.clone())) {
        Ok(input) => return Ok(input),
        Err(err) => err.to_string(),
    };
    if let Some(field) = missing_field(&message) {
        return Err(Error::validation(field, "is required"));
    }

    // The culprit is the one argument whose removal clears the failure.
    let culprit = args.keys().find(|key| {
        let mut rest = args.clone();
        rest.remove(key.as_str());
        match serde_json::from_value::<T>(Value::Object(rest)) {
            Ok(_) => true,
            Err(err) => missing_field(&err.to_string()) == Some(key.as_str()),
        }
    });
    let field = culprit.map_or("arguments", String::as_str);
    Err(Error::validation(field, message))
}

fn missing_field(message: &str) -> Option<&str> {
    message.strip_prefix("missing field `")?.strip_suffix('`')
}
