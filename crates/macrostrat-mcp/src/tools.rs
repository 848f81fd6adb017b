//! MCP tool catalog and invocation
//!
//! The catalog is derived from [`ToolName::ALL`], so every tool the router can
//! dispatch is listed and every listed tool can be dispatched. Input schemas
//! are generated from the typed inputs in `macrostrat_lib::inputs`, the same
//! types the arguments are decoded into.

use macrostrat_lib::inputs::{
    DefsAutocompleteInput, DefsInput, FindColumnsInput, FindUnitsInput, LatLngToTileInput,
    MapTilesInput, MineralInfoInput, TimescaleInput,
};
use macrostrat_lib::{Enumerated, Gateway, ToolName};
use schemars::generate::SchemaSettings;
use schemars::JsonSchema;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::types::{CallToolParams, CallToolResult};
use crate::Result;

/// Tool entry returned by `tools/list`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

/// Every tool in listing order
pub fn list_tools() -> Vec<ToolDescriptor> {
    ToolName::ALL.iter().copied().map(descriptor).collect()
}

/// Validate and run a `tools/call` request
pub async fn call_tool(gateway: &Gateway, params: CallToolParams) -> Result<CallToolResult> {
    info!(tool = %params.name, "tools/call");
    let content = gateway
        .call_tool(&params.name, params.arguments.as_ref())
        .await?;
    Ok(CallToolResult { content })
}

fn descriptor(tool: ToolName) -> ToolDescriptor {
    let (description, input_schema) = match tool {
        ToolName::FindColumns => (
            "Query Macrostrat stratigraphic columns",
            input_schema::<FindColumnsInput>(),
        ),
        ToolName::FindUnits => (
            "Query Macrostrat geologic units",
            input_schema::<FindUnitsInput>(),
        ),
        ToolName::Defs => (
            "Routes giving access to standard fields and dictionaries used in Macrostrat",
            input_schema::<DefsInput>(),
        ),
        ToolName::DefsAutocomplete => (
            "Quickly retrieve all definitions matching a query. Limited to 100 results",
            input_schema::<DefsAutocompleteInput>(),
        ),
        ToolName::MineralInfo => (
            "Get information about a mineral, use one property",
            input_schema::<MineralInfoInput>(),
        ),
        ToolName::Timescale => (
            "Get information about a time period",
            input_schema::<TimescaleInput>(),
        ),
        ToolName::LatLngToTile => (
            "Convert latitude/longitude coordinates to map tile coordinates (x, y) for a \
             given zoom level. Uses the standard web mercator tiling scheme.",
            input_schema::<LatLngToTileInput>(),
        ),
        ToolName::MapTiles => (
            "Get map tile URLs from the Macrostrat tiles server. Use lat-lng-to-tile tool \
             first to get proper x,y coordinates. Defaults to 'carto' scale which \
             automatically adapts detail level to zoom.",
            input_schema::<MapTilesInput>(),
        ),
    };

    ToolDescriptor {
        name: tool.as_str(),
        description,
        input_schema,
    }
}

/// JSON schema for a tool input with every enum inlined into its property.
fn input_schema<T: JsonSchema>() -> Value {
    let schema = SchemaSettings::default()
        .with(|settings| settings.inline_subschemas = true)
        .into_generator()
        .into_root_schema_for::<T>();
    let mut value = schema.to_value();
    if let Some(object) = value.as_object_mut() {
        for key in ["$schema", "title", "description"] {
            object.remove(key);
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_lists_every_tool_in_order() {
        let tools = list_tools();
        let names: Vec<_> = tools.iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec![
                "find-columns",
                "find-units",
                "defs",
                "defs-autocomplete",
                "mineral-info",
                "timescale",
                "lat-lng-to-tile",
                "map-tiles",
            ]
        );
    }

    #[test]
    fn test_every_listed_tool_resolves() {
        for tool in list_tools() {
            assert!(ToolName::parse(tool.name).is_ok(), "{}", tool.name);
            assert_eq!(tool.input_schema["type"], "object");
        }
    }

    #[test]
    fn test_defs_schema_enumerates_endpoints() {
        let tools = list_tools();
        let defs = tools.iter().find(|t| t.name == "defs").unwrap();
        let endpoints = defs.input_schema["properties"]["endpoint"]["enum"]
            .as_array()
            .unwrap();
        assert_eq!(endpoints.len(), 10);
        assert!(endpoints.iter().any(|e| e == "strat_names"));
    }

    #[test]
    fn test_required_lists_follow_input_defaults() {
        let tools = list_tools();
        let required = |name: &str| -> Vec<String> {
            let tool = tools.iter().find(|t| t.name == name).unwrap();
            let mut fields: Vec<String> = tool.input_schema["required"]
                .as_array()
                .map(|list| {
                    list.iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default();
            fields.sort();
            fields
        };
        assert_eq!(required("find-columns"), vec!["lat", "lng"]);
        assert_eq!(required("map-tiles"), vec!["x", "y", "z"]);
        assert!(required("timescale").is_empty());
        assert!(required("mineral-info").is_empty());
    }

    #[test]
    fn test_map_tiles_schema_defaults() {
        let tools = list_tools();
        let tiles = tools.iter().find(|t| t.name == "map-tiles").unwrap();
        let props = &tiles.input_schema["properties"];
        assert_eq!(props["scale"]["default"], "carto");
        assert_eq!(props["format"]["default"], "png");
        assert_eq!(props["fetch_image"]["default"], false);
        assert_eq!(props["z"]["maximum"].as_f64(), Some(18.0));
        assert_eq!(props["scale"]["enum"].as_array().map(Vec::len), Some(5));
    }

    #[test]
    fn test_descriptor_serializes_input_schema_camel_case() {
        let value = serde_json::to_value(&list_tools()[0]).unwrap();
        assert!(value.get("inputSchema").is_some());
        let lat = &value["inputSchema"]["properties"]["lat"];
        assert_eq!(lat["maximum"].as_f64(), Some(90.0));
        assert_eq!(lat["description"], "A valid latitude in decimal degrees");
    }
}
