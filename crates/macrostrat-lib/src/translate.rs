//! Tool execution: validated call in, upstream request out, shaped result back.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{GatewayConfig, RootRole};
use crate::error::{Error, ImageFetchError, Result, UpstreamError};
use crate::projection::{project, TileCoordinate};
use crate::shaping::{
    merge_references, ContentPart, MapTileOutput, TileFetch, TileInfo, TileMetadata,
};
use crate::upstream::{HttpUpstream, Upstream, UpstreamEnvelope};
use crate::validate::{
    ColumnsQuery, DefsQuery, Enumerated, MapTileArgs, MineralQuery, TileFormat,
    TileProjectionArgs, TileScale, ToolCall, UnitsQuery,
};

const TILE_PROJECTION_NOTE: &str = "Use these x,y coordinates with the map-tiles tool";

/// Result of a single tool execution, before it is rendered into content
/// parts.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Json(Value),
    Tile(MapTileOutput),
}

impl ToolOutput {
    pub fn into_content(self) -> Result<Vec<ContentPart>> {
        match self {
            ToolOutput::Json(value) => Ok(vec![ContentPart::json(&value)?]),
            ToolOutput::Tile(tile) => tile.into_content(),
        }
    }
}

/// Output of `lat-lng-to-tile`: the tile address plus the echoed inputs.
#[derive(Debug, Clone, Serialize)]
struct TileProjection {
    x: u32,
    y: u32,
    z: u8,
    lat: f64,
    lng: f64,
    zoom: u8,
    note: &'static str,
}

/// Translates validated tool calls into upstream requests.
///
/// Holds only read-only state; cloning is cheap and clones share the same
/// configuration and HTTP client.
#[derive(Clone)]
pub struct Gateway {
    config: Arc<GatewayConfig>,
    upstream: Arc<dyn Upstream>,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Gateway {
    /// Validate `config` and build a gateway backed by [`HttpUpstream`].
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let upstream = HttpUpstream::new(&config)?;
        Self::with_upstream(config, Arc::new(upstream))
    }

    /// Build a gateway on top of a caller-supplied upstream.
    pub fn with_upstream(config: GatewayConfig, upstream: Arc<dyn Upstream>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            upstream,
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Validate, execute and render a tool call by name.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<&Value>,
    ) -> Result<Vec<ContentPart>> {
        let call = ToolCall::parse(name, arguments)?;
        self.execute(call).await?.into_content()
    }

    pub async fn execute(&self, call: ToolCall) -> Result<ToolOutput> {
        info!(tool = %call.name(), "executing tool");
        match call {
            ToolCall::FindColumns(query) => self.find_columns(&query).await.map(ToolOutput::Json),
            ToolCall::FindUnits(query) => {
                let url = self.units_url(RootRole::Units, &query)?;
                let data = self.fetch_data(&url).await?;
                Ok(ToolOutput::Json(Value::Array(data)))
            }
            ToolCall::Defs(query) => self.defs(&query).await.map(ToolOutput::Json),
            ToolCall::DefsAutocomplete { query } => {
                let url = self.url(
                    RootRole::Base,
                    &["defs", "autocomplete"],
                    &[("query", query)],
                )?;
                self.fetch_body(&url).await.map(ToolOutput::Json)
            }
            ToolCall::MineralInfo(query) => self.mineral_info(&query).await.map(ToolOutput::Json),
            ToolCall::Timescale { age } => {
                let mut params = vec![("timescale_id", self.config.timescale_id.to_string())];
                if let Some(age) = age {
                    params.push(("age", age.to_string()));
                }
                let url = self.url(RootRole::Base, &["v2", "defs", "intervals"], &params)?;
                self.fetch_body(&url).await.map(ToolOutput::Json)
            }
            ToolCall::LatLngToTile(args) => Ok(ToolOutput::Json(lat_lng_to_tile(args)?)),
            ToolCall::MapTiles(args) => self.map_tile(args).await.map(ToolOutput::Tile),
        }
    }

    /// Units at a location.
    ///
    /// With an age the units endpoint is queried and its data returned as
    /// is. Without one the map-units endpoint is used and every unit gets its
    /// source reference attached.
    pub async fn fetch_units(&self, query: &UnitsQuery) -> Result<Vec<Value>> {
        match query.age {
            Some(_) => {
                let url = self.units_url(RootRole::Units, query)?;
                self.fetch_data(&url).await
            }
            None => {
                let url = self.units_url(RootRole::MapUnits, query)?;
                let body = self.upstream.get_json(&url).await?;
                let envelope = UpstreamEnvelope::from_body(body)?;
                let merged =
                    merge_references(envelope.success.data, envelope.success.refs.as_ref());
                debug!(units = merged.len(), "merged map unit references");
                Ok(merged)
            }
        }
    }

    /// Compute the tile URL for `tile` without touching the network.
    pub fn tile_url(
        &self,
        scale: TileScale,
        tile: TileCoordinate,
        format: TileFormat,
    ) -> Result<Url> {
        let z = tile.z.to_string();
        let x = tile.x.to_string();
        let file = format!("{}.{}", tile.y, format.as_str());
        self.url(
            RootRole::Tiles,
            &[scale.as_str(), z.as_str(), x.as_str(), file.as_str()],
            &[] as &[(&str, String)],
        )
    }

    async fn find_columns(&self, query: &ColumnsQuery) -> Result<Value> {
        let url = self.url(
            RootRole::Columns,
            &[],
            &[
                ("lat", query.coords.lat.to_string()),
                ("lng", query.coords.lng.to_string()),
                ("adjacents", query.adjacents.to_string()),
                ("response", query.response.as_str().to_string()),
            ],
        )?;
        Ok(Value::Array(self.fetch_data(&url).await?))
    }

    async fn defs(&self, query: &DefsQuery) -> Result<Value> {
        let url = self.url(
            RootRole::Base,
            &["defs", query.endpoint.as_str()],
            query.parameters.as_slice(),
        )?;
        self.fetch_body(&url).await
    }

    async fn mineral_info(&self, query: &MineralQuery) -> Result<Value> {
        let params: Vec<(&str, &String)> = [
            ("mineral", &query.mineral),
            ("mineral_type", &query.mineral_type),
            ("element", &query.element),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_ref().map(|v| (key, v)))
        .collect();
        let url = self.url(RootRole::Base, &["defs", "minerals"], &params)?;
        self.fetch_body(&url).await
    }

    async fn map_tile(&self, args: MapTileArgs) -> Result<MapTileOutput> {
        let url = self.tile_url(args.scale, args.tile, args.format)?;
        let metadata = TileMetadata {
            url: url.to_string(),
            scale: args.scale,
            z: args.tile.z,
            x: args.tile.x,
            y: args.tile.y,
            format: args.format,
            error: None,
            info: TileInfo::for_scale(args.scale),
        };

        let image = if args.fetch_image && args.format == TileFormat::Png {
            self.fetch_tile_image(&url).await
        } else {
            TileFetch::NotRequested
        };
        Ok(MapTileOutput { metadata, image })
    }

    async fn fetch_tile_image(&self, url: &Url) -> TileFetch {
        let failure = |reason: String| {
            warn!(url = %url, reason = %reason, "tile image unavailable, returning metadata only");
            TileFetch::Failed(ImageFetchError {
                url: url.to_string(),
                reason,
            })
        };
        match self.upstream.get_bytes(url).await {
            Ok(bytes) if bytes.is_empty() => failure("empty response body".to_string()),
            Ok(bytes) => {
                debug!(url = %url, bytes = bytes.len(), "fetched tile image");
                TileFetch::Fetched(bytes)
            }
            Err(err) => failure(image_failure_reason(&err)),
        }
    }

    fn units_url(&self, role: RootRole, query: &UnitsQuery) -> Result<Url> {
        let mut params = vec![
            ("lat", query.coords.lat.to_string()),
            ("lng", query.coords.lng.to_string()),
            ("response", query.response.as_str().to_string()),
        ];
        if let Some(age) = query.age {
            params.push(("age", age.to_string()));
        }
        self.url(role, &[], &params)
    }

    /// Resolve `role`, append `segments` to its path and attach `query`.
    fn url<K, V>(&self, role: RootRole, segments: &[&str], query: &[(K, V)]) -> Result<Url>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut url = self.config.endpoint(role)?;
        if !segments.is_empty() {
            url.path_segments_mut()
                .map_err(|_| Error::InvalidConfig(format!("root {} cannot carry a path", role)))?
                .pop_if_empty()
                .extend(segments);
        }
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (k.as_ref(), v.as_ref())));
        }
        Ok(url)
    }

    async fn fetch_body(&self, url: &Url) -> Result<Value> {
        Ok(self.upstream.get_json(url).await?)
    }

    async fn fetch_data(&self, url: &Url) -> Result<Vec<Value>> {
        let body = self.upstream.get_json(url).await?;
        Ok(UpstreamEnvelope::from_body(body)?.success.data)
    }
}

impl UnitsQuery {
    /// Human label for the endpoint this query hits.
    pub fn source_label(&self) -> &'static str {
        match self.age {
            Some(_) => "units",
            None => "map units",
        }
    }
}

fn lat_lng_to_tile(args: TileProjectionArgs) -> Result<Value> {
    let tile = project(args.coords.lat, args.coords.lng, args.zoom);
    Ok(serde_json::to_value(TileProjection {
        x: tile.x,
        y: tile.y,
        z: tile.z,
        lat: args.coords.lat,
        lng: args.coords.lng,
        zoom: args.zoom,
        note: TILE_PROJECTION_NOTE,
    })?)
}

fn image_failure_reason(err: &UpstreamError) -> String {
    match err.status {
        Some(code) => format!("HTTP {} {}", code, err.status_text),
        None => err.status_text.clone(),
    }
}
