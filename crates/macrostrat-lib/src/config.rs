//! Gateway configuration and the upstream root table.
//!
//! The gateway is configured entirely by compiled-in constants. A
//! [`GatewayConfig`] is built once at start-up, validated, and then shared
//! read-only with everything that needs to resolve an upstream endpoint.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use url::Url;

use crate::error::{Error, NotFoundKind, Result};

/// Main Macrostrat REST API base.
pub const MACROSTRAT_API_BASE: &str = "https://macrostrat.org/api";

/// Macrostrat raster/vector tile server.
pub const MACROSTRAT_TILES_BASE: &str = "https://tiles.macrostrat.org";

/// Timescale used by the `timescale` tool (international chronostratigraphy).
pub const INTERNATIONAL_TIMESCALE_ID: u32 = 11;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Logical upstream endpoint roles used by the translator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootRole {
    Base,
    Units,
    MapUnits,
    Columns,
    Tiles,
}

impl RootRole {
    pub const ALL: [RootRole; 5] = [
        RootRole::Base,
        RootRole::Units,
        RootRole::MapUnits,
        RootRole::Columns,
        RootRole::Tiles,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RootRole::Base => "base",
            RootRole::Units => "units",
            RootRole::MapUnits => "map-units",
            RootRole::Columns => "columns",
            RootRole::Tiles => "tiles",
        }
    }
}

impl fmt::Display for RootRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared upstream endpoint, as reported by `roots/list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Root {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub uri: String,
    pub name: &'static str,
    pub description: &'static str,
    #[serde(skip)]
    pub role: Option<RootRole>,
}

impl Root {
    fn api(
        uri: String,
        name: &'static str,
        description: &'static str,
        role: Option<RootRole>,
    ) -> Self {
        Self {
            kind: "api",
            uri,
            name,
            description,
            role,
        }
    }
}

/// Immutable gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub roots: Vec<Root>,
    pub timescale_id: u32,
    pub user_agent: String,
    /// Per-request upstream timeout; `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::with_endpoints(MACROSTRAT_API_BASE, MACROSTRAT_TILES_BASE)
    }
}

impl GatewayConfig {
    /// Build the standard root table from an API base and a tiles base.
    ///
    /// Trailing slashes are stripped so sub-paths join cleanly.
    pub fn with_endpoints(api_base: &str, tiles_base: &str) -> Self {
        let api = api_base.trim_end_matches('/');
        let tiles = tiles_base.trim_end_matches('/');

        let roots = vec![
            Root::api(
                api.to_string(),
                "Macrostrat API",
                "Main Macrostrat API endpoint",
                Some(RootRole::Base),
            ),
            Root::api(
                format!("{api}/geologic_units/map"),
                "Macrostrat Map Units API",
                "Endpoint for querying geologic map units",
                Some(RootRole::MapUnits),
            ),
            Root::api(
                format!("{api}/units"),
                "Macrostrat Units API",
                "Endpoint for querying geologic units",
                Some(RootRole::Units),
            ),
            Root::api(
                format!("{api}/columns"),
                "Macrostrat Columns API",
                "Endpoint for querying stratigraphic columns",
                Some(RootRole::Columns),
            ),
            Root::api(
                format!("{api}/defs"),
                "Macrostrat Definitions API",
                "Endpoint for querying definitions and dictionaries",
                None,
            ),
            Root::api(
                tiles.to_string(),
                "Macrostrat Tiles API",
                "Endpoint for querying map tiles with geologic data",
                Some(RootRole::Tiles),
            ),
        ];

        Self {
            roots,
            timescale_id: INTERNATIONAL_TIMESCALE_ID,
            user_agent: user_agent(),
            request_timeout: Some(DEFAULT_TIMEOUT),
        }
    }

    /// Override the upstream timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Resolve a logical role to the single root that serves it.
    pub fn resolve(&self, role: RootRole) -> Result<&Root> {
        let mut matches = self.roots.iter().filter(|root| root.role == Some(role));
        let first = matches
            .next()
            .ok_or_else(|| Error::not_found(NotFoundKind::RootRole, role.as_str()))?;
        let extra = matches.count();
        if extra > 0 {
            return Err(Error::AmbiguousRoot {
                role: role.to_string(),
                count: extra + 1,
            });
        }
        Ok(first)
    }

    /// Resolve a role and parse its URI.
    pub fn endpoint(&self, role: RootRole) -> Result<Url> {
        let root = self.resolve(role)?;
        Url::parse(&root.uri)
            .map_err(|e| Error::InvalidConfig(format!("root {} is not a URL: {}", root.uri, e)))
    }

    /// Check that every role resolves to exactly one root and all root URIs
    /// are absolute URLs.
    pub fn validate(&self) -> Result<()> {
        for role in RootRole::ALL {
            self.resolve(role)?;
        }
        for root in &self.roots {
            Url::parse(&root.uri).map_err(|e| {
                Error::InvalidConfig(format!("root {} is not a URL: {}", root.uri, e))
            })?;
        }
        let mut uris: Vec<&str> = self.roots.iter().map(|r| r.uri.as_str()).collect();
        uris.sort_unstable();
        let before = uris.len();
        uris.dedup();
        if uris.len() != before {
            return Err(Error::InvalidConfig("root URIs must be unique".to_string()));
        }
        Ok(())
    }
}

fn user_agent() -> String {
    format!(
        "macrostrat-lib/{version} (+{home})",
        version = env!("CARGO_PKG_VERSION"),
        home = "https://macrostrat.org"
    )
}
