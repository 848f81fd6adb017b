//! Post-processing of upstream payloads.
//!
//! - reference merging for map-unit responses
//! - tile metadata and optional embedded PNG
//! - short natural-language digests of unit lists for prompts

use std::fmt::Write as _;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{ImageFetchError, Result};
use crate::validate::{Enumerated, TileFormat, TileScale};

pub const TILE_LICENSE: &str = "CC BY 4.0 International";
pub const TILE_ATTRIBUTION: &str = "Macrostrat and original data providers";
const TILE_LAYERS: [&str; 2] = ["units", "lines"];
const TILE_IMAGE_NOTE: &str = "Geological map tile image provided below for visual analysis";

/// One typed part of a tool result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentPart {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    /// Pretty-printed JSON text part.
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        Ok(ContentPart::text(serde_json::to_string_pretty(value)?))
    }
}

/// Attach `references = refs[unit.source_id]` (or `null`) to every unit.
///
/// Order and count of units are preserved. Non-object entries pass through
/// untouched.
pub fn merge_references(units: Vec<Value>, refs: Option<&Map<String, Value>>) -> Vec<Value> {
    units
        .into_iter()
        .map(|unit| match unit {
            Value::Object(mut fields) => {
                let reference = fields
                    .get("source_id")
                    .and_then(reference_key)
                    .and_then(|key| refs.and_then(|r| r.get(&key)))
                    .cloned()
                    .unwrap_or(Value::Null);
                fields.insert("references".to_string(), reference);
                Value::Object(fields)
            }
            other => other,
        })
        .collect()
}

fn reference_key(source_id: &Value) -> Option<String> {
    match source_id {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

/// Descriptive metadata for a map tile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileMetadata {
    pub url: String,
    pub scale: TileScale,
    pub z: u8,
    pub x: u32,
    pub y: u32,
    pub format: TileFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub info: TileInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileInfo {
    pub layers: [&'static str; 2],
    pub description: String,
    pub license: &'static str,
    pub attribution: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<&'static str>,
}

impl TileInfo {
    pub fn for_scale(scale: TileScale) -> Self {
        let description = match scale {
            TileScale::Carto => {
                "Adaptive geological map that selects appropriate detail level based on zoom"
                    .to_string()
            }
            other => format!(
                "Maps from the \"{}\" scale (may have limited geographic coverage)",
                other.as_str()
            ),
        };
        Self {
            layers: TILE_LAYERS,
            description,
            license: TILE_LICENSE,
            attribution: TILE_ATTRIBUTION,
            note: None,
        }
    }
}

/// Outcome of the optional binary tile fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum TileFetch {
    NotRequested,
    Fetched(Vec<u8>),
    Failed(ImageFetchError),
}

/// A map-tile result: full data, or metadata plus the reason the image is
/// missing.
#[derive(Debug, Clone, PartialEq)]
pub struct MapTileOutput {
    pub metadata: TileMetadata,
    pub image: TileFetch,
}

impl MapTileOutput {
    /// Render into content parts.
    ///
    /// A fetched image yields a text part and an image part; a failed fetch
    /// yields the text part annotated with `error`.
    pub fn into_content(self) -> Result<Vec<ContentPart>> {
        let mut metadata = self.metadata;
        match self.image {
            TileFetch::NotRequested => Ok(vec![ContentPart::json(&metadata)?]),
            TileFetch::Failed(err) => {
                metadata.error = Some(err.to_string());
                Ok(vec![ContentPart::json(&metadata)?])
            }
            TileFetch::Fetched(bytes) => {
                metadata.info.note = Some(TILE_IMAGE_NOTE);
                Ok(vec![
                    ContentPart::json(&metadata)?,
                    ContentPart::Image {
                        data: BASE64.encode(bytes),
                        mime_type: "image/png".to_string(),
                    },
                ])
            }
        }
    }
}

/// Min bottom age and max top age across fully dated entities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgeRange {
    pub min_bottom_age: f64,
    pub max_top_age: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitSummary {
    pub name: String,
    pub ages: Option<(f64, f64)>,
    pub age_label: Option<String>,
    pub lithology: Option<String>,
    pub description: Option<String>,
}

/// Natural-language digest of a unit list.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitDigest {
    pub age_range: Option<AgeRange>,
    pub dated_units: usize,
    pub units: Vec<UnitSummary>,
}

impl UnitDigest {
    pub fn from_units(units: &[Value]) -> Self {
        let summaries: Vec<UnitSummary> = units.iter().map(summarize_unit).collect();

        let mut age_range: Option<AgeRange> = None;
        let mut dated_units = 0;
        for (bottom, top) in summaries.iter().filter_map(|s| s.ages) {
            dated_units += 1;
            age_range = Some(match age_range {
                None => AgeRange {
                    min_bottom_age: bottom,
                    max_top_age: top,
                },
                Some(range) => AgeRange {
                    min_bottom_age: range.min_bottom_age.min(bottom),
                    max_top_age: range.max_top_age.max(top),
                },
            });
        }

        Self {
            age_range,
            dated_units,
            units: summaries,
        }
    }

    /// Render as markdown, listing at most `limit` units.
    pub fn render(&self, limit: usize) -> String {
        let mut out = String::new();
        if self.units.is_empty() {
            out.push_str("No units were returned for this location.\n");
            return out;
        }

        let _ = writeln!(out, "{} unit(s) returned.", self.units.len());
        match self.age_range {
            Some(range) => {
                let _ = writeln!(
                    out,
                    "Age range across {} dated unit(s): youngest base {} Ma, oldest top {} Ma.",
                    self.dated_units, range.min_bottom_age, range.max_top_age
                );
            }
            None => out.push_str("No unit reported both a bottom and a top age.\n"),
        }
        out.push('\n');

        for unit in self.units.iter().take(limit) {
            let _ = write!(out, "- **{}** ({})", unit.name, unit.age_text());
            if let Some(lith) = &unit.lithology {
                let _ = write!(out, "; lithology: {}", lith);
            }
            if let Some(desc) = &unit.description {
                let _ = write!(out, "; {}", desc);
            }
            out.push('\n');
        }
        if self.units.len() > limit {
            let _ = writeln!(out, "- ...and {} more unit(s)", self.units.len() - limit);
        }
        out
    }
}

impl UnitSummary {
    fn age_text(&self) -> String {
        match (&self.ages, &self.age_label) {
            (Some((b, t)), Some(label)) => format!("{}, {} to {} Ma", label, b, t),
            (Some((b, t)), None) => format!("{} to {} Ma", b, t),
            (None, Some(label)) => label.clone(),
            (None, None) => "age unknown".to_string(),
        }
    }
}

fn summarize_unit(unit: &Value) -> UnitSummary {
    let name = first_string(unit, &["unit_name", "name", "strat_name"])
        .unwrap_or_else(|| "Unnamed unit".to_string());

    let ages = match (number(unit, "b_age"), number(unit, "t_age")) {
        (Some(b), Some(t)) => Some((b, t)),
        _ => None,
    };

    let age_label = first_string(unit, &["age"]).or_else(|| {
        match (
            first_string(unit, &["b_int_name"]),
            first_string(unit, &["t_int_name"]),
        ) {
            (Some(b), Some(t)) if b == t => Some(b),
            (Some(b), Some(t)) => Some(format!("{} to {}", b, t)),
            (Some(one), None) | (None, Some(one)) => Some(one),
            (None, None) => None,
        }
    });

    UnitSummary {
        name,
        ages,
        age_label,
        lithology: lithology(unit),
        description: first_string(unit, &["descrip", "notes", "comments"]),
    }
}

fn number(unit: &Value, field: &str) -> Option<f64> {
    match unit.get(field)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn first_string(unit: &Value, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| {
        unit.get(*field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

/// `lith` is a plain string on map units and a list of `{name, ...}` objects
/// on long-form units.
fn lithology(unit: &Value) -> Option<String> {
    match unit.get("lith")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Array(items) => {
            let names: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("name").and_then(Value::as_str).or(item.as_str()))
                .collect();
            if names.is_empty() {
                None
            } else {
                Some(names.join(", "))
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_attaches_reference_or_null() {
        let units = vec![
            json!({"map_id": 1, "source_id": 7}),
            json!({"map_id": 2, "source_id": 9}),
            json!({"map_id": 3}),
        ];
        let refs = json!({"7": "Smith, J. (2001) Geology of somewhere"});
        let merged = merge_references(units, refs.as_object());

        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0]["map_id"], 1);
        assert_eq!(merged[0]["references"], "Smith, J. (2001) Geology of somewhere");
        assert_eq!(merged[1]["map_id"], 2);
        assert!(merged[1]["references"].is_null());
        assert_eq!(merged[2]["map_id"], 3);
        assert!(merged[2]["references"].is_null());
    }

    #[test]
    fn merge_without_refs_sets_null_everywhere() {
        let merged = merge_references(vec![json!({"source_id": 1})], None);
        assert!(merged[0].get("references").unwrap().is_null());
    }

    #[test]
    fn merge_accepts_string_source_ids() {
        let refs = json!({"12": {"author": "Doe"}});
        let merged = merge_references(vec![json!({"source_id": "12"})], refs.as_object());
        assert_eq!(merged[0]["references"]["author"], "Doe");
    }

    fn metadata(scale: TileScale) -> TileMetadata {
        TileMetadata {
            url: "https://tiles.macrostrat.org/carto/3/1/2.png".to_string(),
            scale,
            z: 3,
            x: 1,
            y: 2,
            format: TileFormat::Png,
            error: None,
            info: TileInfo::for_scale(scale),
        }
    }

    #[test]
    fn tile_without_image_is_single_text_part() {
        let output = MapTileOutput {
            metadata: metadata(TileScale::Carto),
            image: TileFetch::NotRequested,
        };
        let parts = output.into_content().unwrap();
        assert_eq!(parts.len(), 1);
        let ContentPart::Text { text } = &parts[0] else {
            panic!("expected text part");
        };
        let value: Value = serde_json::from_str(text).unwrap();
        assert_eq!(value["url"], "https://tiles.macrostrat.org/carto/3/1/2.png");
        assert_eq!(value["scale"], "carto");
        assert_eq!(value["info"]["license"], TILE_LICENSE);
        assert!(value.get("error").is_none());
        assert!(value["info"].get("note").is_none());
    }

    #[test]
    fn fetched_tile_yields_text_and_image() {
        let output = MapTileOutput {
            metadata: metadata(TileScale::Large),
            image: TileFetch::Fetched(vec![0x89, b'P', b'N', b'G']),
        };
        let parts = output.into_content().unwrap();
        assert_eq!(parts.len(), 2);
        match &parts[1] {
            ContentPart::Image { data, mime_type } => {
                assert_eq!(data, "iVBORw==");
                assert_eq!(mime_type, "image/png");
            }
            other => panic!("expected image part, got {:?}", other),
        }
        let ContentPart::Text { text } = &parts[0] else {
            panic!("expected text part");
        };
        assert!(text.contains("provided below"));
        assert!(text.contains("\"large\" scale"));
    }

    #[test]
    fn failed_fetch_degrades_to_annotated_metadata() {
        let output = MapTileOutput {
            metadata: metadata(TileScale::Carto),
            image: TileFetch::Failed(ImageFetchError {
                url: "https://tiles.macrostrat.org/carto/3/1/2.png".to_string(),
                reason: "HTTP 404: Not Found".to_string(),
            }),
        };
        let parts = output.into_content().unwrap();
        assert_eq!(parts.len(), 1);
        let ContentPart::Text { text } = &parts[0] else {
            panic!("expected text part");
        };
        let value: Value = serde_json::from_str(text).unwrap();
        assert_eq!(value["error"], "Failed to fetch image: HTTP 404: Not Found");
        assert_eq!(value["url"], "https://tiles.macrostrat.org/carto/3/1/2.png");
    }

    #[test]
    fn content_parts_serialize_with_type_tag() {
        let value = serde_json::to_value(ContentPart::Image {
            data: "AAAA".to_string(),
            mime_type: "image/png".to_string(),
        })
        .unwrap();
        assert_eq!(value, json!({"type": "image", "data": "AAAA", "mimeType": "image/png"}));

        let value = serde_json::to_value(ContentPart::text("hi")).unwrap();
        assert_eq!(value, json!({"type": "text", "text": "hi"}));
    }

    #[test]
    fn digest_age_range_skips_partially_dated_units() {
        let units = vec![
            json!({
                "unit_name": "Dakota Sandstone",
                "b_age": 105.0,
                "t_age": 93.9,
                "lith": "sandstone"
            }),
            json!({"unit_name": "Pierre Shale", "b_age": 83.6, "t_age": 68.0}),
            json!({"unit_name": "Alluvium", "t_age": 0.0}),
        ];
        let digest = UnitDigest::from_units(&units);
        assert_eq!(digest.dated_units, 2);
        assert_eq!(
            digest.age_range,
            Some(AgeRange {
                min_bottom_age: 83.6,
                max_top_age: 93.9
            })
        );
        assert_eq!(digest.units.len(), 3);

        let text = digest.render(10);
        assert!(text.contains("3 unit(s) returned"));
        assert!(text.contains("**Alluvium** (age unknown)"));
        assert!(text.contains("lithology: sandstone"));
    }

    #[test]
    fn digest_reads_long_form_lithology_and_intervals() {
        let units = vec![json!({
            "unit_name": "Morrison Fm",
            "b_age": 155.7,
            "t_age": 145.0,
            "b_int_name": "Kimmeridgian",
            "t_int_name": "Tithonian",
            "lith": [{"name": "mudstone", "prop": 0.6}, {"name": "sandstone", "prop": 0.4}],
            "notes": "fluvial"
        })];
        let digest = UnitDigest::from_units(&units);
        let unit = &digest.units[0];
        assert_eq!(unit.lithology.as_deref(), Some("mudstone, sandstone"));
        assert_eq!(unit.age_label.as_deref(), Some("Kimmeridgian to Tithonian"));
        assert_eq!(unit.description.as_deref(), Some("fluvial"));
    }

    #[test]
    fn digest_truncates_long_lists() {
        let units: Vec<Value> = (0..5)
            .map(|i| json!({"name": format!("Unit {}", i)}))
            .collect();
        let text = UnitDigest::from_units(&units).render(2);
        assert!(text.contains("Unit 1"));
        assert!(!text.contains("Unit 2"));
        assert!(text.contains("...and 3 more unit(s)"));
        assert!(text.contains("No unit reported both"));
    }

    #[test]
    fn empty_digest() {
        let text = UnitDigest::from_units(&[]).render(5);
        assert!(text.starts_with("No units were returned"));
    }
}
