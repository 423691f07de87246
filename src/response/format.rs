//! Output formats and envelope construction.

use serde_json::Value;

use super::envelope::ResponseEnvelope;
use super::topology;

/// Content type of TopoJSON responses. TopoJSON has no registered media
/// type, and existing map clients only accept `application/json`.
pub const TOPOJSON_CONTENT_TYPE: &str = "application/json";

// == Output Format ==
/// Representation requested through the `format` query parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Data serialized as-is
    #[default]
    Json,
    /// Feature collections converted to a TopoJSON topology
    TopoJson,
}

impl OutputFormat {
    /// Maps the raw `format` parameter to a variant.
    ///
    /// Only `topojson` selects the alternate form; anything else, including
    /// no parameter at all, falls back to plain JSON.
    pub fn from_param(param: Option<&str>) -> Self {
        match param {
            Some("topojson") => OutputFormat::TopoJson,
            _ => OutputFormat::Json,
        }
    }

    /// Builds the envelope for `data` in this format.
    pub fn build(self, data: Option<&Value>) -> ResponseEnvelope {
        match self {
            OutputFormat::TopoJson => data
                .and_then(topology::from_feature_collection)
                .map(|topology| {
                    ResponseEnvelope::ok(TOPOJSON_CONTENT_TYPE, topology.to_string())
                })
                .unwrap_or_else(|| OutputFormat::Json.build(data)),
            OutputFormat::Json => match data {
                Some(data) => ResponseEnvelope::json(data.to_string()),
                None => ResponseEnvelope::no_content(),
            },
        }
    }
}

// == Prepare Response ==
/// Turns domain data into a response envelope.
///
/// - TopoJSON requested and `data` is a feature collection: 200 with the
///   topology as body
/// - otherwise, `data` present: 200 with `data` as JSON
/// - `data` absent: bare 204
pub fn prepare_response(data: Option<&Value>, format: OutputFormat) -> ResponseEnvelope {
    format.build(data)
}
