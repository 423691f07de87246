//! Query parameter DTOs for the data API
//!
//! Defines the query strings accepted by the data routes.

use serde::Deserialize;

use crate::response::OutputFormat;

/// Query string accepted by every data route.
///
/// # Fields
/// - `format`: `topojson` for a TopoJSON body, anything else for plain JSON
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormatQuery {
    #[serde(default)]
    pub format: Option<String>,
}

impl FormatQuery {
    pub fn output_format(&self) -> OutputFormat {
        OutputFormat::from_param(self.format.as_deref())
    }
}

/// Query string of the floodwatch route.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AreaQuery {
    /// Restricts the counts to one city area
    #[serde(default)]
    pub area_name: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
}

impl AreaQuery {
    pub fn output_format(&self) -> OutputFormat {
        OutputFormat::from_param(self.format.as_deref())
    }

    /// Area filter, with a blank value treated as no filter.
    pub fn area(&self) -> Option<&str> {
        self.area_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}
