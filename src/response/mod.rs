//! Response Module
//!
//! Pure construction of response envelopes from domain data.

mod envelope;
mod format;
pub mod topology;

pub use envelope::{ResponseEnvelope, JSON_CONTENT_TYPE};
pub use format::{prepare_response, OutputFormat, TOPOJSON_CONTENT_TYPE};
