//! Request and Response models for the gateway API
//!
//! This module defines the DTOs used for deserializing query strings and
//! serializing error bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{AreaQuery, FormatQuery};
pub use responses::ErrorResponse;
