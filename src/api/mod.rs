//! API Module
//!
//! HTTP handlers, middleware and routing for the gateway.
//!
//! # Endpoints
//! - `GET /P/data/api/v2/reports/confirmed[/:id]` - confirmed reports
//! - `GET /P/data/api/v2/iot/smartsensors` - IoT sensor readings
//! - `GET /P/data/api/v2/infrastructure/:name` - infrastructure layers
//! - `GET /P/data/api/v2/floodwatch/reports` - report counts per area
//! - `GET /P/data/api/v1/*` - redirect to v2

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod validation;

pub use handlers::{AppState, NOT_FOUND_BODY};
pub use routes::create_router;
pub use validation::validate_number_parameter;
