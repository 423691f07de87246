//! Response Envelope
//!
//! The normalized status/headers/body bundle that is cached and written out.

use std::collections::BTreeMap;

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::warn;

/// Content type of plain JSON responses.
pub const JSON_CONTENT_TYPE: &str = "application/json";

// == Response Envelope ==
/// A fully prepared response, ready to be cached or written to a client.
///
/// A 204 envelope never carries headers or a body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseEnvelope {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
}

impl ResponseEnvelope {
    /// 200 with the given content type and body.
    pub fn ok(content_type: &str, body: String) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), content_type.to_string());
        Self {
            status_code: 200,
            headers,
            body: Some(body),
        }
    }

    /// 200 carrying a JSON body.
    pub fn json(body: String) -> Self {
        Self::ok(JSON_CONTENT_TYPE, body)
    }

    /// Empty 204.
    pub fn no_content() -> Self {
        Self {
            status_code: 204,
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("Content-Type").map(String::as_str)
    }
}

impl IntoResponse for ResponseEnvelope {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or_else(|_| {
            warn!(status_code = self.status_code, "Invalid status code in response envelope");
            StatusCode::INTERNAL_SERVER_ERROR
        });

        let body = match self.body {
            Some(body) => Body::from(body),
            None => Body::empty(),
        };

        let mut response = Response::new(body);
        *response.status_mut() = status;

        let headers = response.headers_mut();
        for (name, value) in &self.headers {
            match (
                HeaderName::try_from(name.as_str()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!(header = %name, "Skipping invalid header in response envelope"),
            }
        }

        response
    }
}
