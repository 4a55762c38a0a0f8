//! Live HTTP response

use bytes::Bytes;
use hyper::StatusCode;

use super::{add_header, buffer_body, header_value, Body, HeaderMultimap, Version};
use crate::Result;

/// An HTTP response handed back to the caller
#[derive(Debug)]
pub struct HttpResponse {
    /// Status line, e.g. `200 OK`
    pub status: String,
    /// Status code
    pub status_code: u16,
    /// Protocol version
    pub version: Version,
    /// Response headers
    pub headers: HeaderMultimap,
    /// Response body
    pub body: Option<Body>,
    /// Declared content length, `-1` when unknown
    pub content_length: i64,
    /// Transfer encodings, outermost first
    pub transfer_encoding: Vec<String>,
    /// Server asked to close the connection
    pub close: bool,
    /// Trailer headers
    pub trailer: HeaderMultimap,
}

impl HttpResponse {
    /// Create an empty response with the given status code
    pub fn new(status_code: u16) -> Self {
        Self {
            status: status_line(status_code),
            status_code,
            version: Version::default(),
            headers: HeaderMultimap::new(),
            body: None,
            content_length: 0,
            transfer_encoding: Vec::new(),
            close: false,
            trailer: HeaderMultimap::new(),
        }
    }

    /// Add a header value
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        add_header(&mut self.headers, name, value);
        self
    }

    /// Attach an in-memory body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        self.content_length = body.len() as i64;
        self.body = Some(Body::from_bytes(body));
        self
    }

    /// First value of a header, case-insensitive
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }

    /// Read the body without consuming it
    ///
    /// # Errors
    ///
    /// Returns error if the body cannot be read
    pub fn body_bytes(&mut self) -> Result<Bytes> {
        Ok(buffer_body(&mut self.body)?.unwrap_or_default())
    }
}

/// Build a status line like `404 Not Found`
pub(crate) fn status_line(code: u16) -> String {
    let reason = StatusCode::from_u16(code)
        .ok()
        .and_then(|status| status.canonical_reason());
    match reason {
        Some(reason) => format!("{code} {reason}"),
        None => code.to_string(),
    }
}
