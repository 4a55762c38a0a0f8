//! Live HTTP request

use std::collections::BTreeMap;
use std::io::Read;

use bytes::Bytes;
use hyper::Uri;
use serde::{Deserialize, Serialize};

use super::{add_header, buffer_body, header_value, Body, HeaderMultimap, ValueMap, Version};
use crate::{Result, TapeError};

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Parsed multipart form, carried through recordings as-is
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultipartForm {
    /// Non-file fields
    #[serde(rename = "Value", default)]
    pub value: ValueMap,
    /// File parts, kept opaque
    #[serde(rename = "File", default)]
    pub file: BTreeMap<String, Vec<serde_json::Value>>,
}

/// An outgoing HTTP request as seen by the interceptor
#[derive(Debug, Default)]
pub struct HttpRequest {
    /// Method, e.g. `GET`
    pub method: String,
    /// Full target URL
    pub url: String,
    /// Protocol version
    pub version: Version,
    /// Request headers
    pub headers: HeaderMultimap,
    /// Request body, `None` when the request has no body at all
    pub body: Option<Body>,
    /// Declared content length, `-1` when unknown
    pub content_length: i64,
    /// Transfer encodings, outermost first
    pub transfer_encoding: Vec<String>,
    /// Close the connection after this exchange
    pub close: bool,
    /// Host the request is addressed to
    pub host: String,
    /// Query and body form values, populated by [`HttpRequest::parse_form`]
    pub form: ValueMap,
    /// Body form values, populated by [`HttpRequest::parse_form`]
    pub post_form: ValueMap,
    /// Parsed multipart form, if the caller parsed one
    pub multipart_form: Option<MultipartForm>,
    /// Trailer headers
    pub trailer: HeaderMultimap,
    /// Remote address, for server-side requests
    pub remote_addr: String,
    /// Unmodified request target, for server-side requests
    pub request_uri: String,
    /// Connection security metadata, never interpreted
    pub tls: Option<serde_json::Value>,
}

impl HttpRequest {
    /// Create a request without a body
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        let host = url
            .parse::<Uri>()
            .ok()
            .and_then(|uri| uri.authority().map(ToString::to_string))
            .unwrap_or_default();

        Self {
            method: method.into(),
            url,
            host,
            ..Self::default()
        }
    }

    /// Create a `GET` request
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    /// Create a `POST` request with an in-memory body
    pub fn post(url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self::new("POST", url).with_body(body)
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

    /// Attach a streaming body of unknown length
    #[must_use]
    pub fn with_body_reader<R>(mut self, reader: R) -> Self
    where
        R: Read + Send + 'static,
    {
        self.content_length = -1;
        self.body = Some(Body::from_reader(reader));
        self
    }

    /// First value of a header, case-insensitive
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }

    /// Drain the body and leave a rewound copy in its place
    ///
    /// # Errors
    ///
    /// Returns error if the body cannot be read
    pub fn buffer_body(&mut self) -> Result<Option<Bytes>> {
        Ok(buffer_body(&mut self.body)?)
    }

    /// Populate `form` and `post_form`
    ///
    /// Query parameters always go into `form`. For `POST`, `PUT` and `PATCH`
    /// requests with a url-encoded body, the body fields go into `post_form`
    /// and ahead of the query values in `form`. The body stays readable.
    ///
    /// # Errors
    ///
    /// Returns error if the body cannot be read or a value is not valid UTF-8
    /// after percent-decoding
    pub fn parse_form(&mut self) -> Result<()> {
        let mut post_form = ValueMap::new();
        let has_form_body = matches!(self.method.as_str(), "POST" | "PUT" | "PATCH")
            && self
                .header("Content-Type")
                .is_some_and(|ct| ct.starts_with(FORM_URLENCODED));
        if has_form_body {
            if let Some(data) = self.buffer_body()? {
                parse_query_into(&String::from_utf8_lossy(&data), &mut post_form)?;
            }
        }

        let mut form = post_form.clone();
        if let Some((_, query)) = self.url.split_once('?') {
            let query = query.split('#').next().unwrap_or_default();
            parse_query_into(query, &mut form)?;
        }

        self.form = form;
        self.post_form = post_form;
        Ok(())
    }
}

/// Decode `a=1&b=2` pairs into `values`
fn parse_query_into(query: &str, values: &mut ValueMap) -> Result<()> {
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        values
            .entry(decode_component(key)?)
            .or_default()
            .push(decode_component(value)?);
    }
    Ok(())
}

fn decode_component(raw: &str) -> Result<String> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| TapeError::InvalidFormat(format!("Invalid form encoding '{raw}': {e}")))
}
