//! Recorded interactions and their request/response snapshots

use serde::{Deserialize, Deserializer, Serialize};

use crate::message::{
    buffer_body, Body, HeaderMultimap, HttpRequest, HttpResponse, MultipartForm, ValueMap, Version,
};
use crate::Result;

/// Header ignored when deciding whether a recording changed
const VOLATILE_HEADER: &str = "Date";

/// Accept `null` where a map or list is expected
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Frozen copy of a live request
///
/// Field names follow the cassette file format.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RequestSnapshot {
    pub method: String,
    #[serde(rename = "URL")]
    pub url: String,
    pub proto: String,
    pub proto_major: u32,
    pub proto_minor: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub header: HeaderMultimap,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub content_length: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub transfer_encoding: Vec<String>,
    #[serde(default)]
    pub close: bool,
    #[serde(default)]
    pub host: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub form: ValueMap,
    #[serde(default, deserialize_with = "null_as_default")]
    pub post_form: ValueMap,
    #[serde(default)]
    pub multipart_form: Option<MultipartForm>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub trailer: HeaderMultimap,
    #[serde(default)]
    pub remote_addr: String,
    #[serde(rename = "RequestURI", default)]
    pub request_uri: String,
    #[serde(rename = "TLS", default)]
    pub tls: Option<serde_json::Value>,
}

impl RequestSnapshot {
    /// Capture a live request, leaving its body readable
    ///
    /// # Errors
    ///
    /// Returns error if the body cannot be read
    pub fn capture(request: &mut HttpRequest) -> Result<Self> {
        let body = buffer_body(&mut request.body)?
            .map(|data| String::from_utf8_lossy(&data).into_owned())
            .unwrap_or_default();

        Ok(Self {
            method: request.method.clone(),
            url: request.url.clone(),
            proto: request.version.to_string(),
            proto_major: request.version.major,
            proto_minor: request.version.minor,
            header: request.headers.clone(),
            body,
            content_length: request.content_length,
            transfer_encoding: request.transfer_encoding.clone(),
            close: request.close,
            host: request.host.clone(),
            form: request.form.clone(),
            post_form: request.post_form.clone(),
            multipart_form: request.multipart_form.clone(),
            trailer: request.trailer.clone(),
            remote_addr: request.remote_addr.clone(),
            request_uri: request.request_uri.clone(),
            tls: request.tls.clone(),
        })
    }

    /// Rebuild a live request with a fresh body
    #[must_use]
    pub fn to_request(&self) -> HttpRequest {
        HttpRequest {
            method: self.method.clone(),
            url: self.url.clone(),
            version: Version {
                major: self.proto_major,
                minor: self.proto_minor,
            },
            headers: self.header.clone(),
            body: Some(Body::from_bytes(self.body.clone())),
            content_length: self.content_length,
            transfer_encoding: self.transfer_encoding.clone(),
            close: self.close,
            host: self.host.clone(),
            form: self.form.clone(),
            post_form: self.post_form.clone(),
            multipart_form: self.multipart_form.clone(),
            trailer: self.trailer.clone(),
            remote_addr: self.remote_addr.clone(),
            request_uri: self.request_uri.clone(),
            tls: self.tls.clone(),
        }
    }

    /// Field-by-field equality, ignoring TLS metadata
    #[must_use]
    pub fn equivalent(&self, other: &Self) -> bool {
        self.method == other.method
            && self.url == other.url
            && self.proto == other.proto
            && self.proto_major == other.proto_major
            && self.proto_minor == other.proto_minor
            && self.header == other.header
            && self.body == other.body
            && self.content_length == other.content_length
            && self.transfer_encoding == other.transfer_encoding
            && self.close == other.close
            && self.host == other.host
            && self.form == other.form
            && self.post_form == other.post_form
            && self.multipart_form == other.multipart_form
            && self.trailer == other.trailer
            && self.remote_addr == other.remote_addr
            && self.request_uri == other.request_uri
    }
}

/// Frozen copy of a live response
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResponseSnapshot {
    pub status: String,
    pub status_code: u16,
    pub proto: String,
    pub proto_major: u32,
    pub proto_minor: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub header: HeaderMultimap,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub content_length: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub transfer_encoding: Vec<String>,
    #[serde(default)]
    pub close: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub trailer: HeaderMultimap,
}

impl ResponseSnapshot {
    /// Capture a live response, leaving its body readable
    ///
    /// # Errors
    ///
    /// Returns error if the body cannot be read
    pub fn capture(response: &mut HttpResponse) -> Result<Self> {
        let body = buffer_body(&mut response.body)?
            .map(|data| String::from_utf8_lossy(&data).into_owned())
            .unwrap_or_default();

        Ok(Self {
            status: response.status.clone(),
            status_code: response.status_code,
            proto: response.version.to_string(),
            proto_major: response.version.major,
            proto_minor: response.version.minor,
            header: response.headers.clone(),
            body,
            content_length: response.content_length,
            transfer_encoding: response.transfer_encoding.clone(),
            close: response.close,
            trailer: response.trailer.clone(),
        })
    }

    /// Rebuild a live response with a fresh body
    ///
    /// Every call yields an independent reader positioned at the start.
    #[must_use]
    pub fn to_response(&self) -> HttpResponse {
        HttpResponse {
            status: self.status.clone(),
            status_code: self.status_code,
            version: Version {
                major: self.proto_major,
                minor: self.proto_minor,
            },
            headers: self.header.clone(),
            body: Some(Body::from_bytes(self.body.clone())),
            content_length: self.content_length,
            transfer_encoding: self.transfer_encoding.clone(),
            close: self.close,
            trailer: self.trailer.clone(),
        }
    }

    /// Field-by-field equality, ignoring the `Date` header
    #[must_use]
    pub fn equivalent(&self, other: &Self) -> bool {
        self.status == other.status
            && self.status_code == other.status_code
            && self.proto == other.proto
            && self.proto_major == other.proto_major
            && self.proto_minor == other.proto_minor
            && stable_headers(&self.header).eq(stable_headers(&other.header))
            && self.body == other.body
            && self.content_length == other.content_length
            && self.transfer_encoding == other.transfer_encoding
            && self.close == other.close
            && self.trailer == other.trailer
    }
}

fn stable_headers(headers: &HeaderMultimap) -> impl Iterator<Item = (&String, &Vec<String>)> {
    headers
        .iter()
        .filter(|(name, _)| !name.eq_ignore_ascii_case(VOLATILE_HEADER))
}

/// One recorded request/response pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    /// Position in the store, reassigned on every save
    pub id: usize,
    /// Recorded request
    pub request: RequestSnapshot,
    /// Recorded response
    pub response: ResponseSnapshot,
}

impl Interaction {
    /// Pair two snapshots; the id is assigned when appended to a store
    #[must_use]
    pub fn new(request: RequestSnapshot, response: ResponseSnapshot) -> Self {
        Self {
            id: 0,
            request,
            response,
        }
    }

    /// Capture a live exchange, leaving both bodies readable
    ///
    /// # Errors
    ///
    /// Returns error if either body cannot be read
    pub fn record(request: &mut HttpRequest, response: &mut HttpResponse) -> Result<Self> {
        Ok(Self::new(
            RequestSnapshot::capture(request)?,
            ResponseSnapshot::capture(response)?,
        ))
    }

    /// Rebuild the recorded response
    #[must_use]
    pub fn to_response(&self) -> HttpResponse {
        self.response.to_response()
    }

    /// Structural equality used to decide whether a save must rewrite the file
    #[must_use]
    pub fn equivalent(&self, other: &Self) -> bool {
        self.id == other.id
            && self.request.equivalent(&other.request)
            && self.response.equivalent(&other.response)
    }
}
