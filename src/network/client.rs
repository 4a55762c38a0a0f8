//! Blocking HTTP client used for live calls

use std::time::Duration;

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::HeaderMap;
use hyper::{Method, Request, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, warn};

use super::Transport;
use crate::config::UpstreamConfig;
use crate::message::{add_header, buffer_body, HeaderMultimap, HttpRequest, HttpResponse, Version};
use crate::{Result, TapeError};

/// HTTP client for performing real requests
///
/// Owns a small tokio runtime and blocks the calling thread for each
/// exchange, so it must not be called from inside an async context.
pub struct HttpClient {
    runtime: Runtime,
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HttpClient {
    /// Create a client with default pool settings
    ///
    /// # Errors
    ///
    /// Returns error if the runtime cannot be started
    pub fn new() -> Result<Self> {
        Self::with_config(&UpstreamConfig::default())
    }

    /// Create a client from upstream settings
    ///
    /// # Errors
    ///
    /// Returns error if the runtime cannot be started
    pub fn with_config(config: &UpstreamConfig) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker_threads.max(1))
            .thread_name("tapedeck-upstream")
            .enable_all()
            .build()?;

        let client = {
            let _guard = runtime.enter();
            Client::builder(TokioExecutor::new())
                .pool_timer(TokioTimer::new())
                .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
                .pool_max_idle_per_host(config.pool_max_idle_per_host)
                .build_http()
        };

        Ok(Self { runtime, client })
    }
}

impl Transport for HttpClient {
    fn call(&self, request: &mut HttpRequest) -> Result<HttpResponse> {
        let uri = request
            .url
            .parse::<Uri>()
            .map_err(|e| TapeError::Upstream(format!("Invalid URL '{}': {e}", request.url)))?;

        let method = request.method.parse::<Method>().map_err(|e| {
            TapeError::Upstream(format!("Invalid HTTP method '{}': {e}", request.method))
        })?;

        debug!("Forwarding {} to {}", method, uri);

        let mut builder = Request::builder().method(method).uri(uri);
        for (name, values) in &request.headers {
            for value in values {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }

        let body = buffer_body(&mut request.body)?.unwrap_or_default();
        let http_request = builder
            .body(Full::new(body))
            .map_err(|e| TapeError::Upstream(format!("Failed to build request: {e}")))?;

        self.runtime.block_on(async {
            let response = self.client.request(http_request).await.map_err(|e| {
                warn!("Request failed: {e}");
                TapeError::Upstream(format!("Request failed: {e}"))
            })?;

            let (parts, body) = response.into_parts();
            let collected = body
                .collect()
                .await
                .map_err(|e| TapeError::Upstream(format!("Failed to read response body: {e}")))?;
            let trailer = collected.trailers().map(to_multimap).unwrap_or_default();
            let body = collected.to_bytes();

            let headers = to_multimap(&parts.headers);
            let close = parts
                .headers
                .get(hyper::header::CONNECTION)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.eq_ignore_ascii_case("close"));
            let transfer_encoding = parts
                .headers
                .get_all(hyper::header::TRANSFER_ENCODING)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .flat_map(|v| v.split(',').map(|s| s.trim().to_string()))
                .collect();

            let mut live = HttpResponse::new(parts.status.as_u16()).with_body(body);
            live.version = to_version(parts.version);
            live.headers = headers;
            live.trailer = trailer;
            live.close = close;
            live.transfer_encoding = transfer_encoding;
            Ok::<_, TapeError>(live)
        })
    }
}

fn to_multimap(headers: &HeaderMap) -> HeaderMultimap {
    let mut map = HeaderMultimap::new();
    for (name, value) in headers {
        add_header(
            &mut map,
            &canonical_name(name.as_str()),
            value.to_str().unwrap_or("<invalid>"),
        );
    }
    map
}

/// `content-type` -> `Content-Type`
fn canonical_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

fn to_version(version: hyper::Version) -> Version {
    match version {
        hyper::Version::HTTP_09 => Version { major: 0, minor: 9 },
        hyper::Version::HTTP_10 => Version::HTTP_10,
        hyper::Version::HTTP_2 => Version::HTTP_2,
        hyper::Version::HTTP_3 => Version { major: 3, minor: 0 },
        _ => Version::HTTP_11,
    }
}
