//! Interceptor applying the record/replay/pass-through policy

use std::sync::Arc;

use tracing::{debug, warn};

use super::{Counters, InterceptorStats, Mode};
use crate::message::{Body, HttpRequest, HttpResponse};
use crate::network::Transport;
use crate::storage::{Interaction, Store};
use crate::{Result, TapeError};

/// Transport-shaped front for a [`Store`]
///
/// Because it implements [`Transport`] itself, an interceptor can stand in
/// anywhere a real transport is expected.
pub struct Interceptor {
    store: Arc<Store>,
    mode: Mode,
    transport: Option<Arc<dyn Transport>>,
    counters: Counters,
}

impl Interceptor {
    /// Create an interceptor
    ///
    /// `transport` performs live calls in Record and PassThrough modes.
    #[must_use]
    pub fn new(store: Arc<Store>, mode: Mode, transport: Option<Arc<dyn Transport>>) -> Self {
        Self {
            store,
            mode,
            transport,
            counters: Counters::default(),
        }
    }

    /// The backing store
    #[must_use]
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// The fixed operating mode
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Call counters since construction
    #[must_use]
    pub fn stats(&self) -> InterceptorStats {
        self.counters.snapshot()
    }

    /// Handle one outgoing call
    ///
    /// # Errors
    ///
    /// - `InteractionNotFound` in Replay mode when nothing matches
    /// - `TransportUnconfigured` when a live call is needed but no transport is bound
    /// - whatever the transport returns when a live call fails
    pub fn intercept(&self, request: &mut HttpRequest) -> Result<HttpResponse> {
        match self.mode {
            Mode::PassThrough => self.pass_through(request),
            Mode::Replay => self.replay(request),
            Mode::Record => self.record(request),
        }
    }

    fn live_transport(&self) -> Result<&dyn Transport> {
        self.transport
            .as_deref()
            .ok_or(TapeError::TransportUnconfigured)
    }

    fn pass_through(&self, request: &mut HttpRequest) -> Result<HttpResponse> {
        let transport = self.live_transport()?;
        debug!("Pass-through: {} {}", request.method, request.url);
        let response = transport.call(request)?;
        self.counters.passed_through();
        Ok(response)
    }

    fn replay(&self, request: &mut HttpRequest) -> Result<HttpResponse> {
        if let Some(interaction) = self.store.lookup(request) {
            debug!(
                "Replaying interaction {}: {} {}",
                interaction.id, request.method, request.url
            );
            self.counters.replayed();
            return Ok(interaction.to_response());
        }

        self.counters.missed();
        warn!(
            "No recorded interaction in '{}' for {} {}",
            self.store.name(),
            request.method,
            request.url
        );
        Err(TapeError::InteractionNotFound {
            method: request.method.clone(),
            url: request.url.clone(),
        })
    }

    fn record(&self, request: &mut HttpRequest) -> Result<HttpResponse> {
        // Already recorded calls are served from the store
        if let Some(interaction) = self.store.lookup(request) {
            debug!(
                "Record hit, replaying interaction {}: {} {}",
                interaction.id, request.method, request.url
            );
            self.counters.replayed();
            return Ok(interaction.to_response());
        }
        self.counters.missed();

        let transport = self.live_transport()?;

        // The transport consumes the body; keep a copy to snapshot afterwards
        let body = request.buffer_body()?;
        let result = transport.call(request);
        request.body = body.map(Body::from_bytes);
        let mut response = result?;

        let interaction = Interaction::record(request, &mut response)?;
        let id = self.store.append(interaction);
        self.counters.recorded();

        debug!(
            "Recorded interaction {}: {} {} -> {}",
            id, request.method, request.url, response.status_code
        );
        Ok(response)
    }
}

impl Transport for Interceptor {
    fn call(&self, request: &mut HttpRequest) -> Result<HttpResponse> {
        self.intercept(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::BodyMatcher;
    use crate::storage::{RequestSnapshot, ResponseSnapshot};
    use parking_lot::Mutex;
    use std::io::Read;

    /// Transport that answers from a closure and remembers request bodies
    struct FakeTransport {
        status: u16,
        body: &'static str,
        seen: Mutex<Vec<Vec<u8>>>,
    }

    impl FakeTransport {
        fn new(status: u16, body: &'static str) -> Arc<Self> {
            Arc::new(Self {
                status,
                body,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().len()
        }
    }

    impl Transport for FakeTransport {
        fn call(&self, request: &mut HttpRequest) -> Result<HttpResponse> {
            // Consume the body the way a real transport would
            let mut data = Vec::new();
            if let Some(body) = request.body.as_mut() {
                body.read_to_end(&mut data)?;
            }
            self.seen.lock().push(data);
            Ok(HttpResponse::new(self.status).with_body(self.body))
        }
    }

    struct FailingTransport;

    impl Transport for FailingTransport {
        fn call(&self, _request: &mut HttpRequest) -> Result<HttpResponse> {
            Err(TapeError::Upstream("connection refused".to_string()))
        }
    }

    fn store_with(url: &str, body: &str) -> Arc<Store> {
        let store = Store::create("unused");
        store.append(Interaction::new(
            RequestSnapshot {
                method: "GET".to_string(),
                url: url.to_string(),
                ..RequestSnapshot::default()
            },
            ResponseSnapshot {
                status: "200 OK".to_string(),
                status_code: 200,
                body: body.to_string(),
                ..ResponseSnapshot::default()
            },
        ));
        Arc::new(store)
    }

    #[test]
    fn test_replay_hit() {
        let store = store_with("http://example.com/something-here", "Something here");
        let interceptor = Interceptor::new(store, Mode::Replay, None);

        let mut response = interceptor
            .intercept(&mut HttpRequest::get("http://example.com/something-here"))
            .unwrap();
        assert_eq!(&response.body_bytes().unwrap()[..], b"Something here");
        assert_eq!(interceptor.stats().replayed, 1);
    }

    #[test]
    fn test_replay_miss_is_error() {
        let transport = FakeTransport::new(200, "live");
        let store = store_with("http://example.com/a", "");
        let interceptor = Interceptor::new(store, Mode::Replay, Some(transport.clone()));

        let err = interceptor
            .intercept(&mut HttpRequest::get("http://example.com/b"))
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(transport.calls(), 0);
        assert_eq!(interceptor.stats().misses, 1);
    }

    #[test]
    fn test_record_miss_calls_transport_once() {
        let transport = FakeTransport::new(200, "");
        let store = Arc::new(Store::create("unused"));
        let interceptor = Interceptor::new(Arc::clone(&store), Mode::Record, Some(transport.clone()));

        let response = interceptor
            .intercept(&mut HttpRequest::get("http://example.com/"))
            .unwrap();
        assert_eq!(response.status_code, 200);
        assert_eq!(store.len(), 1);
        assert_eq!(store.interactions()[0].id, 0);

        // Repeats are served from the store
        interceptor
            .intercept(&mut HttpRequest::get("http://example.com/"))
            .unwrap();
        assert_eq!(transport.calls(), 1);
        assert_eq!(store.len(), 1);

        let stats = interceptor.stats();
        assert_eq!(stats.recorded, 1);
        assert_eq!(stats.replayed, 1);
    }

    #[test]
    fn test_record_keeps_request_body() {
        let transport = FakeTransport::new(201, "created");
        let store = Arc::new(Store::create("unused").with_matcher(Arc::new(BodyMatcher)));
        let interceptor = Interceptor::new(Arc::clone(&store), Mode::Record, Some(transport.clone()));

        let mut request = HttpRequest::new("POST", "http://example.com/items")
            .with_body_reader(std::io::Cursor::new(b"Hello, World!".to_vec()));
        let mut response = interceptor.intercept(&mut request).unwrap();

        assert_eq!(&response.body_bytes().unwrap()[..], b"created");
        assert_eq!(transport.seen.lock()[0], b"Hello, World!");

        let recorded = &store.interactions()[0];
        assert_eq!(recorded.request.body, "Hello, World!");
        assert_eq!(recorded.response.body, "created");
        assert_eq!(&request.buffer_body().unwrap().unwrap()[..], b"Hello, World!");
    }

    #[test]
    fn test_record_upstream_failure_records_nothing() {
        let store = Arc::new(Store::create("unused"));
        let interceptor = Interceptor::new(
            Arc::clone(&store),
            Mode::Record,
            Some(Arc::new(FailingTransport)),
        );

        let err = interceptor
            .intercept(&mut HttpRequest::get("http://example.com/"))
            .unwrap_err();
        assert!(matches!(err, TapeError::Upstream(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_record_upstream_failure_restores_body() {
        let interceptor = Interceptor::new(
            Arc::new(Store::create("unused")),
            Mode::Record,
            Some(Arc::new(FailingTransport)),
        );

        let mut request = HttpRequest::new("POST", "http://example.com/items")
            .with_body_reader(std::io::Cursor::new(b"payload".to_vec()));
        assert!(interceptor.intercept(&mut request).is_err());
        assert_eq!(&request.buffer_body().unwrap().unwrap()[..], b"payload");
    }

    struct BrokenReader;

    impl Read for BrokenReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "peer went away"))
        }
    }

    #[test]
    fn test_record_unreadable_body_is_error() {
        let transport = FakeTransport::new(200, "live");
        let store = Store::create("unused").with_matcher(Arc::new(BodyMatcher));
        store.append(Interaction::new(
            RequestSnapshot {
                method: "POST".to_string(),
                url: "http://example.com/x".to_string(),
                body: "recorded".to_string(),
                ..RequestSnapshot::default()
            },
            ResponseSnapshot {
                status: "200 OK".to_string(),
                status_code: 200,
                ..ResponseSnapshot::default()
            },
        ));
        let store = Arc::new(store);
        let interceptor = Interceptor::new(Arc::clone(&store), Mode::Record, Some(transport.clone()));

        let mut request =
            HttpRequest::new("POST", "http://example.com/x").with_body_reader(BrokenReader);
        let err = interceptor.intercept(&mut request).unwrap_err();

        assert!(matches!(err, TapeError::Io(_)));
        assert_eq!(transport.calls(), 0);
        assert_eq!(store.len(), 1);
        assert_eq!(interceptor.stats().recorded, 0);
    }

    #[test]
    fn test_record_without_transport() {
        let store = Arc::new(Store::create("unused"));
        let interceptor = Interceptor::new(Arc::clone(&store), Mode::Record, None);

        let err = interceptor
            .intercept(&mut HttpRequest::get("http://example.com/"))
            .unwrap_err();
        assert!(matches!(err, TapeError::TransportUnconfigured));
    }

    #[test]
    fn test_pass_through_without_transport() {
        let store = store_with("http://example.com/", "recorded");
        let interceptor = Interceptor::new(Arc::clone(&store), Mode::PassThrough, None);

        for _ in 0..3 {
            let err = interceptor
                .intercept(&mut HttpRequest::get("http://example.com/"))
                .unwrap_err();
            assert!(matches!(err, TapeError::TransportUnconfigured));
        }
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_pass_through_bypasses_store() {
        let transport = FakeTransport::new(500, "live");
        let store = store_with("http://example.com/", "recorded");
        let interceptor = Interceptor::new(Arc::clone(&store), Mode::PassThrough, Some(transport));

        let mut response = interceptor
            .intercept(&mut HttpRequest::get("http://example.com/"))
            .unwrap();
        assert_eq!(response.status_code, 500);
        assert_eq!(&response.body_bytes().unwrap()[..], b"live");
        assert_eq!(store.len(), 1);
        assert_eq!(interceptor.stats().passed_through, 1);
    }

    #[test]
    fn test_interceptor_as_transport() {
        let store = store_with("http://example.com/", "inner");
        let inner: Arc<dyn Transport> = Arc::new(Interceptor::new(store, Mode::Replay, None));
        let outer = Interceptor::new(Arc::new(Store::create("unused")), Mode::Record, Some(inner));

        let mut response = outer
            .intercept(&mut HttpRequest::get("http://example.com/"))
            .unwrap();
        assert_eq!(&response.body_bytes().unwrap()[..], b"inner");
        assert_eq!(outer.store().len(), 1);
    }
}
