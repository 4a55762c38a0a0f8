//! Transport capability and the real network client

mod client;

use std::sync::Arc;

pub use client::HttpClient;

use crate::message::{HttpRequest, HttpResponse};
use crate::Result;

/// Default idle timeout for pooled upstream connections
pub const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

/// Default number of idle connections kept per upstream host
pub const POOL_MAX_IDLE_PER_HOST: usize = 10;

/// Something that can perform an HTTP exchange
///
/// Calls are synchronous. The request is borrowed mutably so implementations
/// can consume its body; callers that need the body afterwards should buffer
/// it first.
pub trait Transport: Send + Sync {
    /// Perform one request/response exchange
    ///
    /// # Errors
    ///
    /// Returns error if the exchange cannot be completed. Any status code is a
    /// successful exchange.
    fn call(&self, request: &mut HttpRequest) -> Result<HttpResponse>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn call(&self, request: &mut HttpRequest) -> Result<HttpResponse> {
        (**self).call(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn call(&self, request: &mut HttpRequest) -> Result<HttpResponse> {
        (**self).call(request)
    }
}
