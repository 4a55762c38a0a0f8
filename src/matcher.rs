//! Request matching against recorded interactions

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::message::HttpRequest;
use crate::storage::RequestSnapshot;

/// Decides whether a live request corresponds to a recorded one
///
/// Matchers take the live request mutably because inspecting a body consumes
/// it. Any implementation that reads the body must leave a rewound copy
/// behind (see [`HttpRequest::buffer_body`]), since the same request may be
/// forwarded to a real transport afterwards.
pub trait Matcher: Send + Sync {
    /// Check a live request against a recorded request
    fn matches(&self, live: &mut HttpRequest, recorded: &RequestSnapshot) -> bool;
}

impl<F> Matcher for F
where
    F: Fn(&mut HttpRequest, &RequestSnapshot) -> bool + Send + Sync,
{
    fn matches(&self, live: &mut HttpRequest, recorded: &RequestSnapshot) -> bool {
        self(live, recorded)
    }
}

/// Method and exact URL string
///
/// No normalization: trailing slashes, query order and case all count.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMatcher;

impl Matcher for DefaultMatcher {
    fn matches(&self, live: &mut HttpRequest, recorded: &RequestSnapshot) -> bool {
        live.method == recorded.method && live.url == recorded.url
    }
}

/// Method, exact URL and byte-identical body
#[derive(Debug, Clone, Copy, Default)]
pub struct BodyMatcher;

impl Matcher for BodyMatcher {
    fn matches(&self, live: &mut HttpRequest, recorded: &RequestSnapshot) -> bool {
        if !DefaultMatcher.matches(live, recorded) {
            return false;
        }

        match live.buffer_body() {
            Ok(None) => recorded.body.is_empty(),
            Ok(Some(body)) => body.as_ref() == recorded.body.as_bytes(),
            Err(e) => {
                debug!("Unreadable request body, no match: {e}");
                false
            }
        }
    }
}

/// Built-in matcher selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatcherKind {
    /// [`DefaultMatcher`]
    #[default]
    Default,
    /// [`BodyMatcher`]
    Body,
}

impl MatcherKind {
    /// Build the selected matcher
    #[must_use]
    pub fn build(self) -> Arc<dyn Matcher> {
        match self {
            Self::Default => Arc::new(DefaultMatcher),
            Self::Body => Arc::new(BodyMatcher),
        }
    }
}
