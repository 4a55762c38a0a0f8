//! Tapedeck - HTTP interaction recorder/replayer for tests
//!
//! An [`Interceptor`] sits where a real transport would. Depending on its
//! [`Mode`] it answers calls from a [`Store`] of recorded interactions,
//! performs and records live calls, or forwards everything untouched.

#![deny(unsafe_code)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::multiple_crate_versions
)]

pub mod config;
pub mod error;
pub mod interceptor;
pub mod matcher;
pub mod message;
pub mod network;
pub mod session;
pub mod storage;

pub use config::{Config, Mode};
pub use error::{Result, TapeError};
pub use interceptor::{Interceptor, InterceptorStats};
pub use matcher::{BodyMatcher, DefaultMatcher, Matcher, MatcherKind};
pub use message::{Body, HttpRequest, HttpResponse};
pub use network::{HttpClient, Transport};
pub use session::Session;
pub use storage::{Interaction, SaveOutcome, Store};
