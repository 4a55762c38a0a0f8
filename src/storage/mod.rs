//! Interaction storage: snapshots, the store and its JSON cassette file

mod interaction;
mod store;

pub use interaction::{Interaction, RequestSnapshot, ResponseSnapshot};
pub use store::{path_for, SaveOutcome, Store};

/// File extension appended to store names
pub const CASSETTE_EXTENSION: &str = "json";
