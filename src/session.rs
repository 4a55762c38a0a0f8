//! Configuration-driven recording sessions

use std::sync::Arc;

use tracing::info;

use crate::config::{Config, Mode};
use crate::interceptor::Interceptor;
use crate::network::{HttpClient, Transport};
use crate::storage::{SaveOutcome, Store};
use crate::{Result, TapeError};

/// One named cassette opened under a configuration
///
/// The store is only written by [`Session::finish`], and only in Record mode.
pub struct Session {
    name: String,
    interceptor: Arc<Interceptor>,
}

impl Session {
    /// Open a session using the real HTTP client for live calls
    ///
    /// # Errors
    ///
    /// Returns error if the name is invalid, a Replay cassette is missing or
    /// unreadable, or the client cannot be started
    pub fn open(config: &Config, name: &str) -> Result<Self> {
        let transport: Option<Arc<dyn Transport>> = if config.mode.is_replay() {
            None
        } else {
            Some(Arc::new(HttpClient::with_config(&config.upstream)?))
        };
        Self::open_with_transport(config, name, transport)
    }

    /// Open a session with a caller-supplied transport
    ///
    /// # Errors
    ///
    /// Returns error if the name is invalid or a Replay cassette is missing or
    /// unreadable
    pub fn open_with_transport(
        config: &Config,
        name: &str,
        transport: Option<Arc<dyn Transport>>,
    ) -> Result<Self> {
        validate_name(name)?;
        let path = config.cassette_path(name);

        let store = match config.mode {
            Mode::Replay => Store::load_from(name, path)?,
            Mode::Record if path.exists() => Store::load_from(name, path)?,
            Mode::Record | Mode::PassThrough => Store::create_at(name, path),
        };
        let store = store.with_matcher(config.matcher.build());

        info!(
            "Opened session '{}' in {:?} mode ({} interactions)",
            name,
            config.mode,
            store.len()
        );

        Ok(Self {
            name: name.to_string(),
            interceptor: Arc::new(Interceptor::new(Arc::new(store), config.mode, transport)),
        })
    }

    /// Session name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Interceptor to hand to the code under test
    #[must_use]
    pub fn interceptor(&self) -> Arc<Interceptor> {
        Arc::clone(&self.interceptor)
    }

    /// The session's store
    #[must_use]
    pub fn store(&self) -> &Arc<Store> {
        self.interceptor.store()
    }

    /// End the session, persisting new recordings
    ///
    /// Returns `None` when nothing needed saving because the session was
    /// not recording.
    ///
    /// # Errors
    ///
    /// Returns error if the cassette cannot be written
    pub fn finish(self) -> Result<Option<SaveOutcome>> {
        if !self.interceptor.mode().is_record() {
            return Ok(None);
        }

        let stats = self.interceptor.stats();
        let outcome = self.store().save()?;
        info!(
            "Finished session '{}': {} recorded, {} replayed, {:?}",
            self.name, stats.recorded, stats.replayed, outcome
        );
        Ok(Some(outcome))
    }
}

/// Validate a session name
///
/// # Errors
///
/// Returns error if the name is empty, contains NUL bytes or a `..` segment
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(TapeError::InvalidName(
            "Cassette name cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(TapeError::InvalidName(
            "Cassette name cannot contain null bytes".to_string(),
        ));
    }

    if name.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(TapeError::InvalidName(
            "Cassette name cannot contain '..'".to_string(),
        ));
    }

    Ok(())
}
