//! Persisted, ordered collection of interactions

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::interaction::Interaction;
use super::CASSETTE_EXTENSION;
use crate::matcher::{DefaultMatcher, Matcher};
use crate::message::HttpRequest;
use crate::{Result, TapeError};

/// Result of [`Store::save`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The file was created or rewritten
    Written,
    /// The file already held an equivalent recording
    Unchanged,
}

/// On-disk document
#[derive(Serialize, Deserialize)]
struct CassetteFile {
    interactions: Vec<Interaction>,
}

/// Borrowed view used when writing, so saving never clones the sequence
#[derive(Serialize)]
struct CassetteFileRef<'a> {
    interactions: &'a [Interaction],
}

struct Tape {
    interactions: Vec<Interaction>,
    next_id: usize,
}

/// An ordered set of recorded interactions backed by one JSON file
///
/// Appends and saves take the write lock; lookups share the read lock.
/// Nothing is written to disk until [`Store::save`] is called.
pub struct Store {
    name: String,
    path: PathBuf,
    matcher: Arc<dyn Matcher>,
    tape: RwLock<Tape>,
}

impl Store {
    /// Create an empty store persisted at `<name>.json`
    pub fn create(name: impl Into<String>) -> Self {
        let name = name.into();
        let path = path_for(&name);
        Self::create_at(name, path)
    }

    /// Create an empty store persisted at an explicit path
    pub fn create_at(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            matcher: Arc::new(DefaultMatcher),
            tape: RwLock::new(Tape {
                interactions: Vec::new(),
                next_id: 0,
            }),
        }
    }

    /// Load a store from `<name>.json`
    ///
    /// # Errors
    ///
    /// Returns error if the file is missing or cannot be parsed
    pub fn load(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let path = path_for(&name);
        Self::load_from(name, path)
    }

    /// Load a store from an explicit path
    ///
    /// # Errors
    ///
    /// Returns error if the file is missing or cannot be parsed
    pub fn load_from(name: impl Into<String>, path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::create_at(name, path);
        let interactions = read_cassette(&store.path)?;

        info!(
            "Loaded cassette '{}': {} interactions",
            store.name,
            interactions.len()
        );

        {
            let mut tape = store.tape.write();
            tape.next_id = interactions.len();
            tape.interactions = interactions;
        }
        Ok(store)
    }

    /// Replace the matcher
    #[must_use]
    pub fn with_matcher(mut self, matcher: Arc<dyn Matcher>) -> Self {
        self.matcher = matcher;
        self
    }

    /// Replace the matcher in place
    pub fn set_matcher(&mut self, matcher: Arc<dyn Matcher>) {
        self.matcher = matcher;
    }

    /// Store name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of interactions held in memory
    #[must_use]
    pub fn len(&self) -> usize {
        self.tape.read().interactions.len()
    }

    /// Check whether the store holds no interactions
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every interaction, in order
    #[must_use]
    pub fn interactions(&self) -> Vec<Interaction> {
        self.tape.read().interactions.clone()
    }

    /// Append an interaction, assigning it the next id
    ///
    /// Returns the assigned id.
    pub fn append(&self, mut interaction: Interaction) -> usize {
        let mut tape = self.tape.write();
        let id = tape.next_id;
        interaction.id = id;
        tape.interactions.push(interaction);
        tape.next_id += 1;
        drop(tape);

        debug!("Appended interaction {} to cassette '{}'", id, self.name);
        id
    }

    /// Find the first interaction whose request matches `request`
    ///
    /// Scans in order, so identical recordings are served first-recorded
    /// first. The matcher may read and replace the request body.
    pub fn lookup(&self, request: &mut HttpRequest) -> Option<Interaction> {
        let tape = self.tape.read();
        tape.interactions
            .iter()
            .find(|interaction| self.matcher.matches(request, &interaction.request))
            .cloned()
    }

    /// Renumber and write the store to disk
    ///
    /// The file is only rewritten if it does not exist yet or its content
    /// differs structurally from memory, ignoring `Date` response headers.
    ///
    /// # Errors
    ///
    /// Returns error if the directory or file cannot be written, or if an
    /// existing file cannot be parsed
    pub fn save(&self) -> Result<SaveOutcome> {
        let mut tape = self.tape.write();

        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        for (index, interaction) in tape.interactions.iter_mut().enumerate() {
            interaction.id = index;
        }
        tape.next_id = tape.interactions.len();

        if self.path.exists() {
            let on_disk = read_cassette(&self.path)?;
            if same_recording(&on_disk, &tape.interactions) {
                debug!("Cassette '{}' unchanged, skipping write", self.name);
                return Ok(SaveOutcome::Unchanged);
            }
        }

        let data = serde_json::to_vec_pretty(&CassetteFileRef {
            interactions: &tape.interactions,
        })?;
        fs::write(&self.path, data)?;

        info!(
            "Saved cassette '{}': {} interactions to {}",
            self.name,
            tape.interactions.len(),
            self.path.display()
        );
        Ok(SaveOutcome::Written)
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

/// Path a named store persists to
#[must_use]
pub fn path_for(name: &str) -> PathBuf {
    PathBuf::from(format!("{name}.{CASSETTE_EXTENSION}"))
}

fn read_cassette(path: &Path) -> Result<Vec<Interaction>> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(TapeError::FileNotFound(path.display().to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    let file: CassetteFile = serde_json::from_slice(&data).map_err(|e| {
        TapeError::InvalidFormat(format!("{}: {e}", path.display()))
    })?;
    Ok(file.interactions)
}

fn same_recording(a: &[Interaction], b: &[Interaction]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equivalent(y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::BodyMatcher;
    use crate::message::HttpResponse;
    use crate::storage::RequestSnapshot;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use tempfile::TempDir;

    fn interaction(method: &str, url: &str, request_body: &str, response_body: &str) -> Interaction {
        let mut request = HttpRequest::new(method, url).with_body(request_body.to_string());
        let mut response = HttpResponse::new(200).with_body(response_body.to_string());
        Interaction::record(&mut request, &mut response).unwrap()
    }

    fn temp_store(dir: &TempDir, name: &str) -> Store {
        Store::create(dir.path().join(name).display().to_string())
    }

    #[test]
    fn test_create_derives_path() {
        let store = Store::create("testdata/example");
        assert_eq!(store.path(), Path::new("testdata/example.json"));
        assert_eq!(store.name(), "testdata/example");
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = Store::load(temp_dir.path().join("absent").display().to_string());
        assert!(matches!(result, Err(TapeError::FileNotFound(_))));
    }

    #[test]
    fn test_load_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        let name = temp_dir.path().join("broken").display().to_string();
        fs::write(path_for(&name), "{ not json").unwrap();

        assert!(matches!(Store::load(name), Err(TapeError::InvalidFormat(_))));
    }

    #[test]
    fn test_append_assigns_sequential_ids() {
        let store = Store::create("unused");
        assert_eq!(store.append(interaction("GET", "http://a/", "", "1")), 0);
        assert_eq!(store.append(interaction("GET", "http://b/", "", "2")), 1);

        let ids: Vec<_> = store.interactions().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn test_lookup_first_match_wins() {
        let store = Store::create("unused");
        store.append(interaction("GET", "http://example.com/", "", "first"));
        store.append(interaction("GET", "http://example.com/", "", "second"));

        let found = store
            .lookup(&mut HttpRequest::get("http://example.com/"))
            .unwrap();
        assert_eq!(found.id, 0);
        assert_eq!(found.response.body, "first");

        assert!(store.lookup(&mut HttpRequest::get("http://example.com/other")).is_none());
    }

    #[test]
    fn test_body_matcher_distinguishes_bodies() {
        let store = Store::create("unused").with_matcher(Arc::new(BodyMatcher));
        store.append(interaction("POST", "http://example.com/", "one", "first"));
        store.append(interaction("POST", "http://example.com/", "two", "second"));

        let found = store
            .lookup(&mut HttpRequest::post("http://example.com/", "two"))
            .unwrap();
        assert_eq!(found.response.body, "second");

        let mut default = Store::create("unused");
        default.append(interaction("POST", "http://example.com/", "one", "first"));
        default.append(interaction("POST", "http://example.com/", "two", "second"));
        let found = default
            .lookup(&mut HttpRequest::post("http://example.com/", "two"))
            .unwrap();
        assert_eq!(found.response.body, "first");

        default.set_matcher(Arc::new(BodyMatcher));
        assert!(default
            .lookup(&mut HttpRequest::post("http://example.com/", "three"))
            .is_none());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = temp_store(&temp_dir, "round_trip");
        store.append(interaction("GET", "http://example.com/", "", "hello"));
        store.append(interaction("POST", "http://example.com/", "data", "created"));

        assert_eq!(store.save().unwrap(), SaveOutcome::Written);

        let loaded = Store::load(store.name()).unwrap();
        assert_eq!(loaded.interactions(), store.interactions());

        // Appends continue after the loaded sequence
        assert_eq!(loaded.append(interaction("GET", "http://example.com/3", "", "")), 2);
    }

    #[test]
    fn test_save_creates_missing_directories() {
        let temp_dir = TempDir::new().unwrap();
        let name = temp_dir.path().join("nested/deeper/cassette").display().to_string();
        let store = Store::create(name);
        store.save().unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn test_save_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = temp_store(&temp_dir, "idempotent");
        store.append(interaction("GET", "http://example.com/", "", "hello"));

        assert_eq!(store.save().unwrap(), SaveOutcome::Written);
        let first = fs::read(store.path()).unwrap();

        assert_eq!(store.save().unwrap(), SaveOutcome::Unchanged);
        assert_eq!(fs::read(store.path()).unwrap(), first);

        store.append(interaction("GET", "http://example.com/2", "", "again"));
        assert_eq!(store.save().unwrap(), SaveOutcome::Written);
    }

    #[test]
    fn test_save_ignores_date_only_changes() {
        let temp_dir = TempDir::new().unwrap();
        let store = temp_store(&temp_dir, "dated");
        let mut first = interaction("GET", "http://example.com/", "", "hello");
        first
            .response
            .header
            .insert("Date".to_string(), vec!["Mon, 01 Jan 2024 00:00:00 GMT".to_string()]);
        store.append(first);
        store.save().unwrap();

        let rerecorded = temp_store(&temp_dir, "dated");
        let mut second = interaction("GET", "http://example.com/", "", "hello");
        second
            .response
            .header
            .insert("Date".to_string(), vec!["Fri, 05 Jan 2024 00:00:00 GMT".to_string()]);
        rerecorded.append(second);

        assert_eq!(rerecorded.save().unwrap(), SaveOutcome::Unchanged);
    }

    #[test]
    fn test_save_over_corrupt_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let store = temp_store(&temp_dir, "corrupt");
        fs::write(store.path(), "garbage").unwrap();

        assert!(matches!(store.save(), Err(TapeError::InvalidFormat(_))));
    }

    #[test]
    fn test_concurrent_appends_unique_ids() {
        let store = Arc::new(Store::create("unused"));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..25 {
                        let url = format!("http://example.com/{t}/{i}");
                        store.append(interaction("GET", &url, "", ""));
                        assert!(store.lookup(&mut HttpRequest::get(url)).is_some());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut ids: Vec<_> = store.interactions().iter().map(|i| i.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..200).collect::<Vec<_>>());
    }

    #[test]
    fn test_lookups_share_the_lock() {
        // Each matcher call waits for the other thread's, so lookups only
        // finish if both hold the lock at the same time
        let barrier = Arc::new(Barrier::new(2));
        let entered = Arc::new(AtomicUsize::new(0));
        let matcher = {
            let barrier = Arc::clone(&barrier);
            let entered = Arc::clone(&entered);
            move |_live: &mut HttpRequest, _recorded: &RequestSnapshot| {
                entered.fetch_add(1, Ordering::SeqCst);
                barrier.wait();
                true
            }
        };
        let store = Arc::new(Store::create("unused").with_matcher(Arc::new(matcher)));
        store.append(interaction("GET", "http://example.com/", "", "shared"));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.lookup(&mut HttpRequest::get("http://example.com/")))
            })
            .collect();
        for handle in handles {
            let found = handle.join().unwrap().unwrap();
            assert_eq!(found.response.body, "shared");
        }
        assert_eq!(entered.load(Ordering::SeqCst), 2);
    }
}
