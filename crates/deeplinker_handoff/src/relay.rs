//! Single-slot relay carrying a [`RecoveryPayload`] across the install gap.
//!
//! Storage is a flat string map; the payload occupies two entries under
//! [`RELAY_ACCESS_CODE_KEY`] and [`RELAY_SLUG_KEY`]. Both are removed
//! together on read. Other entries are left alone.
//!
//! The access code is persisted in plaintext. Anything with read access to
//! the relay file can see it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use deeplinker_protocol::defaults::{RELAY_ACCESS_CODE_KEY, RELAY_SLUG_KEY};
use deeplinker_protocol::RecoveryPayload;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("IO error on relay {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt relay file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Relay lock poisoned")]
    LockPoisoned,
}

pub trait AccessCodeRelay: Send + Sync {
    /// Store `payload`, replacing any pending one.
    fn write(&self, payload: &RecoveryPayload) -> Result<(), RelayError>;

    /// Take the pending payload exactly as written. Both entries are cleared
    /// together; a missing entry reads back as an empty string.
    fn read_and_clear(&self) -> Result<Option<RecoveryPayload>, RelayError>;
}

type Entries = BTreeMap<String, String>;

fn put_payload(entries: &mut Entries, payload: &RecoveryPayload) {
    entries.insert(
        RELAY_ACCESS_CODE_KEY.to_string(),
        payload.access_code.clone(),
    );
    entries.insert(RELAY_SLUG_KEY.to_string(), payload.slug.clone());
}

/// Remove both entries. Returns the payload and whether anything changed.
fn take_payload(entries: &mut Entries) -> (Option<RecoveryPayload>, bool) {
    let access_code = entries.remove(RELAY_ACCESS_CODE_KEY);
    let slug = entries.remove(RELAY_SLUG_KEY);
    let changed = access_code.is_some() || slug.is_some();
    let payload = changed.then(|| {
        RecoveryPayload::new(slug.unwrap_or_default(), access_code.unwrap_or_default())
    });
    (payload, changed)
}

// ============================================================================
// In-memory relay
// ============================================================================

#[derive(Debug, Default)]
pub struct InMemoryRelay {
    entries: Mutex<Entries>,
}

impl InMemoryRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw entry lookup, for inspecting the layout.
    pub fn entry(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    /// Set a raw entry, bypassing [`AccessCodeRelay::write`].
    pub fn set_entry(&self, key: &str, value: &str) -> Result<(), RelayError> {
        let mut entries = self.entries.lock().map_err(|_| RelayError::LockPoisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

impl AccessCodeRelay for InMemoryRelay {
    fn write(&self, payload: &RecoveryPayload) -> Result<(), RelayError> {
        let mut entries = self.entries.lock().map_err(|_| RelayError::LockPoisoned)?;
        put_payload(&mut entries, payload);
        debug!(slug = %payload.slug, "Relay payload stored in memory");
        Ok(())
    }

    fn read_and_clear(&self) -> Result<Option<RecoveryPayload>, RelayError> {
        let mut entries = self.entries.lock().map_err(|_| RelayError::LockPoisoned)?;
        Ok(take_payload(&mut entries).0)
    }
}

// ============================================================================
// File relay
// ============================================================================

/// Relay backed by a JSON object on disk, so a payload written by one
/// process is visible to the next.
#[derive(Debug)]
pub struct FileRelay {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileRelay {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Entries, RelayError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Entries::new()),
            Err(source) => {
                return Err(RelayError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if contents.trim().is_empty() {
            return Ok(Entries::new());
        }
        serde_json::from_str(&contents).map_err(|source| RelayError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, entries: &Entries) -> Result<(), RelayError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| RelayError::Io { path, source }
        };
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(io_err(parent))?;

        let json = serde_json::to_string_pretty(entries)?;
        let temp_path = parent.join(format!(".tmp_relay_{}", std::process::id()));
        fs::write(&temp_path, json).map_err(io_err(&temp_path))?;
        fs::rename(&temp_path, &self.path).map_err(io_err(&self.path))
    }
}

impl AccessCodeRelay for FileRelay {
    fn write(&self, payload: &RecoveryPayload) -> Result<(), RelayError> {
        let _guard = self.lock.lock().map_err(|_| RelayError::LockPoisoned)?;
        let mut entries = self.load()?;
        put_payload(&mut entries, payload);
        self.save(&entries)?;
        info!(slug = %payload.slug, path = %self.path.display(), "Relay payload stored");
        Ok(())
    }

    fn read_and_clear(&self) -> Result<Option<RecoveryPayload>, RelayError> {
        let _guard = self.lock.lock().map_err(|_| RelayError::LockPoisoned)?;
        let mut entries = self.load()?;
        let (payload, changed) = take_payload(&mut entries);
        if changed {
            self.save(&entries)?;
        }
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_once() {
        let relay = InMemoryRelay::new();
        assert_eq!(relay.read_and_clear().unwrap(), None);

        relay.write(&RecoveryPayload::new("hello", "42")).unwrap();
        assert_eq!(relay.entry(RELAY_SLUG_KEY).as_deref(), Some("hello"));
        assert_eq!(relay.entry(RELAY_ACCESS_CODE_KEY).as_deref(), Some("42"));

        assert_eq!(
            relay.read_and_clear().unwrap(),
            Some(RecoveryPayload::new("hello", "42"))
        );
        assert_eq!(relay.read_and_clear().unwrap(), None);
    }

    #[test]
    fn test_last_write_wins() {
        let relay = InMemoryRelay::new();
        relay.write(&RecoveryPayload::new("hello", "1")).unwrap();
        relay.write(&RecoveryPayload::new("welcome", "2")).unwrap();
        assert_eq!(
            relay.read_and_clear().unwrap(),
            Some(RecoveryPayload::new("welcome", "2"))
        );
    }

    #[test]
    fn test_empty_slug_is_returned_as_written() {
        let relay = InMemoryRelay::new();
        relay.write(&RecoveryPayload::new("", "42")).unwrap();
        assert_eq!(
            relay.read_and_clear().unwrap(),
            Some(RecoveryPayload::new("", "42"))
        );
        assert_eq!(relay.read_and_clear().unwrap(), None);
    }

    #[test]
    fn test_partial_entry_reads_back_and_clears() {
        let relay = InMemoryRelay::new();
        relay.set_entry(RELAY_ACCESS_CODE_KEY, "42").unwrap();
        assert_eq!(
            relay.read_and_clear().unwrap(),
            Some(RecoveryPayload::new("", "42"))
        );
        assert_eq!(relay.entry(RELAY_ACCESS_CODE_KEY), None);

        relay.set_entry(RELAY_SLUG_KEY, "hello").unwrap();
        assert_eq!(
            relay.read_and_clear().unwrap(),
            Some(RecoveryPayload::new("hello", ""))
        );
        assert_eq!(relay.entry(RELAY_SLUG_KEY), None);
    }

    #[test]
    fn test_file_relay_crosses_instances() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state").join("relay.json");

        FileRelay::new(&path)
            .write(&RecoveryPayload::new("hello", "42"))
            .unwrap();

        let raw: Entries = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw.get(RELAY_SLUG_KEY).map(String::as_str), Some("hello"));
        assert_eq!(raw.get(RELAY_ACCESS_CODE_KEY).map(String::as_str), Some("42"));

        let reader = FileRelay::new(&path);
        assert_eq!(
            reader.read_and_clear().unwrap(),
            Some(RecoveryPayload::new("hello", "42"))
        );
        assert_eq!(FileRelay::new(&path).read_and_clear().unwrap(), None);
    }

    #[test]
    fn test_file_relay_keeps_unrelated_entries() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("relay.json");
        fs::write(&path, r#"{"theme": "dark"}"#).unwrap();

        let relay = FileRelay::new(&path);
        relay.write(&RecoveryPayload::new("hello", "42")).unwrap();
        relay.read_and_clear().unwrap();

        let raw: Entries = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw.get("theme").map(String::as_str), Some("dark"));
    }

    #[test]
    fn test_file_relay_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let relay = FileRelay::new(temp.path().join("relay.json"));
        assert_eq!(relay.read_and_clear().unwrap(), None);
        assert!(!relay.path().exists());
    }

    #[test]
    fn test_file_relay_corrupt() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("relay.json");
        fs::write(&path, "[1, 2").unwrap();
        let err = FileRelay::new(&path).read_and_clear().unwrap_err();
        assert!(matches!(err, RelayError::Corrupt { .. }));
    }
}
