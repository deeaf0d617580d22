//! JSON file link store.
//!
//! # Storage Format
//!
//! ```text
//! ~/.deeplinker/links.json
//! {
//!   "version": 1,
//!   "links": [ { "slug": "hello", "ios_url": "myapp://hello", ... } ]
//! }
//! ```
//!
//! The document is re-read on every operation so edits made by the CLI
//! are visible to a running server without a restart. Writes go through a
//! temp file and rename.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use deeplinker_protocol::LinkRecord;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::traits::{merge_into, LinkStore, ReadLinkStore, UpsertOutcome};

const STORE_VERSION: u32 = 1;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Default, Serialize, Deserialize)]
struct LinkDocument {
    version: u32,
    #[serde(default)]
    links: Vec<LinkRecord>,
}

pub struct JsonFileLinkStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl JsonFileLinkStore {
    /// Open the store at `path`. The file is created on first write; its
    /// parent directory is created now.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        let store = Self {
            path,
            write_lock: Mutex::new(()),
        };
        // Surface a corrupt file at startup rather than on the first request.
        let links = store.load().await?;
        debug!("Opened link store {} ({} links)", store.path.display(), links.len());
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, LinkRecord>> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(BTreeMap::new());
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        let document: LinkDocument =
            serde_json::from_str(&contents).map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
        if document.version != STORE_VERSION {
            return Err(StoreError::UnsupportedVersion {
                found: document.version,
                expected: STORE_VERSION,
            });
        }

        Ok(document
            .links
            .into_iter()
            .map(|link| (link.slug.clone(), link))
            .collect())
    }

    async fn save(&self, links: BTreeMap<String, LinkRecord>) -> Result<()> {
        let document = LinkDocument {
            version: STORE_VERSION,
            links: links.into_values().collect(),
        };
        let json = serde_json::to_string_pretty(&document)?;
        atomic_write(&self.path, json.as_bytes()).await?;
        debug!("Saved {} links to {}", document.links.len(), self.path.display());
        Ok(())
    }
}

#[async_trait]
impl ReadLinkStore for JsonFileLinkStore {
    async fn get(&self, slug: &str) -> Result<Option<LinkRecord>> {
        Ok(self.load().await?.remove(slug))
    }

    async fn list(&self) -> Result<Vec<LinkRecord>> {
        Ok(self.load().await?.into_values().collect())
    }
}

#[async_trait]
impl LinkStore for JsonFileLinkStore {
    async fn upsert(&self, record: LinkRecord) -> Result<UpsertOutcome> {
        let _guard = self.write_lock.lock().await;
        let mut links = self.load().await?;
        let outcome = match links.get_mut(&record.slug) {
            Some(existing) => {
                merge_into(existing, record);
                UpsertOutcome::Updated
            }
            None => {
                links.insert(record.slug.clone(), record);
                UpsertOutcome::Created
            }
        };
        self.save(links).await?;
        Ok(outcome)
    }

    async fn insert_if_absent(&self, record: LinkRecord) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut links = self.load().await?;
        if links.contains_key(&record.slug) {
            return Ok(false);
        }
        links.insert(record.slug.clone(), record);
        self.save(links).await?;
        Ok(true)
    }
}

/// Atomic write via temp file + rename.
async fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let temp_path = parent.join(format!(
        ".tmp_links_{}_{}",
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    fs::write(&temp_path, content)
        .await
        .map_err(|source| StoreError::Io {
            path: temp_path.clone(),
            source,
        })?;
    fs::rename(&temp_path, path)
        .await
        .map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
}
