use std::collections::BTreeMap;

use async_trait::async_trait;
use deeplinker_protocol::LinkRecord;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::traits::{merge_into, LinkStore, ReadLinkStore, UpsertOutcome};

/// In-memory link store keyed by slug.
#[derive(Debug, Default)]
pub struct MemoryLinkStore {
    links: RwLock<BTreeMap<String, LinkRecord>>,
}

impl MemoryLinkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `links`. Later duplicates win.
    pub fn with_links(links: impl IntoIterator<Item = LinkRecord>) -> Self {
        let links = links
            .into_iter()
            .map(|link| (link.slug.clone(), link))
            .collect();
        Self {
            links: RwLock::new(links),
        }
    }
}

#[async_trait]
impl ReadLinkStore for MemoryLinkStore {
    async fn get(&self, slug: &str) -> Result<Option<LinkRecord>> {
        Ok(self.links.read().await.get(slug).cloned())
    }

    async fn list(&self) -> Result<Vec<LinkRecord>> {
        Ok(self.links.read().await.values().cloned().collect())
    }
}

#[async_trait]
impl LinkStore for MemoryLinkStore {
    async fn upsert(&self, record: LinkRecord) -> Result<UpsertOutcome> {
        let mut links = self.links.write().await;
        match links.get_mut(&record.slug) {
            Some(existing) => {
                merge_into(existing, record);
                Ok(UpsertOutcome::Updated)
            }
            None => {
                links.insert(record.slug.clone(), record);
                Ok(UpsertOutcome::Created)
            }
        }
    }

    async fn insert_if_absent(&self, record: LinkRecord) -> Result<bool> {
        let mut links = self.links.write().await;
        if links.contains_key(&record.slug) {
            return Ok(false);
        }
        links.insert(record.slug.clone(), record);
        Ok(true)
    }
}
