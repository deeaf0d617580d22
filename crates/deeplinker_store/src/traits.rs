//! Storage abstraction traits.
//!
//! These traits let the server run against any backend without changing
//! request handling.

use async_trait::async_trait;
use chrono::Utc;
use deeplinker_protocol::LinkRecord;

use crate::error::Result;

/// Whether an upsert created a new record or changed an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// A read-only view of a link store.
///
/// Enough for the resolver, which never writes.
#[async_trait]
pub trait ReadLinkStore: Send + Sync + 'static {
    /// The record for `slug` if it exists, active or not.
    async fn get(&self, slug: &str) -> Result<Option<LinkRecord>>;

    /// The record for `slug` only if it exists and is active.
    async fn find_active(&self, slug: &str) -> Result<Option<LinkRecord>> {
        Ok(self.get(slug).await?.filter(|link| link.is_active))
    }

    /// All records ordered by slug.
    async fn list(&self) -> Result<Vec<LinkRecord>>;
}

#[async_trait]
pub trait LinkStore: ReadLinkStore {
    /// Insert `record`, or merge it into the existing record with the same
    /// slug. On merge, only URLs present on `record` replace stored ones;
    /// `is_active` is taken from `record` and `created_at` is kept.
    async fn upsert(&self, record: LinkRecord) -> Result<UpsertOutcome>;

    /// Insert `record` unless the slug is taken. Returns `true` on insert.
    async fn insert_if_absent(&self, record: LinkRecord) -> Result<bool>;
}

/// Merge rule shared by the backends.
pub(crate) fn merge_into(existing: &mut LinkRecord, update: LinkRecord) {
    if update.ios_url.is_some() {
        existing.ios_url = update.ios_url;
    }
    if update.android_url.is_some() {
        existing.android_url = update.android_url;
    }
    if update.web_url.is_some() {
        existing.web_url = update.web_url;
    }
    if update.fallback_url.is_some() {
        existing.fallback_url = update.fallback_url;
    }
    existing.is_active = update.is_active;
    existing.updated_at = Utc::now();
}
