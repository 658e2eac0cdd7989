//! Recipients
//!
//! Durable mapping of chat id to locale. Records are created on first
//! interaction and never deleted.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::Result;
use crate::locale::Locale;

/// Opaque chat endpoint identifier (a Telegram chat id)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecipientId(i64);

impl RecipientId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for RecipientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: RecipientId,
    pub locale: Locale,
}

/// Recipient persistence. Writes are idempotent upserts keyed by id.
#[async_trait]
pub trait RecipientStore: Send + Sync {
    /// Insert or overwrite the locale (last write wins)
    async fn upsert_locale(&self, id: RecipientId, locale: Locale) -> Result<()>;

    /// Stored locale, or the store default when the id is unknown
    async fn get_locale(&self, id: RecipientId) -> Result<Locale>;

    /// Register `id` with the default locale unless already known; returns
    /// the effective locale
    async fn ensure(&self, id: RecipientId) -> Result<Locale>;

    /// Every recipient, ordered by id
    async fn list_all(&self) -> Result<Vec<Recipient>>;
}

/// In-memory recipient store (for development/testing)
pub struct MemoryRecipientStore {
    default_locale: Locale,
    recipients: RwLock<BTreeMap<RecipientId, Locale>>,
}

impl Default for MemoryRecipientStore {
    fn default() -> Self {
        Self::new(Locale::default())
    }
}

impl MemoryRecipientStore {
    pub fn new(default_locale: Locale) -> Self {
        Self {
            default_locale,
            recipients: RwLock::new(BTreeMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.recipients.read().await.len()
    }
}

#[async_trait]
impl RecipientStore for MemoryRecipientStore {
    async fn upsert_locale(&self, id: RecipientId, locale: Locale) -> Result<()> {
        self.recipients.write().await.insert(id, locale);
        Ok(())
    }

    async fn get_locale(&self, id: RecipientId) -> Result<Locale> {
        Ok(self
            .recipients
            .read()
            .await
            .get(&id)
            .copied()
            .unwrap_or(self.default_locale))
    }

    async fn ensure(&self, id: RecipientId) -> Result<Locale> {
        Ok(*self
            .recipients
            .write()
            .await
            .entry(id)
            .or_insert(self.default_locale))
    }

    async fn list_all(&self) -> Result<Vec<Recipient>> {
        Ok(self
            .recipients
            .read()
            .await
            .iter()
            .map(|(id, locale)| Recipient { id: *id, locale: *locale })
            .collect())
    }
}
