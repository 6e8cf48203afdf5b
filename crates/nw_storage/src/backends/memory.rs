use async_trait::async_trait;
use nw_core::{ArticleStore, CanonicalArticle, Fingerprint, Result, SourceId, StoreSession, UpsertOutcome};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use crate::StorageBackend;

#[derive(Debug, Default)]
pub struct MemoryStore {
    index: HashMap<Fingerprint, usize>,
    articles: Vec<CanonicalArticle>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, article: &CanonicalArticle) -> UpsertOutcome {
        let hash = article.content_hash();
        if self.index.contains_key(&hash) {
            return UpsertOutcome::Duplicate;
        }
        self.index.insert(hash, self.articles.len());
        self.articles.push(article.clone());
        UpsertOutcome::Inserted
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    pub fn get_by_source(&self, source_id: SourceId) -> Vec<CanonicalArticle> {
        self.articles
            .iter()
            .filter(|article| article.source_id == source_id)
            .cloned()
            .collect()
    }
}

/// Process-local store, used for dry runs and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    store: Arc<RwLock<MemoryStore>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> Vec<CanonicalArticle> {
        self.store.read().await.articles.clone()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    fn get_error_message() -> &'static str {
        "Memory storage should be available"
    }

    async fn new() -> Result<Self> where Self: Sized {
        Ok(Self::default())
    }
}

#[async_trait]
impl ArticleStore for MemoryStorage {
    async fn open(&self) -> Result<Box<dyn StoreSession>> {
        Ok(Box::new(MemorySession {
            store: self.store.clone(),
        }))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.store.read().await.len() as u64)
    }

    async fn get_by_source(&self, source_id: SourceId) -> Result<Vec<CanonicalArticle>> {
        Ok(self.store.read().await.get_by_source(source_id))
    }
}

pub struct MemorySession {
    store: Arc<RwLock<MemoryStore>>,
}

#[async_trait]
impl StoreSession for MemorySession {
    async fn upsert(&mut self, article: &CanonicalArticle) -> Result<UpsertOutcome> {
        Ok(self.store.write().await.upsert(article))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
