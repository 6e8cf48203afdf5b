use async_trait::async_trait;
use crate::types::{CanonicalArticle, SourceId, UpsertOutcome};
use crate::Result;

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Acquire a session for one adapter run. The session holds its
    /// connection until [`StoreSession::close`] is called or it is dropped.
    async fn open(&self) -> Result<Box<dyn StoreSession>>;

    /// Number of stored articles
    async fn count(&self) -> Result<u64>;

    /// Get all articles from a specific source
    async fn get_by_source(&self, source_id: SourceId) -> Result<Vec<CanonicalArticle>>;
}

#[async_trait]
pub trait StoreSession: Send {
    /// Insert the article unless its fingerprint is already stored.
    /// Existing rows are never updated.
    async fn upsert(&mut self, article: &CanonicalArticle) -> Result<UpsertOutcome>;

    /// Release the underlying connection.
    async fn close(self: Box<Self>) -> Result<()>;
}
