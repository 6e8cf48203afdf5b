use async_trait::async_trait;

use crate::fetch::Throttle;
use crate::types::{ArticleStub, CanonicalArticle, Cursor, Page, PagingPolicy, SourceId};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub name: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMetadata {
    pub name: &'static str,
    pub emoji: &'static str,
    pub region: Region,
    pub source_id: SourceId,
    /// `site` or `site/lane`, unique per adapter instance.
    pub cli_name: String,
}

impl SourceMetadata {
    /// `region/cli_name`, e.g. `chile/biobio/nacional`.
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.region.name, self.cli_name)
    }

    /// True when `filter` names this adapter, its site or its region.
    pub fn matches(&self, filter: &str) -> bool {
        let filter = filter.trim_matches('/').to_lowercase();
        let qualified = self.qualified_name();
        filter.is_empty()
            || qualified == filter
            || qualified.starts_with(&format!("{}/", filter))
            || self.cli_name == filter
            || self.cli_name.starts_with(&format!("{}/", filter))
    }
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn metadata(&self) -> &SourceMetadata;

    fn paging(&self) -> PagingPolicy;

    fn initial_cursor(&self) -> Cursor;

    /// Pacing applied between items of a page.
    fn throttle(&self) -> &Throttle;

    /// Fetch one page of listing data. An empty or unparseable page yields
    /// `has_more == false`; only transport failures are returned as errors.
    async fn list_page(&self, cursor: &Cursor) -> Result<Page>;

    /// Resolve a stub into a full record. Failures produce an article whose
    /// content is [`crate::EXTRACTION_FAILURE`] instead of an error.
    async fn fetch_detail(&self, stub: ArticleStub) -> CanonicalArticle;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(cli_name: &str) -> SourceMetadata {
        SourceMetadata {
            name: "Biobio",
            emoji: "📻",
            region: Region { name: "chile" },
            source_id: SourceId(7),
            cli_name: cli_name.to_string(),
        }
    }

    #[test]
    fn test_matches() {
        let m = meta("biobio/nacional");
        assert_eq!(m.qualified_name(), "chile/biobio/nacional");
        assert!(m.matches("chile"));
        assert!(m.matches("chile/biobio"));
        assert!(m.matches("chile/biobio/nacional"));
        assert!(m.matches("biobio"));
        assert!(m.matches("biobio/nacional"));
        assert!(m.matches("Chile/"));
        assert!(!m.matches("chile/bio"));
        assert!(!m.matches("biobio/economia"));
        assert!(!m.matches("argentina"));
    }
}
