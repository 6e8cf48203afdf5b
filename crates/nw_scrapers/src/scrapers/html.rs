use async_trait::async_trait;
use nw_core::{
    ArticleStub, CanonicalArticle, Cursor, Fetcher, Page, PagingPolicy, RequestProfile, Result, SourceAdapter,
    SourceMetadata, Throttle,
};
use std::sync::Arc;
use tracing::debug;

use super::{AdapterCore, DetailPage};
use crate::config::SourceSettings;

/// A site whose listing is a rendered HTML page addressed by page number.
pub trait HtmlSite: DetailPage {
    fn base_url(&self) -> &'static str;

    /// Listing URL of 1-based `page`, `None` past the last reachable page.
    fn listing_url(&self, page: u32) -> Option<String>;

    fn listing_profile(&self) -> RequestProfile {
        RequestProfile::html()
    }

    /// Stubs in page order. Relative links are fine; they are resolved
    /// against [`HtmlSite::base_url`].
    fn parse_listing(&self, html: &str) -> Vec<ArticleStub>;
}

pub struct HtmlAdapter {
    pub(super) core: AdapterCore,
    site: Box<dyn HtmlSite>,
}

impl HtmlAdapter {
    pub fn new(
        meta: SourceMetadata,
        settings: SourceSettings,
        fetcher: Arc<dyn Fetcher>,
        site: impl HtmlSite + 'static,
    ) -> Result<Self> {
        Ok(Self {
            core: AdapterCore::new(meta, settings, fetcher, site.base_url())?,
            site: Box::new(site),
        })
    }
}

#[async_trait]
impl SourceAdapter for HtmlAdapter {
    fn metadata(&self) -> &SourceMetadata {
        &self.core.meta
    }

    fn paging(&self) -> PagingPolicy {
        self.core.paging()
    }

    fn initial_cursor(&self) -> Cursor {
        Cursor::Page(1)
    }

    fn throttle(&self) -> &Throttle {
        &self.core.throttle
    }

    async fn list_page(&self, cursor: &Cursor) -> Result<Page> {
        let page = match cursor {
            Cursor::Page(page) => *page,
            other => return Ok(Page::last(Vec::new(), *other)),
        };
        let Some(url) = self.site.listing_url(page) else {
            return Ok(Page::last(Vec::new(), *cursor));
        };

        let response = self.core.get(&url, &self.site.listing_profile()).await?;
        let stubs = self.core.normalize(self.site.parse_listing(&response.body));
        let has_more = !stubs.is_empty() && self.site.listing_url(page.saturating_add(1)).is_some();
        debug!(source = self.core.meta.name, %url, items = stubs.len(), has_more, "Listing parsed");

        Ok(Page {
            stubs,
            next_cursor: cursor.advance(self.core.paging().page_size),
            has_more,
        })
    }

    async fn fetch_detail(&self, stub: ArticleStub) -> CanonicalArticle {
        self.core.resolve_detail(stub, self.site.as_ref()).await
    }
}
