use async_trait::async_trait;
use nw_core::{
    ArticleStub, CanonicalArticle, Cursor, Fetcher, Page, PagingPolicy, RequestProfile, Result, SourceAdapter,
    SourceMetadata, Throttle,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{AdapterCore, DetailPage};
use crate::config::SourceSettings;

/// A site exposing its listing as a paginated JSON API.
pub trait JsonSite: Send + Sync {
    fn base_url(&self) -> &'static str;

    fn initial_cursor(&self) -> Cursor {
        Cursor::Offset(0)
    }

    /// Request URL for `cursor`, `None` for a cursor kind the site does not use.
    fn listing_url(&self, cursor: &Cursor, page_size: u32) -> Option<String>;

    fn listing_profile(&self) -> RequestProfile {
        RequestProfile::json()
    }

    /// Stubs of one response. An `Err` means the payload did not have the
    /// expected shape.
    fn parse_listing(&self, payload: Value) -> Result<Vec<ArticleStub>>;

    /// Article page rules when the listing does not carry the body.
    fn detail_page(&self) -> Option<&dyn DetailPage> {
        None
    }
}

/// Deserialize each element on its own, skipping the ones that do not fit `T`.
pub fn items<T: DeserializeOwned>(values: Vec<Value>) -> Vec<T> {
    values
        .into_iter()
        .filter_map(|value| match serde_json::from_value(value) {
            Ok(item) => Some(item),
            Err(e) => {
                debug!(error = %e, "Skipping malformed listing item");
                None
            }
        })
        .collect()
}

pub struct JsonAdapter {
    pub(super) core: AdapterCore,
    site: Box<dyn JsonSite>,
}

impl JsonAdapter {
    pub fn new(
        meta: SourceMetadata,
        settings: SourceSettings,
        fetcher: Arc<dyn Fetcher>,
        site: impl JsonSite + 'static,
    ) -> Result<Self> {
        Ok(Self {
            core: AdapterCore::new(meta, settings, fetcher, site.base_url())?,
            site: Box::new(site),
        })
    }
}

#[async_trait]
impl SourceAdapter for JsonAdapter {
    fn metadata(&self) -> &SourceMetadata {
        &self.core.meta
    }

    fn paging(&self) -> PagingPolicy {
        self.core.paging()
    }

    fn initial_cursor(&self) -> Cursor {
        self.site.initial_cursor()
    }

    fn throttle(&self) -> &Throttle {
        &self.core.throttle
    }

    async fn list_page(&self, cursor: &Cursor) -> Result<Page> {
        let page_size = self.core.paging().page_size;
        let Some(url) = self.site.listing_url(cursor, page_size) else {
            return Ok(Page::last(Vec::new(), *cursor));
        };

        let response = self.core.get(&url, &self.site.listing_profile()).await?;
        let payload = match serde_json::from_str::<Value>(&response.body) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(source = self.core.meta.name, %url, error = %e, "Listing is not JSON");
                return Ok(Page::last(Vec::new(), *cursor));
            }
        };
        let stubs = match self.site.parse_listing(payload) {
            Ok(stubs) => stubs,
            Err(e) => {
                warn!(source = self.core.meta.name, %url, error = %e, "Unexpected listing shape");
                return Ok(Page::last(Vec::new(), *cursor));
            }
        };

        // a short page is the last one
        let returned = stubs.len();
        let has_more = returned > 0 && returned >= page_size as usize;
        let stubs = self.core.normalize(stubs);
        debug!(source = self.core.meta.name, %url, items = stubs.len(), has_more, "Listing parsed");

        Ok(Page {
            stubs,
            next_cursor: cursor.advance(page_size),
            has_more,
        })
    }

    async fn fetch_detail(&self, stub: ArticleStub) -> CanonicalArticle {
        match self.site.detail_page() {
            Some(detail) => self.core.resolve_detail(stub, detail).await,
            None => self.core.inline(stub),
        }
    }
}
