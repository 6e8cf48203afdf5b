//! Source adapters.
//!
//! Every backend is one of three transport shapes, each a variant of
//! [`Adapter`]:
//!
//! | Variant | Listing | Detail |
//! |---------|---------|--------|
//! | [`HtmlAdapter`] | rendered HTML, page-number cursor | second HTML fetch |
//! | [`JsonAdapter`] | paginated JSON, offset or page-number cursor | inline, an HTML page, or a JSON API |
//! | [`FeedAdapter`] | RSS page files | inline |
//!
//! Sites only supply URLs and extraction rules through [`HtmlSite`],
//! [`JsonSite`] and [`FeedSite`].

use async_trait::async_trait;
use nw_core::{
    ArticleStub, CanonicalArticle, Cursor, FetchResponse, Fetcher, Page, PagingPolicy, RateLimitedFetcher,
    RequestProfile, Result, SourceAdapter, SourceMetadata, Throttle,
};
use std::sync::Arc;
use tracing::warn;
use url::Url;

use crate::config::{SourceSettings, SourcesConfig};
use crate::text;

pub mod chile;
pub mod feed;
pub mod html;
pub mod international;
pub mod json;
pub mod jsonld;

pub use feed::{FeedAdapter, FeedItem, FeedSite};
pub use html::{HtmlAdapter, HtmlSite};
pub use json::{JsonAdapter, JsonSite};

/// Extraction rules for an article page fetched separately from its listing.
pub trait DetailPage: Send + Sync {
    fn detail_profile(&self) -> RequestProfile {
        RequestProfile::html()
    }

    /// Where the body of `stub` is fetched from. Sites serving articles
    /// through an API point this away from the public URL.
    fn detail_url(&self, stub: &ArticleStub) -> String {
        stub.url.clone()
    }

    /// Fill `stub` from the fetched document (HTML, or JSON for API
    /// details). An `Err` marks the item as an extraction failure.
    fn parse_detail(&self, body: &str, stub: ArticleStub) -> Result<ArticleStub>;
}

/// State shared by every variant: identity, tuning and the paced fetcher.
/// `throttle` paces items for the runner, the fetcher paces requests.
pub(crate) struct AdapterCore {
    meta: SourceMetadata,
    settings: SourceSettings,
    throttle: Throttle,
    fetcher: RateLimitedFetcher,
    base: Url,
}

impl AdapterCore {
    pub(crate) fn new(
        meta: SourceMetadata,
        settings: SourceSettings,
        fetcher: Arc<dyn Fetcher>,
        base_url: &str,
    ) -> Result<Self> {
        Ok(Self {
            base: text::parse_url(base_url)?,
            throttle: Throttle::new(settings.delay),
            fetcher: RateLimitedFetcher::new(fetcher, settings.request_delay, settings.phase),
            meta,
            settings,
        })
    }

    pub(crate) fn paging(&self) -> PagingPolicy {
        self.settings.paging
    }

    /// GET that turns non-2xx answers into transport errors.
    pub(crate) async fn get(&self, url: &str, profile: &RequestProfile) -> Result<FetchResponse> {
        self.fetcher.get(url, profile).await?.error_for_status()
    }

    pub(crate) fn normalize(&self, stubs: Vec<ArticleStub>) -> Vec<ArticleStub> {
        text::dedup_by_url(
            stubs
                .into_iter()
                .filter_map(|stub| text::normalize_stub(&self.base, stub))
                .collect(),
        )
    }

    /// Record for a stub whose listing already carried the body.
    pub(crate) fn inline(&self, stub: ArticleStub) -> CanonicalArticle {
        if stub.content.is_none() {
            warn!(source = self.meta.name, url = %stub.url, "Listing item has no body");
            return CanonicalArticle::extraction_failed(self.meta.source_id, stub);
        }
        CanonicalArticle::from_stub(self.meta.source_id, stub)
    }

    /// Fetch and parse the article page; any failure yields the sentinel.
    pub(crate) async fn resolve_detail<D: DetailPage + ?Sized>(&self, stub: ArticleStub, detail: &D) -> CanonicalArticle {
        let source_id = self.meta.source_id;
        let detail_url = detail.detail_url(&stub);
        let response = match self.get(&detail_url, &detail.detail_profile()).await {
            Ok(response) => response,
            Err(e) => {
                warn!(source = self.meta.name, url = %stub.url, %detail_url, error = %e, "Detail fetch failed");
                return CanonicalArticle::extraction_failed(source_id, stub);
            }
        };

        match detail.parse_detail(&response.body, stub.clone()) {
            Ok(enriched) => match text::normalize_stub(&self.base, enriched) {
                Some(enriched) => CanonicalArticle::from_stub(source_id, enriched),
                None => CanonicalArticle::extraction_failed(source_id, stub),
            },
            Err(e) => {
                warn!(source = self.meta.name, url = %stub.url, error = %e, "Detail extraction failed");
                CanonicalArticle::extraction_failed(source_id, stub)
            }
        }
    }
}

/// Enum that holds all possible adapter types
pub enum Adapter {
    Html(HtmlAdapter),
    Json(JsonAdapter),
    Feed(FeedAdapter),
}

impl Adapter {
    fn core(&self) -> &AdapterCore {
        match self {
            Adapter::Html(a) => &a.core,
            Adapter::Json(a) => &a.core,
            Adapter::Feed(a) => &a.core,
        }
    }

    pub fn settings(&self) -> &SourceSettings {
        &self.core().settings
    }

    pub fn transport(&self) -> &'static str {
        match self {
            Adapter::Html(_) => "html",
            Adapter::Json(_) => "json",
            Adapter::Feed(_) => "rss",
        }
    }
}

#[async_trait]
impl SourceAdapter for Adapter {
    fn metadata(&self) -> &SourceMetadata {
        &self.core().meta
    }

    fn paging(&self) -> PagingPolicy {
        self.core().paging()
    }

    fn initial_cursor(&self) -> Cursor {
        match self {
            Adapter::Html(a) => a.initial_cursor(),
            Adapter::Json(a) => a.initial_cursor(),
            Adapter::Feed(a) => a.initial_cursor(),
        }
    }

    fn throttle(&self) -> &Throttle {
        &self.core().throttle
    }

    async fn list_page(&self, cursor: &Cursor) -> Result<Page> {
        match self {
            Adapter::Html(a) => a.list_page(cursor).await,
            Adapter::Json(a) => a.list_page(cursor).await,
            Adapter::Feed(a) => a.list_page(cursor).await,
        }
    }

    async fn fetch_detail(&self, stub: ArticleStub) -> CanonicalArticle {
        match self {
            Adapter::Html(a) => a.fetch_detail(stub).await,
            Adapter::Json(a) => a.fetch_detail(stub).await,
            Adapter::Feed(a) => a.fetch_detail(stub).await,
        }
    }
}

impl From<HtmlAdapter> for Adapter {
    fn from(adapter: HtmlAdapter) -> Self {
        Adapter::Html(adapter)
    }
}

impl From<JsonAdapter> for Adapter {
    fn from(adapter: JsonAdapter) -> Self {
        Adapter::Json(adapter)
    }
}

impl From<FeedAdapter> for Adapter {
    fn from(adapter: FeedAdapter) -> Self {
        Adapter::Feed(adapter)
    }
}

/// Every configured adapter, disabled ones left out.
pub fn get_adapters(fetcher: Arc<dyn Fetcher>, config: &SourcesConfig) -> Result<Vec<Adapter>> {
    let mut adapters = chile::get_adapters(&fetcher, config)?;
    adapters.extend(international::get_adapters(&fetcher, config)?);
    adapters.retain(|a| a.settings().enabled);
    Ok(adapters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockFetcher;
    use nw_core::{DelayPhase, DelayPolicy};
    use std::collections::HashSet;
    use std::time::{Duration, Instant};

    #[test]
    fn test_get_adapters() {
        let fetcher: Arc<dyn Fetcher> = Arc::new(MockFetcher::new());
        let adapters = get_adapters(fetcher, &SourcesConfig::default()).unwrap();
        assert!(!adapters.is_empty());

        let names: Vec<String> = adapters.iter().map(|a| a.metadata().qualified_name()).collect();
        let unique: HashSet<&String> = names.iter().collect();
        assert_eq!(unique.len(), names.len(), "duplicate adapter names: {:?}", names);

        for transport in ["html", "json", "rss"] {
            assert!(adapters.iter().any(|a| a.transport() == transport));
        }
        assert!(names.contains(&"chile/biobio/nacional".to_string()));
        assert!(names.contains(&"international/apnews/world".to_string()));
        assert!(names.contains(&"chile/df".to_string()));
        assert!(names.contains(&"international/reuters".to_string()));
    }

    #[test]
    fn test_disabled_adapters_are_dropped() {
        let fetcher: Arc<dyn Fetcher> = Arc::new(MockFetcher::new());
        let config = SourcesConfig::from_json(r#"{"sources": {"biobio": {"enabled": false}}}"#).unwrap();
        let adapters = get_adapters(fetcher, &config).unwrap();
        assert!(adapters.iter().all(|a| !a.metadata().cli_name.starts_with("biobio")));
        assert!(adapters.iter().any(|a| a.metadata().cli_name == "emol"));
    }

    #[tokio::test]
    async fn test_item_delay_does_not_pace_requests() {
        let url = "https://www.latercera.com/politica/noticia/x/ABC/";
        let page = r#"<p class="article-body__paragraph">Cuerpo.</p>"#;
        let fetcher: Arc<dyn Fetcher> = Arc::new(MockFetcher::new().with(url, page));

        let adapter = chile::latercera::adapter(fetcher.clone(), chile::latercera::DEFAULTS).unwrap();
        assert_eq!(adapter.throttle().policy(), chile::latercera::DEFAULTS.delay);
        let started = Instant::now();
        let article = adapter.fetch_detail(ArticleStub::new(url, "Titular")).await;
        assert!(!article.is_extraction_failure());
        assert!(started.elapsed() < Duration::from_millis(250));

        let settings = chile::latercera::DEFAULTS.with_request_delay(DelayPolicy::fixed_ms(300), DelayPhase::Before);
        let adapter = chile::latercera::adapter(fetcher, settings).unwrap();
        assert_eq!(adapter.throttle().policy(), settings.delay);
        let started = Instant::now();
        adapter.fetch_detail(ArticleStub::new(url, "Titular")).await;
        assert!(started.elapsed() >= Duration::from_millis(300));
    }
}
