use nw_core::{ArticleStub, DelayPolicy, Fetcher, Result};
use std::sync::Arc;
use std::time::Duration;

use super::metadata;
use crate::config::SourceSettings;
use crate::scrapers::feed::{FeedAdapter, FeedItem, FeedSite};
use crate::scrapers::Adapter;
use crate::text;

pub const DEFAULTS: SourceSettings = SourceSettings::new(20, 5, DelayPolicy::Fixed(Duration::from_millis(1000)));

const BASE_URL: &str = "https://www.cooperativa.cl";
const FEED_BASE: &str = "https://www.cooperativa.cl/noticias/site/tax/port/all/";
const AUTHOR_LABEL: &str = "Autor :";

/// One numbered RSS series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lane {
    pub name: &'static str,
    pub prefix: &'static str,
}

impl Lane {
    pub fn cli_name(&self) -> String {
        format!("cooperativa/{}", self.name)
    }
}

pub const LANES: &[Lane] = &[
    Lane { name: "pais", prefix: "rss_3___" },
    Lane { name: "mundo", prefix: "rss_2___" },
];

// Both series are stored under the same source.
pub fn adapter(fetcher: Arc<dyn Fetcher>, lane: &Lane, settings: SourceSettings) -> Result<Adapter> {
    let meta = metadata("Cooperativa", "📡", 8, lane.cli_name());
    Ok(FeedAdapter::new(meta, settings, fetcher, Cooperativa { lane: *lane })?.into())
}

pub struct Cooperativa {
    lane: Lane,
}

impl FeedSite for Cooperativa {
    fn base_url(&self) -> &'static str {
        BASE_URL
    }

    fn feed_url(&self, index: u32) -> Option<String> {
        Some(format!("{}{}{}.xml", FEED_BASE, self.lane.prefix, index))
    }

    fn map_item(&self, item: &FeedItem) -> Option<ArticleStub> {
        let mut stub = ArticleStub::new(item.text("link")?, item.text("title")?);
        stub.description = item
            .text("descent")
            .map(|html| text::html_to_paragraphs(html, &[]));
        stub.content = item
            .text("description")
            .map(|html| text::html_to_paragraphs(html, &[]));
        stub.section = item.text("category").map(str::to_string);
        stub.author = item
            .text("author")
            .map(|a| a.replacen(AUTHOR_LABEL, "", 1).trim().to_string());
        stub.image_url = item.attr("media:content", "url").map(str::to_string);
        stub.published_at = item.text("pubDate").and_then(text::parse_datetime);
        Some(stub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{unpaced, MockFetcher};
    use nw_core::{Cursor, SourceAdapter};

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
          <channel>
            <item>
              <title>Gobierno anuncia plan</title>
              <link>https://www.cooperativa.cl/noticias/pais/gobierno/plan/2025-06-01/120000.html</link>
              <descent><![CDATA[<p>Bajada del plan.</p>]]></descent>
              <description><![CDATA[<p>Primer párrafo.</p><p></p><p>Segundo párrafo.</p>]]></description>
              <category>País</category>
              <pubDate>Sun, 01 Jun 2025 12:00:00 -0400</pubDate>
              <author>Autor : Cooperativa.cl</author>
              <media:content url="https://www.cooperativa.cl/noticias/site/artic/20250601/imag/foto.jpg" medium="image"/>
            </item>
            <item>
              <title>Sin fecha</title>
              <link>https://www.cooperativa.cl/noticias/pais/b.html</link>
              <description>&lt;p&gt;Texto.&lt;/p&gt;</description>
            </item>
            <item>
              <title>Sin enlace</title>
            </item>
          </channel>
        </rss>"#;

    fn lane() -> Lane {
        LANES[0]
    }

    #[tokio::test]
    async fn test_list_page_maps_items() {
        let url = "https://www.cooperativa.cl/noticias/site/tax/port/all/rss_3___1.xml";
        let fetcher = Arc::new(MockFetcher::new().with(url, FEED));
        let adapter = adapter(fetcher.clone(), &lane(), unpaced(20, 5)).unwrap();
        assert_eq!(adapter.initial_cursor(), Cursor::FeedIndex(1));

        let page = adapter.list_page(&Cursor::FeedIndex(1)).await.unwrap();
        assert!(page.has_more);
        assert_eq!(page.next_cursor, Cursor::FeedIndex(2));
        assert_eq!(page.stubs.len(), 2);

        let first = &page.stubs[0];
        assert_eq!(first.description.as_deref(), Some("Bajada del plan."));
        assert_eq!(first.content.as_deref(), Some("Primer párrafo.\n\nSegundo párrafo."));
        assert_eq!(first.section.as_deref(), Some("País"));
        assert_eq!(first.author.as_deref(), Some("Cooperativa.cl"));
        assert_eq!(
            first.image_url.as_deref(),
            Some("https://www.cooperativa.cl/noticias/site/artic/20250601/imag/foto.jpg")
        );
        assert!(first.published_at.is_some());
        assert_eq!(page.stubs[1].published_at, None);
        assert_eq!(page.stubs[1].content.as_deref(), Some("Texto."));

        let article = adapter.fetch_detail(page.stubs[0].clone()).await;
        assert_eq!(article.source_id.0, 8);
        assert_eq!(fetcher.requested(), vec![url.to_string()]);
    }

    #[tokio::test]
    async fn test_empty_feed_ends_paging() {
        let url = "https://www.cooperativa.cl/noticias/site/tax/port/all/rss_3___4.xml";
        let fetcher = Arc::new(MockFetcher::new().with(url, "<rss><channel></channel></rss>"));
        let adapter = adapter(fetcher, &lane(), unpaced(20, 5)).unwrap();

        let page = adapter.list_page(&Cursor::FeedIndex(4)).await.unwrap();
        assert!(page.stubs.is_empty());
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn test_truncated_feed_keeps_complete_items() {
        let url = "https://www.cooperativa.cl/noticias/site/tax/port/all/rss_3___2.xml";
        let truncated = &FEED[..FEED.find("<title>Sin fecha").unwrap()];
        let fetcher = Arc::new(MockFetcher::new().with(url, truncated));
        let adapter = adapter(fetcher, &lane(), unpaced(20, 5)).unwrap();

        let page = adapter.list_page(&Cursor::FeedIndex(2)).await.unwrap();
        assert_eq!(page.stubs.len(), 1);
        assert!(!page.has_more);
    }
}
