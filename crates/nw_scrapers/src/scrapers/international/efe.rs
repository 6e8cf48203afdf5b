use nw_core::{ArticleStub, DelayPolicy, Error, Fetcher, Result};
use scraper::Html;
use std::sync::Arc;
use std::time::Duration;

use super::metadata;
use crate::config::SourceSettings;
use crate::scrapers::html::{HtmlAdapter, HtmlSite};
use crate::scrapers::{Adapter, DetailPage};
use crate::text;

pub const CLI_NAME: &str = "efe";
pub const DEFAULTS: SourceSettings = SourceSettings::new(10, 5, DelayPolicy::Fixed(Duration::from_millis(300)));

const BASE_URL: &str = "https://efe.com";
const SECTION_URL: &str = "https://efe.com/mundo";

pub fn adapter(fetcher: Arc<dyn Fetcher>, settings: SourceSettings) -> Result<Adapter> {
    let meta = metadata("EFE", "🌎", 5, CLI_NAME);
    Ok(HtmlAdapter::new(meta, settings, fetcher, Efe)?.into())
}

/// EFE's world section, a WordPress archive with `/page/N/` pagination.
pub struct Efe;

impl HtmlSite for Efe {
    fn base_url(&self) -> &'static str {
        BASE_URL
    }

    fn listing_url(&self, page: u32) -> Option<String> {
        match page {
            0 => None,
            1 => Some(SECTION_URL.to_string()),
            n => Some(format!("{}/page/{}/", SECTION_URL, n)),
        }
    }

    fn parse_listing(&self, html: &str) -> Vec<ArticleStub> {
        let document = Html::parse_document(html);
        let articles = text::selector("article");
        let tag_links = text::selector(".tags-links a");

        document
            .select(&articles)
            .filter_map(|article| {
                let href = text::select_attr(article, "h2.entry-title a", "href")?;
                // taxonomy archives share the markup
                if href.contains("/tax/") {
                    return None;
                }
                let title = text::select_text(article, "h2.entry-title a")?;

                let mut stub = ArticleStub::new(href, title);
                stub.published_at = text::select_attr(article, "time.entry-date", "datetime")
                    .and_then(|d| text::parse_datetime(&d));
                stub.image_url = text::select_attr(article, ".post-image img", "src");
                stub.description = text::select_text(article, ".entry-summary p");
                stub.section = text::select_text(article, "footer .cat-links a");
                stub.tags = article.select(&tag_links).map(text::element_text).collect();
                Some(stub)
            })
            .collect()
    }
}

impl DetailPage for Efe {
    fn parse_detail(&self, html: &str, mut stub: ArticleStub) -> Result<ArticleStub> {
        let document = Html::parse_document(html);
        let root = document.root_element();

        let body = text::selector(".entry-content p");
        let content = text::join_paragraphs(root.select(&body).map(text::element_text));
        if content.is_empty() {
            return Err(Error::Extraction("no entry content".to_string()));
        }
        stub.content = Some(content);
        stub.author = text::select_text(root, ".author__name span")
            .or_else(|| text::select_text(root, ".entry-meta .author"))
            .or(stub.author);
        Ok(stub)
    }
}
