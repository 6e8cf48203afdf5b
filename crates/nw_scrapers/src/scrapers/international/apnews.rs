use chrono::DateTime;
use nw_core::{ArticleStub, DelayPolicy, Error, Fetcher, Result};
use scraper::Html;
use std::sync::Arc;
use std::time::Duration;

use super::metadata;
use crate::config::SourceSettings;
use crate::scrapers::html::{HtmlAdapter, HtmlSite};
use crate::scrapers::{jsonld, Adapter, DetailPage};
use crate::text;

pub const DEFAULTS: SourceSettings = SourceSettings::new(20, 1, DelayPolicy::Fixed(Duration::from_millis(300)));

const BASE_URL: &str = "https://apnews.com";

/// One AP hub page. Hubs are not paginated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lane {
    pub name: &'static str,
    pub path: &'static str,
    pub section: &'static str,
}

impl Lane {
    pub fn cli_name(&self) -> String {
        format!("apnews/{}", self.name)
    }
}

pub const LANES: &[Lane] = &[
    Lane { name: "world", path: "/world-news", section: "World" },
    Lane { name: "us", path: "/us-news", section: "U.S." },
];

pub fn adapter(fetcher: Arc<dyn Fetcher>, lane: &Lane, settings: SourceSettings) -> Result<Adapter> {
    let meta = metadata("AP News", "🌐", 4, lane.cli_name());
    Ok(HtmlAdapter::new(meta, settings, fetcher, ApNews { lane: *lane })?.into())
}

/// The largest candidate of a `srcset`.
fn largest_from_srcset(srcset: &str) -> Option<String> {
    srcset
        .split(',')
        .filter_map(|candidate| candidate.split_whitespace().next())
        .last()
        .and_then(text::non_empty)
}

pub struct ApNews {
    lane: Lane,
}

impl HtmlSite for ApNews {
    fn base_url(&self) -> &'static str {
        BASE_URL
    }

    fn listing_url(&self, page: u32) -> Option<String> {
        (page == 1).then(|| format!("{}{}", BASE_URL, self.lane.path))
    }

    fn parse_listing(&self, html: &str) -> Vec<ArticleStub> {
        let document = Html::parse_document(html);
        let promos = text::selector(".PagePromo");

        document
            .select(&promos)
            .filter_map(|promo| {
                let href = text::select_attr(promo, "h3.PagePromo-title a", "href")?;
                let title = text::select_text(promo, "h3.PagePromo-title span.PagePromoContentIcons-text")
                    .or_else(|| text::select_text(promo, "h3.PagePromo-title a"))?;

                let mut stub = ArticleStub::new(href, title);
                stub.description = text::select_text(promo, ".PagePromo-description");
                stub.image_url = text::select_attr(promo, "img.PagePromo-image-img", "src");
                stub.section = Some(self.lane.section.to_string());
                stub.published_at = text::select_attr(promo, "bsp-timestamp", "data-timestamp")
                    .and_then(|ms| ms.parse::<i64>().ok())
                    .and_then(DateTime::from_timestamp_millis)
                    .or_else(|| text::select_text(promo, "span.Timestamp").and_then(|t| text::parse_datetime(&t)));
                Some(stub)
            })
            .collect()
    }
}

impl DetailPage for ApNews {
    fn parse_detail(&self, html: &str, mut stub: ArticleStub) -> Result<ArticleStub> {
        let document = Html::parse_document(html);
        let root = document.root_element();

        let body = text::selector(".RichTextStoryBody p");
        let content = text::join_paragraphs(root.select(&body).map(text::element_text));
        if content.is_empty() {
            return Err(Error::Extraction("no story body".to_string()));
        }
        stub.content = Some(content);

        let bylines: Vec<String> = root
            .select(&text::selector(".Page-byline-info .Page-authors span.Link"))
            .map(text::element_text)
            .filter(|a| !a.is_empty())
            .collect();
        let authors = if bylines.is_empty() {
            jsonld::extract_authors(&document)
        } else {
            bylines
        };
        if !authors.is_empty() {
            stub.author = Some(authors.join(", "));
        }

        let modified = text::select_text(root, ".Page-byline-info .Page-dateModified span[data-date]")
            .and_then(|d| text::parse_datetime(&d));
        let published = jsonld::extract_date_published(&document).and_then(|d| text::parse_datetime(&d));
        if let Some(date) = modified.or(published) {
            stub.published_at = Some(date);
        }

        if let Some(image) = text::select_attr(root, ".RichTextBody img.Image", "srcset")
            .as_deref()
            .and_then(largest_from_srcset)
        {
            stub.image_url = Some(image);
        }
        Ok(stub)
    }
}
