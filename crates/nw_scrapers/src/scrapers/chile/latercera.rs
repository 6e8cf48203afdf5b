use nw_core::{ArticleStub, Cursor, DelayPolicy, Error, Fetcher, Result};
use scraper::Html;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::metadata;
use crate::config::SourceSettings;
use crate::scrapers::json::{items, JsonAdapter, JsonSite};
use crate::scrapers::{Adapter, DetailPage};
use crate::text;

pub const CLI_NAME: &str = "latercera";
pub const DEFAULTS: SourceSettings = SourceSettings::new(12, 5, DelayPolicy::Fixed(Duration::from_millis(300)));

const BASE_URL: &str = "https://www.latercera.com";
const FEED_URL: &str = "https://www.latercera.com/pf/api/v3/content/fetch/story-feed-query-fetch";
const SECTIONS_EXCLUDE: &str = "/opinion, /cartas-al-director, /editorial";

pub fn adapter(fetcher: Arc<dyn Fetcher>, settings: SourceSettings) -> Result<Adapter> {
    let meta = metadata("La Tercera", "📰", 1, CLI_NAME);
    Ok(JsonAdapter::new(meta, settings, fetcher, LaTercera)?.into())
}

#[derive(Debug, Deserialize)]
struct Element {
    canonical_url: String,
    headlines: Option<Text>,
    description: Option<Text>,
    credits: Option<Credits>,
    publish_date: Option<String>,
    taxonomy: Option<Taxonomy>,
    promo_items: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Text {
    basic: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Credits {
    #[serde(default)]
    by: Vec<Named>,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Taxonomy {
    primary_section: Option<Named>,
    #[serde(default)]
    tags: Vec<TagText>,
}

#[derive(Debug, Deserialize)]
struct TagText {
    text: Option<String>,
}

impl Element {
    fn into_stub(self) -> ArticleStub {
        let (section, tags) = match self.taxonomy {
            Some(t) => (
                t.primary_section.and_then(|s| s.name),
                t.tags.into_iter().filter_map(|t| t.text).collect(),
            ),
            None => (None, Vec::new()),
        };

        ArticleStub {
            url: self.canonical_url,
            title: self.headlines.and_then(|h| h.basic).unwrap_or_default(),
            description: self.description.and_then(|d| d.basic),
            author: self.credits.and_then(|c| c.by.into_iter().find_map(|b| b.name)),
            section,
            tags,
            content: None,
            image_url: self
                .promo_items
                .as_ref()
                .and_then(|p| p.pointer("/basic/url"))
                .and_then(Value::as_str)
                .map(str::to_string),
            published_at: self.publish_date.as_deref().and_then(text::parse_datetime),
        }
    }
}

/// La Tercera's story feed (Arc XP). The feed has no body, so every story
/// is fetched again as HTML.
pub struct LaTercera;

impl JsonSite for LaTercera {
    fn base_url(&self) -> &'static str {
        BASE_URL
    }

    fn listing_url(&self, cursor: &Cursor, page_size: u32) -> Option<String> {
        let Cursor::Offset(offset) = cursor else {
            return None;
        };
        let query = json!({
            "feedOffset": offset,
            "feedSize": page_size,
            "fromComponent": "result-list",
            "query": "type:story",
            "sectionsExclude": SECTIONS_EXCLUDE,
        });
        Url::parse_with_params(FEED_URL, &[("query", query.to_string().as_str()), ("_website", "la-tercera")])
            .ok()
            .map(String::from)
    }

    fn parse_listing(&self, mut payload: Value) -> Result<Vec<ArticleStub>> {
        match payload.get_mut("content_elements").map(Value::take) {
            Some(Value::Array(elements)) => Ok(items::<Element>(elements).into_iter().map(Element::into_stub).collect()),
            _ => Err(Error::Extraction("missing content_elements".to_string())),
        }
    }

    fn detail_page(&self) -> Option<&dyn DetailPage> {
        Some(self)
    }
}

impl DetailPage for LaTercera {
    fn parse_detail(&self, html: &str, mut stub: ArticleStub) -> Result<ArticleStub> {
        let document = Html::parse_document(html);
        let blocks = text::selector(".article-body__paragraph, .article-body__heading-h2");

        let paragraphs: Vec<String> = document
            .select(&blocks)
            .filter_map(|el| {
                let content = text::element_text(el);
                match (el.value().name(), content.is_empty()) {
                    (_, true) => None,
                    ("h2", false) => Some(format!("## {}", content)),
                    (_, false) => Some(content),
                }
            })
            .collect();

        if paragraphs.is_empty() {
            return Err(Error::Extraction("no article body".to_string()));
        }
        stub.content = Some(text::join_paragraphs(paragraphs));
        Ok(stub)
    }
}
