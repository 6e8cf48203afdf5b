use nw_core::{ArticleStub, Cursor, DelayPolicy, Error, Fetcher, RequestProfile, Result};
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

pub const CLI_NAME: &str = "reuters";
pub const DEFAULTS: SourceSettings = SourceSettings::new(15, 6, DelayPolicy::Fixed(Duration::from_millis(800)));

/// Optional session cookie sent with every request.
pub const COOKIE_VAR: &str = "REUTERS_COOKIE";

const BASE_URL: &str = "https://www.reuters.com";
const SECTION: &str = "/world/";
const LISTING_URL: &str = "https://www.reuters.com/pf/api/v3/content/fetch/articles-by-section-alias-or-id-v1";
const DETAIL_URL: &str = "https://www.reuters.com/pf/api/v3/content/fetch/article-by-id-or-url-v1";
const DEFAULT_SECTION: &str = "World";

pub fn adapter(fetcher: Arc<dyn Fetcher>, settings: SourceSettings) -> Result<Adapter> {
    let meta = metadata("Reuters", "🗞️", 6, CLI_NAME);
    let site = Reuters {
        cookie: std::env::var(COOKIE_VAR).ok().filter(|c| !c.trim().is_empty()),
    };
    Ok(JsonAdapter::new(meta, settings, fetcher, site)?.into())
}

/// Query string shared by both endpoints around the JSON `query` parameter.
fn api_url(endpoint: &str, query: Value) -> Option<String> {
    Url::parse_with_params(
        endpoint,
        &[
            ("query", query.to_string().as_str()),
            ("d", "291"),
            ("mxId", "00000000"),
            ("_website", "reuters"),
        ],
    )
    .ok()
    .map(String::from)
}

#[derive(Debug, Deserialize)]
struct Item {
    canonical_url: String,
    title: Option<String>,
    description: Option<String>,
    kicker: Option<Kicker>,
    thumbnail: Option<Image>,
    published_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Kicker {
    #[serde(default)]
    names: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Image {
    url: Option<String>,
}

impl Item {
    fn into_stub(self) -> ArticleStub {
        let mut stub = ArticleStub::new(
            format!("{}{}", BASE_URL, self.canonical_url),
            self.title.unwrap_or_default(),
        );
        stub.description = self.description;
        stub.section = Some(
            self.kicker
                .and_then(|k| k.names.into_iter().next())
                .unwrap_or_else(|| DEFAULT_SECTION.to_string()),
        );
        stub.image_url = self.thumbnail.and_then(|t| t.url);
        stub.published_at = self.published_time.as_deref().and_then(text::parse_datetime);
        stub
    }
}

#[derive(Debug, Deserialize)]
struct Story {
    #[serde(default)]
    authors: Vec<Author>,
    #[serde(default)]
    content_elements: Vec<ContentElement>,
    taxonomy: Option<Taxonomy>,
    related_content: Option<Related>,
}

#[derive(Debug, Deserialize)]
struct Author {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentElement {
    #[serde(rename = "type")]
    kind: Option<String>,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Taxonomy {
    #[serde(default)]
    keywords: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Related {
    #[serde(default)]
    images: Vec<Image>,
}

/// Reuters' World section through the site's content API. Listing and
/// stories both come from JSON endpoints; the story endpoint is keyed by
/// the article path.
pub struct Reuters {
    cookie: Option<String>,
}

impl Reuters {
    fn profile(&self) -> RequestProfile {
        let profile = RequestProfile::json()
            .with_referer(format!("{}{}", BASE_URL, SECTION))
            .with_header("priority", "u=1, i")
            .with_header("sec-ch-ua-mobile", "?0")
            .with_header("sec-ch-ua-platform", "\"Windows\"")
            .with_header("sec-fetch-dest", "empty")
            .with_header("sec-fetch-mode", "cors")
            .with_header("sec-fetch-site", "same-origin");
        match &self.cookie {
            Some(cookie) => profile.with_header("cookie", cookie.clone()),
            None => profile,
        }
    }
}

impl JsonSite for Reuters {
    fn base_url(&self) -> &'static str {
        BASE_URL
    }

    fn listing_url(&self, cursor: &Cursor, page_size: u32) -> Option<String> {
        let Cursor::Offset(offset) = cursor else {
            return None;
        };
        let query = json!({
            "arc-site": "reuters",
            "fetch_type": "collection",
            "offset": offset,
            "section_id": SECTION,
            "size": page_size,
            "uri": SECTION,
            "website": "reuters",
        });
        api_url(LISTING_URL, query)
    }

    fn listing_profile(&self) -> RequestProfile {
        self.profile()
    }

    fn parse_listing(&self, mut payload: Value) -> Result<Vec<ArticleStub>> {
        match payload.pointer_mut("/result/articles").map(Value::take) {
            Some(Value::Array(articles)) => Ok(items::<Item>(articles).into_iter().map(Item::into_stub).collect()),
            _ => Err(Error::Extraction("missing result.articles".to_string())),
        }
    }

    fn detail_page(&self) -> Option<&dyn DetailPage> {
        Some(self)
    }
}

impl DetailPage for Reuters {
    fn detail_profile(&self) -> RequestProfile {
        self.profile()
    }

    fn detail_url(&self, stub: &ArticleStub) -> String {
        let uri = stub.url.strip_prefix(BASE_URL).unwrap_or(&stub.url);
        let query = json!({
            "uri": uri,
            "website": "reuters",
            "published": "true",
            "website_url": uri,
            "arc-site": "reuters",
        });
        api_url(DETAIL_URL, query).unwrap_or_else(|| stub.url.clone())
    }

    fn parse_detail(&self, body: &str, mut stub: ArticleStub) -> Result<ArticleStub> {
        let mut payload: Value =
            serde_json::from_str(body).map_err(|e| Error::Extraction(format!("story is not JSON: {}", e)))?;
        let story: Story = payload
            .get_mut("result")
            .map(Value::take)
            .ok_or_else(|| Error::Extraction("missing result".to_string()))
            .and_then(|result| {
                serde_json::from_value(result).map_err(|e| Error::Extraction(format!("unexpected story: {}", e)))
            })?;

        let content = text::join_paragraphs(
            story
                .content_elements
                .into_iter()
                .filter(|el| el.kind.as_deref() == Some("paragraph"))
                .filter_map(|el| el.content)
                .map(|p| text::strip_markup(&p)),
        );
        if content.is_empty() {
            return Err(Error::Extraction("no paragraphs".to_string()));
        }
        stub.content = Some(content);

        let authors: Vec<String> = story.authors.into_iter().filter_map(|a| a.name).filter(|n| !n.is_empty()).collect();
        if !authors.is_empty() {
            stub.author = Some(authors.join(", "));
        }
        if let Some(taxonomy) = story.taxonomy {
            stub.tags = taxonomy.keywords;
        }
        if let Some(image) = story
            .related_content
            .and_then(|r| r.images.into_iter().find_map(|i| i.url))
        {
            stub.image_url = Some(image);
        }
        Ok(stub)
    }
}
