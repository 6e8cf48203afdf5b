use nw_core::{ArticleStub, Cursor, DelayPolicy, Error, Fetcher, RequestProfile, Result};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::metadata;
use crate::config::SourceSettings;
use crate::scrapers::json::{items, JsonAdapter, JsonSite};
use crate::scrapers::Adapter;
use crate::text;

pub const DEFAULTS: SourceSettings = SourceSettings::new(10, 5, DelayPolicy::Fixed(Duration::from_millis(800)));

const BASE_URL: &str = "https://www.biobiochile.cl";
const API_URL: &str = "https://www.biobiochile.cl/lista/api/get-todo-sin-robin";
const IMAGE_PREFIX: &str = "https://media.biobiochile.cl/wp-content/uploads/";
const REMOVE: &[&str] = &[".lee-tambien-bbcl", "blockquote.instagram-media", "script"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lane {
    pub name: &'static str,
    pub category: &'static str,
}

impl Lane {
    pub fn cli_name(&self) -> String {
        format!("biobio/{}", self.name)
    }
}

pub const LANES: &[Lane] = &[
    Lane { name: "internacional", category: "group-internacional" },
    Lane { name: "nacional", category: "group-nacional" },
    Lane { name: "economia", category: "group-economia" },
];

pub fn adapter(fetcher: Arc<dyn Fetcher>, lane: &Lane, settings: SourceSettings) -> Result<Adapter> {
    let meta = metadata("Biobio", "📻", 7, lane.cli_name());
    Ok(JsonAdapter::new(meta, settings, fetcher, Biobio { lane: *lane })?.into())
}

#[derive(Debug, Deserialize)]
struct Post {
    post_title: String,
    #[serde(rename = "post_URL_https")]
    url: String,
    post_excerpt: Option<String>,
    author: Option<Author>,
    primary: Option<Value>,
    post_tags: Option<Vec<Tag>>,
    post_content: Option<String>,
    post_image: Option<Value>,
    raw_post_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Author {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Tag {
    name: Option<String>,
}

impl Post {
    fn into_stub(self) -> ArticleStub {
        let image_url = self
            .post_image
            .as_ref()
            .and_then(|image| image.pointer("/thumbnails/large/URL"))
            .and_then(Value::as_str)
            .filter(|path| !path.is_empty())
            .map(|path| format!("{}{}", IMAGE_PREFIX, path.trim_start_matches('/')));

        ArticleStub {
            url: self.url,
            title: self.post_title,
            description: self.post_excerpt,
            author: self.author.and_then(|a| a.display_name),
            section: self.primary.as_ref().and_then(Value::as_str).map(str::to_string),
            tags: self
                .post_tags
                .unwrap_or_default()
                .into_iter()
                .filter_map(|t| t.name)
                .collect(),
            content: self.post_content.map(|html| text::html_to_paragraphs(&html, REMOVE)),
            image_url,
            published_at: self.raw_post_date.as_deref().and_then(text::parse_datetime),
        }
    }
}

/// One Biobio category, listed newest first by offset.
pub struct Biobio {
    lane: Lane,
}

impl JsonSite for Biobio {
    fn base_url(&self) -> &'static str {
        BASE_URL
    }

    fn listing_url(&self, cursor: &Cursor, page_size: u32) -> Option<String> {
        match cursor {
            Cursor::Offset(offset) => Some(format!(
                "{}?limit={}&offset={}&categorias={}",
                API_URL, page_size, offset, self.lane.category
            )),
            _ => None,
        }
    }

    fn listing_profile(&self) -> RequestProfile {
        RequestProfile::json()
            .with_referer(format!("{}/lista/categorias/{}", BASE_URL, self.lane.name))
            .with_header("pragma", "no-cache")
            .with_header("sec-fetch-dest", "empty")
            .with_header("sec-fetch-mode", "cors")
            .with_header("sec-fetch-site", "same-origin")
    }

    fn parse_listing(&self, payload: Value) -> Result<Vec<ArticleStub>> {
        let Value::Array(posts) = payload else {
            return Err(Error::Extraction("expected an array of posts".to_string()));
        };
        Ok(items::<Post>(posts).into_iter().map(Post::into_stub).collect())
    }
}
