use nw_core::{ArticleStub, Cursor, DelayPolicy, Error, Fetcher, Result};
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

const BASE_URL: &str = "https://www.elciudadano.com";
const POSTS_URL: &str = "https://www.elciudadano.com/wp-json/wp/v2/posts";
const REMOVE: &[&str] = &[
    "script",
    "style",
    "figure.wp-block-embed",
    ".wp-block-separator",
    "pre.wp-block-preformatted",
];
const DEFAULT_SECTION: &str = "General";

/// A WordPress category scraped as its own lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lane {
    pub name: &'static str,
    pub category_id: u32,
}

impl Lane {
    pub fn cli_name(&self) -> String {
        format!("elciudadano/{}", self.name)
    }
}

pub const LANES: &[Lane] = &[
    Lane { name: "actualidad", category_id: 9 },
    Lane { name: "politica", category_id: 8 },
    Lane { name: "chile", category_id: 42 },
    Lane { name: "mundo", category_id: 743 },
    Lane { name: "economia", category_id: 7 },
];

pub fn adapter(fetcher: Arc<dyn Fetcher>, lane: &Lane, settings: SourceSettings) -> Result<Adapter> {
    let meta = metadata("El Ciudadano", "✊", 9, lane.cli_name());
    Ok(JsonAdapter::new(meta, settings, fetcher, ElCiudadano { lane: *lane })?.into())
}

#[derive(Debug, Deserialize)]
struct Rendered {
    rendered: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Post {
    link: String,
    title: Rendered,
    content: Option<Rendered>,
    /// An object when filled in, `[]` or `false` when not.
    acf: Option<Value>,
    jetpack_featured_media_url: Option<String>,
    date_gmt: Option<String>,
    #[serde(rename = "_embedded")]
    embedded: Option<Value>,
}

impl Post {
    fn term_names(&self, taxonomy: usize) -> Vec<String> {
        self.embedded
            .as_ref()
            .and_then(|e| e.get("wp:term"))
            .and_then(|terms| terms.get(taxonomy))
            .and_then(Value::as_array)
            .map(|terms| {
                terms
                    .iter()
                    .filter_map(|t| t.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn acf_text(&self, key: &str) -> Option<String> {
        self.acf
            .as_ref()
            .and_then(|acf| acf.get(key))
            .and_then(Value::as_str)
            .and_then(text::non_empty)
    }

    fn into_stub(self) -> ArticleStub {
        let section = self
            .term_names(0)
            .into_iter()
            .next()
            .unwrap_or_else(|| DEFAULT_SECTION.to_string());
        let tags = self.term_names(1);
        let description = self.acf_text("resume").or_else(|| self.acf_text("bajada_titulo"));
        let author = self
            .embedded
            .as_ref()
            .and_then(|e| e.pointer("/author/0/name"))
            .and_then(Value::as_str)
            .map(str::to_string);

        ArticleStub {
            url: self.link,
            title: self.title.rendered.unwrap_or_default(),
            description,
            author,
            section: Some(section),
            tags,
            content: self
                .content
                .and_then(|c| c.rendered)
                .map(|html| text::html_to_paragraphs(&html, REMOVE)),
            image_url: self.jetpack_featured_media_url,
            published_at: self.date_gmt.as_deref().and_then(text::parse_datetime),
        }
    }
}

/// WordPress REST listing of one category, `_embed`ded so terms and
/// authors come along.
pub struct ElCiudadano {
    lane: Lane,
}

impl JsonSite for ElCiudadano {
    fn base_url(&self) -> &'static str {
        BASE_URL
    }

    fn initial_cursor(&self) -> Cursor {
        Cursor::Page(1)
    }

    fn listing_url(&self, cursor: &Cursor, page_size: u32) -> Option<String> {
        match cursor {
            Cursor::Page(page) => Some(format!(
                "{}?page={}&per_page={}&categories={}&_embed=true",
                POSTS_URL, page, page_size, self.lane.category_id
            )),
            _ => None,
        }
    }

    fn parse_listing(&self, payload: Value) -> Result<Vec<ArticleStub>> {
        let Value::Array(posts) = payload else {
            return Err(Error::Extraction("expected an array of posts".to_string()));
        };
        Ok(items::<Post>(posts).into_iter().map(Post::into_stub).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use crate::testing::{unpaced, MockFetcher};
    use nw_core::SourceAdapter;

    const POSTS: &str = r#"[
        {
            "id": 1,
            "link": "https://www.elciudadano.com/politica/reforma/06/01/",
            "date_gmt": "2025-06-01T15:00:00",
            "title": {"rendered": "Reforma &#8220;clave&#8221;"},
            "content": {"rendered": "<p>Uno.</p><figure class=\"wp-block-embed\"><p>tweet</p></figure><hr class=\"wp-block-separator\"/><p>Dos.</p>"},
            "acf": {"resume": "", "bajada_titulo": "Bajada del título"},
            "jetpack_featured_media_url": "https://www.elciudadano.com/wp-content/uploads/a.jpg",
            "_embedded": {
                "author": [{"name": "Redacción"}],
                "wp:term": [[{"name": "Política"}, {"name": "Chile"}], [{"name": "Congreso"}]]
            }
        },
        {
            "id": 2,
            "link": "https://www.elciudadano.com/mundo/otra/06/01/",
            "title": {"rendered": "Otra"},
            "content": {"rendered": "<p>Texto.</p>"},
            "acf": []
        }
    ]"#;

    #[tokio::test]
    async fn test_list_page_maps_posts() {
        let lane = LANES[1];
        let site = ElCiudadano { lane };
        assert_eq!(site.initial_cursor(), Cursor::Page(1));
        let url = site.listing_url(&Cursor::Page(1), 10).unwrap();
        assert_eq!(
            url,
            "https://www.elciudadano.com/wp-json/wp/v2/posts?page=1&per_page=10&categories=8&_embed=true"
        );

        let fetcher = Arc::new(MockFetcher::new().with(url, POSTS));
        let adapter = adapter(fetcher, &lane, unpaced(10, 5)).unwrap();
        assert_eq!(adapter.metadata().cli_name, "elciudadano/politica");

        let page = adapter.list_page(&adapter.initial_cursor()).await.unwrap();
        assert!(!page.has_more);
        assert_eq!(page.next_cursor, Cursor::Page(2));
        assert_eq!(page.stubs.len(), 2);

        let first = &page.stubs[0];
        assert_eq!(first.title, "Reforma \u{201c}clave\u{201d}");
        assert_eq!(first.description.as_deref(), Some("Bajada del título"));
        assert_eq!(first.author.as_deref(), Some("Redacción"));
        assert_eq!(first.section.as_deref(), Some("Política"));
        assert_eq!(first.tags, vec!["Congreso"]);
        assert_eq!(first.content.as_deref(), Some("Uno.\n\nDos."));
        assert_eq!(first.published_at, Some(Utc.with_ymd_and_hms(2025, 6, 1, 15, 0, 0).unwrap()));

        let second = &page.stubs[1];
        assert_eq!(second.section.as_deref(), Some("General"));
        assert_eq!(second.description, None);
        assert_eq!(second.published_at, None);
    }
}
