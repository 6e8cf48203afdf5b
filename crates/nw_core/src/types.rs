use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::identity::{self, Fingerprint};

/// Stored in `content` when the article body could not be retrieved.
pub const EXTRACTION_FAILURE: &str = "[ERROR AL CARGAR CONTENIDO]";

/// Identifier of the origin backend, assigned by adapter configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(pub u32);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A listing item. Only `url` and `title` are guaranteed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleStub {
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub author: Option<String>,
    pub section: Option<String>,
    pub tags: Vec<String>,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

impl ArticleStub {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            ..Default::default()
        }
    }
}

/// The normalized record every adapter produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalArticle {
    pub source_id: SourceId,
    pub title: String,
    pub description: Option<String>,
    pub author: Option<String>,
    pub section: Option<String>,
    pub tags: Vec<String>,
    pub content: String,
    pub image_url: Option<String>,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
}

impl CanonicalArticle {
    /// Builds a record from a stub whose listing payload already carries the body.
    pub fn from_stub(source_id: SourceId, stub: ArticleStub) -> Self {
        Self {
            source_id,
            title: stub.title,
            description: stub.description,
            author: stub.author,
            section: stub.section,
            tags: stub.tags,
            content: stub.content.unwrap_or_default(),
            image_url: stub.image_url,
            url: stub.url,
            published_at: stub.published_at,
        }
    }

    /// Builds a record whose body could not be extracted.
    pub fn extraction_failed(source_id: SourceId, stub: ArticleStub) -> Self {
        let mut article = Self::from_stub(source_id, stub);
        article.content = EXTRACTION_FAILURE.to_string();
        article
    }

    pub fn is_extraction_failure(&self) -> bool {
        self.content == EXTRACTION_FAILURE
    }

    /// SHA-256 of `url`; see [`identity::fingerprint`].
    pub fn content_hash(&self) -> Fingerprint {
        identity::fingerprint(&self.url)
    }
}

/// Opaque pagination position. Only the adapter that produced it interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cursor {
    /// Item offset for offset-paginated endpoints.
    Offset(u32),
    /// 1-based page number.
    Page(u32),
    /// 1-based index of a paginated feed file.
    FeedIndex(u32),
}

impl Cursor {
    /// The position one page further along.
    pub fn advance(self, page_size: u32) -> Self {
        match self {
            Cursor::Offset(offset) => Cursor::Offset(offset.saturating_add(page_size)),
            Cursor::Page(page) => Cursor::Page(page.saturating_add(1)),
            Cursor::FeedIndex(index) => Cursor::FeedIndex(index.saturating_add(1)),
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cursor::Offset(offset) => write!(f, "offset {}", offset),
            Cursor::Page(page) => write!(f, "page {}", page),
            Cursor::FeedIndex(index) => write!(f, "feed file {}", index),
        }
    }
}

/// One page of listing results.
#[derive(Debug, Clone)]
pub struct Page {
    pub stubs: Vec<ArticleStub>,
    pub next_cursor: Cursor,
    pub has_more: bool,
}

impl Page {
    /// A terminal page: whatever was extracted, nothing after it.
    pub fn last(stubs: Vec<ArticleStub>, cursor: Cursor) -> Self {
        Self {
            stubs,
            next_cursor: cursor,
            has_more: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingPolicy {
    pub page_size: u32,
    pub max_pages: u32,
}

impl PagingPolicy {
    pub const fn new(page_size: u32, max_pages: u32) -> Self {
        Self { page_size, max_pages }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Duplicate,
}
