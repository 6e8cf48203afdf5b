use async_trait::async_trait;
use nw_core::{
    ArticleStub, CanonicalArticle, Cursor, Fetcher, Page, PagingPolicy, RequestProfile, Result, SourceAdapter,
    SourceMetadata, Throttle,
};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::AdapterCore;
use crate::config::SourceSettings;

/// A site publishing numbered RSS files (`…1.xml`, `…2.xml`, …).
pub trait FeedSite: Send + Sync {
    fn base_url(&self) -> &'static str;

    /// URL of the 1-based feed file `index`.
    fn feed_url(&self, index: u32) -> Option<String>;

    fn map_item(&self, item: &FeedItem) -> Option<ArticleStub>;
}

/// The direct children of one `<item>`, keyed by their qualified name.
#[derive(Debug, Clone, Default)]
pub struct FeedItem {
    fields: HashMap<String, Vec<String>>,
    attributes: HashMap<String, HashMap<String, String>>,
}

impl FeedItem {
    /// First non-blank text of `element`.
    pub fn text(&self, element: &str) -> Option<&str> {
        self.texts(element).into_iter().next()
    }

    pub fn texts(&self, element: &str) -> Vec<&str> {
        self.fields
            .get(element)
            .map(|values| values.iter().map(|v| v.trim()).filter(|v| !v.is_empty()).collect())
            .unwrap_or_default()
    }

    pub fn attr(&self, element: &str, attribute: &str) -> Option<&str> {
        self.attributes.get(element)?.get(attribute).map(String::as_str)
    }

    fn record_attributes(&mut self, element: &str, start: &BytesStart<'_>) {
        let entry = self.attributes.entry(element.to_string()).or_default();
        for attr in start.attributes().flatten() {
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            if let Ok(value) = attr.unescape_value() {
                entry.entry(key).or_insert_with(|| value.into_owned());
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct FeedDocument {
    pub items: Vec<FeedItem>,
    /// Set when the XML broke off; `items` holds what came before.
    pub malformed: bool,
}

pub fn parse_feed(xml: &str) -> FeedDocument {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut doc = FeedDocument::default();
    let mut current: Option<FeedItem> = None;
    let mut field: Option<(String, String)> = None;
    // element depth below the open <item>
    let mut depth = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                match current.as_mut() {
                    None if name == "item" => {
                        current = Some(FeedItem::default());
                        depth = 0;
                    }
                    None => {}
                    Some(item) => {
                        depth += 1;
                        if depth == 1 {
                            item.record_attributes(&name, &e);
                            field = Some((name, String::new()));
                        }
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                if let Some(item) = current.as_mut().filter(|_| depth == 0) {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    item.record_attributes(&name, &e);
                }
            }
            Ok(Event::Text(e)) => {
                if let Some((_, buffer)) = field.as_mut() {
                    match e.unescape() {
                        Ok(text) => buffer.push_str(&text),
                        Err(_) => buffer.push_str(&String::from_utf8_lossy(&e)),
                    }
                }
            }
            Ok(Event::CData(e)) => {
                if let Some((_, buffer)) = field.as_mut() {
                    buffer.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(Event::End(_)) if current.is_some() => {
                if depth == 0 {
                    doc.items.extend(current.take());
                } else {
                    depth -= 1;
                    if depth == 0 {
                        if let (Some(item), Some((name, text))) = (current.as_mut(), field.take()) {
                            item.fields.entry(name).or_default().push(text);
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                debug!(position = reader.buffer_position(), error = %e, "Feed XML broke off");
                doc.malformed = true;
                break;
            }
            _ => {}
        }
    }

    if current.is_some() {
        doc.malformed = true;
    }
    doc
}

pub struct FeedAdapter {
    pub(super) core: AdapterCore,
    site: Box<dyn FeedSite>,
}

impl FeedAdapter {
    pub fn new(
        meta: SourceMetadata,
        settings: SourceSettings,
        fetcher: Arc<dyn Fetcher>,
        site: impl FeedSite + 'static,
    ) -> Result<Self> {
        Ok(Self {
            core: AdapterCore::new(meta, settings, fetcher, site.base_url())?,
            site: Box::new(site),
        })
    }
}

#[async_trait]
impl SourceAdapter for FeedAdapter {
    fn metadata(&self) -> &SourceMetadata {
        &self.core.meta
    }

    fn paging(&self) -> PagingPolicy {
        self.core.paging()
    }

    fn initial_cursor(&self) -> Cursor {
        Cursor::FeedIndex(1)
    }

    fn throttle(&self) -> &Throttle {
        &self.core.throttle
    }

    async fn list_page(&self, cursor: &Cursor) -> Result<Page> {
        let index = match cursor {
            Cursor::FeedIndex(index) => *index,
            other => return Ok(Page::last(Vec::new(), *other)),
        };
        let Some(url) = self.site.feed_url(index) else {
            return Ok(Page::last(Vec::new(), *cursor));
        };

        let response = self.core.get(&url, &RequestProfile::feed()).await?;
        let doc = parse_feed(&response.body);
        if doc.malformed {
            warn!(source = self.core.meta.name, %url, items = doc.items.len(), "Feed is malformed");
        }
        let stubs = self
            .core
            .normalize(doc.items.iter().filter_map(|item| self.site.map_item(item)).collect());
        let has_more = !doc.malformed && !stubs.is_empty();
        debug!(source = self.core.meta.name, %url, items = stubs.len(), has_more, "Feed parsed");

        Ok(Page {
            stubs,
            next_cursor: cursor.advance(self.core.paging().page_size),
            has_more,
        })
    }

    async fn fetch_detail(&self, stub: ArticleStub) -> CanonicalArticle {
        self.core.inline(stub)
    }
}
