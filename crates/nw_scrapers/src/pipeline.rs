//! Drives one adapter from its first listing page to completion.
//!
//! ```text
//! Start ──open session──▶ FetchingPage(cursor) ──list_page──▶ ProcessingItem ─┐
//!   │                         ▲        │ transport error                      │
//!   │ store error             │        ▼                                      │
//!   └────────────────────▶  Done ◀── budget spent / has_more == false ◀──────┘
//! ```

use nw_core::{
    ArticleStore, ArticleStub, CanonicalArticle, Cursor, Error, Page, Result, SourceAdapter, StoreSession,
    UpsertOutcome,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use std::vec;

use crate::logging::Logger;
use crate::text;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Store articles whose body could not be extracted (with the sentinel
    /// content). They are counted as failed either way.
    pub persist_failed_extractions: bool,
}

/// Outcome of one adapter run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Qualified adapter name, e.g. `chile/biobio/nacional`.
    pub source: String,
    /// Stubs returned by the listing pages.
    pub observed: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub failed: usize,
    pub pages: u32,
    /// A listing transport failure, or an unavailable store, ended the run early.
    pub aborted: bool,
    pub duration: Duration,
}

impl RunReport {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    /// Items that reached a terminal outcome.
    pub fn processed(&self) -> usize {
        self.inserted + self.duplicates + self.failed
    }
}

enum State {
    Start,
    FetchingPage(Cursor),
    ProcessingItem {
        remaining: vec::IntoIter<ArticleStub>,
        next: Option<Cursor>,
    },
    Done,
}

pub struct PipelineRunner {
    adapter: Arc<dyn SourceAdapter>,
    store: Arc<dyn ArticleStore>,
    options: PipelineOptions,
    logger: Logger,
}

impl PipelineRunner {
    pub fn new(adapter: Arc<dyn SourceAdapter>, store: Arc<dyn ArticleStore>, options: PipelineOptions) -> Self {
        let meta = adapter.metadata();
        let logger = Logger::new()
            .with_prefix(meta.emoji)
            .with_prefix(format!("[{}]", meta.qualified_name()));
        Self {
            adapter,
            store,
            options,
            logger,
        }
    }

    pub async fn run(&self) -> RunReport {
        let started = Instant::now();
        let paging = self.adapter.paging();
        let mut report = RunReport::new(self.adapter.metadata().qualified_name());
        let mut session: Option<Box<dyn StoreSession>> = None;
        let mut state = State::Start;

        loop {
            state = match state {
                State::Start => match self.store.open().await {
                    Ok(opened) => {
                        session = Some(opened);
                        State::FetchingPage(self.adapter.initial_cursor())
                    }
                    Err(e) => {
                        self.logger.error(&format!("Store unavailable: {}", e));
                        report.aborted = true;
                        State::Done
                    }
                },
                State::FetchingPage(_) if report.pages >= paging.max_pages => State::Done,
                State::FetchingPage(cursor) => match self.adapter.list_page(&cursor).await {
                    Ok(Page {
                        stubs,
                        next_cursor,
                        has_more,
                    }) => {
                        report.pages += 1;
                        report.observed += stubs.len();
                        self.logger.debug(&format!("{}: {} items", cursor, stubs.len()));
                        State::ProcessingItem {
                            remaining: stubs.into_iter(),
                            next: has_more.then_some(next_cursor),
                        }
                    }
                    Err(e) => {
                        self.logger.error(&format!("Listing failed at {}: {}", cursor, e));
                        report.aborted = true;
                        State::Done
                    }
                },
                State::ProcessingItem { mut remaining, next } => match (remaining.next(), session.as_deref_mut()) {
                    (Some(stub), Some(session)) => {
                        self.process_item(session, stub, &mut report).await;
                        if remaining.len() > 0 {
                            self.adapter.throttle().pause().await;
                        }
                        State::ProcessingItem { remaining, next }
                    }
                    _ => match next {
                        Some(cursor) if report.pages < paging.max_pages => State::FetchingPage(cursor),
                        _ => State::Done,
                    },
                },
                State::Done => break,
            };
        }

        if let Some(session) = session.take() {
            if let Err(e) = session.close().await {
                self.logger.warn(&format!("Failed to release store session: {}", e));
            }
        }

        report.duration = started.elapsed();
        self.logger.info(&format!(
            "{} observed, {} inserted, {} duplicates, {} failed in {} pages ({:.1}s){}",
            report.observed,
            report.inserted,
            report.duplicates,
            report.failed,
            report.pages,
            report.duration.as_secs_f64(),
            if report.aborted { ", aborted" } else { "" }
        ));
        report
    }

    async fn process_item(&self, session: &mut dyn StoreSession, stub: ArticleStub, report: &mut RunReport) {
        let article = self.adapter.fetch_detail(stub).await;
        if let Err(e) = validate(&article) {
            report.failed += 1;
            self.logger.warn(&format!("Rejected {:?}: {}", article.url, e));
            return;
        }

        let extraction_failed = article.is_extraction_failure();
        if extraction_failed {
            report.failed += 1;
            if !self.options.persist_failed_extractions {
                self.logger.warn(&format!("No content for {}", article.url));
                return;
            }
        }

        match session.upsert(&article).await {
            Ok(_) if extraction_failed => {}
            Ok(UpsertOutcome::Inserted) => {
                report.inserted += 1;
                self.logger.debug(&format!("Stored: {}", article.title));
            }
            Ok(UpsertOutcome::Duplicate) => report.duplicates += 1,
            Err(e) => {
                if !extraction_failed {
                    report.failed += 1;
                }
                self.logger.error(&format!("Failed to store {}: {}", article.url, e));
            }
        }
    }
}

/// Records must have an absolute URL and a title before they are identified.
fn validate(article: &CanonicalArticle) -> Result<()> {
    if !text::is_absolute_http(&article.url) {
        return Err(Error::InvalidUrl(article.url.clone()));
    }
    if article.title.trim().is_empty() {
        return Err(Error::Extraction("empty title".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::chile::latercera;
    use crate::scrapers::json::JsonSite;
    use crate::testing::{unpaced, MockFetcher};
    use async_trait::async_trait;
    use nw_core::{DelayPolicy, PagingPolicy, Region, SourceId, SourceMetadata, Throttle};
    use nw_storage::MemoryStorage;
    use std::collections::HashSet;

    struct ScriptedAdapter {
        meta: SourceMetadata,
        paging: PagingPolicy,
        throttle: Throttle,
        /// Listing URLs of page `n` at index `n - 1`; later pages fail.
        pages: Vec<Vec<&'static str>>,
        endless: bool,
        broken: HashSet<&'static str>,
    }

    impl ScriptedAdapter {
        fn new(pages: Vec<Vec<&'static str>>, max_pages: u32) -> Self {
            Self {
                meta: SourceMetadata {
                    name: "Scripted",
                    emoji: "🧪",
                    region: Region { name: "test" },
                    source_id: SourceId(99),
                    cli_name: "scripted".to_string(),
                },
                paging: PagingPolicy::new(10, max_pages),
                throttle: Throttle::new(DelayPolicy::None),
                pages,
                endless: false,
                broken: HashSet::new(),
            }
        }
    }

    #[async_trait]
    impl SourceAdapter for ScriptedAdapter {
        fn metadata(&self) -> &SourceMetadata {
            &self.meta
        }

        fn paging(&self) -> PagingPolicy {
            self.paging
        }

        fn initial_cursor(&self) -> Cursor {
            Cursor::Page(1)
        }

        fn throttle(&self) -> &Throttle {
            &self.throttle
        }

        async fn list_page(&self, cursor: &Cursor) -> Result<Page> {
            let Cursor::Page(n) = *cursor else { unreachable!() };
            match self.pages.get(n as usize - 1) {
                Some(urls) => Ok(Page {
                    stubs: urls.iter().map(|url| ArticleStub::new(*url, "Título")).collect(),
                    next_cursor: cursor.advance(self.paging.page_size),
                    has_more: self.endless || (n as usize) < self.pages.len(),
                }),
                None => Err(Error::Status {
                    status: 503,
                    url: format!("https://scripted.test/page/{}", n),
                }),
            }
        }

        async fn fetch_detail(&self, mut stub: ArticleStub) -> CanonicalArticle {
            if self.broken.contains(stub.url.as_str()) {
                return CanonicalArticle::extraction_failed(self.meta.source_id, stub);
            }
            stub.content = Some("Cuerpo.".to_string());
            CanonicalArticle::from_stub(self.meta.source_id, stub)
        }
    }

    struct BrokenStore;

    struct BrokenSession;

    #[async_trait]
    impl ArticleStore for BrokenStore {
        async fn open(&self) -> Result<Box<dyn StoreSession>> {
            Ok(Box::new(BrokenSession))
        }

        async fn count(&self) -> Result<u64> {
            Ok(0)
        }

        async fn get_by_source(&self, _source_id: SourceId) -> Result<Vec<CanonicalArticle>> {
            Ok(Vec::new())
        }
    }

    #[async_trait]
    impl StoreSession for BrokenSession {
        async fn upsert(&mut self, article: &CanonicalArticle) -> Result<UpsertOutcome> {
            if article.url.contains("locked") {
                Err(Error::Storage("database is locked".to_string()))
            } else {
                Ok(UpsertOutcome::Inserted)
            }
        }

        async fn close(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    struct ClosedStore;

    #[async_trait]
    impl ArticleStore for ClosedStore {
        async fn open(&self) -> Result<Box<dyn StoreSession>> {
            Err(Error::Database("pool closed".to_string()))
        }

        async fn count(&self) -> Result<u64> {
            Ok(0)
        }

        async fn get_by_source(&self, _source_id: SourceId) -> Result<Vec<CanonicalArticle>> {
            Ok(Vec::new())
        }
    }

    const FEED: &str = r#"{"content_elements": [
        {"canonical_url": "/nacional/noticia/uno/A1/", "headlines": {"basic": "Uno"}},
        {"canonical_url": "/nacional/noticia/dos/B2/", "headlines": {"basic": "Dos"}},
        {"canonical_url": "/nacional/noticia/tres/C3/", "headlines": {"basic": "Tres"}}
    ]}"#;

    fn detail(body: &str) -> String {
        format!(r#"<html><body><p class="article-body__paragraph">{}</p></body></html>"#, body)
    }

    #[tokio::test]
    async fn test_detail_failure_is_isolated_and_rerun_is_idempotent() {
        let listing = latercera::LaTercera.listing_url(&Cursor::Offset(0), 3).unwrap();
        let fetcher = Arc::new(
            MockFetcher::new()
                .with(listing, FEED)
                .with("https://www.latercera.com/nacional/noticia/uno/A1/", detail("Uno."))
                .with_status("https://www.latercera.com/nacional/noticia/dos/B2/", 500, "error")
                .with("https://www.latercera.com/nacional/noticia/tres/C3/", detail("Tres.")),
        );
        let adapter: Arc<dyn SourceAdapter> = Arc::new(latercera::adapter(fetcher, unpaced(3, 1)).unwrap());
        let storage = MemoryStorage::new();
        let store: Arc<dyn ArticleStore> = Arc::new(storage.clone());

        let runner = PipelineRunner::new(adapter, store, PipelineOptions::default());
        let first = runner.run().await;
        assert_eq!(first.source, "chile/latercera");
        assert_eq!(first.observed, 3);
        assert_eq!(first.processed(), 3);
        assert_eq!(first.inserted, 2);
        assert_eq!(first.failed, 1);
        assert_eq!(first.duplicates, 0);
        assert_eq!(first.pages, 1);
        assert!(!first.aborted);

        let stored = storage.snapshot().await;
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|a| !a.is_extraction_failure()));

        let second = runner.run().await;
        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, first.inserted);
        assert_eq!(second.failed, 1);
        assert_eq!(storage.snapshot().await.len(), 2);
    }

    #[tokio::test]
    async fn test_rerun_against_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let storage = nw_storage::SQLiteStorage::new_with_path(&dir.path().join("articles.db"))
            .await
            .unwrap();
        let store: Arc<dyn ArticleStore> = Arc::new(storage);
        let scripted = Arc::new(ScriptedAdapter::new(
            vec![vec!["https://s.test/a", "https://s.test/b"], vec!["https://s.test/c"]],
            5,
        ));

        let first = PipelineRunner::new(scripted.clone(), store.clone(), PipelineOptions::default())
            .run()
            .await;
        assert_eq!(first.pages, 2);
        assert_eq!(first.inserted, 3);

        let second = PipelineRunner::new(scripted, store.clone(), PipelineOptions::default())
            .run()
            .await;
        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 3);
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_persist_failed_extractions() {
        let mut scripted = ScriptedAdapter::new(vec![vec!["https://s.test/a", "https://s.test/b"]], 5);
        scripted.broken.insert("https://s.test/a");
        let storage = MemoryStorage::new();

        let options = PipelineOptions {
            persist_failed_extractions: true,
        };
        let report = PipelineRunner::new(Arc::new(scripted), Arc::new(storage.clone()), options).run().await;
        assert_eq!(report.inserted, 1);
        assert_eq!(report.failed, 1);

        let stored = storage.snapshot().await;
        assert_eq!(stored.len(), 2);
        assert!(stored[0].is_extraction_failure());
    }

    #[tokio::test]
    async fn test_listing_failure_aborts_after_processed_pages() {
        let mut scripted = ScriptedAdapter::new(vec![vec!["https://s.test/1", "https://s.test/2"]], 5);
        scripted.endless = true;

        let report = PipelineRunner::new(Arc::new(scripted), Arc::new(MemoryStorage::new()), PipelineOptions::default())
            .run()
            .await;
        assert!(report.aborted);
        assert_eq!(report.pages, 1);
        assert_eq!(report.inserted, 2);
    }

    #[tokio::test]
    async fn test_page_budget_is_honoured() {
        let mut scripted = ScriptedAdapter::new(vec![vec!["https://s.test/same"]; 6], 3);
        scripted.endless = true;

        let report = PipelineRunner::new(Arc::new(scripted), Arc::new(MemoryStorage::new()), PipelineOptions::default())
            .run()
            .await;
        assert_eq!(report.pages, 3);
        assert_eq!(report.inserted, 1);
        assert_eq!(report.duplicates, 2);
        assert!(!report.aborted);
    }

    #[tokio::test]
    async fn test_empty_first_page_ends_run() {
        let scripted = ScriptedAdapter::new(vec![vec![]], 5);
        let report = PipelineRunner::new(Arc::new(scripted), Arc::new(MemoryStorage::new()), PipelineOptions::default())
            .run()
            .await;
        assert_eq!(report.pages, 1);
        assert_eq!(report.processed(), 0);
        assert!(!report.aborted);
    }

    #[tokio::test]
    async fn test_invalid_records_and_store_errors_are_failures() {
        let scripted = ScriptedAdapter::new(
            vec![vec!["relative/path", "https://s.test/locked", "https://s.test/ok"]],
            5,
        );
        let report = PipelineRunner::new(Arc::new(scripted), Arc::new(BrokenStore), PipelineOptions::default())
            .run()
            .await;
        assert_eq!(report.failed, 2);
        assert_eq!(report.inserted, 1);
        assert_eq!(report.processed(), 3);
    }

    #[tokio::test]
    async fn test_unavailable_store_aborts() {
        let scripted = ScriptedAdapter::new(vec![vec!["https://s.test/a"]], 5);
        let report = PipelineRunner::new(Arc::new(scripted), Arc::new(ClosedStore), PipelineOptions::default())
            .run()
            .await;
        assert!(report.aborted);
        assert_eq!(report.pages, 0);
    }
}
