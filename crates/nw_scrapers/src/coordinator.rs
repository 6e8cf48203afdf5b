use futures::stream::{self, StreamExt};
use nw_core::{ArticleStore, SourceAdapter};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

use crate::pipeline::{PipelineOptions, PipelineRunner, RunReport};

/// Totals over one coordinator run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// One report per adapter that finished, in registration order.
    pub reports: Vec<RunReport>,
    /// Adapters whose task panicked.
    pub crashed: Vec<String>,
    pub duration: Duration,
}

impl RunSummary {
    pub fn observed(&self) -> usize {
        self.reports.iter().map(|r| r.observed).sum()
    }

    pub fn inserted(&self) -> usize {
        self.reports.iter().map(|r| r.inserted).sum()
    }

    pub fn duplicates(&self) -> usize {
        self.reports.iter().map(|r| r.duplicates).sum()
    }

    pub fn failed(&self) -> usize {
        self.reports.iter().map(|r| r.failed).sum()
    }

    pub fn aborted(&self) -> usize {
        self.reports.iter().filter(|r| r.aborted).count()
    }
}

/// Runs every registered adapter to completion against one store.
pub struct RunCoordinator {
    store: Arc<dyn ArticleStore>,
    adapters: Vec<Arc<dyn SourceAdapter>>,
    concurrency: usize,
    options: PipelineOptions,
}

impl RunCoordinator {
    pub fn new(store: Arc<dyn ArticleStore>) -> Self {
        Self {
            store,
            adapters: Vec::new(),
            concurrency: 1,
            options: PipelineOptions::default(),
        }
    }

    pub fn add_adapter(&mut self, adapter: Arc<dyn SourceAdapter>) {
        self.adapters.push(adapter);
    }

    /// Number of adapters allowed to run at once. `0` is treated as `1`.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn adapters(&self) -> &[Arc<dyn SourceAdapter>] {
        &self.adapters
    }

    pub async fn run_all(&self) -> RunSummary {
        self.run_matching(None).await
    }

    /// Runs the adapters whose region or CLI name matches `filter`.
    pub async fn run_matching(&self, filter: Option<&str>) -> RunSummary {
        let started = Instant::now();
        let selected: Vec<Arc<dyn SourceAdapter>> = self
            .adapters
            .iter()
            .filter(|adapter| filter.map_or(true, |f| adapter.metadata().matches(f)))
            .cloned()
            .collect();

        info!(adapters = selected.len(), concurrency = self.concurrency, "Starting run");

        let mut outcomes: Vec<(usize, String, Option<RunReport>)> = stream::iter(selected.into_iter().enumerate())
            .map(|(index, adapter)| {
                let name = adapter.metadata().qualified_name();
                let runner = PipelineRunner::new(adapter, self.store.clone(), self.options);
                let handle = tokio::spawn(async move { runner.run().await });
                async move {
                    match handle.await {
                        Ok(report) => (index, name, Some(report)),
                        Err(e) => {
                            error!(source = %name, "Adapter crashed: {}", e);
                            (index, name, None)
                        }
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        outcomes.sort_by_key(|(index, _, _)| *index);

        let mut summary = RunSummary::default();
        for (_, name, report) in outcomes {
            match report {
                Some(report) => summary.reports.push(report),
                None => summary.crashed.push(name),
            }
        }
        summary.duration = started.elapsed();

        info!(
            observed = summary.observed(),
            inserted = summary.inserted(),
            duplicates = summary.duplicates(),
            failed = summary.failed(),
            aborted = summary.aborted(),
            crashed = summary.crashed.len(),
            "Run finished in {:.1}s",
            summary.duration.as_secs_f64()
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nw_core::{
        ArticleStub, CanonicalArticle, Cursor, DelayPolicy, Page, PagingPolicy, Region, Result, SourceId,
        SourceMetadata, Throttle,
    };
    use nw_storage::MemoryStorage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Barrier;

    struct StaticAdapter {
        meta: SourceMetadata,
        throttle: Throttle,
        urls: Vec<String>,
        panics: bool,
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        barrier: Option<Arc<Barrier>>,
    }

    impl StaticAdapter {
        fn new(region: &'static str, cli_name: &str, urls: usize) -> Self {
            Self {
                meta: SourceMetadata {
                    name: "Static",
                    emoji: "🧪",
                    region: Region { name: region },
                    source_id: SourceId(1),
                    cli_name: cli_name.to_string(),
                },
                throttle: Throttle::new(DelayPolicy::None),
                urls: (0..urls).map(|i| format!("https://{}.test/{}", cli_name, i)).collect(),
                panics: false,
                running: Arc::new(AtomicUsize::new(0)),
                peak: Arc::new(AtomicUsize::new(0)),
                barrier: None,
            }
        }

        fn gauge(mut self, running: &Arc<AtomicUsize>, peak: &Arc<AtomicUsize>) -> Self {
            self.running = running.clone();
            self.peak = peak.clone();
            self
        }
    }

    #[async_trait]
    impl SourceAdapter for StaticAdapter {
        fn metadata(&self) -> &SourceMetadata {
            &self.meta
        }

        fn paging(&self) -> PagingPolicy {
            PagingPolicy::new(10, 1)
        }

        fn initial_cursor(&self) -> Cursor {
            Cursor::Page(1)
        }

        fn throttle(&self) -> &Throttle {
            &self.throttle
        }

        async fn list_page(&self, cursor: &Cursor) -> Result<Page> {
            if self.panics {
                panic!("selector exploded");
            }
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            if let Some(barrier) = &self.barrier {
                barrier.wait().await;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);

            let stubs = self.urls.iter().map(|url| ArticleStub::new(url.clone(), "Title")).collect();
            Ok(Page::last(stubs, *cursor))
        }

        async fn fetch_detail(&self, mut stub: ArticleStub) -> CanonicalArticle {
            stub.content = Some("Body.".to_string());
            CanonicalArticle::from_stub(self.meta.source_id, stub)
        }
    }

    fn coordinator(storage: &MemoryStorage, adapters: Vec<StaticAdapter>) -> RunCoordinator {
        let mut coordinator = RunCoordinator::new(Arc::new(storage.clone()));
        for adapter in adapters {
            coordinator.add_adapter(Arc::new(adapter));
        }
        coordinator
    }

    #[tokio::test]
    async fn test_panicking_adapter_is_isolated() {
        let storage = MemoryStorage::new();
        let mut broken = StaticAdapter::new("chile", "broken", 1);
        broken.panics = true;
        let coordinator = coordinator(
            &storage,
            vec![StaticAdapter::new("chile", "first", 2), broken, StaticAdapter::new("chile", "last", 3)],
        );

        let summary = coordinator.run_all().await;
        assert_eq!(summary.crashed, vec!["chile/broken".to_string()]);
        assert_eq!(summary.reports.len(), 2);
        assert_eq!(summary.reports[0].source, "chile/first");
        assert_eq!(summary.reports[1].source, "chile/last");
        assert_eq!(summary.inserted(), 5);
        assert_eq!(storage.snapshot().await.len(), 5);
    }

    #[tokio::test]
    async fn test_run_matching_filters_by_region_and_name() {
        let storage = MemoryStorage::new();
        let coordinator = coordinator(
            &storage,
            vec![
                StaticAdapter::new("chile", "biobio/nacional", 1),
                StaticAdapter::new("chile", "biobio/economia", 1),
                StaticAdapter::new("chile", "emol", 1),
                StaticAdapter::new("international", "efe", 1),
            ],
        );

        let summary = coordinator.run_matching(Some("chile/biobio")).await;
        let sources: Vec<_> = summary.reports.iter().map(|r| r.source.as_str()).collect();
        assert_eq!(sources, vec!["chile/biobio/nacional", "chile/biobio/economia"]);

        let summary = coordinator.run_matching(Some("international")).await;
        assert_eq!(summary.reports.len(), 1);

        let summary = coordinator.run_matching(Some("argentina")).await;
        assert!(summary.reports.is_empty());
        assert!(summary.crashed.is_empty());

        // everything already stored by the runs above, except emol
        let summary = coordinator.run_all().await;
        assert_eq!(summary.inserted(), 1);
        assert_eq!(summary.duplicates(), 3);
    }

    #[tokio::test]
    async fn test_sequential_by_default() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let adapters = (0..4)
            .map(|i| StaticAdapter::new("chile", &format!("s{}", i), 1).gauge(&running, &peak))
            .collect();

        let summary = coordinator(&MemoryStorage::new(), adapters).run_all().await;
        assert_eq!(summary.reports.len(), 4);
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let adapters = (0..6)
            .map(|i| StaticAdapter::new("chile", &format!("s{}", i), 1).gauge(&running, &peak))
            .collect();

        let summary = coordinator(&MemoryStorage::new(), adapters)
            .with_concurrency(2)
            .run_all()
            .await;
        let sources: Vec<_> = summary.reports.iter().map(|r| r.source.clone()).collect();
        assert_eq!(sources, (0..6).map(|i| format!("chile/s{}", i)).collect::<Vec<_>>());
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(summary.inserted(), 6);
    }

    #[tokio::test]
    async fn test_sqlite_store_serves_every_concurrent_adapter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("articles.db");
        let storage = nw_storage::create_storage(nw_storage::StorageKind::SQLite, path.to_str(), 6)
            .await
            .unwrap();

        // all six runs hold their session at the same time
        let barrier = Arc::new(Barrier::new(6));
        let mut coordinator = RunCoordinator::new(storage.clone()).with_concurrency(6);
        for i in 0..6 {
            let mut adapter = StaticAdapter::new("chile", &format!("s{}", i), 2);
            adapter.barrier = Some(barrier.clone());
            coordinator.add_adapter(Arc::new(adapter));
        }

        let summary = tokio::time::timeout(Duration::from_secs(10), coordinator.run_all())
            .await
            .unwrap();
        assert_eq!(summary.aborted(), 0);
        assert_eq!(summary.inserted(), 12);
        assert_eq!(storage.count().await.unwrap(), 12);
    }
}
