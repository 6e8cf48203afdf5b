use clap::{Args, Subcommand};
use nw_core::{ArticleStore, Error, Result, SourceAdapter};
use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::Arc;
use tracing::info;

use crate::coordinator::{RunCoordinator, RunSummary};
use crate::pipeline::PipelineOptions;
use crate::scrapers::Adapter;

#[derive(Args, Debug, Clone)]
pub struct ScraperArgs {
    #[command(subcommand)]
    pub command: ScraperCommands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ScraperCommands {
    /// Ingest once from every source, or only those matching SOURCE
    Run {
        /// Region, site or lane, e.g. `chile`, `chile/biobio`, `biobio/nacional`
        source: Option<String>,
        /// How many sources may be ingested at the same time
        #[arg(long, default_value_t = 1)]
        concurrency: usize,
        /// Also store articles whose body could not be extracted
        #[arg(long)]
        persist_failed: bool,
    },
    /// List available sources
    List,
}

/// A coordinator over `adapters`, configured from the `run` flags.
pub fn build_coordinator(
    adapters: Vec<Adapter>,
    store: Arc<dyn ArticleStore>,
    concurrency: usize,
    persist_failed: bool,
) -> RunCoordinator {
    let mut coordinator = RunCoordinator::new(store)
        .with_concurrency(concurrency)
        .with_options(PipelineOptions {
            persist_failed_extractions: persist_failed,
        });
    for adapter in adapters {
        coordinator.add_adapter(Arc::new(adapter));
    }
    coordinator
}

pub async fn handle_command(args: ScraperArgs, adapters: Vec<Adapter>, store: Arc<dyn ArticleStore>) -> Result<()> {
    match args.command {
        ScraperCommands::Run {
            source,
            concurrency,
            persist_failed,
        } => {
            if let Some(filter) = source.as_deref() {
                if !adapters.iter().any(|a| a.metadata().matches(filter)) {
                    return Err(Error::Config(format!("No source matches '{}'", filter)));
                }
            }
            info!(
                "🦗 Ingesting from {}",
                source.as_deref().unwrap_or("all sources")
            );
            let coordinator = build_coordinator(adapters, store.clone(), concurrency, persist_failed);
            let summary = coordinator.run_matching(source.as_deref()).await;
            print!("{}", format_summary(&summary));
            info!("💾 {} articles in store", store.count().await?);
        }
        ScraperCommands::List => print!("{}", format_sources(&adapters)),
    }
    Ok(())
}

/// Sources grouped by region, one line per adapter.
pub fn format_sources(adapters: &[Adapter]) -> String {
    let mut regions: BTreeMap<&str, Vec<&Adapter>> = BTreeMap::new();
    for adapter in adapters {
        regions.entry(adapter.metadata().region.name).or_default().push(adapter);
    }

    let mut out = String::new();
    for (region, adapters) in regions {
        let _ = writeln!(out, "{}:", region);
        for adapter in adapters {
            let meta = adapter.metadata();
            let _ = writeln!(
                out,
                "  {} {:<28} {} ({}, source {})",
                meta.emoji,
                meta.qualified_name(),
                meta.name,
                adapter.transport(),
                meta.source_id
            );
        }
    }
    out
}

pub fn format_summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    for report in &summary.reports {
        let _ = writeln!(
            out,
            "{:<30} {:>4} seen {:>4} new {:>4} dup {:>4} failed{}",
            report.source,
            report.observed,
            report.inserted,
            report.duplicates,
            report.failed,
            if report.aborted { "  (aborted)" } else { "" }
        );
    }
    for name in &summary.crashed {
        let _ = writeln!(out, "{:<30} crashed", name);
    }
    let _ = writeln!(
        out,
        "Total: {} new, {} duplicates, {} failed in {:.1}s",
        summary.inserted(),
        summary.duplicates(),
        summary.failed(),
        summary.duration.as_secs_f64()
    );
    out
}
