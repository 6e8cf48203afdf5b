pub mod cli;
pub mod config;
pub mod coordinator;
pub mod logging;
pub mod pipeline;
pub mod scrapers;
pub mod text;

#[cfg(test)]
mod testing;

pub use cli::{build_coordinator, handle_command, ScraperArgs, ScraperCommands};
pub use config::{SourceSettings, SourcesConfig};
pub use coordinator::{RunCoordinator, RunSummary};
pub use pipeline::{PipelineOptions, PipelineRunner, RunReport};
pub use scrapers::{get_adapters, Adapter};

pub mod prelude {
    pub use super::coordinator::{RunCoordinator, RunSummary};
    pub use super::scrapers::{get_adapters, Adapter};
    pub use nw_core::{Error, Result, SourceAdapter};
}
