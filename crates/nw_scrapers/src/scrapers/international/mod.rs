use nw_core::{Fetcher, Region, Result, SourceId, SourceMetadata};
use std::sync::Arc;

use crate::config::SourcesConfig;
use crate::scrapers::Adapter;

pub mod apnews;
pub mod efe;
pub mod reuters;

pub const REGION: Region = Region { name: "international" };

pub(crate) fn metadata(name: &'static str, emoji: &'static str, source_id: u32, cli_name: impl Into<String>) -> SourceMetadata {
    SourceMetadata {
        name,
        emoji,
        region: REGION,
        source_id: SourceId(source_id),
        cli_name: cli_name.into(),
    }
}

/// Returns the wire-agency adapters
pub fn get_adapters(fetcher: &Arc<dyn Fetcher>, config: &SourcesConfig) -> Result<Vec<Adapter>> {
    let mut adapters = Vec::new();
    for lane in apnews::LANES {
        let settings = config.settings_for(&lane.cli_name(), apnews::DEFAULTS);
        adapters.push(apnews::adapter(fetcher.clone(), lane, settings)?);
    }
    adapters.push(efe::adapter(fetcher.clone(), config.settings_for(efe::CLI_NAME, efe::DEFAULTS))?);
    adapters.push(reuters::adapter(fetcher.clone(), config.settings_for(reuters::CLI_NAME, reuters::DEFAULTS))?);
    Ok(adapters)
}
