use nw_core::{Fetcher, Region, Result, SourceId, SourceMetadata};
use std::sync::Arc;

use crate::config::SourcesConfig;
use crate::scrapers::Adapter;

pub mod biobio;
pub mod cooperativa;
pub mod df;
pub mod elciudadano;
pub mod emol;
pub mod latercera;

pub const REGION: Region = Region { name: "chile" };

pub(crate) fn metadata(name: &'static str, emoji: &'static str, source_id: u32, cli_name: impl Into<String>) -> SourceMetadata {
    SourceMetadata {
        name,
        emoji,
        region: REGION,
        source_id: SourceId(source_id),
        cli_name: cli_name.into(),
    }
}

/// Returns every Chilean adapter, one per lane
pub fn get_adapters(fetcher: &Arc<dyn Fetcher>, config: &SourcesConfig) -> Result<Vec<Adapter>> {
    let mut adapters = vec![
        latercera::adapter(fetcher.clone(), config.settings_for(latercera::CLI_NAME, latercera::DEFAULTS))?,
        emol::adapter(fetcher.clone(), config.settings_for(emol::CLI_NAME, emol::DEFAULTS))?,
        df::adapter(fetcher.clone(), config.settings_for(df::CLI_NAME, df::DEFAULTS))?,
    ];
    for lane in biobio::LANES {
        let settings = config.settings_for(&lane.cli_name(), biobio::DEFAULTS);
        adapters.push(biobio::adapter(fetcher.clone(), lane, settings)?);
    }
    for lane in elciudadano::LANES {
        let settings = config.settings_for(&lane.cli_name(), elciudadano::DEFAULTS);
        adapters.push(elciudadano::adapter(fetcher.clone(), lane, settings)?);
    }
    for lane in cooperativa::LANES {
        let settings = config.settings_for(&lane.cli_name(), cooperativa::DEFAULTS);
        adapters.push(cooperativa::adapter(fetcher.clone(), lane, settings)?);
    }
    Ok(adapters)
}
