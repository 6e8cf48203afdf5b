//! Per-source tuning: page size, page budget, pacing.
//!
//! Pacing has two independent knobs. `delay` is the pause between two
//! items of a page. `request_delay` is applied around every HTTP request
//! of the adapter and is off unless a site asks for it.
//!
//! Every site ships defaults; a JSON file can override them per site
//! (`"biobio"`) or per lane (`"biobio/nacional"`), the lane entry winning:
//!
//! ```json
//! {
//!   "timeout_secs": 20,
//!   "sources": {
//!     "biobio": { "max_pages": 3, "delay_min_ms": 500, "delay_max_ms": 1500 },
//!     "reuters": { "request_delay_ms": 250 },
//!     "elciudadano/mundo": { "enabled": false }
//!   }
//! }
//! ```

use nw_core::{DelayPhase, DelayPolicy, Error, PagingPolicy, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSettings {
    pub paging: PagingPolicy,
    pub delay: DelayPolicy,
    pub request_delay: DelayPolicy,
    pub phase: DelayPhase,
    pub enabled: bool,
}

impl SourceSettings {
    pub const fn new(page_size: u32, max_pages: u32, delay: DelayPolicy) -> Self {
        Self {
            paging: PagingPolicy::new(page_size, max_pages),
            delay,
            request_delay: DelayPolicy::None,
            phase: DelayPhase::Before,
            enabled: true,
        }
    }

    pub const fn with_request_delay(mut self, request_delay: DelayPolicy, phase: DelayPhase) -> Self {
        self.request_delay = request_delay;
        self.phase = phase;
        self
    }

    fn apply(&mut self, o: &SourceOverride) {
        if let Some(enabled) = o.enabled {
            self.enabled = enabled;
        }
        if let Some(page_size) = o.page_size {
            self.paging.page_size = page_size;
        }
        if let Some(max_pages) = o.max_pages {
            self.paging.max_pages = max_pages;
        }
        match (o.delay_ms, o.delay_min_ms, o.delay_max_ms) {
            (Some(ms), _, _) => self.delay = DelayPolicy::fixed_ms(ms),
            (None, Some(min), Some(max)) => self.delay = DelayPolicy::uniform_ms(min, max),
            (None, Some(ms), None) | (None, None, Some(ms)) => self.delay = DelayPolicy::fixed_ms(ms),
            (None, None, None) => {}
        }
        if let Some(ms) = o.request_delay_ms {
            self.request_delay = DelayPolicy::fixed_ms(ms);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceOverride {
    pub enabled: Option<bool>,
    pub page_size: Option<u32>,
    pub max_pages: Option<u32>,
    pub delay_ms: Option<u64>,
    pub delay_min_ms: Option<u64>,
    pub delay_max_ms: Option<u64>,
    pub request_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourcesConfig {
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub sources: HashMap<String, SourceOverride>,
}

impl SourcesConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(format!("Invalid sources config: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(nw_core::fetch::DEFAULT_TIMEOUT)
    }

    /// Defaults of `cli_name` with the site entry, then the lane entry applied.
    pub fn settings_for(&self, cli_name: &str, defaults: SourceSettings) -> SourceSettings {
        let mut settings = defaults;
        let site = cli_name.split('/').next().unwrap_or(cli_name);
        if let Some(o) = self.sources.get(site) {
            settings.apply(o);
        }
        if site != cli_name {
            if let Some(o) = self.sources.get(cli_name) {
                settings.apply(o);
            }
        }
        settings
    }
}
