//! Canned HTTP for adapter tests.

use async_trait::async_trait;
use nw_core::{DelayPolicy, FetchResponse, Fetcher, RequestProfile, Result};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::config::SourceSettings;

/// Answers from a URL table; unknown URLs get a 404.
#[derive(Default)]
pub struct MockFetcher {
    responses: HashMap<String, (u16, String)>,
    requests: Mutex<Vec<(String, RequestProfile)>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.with_status(url, 200, body)
    }

    pub fn with_status(mut self, url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        self.responses.insert(url.into(), (status, body.into()));
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requests.lock().unwrap().iter().map(|(url, _)| url.clone()).collect()
    }

    pub fn profile_for(&self, url: &str) -> Option<RequestProfile> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .find(|(u, _)| u == url)
            .map(|(_, p)| p.clone())
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn get(&self, url: &str, profile: &RequestProfile) -> Result<FetchResponse> {
        self.requests.lock().unwrap().push((url.to_string(), profile.clone()));
        let (status, body) = self
            .responses
            .get(url)
            .cloned()
            .unwrap_or_else(|| (404, "not found".to_string()));
        Ok(FetchResponse {
            url: url.to_string(),
            status,
            body,
        })
    }
}

/// Settings without pacing.
pub fn unpaced(page_size: u32, max_pages: u32) -> SourceSettings {
    SourceSettings::new(page_size, max_pages, DelayPolicy::None)
}
