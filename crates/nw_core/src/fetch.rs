//! Outbound HTTP with pacing and a browser-like request identity.

use async_trait::async_trait;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, REFERER, USER_AGENT};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::{Error, Result};

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/137.0.0.0 Safari/537.36";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Headers sent with every request of an adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestProfile {
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
    pub referer: Option<String>,
    pub extra: Vec<(String, String)>,
}

impl Default for RequestProfile {
    fn default() -> Self {
        Self::html()
    }
}

impl RequestProfile {
    /// What a desktop browser sends for a page navigation.
    pub fn html() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
            accept_language: "es,en-US;q=0.9,en;q=0.8".to_string(),
            referer: None,
            extra: Vec::new(),
        }
    }

    /// What a browser sends for an XHR against a JSON endpoint.
    pub fn json() -> Self {
        Self {
            accept: "application/json, text/plain, */*".to_string(),
            ..Self::html()
        }
    }

    pub fn feed() -> Self {
        Self {
            accept: "application/rss+xml, application/xml;q=0.9, text/xml;q=0.8, */*;q=0.5".to_string(),
            ..Self::html()
        }
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((name.into(), value.into()));
        self
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, header_value(&self.user_agent)?);
        headers.insert(ACCEPT, header_value(&self.accept)?);
        headers.insert(ACCEPT_LANGUAGE, header_value(&self.accept_language)?);
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        if let Some(referer) = &self.referer {
            headers.insert(REFERER, header_value(referer)?);
        }
        for (name, value) in &self.extra {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Config(format!("Invalid header name {}: {}", name, e)))?;
            headers.insert(name, header_value(value)?);
        }
        Ok(headers)
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| Error::Config(format!("Invalid header value {:?}: {}", value, e)))
}

/// A response as received; non-2xx statuses are not turned into errors here.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turns a non-2xx response into a transport error.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::Status {
                status: self.status,
                url: self.url,
            })
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn get(&self, url: &str, profile: &RequestProfile) -> Result<FetchResponse>;
}

/// `reqwest` backed fetcher. Each call carries its own timeout.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get(&self, url: &str, profile: &RequestProfile) -> Result<FetchResponse> {
        let started = Instant::now();
        let response = self.client.get(url).headers(profile.headers()?).send().await?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.text().await?;
        debug!(%url, status, bytes = body.len(), elapsed_ms = started.elapsed().as_millis() as u64, "GET");
        Ok(FetchResponse {
            url: final_url,
            status,
            body,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayPolicy {
    None,
    Fixed(Duration),
    /// Uniformly random between both bounds, inclusive.
    Uniform { min: Duration, max: Duration },
}

impl DelayPolicy {
    pub fn fixed_ms(ms: u64) -> Self {
        DelayPolicy::Fixed(Duration::from_millis(ms))
    }

    pub fn uniform_ms(min: u64, max: u64) -> Self {
        DelayPolicy::Uniform {
            min: Duration::from_millis(min.min(max)),
            max: Duration::from_millis(min.max(max)),
        }
    }

    pub fn sample(&self) -> Duration {
        match *self {
            DelayPolicy::None => Duration::ZERO,
            DelayPolicy::Fixed(delay) => delay,
            DelayPolicy::Uniform { min, max } if min >= max => min,
            DelayPolicy::Uniform { min, max } => {
                let ms = rand::thread_rng().gen_range(min.as_millis() as u64..=max.as_millis() as u64);
                Duration::from_millis(ms)
            }
        }
    }
}

/// Sleeps according to a [`DelayPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttle {
    policy: DelayPolicy,
}

impl Throttle {
    pub fn new(policy: DelayPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> DelayPolicy {
        self.policy
    }

    pub async fn pause(&self) {
        let delay = self.policy.sample();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayPhase {
    Before,
    After,
}

/// Wraps a [`Fetcher`] so that every call is paced by a [`Throttle`].
#[derive(Clone)]
pub struct RateLimitedFetcher {
    inner: Arc<dyn Fetcher>,
    throttle: Throttle,
    phase: DelayPhase,
}

impl RateLimitedFetcher {
    pub fn new(inner: Arc<dyn Fetcher>, policy: DelayPolicy, phase: DelayPhase) -> Self {
        Self {
            inner,
            throttle: Throttle::new(policy),
            phase,
        }
    }

    pub fn throttle(&self) -> &Throttle {
        &self.throttle
    }

    pub fn phase(&self) -> DelayPhase {
        self.phase
    }
}

#[async_trait]
impl Fetcher for RateLimitedFetcher {
    async fn get(&self, url: &str, profile: &RequestProfile) -> Result<FetchResponse> {
        if self.phase == DelayPhase::Before {
            self.throttle.pause().await;
        }
        let response = self.inner.get(url, profile).await;
        if self.phase == DelayPhase::After {
            self.throttle.pause().await;
        }
        response
    }
}
