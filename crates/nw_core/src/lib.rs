pub mod error;
pub mod fetch;
pub mod identity;
pub mod source;
pub mod storage;
pub mod types;

pub use error::{Error, Result};
pub use fetch::{DelayPhase, DelayPolicy, FetchResponse, Fetcher, HttpFetcher, RateLimitedFetcher, RequestProfile, Throttle};
pub use identity::{fingerprint, identify, Fingerprint};
pub use source::{Region, SourceAdapter, SourceMetadata};
pub use storage::{ArticleStore, StoreSession};
pub use types::{
    ArticleStub, CanonicalArticle, Cursor, Page, PagingPolicy, SourceId, UpsertOutcome, EXTRACTION_FAILURE,
};
