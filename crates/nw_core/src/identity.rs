//! Content identity of an article.
//!
//! The fingerprint is the SHA-256 of the article URL exactly as the adapter
//! emitted it. No normalization is applied: `https://a.cl/x` and
//! `https://a.cl/x/` are two different articles.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::types::CanonicalArticle;

/// Lowercase hex SHA-256 digest used as the store's uniqueness key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn fingerprint(url: &str) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    Fingerprint(format!("{:x}", hasher.finalize()))
}

/// Identity of an article; depends on `url` only.
pub fn identify(article: &CanonicalArticle) -> Fingerprint {
    fingerprint(&article.url)
}
