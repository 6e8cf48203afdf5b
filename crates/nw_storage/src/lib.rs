use async_trait::async_trait;
use nw_core::{ArticleStore, Error, Result};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub mod backends;

pub use backends::*;

#[async_trait]
pub trait StorageBackend: ArticleStore {
    fn get_error_message() -> &'static str;
    async fn new() -> Result<Self> where Self: Sized;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageKind {
    Memory,
    #[default]
    SQLite,
}

impl FromStr for StorageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::SQLite),
            other => Err(Error::Config(format!("Unknown storage backend: {}", other))),
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str("memory"),
            Self::SQLite => f.write_str("sqlite"),
        }
    }
}

/// Build the store selected on the command line. `location` is the database
/// path for SQLite and ignored for memory. `sessions` is the number of store
/// sessions that may be open at once (one per concurrently running adapter).
pub async fn create_storage(kind: StorageKind, location: Option<&str>, sessions: usize) -> Result<Arc<dyn ArticleStore>> {
    match kind {
        StorageKind::Memory => {
            let storage = <MemoryStorage as StorageBackend>::new()
                .await
                .map_err(|e| Error::Storage(format!("{} ({})", e, MemoryStorage::get_error_message())))?;
            Ok(Arc::new(storage))
        }
        #[cfg(feature = "sqlite")]
        StorageKind::SQLite => {
            let path = std::path::Path::new(location.unwrap_or(backends::sqlite::DEFAULT_DB_PATH));
            let storage = SQLiteStorage::with_max_connections(path, pool_size(sessions))
                .await
                .map_err(|e| Error::Storage(format!("{} ({})", e, SQLiteStorage::get_error_message())))?;
            Ok(Arc::new(storage))
        }
        #[cfg(not(feature = "sqlite"))]
        StorageKind::SQLite => {
            let _ = (location, sessions);
            Err(Error::Config("nw_storage was built without the sqlite feature".to_string()))
        }
    }
}

/// Connections needed for `sessions` open sessions plus one for the
/// summary queries (`count`, `get_by_source`).
#[cfg(feature = "sqlite")]
fn pool_size(sessions: usize) -> u32 {
    u32::try_from(sessions)
        .unwrap_or(u32::MAX)
        .saturating_add(1)
        .max(backends::sqlite::DEFAULT_MAX_CONNECTIONS)
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::{create_storage, StorageBackend, StorageKind};
}
