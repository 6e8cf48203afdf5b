use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nw_core::{ArticleStore, CanonicalArticle, Error, Result, SourceId, StoreSession, UpsertOutcome};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use crate::StorageBackend;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS scraped_articles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        source_id INTEGER NOT NULL,
        title TEXT NOT NULL,
        description TEXT,
        author TEXT,
        section TEXT,
        tags TEXT NOT NULL DEFAULT '[]',
        content TEXT NOT NULL,
        image_url TEXT,
        url TEXT NOT NULL,
        published_at TEXT,
        hash TEXT NOT NULL UNIQUE,
        scraped_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_scraped_articles_source ON scraped_articles (source_id)
    "#,
    // Add future migrations here
];

pub const DEFAULT_DB_PATH: &str = "articles.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 4;

pub struct SQLiteStorage {
    pool: SqlitePool,
    db_path: PathBuf,
}

#[async_trait]
impl StorageBackend for SQLiteStorage {
    fn get_error_message() -> &'static str {
        "SQLite database should be writable at ./articles.db"
    }

    async fn new() -> Result<Self> {
        Self::new_with_path(Path::new(DEFAULT_DB_PATH)).await
    }
}

impl SQLiteStorage {
    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        Self::with_max_connections(db_path, DEFAULT_MAX_CONNECTIONS).await
    }

    /// Every open session holds one pooled connection until it is closed,
    /// so the pool must be at least as large as the number of concurrent
    /// sessions.
    pub async fn with_max_connections(db_path: &Path, max_connections: u32) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(10));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(|e| Error::Database(format!("Failed to connect to database: {}", e)))?;

        // Run migrations
        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| Error::Database(format!("Failed to run migration {}: {}", i, e)))?;
        }

        debug!(path = %db_path.display(), max_connections, "SQLite storage ready");
        Ok(Self {
            pool,
            db_path: db_path.to_path_buf(),
        })
    }

    pub fn get_db_path(&self) -> &Path {
        &self.db_path
    }
}

fn row_to_article(row: &SqliteRow) -> Result<CanonicalArticle> {
    let tags: String = row.get("tags");
    let published_at = row
        .get::<Option<String>, _>("published_at")
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|d| d.with_timezone(&Utc));

    Ok(CanonicalArticle {
        source_id: SourceId(row.get::<i64, _>("source_id") as u32),
        title: row.get("title"),
        description: row.get("description"),
        author: row.get("author"),
        section: row.get("section"),
        tags: serde_json::from_str(&tags)?,
        content: row.get("content"),
        image_url: row.get("image_url"),
        url: row.get("url"),
        published_at,
    })
}

#[async_trait]
impl ArticleStore for SQLiteStorage {
    async fn open(&self) -> Result<Box<dyn StoreSession>> {
        let conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| Error::Storage(format!("Failed to acquire connection: {}", e)))?;
        Ok(Box::new(SQLiteSession { conn }))
    }

    async fn count(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM scraped_articles")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to count articles: {}", e)))?;
        Ok(row.get::<i64, _>("n") as u64)
    }

    async fn get_by_source(&self, source_id: SourceId) -> Result<Vec<CanonicalArticle>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM scraped_articles
            WHERE source_id = ?
            ORDER BY id
            "#,
        )
        .bind(source_id.0 as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get articles by source: {}", e)))?;

        rows.iter().map(row_to_article).collect()
    }
}

/// One pooled connection, returned to the pool when the session ends.
pub struct SQLiteSession {
    conn: PoolConnection<Sqlite>,
}

#[async_trait]
impl StoreSession for SQLiteSession {
    async fn upsert(&mut self, article: &CanonicalArticle) -> Result<UpsertOutcome> {
        let tags = serde_json::to_string(&article.tags)?;

        let result = sqlx::query(
            r#"
            INSERT INTO scraped_articles
            (source_id, title, description, author, section, tags, content, image_url, url, published_at, hash, scraped_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(hash) DO NOTHING
            "#,
        )
        .bind(article.source_id.0 as i64)
        .bind(&article.title)
        .bind(article.description.as_deref())
        .bind(article.author.as_deref())
        .bind(article.section.as_deref())
        .bind(tags)
        .bind(&article.content)
        .bind(article.image_url.as_deref())
        .bind(&article.url)
        .bind(article.published_at.map(|d| d.to_rfc3339()))
        .bind(article.content_hash().as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *self.conn)
        .await
        .map_err(|e| Error::Storage(format!("Failed to store article: {}", e)))?;

        if result.rows_affected() == 0 {
            Ok(UpsertOutcome::Duplicate)
        } else {
            Ok(UpsertOutcome::Inserted)
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        // dropping the PoolConnection hands it back to the pool
        drop(self.conn);
        Ok(())
    }
}
