//! Track metadata cache with SQLite persistence
//!
//! Key/value store from track id to resolved metadata, shared by the
//! orchestrator and the resolver path to de-duplicate catalog lookups.
//! No eviction; lookup misses are `Ok(None)`, never an error.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use std::path::Path;
use tracing::{debug, info};
use trackdeck_common::model::TrackEntry;
use trackdeck_common::Result;

/// Metadata cache handles persistence and lookups
#[derive(Clone)]
pub struct MetadataCache {
    db: SqlitePool,
}

impl MetadataCache {
    /// Open (or create) the cache database at the given path
    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let db = SqlitePool::connect_with(options).await?;
        info!("Metadata cache opened at {}", path.display());
        Self::init(db).await
    }

    /// Open an in-memory cache (tests, ephemeral runs)
    pub async fn open_in_memory() -> Result<Self> {
        let db = SqlitePool::connect("sqlite::memory:").await?;
        Self::init(db).await
    }

    async fn init(db: SqlitePool) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tracks (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                duration_ms INTEGER NOT NULL,
                thumbnail_uri TEXT NOT NULL,
                source_uri TEXT NOT NULL
            )
            "#,
        )
        .execute(&db)
        .await?;

        Ok(Self { db })
    }

    /// Look up an entry by track id
    pub async fn lookup(&self, id: &str) -> Result<Option<TrackEntry>> {
        let row = sqlx::query_as::<_, (String, String, i64, String, String)>(
            "SELECT id, title, duration_ms, thumbnail_uri, source_uri FROM tracks WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(entry_from_row))
    }

    /// Look up the first entry matching a structural predicate
    pub async fn lookup_where(
        &self,
        predicate: impl Fn(&TrackEntry) -> bool,
    ) -> Result<Option<TrackEntry>> {
        let rows = sqlx::query_as::<_, (String, String, i64, String, String)>(
            "SELECT id, title, duration_ms, thumbnail_uri, source_uri FROM tracks",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(entry_from_row).find(|e| predicate(e)))
    }

    /// Insert a new entry; the first writer for a key wins
    ///
    /// Returns whether the row was written. A concurrent insert that loses
    /// the race leaves the existing entry untouched and reports `false`;
    /// `update` is the explicit overwrite.
    pub async fn insert(&self, entry: &TrackEntry) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO tracks (id, title, duration_ms, thumbnail_uri, source_uri)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.title)
        .bind(entry.duration_ms as i64)
        .bind(&entry.thumbnail_uri)
        .bind(&entry.source_uri)
        .execute(&self.db)
        .await?;

        let written = result.rows_affected() > 0;
        debug!("Insert {} -> written: {}", entry.id, written);
        Ok(written)
    }

    /// Replace the value for an existing key
    pub async fn update(&self, entry: &TrackEntry) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE tracks
            SET title = ?, duration_ms = ?, thumbnail_uri = ?, source_uri = ?
            WHERE id = ?
            "#,
        )
        .bind(&entry.title)
        .bind(entry.duration_ms as i64)
        .bind(&entry.thumbnail_uri)
        .bind(&entry.source_uri)
        .bind(&entry.id)
        .execute(&self.db)
        .await?;

        debug!("Updated cache entry {}", entry.id);
        Ok(())
    }
}

fn entry_from_row(row: (String, String, i64, String, String)) -> TrackEntry {
    TrackEntry {
        id: row.0,
        title: row.1,
        duration_ms: row.2.max(0) as u64,
        thumbnail_uri: row.3,
        source_uri: row.4,
    }
}
