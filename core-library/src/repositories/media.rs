//! Media repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::{
    disambiguated_filename, timestamp_to_datetime, CandidateCursor, CandidateFilter, MediaRecord,
    MediaRow,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{query_as, QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

const SELECT_MEDIA: &str = "SELECT id, orig_name, relative_folder, filename, duplicate_number, \
     description, mime_type, size, checksum, kind, created_at, modified_at, downloaded \
     FROM media_items";

/// Store of indexed media records and the scan watermark
#[async_trait]
pub trait MediaRepository: Send + Sync {
    /// Find the record occupying a local path
    ///
    /// # Returns
    /// - `Ok(Some(record))` if found
    /// - `Ok(None)` if no record maps to that path
    async fn get_by_path(&self, relative_folder: &str, filename: &str)
        -> Result<Option<MediaRecord>>;

    /// Find a record by its remote identifier
    async fn find_by_id(&self, id: &str) -> Result<Option<MediaRecord>>;

    /// Insert a record or refresh an existing one with the same identifier
    ///
    /// The creation time and download state of an existing record are kept.
    async fn upsert(&self, record: &MediaRecord) -> Result<()>;

    /// Flag a record as downloaded
    ///
    /// # Errors
    /// Returns [`LibraryError::NotFound`] if no record has this identifier.
    async fn mark_downloaded(&self, id: &str) -> Result<()>;

    /// Return a record to the not-downloaded state for a forced re-download
    async fn reset_download(&self, id: &str) -> Result<()>;

    /// Creation time of the newest item indexed by an unbounded scan
    async fn get_watermark(&self) -> Result<Option<DateTime<Utc>>>;

    async fn set_watermark(&self, watermark: DateTime<Utc>) -> Result<()>;

    /// Duplicate counter for item `id` named `orig_name` in `relative_folder`
    ///
    /// A known item keeps its counter. A new item gets the number of other
    /// items sharing the name in that folder, bumped past any filename already
    /// taken by a different item.
    async fn duplicate_number(&self, relative_folder: &str, orig_name: &str, id: &str)
        -> Result<i64>;

    /// Next page of download candidates in `(created_at, id)` order
    ///
    /// # Arguments
    /// * `filter` - Date, kind and download-state restrictions
    /// * `after` - Cursor of the last record of the previous page
    /// * `limit` - Maximum records to return
    async fn find_candidates(
        &self,
        filter: &CandidateFilter,
        after: Option<&CandidateCursor>,
        limit: u32,
    ) -> Result<Vec<MediaRecord>>;

    /// Make pending writes durable
    async fn checkpoint(&self) -> Result<()>;

    /// Count indexed records
    async fn count(&self) -> Result<i64>;
}

/// SQLite implementation of MediaRepository
#[derive(Clone)]
pub struct SqliteMediaRepository {
    pool: SqlitePool,
}

impl SqliteMediaRepository {
    /// Create a new SQLite media repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn path_owner(&self, relative_folder: &str, filename: &str) -> Result<Option<String>> {
        let owner: Option<(String,)> =
            query_as("SELECT id FROM media_items WHERE relative_folder = ? AND filename = ?")
                .bind(relative_folder)
                .bind(filename)
                .fetch_optional(&self.pool)
                .await?;

        Ok(owner.map(|(id,)| id))
    }
}

#[async_trait]
impl MediaRepository for SqliteMediaRepository {
    async fn get_by_path(
        &self,
        relative_folder: &str,
        filename: &str,
    ) -> Result<Option<MediaRecord>> {
        let row = query_as::<_, MediaRow>(&format!(
            "{} WHERE relative_folder = ? AND filename = ?",
            SELECT_MEDIA
        ))
        .bind(relative_folder)
        .bind(filename)
        .fetch_optional(&self.pool)
        .await?;

        row.map(MediaRecord::try_from).transpose()
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<MediaRecord>> {
        let row = query_as::<_, MediaRow>(&format!("{} WHERE id = ?", SELECT_MEDIA))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(MediaRecord::try_from).transpose()
    }

    async fn upsert(&self, record: &MediaRecord) -> Result<()> {
        record.validate().map_err(|msg| LibraryError::InvalidInput {
            field: "media".to_string(),
            message: msg,
        })?;

        sqlx::query(
            r#"
            INSERT INTO media_items (
                id, orig_name, relative_folder, filename, duplicate_number,
                description, mime_type, size, checksum, kind,
                created_at, modified_at, indexed_at, downloaded
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                orig_name = excluded.orig_name,
                relative_folder = excluded.relative_folder,
                filename = excluded.filename,
                duplicate_number = excluded.duplicate_number,
                description = excluded.description,
                mime_type = excluded.mime_type,
                size = excluded.size,
                checksum = excluded.checksum,
                kind = excluded.kind,
                modified_at = excluded.modified_at,
                indexed_at = excluded.indexed_at
            "#,
        )
        .bind(&record.id)
        .bind(&record.orig_name)
        .bind(&record.relative_folder)
        .bind(&record.filename)
        .bind(record.duplicate_number)
        .bind(&record.description)
        .bind(&record.mime_type)
        .bind(record.size)
        .bind(&record.checksum)
        .bind(record.kind.as_str())
        .bind(record.created_at.timestamp())
        .bind(record.modified_at.timestamp())
        .bind(Utc::now().timestamp())
        .bind(record.downloaded)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_downloaded(&self, id: &str) -> Result<()> {
        let result = sqlx::query("UPDATE media_items SET downloaded = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound {
                entity_type: "media".to_string(),
                id: id.to_string(),
            });
        }

        Ok(())
    }

    async fn reset_download(&self, id: &str) -> Result<()> {
        let result = sqlx::query("UPDATE media_items SET downloaded = 0 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound {
                entity_type: "media".to_string(),
                id: id.to_string(),
            });
        }

        Ok(())
    }

    async fn get_watermark(&self) -> Result<Option<DateTime<Utc>>> {
        let row: Option<(Option<i64>,)> =
            query_as("SELECT last_indexed FROM sync_state WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;

        row.and_then(|(secs,)| secs)
            .map(|secs| timestamp_to_datetime(secs, "last_indexed"))
            .transpose()
    }

    async fn set_watermark(&self, watermark: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_state (id, last_indexed, updated_at) VALUES (1, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                last_indexed = excluded.last_indexed,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(watermark.timestamp())
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        debug!(watermark = %watermark, "Scan watermark stored");
        Ok(())
    }

    async fn duplicate_number(
        &self,
        relative_folder: &str,
        orig_name: &str,
        id: &str,
    ) -> Result<i64> {
        let known: Option<(i64,)> = query_as(
            "SELECT duplicate_number FROM media_items \
             WHERE id = ? AND relative_folder = ? AND orig_name = ?",
        )
        .bind(id)
        .bind(relative_folder)
        .bind(orig_name)
        .fetch_optional(&self.pool)
        .await?;

        if let Some((number,)) = known {
            return Ok(number);
        }

        let (mut number,): (i64,) = query_as(
            "SELECT COUNT(*) FROM media_items \
             WHERE relative_folder = ? AND orig_name = ? AND id != ?",
        )
        .bind(relative_folder)
        .bind(orig_name)
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        // Another item's original name can collide with a suffixed filename
        loop {
            let filename = disambiguated_filename(orig_name, number);
            match self.path_owner(relative_folder, &filename).await? {
                Some(owner) if owner != id => number += 1,
                _ => return Ok(number),
            }
        }
    }

    async fn find_candidates(
        &self,
        filter: &CandidateFilter,
        after: Option<&CandidateCursor>,
        limit: u32,
    ) -> Result<Vec<MediaRecord>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_MEDIA);
        query.push(" WHERE 1 = 1");

        if !filter.include_downloaded {
            query.push(" AND downloaded = 0");
        }
        if !filter.include_video {
            query.push(" AND kind = 'photo'");
        }
        if let Some(start) = filter.start {
            query.push(" AND created_at >= ").push_bind(start.timestamp());
        }
        if let Some(end) = filter.end {
            query.push(" AND created_at < ").push_bind(end.timestamp());
        }
        if let Some(cursor) = after {
            let created = cursor.created_at.timestamp();
            query
                .push(" AND (created_at > ")
                .push_bind(created)
                .push(" OR (created_at = ")
                .push_bind(created)
                .push(" AND id > ")
                .push_bind(cursor.id.clone())
                .push("))");
        }

        query
            .push(" ORDER BY created_at ASC, id ASC LIMIT ")
            .push_bind(i64::from(limit));

        let rows = query
            .build_query_as::<MediaRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(MediaRecord::try_from).collect()
    }

    async fn checkpoint(&self) -> Result<()> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await?;

        debug!("Index checkpoint written");
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = query_as("SELECT COUNT(*) FROM media_items")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
