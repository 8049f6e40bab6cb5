//! PostgreSQL media store

use async_trait::async_trait;
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use crate::{
    models::media::{Category, MediaData, MediaFilter, MediaItem, MediaMetadata, NewMediaItem},
    repositories::{BatchInsert, MediaStore},
};

const MEDIA_COLUMNS: &str = "id, title, description, category, project_id, filename, \
                             content_type, size_bytes, access_token, created_at, updated_at";

/// Media store backed by the `media_items` table
#[derive(Clone)]
pub struct PgMediaStore {
    pool: PgPool,
}

impl PgMediaStore {
    /// Create a new media store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(&self) -> DatabaseResult<()> {
        info!("Running media store migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))
    }
}

fn media_item_from_row(row: &PgRow) -> DatabaseResult<MediaItem> {
    let category: String = row.try_get("category")?;
    let category = category.parse::<Category>().map_err(DatabaseError::Decode)?;

    Ok(MediaItem {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        category,
        project_id: row.try_get("project_id")?,
        filename: row.try_get("filename")?,
        content_type: row.try_get("content_type")?,
        size_bytes: row.try_get("size_bytes")?,
        access_token: row.try_get("access_token")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Serialise batch inserts and token changes of one project until commit
async fn lock_project(conn: &mut PgConnection, project_id: &str) -> DatabaseResult<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(project_id)
        .execute(conn)
        .await?;
    Ok(())
}

async fn insert_row(
    conn: &mut PgConnection,
    item: &NewMediaItem,
    access_token: Option<&str>,
) -> DatabaseResult<MediaItem> {
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO media_items
            (id, title, description, category, project_id, filename,
             content_type, size_bytes, data, access_token)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING {}
        "#,
        MEDIA_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(&item.title)
    .bind(&item.description)
    .bind(item.category.as_str())
    .bind(&item.project_id)
    .bind(&item.data.filename)
    .bind(&item.data.content_type)
    .bind(item.data.bytes.len() as i64)
    .bind(&item.data.bytes)
    .bind(access_token)
    .fetch_one(conn)
    .await?;

    media_item_from_row(&row)
}

fn optional_item(row: Option<PgRow>) -> DatabaseResult<Option<MediaItem>> {
    row.as_ref().map(media_item_from_row).transpose()
}

#[async_trait]
impl MediaStore for PgMediaStore {
    async fn get(&self, id: Uuid) -> DatabaseResult<Option<MediaItem>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM media_items WHERE id = $1",
            MEDIA_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        optional_item(row)
    }

    async fn get_data(&self, id: Uuid) -> DatabaseResult<Option<(MediaItem, MediaData)>> {
        let row = sqlx::query(&format!(
            "SELECT {}, data FROM media_items WHERE id = $1",
            MEDIA_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let item = media_item_from_row(&row)?;
                let data = MediaData {
                    filename: item.filename.clone(),
                    content_type: item.content_type.clone(),
                    bytes: row.try_get("data")?,
                };
                Ok(Some((item, data)))
            }
            None => Ok(None),
        }
    }

    async fn list(&self, filter: &MediaFilter) -> DatabaseResult<Vec<MediaItem>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM media_items
            WHERE ($1::text IS NULL OR category = $1)
              AND ($2::text IS NULL OR project_id = $2)
              AND ($3::text IS NULL OR title = $3)
            ORDER BY created_at DESC, id
            "#,
            MEDIA_COLUMNS
        ))
        .bind(filter.category.map(|c| c.as_str()))
        .bind(filter.project_id.as_deref())
        .bind(filter.title.as_deref())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(media_item_from_row).collect()
    }

    async fn count_in_project(&self, project_id: &str) -> DatabaseResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM media_items WHERE project_id = $1")
                .bind(project_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    async fn insert(
        &self,
        item: &NewMediaItem,
        access_token: Option<&str>,
    ) -> DatabaseResult<MediaItem> {
        let mut conn = self.pool.acquire().await?;
        insert_row(&mut conn, item, access_token).await
    }

    async fn insert_batch(
        &self,
        items: &[NewMediaItem],
        fresh_token: &str,
        max_per_project: i64,
    ) -> DatabaseResult<BatchInsert> {
        let mut projects: Vec<&str> = items
            .iter()
            .filter_map(|item| item.project_id.as_deref())
            .collect();
        projects.sort_unstable();
        projects.dedup();

        // Dropping the transaction on an early return rolls it back.
        let mut tx = self.pool.begin().await?;
        let mut project_tokens: HashMap<&str, Option<String>> = HashMap::new();

        for project_id in projects {
            lock_project(&mut tx, project_id).await?;

            let existing: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM media_items WHERE project_id = $1")
                    .bind(project_id)
                    .fetch_one(&mut *tx)
                    .await?;
            let incoming = items
                .iter()
                .filter(|item| item.project_id.as_deref() == Some(project_id))
                .count() as i64;
            if existing + incoming > max_per_project {
                return Ok(BatchInsert::ProjectFull {
                    project_id: project_id.to_string(),
                    existing,
                    incoming,
                });
            }

            let token: Option<String> = sqlx::query_scalar(
                r#"
                SELECT access_token
                FROM media_items
                WHERE project_id = $1 AND category = 'secret' AND access_token IS NOT NULL
                ORDER BY updated_at DESC
                LIMIT 1
                "#,
            )
            .bind(project_id)
            .fetch_optional(&mut *tx)
            .await?;
            project_tokens.insert(project_id, token);
        }

        let mut created = Vec::with_capacity(items.len());
        for item in items {
            let token = item.category.is_gated().then(|| {
                item.project_id
                    .as_deref()
                    .and_then(|p| project_tokens.get(p).cloned().flatten())
                    .unwrap_or_else(|| fresh_token.to_string())
            });
            created.push(insert_row(&mut tx, item, token.as_deref()).await?);
        }

        tx.commit().await?;
        Ok(BatchInsert::Inserted(created))
    }

    async fn update_metadata(
        &self,
        id: Uuid,
        metadata: &MediaMetadata,
    ) -> DatabaseResult<Option<MediaItem>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE media_items
            SET title = $1, description = $2, category = $3, project_id = $4,
                updated_at = NOW()
            WHERE id = $5
            RETURNING {}
            "#,
            MEDIA_COLUMNS
        ))
        .bind(&metadata.title)
        .bind(&metadata.description)
        .bind(metadata.category.as_str())
        .bind(&metadata.project_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        optional_item(row)
    }

    async fn replace_data(&self, id: Uuid, data: &MediaData) -> DatabaseResult<Option<MediaItem>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE media_items
            SET filename = $1, content_type = $2, size_bytes = $3, data = $4,
                updated_at = NOW()
            WHERE id = $5
            RETURNING {}
            "#,
            MEDIA_COLUMNS
        ))
        .bind(&data.filename)
        .bind(&data.content_type)
        .bind(data.bytes.len() as i64)
        .bind(&data.bytes)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        optional_item(row)
    }

    async fn delete(&self, id: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM media_items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_access_token(
        &self,
        id: Uuid,
        access_token: Option<&str>,
    ) -> DatabaseResult<Option<MediaItem>> {
        let mut tx = self.pool.begin().await?;

        let project_id: Option<Option<String>> =
            sqlx::query_scalar("SELECT project_id FROM media_items WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(project_id) = project_id else {
            return Ok(None);
        };
        if let Some(project_id) = &project_id {
            lock_project(&mut tx, project_id).await?;
        }

        // One statement for the item and its secret siblings: last write wins.
        let rows = sqlx::query(&format!(
            r#"
            UPDATE media_items
            SET access_token = $1, updated_at = NOW()
            WHERE id = $2
               OR ($3::text IS NOT NULL AND project_id = $3 AND category = 'secret')
            RETURNING {}
            "#,
            MEDIA_COLUMNS
        ))
        .bind(access_token)
        .bind(id)
        .bind(project_id.as_deref())
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        rows.iter()
            .map(media_item_from_row)
            .find(|item| item.as_ref().map_or(true, |item| item.id == id))
            .transpose()
    }

    async fn health_check(&self) -> DatabaseResult<bool> {
        common::database::health_check(&self.pool).await
    }
}
