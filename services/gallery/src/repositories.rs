//! Media store abstraction
//!
//! All persistence goes through [`MediaStore`]. The PostgreSQL implementation
//! lives in [`media`]; [`memory`] keeps records in process for tests and local
//! runs.

use async_trait::async_trait;
use common::error::DatabaseResult;
use std::{future::Future, time::Duration};
use uuid::Uuid;

use crate::{
    error::{GalleryError, GalleryResult},
    models::media::{MediaData, MediaFilter, MediaItem, MediaMetadata, NewMediaItem},
};

pub mod media;
pub mod memory;

pub use media::PgMediaStore;
pub use memory::MemoryMediaStore;

/// Persistent record store for media items
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Get a media item by ID
    async fn get(&self, id: Uuid) -> DatabaseResult<Option<MediaItem>>;

    /// Get a media item together with its file bytes, in one read
    async fn get_data(&self, id: Uuid) -> DatabaseResult<Option<(MediaItem, MediaData)>>;

    /// List media items matching `filter`, newest first
    async fn list(&self, filter: &MediaFilter) -> DatabaseResult<Vec<MediaItem>>;

    /// Number of items grouped under `project_id`
    async fn count_in_project(&self, project_id: &str) -> DatabaseResult<i64>;

    /// Insert a new item with the given initial access token
    async fn insert(
        &self,
        item: &NewMediaItem,
        access_token: Option<&str>,
    ) -> DatabaseResult<MediaItem>;

    /// Insert an upload batch, all or nothing.
    ///
    /// Gated items take the current token of their project's secret items,
    /// or `fresh_token` when the project has none. Writes nothing and reports
    /// [`BatchInsert::ProjectFull`] when a project would exceed
    /// `max_per_project` items. The count and the inserts are serialised per
    /// project against other batches and token changes.
    async fn insert_batch(
        &self,
        items: &[NewMediaItem],
        fresh_token: &str,
        max_per_project: i64,
    ) -> DatabaseResult<BatchInsert>;

    /// Overwrite the descriptive fields; `None` if the item does not exist
    async fn update_metadata(
        &self,
        id: Uuid,
        metadata: &MediaMetadata,
    ) -> DatabaseResult<Option<MediaItem>>;

    /// Replace the file bytes; `None` if the item does not exist
    async fn replace_data(&self, id: Uuid, data: &MediaData) -> DatabaseResult<Option<MediaItem>>;

    /// Delete an item; `false` if it did not exist
    async fn delete(&self, id: Uuid) -> DatabaseResult<bool>;

    /// Atomically replace the access token of `id` and of every secret item
    /// in the same project; `None` if the item does not exist.
    ///
    /// Only [`crate::access::AccessManager`] calls this.
    async fn set_access_token(
        &self,
        id: Uuid,
        access_token: Option<&str>,
    ) -> DatabaseResult<Option<MediaItem>>;

    /// Check that the store is reachable
    async fn health_check(&self) -> DatabaseResult<bool>;
}

/// Outcome of [`MediaStore::insert_batch`]
#[derive(Debug, Clone, PartialEq)]
pub enum BatchInsert {
    Inserted(Vec<MediaItem>),
    /// Nothing was written
    ProjectFull {
        project_id: String,
        existing: i64,
        incoming: i64,
    },
}

/// Run a store call under `timeout`, mapping expiry to a transient failure.
pub async fn with_timeout<T, F>(timeout: Duration, call: F) -> GalleryResult<T>
where
    F: Future<Output = DatabaseResult<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result.map_err(GalleryError::from),
        Err(_) => Err(GalleryError::Transient(format!(
            "media store did not respond within {} ms",
            timeout.as_millis()
        ))),
    }
}
