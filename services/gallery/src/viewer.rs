//! Gate-checked read path for media items
//!
//! Ungated items are returned to anyone. Secret items are returned only to
//! admins or to visitors presenting the item's current access token. A single
//! token is applied to every item of a listing, so the token of one secret
//! item also unlocks its secret siblings in the same project.

use std::{sync::Arc, time::Duration};
use tracing::debug;
use uuid::Uuid;

use crate::{
    access::token_grants,
    error::{GalleryError, GalleryResult},
    models::media::{MediaData, MediaFilter, MediaItem},
    repositories::{MediaStore, with_timeout},
};

/// Who is reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reader<'a> {
    /// Authenticated dashboard user; gating does not apply
    Admin,
    /// Anonymous caller, optionally holding an access token
    Visitor { access_token: Option<&'a str> },
}

impl<'a> Reader<'a> {
    pub fn visitor(access_token: Option<&'a str>) -> Self {
        Reader::Visitor { access_token }
    }

    /// Whether this reader may see `item`
    pub fn may_read(&self, item: &MediaItem) -> bool {
        match self {
            Reader::Admin => true,
            Reader::Visitor { access_token } => {
                !item.category.is_gated() || token_grants(item, *access_token)
            }
        }
    }
}

fn gate(item: &MediaItem, reader: &Reader<'_>) -> GalleryResult<()> {
    if reader.may_read(item) {
        Ok(())
    } else {
        debug!("Denied read of media item {}", item.id);
        Err(GalleryError::AccessDenied)
    }
}

/// Serves media records and bytes after checking access
#[derive(Clone)]
pub struct Viewer {
    store: Arc<dyn MediaStore>,
    timeout: Duration,
}

impl Viewer {
    /// Create a new viewer
    pub fn new(store: Arc<dyn MediaStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Fetch one item, including its current token when access is granted.
    pub async fn fetch(&self, id: Uuid, reader: &Reader<'_>) -> GalleryResult<MediaItem> {
        let item = with_timeout(self.timeout, self.store.get(id))
            .await?
            .ok_or(GalleryError::NotFound)?;

        gate(&item, reader)?;
        Ok(item)
    }

    /// Fetch the raw bytes of one item, gated like [`Viewer::fetch`].
    ///
    /// The record and the bytes come from one read, so a token revoked
    /// concurrently never unlocks the bytes.
    pub async fn fetch_data(&self, id: Uuid, reader: &Reader<'_>) -> GalleryResult<MediaData> {
        let (item, data) = with_timeout(self.timeout, self.store.get_data(id))
            .await?
            .ok_or(GalleryError::NotFound)?;

        gate(&item, reader)?;
        Ok(data)
    }

    /// List every readable item matching `filter`.
    pub async fn list(
        &self,
        filter: &MediaFilter,
        reader: &Reader<'_>,
    ) -> GalleryResult<Vec<MediaItem>> {
        let items = with_timeout(self.timeout, self.store.list(filter)).await?;
        let total = items.len();

        let visible: Vec<MediaItem> = items
            .into_iter()
            .filter(|item| reader.may_read(item))
            .collect();

        debug!("Listing returned {} of {} items", visible.len(), total);
        Ok(visible)
    }

    /// List the readable items of one project, using one token for all of them.
    pub async fn fetch_by_project(
        &self,
        project_id: &str,
        reader: &Reader<'_>,
    ) -> GalleryResult<Vec<MediaItem>> {
        if project_id.is_empty() {
            return Err(GalleryError::Validation(
                "project_id must not be empty".to_string(),
            ));
        }

        self.list(&MediaFilter::by_project(project_id), reader).await
    }
}
