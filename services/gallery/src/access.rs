//! Access token management for secret media items
//!
//! A secret item is readable only by callers presenting its current access
//! token. Each item holds at most one token: rotating replaces it in a single
//! store write and revoking clears it, so every earlier token stops working
//! at once.

use rand::{Rng, distributions::Alphanumeric};
use std::{sync::Arc, time::Duration};
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{GalleryError, GalleryResult},
    models::media::{MediaItem, NewMediaItem},
    repositories::{BatchInsert, MediaStore, with_timeout},
    validation::MAX_FILES_PER_PROJECT,
};

/// Length of generated access tokens, in alphanumeric characters
pub const TOKEN_LENGTH: usize = 32;

/// Generate a fresh, unguessable access token.
pub fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Constant-time byte comparison
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }

    result == 0
}

/// Whether `supplied` is the current token of a gated item.
///
/// Exact, case-sensitive match. Ungated items, unshared items and empty or
/// missing tokens never match.
pub fn token_grants(item: &MediaItem, supplied: Option<&str>) -> bool {
    if !item.category.is_gated() {
        return false;
    }

    match (item.access_token.as_deref(), supplied) {
        (Some(stored), Some(supplied)) if !supplied.is_empty() => {
            constant_time_eq(stored.as_bytes(), supplied.as_bytes())
        }
        _ => false,
    }
}

/// Issues, rotates, revokes and validates per-item access tokens
#[derive(Clone)]
pub struct AccessManager {
    store: Arc<dyn MediaStore>,
    timeout: Duration,
}

impl AccessManager {
    /// Create a new access manager
    pub fn new(store: Arc<dyn MediaStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Store an upload batch.
    ///
    /// Secret items are shared from the moment they exist. They join the
    /// current token of their project, and secret items without one share a
    /// single new token, so one link opens the whole upload.
    pub async fn create_items(&self, items: &[NewMediaItem]) -> GalleryResult<Vec<MediaItem>> {
        let fresh = generate_token();
        let outcome = with_timeout(
            self.timeout,
            self.store.insert_batch(items, &fresh, MAX_FILES_PER_PROJECT),
        )
        .await?;

        let created = match outcome {
            BatchInsert::Inserted(created) => created,
            BatchInsert::ProjectFull {
                project_id,
                existing,
                incoming,
            } => {
                return Err(GalleryError::Validation(format!(
                    "Project {} can hold at most {} files; it has {} and {} more were added",
                    project_id, MAX_FILES_PER_PROJECT, existing, incoming
                )));
            }
        };

        for stored in &created {
            info!(
                "Created media item {} (category: {}, shared: {})",
                stored.id,
                stored.category,
                stored.is_shared()
            );
        }

        Ok(created)
    }

    /// Generate a new token for `id` and its secret project siblings,
    /// invalidating any previous one.
    pub async fn issue_or_rotate(&self, id: Uuid) -> GalleryResult<String> {
        let token = generate_token();
        let updated = with_timeout(self.timeout, self.store.set_access_token(id, Some(&token)))
            .await?
            .ok_or(GalleryError::NotFound)?;

        info!("Issued access token for media item {}", updated.id);
        Ok(token)
    }

    /// Clear the token of `id` and its secret project siblings. Revoking an
    /// unshared item is a no-op.
    pub async fn revoke(&self, id: Uuid) -> GalleryResult<()> {
        with_timeout(self.timeout, self.store.set_access_token(id, None))
            .await?
            .ok_or(GalleryError::NotFound)?;

        info!("Revoked access token for media item {}", id);
        Ok(())
    }

    /// Check `supplied` against the current token of `id`.
    ///
    /// Missing items yield `false` rather than an error; store failures are
    /// still reported.
    pub async fn validate(&self, id: Uuid, supplied: Option<&str>) -> GalleryResult<bool> {
        if supplied.is_none_or(str::is_empty) {
            return Ok(false);
        }

        let item = with_timeout(self.timeout, self.store.get(id)).await?;
        Ok(item.is_some_and(|item| token_grants(&item, supplied)))
    }
}
