//! Application state shared across handlers

use std::{sync::Arc, time::Duration};
use tracing::error;
use uuid::Uuid;

use crate::{
    access::AccessManager,
    config::ApiConfig,
    error::{ApiError, GalleryError},
    middleware::AdminAuthConfig,
    repositories::MediaStore,
    share::build_share_link,
    viewer::Viewer,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MediaStore>,
    pub access: AccessManager,
    pub viewer: Viewer,
    pub config: Arc<ApiConfig>,
    pub auth: Arc<AdminAuthConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn MediaStore>, config: ApiConfig, auth: AdminAuthConfig) -> Self {
        let timeout = config.store_timeout();

        Self {
            access: AccessManager::new(store.clone(), timeout),
            viewer: Viewer::new(store.clone(), timeout),
            store,
            config: Arc::new(config),
            auth: Arc::new(auth),
        }
    }

    pub fn store_timeout(&self) -> Duration {
        self.config.store_timeout()
    }

    /// Turn a core failure into the HTTP error this deployment reports
    pub fn reject(&self, error: GalleryError) -> ApiError {
        ApiError::from_gallery(error, self.config.conceal_access_denied)
    }

    /// Shareable link rooted at the configured public origin
    pub fn share_link(&self, id: Uuid, token: &str) -> Result<String, ApiError> {
        build_share_link(&self.config.public_origin, id, token).map_err(|e| {
            error!("Failed to build share link for {}: {}", id, e);
            ApiError::InternalServerError
        })
    }
}
