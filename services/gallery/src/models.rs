//! API models for request and response payloads

use serde::Serialize;

use crate::models::media::MediaItem;

pub mod media;

/// Response for a successful upload
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub images: Vec<MediaItem>,
}

/// Response for token rotation
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub share_url: String,
}

/// Response carrying a shareable link
#[derive(Debug, Serialize)]
pub struct ShareLinkResponse {
    pub share_url: String,
}
