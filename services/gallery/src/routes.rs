//! Gallery HTTP routes

use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, Path, Query, State,
        multipart::{Field, MultipartError},
    },
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    middleware::AdminUser,
    models::{
        ShareLinkResponse, TokenResponse, UploadResponse,
        media::{AccessQuery, Category, MediaData, MediaMetadata, MediaQuery, NewMediaItem},
    },
    repositories::with_timeout,
    state::AppState,
    validation::{
        check_project_capacity, non_blank, resolve_content_type, sanitize_filename,
        validate_project_id, validate_title,
    },
    viewer::Reader,
};

/// Create the router for the gallery service
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health_check))
        .route("/images", get(list_media).post(upload_media))
        .route(
            "/images/:id",
            get(get_media_item)
                .put(update_media_item)
                .delete(delete_media_item),
        )
        .route("/images/:id/data", get(get_media_data).put(replace_media_data))
        .route("/images/:id/regenerate-token", post(regenerate_token))
        .route("/images/:id/revoke-access", post(revoke_access))
        .route("/images/:id/share-link", get(get_share_link))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

fn reader<'a>(admin: &Option<AdminUser>, access_token: Option<&'a str>) -> Reader<'a> {
    match admin {
        Some(_) => Reader::Admin,
        None => Reader::visitor(access_token),
    }
}

fn multipart_error(e: MultipartError) -> ApiError {
    warn!("Rejected multipart body: {}", e);
    ApiError::BadRequest(format!("Invalid multipart body: {}", e.body_text()))
}

async fn read_file(field: Field<'_>) -> ApiResult<MediaData> {
    let filename = sanitize_filename(field.file_name().unwrap_or_default());
    let declared = field.content_type().map(str::to_string);
    let bytes = field.bytes().await.map_err(multipart_error)?;

    if bytes.is_empty() {
        return Err(ApiError::BadRequest(format!("{} is empty", filename)));
    }

    let content_type =
        resolve_content_type(&filename, declared.as_deref()).map_err(ApiError::BadRequest)?;

    Ok(MediaData {
        filename,
        content_type,
        bytes: bytes.to_vec(),
    })
}

fn parse_category(value: Option<String>) -> ApiResult<Category> {
    non_blank(value)
        .ok_or_else(|| ApiError::BadRequest("Category is required".to_string()))?
        .to_lowercase()
        .parse()
        .map_err(ApiError::BadRequest)
}

fn parse_project_id(value: Option<String>) -> ApiResult<Option<String>> {
    let project_id = non_blank(value);
    if let Some(project_id) = &project_id {
        validate_project_id(project_id).map_err(ApiError::BadRequest)?;
    }
    Ok(project_id)
}

async fn ensure_project_capacity(
    state: &AppState,
    project_id: &str,
    incoming: i64,
) -> ApiResult<()> {
    let existing = with_timeout(
        state.store_timeout(),
        state.store.count_in_project(project_id),
    )
    .await
    .map_err(|e| state.reject(e))?;

    check_project_capacity(existing, incoming).map_err(ApiError::BadRequest)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let healthy = with_timeout(state.store_timeout(), state.store.health_check())
        .await
        .unwrap_or(false);

    if healthy {
        (
            StatusCode::OK,
            Json(json!({ "status": "ok", "service": "gallery" })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unavailable", "service": "gallery" })),
        )
    }
}

/// List media items, optionally narrowed to one project
pub async fn list_media(
    State(state): State<AppState>,
    admin: Option<AdminUser>,
    Query(query): Query<MediaQuery>,
) -> ApiResult<impl IntoResponse> {
    let reader = reader(&admin, query.access_token.as_deref());
    let filter = query.filter();

    let items = match filter.project_id.as_deref() {
        Some(project_id) if filter.category.is_none() && filter.title.is_none() => {
            state.viewer.fetch_by_project(project_id, &reader).await
        }
        _ => state.viewer.list(&filter, &reader).await,
    }
    .map_err(|e| state.reject(e))?;

    Ok(Json(items))
}

/// Upload one or more files sharing the same metadata
pub async fn upload_media(
    State(state): State<AppState>,
    admin: AdminUser,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let mut title = None;
    let mut description = None;
    let mut category = None;
    let mut project_id = None;
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "images" => files.push(read_file(field).await?),
            "title" => title = Some(field.text().await.map_err(multipart_error)?),
            "description" => description = Some(field.text().await.map_err(multipart_error)?),
            "category" => category = Some(field.text().await.map_err(multipart_error)?),
            "project_id" => project_id = Some(field.text().await.map_err(multipart_error)?),
            other => debug!("Ignoring multipart field {}", other),
        }
    }

    let title = title.unwrap_or_default().trim().to_string();
    validate_title(&title).map_err(ApiError::BadRequest)?;
    let category = parse_category(category)?;
    let project_id = parse_project_id(project_id)?;
    let description = non_blank(description);

    if files.is_empty() {
        return Err(ApiError::BadRequest(
            "At least one file is required".to_string(),
        ));
    }

    let new_items: Vec<NewMediaItem> = files
        .into_iter()
        .map(|data| NewMediaItem {
            title: title.clone(),
            description: description.clone(),
            category,
            project_id: project_id.clone(),
            data,
        })
        .collect();

    let images = state
        .access
        .create_items(&new_items)
        .await
        .map_err(|e| state.reject(e))?;

    info!("{} uploaded {} file(s)", admin.subject, images.len());
    Ok((StatusCode::CREATED, Json(UploadResponse { images })))
}

/// Get a media item by ID
pub async fn get_media_item(
    State(state): State<AppState>,
    admin: Option<AdminUser>,
    Path(id): Path<Uuid>,
    Query(query): Query<AccessQuery>,
) -> ApiResult<impl IntoResponse> {
    let reader = reader(&admin, query.access_token.as_deref());
    let item = state
        .viewer
        .fetch(id, &reader)
        .await
        .map_err(|e| state.reject(e))?;

    Ok(Json(item))
}

/// Stream the stored file of a media item
pub async fn get_media_data(
    State(state): State<AppState>,
    admin: Option<AdminUser>,
    Path(id): Path<Uuid>,
    Query(query): Query<AccessQuery>,
) -> ApiResult<impl IntoResponse> {
    let reader = reader(&admin, query.access_token.as_deref());
    let data = state
        .viewer
        .fetch_data(id, &reader)
        .await
        .map_err(|e| state.reject(e))?;

    let disposition = format!("inline; filename=\"{}\"", data.filename.replace('"', ""));

    Ok((
        [
            (header::CONTENT_TYPE, data.content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data.bytes,
    ))
}

/// Update the descriptive fields of a media item
pub async fn update_media_item(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<MediaMetadata>,
) -> ApiResult<impl IntoResponse> {
    let title = payload.title.trim().to_string();
    validate_title(&title).map_err(ApiError::BadRequest)?;
    let project_id = parse_project_id(payload.project_id)?;

    let metadata = MediaMetadata {
        title,
        description: non_blank(payload.description),
        category: payload.category,
        project_id,
    };

    let timeout = state.store_timeout();
    let current = with_timeout(timeout, state.store.get(id))
        .await
        .map_err(|e| state.reject(e))?
        .ok_or_else(|| ApiError::NotFound("Media item not found".to_string()))?;

    // Unlike uploads, a move is counted outside the store's per-project
    // lock; a concurrent upload into the target can overshoot by one.
    if let Some(project_id) = &metadata.project_id {
        if current.project_id.as_ref() != Some(project_id) {
            ensure_project_capacity(&state, project_id, 1).await?;
        }
    }

    let item = with_timeout(timeout, state.store.update_metadata(id, &metadata))
        .await
        .map_err(|e| state.reject(e))?
        .ok_or_else(|| ApiError::NotFound("Media item not found".to_string()))?;

    info!("{} updated media item {}", admin.subject, id);
    Ok(Json(item))
}

/// Replace the stored file of a media item
pub async fn replace_media_data(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let mut data = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some("image") {
            data = Some(read_file(field).await?);
        }
    }

    let data = data.ok_or_else(|| ApiError::BadRequest("Field image is required".to_string()))?;

    let item = with_timeout(state.store_timeout(), state.store.replace_data(id, &data))
        .await
        .map_err(|e| state.reject(e))?
        .ok_or_else(|| ApiError::NotFound("Media item not found".to_string()))?;

    info!("{} replaced the file of media item {}", admin.subject, id);
    Ok(Json(item))
}

/// Delete a media item
pub async fn delete_media_item(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let deleted = with_timeout(state.store_timeout(), state.store.delete(id))
        .await
        .map_err(|e| state.reject(e))?;

    if !deleted {
        return Err(ApiError::NotFound("Media item not found".to_string()));
    }

    info!("{} deleted media item {}", admin.subject, id);
    Ok(Json(json!({ "message": "Media item deleted" })))
}

/// Issue a fresh access token, invalidating the previous one
pub async fn regenerate_token(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let access_token = state
        .access
        .issue_or_rotate(id)
        .await
        .map_err(|e| state.reject(e))?;
    let share_url = state.share_link(id, &access_token)?;

    debug!("{} rotated the token of media item {}", admin.subject, id);
    Ok(Json(TokenResponse {
        access_token,
        share_url,
    }))
}

/// Withdraw the access token of a media item
pub async fn revoke_access(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state
        .access
        .revoke(id)
        .await
        .map_err(|e| state.reject(e))?;

    debug!("{} revoked access to media item {}", admin.subject, id);
    Ok(Json(json!({ "message": "Access revoked" })))
}

/// Current shareable link of a media item
pub async fn get_share_link(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let item = with_timeout(state.store_timeout(), state.store.get(id))
        .await
        .map_err(|e| state.reject(e))?
        .ok_or_else(|| ApiError::NotFound("Media item not found".to_string()))?;

    let token = item
        .access_token
        .ok_or_else(|| ApiError::NotFound("Media item is not shared".to_string()))?;

    Ok(Json(ShareLinkResponse {
        share_url: state.share_link(id, &token)?,
    }))
}
