use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use log::{debug, error};
use std::{str::FromStr, sync::Arc};

use crate::{
    infra::{
        blob::{Bucket, Error as BlobError},
        file_utils::{get_mime_type, is_safe_file_name},
    },
    startup::AppState,
};

/// Serve a stored proof image, objects are immutable once written
pub async fn serve_media(
    State(state): State<Arc<AppState>>,
    Path((bucket, name)): Path<(String, String)>,
) -> Response {
    if !is_safe_file_name(&name) {
        return (StatusCode::BAD_REQUEST, "Bad request").into_response();
    }
    let Ok(bucket) = Bucket::from_str(&bucket) else {
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    };

    let content = match state.blob.download(bucket, &name).await {
        Ok(content) => content,
        Err(BlobError::NotFound(_)) => {
            debug!("media {}/{} not found", bucket, name);
            return (StatusCode::NOT_FOUND, "Not found").into_response();
        }
        Err(e) => {
            error!("error reading media {}/{}: {}", bucket, name, e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response();
        }
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, get_mime_type(&name))
        .header(header::CACHE_CONTROL, "public, max-age=31536000, immutable")
        .body(Body::from(content))
        .unwrap_or_else(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response())
}
