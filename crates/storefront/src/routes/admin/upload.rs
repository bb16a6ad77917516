//! Product image upload.

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
};
use serde::Serialize;
use tracing::{info, instrument};

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::services::upload::{MAX_UPLOAD_BYTES, UploadError, upload_image};
use crate::state::AppState;

/// Multipart framing allowance on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Multipart field carrying the image.
const FILE_FIELD: &str = "file";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(upload))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + MULTIPART_OVERHEAD_BYTES))
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub url: String,
}

/// Upload one product image to object storage.
///
/// POST /api/admin/upload (multipart, field `file`)
///
/// Images larger than 2000px on either side are scaled down to fit.
///
/// # Errors
///
/// Returns 400 for a missing, oversized or unsupported file, 502 if storage
/// fails.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn upload(
    State(state): State<AppState>,
    RequireAuth(admin): RequireAuth,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::Multipart(e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| UploadError::Multipart(e.body_text()))?;
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(UploadError::TooLarge {
                max_bytes: MAX_UPLOAD_BYTES,
            }
            .into());
        }

        let url = upload_image(state.store(), file_name, bytes.to_vec()).await?;
        info!(url = %url, "Image uploaded");

        return Ok(Json(UploadResponse { success: true, url }));
    }

    Err(UploadError::MissingFile.into())
}
