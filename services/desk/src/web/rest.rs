//! services/desk/src/web/rest.rs
//!
//! Contains the Axum handlers for the plain HTTP endpoints: a one-shot view
//! snapshot and file staging for uploads.

use crate::web::{protocol::ViewPayload, state::AppState};
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use bytes::Bytes;
use docdesk_core::FileUpload;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The response payload sent after a file was staged.
#[derive(Serialize)]
pub struct StagedUploadResponse {
    pub upload_id: Uuid,
    pub filename: String,
    pub size: usize,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// The current view, for clients that only need to render once.
pub async fn view_handler(State(app_state): State<Arc<AppState>>) -> Json<ViewPayload> {
    Json(ViewPayload::from(&app_state.desk.view()))
}

/// Stage a file for a later create, update or attach event.
///
/// Accepts a multipart/form-data request whose first file part is kept.
pub async fn upload_handler(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                format!("Failed to read multipart data: {}", e),
            )
        })?
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                "Multipart form must include a file".to_string(),
            )
        })?;

    let filename = field.file_name().unwrap_or("upload").to_string();
    let content_type = field.content_type().map(str::to_string);
    let data: Bytes = field.bytes().await.map_err(|e| {
        error!("Failed to read upload bytes: {}", e);
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read file bytes: {}", e),
        )
    })?;

    let size = data.len();
    let upload_id = app_state.uploads.stage(
        FileUpload {
            filename: filename.clone(),
            content_type,
            bytes: data,
        },
        app_state.desk.session_epoch(),
    );
    info!(%upload_id, %filename, size, "Staged upload");

    Ok((
        StatusCode::CREATED,
        Json(StagedUploadResponse {
            upload_id,
            filename,
            size,
        }),
    ))
}
