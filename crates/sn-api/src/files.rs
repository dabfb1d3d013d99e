use axum::extract::{Multipart, Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use sn_core::file_store::{self, FileDescriptor, FileStoreError};

use crate::auth::current_user;
use crate::{ApiError, ApiResult, AppState};

const FILES_FIELD: &str = "files";

#[derive(Serialize)]
pub struct UploadFilesResponse {
    pub files: Vec<FileDescriptor>,
}

pub async fn upload_chat_files(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadFilesResponse>> {
    current_user(&state, &headers).await?;

    let mut uploads = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::new(StatusCode::BAD_REQUEST, "INVALID_MULTIPART", err.to_string()))?
    {
        if field.name() != Some(FILES_FIELD) {
            continue;
        }
        let name = field.file_name().unwrap_or("upload").to_string();
        let declared = field.content_type().map(str::to_string);
        let content = field
            .bytes()
            .await
            .map_err(|err| ApiError::new(StatusCode::BAD_REQUEST, "INVALID_MULTIPART", err.to_string()))?;
        uploads.push((name, declared, content));
    }

    if uploads.is_empty() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "NO_FILES",
            "no files were uploaded",
        ));
    }
    // Reject the whole batch before writing anything.
    for (name, declared, content) in &uploads {
        if content.is_empty() {
            return Err(FileStoreError::Empty(name.clone()).into());
        }
        if file_store::detect_file_type(name, declared.as_deref(), content).is_none() {
            return Err(FileStoreError::UnsupportedType(name.clone()).into());
        }
    }

    let mut files = Vec::with_capacity(uploads.len());
    for (name, declared, content) in &uploads {
        files.push(file_store::save_file(&state.pool, name, declared.as_deref(), content).await?);
    }
    Ok(Json(UploadFilesResponse { files }))
}

pub async fn fetch_file(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    current_user(&state, &headers).await?;

    let stored = file_store::read_file(&state.pool, &file_id).await?;
    let disposition = format!(
        "inline; filename=\"{}\"",
        stored.descriptor.name.replace('"', "")
    );
    Ok((
        [(CONTENT_TYPE, stored.content_type), (CONTENT_DISPOSITION, disposition)],
        stored.content,
    ))
}
