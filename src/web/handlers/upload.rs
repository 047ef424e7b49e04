use crate::services::upload::UploadError;
use crate::web::state::AppState;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect};
use std::sync::Arc;

/// Multipart field carrying the uploaded files.
pub const UPLOAD_FIELD: &str = "file";

/// Stores every `file` part in order. The first failing part ends the request;
/// parts stored before it are kept.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Redirect, UploadError> {
    let mut stored = 0usize;

    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        // An empty file input arrives as a part with `filename=""`.
        let Some(original_name) = field
            .file_name()
            .filter(|name| !name.is_empty())
            .map(str::to_string)
        else {
            continue;
        };

        state.store.persist(&original_name, &mut field).await?;
        stored += 1;
    }

    tracing::info!("Upload complete: {} file(s) stored", stored);
    Ok(Redirect::to("/"))
}

pub async fn method_not_allowed() -> impl IntoResponse {
    (StatusCode::METHOD_NOT_ALLOWED, "Invalid request method")
}
