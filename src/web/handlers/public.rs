use crate::config::format_size;
use crate::services::library;
use crate::web::error::AppResult;
use crate::web::state::AppState;
use axum::extract::State;
use axum::response::Html;
use std::sync::Arc;
use tera::Context;

pub async fn index(State(state): State<Arc<AppState>>) -> AppResult<Html<String>> {
    let upload_dir = state.store.upload_dir().to_path_buf();
    let media = tokio::task::spawn_blocking(move || library::list_media(&upload_dir)).await??;

    let mut ctx = Context::new();
    ctx.insert("media", &media);
    ctx.insert(
        "max_upload_size",
        &format_size(state.store.policy().max_size()),
    );
    ctx.insert("version", env!("CARGO_PKG_VERSION"));

    let html = state.templates.render("index.html", &ctx)?;
    Ok(Html(html))
}
