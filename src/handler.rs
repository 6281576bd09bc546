use axum::{
    body::Body,
    extract::{Path as UrlPath, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio_util::io::ReaderStream;

use crate::{
    archive,
    error::{AppError, io_err},
    listing, paths,
    policy::Identity,
    preview::{self, PreviewKind},
    state::AppState,
    template,
};

#[derive(Deserialize)]
pub struct FileQuery {
    #[serde(default)]
    pub filename: String,
}

pub async fn index(State(state): State<AppState>, identity: Identity) -> Result<Response, AppError> {
    render_listing(&state, &identity, &state.root, "").await
}

pub async fn browse_root() -> Redirect {
    Redirect::to("/")
}

pub async fn browse(
    State(state): State<AppState>,
    identity: Identity,
    UrlPath(path): UrlPath<String>,
) -> Result<Response, AppError> {
    if path.trim_matches('/').is_empty() {
        return Ok(Redirect::to("/").into_response());
    }

    let target = visible_target(&state, &path).await?;
    let meta = tokio::fs::metadata(&target).await.map_err(io_err)?;
    let rel = paths::relative_url(&state.root, &target);

    if !meta.is_dir() {
        return Ok(Redirect::to(&template::download_href(&rel)).into_response());
    }
    render_listing(&state, &identity, &target, &rel).await
}

async fn render_listing(
    state: &AppState,
    identity: &Identity,
    dir: &Path,
    rel: &str,
) -> Result<Response, AppError> {
    let entries = listing::read_listing(dir, &state.root, rel, identity.is_admin(), &state.excluded)
        .await
        .map_err(io_err)?;
    let crumbs = listing::breadcrumbs(rel);
    let markup = template::index_page(&state.config.title, rel, &entries, &crumbs, identity);
    Ok(Html(markup.into_string()).into_response())
}

pub async fn download(
    State(state): State<AppState>,
    Query(query): Query<FileQuery>,
) -> Result<Response, AppError> {
    if query.filename.is_empty() {
        return Ok(Redirect::to("/").into_response());
    }

    let target = visible_target(&state, &query.filename).await?;
    let meta = tokio::fs::metadata(&target).await.map_err(io_err)?;
    let base = base_name(&target);

    if meta.is_dir() {
        tracing::info!(dir = %target.display(), "building zip download");
        let dir = target.clone();
        let excluded = state.excluded.clone();
        let spooled = tokio::task::spawn_blocking(move || archive::zip_to_tempfile(&dir, &excluded))
            .await
            .map_err(|e| AppError::Internal(format!("archive task failed: {e}")))?
            .map_err(|e| {
                tracing::error!(dir = %target.display(), error = %e, "zip failed");
                AppError::Internal("Error creating zip file".to_string())
            })?;

        return stream_open_file(
            tokio::fs::File::from_std(spooled),
            "application/zip",
            Some(attachment(&format!("{base}.zip"))),
        )
        .await;
    }

    stream_file(&target, "application/octet-stream", Some(attachment(&base))).await
}

pub async fn preview(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<FileQuery>,
) -> Result<Response, AppError> {
    if query.filename.is_empty() {
        return Ok(Redirect::to("/").into_response());
    }

    let target = visible_target(&state, &query.filename).await?;
    let meta = tokio::fs::metadata(&target).await.map_err(io_err)?;
    let rel = paths::relative_url(&state.root, &target);
    let title = &state.config.title;

    if meta.is_dir() {
        return Ok(Redirect::to(&template::browse_href(&rel)).into_response());
    }

    match preview::kind_of(&target) {
        PreviewKind::Image | PreviewKind::Video => {
            stream_file(&target, preview::mime_for(&target), None).await
        }
        PreviewKind::Text if meta.len() <= preview::MAX_TEXT_PREVIEW => {
            let bytes = tokio::fs::read(&target).await.map_err(io_err)?;
            let content = String::from_utf8_lossy(&bytes);
            let markup = template::text_preview_page(title, &rel, &content, &identity);
            Ok(Html(markup.into_string()).into_response())
        }
        PreviewKind::Text | PreviewKind::Unknown => {
            let markup = template::no_preview_page(title, &rel, &identity);
            Ok(Html(markup.into_string()).into_response())
        }
    }
}

pub async fn healthz() -> &'static str {
    "ok"
}

/// Confine `requested` and refuse the server's own control files.
async fn visible_target(state: &AppState, requested: &str) -> Result<PathBuf, AppError> {
    let target = paths::confine(&state.root, requested).await?;
    if state.is_hidden(&target) {
        return Err(AppError::NotFound);
    }
    Ok(target)
}

async fn stream_file(
    path: &Path,
    content_type: &str,
    disposition: Option<String>,
) -> Result<Response, AppError> {
    let file = tokio::fs::File::open(path).await.map_err(io_err)?;
    stream_open_file(file, content_type, disposition).await
}

async fn stream_open_file(
    file: tokio::fs::File,
    content_type: &str,
    disposition: Option<String>,
) -> Result<Response, AppError> {
    let content_length = file.metadata().await.map_err(AppError::Io)?.len();

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, content_length);
    if let Some(value) = disposition {
        builder = builder.header(header::CONTENT_DISPOSITION, value);
    }

    builder
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| AppError::Internal(e.to_string()))
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string())
}

/// `Content-Disposition` value; quotes and control characters are dropped.
fn attachment(name: &str) -> String {
    let safe: String = name
        .chars()
        .filter(|c| *c != '"' && *c != '\\' && !c.is_control())
        .collect();
    format!("attachment; filename=\"{safe}\"")
}
