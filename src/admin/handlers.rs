use axum::{
    Form,
    extract::{Multipart, Query, State, multipart::Field},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::{
    error::{AppError, io_err},
    paths,
    policy::Identity,
    state::AppState,
    template::{self, Notice},
};

// ── Upload ────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct UploadQuery {
    #[serde(default)]
    pub directory: String,
}

pub async fn get_upload(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<UploadQuery>,
) -> Response {
    let markup = template::upload_page(&state.config.title, &query.directory, None, &identity);
    Html(markup.into_string()).into_response()
}

/// Aggregate outcome of one multi-file upload.
#[derive(Debug, Default)]
pub struct UploadSummary {
    pub saved: Vec<String>,
    pub failed: usize,
    pub last_error: Option<String>,
}

impl UploadSummary {
    pub fn success(&self) -> bool {
        !self.saved.is_empty()
    }

    pub fn message(&self) -> String {
        let mut msg = match (self.saved.as_slice(), &self.last_error) {
            ([], Some(err)) => return err.clone(),
            ([], None) => return "No files have been selected".to_string(),
            ([one], _) => format!("File uploaded successfully: {one}"),
            (many, _) => format!("{} files uploaded successfully", many.len()),
        };
        if self.failed > 0 {
            msg.push_str(&format!(", {} failed", self.failed));
        }
        msg
    }

    fn record_failure(&mut self, message: String) {
        tracing::warn!("{message}");
        self.failed += 1;
        self.last_error = Some(message);
    }
}

pub async fn post_upload(
    State(state): State<AppState>,
    identity: Identity,
    mut multipart: Multipart,
) -> Response {
    let mut directory = String::new();
    // Resolved when the first file arrives; the form sends `directory` first.
    let mut target_dir: Option<PathBuf> = None;
    let mut summary = UploadSummary::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(f)) => f,
            Ok(None) => break,
            Err(e) => {
                summary.record_failure(format!("Error reading upload: {e}"));
                break;
            }
        };

        match field.name() {
            Some("directory") => match field.text().await {
                Ok(text) => directory = text,
                Err(e) => {
                    summary.record_failure(format!("Error reading destination directory: {e}"));
                    break;
                }
            },
            Some("files") => {
                let Some(name) = field.file_name().map(client_base_name) else {
                    continue;
                };
                if name.is_empty() {
                    continue;
                }

                let dir = match &target_dir {
                    Some(d) => d.clone(),
                    None => match destination_dir(&state, &directory).await {
                        Ok(d) => {
                            target_dir = Some(d.clone());
                            d
                        }
                        Err(e) => {
                            let msg = format!("Error accessing destination directory: {e}");
                            return render_result(&state, &identity, &directory, false, &msg);
                        }
                    },
                };

                let dest = dir.join(&name);
                if state.is_hidden(&dest) {
                    summary.record_failure(format!("Error saving file: {name} is reserved"));
                    continue;
                }
                if is_symlink(&dest).await {
                    summary.record_failure(format!("Error saving file: {name} is a symbolic link"));
                    continue;
                }
                match save_field(field, &dest).await {
                    Ok(bytes) => {
                        tracing::info!(file = %name, bytes, "uploaded");
                        summary.saved.push(name);
                    }
                    Err(e) => summary.record_failure(format!("Error saving file: {e}")),
                }
            }
            _ => {}
        }
    }

    render_result(
        &state,
        &identity,
        &directory,
        summary.success(),
        &summary.message(),
    )
}

fn render_result(
    state: &AppState,
    identity: &Identity,
    directory: &str,
    success: bool,
    message: &str,
) -> Response {
    let notice = Notice { success, message };
    let markup = template::upload_page(&state.config.title, directory, Some(notice), identity);
    Html(markup.into_string()).into_response()
}

/// Final path component of a client-supplied file name, whichever
/// separator the client used.
pub fn client_base_name(name: &str) -> String {
    name.rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|s| *s != "." && *s != "..")
        .unwrap_or_default()
        .to_string()
}

async fn destination_dir(state: &AppState, directory: &str) -> Result<PathBuf, AppError> {
    let dir = paths::confine(&state.root, directory).await?;
    let meta = tokio::fs::metadata(&dir).await.map_err(io_err)?;
    if !meta.is_dir() {
        return Err(AppError::BadRequest("not a directory".to_string()));
    }
    Ok(dir)
}

/// Writing through an existing link, even a dangling one, would land
/// wherever it points.
async fn is_symlink(path: &Path) -> bool {
    tokio::fs::symlink_metadata(path)
        .await
        .is_ok_and(|m| m.file_type().is_symlink())
}

/// Stream one multipart field to `dest`. A partial file is removed on error.
async fn save_field(mut field: Field<'_>, dest: &Path) -> Result<u64, AppError> {
    let mut file = tokio::fs::File::create(dest).await?;
    let mut written = 0u64;

    let result: Result<(), AppError> = async {
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(())
    }
    .await;

    if let Err(e) = result {
        drop(file);
        let _ = tokio::fs::remove_file(dest).await;
        return Err(e);
    }
    Ok(written)
}

// ── Delete ────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct DeleteForm {
    #[serde(default)]
    pub filename: String,
}

pub async fn post_delete(
    State(state): State<AppState>,
    identity: Identity,
    Form(form): Form<DeleteForm>,
) -> Result<Response, AppError> {
    if form.filename.is_empty() {
        return Err(AppError::BadRequest("Filename is required".to_string()));
    }

    let target = paths::confine(&state.root, &form.filename).await?;
    if target == state.root || state.is_hidden(&target) {
        return Err(AppError::Forbidden);
    }

    // Do not follow a final symlink: remove the link, not its target.
    let meta = tokio::fs::symlink_metadata(&target).await.map_err(io_err)?;
    let result = if meta.is_dir() {
        tokio::fs::remove_dir(&target).await
    } else {
        tokio::fs::remove_file(&target).await
    };
    if let Err(e) = result {
        tracing::error!(path = %target.display(), error = %e, "delete failed");
        return Err(AppError::Internal("Error deleting file".to_string()));
    }

    let rel = paths::relative_url(&state.root, &target);
    tracing::info!(
        path = %rel,
        by = identity.name().unwrap_or_default(),
        "deleted"
    );

    let parent = rel.rsplit_once('/').map(|(p, _)| p).unwrap_or("");
    Ok(Redirect::to(&template::browse_href(parent)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_names_lose_their_directories() {
        assert_eq!(client_base_name("report.pdf"), "report.pdf");
        assert_eq!(client_base_name("../../etc/passwd"), "passwd");
        assert_eq!(client_base_name(r"C:\Users\me\photo.jpg"), "photo.jpg");
        assert_eq!(client_base_name("dir/"), "");
        assert_eq!(client_base_name(".."), "");
    }

    #[test]
    fn summary_messages() {
        let mut s = UploadSummary::default();
        assert_eq!(s.message(), "No files have been selected");
        assert!(!s.success());

        s.record_failure("Error saving file: disk full".into());
        assert_eq!(s.message(), "Error saving file: disk full");
        assert!(!s.success());

        s.saved.push("a.txt".into());
        assert_eq!(s.message(), "File uploaded successfully: a.txt, 1 failed");
        s.saved.push("b.txt".into());
        assert_eq!(s.message(), "2 files uploaded successfully, 1 failed");
        assert!(s.success());

        let ok = UploadSummary {
            saved: vec!["x".into()],
            ..Default::default()
        };
        assert_eq!(ok.message(), "File uploaded successfully: x");
    }
}
