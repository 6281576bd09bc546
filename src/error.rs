use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use maud::{html, DOCTYPE};

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Path escapes the shared root")]
    PathTraversal,
    #[error("Not found")]
    NotFound,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Admin access required")]
    Forbidden,
    #[error("{0}")]
    BadRequest(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::PathTraversal | AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Io(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Map an `io::Error` to `AppError`, translating `NotFound` appropriately.
pub fn io_err(e: std::io::Error) -> AppError {
    if e.kind() == std::io::ErrorKind::NotFound {
        AppError::NotFound
    } else {
        AppError::Io(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (title, message) = match &self {
            AppError::PathTraversal => (
                "403 Forbidden",
                "Access denied: the requested path is outside the shared directory.".to_string(),
            ),
            AppError::NotFound => (
                "404 Not Found",
                "The file or directory you requested could not be found.".to_string(),
            ),
            AppError::Unauthorized => (
                "401 Unauthorized",
                "You need to log in to do that.".to_string(),
            ),
            AppError::Forbidden => (
                "403 Forbidden",
                "Only the administrator can do that.".to_string(),
            ),
            AppError::BadRequest(msg) => ("400 Bad Request", msg.clone()),
            AppError::Io(e) => {
                tracing::error!("IO error: {}", e);
                (
                    "500 Internal Server Error",
                    "An internal server error occurred.".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                ("500 Internal Server Error", msg.clone())
            }
        };

        let body = html! {
            (DOCTYPE)
            html lang="en" {
                head {
                    meta charset="utf-8";
                    title { (title) }
                }
                body {
                    h1 { (title) }
                    p { (message) }
                    p { a href="/" { "Back to the file list" } }
                }
            }
        };

        (status, Html(body.into_string())).into_response()
    }
}
