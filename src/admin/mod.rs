mod handlers;

pub use handlers::{UploadSummary, client_base_name};

use axum::{
    Form, Router,
    extract::{DefaultBodyLimit, Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;

use crate::{
    error::AppError,
    policy::{self, Decision, Denial, Identity, Operation},
    session,
    state::AppState,
    template,
};

// ── Router ────────────────────────────────────────────────────────────────────

/// Login, logout, upload and delete routes.
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/login", get(get_login).post(post_login))
        .route("/logout", get(logout));

    let upload = Router::new()
        .route("/upload", get(handlers::get_upload).post(handlers::post_upload))
        // Parts are streamed to disk, so the request size is not capped.
        .layer(DefaultBodyLimit::disable())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_member));

    let delete = Router::new()
        .route("/delete", post(handlers::post_delete))
        .route_layer(middleware::from_fn_with_state(state, require_admin));

    Router::new().merge(public).merge(upload).merge(delete)
}

// ── Auth middleware ───────────────────────────────────────────────────────────

async fn require_member(State(state): State<AppState>, req: Request, next: Next) -> Response {
    gate(Operation::Upload, &state, req, next).await
}

async fn require_admin(State(state): State<AppState>, req: Request, next: Next) -> Response {
    gate(Operation::Delete, &state, req, next).await
}

async fn gate(operation: Operation, state: &AppState, req: Request, next: Next) -> Response {
    let token = session::extract_session_cookie(req.headers());
    let identity = Identity::from_token(token.as_deref(), &state.config);

    match policy::authorize(operation, &identity) {
        Decision::Permit => next.run(req).await,
        Decision::Deny(denial) => {
            tracing::debug!(?operation, ?denial, path = %req.uri().path(), "request denied");
            match denial {
                Denial::Login => Redirect::to("/login").into_response(),
                Denial::Unauthorized => AppError::Unauthorized.into_response(),
                Denial::Forbidden => AppError::Forbidden.into_response(),
            }
        }
    }
}

// ── Login / logout ────────────────────────────────────────────────────────────

async fn get_login(State(state): State<AppState>, identity: Identity) -> Response {
    if identity.is_authenticated() {
        return Redirect::to("/upload").into_response();
    }
    Html(template::login_page(&state.config.title, "", None).into_string()).into_response()
}

#[derive(Deserialize)]
struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

async fn post_login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    let config = &state.config;
    // Evaluate both so timing does not reveal which one was wrong.
    let user_ok = constant_time_eq(form.username.as_bytes(), config.username.as_bytes());
    let pass_ok = constant_time_eq(form.password.as_bytes(), config.password.as_bytes());

    if user_ok & pass_ok {
        tracing::info!(user = %form.username, "login");
        let token = session::issue(&form.username, &config.secret_key);
        (
            StatusCode::SEE_OTHER,
            [
                (header::SET_COOKIE, session::session_cookie(&token)),
                (header::LOCATION, "/upload".to_string()),
            ],
        )
            .into_response()
    } else {
        tracing::warn!(user = %form.username, "failed login");
        let page = template::login_page(
            &config.title,
            &form.username,
            Some("Incorrect username or password"),
        );
        Html(page.into_string()).into_response()
    }
}

async fn logout() -> Response {
    (
        StatusCode::SEE_OTHER,
        [
            (header::SET_COOKIE, session::cleared_cookie()),
            (header::LOCATION, "/".to_string()),
        ],
    )
        .into_response()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}
