pub mod admin;
pub mod archive;
pub mod config;
pub mod error;
pub mod handler;
pub mod listing;
pub mod paths;
pub mod policy;
pub mod preview;
pub mod session;
pub mod state;
pub mod template;
pub mod tunnel;

use axum::{Router, routing::get};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::state::AppState;

/// The complete HTTP surface.
pub fn build_router(state: AppState) -> Router {
    // CatchPanicLayer is outermost so it recovers from panics anywhere in the stack.
    Router::new()
        .route("/", get(handler::index))
        .route("/browse", get(handler::browse_root))
        .route("/browse/", get(handler::browse_root))
        .route("/browse/{*path}", get(handler::browse))
        .route("/download", get(handler::download))
        .route("/preview", get(handler::preview))
        .route("/healthz", get(handler::healthz))
        .merge(admin::router(state.clone()))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
}
