pub mod comments;
pub mod health;
pub mod posts;

use axum::{middleware, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::session::ensure_session;
use crate::state::AppState;

/// The full application router, with session handling and request tracing.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(posts::router())
        .merge(comments::router())
        .merge(health::router())
        .layer(middleware::from_fn_with_state(state.clone(), ensure_session))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
