pub mod health;
pub mod sessions;

use crate::orchestration::Composer;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub composer: Arc<Composer>,
}

impl AppState {
    pub fn new(composer: Arc<Composer>) -> Self {
        Self { composer }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/stack-sessions", post(sessions::open_session))
        .route("/v1/stack-sessions/edit", post(sessions::open_edit_session))
        .route(
            "/v1/stack-sessions/:id",
            get(sessions::get_session).delete(sessions::close_session),
        )
        .route(
            "/v1/stack-sessions/:id/candidates/next",
            post(sessions::load_next_page),
        )
        .route("/v1/stack-sessions/:id/filter", put(sessions::set_filter))
        .route("/v1/stack-sessions/:id/select", post(sessions::select_first))
        .route("/v1/stack-sessions/:id/toggle", post(sessions::toggle))
        .route("/v1/stack-sessions/:id/reorder", post(sessions::reorder))
        .route("/v1/stack-sessions/:id/clear", post(sessions::clear))
        .route("/v1/stack-sessions/:id/price", put(sessions::set_price))
        .route(
            "/v1/stack-sessions/:id/description",
            put(sessions::set_description),
        )
        .route("/v1/stack-sessions/:id/submit", post(sessions::submit))
        .layer(cors)
        .with_state(state)
}
