pub mod handlers;
pub mod session;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::calendar::{CalendarGateway, OAuthClient};
use crate::extraction::EventExtractor;
use handlers::{
    add_event_handler, authorize_handler, extract_event_handler, health_handler, index_handler,
    logout_handler, oauth2callback_handler,
};
pub use session::SessionService;

#[derive(Clone)]
pub struct AppState {
    /// Directory where uploaded files are stored while they are processed
    pub upload_dir: PathBuf,
    /// Largest request body accepted; anything bigger is answered with 413
    pub max_upload_bytes: usize,
    pub extractor: Arc<EventExtractor>,
    pub calendar: Arc<dyn CalendarGateway>,
    pub oauth: Arc<OAuthClient>,
    pub sessions: Arc<SessionService>,
}

impl AppState {
    pub fn new(
        upload_dir: PathBuf,
        max_upload_bytes: usize,
        extractor: Arc<EventExtractor>,
        calendar: Arc<dyn CalendarGateway>,
        oauth: Arc<OAuthClient>,
        sessions: Arc<SessionService>,
    ) -> Self {
        Self {
            upload_dir,
            max_upload_bytes,
            extractor,
            calendar,
            oauth,
            sessions,
        }
    }
}

/// Build the router for the web interface
pub fn router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;

    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/authorize", get(authorize_handler))
        .route("/oauth2callback", get(oauth2callback_handler))
        .route("/logout", get(logout_handler))
        .route("/api/extract-event", post(extract_event_handler))
        .route("/api/add-event", post(add_event_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
