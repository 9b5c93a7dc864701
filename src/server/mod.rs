pub mod handlers;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::catalog::CatalogRegistry;
use crate::config::Config;
use crate::generation::GenerationManager;
use crate::storage::ArtifactStore;

/// Process-wide state injected into every handler.
///
/// The generation manager is `None` when the engine probe failed at
/// startup; catalog endpoints keep working regardless.
pub struct AppState {
    pub config: Config,
    pub registry: CatalogRegistry,
    pub manager: Option<GenerationManager>,
    pub store: ArtifactStore,
}

impl AppState {
    pub fn model_loaded(&self) -> bool {
        self.manager.is_some()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/generate_music", post(handlers::generate_music))
        .route("/catalog/tracks", get(handlers::catalog_tracks))
        // ServeDir handles range requests, so browsers can seek.
        .nest_service("/generated", ServeDir::new(&state.config.generated_dir))
        .nest_service("/audio", ServeDir::new(&state.config.audio_cache_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}
