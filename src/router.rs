//! Router construction for the admission server.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use admission_core::{AdmissionService, ObservationError};

use crate::error::AppError;
use crate::handlers;

/// Shared per-process state handed to every handler.
pub struct AppState {
    pub service: AdmissionService,
    pub strict_status: bool,
}

impl AppState {
    pub fn new(service: AdmissionService, strict_status: bool) -> Self {
        Self {
            service,
            strict_status,
        }
    }

    pub fn reject(&self, error: ObservationError) -> AppError {
        AppError::new(error, self.strict_status)
    }
}

/// Build the full axum router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/predict", post(handlers::predict::predict))
        .route("/update", post(handlers::update::update))
        .route("/validate", post(handlers::validate::validate))
        .route(
            "/observations/:id",
            get(handlers::observations::get_observation),
        )
        .route("/health", get(handlers::health::health))
        .layer(Extension(state))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
