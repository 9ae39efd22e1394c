// File: src/lib.rs
// Purpose: Router and shared state for the fieldgate validation server

pub mod config;
pub mod demo;
pub mod handlers;
pub mod sql_lookup;

use axum::{
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use fieldgate_runtime::FieldValidationService;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use sql_lookup::SqlLookup;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<FieldValidationService>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(service: Arc<FieldValidationService>) -> Self {
        Self {
            service,
            started_at: Utc::now(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/validate", post(handlers::validate_batch))
        .route("/api/validate/stats", get(handlers::stats))
        .route("/api/validate/:field", post(handlers::validate_field))
        .route("/health", get(handlers::health))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
