//! JSON REST API for Trailguard.
//!
//! Exposes an axum [`Router`] backed by a [`TrackingService`] over any
//! [`trailguard_core::store::TrackingStore`]. Auth, TLS, and transport
//! concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", trailguard_api::api_router(service.clone()))
//! ```

pub mod alerts;
pub mod error;
pub mod history;
pub mod tourists;
pub mod tracking;

use std::sync::Arc;

use axum::{
  Json, Router,
  routing::{get, patch, post},
};
use serde_json::{Value, json};
use trailguard_core::{service::TrackingService, store::TrackingStore};

pub use error::ApiError;

/// Build a fully-materialised API router for `service`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(service: Arc<TrackingService<S>>) -> Router<()>
where
  S: TrackingStore + 'static,
{
  Router::new()
    .route("/health", get(health))
    // Link registry
    .route("/link", post(tracking::link::<S>))
    .route("/return", post(tracking::return_card::<S>))
    .route("/status/{id}", patch(tracking::update_status::<S>))
    // Location store
    .route("/location", post(tracking::location::<S>))
    .route("/history/{id}", get(history::handler::<S>))
    .route("/path/{id}", get(history::path::<S>))
    // Dashboard reads
    .route("/tourists", get(tourists::list::<S>))
    .route("/tourist/{id}", get(tourists::get_one::<S>))
    .route("/nearby", post(tourists::nearby::<S>))
    // Alerts
    .route("/alerts", get(alerts::list::<S>))
    .route("/alerts/{id}/acknowledge", patch(alerts::acknowledge::<S>))
    .with_state(service)
}

async fn health() -> Json<Value> {
  Json(json!({ "status": "ok", "timestamp": chrono::Utc::now() }))
}

// ─── Integration tests ────────────────────────────────────────────────────────
