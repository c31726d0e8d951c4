//! HTTP server wiring for Trailguard.
//!
//! Mounts [`trailguard_api::api_router`] under `/api`, optionally behind HTTP
//! Basic auth, and holds the server's configuration.

pub mod auth;
pub mod background;
pub mod error;

pub use error::Error;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{Router, middleware};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use trailguard_core::{
  retry::RetryPolicy,
  service::{ServicePolicy, TrackingService},
  store::TrackingStore,
};

use auth::AuthConfig;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `TRAILGUARD_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                   String,
  pub port:                   u16,
  pub store_path:             PathBuf,
  pub storage_timeout_ms:     u64,
  pub min_sample_interval_ms: u64,
  /// `0` keeps history forever.
  pub history_retention_days: u64,
  /// `0` disables the background sweep.
  pub retention_sweep_secs:   u64,
  pub connect_max_attempts:   u32,
  pub connect_base_delay_ms:  u64,
  pub auth_username:          Option<String>,
  pub auth_password_hash:     Option<String>,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                   "127.0.0.1".to_string(),
      port:                   5000,
      store_path:             PathBuf::from("trailguard.db"),
      storage_timeout_ms:     5_000,
      min_sample_interval_ms: 5_000,
      history_retention_days: 90,
      retention_sweep_secs:   3_600,
      connect_max_attempts:   5,
      connect_base_delay_ms:  1_000,
      auth_username:          None,
      auth_password_hash:     None,
    }
  }
}

impl ServerConfig {
  pub fn service_policy(&self) -> ServicePolicy {
    let retention = (self.history_retention_days > 0)
      .then(|| Duration::from_secs(self.history_retention_days.saturating_mul(24 * 60 * 60)));
    ServicePolicy {
      storage_timeout: Duration::from_millis(self.storage_timeout_ms),
      min_sample_interval: Duration::from_millis(self.min_sample_interval_ms),
      history_retention: retention,
      ..ServicePolicy::default()
    }
  }

  pub fn retry_policy(&self) -> RetryPolicy {
    RetryPolicy {
      max_attempts: self.connect_max_attempts,
      base_delay: Duration::from_millis(self.connect_base_delay_ms),
      ..RetryPolicy::default()
    }
  }

  pub fn sweep_interval(&self) -> Option<Duration> {
    (self.retention_sweep_secs > 0 && self.history_retention_days > 0)
      .then(|| Duration::from_secs(self.retention_sweep_secs))
  }

  /// Basic-auth credentials, if configured. Username and hash must be set
  /// together.
  pub fn auth(&self) -> Result<Option<AuthConfig>, Error> {
    match (&self.auth_username, &self.auth_password_hash) {
      (Some(username), Some(password_hash)) => Ok(Some(AuthConfig {
        username:      username.clone(),
        password_hash: password_hash.clone(),
      })),
      (None, None) => Ok(None),
      _ => Err(Error::Config(
        "auth_username and auth_password_hash must be set together".to_string(),
      )),
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

pub struct AppState<S> {
  pub service: Arc<TrackingService<S>>,
  pub auth:    Option<Arc<AuthConfig>>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self { service: self.service.clone(), auth: self.auth.clone() }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the top-level axum [`Router`].
pub fn router<S>(state: AppState<S>) -> Router
where
  S: TrackingStore + 'static,
{
  let api = trailguard_api::api_router(state.service);
  let api = match state.auth {
    Some(auth) => api.layer(middleware::from_fn_with_state(auth, auth::require_basic)),
    None => api,
  };
  Router::new()
    .nest("/api", api)
    .layer(TraceLayer::new_for_http())
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use base64::Engine as _;
  use base64::engine::general_purpose::STANDARD as B64;
  use rand_core::OsRng;
  use tower::ServiceExt as _;
  use trailguard_store_sqlite::SqliteStore;

  async fn make_state(password: Option<&str>) -> AppState<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let auth = password.map(|password| {
      let salt = SaltString::generate(&mut OsRng);
      let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .unwrap()
        .to_string();
      Arc::new(AuthConfig { username: "ranger".to_string(), password_hash: hash })
    });
    AppState {
      service: Arc::new(TrackingService::new(store, ServerConfig::default().service_policy())),
      auth,
    }
  }

  fn basic(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  async fn get(state: AppState<SqliteStore>, uri: &str, auth: Option<String>) -> StatusCode {
    let mut builder = Request::builder().uri(uri);
    if let Some(value) = auth {
      builder = builder.header(header::AUTHORIZATION, value);
    }
    let req = builder.body(Body::empty()).unwrap();
    router(state).oneshot(req).await.unwrap().status()
  }

  #[tokio::test]
  async fn api_is_nested_and_open_without_auth() {
    let state = make_state(None).await;
    assert_eq!(get(state.clone(), "/api/tourists", None).await, StatusCode::OK);
    assert_eq!(get(state, "/tourists", None).await, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn auth_is_enforced_when_configured() {
    let state = make_state(Some("secret")).await;
    assert_eq!(get(state.clone(), "/api/tourists", None).await, StatusCode::UNAUTHORIZED);
    assert_eq!(
      get(state.clone(), "/api/tourists", Some(basic("ranger", "wrong"))).await,
      StatusCode::UNAUTHORIZED
    );
    assert_eq!(
      get(state.clone(), "/api/tourists", Some(basic("ranger", "secret"))).await,
      StatusCode::OK
    );
    assert_eq!(get(state, "/api/health", None).await, StatusCode::OK);
  }

  #[test]
  fn config_defaults_and_policies() {
    let cfg = ServerConfig::default();
    let policy = cfg.service_policy();
    assert_eq!(policy.min_sample_interval, Duration::from_secs(5));
    assert_eq!(policy.history_retention, Some(Duration::from_secs(90 * 86_400)));
    assert_eq!(cfg.sweep_interval(), Some(Duration::from_secs(3_600)));
    assert_eq!(cfg.retry_policy().max_attempts, 5);

    let keep_forever = ServerConfig { history_retention_days: 0, ..ServerConfig::default() };
    assert_eq!(keep_forever.service_policy().history_retention, None);
    assert_eq!(keep_forever.sweep_interval(), None);
  }

  #[test]
  fn half_configured_auth_is_rejected() {
    let cfg = ServerConfig { auth_username: Some("ranger".into()), ..ServerConfig::default() };
    assert!(matches!(cfg.auth(), Err(Error::Config(_))));
    assert!(ServerConfig::default().auth().unwrap().is_none());
  }
}
