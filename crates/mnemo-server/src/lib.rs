//! HTTP server wiring for Mnemo.
//!
//! Holds the deserialised [`ServerConfig`] and builds the top-level router
//! that the `mnemo` binary serves.

use std::{path::PathBuf, sync::Arc};

use axum::{Router, routing::get};
use chrono::Duration;
use mnemo_core::{
  Error as CoreError,
  fsrs::{DEFAULT_WEIGHTS, FsrsParameters, WEIGHT_COUNT},
  selector::Scheduler,
  store::CardStore,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `MNEMO_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:       String,
  #[serde(default = "default_port")]
  pub port:       u16,
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
  #[serde(default)]
  pub scheduler:  SchedulerConfig,
}

fn default_host() -> String { "127.0.0.1".to_string() }

fn default_port() -> u16 { 8080 }

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/mnemo/mnemo.db") }

/// FSRS settings as they appear in the `[scheduler]` table. Steps are given
/// in minutes; omitted weights fall back to the FSRS-5 defaults.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
  pub request_retention:        f64,
  pub maximum_interval:         u32,
  pub enable_fuzz:              bool,
  pub enable_short_term:        bool,
  pub learning_steps_minutes:   Vec<i64>,
  pub relearning_steps_minutes: Vec<i64>,
  pub weights:                  Option<Vec<f64>>,
}

impl Default for SchedulerConfig {
  fn default() -> Self {
    Self {
      request_retention:        0.9,
      maximum_interval:         365,
      enable_fuzz:              true,
      enable_short_term:        true,
      learning_steps_minutes:   vec![1, 10],
      relearning_steps_minutes: vec![10],
      weights:                  None,
    }
  }
}

impl TryFrom<&SchedulerConfig> for FsrsParameters {
  type Error = CoreError;

  fn try_from(cfg: &SchedulerConfig) -> Result<Self, Self::Error> {
    let weights = match &cfg.weights {
      None => DEFAULT_WEIGHTS,
      Some(w) => <[f64; WEIGHT_COUNT]>::try_from(w.as_slice()).map_err(|_| {
        CoreError::InvalidParameters(format!(
          "expected {WEIGHT_COUNT} weights, got {}",
          w.len()
        ))
      })?,
    };
    let params = FsrsParameters {
      request_retention: cfg.request_retention,
      maximum_interval: cfg.maximum_interval,
      weights,
      enable_fuzz: cfg.enable_fuzz,
      enable_short_term: cfg.enable_short_term,
      learning_steps: minutes(&cfg.learning_steps_minutes)?,
      relearning_steps: minutes(&cfg.relearning_steps_minutes)?,
    };
    params.validate()?;
    Ok(params)
  }
}

fn minutes(steps: &[i64]) -> Result<Vec<Duration>, CoreError> {
  steps
    .iter()
    .map(|&m| {
      Duration::try_minutes(m).ok_or_else(|| {
        CoreError::InvalidParameters(format!(
          "step of {m} minutes is out of range"
        ))
      })
    })
    .collect()
}

impl SchedulerConfig {
  /// Validate the settings and build the shared scheduler.
  pub fn build(&self) -> mnemo_core::Result<Scheduler> {
    Scheduler::new(FsrsParameters::try_from(self)?)
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The API under `/api`, plus a liveness probe at `/health`.
pub fn app<S>(store: Arc<S>, scheduler: Arc<Scheduler>) -> Router
where
  S: CardStore + 'static,
{
  Router::new()
    .route("/health", get(|| async { "ok" }))
    .nest("/api", mnemo_api::api_router(store, scheduler))
    .layer(TraceLayer::new_for_http())
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use config::{Config, File, FileFormat};
  use mnemo_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;

  fn parse(toml: &str) -> ServerConfig {
    Config::builder()
      .add_source(File::from_str(toml, FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap()
  }

  #[test]
  fn empty_config_uses_defaults() {
    let cfg = parse("");
    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.scheduler, SchedulerConfig::default());

    let params = FsrsParameters::try_from(&cfg.scheduler).unwrap();
    assert_eq!(params, FsrsParameters::default());
  }

  #[test]
  fn scheduler_table_overrides_defaults() {
    let cfg = parse(
      r#"
        port = 9000
        store_path = "/tmp/mnemo.db"

        [scheduler]
        request_retention = 0.85
        enable_fuzz = false
        learning_steps_minutes = [5]
      "#,
    );
    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.store_path, PathBuf::from("/tmp/mnemo.db"));

    let params = FsrsParameters::try_from(&cfg.scheduler).unwrap();
    assert_eq!(params.request_retention, 0.85);
    assert!(!params.enable_fuzz);
    assert_eq!(params.learning_steps, vec![Duration::minutes(5)]);
    assert_eq!(params.relearning_steps, vec![Duration::minutes(10)]);
    assert_eq!(params.maximum_interval, 365);
  }

  #[test]
  fn wrong_weight_count_is_rejected() {
    let cfg = SchedulerConfig {
      weights: Some(vec![0.4; 17]),
      ..Default::default()
    };
    let err = cfg.build().unwrap_err();
    assert!(matches!(err, CoreError::InvalidParameters(_)), "{err}");
  }

  #[test]
  fn out_of_range_retention_is_rejected() {
    let cfg = SchedulerConfig {
      request_retention: 1.0,
      ..Default::default()
    };
    assert!(matches!(
      cfg.build().unwrap_err(),
      CoreError::InvalidParameters(_)
    ));
  }

  #[test]
  fn oversized_steps_and_intervals_are_rejected() {
    let cfg = SchedulerConfig {
      learning_steps_minutes: vec![1, i64::MAX],
      ..Default::default()
    };
    assert!(matches!(
      cfg.build().unwrap_err(),
      CoreError::InvalidParameters(_)
    ));

    let cfg = SchedulerConfig {
      relearning_steps_minutes: vec![60 * 24 * 40_000],
      ..Default::default()
    };
    assert!(matches!(
      cfg.build().unwrap_err(),
      CoreError::InvalidParameters(_)
    ));

    let cfg = SchedulerConfig {
      maximum_interval: u32::MAX,
      ..Default::default()
    };
    assert!(matches!(
      cfg.build().unwrap_err(),
      CoreError::InvalidParameters(_)
    ));
  }

  #[tokio::test]
  async fn api_is_nested_under_prefix() {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let scheduler = Arc::new(SchedulerConfig::default().build().unwrap());
    let router = app(store, scheduler);

    let res = router
      .clone()
      .oneshot(Request::get("/health").body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = router
      .clone()
      .oneshot(Request::get("/api/flashcards").body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
      .await
      .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, serde_json::json!([]));

    let res = router
      .oneshot(Request::get("/flashcards").body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
  }
}
