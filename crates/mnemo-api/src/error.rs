//! API error type and [`axum::response::IntoResponse`] implementation.

use std::error::Error as StdError;

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::warn;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// The card state changed between read and write.
  #[error("conflict: {0}")]
  Conflict(String),

  /// `If-Match` named a version that is no longer current.
  #[error("precondition failed: {0}")]
  PreconditionFailed(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn StdError + Send + Sync>),
}

impl ApiError {
  /// Wrap a backend error. Domain errors anywhere in its source chain keep
  /// their HTTP meaning; everything else is a 500.
  pub fn store<E>(err: E) -> Self
  where
    E: StdError + Send + Sync + 'static,
  {
    let mut source: Option<&(dyn StdError + 'static)> = Some(&err);
    let mut classified = None;
    while let Some(e) = source {
      if let Some(core) = e.downcast_ref::<mnemo_core::Error>() {
        classified = Some(classify(core));
        break;
      }
      source = e.source();
    }
    classified.unwrap_or_else(|| ApiError::Store(Box::new(err)))
  }
}

fn classify(err: &mnemo_core::Error) -> ApiError {
  use mnemo_core::Error as E;
  let message = err.to_string();
  match err {
    E::InvalidRating { .. } | E::InvalidParameters(_) => {
      ApiError::BadRequest(message)
    }
    E::CardNotFound { .. } | E::FlashcardNotFound(_) => {
      ApiError::NotFound(message)
    }
    E::VersionConflict { .. } | E::AlreadyMigrated(_) => {
      ApiError::Conflict(message)
    }
  }
}

impl From<mnemo_core::Error> for ApiError {
  fn from(err: mnemo_core::Error) -> Self { ApiError::store(err) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Conflict(m) => {
        warn!(reason = %m, "rejected conflicting write");
        (StatusCode::CONFLICT, m.clone())
      }
      ApiError::PreconditionFailed(m) => {
        (StatusCode::PRECONDITION_FAILED, m.clone())
      }
      ApiError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
