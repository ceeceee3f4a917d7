//! Error type for `mnemo-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Domain errors, including a lost compare-and-swap race
  /// ([`mnemo_core::Error::VersionConflict`]).
  #[error("core error: {0}")]
  Core(#[from] mnemo_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A column held a value that does not decode to its domain type.
  #[error("unexpected value {value:?} in column {column}")]
  Decode { column: &'static str, value: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
