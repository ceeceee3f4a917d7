//! Error types for `mnemo-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  /// The rating was out of range or not an integer. Raised before any state
  /// is touched.
  #[error("invalid rating {rating}: expected {expected}")]
  InvalidRating { rating: f64, expected: &'static str },

  #[error("no card state for user {user_id:?} and flashcard {flashcard_id}")]
  CardNotFound { user_id: String, flashcard_id: Uuid },

  #[error("flashcard not found: {0}")]
  FlashcardNotFound(Uuid),

  /// Returned by [`crate::selector::try_migrate`] when the card is already
  /// owned by FSRS. Callers treat it as a successful no-op.
  #[error("card for flashcard {0} is already scheduled by FSRS")]
  AlreadyMigrated(Uuid),

  /// A compare-and-swap write lost against a concurrent writer.
  #[error(
    "card state for user {user_id:?} and flashcard {flashcard_id} changed \
     concurrently (expected version {expected})"
  )]
  VersionConflict {
    user_id:      String,
    flashcard_id: Uuid,
    expected:     u64,
  },

  #[error("invalid scheduler parameters: {0}")]
  InvalidParameters(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
