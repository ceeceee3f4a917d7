//! The `CardStore` trait and supporting query types.
//!
//! Storage backends (e.g. `mnemo-store-sqlite`) implement the trait; the API
//! layer depends only on this abstraction.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  card::CardState,
  flashcard::{Flashcard, FlashcardPatch, NewFlashcard},
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`CardStore::list_flashcards`].
#[derive(Debug, Clone, Default)]
pub struct FlashcardQuery {
  /// Only flashcards carrying this tag.
  pub tag:    Option<String>,
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a flashcard and card-state backend.
///
/// Card states are written with compare-and-swap: every successful
/// [`put_card_state`](CardStore::put_card_state) bumps the version, and a
/// write against a stale version fails with
/// [`Error::VersionConflict`](crate::Error::VersionConflict) instead of
/// silently overwriting a concurrent review.
///
/// All methods return `Send` futures so the trait can be used from a
/// multi-threaded tokio runtime behind `axum`.
pub trait CardStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Flashcards ────────────────────────────────────────────────────────

  /// Persist a new flashcard. Identity and timestamps are assigned here.
  fn create_flashcard(
    &self,
    input: NewFlashcard,
  ) -> impl Future<Output = Result<Flashcard, Self::Error>> + Send + '_;

  fn get_flashcard(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Flashcard>, Self::Error>> + Send + '_;

  fn list_flashcards<'a>(
    &'a self,
    query: &'a FlashcardQuery,
  ) -> impl Future<Output = Result<Vec<Flashcard>, Self::Error>> + Send + 'a;

  /// Apply `patch`; `None` if the flashcard does not exist.
  fn update_flashcard(
    &self,
    id: Uuid,
    patch: FlashcardPatch,
  ) -> impl Future<Output = Result<Option<Flashcard>, Self::Error>> + Send + '_;

  /// Delete a flashcard together with every card state that schedules it.
  /// Returns `false` if nothing was deleted.
  fn delete_flashcard(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Card states ───────────────────────────────────────────────────────

  fn get_card_state<'a>(
    &'a self,
    user_id: &'a str,
    flashcard_id: Uuid,
  ) -> impl Future<Output = Result<Option<CardState>, Self::Error>> + Send + 'a;

  /// Every card state owned by `user_id`, ordered by due date.
  fn list_card_states<'a>(
    &'a self,
    user_id: &'a str,
  ) -> impl Future<Output = Result<Vec<CardState>, Self::Error>> + Send + 'a;

  /// Non-suspended card states due at or before `now`, earliest first.
  fn due_card_states<'a>(
    &'a self,
    user_id: &'a str,
    now: DateTime<Utc>,
    limit: Option<usize>,
  ) -> impl Future<Output = Result<Vec<CardState>, Self::Error>> + Send + 'a;

  /// Write `state`.
  ///
  /// With `expected_version == None` the state must not exist yet and is
  /// inserted. Otherwise the stored version must equal `expected_version`.
  /// Returns the state as persisted, carrying its new version. Ledger
  /// entries already stored are never rewritten; only entries beyond the
  /// stored history are appended.
  fn put_card_state(
    &self,
    state: CardState,
    expected_version: Option<u64>,
  ) -> impl Future<Output = Result<CardState, Self::Error>> + Send + '_;
}
