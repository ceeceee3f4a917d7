//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{Duration, TimeZone, Utc};
use mnemo_core::{
  card::{Algorithm, CardState, CardStatus, MemoryModel},
  flashcard::{FlashcardPatch, NewFlashcard},
  rating::Rating,
  selector::{ReviewInput, Scheduler, reset, suspend},
  store::{CardStore, FlashcardQuery},
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn t0() -> chrono::DateTime<Utc> {
  Utc.with_ymd_and_hms(2025, 4, 1, 7, 30, 0).unwrap()
}

fn tagged(front: &str, tags: &[&str]) -> NewFlashcard {
  NewFlashcard {
    tags: tags.iter().map(|t| t.to_string()).collect(),
    ..NewFlashcard::new(front, format!("back of {front}"))
  }
}

// ─── Flashcards ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_flashcard() {
  let s = store().await;
  let card = s
    .create_flashcard(tagged("la mesa", &["spanish"]))
    .await
    .unwrap();

  let fetched = s.get_flashcard(card.flashcard_id).await.unwrap().unwrap();
  assert_eq!(fetched, card);
  assert_eq!(fetched.tags, vec!["spanish".to_string()]);
}

#[tokio::test]
async fn get_flashcard_missing_returns_none() {
  let s = store().await;
  assert!(s.get_flashcard(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn list_flashcards_filters_by_tag_and_pages() {
  let s = store().await;
  s.create_flashcard(tagged("uno", &["spanish", "numbers"]))
    .await
    .unwrap();
  s.create_flashcard(tagged("eins", &["german", "numbers"]))
    .await
    .unwrap();
  s.create_flashcard(tagged("der Tisch", &["german"]))
    .await
    .unwrap();

  let all = s.list_flashcards(&FlashcardQuery::default()).await.unwrap();
  assert_eq!(all.len(), 3);

  let german = s
    .list_flashcards(&FlashcardQuery {
      tag: Some("german".into()),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(german.len(), 2);
  assert!(german.iter().all(|c| c.tags.contains(&"german".to_string())));

  let page = s
    .list_flashcards(&FlashcardQuery {
      limit: Some(2),
      offset: Some(2),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(page.len(), 1);
}

#[tokio::test]
async fn update_flashcard_applies_patch() {
  let s = store().await;
  let card = s.create_flashcard(NewFlashcard::new("q", "a")).await.unwrap();

  let updated = s
    .update_flashcard(card.flashcard_id, FlashcardPatch {
      back: Some("answer".into()),
      ..Default::default()
    })
    .await
    .unwrap()
    .unwrap();
  assert_eq!(updated.front, "q");
  assert_eq!(updated.back, "answer");

  let fetched = s.get_flashcard(card.flashcard_id).await.unwrap().unwrap();
  assert_eq!(fetched.back, "answer");

  let missing = s
    .update_flashcard(Uuid::new_v4(), FlashcardPatch::default())
    .await
    .unwrap();
  assert!(missing.is_none());
}

#[tokio::test]
async fn delete_flashcard_cascades_to_card_states() {
  let s = store().await;
  let card = s.create_flashcard(NewFlashcard::new("q", "a")).await.unwrap();
  let state = CardState::new("alice", card.flashcard_id, t0());
  s.put_card_state(state, None).await.unwrap();

  assert!(s.delete_flashcard(card.flashcard_id).await.unwrap());
  assert!(!s.delete_flashcard(card.flashcard_id).await.unwrap());
  assert!(
    s.get_card_state("alice", card.flashcard_id)
      .await
      .unwrap()
      .is_none()
  );
}

// ─── Card states ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_and_read_back_card_state() {
  let s = store().await;
  let card = s.create_flashcard(NewFlashcard::new("q", "a")).await.unwrap();

  let state = CardState::new_sm2("alice", card.flashcard_id, t0());
  let saved = s.put_card_state(state.clone(), None).await.unwrap();
  assert_eq!(saved.version, 1);

  let fetched = s
    .get_card_state("alice", card.flashcard_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(fetched.version, 1);
  assert_eq!(fetched.algorithm(), Algorithm::Sm2);
  assert_eq!(fetched, CardState { version: 1, ..state });

  assert!(
    s.get_card_state("bob", card.flashcard_id)
      .await
      .unwrap()
      .is_none()
  );
}

#[tokio::test]
async fn card_state_for_missing_flashcard_is_rejected() {
  let s = store().await;
  let state = CardState::new("alice", Uuid::new_v4(), t0());
  let err = s.put_card_state(state, None).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Core(mnemo_core::Error::FlashcardNotFound(_))
  ));
}

#[tokio::test]
async fn reviews_round_trip_with_their_ledger() {
  let s = store().await;
  let scheduler = Scheduler::default();
  let card = s.create_flashcard(NewFlashcard::new("q", "a")).await.unwrap();

  let mut state = s
    .put_card_state(CardState::new("alice", card.flashcard_id, t0()), None)
    .await
    .unwrap();
  let mut now = t0();
  for rating in [Rating::Good, Rating::Good, Rating::Again, Rating::Good] {
    let input = ReviewInput::new(rating).with_response_time(1500);
    let next = scheduler.process_review(&state, &input, now).unwrap();
    state = s.put_card_state(next, Some(state.version)).await.unwrap();
    now = state.next_review_date;
  }

  let fetched = s
    .get_card_state("alice", card.flashcard_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(fetched, state);
  assert_eq!(fetched.version, 5);
  assert_eq!(fetched.review_history.len(), 4);
  assert_eq!(fetched.review_history[2].rating, Rating::Again.value());
  assert!(matches!(fetched.memory, MemoryModel::Fsrs(_)));
}

#[tokio::test]
async fn stale_version_is_a_conflict() {
  let s = store().await;
  let scheduler = Scheduler::default();
  let card = s.create_flashcard(NewFlashcard::new("q", "a")).await.unwrap();
  let base = s
    .put_card_state(CardState::new("alice", card.flashcard_id, t0()), None)
    .await
    .unwrap();

  let first = scheduler
    .process_review(&base, &ReviewInput::new(Rating::Good), t0())
    .unwrap();
  let second = scheduler
    .process_review(&base, &ReviewInput::new(Rating::Again), t0())
    .unwrap();

  s.put_card_state(first, Some(base.version)).await.unwrap();
  let err = s
    .put_card_state(second, Some(base.version))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(mnemo_core::Error::VersionConflict { expected: 1, .. })
  ));

  let stored = s
    .get_card_state("alice", card.flashcard_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(stored.version, 2);
  assert_eq!(stored.review_history.len(), 1);
  assert_eq!(stored.last_rating, Some(Rating::Good.value()));
}

#[tokio::test]
async fn double_insert_is_a_conflict() {
  let s = store().await;
  let card = s.create_flashcard(NewFlashcard::new("q", "a")).await.unwrap();
  let state = CardState::new("alice", card.flashcard_id, t0());

  s.put_card_state(state.clone(), None).await.unwrap();
  let err = s.put_card_state(state, None).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Core(mnemo_core::Error::VersionConflict { .. })
  ));
}

#[tokio::test]
async fn due_queue_skips_suspended_and_future_cards() {
  let s = store().await;
  let mut ids = Vec::new();
  for (i, offset) in [-3i64, -1, 2, -2].into_iter().enumerate() {
    let card = s
      .create_flashcard(NewFlashcard::new(format!("q{i}"), "a"))
      .await
      .unwrap();
    let mut state = CardState::new("alice", card.flashcard_id, t0());
    state.next_review_date = t0() + Duration::days(offset);
    if i == 3 {
      state = suspend(&state, true);
    }
    s.put_card_state(state, None).await.unwrap();
    ids.push(card.flashcard_id);
  }

  let due = s.due_card_states("alice", t0(), None).await.unwrap();
  let due_ids: Vec<Uuid> = due.iter().map(|c| c.flashcard_id).collect();
  assert_eq!(due_ids, vec![ids[0], ids[1]]);

  let limited = s.due_card_states("alice", t0(), Some(1)).await.unwrap();
  assert_eq!(limited.len(), 1);
  assert_eq!(limited[0].flashcard_id, ids[0]);

  assert_eq!(s.list_card_states("alice").await.unwrap().len(), 4);
  assert!(s.list_card_states("bob").await.unwrap().is_empty());
}

#[tokio::test]
async fn reset_keeps_the_stored_ledger() {
  let s = store().await;
  let scheduler = Scheduler::default();
  let card = s.create_flashcard(NewFlashcard::new("q", "a")).await.unwrap();
  let state = s
    .put_card_state(CardState::new("alice", card.flashcard_id, t0()), None)
    .await
    .unwrap();
  let reviewed = scheduler
    .process_review(&state, &ReviewInput::new(Rating::Easy), t0())
    .unwrap();
  let reviewed = s.put_card_state(reviewed, Some(1)).await.unwrap();

  let later = t0() + Duration::days(2);
  let fresh = s
    .put_card_state(reset(&reviewed, later), Some(reviewed.version))
    .await
    .unwrap();

  let fetched = s
    .get_card_state("alice", card.flashcard_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(fetched, fresh);
  assert_eq!(fetched.state, CardStatus::New);
  assert_eq!(fetched.next_review_date, later);
  assert_eq!(fetched.review_history.len(), 1);
}
