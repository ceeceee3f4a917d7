//! Handlers for per-user card-state endpoints.
//!
//! All single-card routes live under `/users/{user}/cards/{flashcard}`.
//! Reads return the state's ETag; writes honour `If-Match` and are persisted
//! with compare-and-swap, so a concurrent write surfaces as `409 Conflict`
//! instead of being silently overwritten.

use axum::{
  Json,
  extract::{Path, Query, State},
  http::{HeaderMap, header},
  response::{IntoResponse, Response},
};
use chrono::Utc;
use mnemo_core::{
  Error as CoreError,
  card::{Algorithm, CardState},
  ledger::{LedgerSummary, ReviewEntry},
  selector::{self, Preview, ReviewInput},
  store::CardStore,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
  ApiState,
  error::ApiError,
  etag::{card_etag, check_if_match},
};

type CardPath = Path<(String, Uuid)>;

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn with_etag(state: CardState) -> Response {
  let etag = card_etag(&state);
  ([(header::ETAG, etag)], Json(state)).into_response()
}

async fn find<S: CardStore>(
  store: &S,
  user: &str,
  flashcard: Uuid,
) -> Result<Option<CardState>, ApiError> {
  store
    .get_card_state(user, flashcard)
    .await
    .map_err(ApiError::store)
}

async fn load<S: CardStore>(
  store: &S,
  user: &str,
  flashcard: Uuid,
) -> Result<CardState, ApiError> {
  find(store, user, flashcard).await?.ok_or_else(|| {
    CoreError::CardNotFound {
      user_id:      user.to_owned(),
      flashcard_id: flashcard,
    }
    .into()
  })
}

/// The stored state, or a fresh FSRS state that has not been persisted yet.
/// Fails if the flashcard itself does not exist.
async fn load_or_new<S: CardStore>(
  store: &S,
  user: &str,
  flashcard: Uuid,
) -> Result<(CardState, Option<u64>), ApiError> {
  if let Some(state) = find(store, user, flashcard).await? {
    let version = state.version;
    return Ok((state, Some(version)));
  }
  store
    .get_flashcard(flashcard)
    .await
    .map_err(ApiError::store)?
    .ok_or(CoreError::FlashcardNotFound(flashcard))?;
  Ok((CardState::new(user, flashcard, Utc::now()), None))
}

/// Apply `change` to the stored state and write it back.
async fn update<S, F>(
  store: &S,
  headers: &HeaderMap,
  user: &str,
  flashcard: Uuid,
  change: F,
) -> Result<Response, ApiError>
where
  S: CardStore,
  F: FnOnce(&CardState) -> CardState,
{
  let current = load(store, user, flashcard).await?;
  check_if_match(headers, Some(&current))?;
  let next = change(&current);
  let saved = store
    .put_card_state(next, Some(current.version))
    .await
    .map_err(ApiError::store)?;
  Ok(with_etag(saved))
}

// ─── Collections ─────────────────────────────────────────────────────────────

/// `GET /users/{user}/cards`
pub async fn list<S>(
  State(state): State<ApiState<S>>,
  Path(user): Path<String>,
) -> Result<Json<Vec<CardState>>, ApiError>
where
  S: CardStore,
{
  let cards = state
    .store
    .list_card_states(&user)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(cards))
}

#[derive(Debug, Deserialize)]
pub struct DueParams {
  pub limit: Option<usize>,
}

/// `GET /users/{user}/due[?limit=n]`
pub async fn due<S>(
  State(state): State<ApiState<S>>,
  Path(user): Path<String>,
  Query(params): Query<DueParams>,
) -> Result<Json<Vec<CardState>>, ApiError>
where
  S: CardStore,
{
  let cards = state
    .store
    .due_card_states(&user, Utc::now(), params.limit)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(cards))
}

// ─── Single card ─────────────────────────────────────────────────────────────

/// `GET /users/{user}/cards/{flashcard}`
pub async fn get_one<S>(
  State(state): State<ApiState<S>>,
  Path((user, flashcard)): CardPath,
) -> Result<Response, ApiError>
where
  S: CardStore,
{
  let card = load(state.store.as_ref(), &user, flashcard).await?;
  Ok(with_etag(card))
}

/// `POST /users/{user}/cards/{flashcard}/review`
///
/// Creates a default FSRS state on the first review of a flashcard. The
/// rating is validated before anything is written.
pub async fn review<S>(
  State(state): State<ApiState<S>>,
  Path((user, flashcard)): CardPath,
  headers: HeaderMap,
  Json(input): Json<ReviewInput>,
) -> Result<Response, ApiError>
where
  S: CardStore,
{
  let store = state.store.as_ref();
  let (current, version) = load_or_new(store, &user, flashcard).await?;
  check_if_match(&headers, version.map(|_| &current))?;

  let next = state
    .scheduler
    .process_review(&current, &input, Utc::now())?;
  let saved = store
    .put_card_state(next, version)
    .await
    .map_err(ApiError::store)?;

  info!(
    user_id = %user,
    flashcard_id = %flashcard,
    rating = input.rating,
    legacy = input.legacy,
    algorithm = %saved.algorithm(),
    state = %saved.state,
    next_review = %saved.next_review_date,
    "processed review"
  );
  Ok(with_etag(saved))
}

/// `GET /users/{user}/cards/{flashcard}/preview`
pub async fn preview<S>(
  State(state): State<ApiState<S>>,
  Path((user, flashcard)): CardPath,
) -> Result<Json<Preview>, ApiError>
where
  S: CardStore,
{
  let (card, _) = load_or_new(state.store.as_ref(), &user, flashcard).await?;
  Ok(Json(state.scheduler.preview(&card, Utc::now())))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Retrievability {
  pub algorithm:      Algorithm,
  pub retrievability: f64,
}

/// `GET /users/{user}/cards/{flashcard}/retrievability`
pub async fn retrievability<S>(
  State(state): State<ApiState<S>>,
  Path((user, flashcard)): CardPath,
) -> Result<Json<Retrievability>, ApiError>
where
  S: CardStore,
{
  let (card, _) = load_or_new(state.store.as_ref(), &user, flashcard).await?;
  Ok(Json(Retrievability {
    algorithm:      card.algorithm(),
    retrievability: state.scheduler.retrievability(&card, Utc::now()),
  }))
}

/// `POST /users/{user}/cards/{flashcard}/migrate`
///
/// Migrating a card that FSRS already owns succeeds without writing.
pub async fn migrate<S>(
  State(state): State<ApiState<S>>,
  Path((user, flashcard)): CardPath,
  headers: HeaderMap,
) -> Result<Response, ApiError>
where
  S: CardStore,
{
  let store = state.store.as_ref();
  let current = load(store, &user, flashcard).await?;
  check_if_match(&headers, Some(&current))?;

  match selector::try_migrate(&current) {
    Ok(next) => {
      let saved = store
        .put_card_state(next, Some(current.version))
        .await
        .map_err(ApiError::store)?;
      Ok(with_etag(saved))
    }
    Err(CoreError::AlreadyMigrated(_)) => Ok(with_etag(current)),
    Err(e) => Err(e.into()),
  }
}

/// `POST /users/{user}/cards/{flashcard}/reset`
pub async fn reset<S>(
  State(state): State<ApiState<S>>,
  Path((user, flashcard)): CardPath,
  headers: HeaderMap,
) -> Result<Response, ApiError>
where
  S: CardStore,
{
  let now = Utc::now();
  update(state.store.as_ref(), &headers, &user, flashcard, |card| {
    selector::reset(card, now)
  })
  .await
}

/// `POST /users/{user}/cards/{flashcard}/suspend`
pub async fn suspend<S>(
  State(state): State<ApiState<S>>,
  Path((user, flashcard)): CardPath,
  headers: HeaderMap,
) -> Result<Response, ApiError>
where
  S: CardStore,
{
  update(state.store.as_ref(), &headers, &user, flashcard, |card| {
    selector::suspend(card, true)
  })
  .await
}

/// `POST /users/{user}/cards/{flashcard}/unsuspend`
pub async fn unsuspend<S>(
  State(state): State<ApiState<S>>,
  Path((user, flashcard)): CardPath,
  headers: HeaderMap,
) -> Result<Response, ApiError>
where
  S: CardStore,
{
  update(state.store.as_ref(), &headers, &user, flashcard, |card| {
    selector::suspend(card, false)
  })
  .await
}

#[derive(Debug, Serialize, Deserialize)]
pub struct History {
  pub summary: LedgerSummary,
  pub entries: Vec<ReviewEntry>,
}

/// `GET /users/{user}/cards/{flashcard}/history`
pub async fn history<S>(
  State(state): State<ApiState<S>>,
  Path((user, flashcard)): CardPath,
) -> Result<Json<History>, ApiError>
where
  S: CardStore,
{
  let card = load(state.store.as_ref(), &user, flashcard).await?;
  Ok(Json(History {
    summary: LedgerSummary::from_entries(&card.review_history),
    entries: card.review_history,
  }))
}
