//! Handlers for `/flashcards` endpoints.
//!
//! | Method   | Path               | Notes |
//! |----------|--------------------|-------|
//! | `GET`    | `/flashcards`      | Optional `?tag=`, `limit`, `offset` |
//! | `POST`   | `/flashcards`      | Body: `{"front":"…","back":"…","tags":[…]}` |
//! | `GET`    | `/flashcards/{id}` | 404 if not found |
//! | `PUT`    | `/flashcards/{id}` | Partial update of `front`, `back`, `tags` |
//! | `DELETE` | `/flashcards/{id}` | Also removes every card state for it |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use mnemo_core::{
  flashcard::{Flashcard, FlashcardPatch, NewFlashcard},
  store::{CardStore, FlashcardQuery},
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub tag:    Option<String>,
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

/// `GET /flashcards`
pub async fn list<S>(
  State(state): State<ApiState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Flashcard>>, ApiError>
where
  S: CardStore,
{
  let query = FlashcardQuery {
    tag:    params.tag,
    limit:  params.limit,
    offset: params.offset,
  };
  let cards = state
    .store
    .list_flashcards(&query)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(cards))
}

/// `POST /flashcards`
pub async fn create<S>(
  State(state): State<ApiState<S>>,
  Json(body): Json<NewFlashcard>,
) -> Result<impl IntoResponse, ApiError>
where
  S: CardStore,
{
  if body.front.trim().is_empty() || body.back.trim().is_empty() {
    return Err(ApiError::BadRequest(
      "front and back must not be empty".into(),
    ));
  }
  let card = state
    .store
    .create_flashcard(body)
    .await
    .map_err(ApiError::store)?;
  info!(flashcard_id = %card.flashcard_id, "created flashcard");
  Ok((StatusCode::CREATED, Json(card)))
}

/// `GET /flashcards/{id}`
pub async fn get_one<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Flashcard>, ApiError>
where
  S: CardStore,
{
  let card = state
    .store
    .get_flashcard(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("flashcard {id} not found")))?;
  Ok(Json(card))
}

/// `PUT /flashcards/{id}`
pub async fn update<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
  Json(patch): Json<FlashcardPatch>,
) -> Result<Json<Flashcard>, ApiError>
where
  S: CardStore,
{
  let card = state
    .store
    .update_flashcard(id, patch)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("flashcard {id} not found")))?;
  Ok(Json(card))
}

/// `DELETE /flashcards/{id}`
pub async fn delete_one<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: CardStore,
{
  let deleted = state
    .store
    .delete_flashcard(id)
    .await
    .map_err(ApiError::store)?;
  if !deleted {
    return Err(ApiError::NotFound(format!("flashcard {id} not found")));
  }
  info!(flashcard_id = %id, "deleted flashcard");
  Ok(StatusCode::NO_CONTENT)
}
