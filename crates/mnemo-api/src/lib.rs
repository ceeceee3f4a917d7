//! JSON REST API for Mnemo.
//!
//! Exposes an axum [`Router`] backed by any [`mnemo_core::store::CardStore`]
//! and a shared [`Scheduler`]. Auth, TLS and transport concerns are the
//! caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", mnemo_api::api_router(store.clone(), scheduler.clone()))
//! ```

pub mod cards;
pub mod error;
pub mod etag;
pub mod flashcards;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use mnemo_core::{selector::Scheduler, store::CardStore};

pub use error::ApiError;

/// Shared state threaded through all handlers.
pub struct ApiState<S> {
  pub store:     Arc<S>,
  pub scheduler: Arc<Scheduler>,
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self {
      store:     Arc::clone(&self.store),
      scheduler: Arc::clone(&self.scheduler),
    }
  }
}

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>, scheduler: Arc<Scheduler>) -> Router<()>
where
  S: CardStore + 'static,
{
  Router::new()
    // Flashcards
    .route(
      "/flashcards",
      get(flashcards::list::<S>).post(flashcards::create::<S>),
    )
    .route(
      "/flashcards/{id}",
      get(flashcards::get_one::<S>)
        .put(flashcards::update::<S>)
        .delete(flashcards::delete_one::<S>),
    )
    // Card states
    .route("/users/{user}/cards", get(cards::list::<S>))
    .route("/users/{user}/due", get(cards::due::<S>))
    .route("/users/{user}/cards/{flashcard}", get(cards::get_one::<S>))
    .route(
      "/users/{user}/cards/{flashcard}/review",
      post(cards::review::<S>),
    )
    .route(
      "/users/{user}/cards/{flashcard}/preview",
      get(cards::preview::<S>),
    )
    .route(
      "/users/{user}/cards/{flashcard}/retrievability",
      get(cards::retrievability::<S>),
    )
    .route(
      "/users/{user}/cards/{flashcard}/migrate",
      post(cards::migrate::<S>),
    )
    .route(
      "/users/{user}/cards/{flashcard}/reset",
      post(cards::reset::<S>),
    )
    .route(
      "/users/{user}/cards/{flashcard}/suspend",
      post(cards::suspend::<S>),
    )
    .route(
      "/users/{user}/cards/{flashcard}/unsuspend",
      post(cards::unsuspend::<S>),
    )
    .route(
      "/users/{user}/cards/{flashcard}/history",
      get(cards::history::<S>),
    )
    .with_state(ApiState { store, scheduler })
}
