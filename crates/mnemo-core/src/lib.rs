//! Core types and scheduling for the Mnemo flashcard backend.
//!
//! This crate has no HTTP or database dependencies. It holds the card-state
//! data model, the SM-2 and FSRS schedulers, the algorithm selector that
//! dispatches between them, the review ledger, and the [`store::CardStore`]
//! trait that storage backends implement.

// Native `async fn` in traits; the `Send` bounds are spelled out on the
// returned futures instead.
#![allow(async_fn_in_trait)]

pub mod card;
pub mod error;
pub mod flashcard;
pub mod fsrs;
pub mod ledger;
pub mod rating;
pub mod selector;
pub mod sm2;
pub mod store;

pub use error::{Error, Result};
