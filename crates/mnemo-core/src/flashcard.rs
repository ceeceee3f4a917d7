//! Flashcard documents, the content that card states schedule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A question/answer pair. Scheduling lives in per-user
/// [`CardState`](crate::card::CardState)s, never on the flashcard itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
  pub flashcard_id: Uuid,
  pub front:        String,
  pub back:         String,
  pub tags:         Vec<String>,
  pub created_at:   DateTime<Utc>,
  pub updated_at:   DateTime<Utc>,
}

/// Input to [`crate::store::CardStore::create_flashcard`]. Identity and
/// timestamps are assigned by the store.
#[derive(Debug, Clone, Deserialize)]
pub struct NewFlashcard {
  pub front: String,
  pub back:  String,
  #[serde(default)]
  pub tags:  Vec<String>,
}

impl NewFlashcard {
  pub fn new(front: impl Into<String>, back: impl Into<String>) -> Self {
    Self {
      front: front.into(),
      back:  back.into(),
      tags:  Vec::new(),
    }
  }
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlashcardPatch {
  pub front: Option<String>,
  pub back:  Option<String>,
  pub tags:  Option<Vec<String>>,
}

impl FlashcardPatch {
  /// Apply the patch, bumping `updated_at` when anything changed.
  pub fn apply(self, card: &mut Flashcard, now: DateTime<Utc>) {
    let mut changed = false;
    if let Some(front) = self.front {
      card.front = front;
      changed = true;
    }
    if let Some(back) = self.back {
      card.back = back;
      changed = true;
    }
    if let Some(tags) = self.tags {
      card.tags = tags;
      changed = true;
    }
    if changed {
      card.updated_at = now;
    }
  }
}
