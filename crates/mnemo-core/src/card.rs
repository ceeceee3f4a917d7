//! Card state: the per-user, per-flashcard scheduling record.
//!
//! A card state is pure data. Exactly one algorithm owns it at a time, which
//! is encoded in [`MemoryModel`]: the SM-2 and FSRS fields live in separate
//! variants so a card can never carry a half-populated mix of both.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::ledger::ReviewEntry;

/// Longest interval either scheduler hands out, in days.
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

/// `now + delay`, saturating at the end of the representable range.
pub(crate) fn due_after(
  now: DateTime<Utc>,
  delay: Duration,
) -> DateTime<Utc> {
  now.checked_add_signed(delay).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

// ─── Enums ───────────────────────────────────────────────────────────────────

/// Which scheduler owns a card.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Algorithm {
  Sm2,
  Fsrs,
}

/// The FSRS learning phase.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FsrsState {
  #[default]
  New,
  Learning,
  Review,
  Relearning,
}

/// The display state shown to users, shared by both algorithms.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CardStatus {
  #[default]
  New,
  Learning,
  Review,
  Relearning,
  Mastered,
}

impl From<FsrsState> for CardStatus {
  fn from(s: FsrsState) -> Self {
    match s {
      FsrsState::New => Self::New,
      FsrsState::Learning => Self::Learning,
      FsrsState::Review => Self::Review,
      FsrsState::Relearning => Self::Relearning,
    }
  }
}

impl From<CardStatus> for FsrsState {
  /// `Mastered` is a display-only refinement of `Review`.
  fn from(s: CardStatus) -> Self {
    match s {
      CardStatus::New => Self::New,
      CardStatus::Learning => Self::Learning,
      CardStatus::Review | CardStatus::Mastered => Self::Review,
      CardStatus::Relearning => Self::Relearning,
    }
  }
}

// ─── Memory models ───────────────────────────────────────────────────────────

/// SM-2 scheduling fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sm2Memory {
  /// Never below [`Sm2Memory::MIN_EASINESS`].
  pub easiness_factor: f64,
  /// Consecutive correct answers.
  pub repetitions:     u32,
  /// Current interval in days.
  pub interval:        u32,
}

impl Sm2Memory {
  pub const INITIAL_EASINESS: f64 = 2.5;
  pub const MIN_EASINESS: f64 = 1.3;
}

impl Default for Sm2Memory {
  fn default() -> Self {
    Self {
      easiness_factor: Self::INITIAL_EASINESS,
      repetitions:     0,
      interval:        0,
    }
  }
}

/// FSRS scheduling fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FsrsMemory {
  /// Days until recall probability decays to the target retention; `>= 0`.
  pub stability:      f64,
  /// In `[0, 10]`; `0` only before the first review.
  pub difficulty:     f64,
  /// Whole days between the last two reviews.
  pub elapsed_days:   u32,
  /// Days scheduled by the last review; `0` for short-term steps.
  pub scheduled_days: u32,
  /// Index into the current learning or relearning step list.
  pub learning_steps: u32,
  pub state:          FsrsState,
}

/// The algorithm-specific half of a card state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "lowercase")]
pub enum MemoryModel {
  Sm2(Sm2Memory),
  Fsrs(FsrsMemory),
}

impl MemoryModel {
  pub fn algorithm(&self) -> Algorithm {
    match self {
      Self::Sm2(_) => Algorithm::Sm2,
      Self::Fsrs(_) => Algorithm::Fsrs,
    }
  }

  /// The interval, in days, the owning algorithm last scheduled.
  pub fn scheduled_days(&self) -> u32 {
    match self {
      Self::Sm2(m) => m.interval,
      Self::Fsrs(m) => m.scheduled_days,
    }
  }
}

// ─── CardState ───────────────────────────────────────────────────────────────

/// Scheduling state for one `(user_id, flashcard_id)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardState {
  /// Opaque per-user key.
  pub user_id:                  String,
  pub flashcard_id:             Uuid,
  pub memory:                   MemoryModel,
  /// Only ever set by a review, a reset or initial creation.
  pub next_review_date:         DateTime<Utc>,
  pub last_review_date:         Option<DateTime<Utc>>,
  pub last_rating:              Option<u8>,
  pub total_reviews:            u32,
  pub correct_count:            u32,
  pub incorrect_count:          u32,
  pub average_response_time_ms: f64,
  /// Review → relearning regressions.
  pub lapses:                   u32,
  pub is_suspended:             bool,
  pub state:                    CardStatus,
  /// Append-only; one entry per processed review.
  pub review_history:           Vec<ReviewEntry>,
  /// Optimistic-concurrency counter, bumped by the store on every write.
  pub version:                  u64,
}

impl CardState {
  /// A fresh FSRS card in the `New` state, due immediately.
  pub fn new(
    user_id: impl Into<String>,
    flashcard_id: Uuid,
    now: DateTime<Utc>,
  ) -> Self {
    Self::with_memory(
      user_id,
      flashcard_id,
      MemoryModel::Fsrs(FsrsMemory::default()),
      now,
    )
  }

  /// A fresh card owned by the legacy SM-2 scheduler.
  pub fn new_sm2(
    user_id: impl Into<String>,
    flashcard_id: Uuid,
    now: DateTime<Utc>,
  ) -> Self {
    Self::with_memory(
      user_id,
      flashcard_id,
      MemoryModel::Sm2(Sm2Memory::default()),
      now,
    )
  }

  fn with_memory(
    user_id: impl Into<String>,
    flashcard_id: Uuid,
    memory: MemoryModel,
    now: DateTime<Utc>,
  ) -> Self {
    Self {
      user_id: user_id.into(),
      flashcard_id,
      memory,
      next_review_date: now,
      last_review_date: None,
      last_rating: None,
      total_reviews: 0,
      correct_count: 0,
      incorrect_count: 0,
      average_response_time_ms: 0.0,
      lapses: 0,
      is_suspended: false,
      state: CardStatus::New,
      review_history: Vec::new(),
      version: 0,
    }
  }

  pub fn algorithm(&self) -> Algorithm { self.memory.algorithm() }

  /// Due cards are not suspended and have reached their review date.
  pub fn is_due(&self, now: DateTime<Utc>) -> bool {
    !self.is_suspended && self.next_review_date <= now
  }

  /// Fold a completed ledger entry into the counters and append it.
  pub(crate) fn record(&mut self, entry: ReviewEntry) {
    self.total_reviews += 1;
    if entry.correct {
      self.correct_count += 1;
    } else {
      self.incorrect_count += 1;
    }

    if let Some(rt) = entry.response_time_ms {
      let timed = self
        .review_history
        .iter()
        .filter(|e| e.response_time_ms.is_some())
        .count();
      let n = (timed + 1) as f64;
      self.average_response_time_ms =
        (self.average_response_time_ms * (n - 1.0) + f64::from(rt)) / n;
    }

    self.last_review_date = Some(entry.timestamp);
    self.last_rating = Some(entry.rating);
    self.review_history.push(entry);
  }
}
