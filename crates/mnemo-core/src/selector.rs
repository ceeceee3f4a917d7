//! Algorithm selection: routes a review to whichever scheduler owns the card,
//! and hosts the card-level operations that are not reviews (preview,
//! migration, reset, suspension).
//!
//! Every operation takes the current [`CardState`] by reference and returns a
//! new value. Inputs are validated before anything is computed, so a rejected
//! review leaves the caller's state exactly as it was.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
  Error, Result,
  card::{
    Algorithm, CardState, CardStatus, FsrsMemory, FsrsState, MemoryModel,
    Sm2Memory, due_after,
  },
  fsrs::{Fsrs, FsrsCard, FsrsParameters},
  ledger::ReviewEntry,
  rating::{Quality, Rating},
  sm2,
};

/// FSRS review cards above both thresholds are displayed as mastered.
const MASTERED_STABILITY: f64 = 30.0;
const MASTERED_SCHEDULED_DAYS: u32 = 21;

// ─── Input / output types ────────────────────────────────────────────────────

/// One rating event as submitted by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewInput {
  /// An FSRS button (`1..=4`), or an SM-2 quality (`0..=5`) when `legacy` is
  /// set. Kept as a raw number so non-integers can be rejected explicitly.
  pub rating:           f64,
  #[serde(default)]
  pub response_time_ms: Option<u32>,
  /// The rating is on the legacy 0–5 quality scale.
  #[serde(default)]
  pub legacy:           bool,
}

impl ReviewInput {
  pub fn new(rating: Rating) -> Self {
    Self {
      rating:           rating.as_f64(),
      response_time_ms: None,
      legacy:           false,
    }
  }

  pub fn legacy(quality: u8) -> Self {
    Self {
      rating:           f64::from(quality),
      response_time_ms: None,
      legacy:           true,
    }
  }

  pub fn with_response_time(mut self, ms: u32) -> Self {
    self.response_time_ms = Some(ms);
    self
  }
}

/// What would happen if the card were rated one particular way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewOutcome {
  pub scheduled_days: u32,
  pub due:            DateTime<Utc>,
  pub state:          CardStatus,
}

/// The outcome of each of the four buttons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preview {
  pub algorithm: Algorithm,
  pub again:     PreviewOutcome,
  pub hard:      PreviewOutcome,
  pub good:      PreviewOutcome,
  pub easy:      PreviewOutcome,
}

// ─── Scheduler ───────────────────────────────────────────────────────────────

/// Dispatches reviews between SM-2 and FSRS. Shares one immutable FSRS
/// parameter set across every card it handles.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
  fsrs: Fsrs,
}

impl Scheduler {
  pub fn new(params: FsrsParameters) -> Result<Self> {
    Ok(Self {
      fsrs: Fsrs::new(params)?,
    })
  }

  pub fn fsrs(&self) -> &Fsrs { &self.fsrs }

  /// Apply one review to `card`. Returns the complete new state, including
  /// its appended ledger entry, or an error with nothing computed.
  pub fn process_review(
    &self,
    card: &CardState,
    input: &ReviewInput,
    now: DateTime<Utc>,
  ) -> Result<CardState> {
    let next = match &card.memory {
      MemoryModel::Sm2(memory) => {
        let quality = if input.legacy {
          Quality::from_raw(input.rating)?
        } else {
          Rating::from_raw(input.rating)?.to_quality()
        };
        sm2::review(card, memory, quality, input.response_time_ms, now)
      }
      MemoryModel::Fsrs(memory) => {
        let rating = if input.legacy {
          Rating::from_quality(Quality::from_raw(input.rating)?)
        } else {
          Rating::from_raw(input.rating)?
        };
        self.review_fsrs(card, memory, rating, input.response_time_ms, now)
      }
    };
    Ok(next)
  }

  fn review_fsrs(
    &self,
    card: &CardState,
    memory: &FsrsMemory,
    rating: Rating,
    response_time_ms: Option<u32>,
    now: DateTime<Utc>,
  ) -> CardState {
    let after = self.fsrs.next(&FsrsCard::from_state(card, memory), now, rating);

    let mut next = card.clone();
    next.memory = MemoryModel::Fsrs(after.memory());
    next.lapses = after.lapses;
    next.next_review_date = after.due;
    next.state = display_state(&after);

    next.record(ReviewEntry {
      timestamp: now,
      rating: rating.value(),
      response_time_ms,
      interval_before: memory.scheduled_days,
      interval_after: after.scheduled_days,
      algorithm: Algorithm::Fsrs,
      correct: rating.is_correct(),
    });
    next
  }

  /// The outcome of every button at `now`. Never mutates `card`.
  pub fn preview(&self, card: &CardState, now: DateTime<Utc>) -> Preview {
    let outcome = |rating: Rating| match &card.memory {
      MemoryModel::Sm2(memory) => {
        let out = sm2::schedule(memory, card.state, rating.to_quality());
        PreviewOutcome {
          scheduled_days: out.memory.interval,
          due:            due_after(
            now,
            Duration::days(i64::from(out.memory.interval)),
          ),
          state:          out.status,
        }
      }
      MemoryModel::Fsrs(memory) => {
        let after =
          self
            .fsrs
            .next(&FsrsCard::from_state(card, memory), now, rating);
        PreviewOutcome {
          scheduled_days: after.scheduled_days,
          due:            after.due,
          state:          display_state(&after),
        }
      }
    };

    Preview {
      algorithm: card.algorithm(),
      again:     outcome(Rating::Again),
      hard:      outcome(Rating::Hard),
      good:      outcome(Rating::Good),
      easy:      outcome(Rating::Easy),
    }
  }

  /// Modelled probability of recall at `now`. SM-2 has no forgetting curve,
  /// so SM-2 cards report `0`.
  pub fn retrievability(&self, card: &CardState, now: DateTime<Utc>) -> f64 {
    match &card.memory {
      MemoryModel::Fsrs(memory) => self
        .fsrs
        .retrievability(&FsrsCard::from_state(card, memory), now),
      MemoryModel::Sm2(_) => 0.0,
    }
  }
}

fn display_state(card: &FsrsCard) -> CardStatus {
  if card.state == FsrsState::Review
    && card.stability > MASTERED_STABILITY
    && card.scheduled_days > MASTERED_SCHEDULED_DAYS
  {
    CardStatus::Mastered
  } else {
    card.state.into()
  }
}

// ─── Card-level operations ───────────────────────────────────────────────────

/// Convert an SM-2 card to FSRS, or fail with [`Error::AlreadyMigrated`].
///
/// The conversion is a heuristic bridge rather than a fitted model: the SM-2
/// interval is reused as the stability estimate and the easiness factor is
/// remapped linearly onto difficulty (EF 1.3 → 10, EF 2.5 → 1).
pub fn try_migrate(card: &CardState) -> Result<CardState> {
  let MemoryModel::Sm2(sm2) = &card.memory else {
    return Err(Error::AlreadyMigrated(card.flashcard_id));
  };

  let span = Sm2Memory::INITIAL_EASINESS - Sm2Memory::MIN_EASINESS;
  let difficulty = (10.0
    - (sm2.easiness_factor - Sm2Memory::MIN_EASINESS) / span * 9.0)
    .round()
    .clamp(1.0, 10.0);
  let memory = FsrsMemory {
    stability: f64::from(sm2.interval),
    difficulty,
    elapsed_days: 0,
    scheduled_days: sm2.interval,
    learning_steps: 0,
    state: card.state.into(),
  };

  info!(
    user_id = %card.user_id,
    flashcard_id = %card.flashcard_id,
    easiness = sm2.easiness_factor,
    difficulty,
    stability = memory.stability,
    "migrated card from sm2 to fsrs"
  );

  let mut next = card.clone();
  next.memory = MemoryModel::Fsrs(memory);
  Ok(next)
}

/// Like [`try_migrate`], but an FSRS card comes back unchanged.
pub fn migrate(card: &CardState) -> CardState {
  try_migrate(card).unwrap_or_else(|_| card.clone())
}

/// Start the card over under its current algorithm. Counters, lapses and the
/// ledger are history and survive the reset.
pub fn reset(card: &CardState, now: DateTime<Utc>) -> CardState {
  let mut next = card.clone();
  next.memory = match card.memory {
    MemoryModel::Sm2(_) => MemoryModel::Sm2(Sm2Memory::default()),
    MemoryModel::Fsrs(_) => MemoryModel::Fsrs(FsrsMemory::default()),
  };
  next.state = CardStatus::New;
  next.next_review_date = now;
  next
}

pub fn suspend(card: &CardState, suspended: bool) -> CardState {
  let mut next = card.clone();
  next.is_suspended = suspended;
  next
}
