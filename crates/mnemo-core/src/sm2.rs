//! SM-2 (SuperMemo 2), the legacy fixed-formula scheduler.
//!
//! Quality grades run from 0 (complete blackout) to 5 (perfect recall);
//! anything below 3 is a failure. The easiness factor moves by
//! `0.1 - (5 - q) * (0.08 + (5 - q) * 0.02)` after every review and is
//! floored at 1.3. Intervals are capped at
//! [`MAX_INTERVAL_DAYS`](crate::card::MAX_INTERVAL_DAYS).

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::{
  card::{
    Algorithm, CardState, CardStatus, MAX_INTERVAL_DAYS, MemoryModel,
    Sm2Memory, due_after,
  },
  ledger::ReviewEntry,
  rating::Quality,
};

/// Cards whose interval reaches this many days are shown as mastered.
pub const MASTERED_INTERVAL_DAYS: u32 = 21;

/// The result of applying one quality grade to an SM-2 memory.
#[derive(Debug, Clone, PartialEq)]
pub struct Sm2Outcome {
  pub memory: Sm2Memory,
  pub status: CardStatus,
  /// A review-phase card was failed.
  pub lapsed: bool,
}

/// Apply `quality` to `memory`. `status` is the card's display state before
/// the review.
pub fn schedule(
  memory: &Sm2Memory,
  status: CardStatus,
  quality: Quality,
) -> Sm2Outcome {
  let q = f64::from(quality.value());
  let mut next = memory.clone();
  let mut lapsed = false;

  let status = if quality.is_correct() {
    next.interval = match memory.repetitions {
      0 => 1,
      1 => 6,
      _ => (f64::from(memory.interval) * memory.easiness_factor)
        .round()
        .min(f64::from(MAX_INTERVAL_DAYS)) as u32,
    };
    next.repetitions += 1;
    if next.interval >= MASTERED_INTERVAL_DAYS {
      CardStatus::Mastered
    } else {
      CardStatus::Review
    }
  } else {
    next.repetitions = 0;
    next.interval = 1;
    if matches!(status, CardStatus::Review | CardStatus::Mastered) {
      lapsed = true;
      CardStatus::Relearning
    } else {
      CardStatus::Learning
    }
  };

  next.easiness_factor = (memory.easiness_factor
    + (0.1 - (5.0 - q) * (0.08 + (5.0 - q) * 0.02)))
    .max(Sm2Memory::MIN_EASINESS);

  Sm2Outcome {
    memory: next,
    status,
    lapsed,
  }
}

/// Process one SM-2 review of `card`, whose memory is `memory`, returning the
/// updated state with its ledger entry appended.
pub fn review(
  card: &CardState,
  memory: &Sm2Memory,
  quality: Quality,
  response_time_ms: Option<u32>,
  now: DateTime<Utc>,
) -> CardState {
  let outcome = schedule(memory, card.state, quality);
  debug!(
    flashcard_id = %card.flashcard_id,
    quality = quality.value(),
    interval_before = memory.interval,
    interval_after = outcome.memory.interval,
    easiness = outcome.memory.easiness_factor,
    status = %outcome.status,
    "sm2 review"
  );

  let mut next = card.clone();
  if outcome.lapsed {
    next.lapses += 1;
  }
  next.state = outcome.status;
  next.next_review_date =
    due_after(now, Duration::days(i64::from(outcome.memory.interval)));

  let entry = ReviewEntry {
    timestamp: now,
    rating: quality.value(),
    response_time_ms,
    interval_before: memory.interval,
    interval_after: outcome.memory.interval,
    algorithm: Algorithm::Sm2,
    correct: quality.is_correct(),
  };
  next.memory = MemoryModel::Sm2(outcome.memory);
  next.record(entry);
  next
}
