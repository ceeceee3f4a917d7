//! The FSRS state machine: New → Learning → Review ⇄ Relearning.
//!
//! [`Fsrs`] holds an immutable [`FsrsParameters`] set and maps a card plus a
//! rating to the card's next state. It never touches the caller's value, so
//! [`Fsrs::repeat`] can evaluate all four ratings side by side.

use chrono::{DateTime, Duration, Utc};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::algorithm::{
  DEFAULT_WEIGHTS, FUZZ_THRESHOLD_DAYS, MIN_STABILITY, WEIGHT_COUNT,
  forgetting_curve, fuzz_range, initial_difficulty, initial_stability,
  interval_modifier, next_difficulty, next_forget_stability,
  next_recall_stability, next_short_term_stability, short_term_forget_ceiling,
};
use crate::{
  Error, Result,
  card::{CardState, FsrsMemory, FsrsState, MAX_INTERVAL_DAYS, due_after},
  rating::Rating,
};

// ─── Parameters ──────────────────────────────────────────────────────────────

/// Global scheduler configuration. Immutable once handed to [`Fsrs::new`].
#[derive(Debug, Clone, PartialEq)]
pub struct FsrsParameters {
  /// Target probability of recall at the scheduled review, in `(0, 1)`.
  pub request_retention: f64,
  /// Upper bound on any scheduled interval, in days.
  pub maximum_interval:  u32,
  pub weights:           [f64; WEIGHT_COUNT],
  /// Spread computed intervals over a small window to avoid review clumps.
  pub enable_fuzz:       bool,
  /// Walk short learning/relearning steps before graduating.
  pub enable_short_term: bool,
  pub learning_steps:    Vec<Duration>,
  pub relearning_steps:  Vec<Duration>,
}

impl Default for FsrsParameters {
  fn default() -> Self {
    Self {
      request_retention: 0.9,
      maximum_interval:  365,
      weights:           DEFAULT_WEIGHTS,
      enable_fuzz:       true,
      enable_short_term: true,
      learning_steps:    vec![Duration::minutes(1), Duration::minutes(10)],
      relearning_steps:  vec![Duration::minutes(10)],
    }
  }
}

impl FsrsParameters {
  pub fn validate(&self) -> Result<()> {
    if !(self.request_retention > 0.0 && self.request_retention < 1.0) {
      return Err(Error::InvalidParameters(format!(
        "request_retention must be in (0, 1), got {}",
        self.request_retention
      )));
    }
    if !(1..=MAX_INTERVAL_DAYS).contains(&self.maximum_interval) {
      return Err(Error::InvalidParameters(format!(
        "maximum_interval must be between 1 and {MAX_INTERVAL_DAYS} days, got {}",
        self.maximum_interval
      )));
    }
    if self.weights.iter().any(|w| !w.is_finite()) {
      return Err(Error::InvalidParameters("weights must be finite".into()));
    }
    let longest = Duration::days(i64::from(MAX_INTERVAL_DAYS));
    let mut steps = self.learning_steps.iter().chain(&self.relearning_steps);
    if steps.any(|s| *s <= Duration::zero() || *s > longest) {
      return Err(Error::InvalidParameters(format!(
        "learning steps must be positive and at most {MAX_INTERVAL_DAYS} days"
      )));
    }
    Ok(())
  }
}

// ─── Model card ──────────────────────────────────────────────────────────────

/// The view of a card the FSRS model operates on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FsrsCard {
  pub due:            DateTime<Utc>,
  pub stability:      f64,
  pub difficulty:     f64,
  pub elapsed_days:   u32,
  pub scheduled_days: u32,
  pub learning_steps: u32,
  pub reps:           u32,
  pub lapses:         u32,
  pub state:          FsrsState,
  pub last_review:    Option<DateTime<Utc>>,
}

impl FsrsCard {
  pub fn from_state(card: &CardState, memory: &FsrsMemory) -> Self {
    Self {
      due:            card.next_review_date,
      stability:      memory.stability,
      difficulty:     memory.difficulty,
      elapsed_days:   memory.elapsed_days,
      scheduled_days: memory.scheduled_days,
      learning_steps: memory.learning_steps,
      reps:           card.total_reviews,
      lapses:         card.lapses,
      state:          memory.state,
      last_review:    card.last_review_date,
    }
  }

  pub fn memory(&self) -> FsrsMemory {
    FsrsMemory {
      stability:      self.stability,
      difficulty:     self.difficulty,
      elapsed_days:   self.elapsed_days,
      scheduled_days: self.scheduled_days,
      learning_steps: self.learning_steps,
      state:          self.state,
    }
  }
}

/// The outcome of every rating for one card at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextStates {
  pub again: FsrsCard,
  pub hard:  FsrsCard,
  pub good:  FsrsCard,
  pub easy:  FsrsCard,
}

impl NextStates {
  pub fn get(&self, rating: Rating) -> &FsrsCard {
    match rating {
      Rating::Again => &self.again,
      Rating::Hard => &self.hard,
      Rating::Good => &self.good,
      Rating::Easy => &self.easy,
    }
  }
}

// ─── Scheduler ───────────────────────────────────────────────────────────────

/// Where a learning-phase card lands after a rating.
enum Step {
  /// Stay in the learning phase at step `index`, due after `delay`.
  At { index: u32, delay: Duration },
  Graduate,
}

/// Per-call inputs shared by every rating.
#[derive(Clone, Copy)]
struct Review {
  elapsed_days: u32,
  seed:         u64,
}

/// An FSRS scheduler bound to one parameter set.
#[derive(Debug, Clone)]
pub struct Fsrs {
  params:            FsrsParameters,
  interval_modifier: f64,
}

impl Default for Fsrs {
  fn default() -> Self {
    let params = FsrsParameters::default();
    Self {
      interval_modifier: interval_modifier(params.request_retention),
      params,
    }
  }
}

impl Fsrs {
  pub fn new(params: FsrsParameters) -> Result<Self> {
    params.validate()?;
    Ok(Self {
      interval_modifier: interval_modifier(params.request_retention),
      params,
    })
  }

  pub fn parameters(&self) -> &FsrsParameters { &self.params }

  /// Schedule `card` as if it were rated `rating` at `now`.
  pub fn next(
    &self,
    card: &FsrsCard,
    now: DateTime<Utc>,
    rating: Rating,
  ) -> FsrsCard {
    let review = Review {
      elapsed_days: elapsed_whole_days(card.last_review, now),
      seed:         fuzz_seed(now, card),
    };

    let (mut next, short_delay) = match card.state {
      FsrsState::New | FsrsState::Learning | FsrsState::Relearning => {
        self.next_learning(card, rating, review)
      }
      FsrsState::Review => self.next_review(card, rating, review),
    };

    next.due = due_after(
      now,
      short_delay
        .unwrap_or_else(|| Duration::days(i64::from(next.scheduled_days))),
    );
    next.elapsed_days = review.elapsed_days;
    next.last_review = Some(now);
    next.reps = card.reps + 1;

    debug!(
      rating = %rating,
      from = %card.state,
      to = %next.state,
      stability = next.stability,
      difficulty = next.difficulty,
      scheduled_days = next.scheduled_days,
      "fsrs transition"
    );
    next
  }

  /// Evaluate all four ratings without committing to any of them.
  pub fn repeat(&self, card: &FsrsCard, now: DateTime<Utc>) -> NextStates {
    NextStates {
      again: self.next(card, now, Rating::Again),
      hard:  self.next(card, now, Rating::Hard),
      good:  self.next(card, now, Rating::Good),
      easy:  self.next(card, now, Rating::Easy),
    }
  }

  /// Modelled probability of recall at `now`; `0` for unreviewed cards.
  pub fn retrievability(&self, card: &FsrsCard, now: DateTime<Utc>) -> f64 {
    if card.state == FsrsState::New || card.stability <= 0.0 {
      return 0.0;
    }
    let elapsed = card
      .last_review
      .map(|t| (now - t).num_seconds().max(0) as f64 / 86_400.0)
      .unwrap_or(0.0);
    forgetting_curve(elapsed, card.stability)
  }

  // ── Phases ────────────────────────────────────────────────────────────────

  /// New, Learning and Relearning cards. Returns the scheduled card and,
  /// for short-term steps, the delay until it is due.
  fn next_learning(
    &self,
    card: &FsrsCard,
    rating: Rating,
    review: Review,
  ) -> (FsrsCard, Option<Duration>) {
    let (stability, difficulty) = self.memory_after(card, rating, review);
    let mut next = card.clone();
    next.stability = stability;
    next.difficulty = difficulty;

    let (steps, phase) = match card.state {
      FsrsState::Relearning => {
        (&self.params.relearning_steps, FsrsState::Relearning)
      }
      _ => (&self.params.learning_steps, FsrsState::Learning),
    };
    let current = if card.state == FsrsState::New {
      0
    } else {
      card.learning_steps
    };

    let mut short_delay = None;
    match self.step(steps, current, rating) {
      Some(Step::At { index, delay }) => {
        next.state = phase;
        next.learning_steps = index;
        next.scheduled_days = 0;
        short_delay = Some(delay);
      }
      Some(Step::Graduate) => {
        next.state = FsrsState::Review;
        next.learning_steps = 0;
        next.scheduled_days = self.graduating_interval(card, rating, review);
      }
      None if rating == Rating::Again => {
        next.state = phase;
        next.learning_steps = 0;
        next.scheduled_days =
          self.next_interval(stability, review.elapsed_days, review.seed);
      }
      None => {
        next.state = FsrsState::Review;
        next.learning_steps = 0;
        next.scheduled_days = self.graduating_interval(card, rating, review);
      }
    }
    (next, short_delay)
  }

  fn next_review(
    &self,
    card: &FsrsCard,
    rating: Rating,
    review: Review,
  ) -> (FsrsCard, Option<Duration>) {
    let (stability, difficulty) = self.memory_after(card, rating, review);
    let mut next = card.clone();
    next.stability = stability;
    next.difficulty = difficulty;

    if rating == Rating::Again {
      next.lapses = card.lapses + 1;
      next.state = FsrsState::Relearning;
      next.learning_steps = 0;
      if let Some(Step::At { delay, .. }) =
        self.step(&self.params.relearning_steps, 0, rating)
      {
        next.scheduled_days = 0;
        return (next, Some(delay));
      }
      next.scheduled_days =
        self.next_interval(stability, review.elapsed_days, review.seed);
      return (next, None);
    }

    let [hard, good, easy] = self.review_intervals(card, review);
    next.state = FsrsState::Review;
    next.learning_steps = 0;
    next.scheduled_days = match rating {
      Rating::Hard => hard,
      Rating::Good => good,
      _ => easy,
    };
    (next, None)
  }

  // ── Memory ────────────────────────────────────────────────────────────────

  /// `(stability, difficulty)` after rating `card` with `rating`.
  fn memory_after(
    &self,
    card: &FsrsCard,
    rating: Rating,
    review: Review,
  ) -> (f64, f64) {
    let w = &self.params.weights;
    if card.state == FsrsState::New {
      return (initial_stability(w, rating), initial_difficulty(w, rating));
    }

    let difficulty = next_difficulty(w, card.difficulty, rating);
    let r = forgetting_curve(f64::from(review.elapsed_days), card.stability);
    let short_term = self.params.enable_short_term;

    let stability = match (card.state, rating) {
      (FsrsState::Learning | FsrsState::Relearning, _) if short_term => {
        next_short_term_stability(w, card.stability, rating)
      }
      (_, Rating::Again) => {
        let forgot =
          next_forget_stability(w, card.difficulty, card.stability, r);
        if short_term {
          forgot
            .min(short_term_forget_ceiling(w, card.stability))
            .max(MIN_STABILITY)
        } else {
          forgot
        }
      }
      _ => next_recall_stability(w, card.difficulty, card.stability, r, rating),
    };
    (stability, difficulty)
  }

  // ── Intervals ─────────────────────────────────────────────────────────────

  /// Interval for a card leaving the learning phase. Easy always lands at
  /// least a day beyond Good.
  fn graduating_interval(
    &self,
    card: &FsrsCard,
    rating: Rating,
    review: Review,
  ) -> u32 {
    let (stability, _) = self.memory_after(card, rating, review);
    let interval =
      self.next_interval(stability, review.elapsed_days, review.seed);
    if rating != Rating::Easy {
      return interval;
    }
    let (good_stability, _) = self.memory_after(card, Rating::Good, review);
    let good =
      self.next_interval(good_stability, review.elapsed_days, review.seed);
    interval.max(good + 1).min(self.params.maximum_interval)
  }

  /// `[hard, good, easy]` intervals for a review-phase card, kept strictly
  /// ordered.
  fn review_intervals(&self, card: &FsrsCard, review: Review) -> [u32; 3] {
    let ivl = |rating| {
      let (s, _) = self.memory_after(card, rating, review);
      self.next_interval(s, review.elapsed_days, review.seed)
    };
    let max = self.params.maximum_interval;

    let mut hard = ivl(Rating::Hard);
    let mut good = ivl(Rating::Good);
    hard = hard.min(good);
    good = good.max(hard + 1).min(max);
    let easy = ivl(Rating::Easy).max(good + 1).min(max);
    if hard >= good {
      hard = good.saturating_sub(1).max(1);
    }
    [hard, good, easy]
  }

  /// Whole-day interval for `stability` at the target retention, capped and
  /// optionally fuzzed.
  fn next_interval(&self, stability: f64, elapsed_days: u32, seed: u64) -> u32 {
    let max = self.params.maximum_interval;
    let interval = (stability * self.interval_modifier)
      .round()
      .clamp(1.0, f64::from(max));

    if !self.params.enable_fuzz || interval < FUZZ_THRESHOLD_DAYS {
      return interval as u32;
    }
    let (lo, hi) = fuzz_range(interval, elapsed_days, max);
    let fuzzed = StdRng::seed_from_u64(seed).gen_range(lo..=hi);
    debug!(interval, fuzzed, "fuzzed interval");
    fuzzed
  }

  // ── Steps ─────────────────────────────────────────────────────────────────

  /// Step placement for a learning-phase rating, or `None` when short-term
  /// scheduling is off or `steps` is empty.
  fn step(&self, steps: &[Duration], current: u32, rating: Rating) -> Option<Step> {
    if !self.params.enable_short_term || steps.is_empty() {
      return None;
    }
    let last = steps.len() - 1;
    let current = (current as usize).min(last);

    Some(match rating {
      Rating::Again => Step::At {
        index: 0,
        delay: steps[0],
      },
      Rating::Hard => {
        let delay = match (current, steps.len()) {
          (0, 1) => steps[0] * 3 / 2,
          (0, _) => (steps[0] + steps[1]) / 2,
          _ => steps[current],
        };
        Step::At {
          index: current as u32,
          delay,
        }
      }
      Rating::Good if current < last => Step::At {
        index: current as u32 + 1,
        delay: steps[current + 1],
      },
      Rating::Good | Rating::Easy => Step::Graduate,
    })
  }
}

fn elapsed_whole_days(
  last_review: Option<DateTime<Utc>>,
  now: DateTime<Utc>,
) -> u32 {
  last_review
    .map(|t| (now - t).num_days().max(0) as u32)
    .unwrap_or(0)
}

/// Deterministic per-review seed so a preview and the review that follows it
/// at the same instant agree on the fuzzed interval.
fn fuzz_seed(now: DateTime<Utc>, card: &FsrsCard) -> u64 {
  (now.timestamp_millis() as u64)
    ^ (u64::from(card.reps) << 32)
    ^ (card.difficulty * card.stability).to_bits()
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
  }

  fn no_fuzz() -> Fsrs {
    Fsrs::new(FsrsParameters {
      enable_fuzz: false,
      ..Default::default()
    })
    .unwrap()
  }

  fn new_card(now: DateTime<Utc>) -> FsrsCard {
    FsrsCard {
      due:            now,
      stability:      0.0,
      difficulty:     0.0,
      elapsed_days:   0,
      scheduled_days: 0,
      learning_steps: 0,
      reps:           0,
      lapses:         0,
      state:          FsrsState::New,
      last_review:    None,
    }
  }

  fn review_card(now: DateTime<Utc>, stability: f64, days_ago: i64) -> FsrsCard {
    FsrsCard {
      due:            now,
      stability,
      difficulty:     5.0,
      elapsed_days:   0,
      scheduled_days: days_ago as u32,
      learning_steps: 0,
      reps:           5,
      lapses:         0,
      state:          FsrsState::Review,
      last_review:    Some(now - Duration::days(days_ago)),
    }
  }

  #[test]
  fn invalid_parameters_are_rejected() {
    let bad = FsrsParameters {
      request_retention: 1.0,
      ..Default::default()
    };
    assert!(matches!(Fsrs::new(bad), Err(Error::InvalidParameters(_))));

    let bad = FsrsParameters {
      maximum_interval: 0,
      ..Default::default()
    };
    assert!(Fsrs::new(bad).is_err());

    let bad = FsrsParameters {
      maximum_interval: MAX_INTERVAL_DAYS + 1,
      ..Default::default()
    };
    assert!(matches!(Fsrs::new(bad), Err(Error::InvalidParameters(_))));

    let bad = FsrsParameters {
      relearning_steps: vec![Duration::days(i64::from(MAX_INTERVAL_DAYS) + 1)],
      ..Default::default()
    };
    assert!(matches!(Fsrs::new(bad), Err(Error::InvalidParameters(_))));

    let longest = FsrsParameters {
      maximum_interval: MAX_INTERVAL_DAYS,
      ..Default::default()
    };
    assert!(Fsrs::new(longest).is_ok());
  }

  #[test]
  fn new_card_walks_learning_steps() {
    let fsrs = no_fuzz();
    let card = new_card(t0());

    let again = fsrs.next(&card, t0(), Rating::Again);
    assert_eq!(again.state, FsrsState::Learning);
    assert_eq!(again.due, t0() + Duration::minutes(1));
    assert_eq!(again.scheduled_days, 0);

    let hard = fsrs.next(&card, t0(), Rating::Hard);
    assert_eq!(hard.state, FsrsState::Learning);
    assert_eq!(hard.due, t0() + Duration::seconds(330));

    let good = fsrs.next(&card, t0(), Rating::Good);
    assert_eq!(good.state, FsrsState::Learning);
    assert_eq!(good.learning_steps, 1);
    assert_eq!(good.due, t0() + Duration::minutes(10));

    let easy = fsrs.next(&card, t0(), Rating::Easy);
    assert_eq!(easy.state, FsrsState::Review);
    assert!(easy.scheduled_days >= 1);
    assert_eq!(easy.reps, 1);
    assert_eq!(easy.last_review, Some(t0()));
  }

  #[test]
  fn last_learning_step_graduates_on_good() {
    let fsrs = no_fuzz();
    let first = fsrs.next(&new_card(t0()), t0(), Rating::Good);
    let at = first.due;
    let second = fsrs.next(&first, at, Rating::Good);

    assert_eq!(second.state, FsrsState::Review);
    assert!(second.scheduled_days >= 1);
    assert_eq!(
      second.due,
      at + Duration::days(i64::from(second.scheduled_days))
    );
    assert!(second.stability > first.stability);
  }

  #[test]
  fn learning_again_stays_in_learning() {
    let fsrs = no_fuzz();
    let first = fsrs.next(&new_card(t0()), t0(), Rating::Good);
    let again = fsrs.next(&first, first.due, Rating::Again);
    assert_eq!(again.state, FsrsState::Learning);
    assert_eq!(again.learning_steps, 0);
    assert_eq!(again.due, first.due + Duration::minutes(1));
  }

  #[test]
  fn review_again_is_a_lapse() {
    let fsrs = no_fuzz();
    let card = review_card(t0(), 10.0, 10);
    let next = fsrs.next(&card, t0(), Rating::Again);

    assert_eq!(next.state, FsrsState::Relearning);
    assert_eq!(next.lapses, 1);
    assert!(next.stability < card.stability);
    assert_eq!(next.due, t0() + Duration::minutes(10));
  }

  #[test]
  fn relearning_again_restarts_the_relearning_step() {
    let fsrs = no_fuzz();
    let lapsed = fsrs.next(&review_card(t0(), 10.0, 10), t0(), Rating::Again);
    assert_eq!(lapsed.state, FsrsState::Relearning);

    let again = fsrs.next(&lapsed, lapsed.due, Rating::Again);
    assert_eq!(again.state, FsrsState::Relearning);
    assert_eq!(again.learning_steps, 0);
    assert_eq!(again.scheduled_days, 0);
    assert_eq!(again.lapses, 1);
    assert_eq!(again.due, lapsed.due + Duration::minutes(10));
  }

  #[test]
  fn relearning_again_without_short_term_schedules_days() {
    let fsrs = Fsrs::new(FsrsParameters {
      enable_fuzz: false,
      enable_short_term: false,
      ..Default::default()
    })
    .unwrap();
    let relearning = FsrsCard {
      state: FsrsState::Relearning,
      stability: 4.0,
      scheduled_days: 1,
      ..review_card(t0(), 4.0, 1)
    };

    let again = fsrs.next(&relearning, t0(), Rating::Again);
    assert_eq!(again.state, FsrsState::Relearning);
    assert_eq!(again.learning_steps, 0);
    assert!(again.scheduled_days >= 1);
    assert!(again.stability < relearning.stability);
    assert_eq!(
      again.due,
      t0() + Duration::days(i64::from(again.scheduled_days))
    );
  }

  #[test]
  fn relearning_good_returns_to_review() {
    let fsrs = no_fuzz();
    let lapsed = fsrs.next(&review_card(t0(), 10.0, 10), t0(), Rating::Again);
    let back = fsrs.next(&lapsed, lapsed.due, Rating::Good);
    assert_eq!(back.state, FsrsState::Review);
    assert!(back.scheduled_days >= 1);
  }

  #[test]
  fn review_intervals_are_ordered() {
    let fsrs = no_fuzz();
    let card = review_card(t0(), 12.0, 12);
    let states = fsrs.repeat(&card, t0());

    assert!(states.hard.scheduled_days < states.good.scheduled_days);
    assert!(states.good.scheduled_days < states.easy.scheduled_days);
    assert!(states.hard.stability < states.good.stability);
    assert!(states.good.stability < states.easy.stability);
    assert!(states.good.stability > card.stability);
  }

  #[test]
  fn intervals_respect_maximum() {
    let fsrs = no_fuzz();
    let card = review_card(t0(), 5000.0, 300);
    let next = fsrs.next(&card, t0(), Rating::Easy);
    assert!(next.scheduled_days <= 365);
  }

  #[test]
  fn fuzz_is_deterministic_per_instant() {
    let fsrs = Fsrs::default();
    let card = review_card(t0(), 40.0, 40);
    let a = fsrs.next(&card, t0(), Rating::Good);
    let b = fsrs.next(&card, t0(), Rating::Good);
    assert_eq!(a, b);

    let plain = no_fuzz().next(&card, t0(), Rating::Good);
    let (lo, hi) = fuzz_range(f64::from(plain.scheduled_days), 40, 365);
    assert!(
      (lo..=hi).contains(&a.scheduled_days),
      "{} not in {lo}..={hi}",
      a.scheduled_days
    );
  }

  #[test]
  fn without_short_term_good_graduates_new_cards() {
    let fsrs = Fsrs::new(FsrsParameters {
      enable_fuzz: false,
      enable_short_term: false,
      ..Default::default()
    })
    .unwrap();

    let good = fsrs.next(&new_card(t0()), t0(), Rating::Good);
    assert_eq!(good.state, FsrsState::Review);
    assert_eq!(good.scheduled_days, 3);

    let again = fsrs.next(&new_card(t0()), t0(), Rating::Again);
    assert_eq!(again.state, FsrsState::Learning);
    assert_eq!(again.scheduled_days, 1);
  }

  #[test]
  fn retrievability_behaviour() {
    let fsrs = no_fuzz();
    assert_eq!(fsrs.retrievability(&new_card(t0()), t0()), 0.0);

    let card = review_card(t0(), 10.0, 0);
    let mut last = fsrs.retrievability(&card, t0());
    assert!((last - 1.0).abs() < 1e-12);
    for day in 1..60 {
      let r = fsrs.retrievability(&card, t0() + Duration::days(day));
      assert!(r < last && r >= 0.0);
      last = r;
    }
    let at_stability = fsrs.retrievability(&card, t0() + Duration::days(10));
    assert!((at_stability - 0.9).abs() < 1e-9);
  }
}
