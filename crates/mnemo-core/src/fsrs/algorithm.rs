//! FSRS formulas: the forgetting curve and the difficulty/stability updates.
//!
//! Every function is pure. Weights are passed in explicitly so several
//! parameter sets can coexist.

use crate::rating::Rating;

/// Forgetting-curve exponent.
pub const DECAY: f64 = -0.5;
/// Chosen so that `R(t = S) = 0.9`: `0.9^(1/DECAY) - 1`.
pub const FACTOR: f64 = 19.0 / 81.0;

pub const MIN_STABILITY: f64 = 0.01;
pub const MAX_STABILITY: f64 = 36500.0;
pub const MIN_DIFFICULTY: f64 = 1.0;
pub const MAX_DIFFICULTY: f64 = 10.0;

/// Number of weights in an FSRS-5 parameter vector.
pub const WEIGHT_COUNT: usize = 19;

/// The published FSRS-5 default weights.
pub const DEFAULT_WEIGHTS: [f64; WEIGHT_COUNT] = [
  0.40255, 1.18385, 3.173, 15.69105, 7.1949, 0.5345, 1.4604, 0.0046, 1.54575,
  0.1192, 1.01925, 1.9395, 0.11, 0.29605, 2.2698, 0.2315, 2.9898, 0.51655,
  0.6621,
];

type Weights = [f64; WEIGHT_COUNT];

fn clamp_stability(s: f64) -> f64 { s.clamp(MIN_STABILITY, MAX_STABILITY) }

fn clamp_difficulty(d: f64) -> f64 { d.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY) }

/// Probability of recall after `elapsed_days` for a memory of `stability`.
pub fn forgetting_curve(elapsed_days: f64, stability: f64) -> f64 {
  if stability <= 0.0 {
    return 0.0;
  }
  (1.0 + FACTOR * elapsed_days.max(0.0) / stability)
    .powf(DECAY)
    .clamp(0.0, 1.0)
}

/// Multiplier turning stability into an interval for `request_retention`.
pub fn interval_modifier(request_retention: f64) -> f64 {
  (request_retention.powf(1.0 / DECAY) - 1.0) / FACTOR
}

/// `S0(G) = w[G-1]`.
pub fn initial_stability(w: &Weights, rating: Rating) -> f64 {
  w[usize::from(rating.value()) - 1].max(0.1)
}

/// `D0(G) = w4 - e^(w5 * (G - 1)) + 1`.
pub fn initial_difficulty(w: &Weights, rating: Rating) -> f64 {
  clamp_difficulty(w[4] - (w[5] * (rating.as_f64() - 1.0)).exp() + 1.0)
}

/// Linear damping of the difficulty delta towards the ceiling, followed by
/// mean reversion to `D0(Easy)`.
pub fn next_difficulty(w: &Weights, difficulty: f64, rating: Rating) -> f64 {
  let delta = -w[6] * (rating.as_f64() - 3.0);
  let damped = difficulty + delta * (MAX_DIFFICULTY - difficulty) / 9.0;
  let target = initial_difficulty(w, Rating::Easy);
  clamp_difficulty(w[7] * target + (1.0 - w[7]) * damped)
}

/// Stability after a successful recall (Hard, Good or Easy).
pub fn next_recall_stability(
  w: &Weights,
  difficulty: f64,
  stability: f64,
  retrievability: f64,
  rating: Rating,
) -> f64 {
  let s = stability.max(MIN_STABILITY);
  let hard_penalty = if rating == Rating::Hard { w[15] } else { 1.0 };
  let easy_bonus = if rating == Rating::Easy { w[16] } else { 1.0 };
  let growth = w[8].exp()
    * (11.0 - difficulty)
    * s.powf(-w[9])
    * ((w[10] * (1.0 - retrievability)).exp() - 1.0)
    * hard_penalty
    * easy_bonus;
  clamp_stability(s * (1.0 + growth))
}

/// Stability after a lapse (Again).
pub fn next_forget_stability(
  w: &Weights,
  difficulty: f64,
  stability: f64,
  retrievability: f64,
) -> f64 {
  let s = stability.max(0.0);
  clamp_stability(
    w[11]
      * difficulty.max(MIN_DIFFICULTY).powf(-w[12])
      * ((s + 1.0).powf(w[13]) - 1.0)
      * (w[14] * (1.0 - retrievability)).exp(),
  )
}

/// Stability after a same-session (short-term) review. Good and Easy never
/// shrink stability.
pub fn next_short_term_stability(
  w: &Weights,
  stability: f64,
  rating: Rating,
) -> f64 {
  let mut increase = (w[17] * (rating.as_f64() - 3.0 + w[18])).exp();
  if rating >= Rating::Good {
    increase = increase.max(1.0);
  }
  clamp_stability(stability.max(MIN_STABILITY) * increase)
}

/// Upper bound on post-lapse stability when short-term scheduling is on.
pub fn short_term_forget_ceiling(w: &Weights, stability: f64) -> f64 {
  stability / (w[17] * w[18]).exp()
}

// ─── Fuzz ────────────────────────────────────────────────────────────────────

/// `(start, end, factor)`: intervals in `[start, end)` days widen the fuzz
/// window by `factor` per day.
const FUZZ_RANGES: [(f64, f64, f64); 3] =
  [(2.5, 7.0, 0.15), (7.0, 20.0, 0.1), (20.0, f64::INFINITY, 0.05)];

/// Intervals shorter than this are never fuzzed.
pub const FUZZ_THRESHOLD_DAYS: f64 = 2.5;

/// The inclusive window a fuzzed `interval` may be drawn from.
///
/// The window never undercuts the time already elapsed since the last review
/// and never exceeds `maximum_interval`.
pub fn fuzz_range(
  interval: f64,
  elapsed_days: u32,
  maximum_interval: u32,
) -> (u32, u32) {
  let delta = FUZZ_RANGES.iter().fold(1.0, |acc, (start, end, factor)| {
    acc + factor * (interval.min(*end) - start).max(0.0)
  });

  let interval = interval.min(f64::from(maximum_interval));
  let mut min_ivl = ((interval - delta).round() as u32).max(2);
  let max_ivl = ((interval + delta).round() as u32).min(maximum_interval);
  if interval > f64::from(elapsed_days) {
    min_ivl = min_ivl.max(elapsed_days + 1);
  }
  (min_ivl.min(max_ivl), max_ivl)
}
