//! FSRS (Free Spaced Repetition Scheduler).
//!
//! A forgetting-curve model driven by per-card stability and difficulty.
//!
//! ## Core formulas
//! - Retrievability: `R = (1 + FACTOR * t / S)^DECAY` with `FACTOR = 19/81`
//!   and `DECAY = -0.5`
//! - Interval: `I = S / FACTOR * (R_target^(1/DECAY) - 1)`, which is `S` at a
//!   target retention of 0.9

mod algorithm;
mod scheduler;

pub use algorithm::{
  DECAY, DEFAULT_WEIGHTS, FACTOR, MAX_DIFFICULTY, MAX_STABILITY,
  MIN_DIFFICULTY, MIN_STABILITY, WEIGHT_COUNT, forgetting_curve, fuzz_range,
  initial_difficulty, initial_stability, interval_modifier, next_difficulty,
  next_forget_stability, next_recall_stability, next_short_term_stability,
};
pub use scheduler::{Fsrs, FsrsCard, FsrsParameters, NextStates};
