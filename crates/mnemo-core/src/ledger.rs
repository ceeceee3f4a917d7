//! The review ledger, an append-only audit trail of every rating event.
//!
//! Entries are built in one step once the new interval is known, so an entry
//! is never observed half-written. Nothing in the scheduler edits or removes
//! an entry after it has been appended.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::card::Algorithm;

/// One processed review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewEntry {
  pub timestamp:        DateTime<Utc>,
  /// The rating as submitted to the owning algorithm: an SM-2 quality
  /// (`0..=5`) or an FSRS button value (`1..=4`).
  pub rating:           u8,
  pub response_time_ms: Option<u32>,
  /// Scheduled interval in days before this review.
  pub interval_before:  u32,
  /// Scheduled interval in days after this review.
  pub interval_after:   u32,
  pub algorithm:        Algorithm,
  /// Whether the review counted towards `correct_count`.
  pub correct:          bool,
}

/// Aggregate statistics over a ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerSummary {
  pub total:                 usize,
  pub correct:               usize,
  /// `correct / total`, or `0.0` for an empty ledger.
  pub retention:             f64,
  /// Mean over the entries that carried a response time.
  pub mean_response_time_ms: Option<f64>,
  /// Entry count per submitted rating value.
  pub rating_counts:         BTreeMap<u8, usize>,
  pub last_reviewed_at:      Option<DateTime<Utc>>,
}

impl LedgerSummary {
  pub fn from_entries(entries: &[ReviewEntry]) -> Self {
    let total = entries.len();
    let correct = entries.iter().filter(|e| e.correct).count();

    let timed: Vec<f64> = entries
      .iter()
      .filter_map(|e| e.response_time_ms)
      .map(f64::from)
      .collect();
    let mean_response_time_ms = (!timed.is_empty())
      .then(|| timed.iter().sum::<f64>() / timed.len() as f64);

    let mut rating_counts = BTreeMap::new();
    for e in entries {
      *rating_counts.entry(e.rating).or_insert(0) += 1;
    }

    Self {
      total,
      correct,
      retention: if total == 0 {
        0.0
      } else {
        correct as f64 / total as f64
      },
      mean_response_time_ms,
      rating_counts,
      last_reviewed_at: entries.iter().map(|e| e.timestamp).max(),
    }
  }
}
