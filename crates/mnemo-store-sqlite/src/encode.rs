//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings in UTC (nanosecond
//! precision, `Z` suffix), so lexical order in SQL matches chronological
//! order. Enums use their lowercase `strum` names. The memory model and tags
//! are stored as compact JSON. UUIDs are stored as hyphenated lowercase
//! strings.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use mnemo_core::{
  card::{Algorithm, CardState, CardStatus, MemoryModel},
  flashcard::Flashcard,
  ledger::ReviewEntry,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_tags(tags: &[String]) -> Result<String> {
  Ok(serde_json::to_string(tags)?)
}

pub fn decode_tags(s: &str) -> Result<Vec<String>> {
  Ok(serde_json::from_str(s)?)
}

pub fn encode_memory(memory: &MemoryModel) -> Result<String> {
  Ok(serde_json::to_string(memory)?)
}

/// Parse a `strum`-encoded enum column.
fn decode_enum<T: FromStr>(column: &'static str, s: &str) -> Result<T> {
  s.parse().map_err(|_| Error::Decode {
    column,
    value: s.to_owned(),
  })
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `flashcards` row.
pub struct RawFlashcard {
  pub flashcard_id: String,
  pub front:        String,
  pub back:         String,
  pub tags:         String,
  pub created_at:   String,
  pub updated_at:   String,
}

impl RawFlashcard {
  pub const COLUMNS: &'static str =
    "flashcard_id, front, back, tags, created_at, updated_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      flashcard_id: row.get(0)?,
      front:        row.get(1)?,
      back:         row.get(2)?,
      tags:         row.get(3)?,
      created_at:   row.get(4)?,
      updated_at:   row.get(5)?,
    })
  }

  pub fn into_flashcard(self) -> Result<Flashcard> {
    Ok(Flashcard {
      flashcard_id: decode_uuid(&self.flashcard_id)?,
      front:        self.front,
      back:         self.back,
      tags:         decode_tags(&self.tags)?,
      created_at:   decode_dt(&self.created_at)?,
      updated_at:   decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read directly from a `review_log` row.
pub struct RawReviewEntry {
  pub reviewed_at:      String,
  pub rating:           u8,
  pub response_time_ms: Option<u32>,
  pub interval_before:  u32,
  pub interval_after:   u32,
  pub algorithm:        String,
  pub correct:          bool,
}

impl RawReviewEntry {
  pub const COLUMNS: &'static str = "reviewed_at, rating, response_time_ms, \
                                     interval_before, interval_after, \
                                     algorithm, correct";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      reviewed_at:      row.get(0)?,
      rating:           row.get(1)?,
      response_time_ms: row.get(2)?,
      interval_before:  row.get(3)?,
      interval_after:   row.get(4)?,
      algorithm:        row.get(5)?,
      correct:          row.get(6)?,
    })
  }

  pub fn into_entry(self) -> Result<ReviewEntry> {
    Ok(ReviewEntry {
      timestamp:        decode_dt(&self.reviewed_at)?,
      rating:           self.rating,
      response_time_ms: self.response_time_ms,
      interval_before:  self.interval_before,
      interval_after:   self.interval_after,
      algorithm:        decode_enum::<Algorithm>(
        "review_log.algorithm",
        &self.algorithm,
      )?,
      correct:          self.correct,
    })
  }
}

/// Raw values read from a `card_states` row, plus its ledger rows in order.
pub struct RawCardState {
  pub user_id:                  String,
  pub flashcard_id:             String,
  pub memory_json:              String,
  pub next_review_date:         String,
  pub last_review_date:         Option<String>,
  pub last_rating:              Option<u8>,
  pub total_reviews:            u32,
  pub correct_count:            u32,
  pub incorrect_count:          u32,
  pub average_response_time_ms: f64,
  pub lapses:                   u32,
  pub is_suspended:             bool,
  pub state:                    String,
  pub version:                  i64,
  pub history:                  Vec<RawReviewEntry>,
}

impl RawCardState {
  pub const COLUMNS: &'static str = "user_id, flashcard_id, memory_json, \
                                     next_review_date, last_review_date, \
                                     last_rating, total_reviews, \
                                     correct_count, incorrect_count, \
                                     average_response_time_ms, lapses, \
                                     is_suspended, state, version";

  /// Reads the row; `history` is filled in separately.
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:                  row.get(0)?,
      flashcard_id:             row.get(1)?,
      memory_json:              row.get(2)?,
      next_review_date:         row.get(3)?,
      last_review_date:         row.get(4)?,
      last_rating:              row.get(5)?,
      total_reviews:            row.get(6)?,
      correct_count:            row.get(7)?,
      incorrect_count:          row.get(8)?,
      average_response_time_ms: row.get(9)?,
      lapses:                   row.get(10)?,
      is_suspended:             row.get(11)?,
      state:                    row.get(12)?,
      version:                  row.get(13)?,
      history:                  Vec::new(),
    })
  }

  pub fn into_card_state(self) -> Result<CardState> {
    let version = u64::try_from(self.version).map_err(|_| Error::Decode {
      column: "card_states.version",
      value:  self.version.to_string(),
    })?;
    let review_history = self
      .history
      .into_iter()
      .map(RawReviewEntry::into_entry)
      .collect::<Result<Vec<_>>>()?;

    Ok(CardState {
      user_id: self.user_id,
      flashcard_id: decode_uuid(&self.flashcard_id)?,
      memory: serde_json::from_str(&self.memory_json)?,
      next_review_date: decode_dt(&self.next_review_date)?,
      last_review_date: self
        .last_review_date
        .as_deref()
        .map(decode_dt)
        .transpose()?,
      last_rating: self.last_rating,
      total_reviews: self.total_reviews,
      correct_count: self.correct_count,
      incorrect_count: self.incorrect_count,
      average_response_time_ms: self.average_response_time_ms,
      lapses: self.lapses,
      is_suspended: self.is_suspended,
      state: decode_enum::<CardStatus>("card_states.state", &self.state)?,
      review_history,
      version,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn encoded_timestamps_sort_chronologically() {
    let a = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let b = a + chrono::Duration::milliseconds(500);
    let c = a + chrono::Duration::seconds(1);
    assert!(encode_dt(a) < encode_dt(b));
    assert!(encode_dt(b) < encode_dt(c));
    assert_eq!(decode_dt(&encode_dt(b)).unwrap(), b);
  }

  #[test]
  fn unknown_enum_values_are_decode_errors() {
    let err = decode_enum::<CardStatus>("card_states.state", "graduated")
      .unwrap_err();
    assert!(matches!(err, Error::Decode { column: "card_states.state", .. }));
    assert_eq!(
      decode_enum::<CardStatus>("card_states.state", "mastered").unwrap(),
      CardStatus::Mastered
    );
  }
}
