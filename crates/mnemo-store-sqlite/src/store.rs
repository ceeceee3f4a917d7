//! [`SqliteStore`], the SQLite implementation of [`CardStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _, params, types::Value};
use tracing::debug;
use uuid::Uuid;

use mnemo_core::{
  card::CardState,
  flashcard::{Flashcard, FlashcardPatch, NewFlashcard},
  store::{CardStore, FlashcardQuery},
};

use crate::{
  Error, Result,
  encode::{
    RawCardState, RawFlashcard, RawReviewEntry, encode_dt, encode_memory,
    encode_tags, encode_uuid,
  },
  schema::SCHEMA,
};

/// How a compare-and-swap write ended.
enum Write {
  Done,
  Conflict,
  MissingFlashcard,
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Mnemo card store backed by a single SQLite file.
///
/// Cloning shares the inner connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run a `card_states` query and attach each row's ledger.
  async fn query_card_states(
    &self,
    where_clause: &'static str,
    args: Vec<Value>,
  ) -> Result<Vec<CardState>> {
    let raws: Vec<RawCardState> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM card_states {where_clause}",
          RawCardState::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt
          .query_map(
            rusqlite::params_from_iter(args.iter()),
            RawCardState::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        for raw in &mut rows {
          raw.history = load_history(conn, &raw.user_id, &raw.flashcard_id)?;
        }
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCardState::into_card_state).collect()
  }
}

/// The ledger rows of one card state, oldest first.
fn load_history(
  conn: &Connection,
  user_id: &str,
  flashcard_id: &str,
) -> rusqlite::Result<Vec<RawReviewEntry>> {
  let sql = format!(
    "SELECT {} FROM review_log
     WHERE user_id = ?1 AND flashcard_id = ?2
     ORDER BY seq",
    RawReviewEntry::COLUMNS
  );
  let mut stmt = conn.prepare(&sql)?;
  stmt
    .query_map(params![user_id, flashcard_id], RawReviewEntry::from_row)?
    .collect()
}

/// Column values for one `card_states` write, encoded up front so the
/// closure handed to the database thread owns everything it needs.
struct EncodedState {
  user_id:          String,
  flashcard_id:     String,
  algorithm:        String,
  memory_json:      String,
  next_review_date: String,
  last_review_date: Option<String>,
  last_rating:      Option<u8>,
  total_reviews:    u32,
  correct_count:    u32,
  incorrect_count:  u32,
  avg_response_ms:  f64,
  lapses:           u32,
  is_suspended:     bool,
  state:            String,
  entries:          Vec<EncodedEntry>,
}

struct EncodedEntry {
  reviewed_at:      String,
  rating:           u8,
  response_time_ms: Option<u32>,
  interval_before:  u32,
  interval_after:   u32,
  algorithm:        String,
  correct:          bool,
}

impl EncodedState {
  fn new(state: &CardState) -> Result<Self> {
    Ok(Self {
      user_id:          state.user_id.clone(),
      flashcard_id:     encode_uuid(state.flashcard_id),
      algorithm:        state.algorithm().to_string(),
      memory_json:      encode_memory(&state.memory)?,
      next_review_date: encode_dt(state.next_review_date),
      last_review_date: state.last_review_date.map(encode_dt),
      last_rating:      state.last_rating,
      total_reviews:    state.total_reviews,
      correct_count:    state.correct_count,
      incorrect_count:  state.incorrect_count,
      avg_response_ms:  state.average_response_time_ms,
      lapses:           state.lapses,
      is_suspended:     state.is_suspended,
      state:            state.state.to_string(),
      entries:          state
        .review_history
        .iter()
        .map(|e| EncodedEntry {
          reviewed_at:      encode_dt(e.timestamp),
          rating:           e.rating,
          response_time_ms: e.response_time_ms,
          interval_before:  e.interval_before,
          interval_after:   e.interval_after,
          algorithm:        e.algorithm.to_string(),
          correct:          e.correct,
        })
        .collect(),
    })
  }
}

// ─── CardStore impl ──────────────────────────────────────────────────────────

impl CardStore for SqliteStore {
  type Error = Error;

  // ── Flashcards ────────────────────────────────────────────────────────────

  async fn create_flashcard(&self, input: NewFlashcard) -> Result<Flashcard> {
    let now = Utc::now();
    let card = Flashcard {
      flashcard_id: Uuid::new_v4(),
      front:        input.front,
      back:         input.back,
      tags:         input.tags,
      created_at:   now,
      updated_at:   now,
    };

    let id_str = encode_uuid(card.flashcard_id);
    let front = card.front.clone();
    let back = card.back.clone();
    let tags_str = encode_tags(&card.tags)?;
    let at_str = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO flashcards
             (flashcard_id, front, back, tags, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
          params![id_str, front, back, tags_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(card)
  }

  async fn get_flashcard(&self, id: Uuid) -> Result<Option<Flashcard>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawFlashcard> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM flashcards WHERE flashcard_id = ?1",
          RawFlashcard::COLUMNS
        );
        Ok(
          conn
            .query_row(&sql, params![id_str], RawFlashcard::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawFlashcard::into_flashcard).transpose()
  }

  async fn list_flashcards(
    &self,
    query: &FlashcardQuery,
  ) -> Result<Vec<Flashcard>> {
    let tag = query.tag.clone();
    let limit_val = query.limit.unwrap_or(100) as i64;
    let offset_val = query.offset.unwrap_or(0) as i64;

    let raws: Vec<RawFlashcard> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM flashcards
           WHERE ?1 IS NULL
              OR EXISTS (SELECT 1 FROM json_each(flashcards.tags)
                         WHERE json_each.value = ?1)
           ORDER BY created_at, flashcard_id
           LIMIT ?2 OFFSET ?3",
          RawFlashcard::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            params![tag, limit_val, offset_val],
            RawFlashcard::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawFlashcard::into_flashcard).collect()
  }

  async fn update_flashcard(
    &self,
    id: Uuid,
    patch: FlashcardPatch,
  ) -> Result<Option<Flashcard>> {
    let Some(mut card) = self.get_flashcard(id).await? else {
      return Ok(None);
    };
    patch.apply(&mut card, Utc::now());

    let id_str = encode_uuid(id);
    let front = card.front.clone();
    let back = card.back.clone();
    let tags_str = encode_tags(&card.tags)?;
    let at_str = encode_dt(card.updated_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE flashcards
           SET front = ?2, back = ?3, tags = ?4, updated_at = ?5
           WHERE flashcard_id = ?1",
          params![id_str, front, back, tags_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(Some(card))
  }

  async fn delete_flashcard(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM flashcards WHERE flashcard_id = ?1",
          params![id_str],
        )?)
      })
      .await?;
    Ok(deleted > 0)
  }

  // ── Card states ───────────────────────────────────────────────────────────

  async fn get_card_state(
    &self,
    user_id: &str,
    flashcard_id: Uuid,
  ) -> Result<Option<CardState>> {
    let states = self
      .query_card_states(
        "WHERE user_id = ?1 AND flashcard_id = ?2",
        vec![
          Value::Text(user_id.to_owned()),
          Value::Text(encode_uuid(flashcard_id)),
        ],
      )
      .await?;
    Ok(states.into_iter().next())
  }

  async fn list_card_states(&self, user_id: &str) -> Result<Vec<CardState>> {
    self
      .query_card_states(
        "WHERE user_id = ?1 ORDER BY next_review_date, flashcard_id",
        vec![Value::Text(user_id.to_owned())],
      )
      .await
  }

  async fn due_card_states(
    &self,
    user_id: &str,
    now: DateTime<Utc>,
    limit: Option<usize>,
  ) -> Result<Vec<CardState>> {
    // A negative LIMIT means no limit in SQLite.
    let limit_val = limit.map_or(-1, |l| l as i64);
    self
      .query_card_states(
        "WHERE user_id = ?1 AND is_suspended = 0 AND next_review_date <= ?2
         ORDER BY next_review_date, flashcard_id
         LIMIT ?3",
        vec![
          Value::Text(user_id.to_owned()),
          Value::Text(encode_dt(now)),
          Value::Integer(limit_val),
        ],
      )
      .await
  }

  async fn put_card_state(
    &self,
    state: CardState,
    expected_version: Option<u64>,
  ) -> Result<CardState> {
    let new_version = expected_version.map_or(1, |v| v + 1);
    let expected = expected_version.map(|v| v as i64);

    let e = EncodedState::new(&state)?;

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let changed = match expected {
          None => {
            let flashcard_exists = tx
              .query_row(
                "SELECT 1 FROM flashcards WHERE flashcard_id = ?1",
                params![e.flashcard_id],
                |_| Ok(()),
              )
              .optional()?
              .is_some();
            if !flashcard_exists {
              return Ok(Write::MissingFlashcard);
            }
            tx.execute(
              "INSERT INTO card_states (
                 user_id, flashcard_id, algorithm, memory_json,
                 next_review_date, last_review_date, last_rating,
                 total_reviews, correct_count, incorrect_count,
                 average_response_time_ms, lapses, is_suspended, state,
                 version
               ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                         ?13, ?14, ?15)
               ON CONFLICT (user_id, flashcard_id) DO NOTHING",
              params![
                e.user_id,
                e.flashcard_id,
                e.algorithm,
                e.memory_json,
                e.next_review_date,
                e.last_review_date,
                e.last_rating,
                e.total_reviews,
                e.correct_count,
                e.incorrect_count,
                e.avg_response_ms,
                e.lapses,
                e.is_suspended,
                e.state,
                new_version as i64,
              ],
            )?
          }
          Some(expected) => tx.execute(
            "UPDATE card_states SET
               algorithm = ?3, memory_json = ?4, next_review_date = ?5,
               last_review_date = ?6, last_rating = ?7, total_reviews = ?8,
               correct_count = ?9, incorrect_count = ?10,
               average_response_time_ms = ?11, lapses = ?12,
               is_suspended = ?13, state = ?14, version = ?15
             WHERE user_id = ?1 AND flashcard_id = ?2 AND version = ?16",
            params![
              e.user_id,
              e.flashcard_id,
              e.algorithm,
              e.memory_json,
              e.next_review_date,
              e.last_review_date,
              e.last_rating,
              e.total_reviews,
              e.correct_count,
              e.incorrect_count,
              e.avg_response_ms,
              e.lapses,
              e.is_suspended,
              e.state,
              new_version as i64,
              expected,
            ],
          )?,
        };
        if changed == 0 {
          return Ok(Write::Conflict);
        }

        let stored: i64 = tx.query_row(
          "SELECT COUNT(*) FROM review_log
           WHERE user_id = ?1 AND flashcard_id = ?2",
          params![e.user_id, e.flashcard_id],
          |row| row.get(0),
        )?;
        {
          let mut insert = tx.prepare(
            "INSERT INTO review_log (
               user_id, flashcard_id, seq, reviewed_at, rating,
               response_time_ms, interval_before, interval_after, algorithm,
               correct
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
          )?;
          for (seq, entry) in e.entries.iter().enumerate().skip(stored as usize)
          {
            insert.execute(params![
              e.user_id,
              e.flashcard_id,
              seq as i64,
              entry.reviewed_at,
              entry.rating,
              entry.response_time_ms,
              entry.interval_before,
              entry.interval_after,
              entry.algorithm,
              entry.correct,
            ])?;
          }
        }

        tx.commit()?;
        Ok(Write::Done)
      })
      .await?;

    match outcome {
      Write::Done => Ok(CardState {
        version: new_version,
        ..state
      }),
      Write::Conflict => {
        debug!(
          user_id = %state.user_id,
          flashcard_id = %state.flashcard_id,
          ?expected_version,
          "card state write lost a version race"
        );
        Err(
          mnemo_core::Error::VersionConflict {
            user_id:      state.user_id,
            flashcard_id: state.flashcard_id,
            expected:     expected_version.unwrap_or(0),
          }
          .into(),
        )
      }
      Write::MissingFlashcard => {
        Err(mnemo_core::Error::FlashcardNotFound(state.flashcard_id).into())
      }
    }
  }
}
