//! SQL schema for the Mnemo SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS flashcards (
    flashcard_id TEXT PRIMARY KEY,
    front        TEXT NOT NULL,
    back         TEXT NOT NULL,
    tags         TEXT NOT NULL DEFAULT '[]',   -- JSON array of strings
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS card_states (
    user_id                  TEXT    NOT NULL,
    flashcard_id             TEXT    NOT NULL
                             REFERENCES flashcards(flashcard_id) ON DELETE CASCADE,
    algorithm                TEXT    NOT NULL,   -- 'sm2' | 'fsrs'
    memory_json              TEXT    NOT NULL,   -- tagged MemoryModel
    next_review_date         TEXT    NOT NULL,
    last_review_date         TEXT,
    last_rating              INTEGER,
    total_reviews            INTEGER NOT NULL DEFAULT 0,
    correct_count            INTEGER NOT NULL DEFAULT 0,
    incorrect_count          INTEGER NOT NULL DEFAULT 0,
    average_response_time_ms REAL    NOT NULL DEFAULT 0,
    lapses                   INTEGER NOT NULL DEFAULT 0,
    is_suspended             INTEGER NOT NULL DEFAULT 0,
    state                    TEXT    NOT NULL,   -- display state
    version                  INTEGER NOT NULL,
    PRIMARY KEY (user_id, flashcard_id)
);

-- The review ledger is append-only. Rows are only ever removed by the
-- cascade when their flashcard is deleted.
CREATE TABLE IF NOT EXISTS review_log (
    user_id          TEXT    NOT NULL,
    flashcard_id     TEXT    NOT NULL,
    seq              INTEGER NOT NULL,           -- 0-based position in history
    reviewed_at      TEXT    NOT NULL,
    rating           INTEGER NOT NULL,
    response_time_ms INTEGER,
    interval_before  INTEGER NOT NULL,
    interval_after   INTEGER NOT NULL,
    algorithm        TEXT    NOT NULL,
    correct          INTEGER NOT NULL,
    PRIMARY KEY (user_id, flashcard_id, seq),
    FOREIGN KEY (user_id, flashcard_id)
        REFERENCES card_states(user_id, flashcard_id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS card_states_due_idx
    ON card_states(user_id, is_suspended, next_review_date);

PRAGMA user_version = 1;
";
