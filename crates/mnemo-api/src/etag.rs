//! ETags for card states.
//!
//! A card state's ETag is a SHA-256 over its identity and store version, so
//! it changes on every persisted write and never collides across cards.

use axum::http::{HeaderMap, header};
use mnemo_core::card::CardState;
use sha2::{Digest, Sha256};

use crate::error::ApiError;

/// The strong, quoted ETag for `state`.
pub fn card_etag(state: &CardState) -> String {
  let mut hasher = Sha256::new();
  hasher.update(state.user_id.as_bytes());
  hasher.update([0u8]);
  hasher.update(state.flashcard_id.as_bytes());
  hasher.update(state.version.to_le_bytes());
  format!("\"{}\"", hex::encode(hasher.finalize()))
}

fn strip_quotes(tag: &str) -> &str {
  let tag = tag.trim();
  let tag = tag.strip_prefix("W/").unwrap_or(tag);
  tag.trim_matches('"')
}

/// Enforce an `If-Match` header, if present, against the current state.
///
/// `*` matches any existing state. A header against a state that does not
/// exist yet always fails.
pub fn check_if_match(
  headers: &HeaderMap,
  current: Option<&CardState>,
) -> Result<(), ApiError> {
  let Some(value) = headers.get(header::IF_MATCH) else {
    return Ok(());
  };
  let value = value
    .to_str()
    .map_err(|_| ApiError::BadRequest("malformed If-Match header".into()))?;

  let Some(current) = current else {
    return Err(ApiError::PreconditionFailed(
      "card state does not exist".into(),
    ));
  };
  if value.trim() == "*" {
    return Ok(());
  }

  let etag = card_etag(current);
  let wanted = strip_quotes(&etag);
  if value.split(',').any(|tag| strip_quotes(tag) == wanted) {
    Ok(())
  } else {
    Err(ApiError::PreconditionFailed(format!(
      "card state is at version {}",
      current.version
    )))
  }
}

#[cfg(test)]
mod tests {
  use axum::http::HeaderValue;
  use chrono::Utc;
  use uuid::Uuid;

  use super::*;

  fn state(version: u64) -> CardState {
    CardState {
      version,
      ..CardState::new("alice", Uuid::nil(), Utc::now())
    }
  }

  fn if_match(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::IF_MATCH, HeaderValue::from_str(value).unwrap());
    headers
  }

  #[test]
  fn etag_tracks_version_and_identity() {
    assert_eq!(card_etag(&state(3)), card_etag(&state(3)));
    assert_ne!(card_etag(&state(3)), card_etag(&state(4)));

    let other = CardState {
      user_id: "bob".into(),
      ..state(3)
    };
    assert_ne!(card_etag(&state(3)), card_etag(&other));
    assert!(card_etag(&other).starts_with('"'));
  }

  #[test]
  fn if_match_semantics() {
    let current = state(2);
    let tag = card_etag(&current);

    assert!(check_if_match(&HeaderMap::new(), None).is_ok());
    assert!(check_if_match(&if_match(&tag), Some(&current)).is_ok());
    assert!(check_if_match(&if_match("*"), Some(&current)).is_ok());
    assert!(
      check_if_match(&if_match(&format!("\"nope\", {tag}")), Some(&current))
        .is_ok()
    );

    let stale = card_etag(&state(1));
    assert!(matches!(
      check_if_match(&if_match(&stale), Some(&current)),
      Err(ApiError::PreconditionFailed(_))
    ));
    assert!(matches!(
      check_if_match(&if_match("*"), None),
      Err(ApiError::PreconditionFailed(_))
    ));
  }
}
