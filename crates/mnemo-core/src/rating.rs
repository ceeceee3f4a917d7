//! Ratings: the user's self-assessment after answering a card.
//!
//! Two scales coexist. FSRS uses four buttons (Again, Hard, Good, Easy). The
//! legacy SM-2 scale is a quality grade from 0 (blackout) to 5 (perfect). Raw
//! input arrives as a JSON number, so validation also rejects non-integers.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{Error, Result};

/// One of the four FSRS answer buttons.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Rating {
  Again = 1,
  Hard  = 2,
  Good  = 3,
  Easy  = 4,
}

impl Rating {
  /// All four buttons in ascending order.
  pub const ALL: [Rating; 4] =
    [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy];

  pub fn value(self) -> u8 { self as u8 }

  pub fn as_f64(self) -> f64 { f64::from(self.value()) }

  /// `Good` and `Easy` count as correct answers in the review counters.
  pub fn is_correct(self) -> bool { self >= Rating::Good }

  /// Validate a raw FSRS rating (an integer in `1..=4`).
  pub fn from_raw(raw: f64) -> Result<Self> {
    match integral(raw, "an integer FSRS rating in 1..=4")? {
      1 => Ok(Rating::Again),
      2 => Ok(Rating::Hard),
      3 => Ok(Rating::Good),
      4 => Ok(Rating::Easy),
      _ => Err(Error::InvalidRating {
        rating:   raw,
        expected: "an integer FSRS rating in 1..=4",
      }),
    }
  }

  /// Map a legacy SM-2 quality onto the FSRS buttons: `<=2` is Again, `3`
  /// Hard, `4` Good and `5` Easy.
  pub fn from_quality(quality: Quality) -> Self {
    match quality.value() {
      0..=2 => Rating::Again,
      3 => Rating::Hard,
      4 => Rating::Good,
      _ => Rating::Easy,
    }
  }

  /// The SM-2 quality a button press stands for when an SM-2 card is
  /// reviewed through the four-button interface.
  pub fn to_quality(self) -> Quality {
    match self {
      Rating::Again => Quality(1),
      Rating::Hard => Quality(3),
      Rating::Good => Quality(4),
      Rating::Easy => Quality(5),
    }
  }
}

/// A validated SM-2 quality grade in `0..=5`.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct Quality(u8);

impl Quality {
  pub const MAX: u8 = 5;

  pub fn new(value: u8) -> Result<Self> {
    if value <= Self::MAX {
      Ok(Self(value))
    } else {
      Err(Error::InvalidRating {
        rating:   f64::from(value),
        expected: "an integer SM-2 quality in 0..=5",
      })
    }
  }

  /// Validate a raw SM-2 quality (an integer in `0..=5`).
  pub fn from_raw(raw: f64) -> Result<Self> {
    let value = integral(raw, "an integer SM-2 quality in 0..=5")?;
    u8::try_from(value)
      .ok()
      .filter(|v| *v <= Self::MAX)
      .map(Self)
      .ok_or(Error::InvalidRating {
        rating:   raw,
        expected: "an integer SM-2 quality in 0..=5",
      })
  }

  pub fn value(self) -> u8 { self.0 }

  /// Qualities of 3 and above are successful recalls.
  pub fn is_correct(self) -> bool { self.0 >= 3 }
}

impl TryFrom<u8> for Quality {
  type Error = Error;

  fn try_from(value: u8) -> Result<Self> { Self::new(value) }
}

impl From<Quality> for u8 {
  fn from(q: Quality) -> Self { q.0 }
}

fn integral(raw: f64, expected: &'static str) -> Result<i64> {
  if !raw.is_finite() || raw.fract() != 0.0 {
    return Err(Error::InvalidRating { rating: raw, expected });
  }
  Ok(raw as i64)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fsrs_ratings_accept_only_one_to_four() {
    assert_eq!(Rating::from_raw(1.0).unwrap(), Rating::Again);
    assert_eq!(Rating::from_raw(4.0).unwrap(), Rating::Easy);
    assert!(Rating::from_raw(0.0).is_err());
    assert!(Rating::from_raw(5.0).is_err());
    assert!(Rating::from_raw(2.5).is_err());
    assert!(Rating::from_raw(f64::NAN).is_err());
  }

  #[test]
  fn qualities_accept_zero_to_five() {
    assert_eq!(Quality::from_raw(0.0).unwrap().value(), 0);
    assert_eq!(Quality::from_raw(5.0).unwrap().value(), 5);
    assert!(Quality::from_raw(-1.0).is_err());
    assert!(Quality::from_raw(6.0).is_err());
    assert!(Quality::from_raw(3.2).is_err());
  }

  #[test]
  fn legacy_quality_maps_onto_buttons() {
    let map = |q| Rating::from_quality(Quality::new(q).unwrap());
    assert_eq!(map(0), Rating::Again);
    assert_eq!(map(1), Rating::Again);
    assert_eq!(map(2), Rating::Again);
    assert_eq!(map(3), Rating::Hard);
    assert_eq!(map(4), Rating::Good);
    assert_eq!(map(5), Rating::Easy);
  }

  #[test]
  fn correctness_threshold() {
    assert!(!Rating::Hard.is_correct());
    assert!(Rating::Good.is_correct());
    assert!(!Quality::new(2).unwrap().is_correct());
    assert!(Quality::new(3).unwrap().is_correct());
  }
}
