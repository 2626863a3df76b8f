//! Version range expressions.
//!
//! A range is a comma-separated list of intervals; a version is contained when
//! any interval accepts it.
//!
//! - `[1.0,2.0)` - bracketed interval; `[`/`]` are inclusive, `(`/`)` exclusive
//! - `(,1.0]` / `[1.2,)` - an empty bound is unbounded on that side
//! - `[1.5]` - exactly `1.5`
//! - `1.0` - recommended version: `1.0` or anything greater, except versions with
//!   the same numeric segments that carry a different qualifier
//!
//! Qualifier-bearing versions are below the release with the same numbers,
//! for bracketed bounds as well: `1.0-alpha` is inside `(,1.0]` and outside `[1.0,)`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{Version, compare, parse_version};
use crate::error::{ParseError, ParseSubject};

/// One side of a bracketed interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bound {
  pub version: Version,
  pub inclusive: bool,
}

/// A single interval of a [`VersionRange`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interval {
  /// Bracketed interval; `None` means unbounded on that side.
  Bounded { lower: Option<Bound>, upper: Option<Bound> },
  /// Bare version shorthand.
  Recommended(Version),
}

impl Interval {
  pub fn contains(&self, version: &Version) -> bool {
    match self {
      Interval::Bounded { lower, upper } => {
        let above_lower = lower.as_ref().is_none_or(|bound| match compare(version, &bound.version) {
          Ordering::Greater => true,
          Ordering::Equal => bound.inclusive,
          Ordering::Less => false,
        });
        let below_upper = upper.as_ref().is_none_or(|bound| match compare(version, &bound.version) {
          Ordering::Less => true,
          Ordering::Equal => bound.inclusive,
          Ordering::Greater => false,
        });
        above_lower && below_upper
      }
      Interval::Recommended(base) => match compare(version, base) {
        Ordering::Less => false,
        Ordering::Equal => true,
        // Same numbers but a different qualifier is a different line of releases.
        Ordering::Greater => !version.same_numbers(base) || version.is_release(),
      },
    }
  }
}

impl fmt::Display for Interval {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Interval::Recommended(version) => write!(f, "{version}"),
      Interval::Bounded {
        lower: Some(lower),
        upper: Some(upper),
      } if lower.inclusive && upper.inclusive && lower.version == upper.version => write!(f, "[{}]", lower.version),
      Interval::Bounded { lower, upper } => {
        let open = if lower.as_ref().is_some_and(|b| b.inclusive) { '[' } else { '(' };
        let close = if upper.as_ref().is_some_and(|b| b.inclusive) { ']' } else { ')' };
        let lower = lower.as_ref().map(|b| b.version.to_string()).unwrap_or_default();
        let upper = upper.as_ref().map(|b| b.version.to_string()).unwrap_or_default();
        write!(f, "{open}{lower},{upper}{close}")
      }
    }
  }
}

/// A parsed range expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
  intervals: Vec<Interval>,
}

impl VersionRange {
  pub fn intervals(&self) -> &[Interval] {
    &self.intervals
  }

  /// Whether any interval accepts `version`.
  pub fn contains(&self, version: &Version) -> bool {
    self.intervals.iter().any(|interval| interval.contains(version))
  }

  /// Pick the greatest candidate inside the range.
  pub fn select<'a, I>(&self, candidates: I) -> Option<&'a Version>
  where
    I: IntoIterator<Item = &'a Version>,
  {
    candidates.into_iter().filter(|candidate| self.contains(candidate)).max()
  }
}

/// Parse a range expression.
///
/// # Errors
///
/// Returns a [`ParseError`] for empty input, unbalanced brackets, intervals with
/// more than two bounds, inverted or empty intervals, and malformed versions.
pub fn parse_range(text: &str) -> Result<VersionRange, ParseError> {
  let err = |position: usize, reason: &str| ParseError::new(ParseSubject::Range, text, position, reason);

  if text.trim().is_empty() {
    return Err(err(0, "empty range"));
  }

  let bytes = text.as_bytes();
  let mut intervals = Vec::new();
  let mut pos = skip_whitespace(bytes, 0);

  loop {
    match bytes.get(pos) {
      Some(b'[') | Some(b'(') => {
        let lower_inclusive = bytes[pos] == b'[';
        let close = text[pos + 1..]
          .find([']', ')'])
          .map(|offset| pos + 1 + offset)
          .ok_or_else(|| err(text.len(), "missing closing bracket"))?;
        let upper_inclusive = bytes[close] == b']';
        let body = &text[pos + 1..close];
        intervals.push(parse_bracketed(text, pos, body, lower_inclusive, upper_inclusive)?);
        pos = close + 1;
      }
      Some(_) => {
        let end = text[pos..].find(',').map_or(text.len(), |offset| pos + offset);
        let token = text[pos..end].trim();
        if token.is_empty() {
          return Err(err(pos, "empty interval"));
        }
        if token.contains(['[', ']', '(', ')']) {
          return Err(err(pos, "unbalanced bracket"));
        }
        let version = parse_version(&text[pos..end]).map_err(|e| err(pos + e.position, &e.reason))?;
        intervals.push(Interval::Recommended(version));
        pos = end;
      }
      None => return Err(err(pos, "expected an interval")),
    }

    pos = skip_whitespace(bytes, pos);
    match bytes.get(pos) {
      None => break,
      Some(b',') => pos = skip_whitespace(bytes, pos + 1),
      Some(_) => return Err(err(pos, "expected ',' between intervals")),
    }
  }

  Ok(VersionRange { intervals })
}

fn parse_bracketed(
  text: &str,
  start: usize,
  body: &str,
  lower_inclusive: bool,
  upper_inclusive: bool,
) -> Result<Interval, ParseError> {
  let err = |reason: &str| ParseError::new(ParseSubject::Range, text, start, reason);
  let bound = |part: &str, inclusive: bool| -> Result<Option<Bound>, ParseError> {
    let part = part.trim();
    if part.is_empty() {
      return Ok(None);
    }
    let version = parse_version(part).map_err(|e| err(&e.reason))?;
    Ok(Some(Bound { version, inclusive }))
  };

  let parts: Vec<&str> = body.split(',').collect();
  match parts.as_slice() {
    [single] => {
      if !(lower_inclusive && upper_inclusive) {
        return Err(err("a single-version interval must be written as [version]"));
      }
      let bound = bound(single, true)?.ok_or_else(|| err("empty interval"))?;
      Ok(Interval::Bounded {
        lower: Some(bound.clone()),
        upper: Some(bound),
      })
    }
    [lower, upper] => {
      let lower = bound(lower, lower_inclusive)?;
      let upper = bound(upper, upper_inclusive)?;
      if let (Some(low), Some(high)) = (&lower, &upper) {
        match compare(&low.version, &high.version) {
          Ordering::Greater => return Err(err("lower bound is greater than upper bound")),
          Ordering::Equal if !(low.inclusive && high.inclusive) => return Err(err("interval is empty")),
          _ => {}
        }
      }
      Ok(Interval::Bounded { lower, upper })
    }
    _ => Err(err("an interval has at most two bounds")),
  }
}

fn skip_whitespace(bytes: &[u8], mut pos: usize) -> usize {
  while bytes.get(pos).is_some_and(u8::is_ascii_whitespace) {
    pos += 1;
  }
  pos
}

impl fmt::Display for VersionRange {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, interval) in self.intervals.iter().enumerate() {
      if i > 0 {
        f.write_str(",")?;
      }
      write!(f, "{interval}")?;
    }
    Ok(())
  }
}

impl FromStr for VersionRange {
  type Err = ParseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    parse_range(s)
  }
}

impl Serialize for VersionRange {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for VersionRange {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let text = String::deserialize(deserializer)?;
    parse_range(&text).map_err(serde::de::Error::custom)
  }
}
