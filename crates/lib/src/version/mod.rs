//! Artifact versions and version ranges.
//!
//! A version is a sequence of dot-separated numeric segments optionally
//! followed by a qualifier: `42.15.145.99-SNAPSHOT` has the segments
//! `[42, 15, 145, 99]` and the qualifier `SNAPSHOT`.
//!
//! # Ordering
//!
//! - Numeric segments compare element-wise; missing trailing segments count as 0,
//!   so `1` == `1.0` == `1.0.0`.
//! - With equal numeric segments, an empty qualifier sorts *after* any non-empty
//!   one (`1-alpha` < `1`), and non-empty qualifiers compare lexicographically.
//! - A qualifier made only of zeros is the same as no qualifier (`1` == `1-0`).
//!
//! Ranges are covered in [`range`].

pub mod range;

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ParseError, ParseSubject};

pub use range::{Bound, Interval, VersionRange, parse_range};

/// Characters accepted between the numeric part and the qualifier.
const QUALIFIER_SEPARATORS: [char; 4] = ['-', '.', '_', '+'];

/// A parsed artifact version.
///
/// Equality and ordering follow [`compare`], so two versions with different
/// spellings (`1.0` and `1-0`) can be equal. The original text is kept for
/// display.
#[derive(Debug, Clone)]
pub struct Version {
  text: String,
  numbers: Vec<u64>,
  qualifier: String,
}

impl Version {
  /// Numeric segments in declaration order.
  pub fn numbers(&self) -> &[u64] {
    &self.numbers
  }

  /// Qualifier without its leading separator; empty when absent.
  pub fn qualifier(&self) -> &str {
    &self.qualifier
  }

  /// The text this version was parsed from (trimmed).
  pub fn as_str(&self) -> &str {
    &self.text
  }

  /// Whether the qualifier is absent or equivalent to absent.
  pub fn is_release(&self) -> bool {
    normalized_qualifier(&self.qualifier).is_empty()
  }

  /// Whether both versions have the same numeric segments (trailing zeros ignored).
  pub fn same_numbers(&self, other: &Version) -> bool {
    compare_numbers(&self.numbers, &other.numbers) == Ordering::Equal
  }
}

/// Parse a version string.
///
/// Leading dot-separated numeric groups become the segments. Whatever follows,
/// minus one leading separator (`-`, `.`, `_` or `+`), becomes the qualifier.
///
/// # Errors
///
/// Returns a [`ParseError`] when the input does not start with a numeric group
/// or a segment does not fit in a `u64`.
pub fn parse_version(text: &str) -> Result<Version, ParseError> {
  let trimmed = text.trim();
  let indent = text.len() - text.trim_start().len();
  let bytes = trimmed.as_bytes();
  let mut numbers = Vec::new();
  let mut pos = 0;

  loop {
    let start = pos;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
      pos += 1;
    }

    if pos == start {
      return Err(ParseError::new(
        ParseSubject::Version,
        text,
        indent + start,
        "expected a numeric segment",
      ));
    }

    let segment = trimmed[start..pos]
      .parse::<u64>()
      .map_err(|_| ParseError::new(ParseSubject::Version, text, indent + start, "numeric segment is too large"))?;
    numbers.push(segment);

    // A dot only continues the numeric part when a digit follows it;
    // otherwise it is the qualifier separator (`1.0.RELEASE`).
    let continues = bytes.get(pos) == Some(&b'.') && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit);
    if !continues {
      break;
    }
    pos += 1;
  }

  let rest = &trimmed[pos..];
  let qualifier = rest.strip_prefix(QUALIFIER_SEPARATORS).unwrap_or(rest);

  Ok(Version {
    text: trimmed.to_string(),
    numbers,
    qualifier: qualifier.to_string(),
  })
}

/// Total order over versions.
pub fn compare(a: &Version, b: &Version) -> Ordering {
  compare_numbers(&a.numbers, &b.numbers).then_with(|| compare_qualifiers(&a.qualifier, &b.qualifier))
}

fn compare_numbers(a: &[u64], b: &[u64]) -> Ordering {
  let len = a.len().max(b.len());
  (0..len)
    .map(|i| {
      let left = a.get(i).copied().unwrap_or(0);
      let right = b.get(i).copied().unwrap_or(0);
      left.cmp(&right)
    })
    .find(|ord| ord.is_ne())
    .unwrap_or(Ordering::Equal)
}

fn compare_qualifiers(a: &str, b: &str) -> Ordering {
  match (normalized_qualifier(a), normalized_qualifier(b)) {
    ("", "") => Ordering::Equal,
    ("", _) => Ordering::Greater,
    (_, "") => Ordering::Less,
    (left, right) => left.cmp(right),
  }
}

/// All-zero qualifiers (`0`, `00`) mean "no qualifier".
fn normalized_qualifier(qualifier: &str) -> &str {
  if qualifier.bytes().all(|b| b == b'0') {
    ""
  } else {
    qualifier
  }
}

impl PartialEq for Version {
  fn eq(&self, other: &Self) -> bool {
    compare(self, other) == Ordering::Equal
  }
}

impl Eq for Version {}

impl PartialOrd for Version {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for Version {
  fn cmp(&self, other: &Self) -> Ordering {
    compare(self, other)
  }
}

impl Hash for Version {
  fn hash<H: Hasher>(&self, state: &mut H) {
    // Must agree with `eq`: trailing zero segments and zero qualifiers are ignored.
    let significant = self.numbers.iter().rposition(|n| *n != 0).map_or(0, |i| i + 1);
    self.numbers[..significant].hash(state);
    normalized_qualifier(&self.qualifier).hash(state);
  }
}

impl fmt::Display for Version {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.text)
  }
}

impl FromStr for Version {
  type Err = ParseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    parse_version(s)
  }
}

impl Serialize for Version {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&self.text)
  }
}

impl<'de> Deserialize<'de> for Version {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let text = String::deserialize(deserializer)?;
    parse_version(&text).map_err(serde::de::Error::custom)
  }
}
