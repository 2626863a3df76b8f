//! Parse errors shared by every text format the core understands.
//!
//! Versions, version ranges, task expressions and script-header directives all
//! report malformed input through [`ParseError`], which carries the offending
//! text and the byte position where parsing gave up.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which grammar rejected the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParseSubject {
  Version,
  Range,
  Task,
  Directive,
}

impl fmt::Display for ParseSubject {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      ParseSubject::Version => "version",
      ParseSubject::Range => "version range",
      ParseSubject::Task => "task expression",
      ParseSubject::Directive => "directive",
    };
    f.write_str(name)
  }
}

/// Malformed version, range, task or directive text.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("invalid {subject} '{input}' at position {position}: {reason}")]
pub struct ParseError {
  /// The grammar that rejected the input.
  pub subject: ParseSubject,
  /// The offending text (the whole input, or the offending line for directives).
  pub input: String,
  /// Byte offset into `input` where the problem was found.
  pub position: usize,
  /// Human-readable description of the problem.
  pub reason: String,
}

impl ParseError {
  pub fn new(subject: ParseSubject, input: impl Into<String>, position: usize, reason: impl Into<String>) -> Self {
    Self {
      subject,
      input: input.into(),
      position,
      reason: reason.into(),
    }
  }
}
