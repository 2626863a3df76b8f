//! Script-header directive scanning.
//!
//! Build scripts may start with a header of directives that declare
//! dependencies, repositories, compiler plugins and classpath entries:
//!
//! ```text
//! #!/usr/bin/env cairn
//! // build header
//! //> dep "org.example" "core" "1.2.0"
//! //> repository central https://repo.example.org/maven2
//!
//! object Main { ... }   <- scanning stops here
//! ```
//!
//! [`scan`] walks the header and reports each recognized directive to a
//! callback; [`collect_facts`] turns the standard directive set into
//! [`DirectiveFact`]s that the configuration graph consumes as plain data.

mod facts;
pub mod plugin;

use thiserror::Error;
use tracing::{debug, trace};

use crate::error::{ParseError, ParseSubject};

pub use facts::{DirectiveFact, STANDARD_DIRECTIVES, collect_facts};
pub use plugin::DirectivePlugin;

/// Marker that introduces a directive line.
pub const DIRECTIVE_MARKER: &str = "//>";

/// A directive name and the argument counts it accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectiveSpec {
  pub name: &'static str,
  pub arities: &'static [usize],
}

/// Errors from scanning a header.
#[derive(Debug, Error)]
pub enum DirectiveError {
  /// Malformed directive syntax (unbalanced quotes, wrong argument count).
  #[error(transparent)]
  Parse(#[from] ParseError),

  /// The callback rejected a well-formed directive.
  #[error("line {line}: directive '{name}' rejected: {message}")]
  Rejected { line: usize, name: String, message: String },
}

/// Outcome of a successful scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanSummary {
  /// Number of recognized directives reported to the callback.
  pub directives: usize,
  /// 1-based line number of the first non-header line, if scanning stopped early.
  pub stopped_at: Option<usize>,
}

/// A recognized directive as handed to the scan callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive<'a> {
  pub spec: &'a DirectiveSpec,
  pub args: Vec<String>,
  /// 1-based line number.
  pub line: usize,
}

/// Scan the header of `input` for directives listed in `specs`.
///
/// Blank lines, `//` comments and a `#!` first line are skipped. The first
/// line that is none of those, and not a directive, ends the scan. Directives
/// whose name is not in `specs` are skipped.
///
/// # Errors
///
/// Returns [`DirectiveError::Parse`] for unbalanced quotes or a wrong argument
/// count, and whatever error the callback returns.
pub fn scan<F>(input: &str, specs: &[DirectiveSpec], mut on_directive: F) -> Result<ScanSummary, DirectiveError>
where
  F: FnMut(Directive<'_>) -> Result<(), DirectiveError>,
{
  let mut summary = ScanSummary::default();

  for (index, raw_line) in input.lines().enumerate() {
    let line_no = index + 1;
    let line = raw_line.trim();

    if line.is_empty() || (index == 0 && line.starts_with("#!")) {
      continue;
    }

    let Some(body) = line.strip_prefix(DIRECTIVE_MARKER) else {
      if line.starts_with("//") {
        continue;
      }
      trace!(line = line_no, "header ended");
      summary.stopped_at = Some(line_no);
      break;
    };

    let offset = raw_line.len() - raw_line.trim_start().len() + DIRECTIVE_MARKER.len();
    let words = split_words(body).map_err(|(pos, reason)| directive_error(raw_line, line_no, offset + pos, reason))?;
    let Some((name, args)) = words.split_first() else {
      return Err(directive_error(raw_line, line_no, offset, "missing directive name").into());
    };

    let Some(spec) = specs.iter().find(|spec| spec.name == name.as_str()) else {
      debug!(line = line_no, directive = %name, "skipping unrecognized directive");
      continue;
    };

    if !spec.arities.contains(&args.len()) {
      let expected = spec
        .arities
        .iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join(" or ");
      let reason = format!("'{}' takes {expected} argument(s), got {}", spec.name, args.len());
      return Err(directive_error(raw_line, line_no, offset, &reason).into());
    }

    on_directive(Directive {
      spec,
      args: args.to_vec(),
      line: line_no,
    })?;
    summary.directives += 1;
  }

  Ok(summary)
}

fn directive_error(line: &str, line_no: usize, position: usize, reason: &str) -> ParseError {
  ParseError::new(ParseSubject::Directive, line, position, format!("line {line_no}: {reason}"))
}

/// Split on whitespace, honouring double-quoted words with backslash escapes.
fn split_words(body: &str) -> Result<Vec<String>, (usize, &'static str)> {
  let mut words = Vec::new();
  let mut current: Option<String> = None;
  let mut chars = body.char_indices();

  while let Some((pos, ch)) = chars.next() {
    match ch {
      c if c.is_whitespace() => words.extend(current.take()),
      '"' => {
        let word = current.get_or_insert_with(String::new);
        let mut closed = false;
        while let Some((_, c)) = chars.next() {
          match c {
            '"' => {
              closed = true;
              break;
            }
            '\\' => match chars.next() {
              Some((_, escaped)) => word.push(escaped),
              None => break,
            },
            c => word.push(c),
          }
        }
        if !closed {
          return Err((pos, "unbalanced quote"));
        }
      }
      c => current.get_or_insert_with(String::new).push(c),
    }
  }

  words.extend(current);
  Ok(words)
}
