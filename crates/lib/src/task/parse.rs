//! Tokenizing and parsing of task expressions.
//!
//! Both entry points reduce their input to a list of words and `;` separators,
//! then share the same grammar. Raw strings honour quotes; pre-split argument
//! lists are taken as-is, so the two agree whenever the raw string has no quotes.

use tracing::trace;

use super::Task;
use crate::error::{ParseError, ParseSubject};

/// Separators of the task head, around which whitespace is insignificant.
const HEAD_JOINERS: &[char] = &['/', ':'];
/// Separator between an argument's name and value.
const ARGUMENT_JOINERS: &[char] = &['='];

/// A whitespace-delimited word.
#[derive(Debug, Clone)]
struct Word {
  text: String,
  /// Byte offset in `text` where quoted content begins. Separators are only
  /// recognized before this offset.
  literal_from: Option<usize>,
  /// Position of the word in the (joined) input.
  pos: usize,
}

impl Word {
  fn new(pos: usize) -> Self {
    Self {
      text: String::new(),
      literal_from: None,
      pos,
    }
  }

  fn plain(&self) -> &str {
    &self.text[..self.literal_from.unwrap_or(self.text.len())]
  }

  fn open_end(&self, joiners: &[char]) -> bool {
    self.literal_from.is_none() && self.text.ends_with(joiners)
  }

  fn open_start(&self, joiners: &[char]) -> bool {
    self.literal_from != Some(0) && self.text.starts_with(joiners)
  }

  fn append(&mut self, other: Word) {
    if self.literal_from.is_none() {
      self.literal_from = other.literal_from.map(|offset| self.text.len() + offset);
    }
    self.text.push_str(&other.text);
  }
}

#[derive(Debug)]
enum Piece {
  Word(Word),
  Separator,
}

/// Parse a raw task string such as `core/test:run k=v "two words"; compile`.
///
/// Single and double quotes group a value into one argument; inside double
/// quotes a backslash escapes the next character.
///
/// # Errors
///
/// Returns a [`ParseError`] for unbalanced quotes or a malformed task head.
pub fn parse_tasks(input: &str) -> Result<Vec<Task>, ParseError> {
  let pieces = split_raw(input)?;
  parse_pieces(pieces, input)
}

/// Parse an already-tokenized argument list, e.g. from `std::env::args`.
///
/// No quote processing is applied. A `;` inside any token still separates tasks.
///
/// # Errors
///
/// Returns a [`ParseError`] for a malformed task head or argument.
pub fn parse_task_args<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<Task>, ParseError> {
  let joined = tokens.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(" ");
  let pieces = split_tokens(tokens);
  parse_pieces(pieces, &joined)
}

fn split_raw(input: &str) -> Result<Vec<Piece>, ParseError> {
  let mut pieces = Vec::new();
  let mut current: Option<Word> = None;
  let mut chars = input.char_indices();

  while let Some((pos, ch)) = chars.next() {
    match ch {
      c if c.is_whitespace() => flush(&mut current, &mut pieces),
      ';' => {
        flush(&mut current, &mut pieces);
        pieces.push(Piece::Separator);
      }
      '"' | '\'' => {
        let word = current.get_or_insert_with(|| Word::new(pos));
        if word.literal_from.is_none() {
          word.literal_from = Some(word.text.len());
        }

        let mut closed = false;
        while let Some((_, c)) = chars.next() {
          if c == ch {
            closed = true;
            break;
          }
          if c == '\\' && ch == '"' {
            match chars.next() {
              Some((_, escaped)) => word.text.push(escaped),
              None => break,
            }
            continue;
          }
          word.text.push(c);
        }

        if !closed {
          return Err(ParseError::new(ParseSubject::Task, input, pos, "unbalanced quote"));
        }
      }
      c => current.get_or_insert_with(|| Word::new(pos)).text.push(c),
    }
  }

  flush(&mut current, &mut pieces);
  Ok(pieces)
}

fn flush(current: &mut Option<Word>, pieces: &mut Vec<Piece>) {
  if let Some(word) = current.take() {
    pieces.push(Piece::Word(word));
  }
}

fn split_tokens<S: AsRef<str>>(tokens: &[S]) -> Vec<Piece> {
  let mut pieces = Vec::new();
  let mut offset = 0;

  for token in tokens {
    let token = token.as_ref();
    let mut start = offset;
    for (i, part) in token.split(';').enumerate() {
      if i > 0 {
        pieces.push(Piece::Separator);
      }
      if !part.is_empty() {
        pieces.push(Piece::Word(Word {
          text: part.to_string(),
          literal_from: None,
          pos: start,
        }));
      }
      start += part.len() + 1;
    }
    offset += token.len() + 1;
  }

  pieces
}

fn parse_pieces(pieces: Vec<Piece>, input: &str) -> Result<Vec<Task>, ParseError> {
  let mut tasks = Vec::new();
  let mut segment = Vec::new();

  for piece in pieces.into_iter().chain(std::iter::once(Piece::Separator)) {
    match piece {
      Piece::Word(word) => segment.push(word),
      Piece::Separator => {
        if !segment.is_empty() {
          let task = parse_segment(std::mem::take(&mut segment), input)?;
          trace!(task = %task, "parsed task");
          tasks.push(task);
        }
      }
    }
  }

  Ok(tasks)
}

fn parse_segment(words: Vec<Word>, input: &str) -> Result<Task, ParseError> {
  let mut words = words.into_iter().peekable();
  let Some(mut head) = words.next() else {
    return Err(ParseError::new(ParseSubject::Task, input, 0, "missing key name"));
  };
  while let Some(next) = words.next_if(|next| {
    head.open_end(HEAD_JOINERS) || (next.open_start(HEAD_JOINERS) && continues_head(&head, next))
  }) {
    head.append(next);
  }

  let (project, configurations, key) = parse_head(&head, input)?;
  let arguments = glue_arguments(words)
    .into_iter()
    .map(|unit| parse_argument(unit, input))
    .collect::<Result<Vec<_>, _>>()?;

  Ok(Task {
    project,
    configurations,
    key,
    arguments,
  })
}

/// Whether `next`, which starts with `/` or `:`, still belongs to `head`.
///
/// It does when the joined text is a well-formed head so far: at most one
/// `/`, placed before any `:`, and no `=`. Otherwise `next` is the first
/// argument, e.g. the path in `run /tmp/file`.
fn continues_head(head: &Word, next: &Word) -> bool {
  if head.literal_from.is_some() {
    return false;
  }
  let joined = format!("{}{}", head.text, next.plain());
  let slash = joined.find('/');
  let colon = joined.find(':');
  !joined.contains('=')
    && joined.matches('/').count() <= 1
    && match (slash, colon) {
      (Some(slash), Some(colon)) => slash < colon,
      _ => true,
    }
}

/// Merge argument words separated only by whitespace around `=`.
fn glue_arguments(words: impl Iterator<Item = Word>) -> Vec<Word> {
  let mut units: Vec<Word> = Vec::new();
  for word in words {
    let attach =
      units.last().is_some_and(|prev| prev.open_end(ARGUMENT_JOINERS)) || word.open_start(ARGUMENT_JOINERS);
    match units.last_mut() {
      Some(prev) if attach => prev.append(word),
      _ => units.push(word),
    }
  }
  units
}

type Head = (Option<String>, Vec<String>, String);

fn parse_head(unit: &Word, input: &str) -> Result<Head, ParseError> {
  let err = |offset: usize, reason: &str| ParseError::new(ParseSubject::Task, input, unit.pos + offset, reason);
  let plain = unit.plain();
  let text = unit.text.as_str();

  if let Some(offset) = plain.find('=') {
    return Err(err(offset, "expected a key name before arguments"));
  }

  let (project, rest_start) = match plain.find('/') {
    Some(slash) => {
      if let Some(second) = plain[slash + 1..].find('/') {
        return Err(err(slash + 1 + second, "only one project separator is allowed"));
      }
      if slash == 0 {
        return Err(err(0, "empty project name"));
      }
      (Some(text[..slash].to_string()), slash + 1)
    }
    None => (None, 0),
  };

  let mut names = Vec::new();
  let mut start = rest_start;
  for (offset, c) in plain[rest_start..].char_indices() {
    if c == ':' {
      let end = rest_start + offset;
      if end == start {
        return Err(err(start, "empty configuration name"));
      }
      names.push(text[start..end].to_string());
      start = end + 1;
    }
  }

  let key = text[start..].to_string();
  if key.is_empty() {
    return Err(err(start, "missing key name"));
  }

  Ok((project, names, key))
}

fn parse_argument(unit: Word, input: &str) -> Result<(String, String), ParseError> {
  match unit.plain().find('=') {
    Some(0) => Err(ParseError::new(
      ParseSubject::Task,
      input,
      unit.pos,
      "empty argument name",
    )),
    Some(eq) => Ok((unit.text[..eq].to_string(), unit.text[eq + 1..].to_string())),
    None => Ok((String::new(), unit.text)),
  }
}
