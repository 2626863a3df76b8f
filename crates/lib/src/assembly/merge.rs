//! Merging assembly inputs into one tree.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::classify::file_name;
use super::policy::MergePolicy;
use super::types::{AssemblyError, AssemblyInputs, AssemblySource, MergeReport, MergeStrategy, MergedTree};
use crate::cancel::CancelToken;
use crate::util::hash::hash_bytes;

/// Chooses the destination of a source moved aside by [`MergeStrategy::Rename`].
pub trait Renamer: Send + Sync {
  fn rename(&self, path: &str, source: &AssemblySource) -> String;
}

impl<F> Renamer for F
where
  F: Fn(&str, &AssemblySource) -> String + Send + Sync,
{
  fn rename(&self, path: &str, source: &AssemblySource) -> String {
    self(path, source)
  }
}

/// `dir/NAME.ext` -> `dir/NAME_<origin>.ext`, with the origin reduced to its
/// last path component and unusual characters replaced by `_`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OriginSuffixRenamer;

impl Renamer for OriginSuffixRenamer {
  fn rename(&self, path: &str, source: &AssemblySource) -> String {
    let name = file_name(path);
    let dir = &path[..path.len() - name.len()];
    let tag: String = source
      .origin()
      .trim_end_matches(['/', '\\'])
      .rsplit(['/', '\\'])
      .next()
      .unwrap_or_default()
      .chars()
      .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '.') { c } else { '_' })
      .collect();

    match name.rfind('.') {
      Some(dot) if dot > 0 => format!("{dir}{}_{tag}{}", &name[..dot], &name[dot..]),
      _ => format!("{dir}{name}_{tag}"),
    }
  }
}

struct Output {
  path: String,
  bytes: Arc<[u8]>,
  renamed_from: Option<String>,
}

struct PathOutcome {
  outputs: Vec<Output>,
  report: MergeReport,
}

/// Merge configuration. Independent paths are merged in parallel; the work for
/// one path is sequential.
pub struct Merger {
  policy: MergePolicy,
  renamer: Arc<dyn Renamer>,
  cancel: CancelToken,
  parallelism: Option<usize>,
}

impl Merger {
  pub fn new(policy: MergePolicy) -> Self {
    Self {
      policy,
      renamer: Arc::new(OriginSuffixRenamer),
      cancel: CancelToken::new(),
      parallelism: None,
    }
  }

  pub fn renamer(mut self, renamer: impl Renamer + 'static) -> Self {
    self.renamer = Arc::new(renamer);
    self
  }

  pub fn cancel(mut self, cancel: CancelToken) -> Self {
    self.cancel = cancel;
    self
  }

  /// Worker threads for merging; rayon's global pool when unset.
  pub fn parallelism(mut self, threads: usize) -> Self {
    self.parallelism = Some(threads);
    self
  }

  pub fn policy(&self) -> &MergePolicy {
    &self.policy
  }

  /// Merge every path of `inputs`.
  ///
  /// # Errors
  ///
  /// Any per-path failure aborts the whole merge; the failure reported is the
  /// first in destination-path order. [`AssemblyError::Cancelled`] when the
  /// cancel token fires.
  pub fn merge(&self, inputs: &AssemblyInputs) -> Result<MergedTree, AssemblyError> {
    info!(paths = inputs.len(), "merging assembly inputs");

    let run = || {
      inputs
        .entries()
        .par_iter()
        .map(|(path, sources)| (path.as_str(), self.merge_path(path, sources)))
        .collect::<Vec<_>>()
    };

    let mut results: Vec<(&str, Result<PathOutcome, AssemblyError>)> = match self.parallelism {
      Some(threads) => match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => pool.install(run),
        Err(e) => {
          warn!(threads, error = %e, "falling back to the global thread pool");
          run()
        }
      },
      None => run(),
    };

    if self.cancel.is_cancelled() {
      return Err(AssemblyError::Cancelled);
    }

    results.sort_by(|a, b| a.0.cmp(b.0));

    let mut files: BTreeMap<String, Arc<[u8]>> = BTreeMap::new();
    let mut renamed: HashSet<String> = HashSet::new();
    let mut reports = Vec::with_capacity(results.len());

    for (path, result) in results {
      let outcome = result?;
      for output in outcome.outputs {
        if let Some(origin) = output.renamed_from {
          let taken = inputs.contains(&output.path) || files.contains_key(&output.path);
          if taken || !renamed.insert(output.path.clone()) {
            return Err(AssemblyError::RenameCollision {
              path: path.to_string(),
              renamed: output.path,
              origin,
            });
          }
        }
        files.insert(output.path, output.bytes);
      }
      reports.push(outcome.report);
    }

    let tree = MergedTree { files, reports };
    info!(files = tree.len(), digest = %tree.digest().short(), "merge complete");
    Ok(tree)
  }

  fn merge_path(&self, path: &str, sources: &[AssemblySource]) -> Result<PathOutcome, AssemblyError> {
    if self.cancel.is_cancelled() {
      return Err(AssemblyError::Cancelled);
    }

    let origins = sources.iter().map(|s| s.origin().to_string()).collect();
    let keep = |bytes: Arc<[u8]>| vec![output(path, bytes)];

    let (strategy, outputs) = match sources {
      [single] => (None, keep(load(path, single)?)),
      _ => {
        let strategy = self.policy.strategy_for(path);
        debug!(path, %strategy, sources = sources.len(), "merging path");
        let outputs = match strategy {
          MergeStrategy::First => keep(load(path, &sources[0])?),
          MergeStrategy::Last => keep(load(path, &sources[sources.len() - 1])?),
          MergeStrategy::SingleOwn => keep(load(path, single_own(path, sources)?)?),
          MergeStrategy::SingleOrError => {
            return Err(AssemblyError::AmbiguousMerge {
              path: path.to_string(),
              origins,
            });
          }
          MergeStrategy::Concatenate => {
            let mut out = Vec::new();
            for source in sources {
              out.extend_from_slice(&load(path, source)?);
            }
            keep(out.into())
          }
          MergeStrategy::Lines => keep(merge_lines(path, sources, false)?.into()),
          MergeStrategy::UniqueLines => keep(merge_lines(path, sources, true)?.into()),
          MergeStrategy::Discard => Vec::new(),
          MergeStrategy::Deduplicate => keep(deduplicate(path, sources)?),
          MergeStrategy::Rename => self.rename(path, sources)?,
        };
        (Some(strategy), outputs)
      }
    };

    let digest = outputs
      .iter()
      .find(|o| o.path == path)
      .map(|o| hash_bytes(&o.bytes).short().to_string());
    let report = MergeReport {
      path: path.to_string(),
      strategy,
      origins,
      outputs: outputs.iter().map(|o| o.path.clone()).collect(),
      digest,
    };
    Ok(PathOutcome { outputs, report })
  }

  fn rename(&self, path: &str, sources: &[AssemblySource]) -> Result<Vec<Output>, AssemblyError> {
    let survivor = sources.iter().position(AssemblySource::is_own).unwrap_or(0);
    let mut outputs = vec![output(path, load(path, &sources[survivor])?)];
    for (i, source) in sources.iter().enumerate() {
      if i == survivor {
        continue;
      }
      let target = self.renamer.rename(path, source);
      debug!(path, origin = source.origin(), renamed = %target, "renaming");
      outputs.push(Output {
        path: target,
        bytes: load(path, source)?,
        renamed_from: Some(source.origin().to_string()),
      });
    }
    Ok(outputs)
  }
}

/// Merge `inputs` with `policy`, the given renamer and cancel token.
pub fn merge(
  inputs: &AssemblyInputs,
  policy: &MergePolicy,
  renamer: impl Renamer + 'static,
  cancel: &CancelToken,
) -> Result<MergedTree, AssemblyError> {
  Merger::new(policy.clone())
    .renamer(renamer)
    .cancel(cancel.clone())
    .merge(inputs)
}

fn output(path: &str, bytes: Arc<[u8]>) -> Output {
  Output {
    path: path.to_string(),
    bytes,
    renamed_from: None,
  }
}

fn load(path: &str, source: &AssemblySource) -> Result<Arc<[u8]>, AssemblyError> {
  source.bytes().map_err(|e| AssemblyError::Load {
    path: path.to_string(),
    origin: source.describe(),
    source: e,
  })
}

fn single_own<'a>(path: &str, sources: &'a [AssemblySource]) -> Result<&'a AssemblySource, AssemblyError> {
  let own: Vec<&AssemblySource> = sources.iter().filter(|s| s.is_own()).collect();
  match own.as_slice() {
    [one] => Ok(*one),
    [] => Err(AssemblyError::AmbiguousMerge {
      path: path.to_string(),
      origins: sources.iter().map(|s| s.origin().to_string()).collect(),
    }),
    many => Err(AssemblyError::MultipleOwnSources {
      path: path.to_string(),
      origins: many.iter().map(|s| s.origin().to_string()).collect(),
    }),
  }
}

fn deduplicate(path: &str, sources: &[AssemblySource]) -> Result<Arc<[u8]>, AssemblyError> {
  let loaded = sources
    .iter()
    .map(|source| load(path, source))
    .collect::<Result<Vec<_>, _>>()?;
  let first = &loaded[0];
  if loaded.iter().all(|bytes| bytes == first) {
    return Ok(Arc::clone(first));
  }
  Err(AssemblyError::ConflictingContent {
    path: path.to_string(),
    origins: sources.iter().map(|s| s.origin().to_string()).collect(),
    digests: loaded.iter().map(|b| hash_bytes(b).short().to_string()).collect(),
  })
}

/// Concatenate the sources' lines, normalized to the dominant line ending.
///
/// Trailing empty lines are dropped first; the dominant ending is counted over
/// the lines that remain.
fn merge_lines(path: &str, sources: &[AssemblySource], unique: bool) -> Result<Vec<u8>, AssemblyError> {
  let mut lines: Vec<(String, Option<&'static str>)> = Vec::new();

  for source in sources {
    let bytes = load(path, source)?;
    let text = std::str::from_utf8(&bytes).map_err(|_| AssemblyError::InvalidText {
      path: path.to_string(),
      origin: source.origin().to_string(),
    })?;
    for raw in text.split_inclusive('\n') {
      let line = match raw.strip_suffix("\r\n") {
        Some(line) => (line.to_string(), Some("\r\n")),
        None => match raw.strip_suffix('\n') {
          Some(line) => (line.to_string(), Some("\n")),
          None => (raw.to_string(), None),
        },
      };
      lines.push(line);
    }
  }

  if unique {
    let mut seen = HashSet::new();
    lines.retain(|(line, _)| seen.insert(line.clone()));
  }
  while lines.last().is_some_and(|(line, _)| line.is_empty()) {
    lines.pop();
  }
  if lines.is_empty() {
    return Ok(Vec::new());
  }

  let crlf = lines.iter().filter(|(_, ending)| *ending == Some("\r\n")).count();
  let lf = lines.iter().filter(|(_, ending)| *ending == Some("\n")).count();
  let ending = if crlf > lf { "\r\n" } else { "\n" };

  let mut out = String::new();
  for (line, _) in &lines {
    out.push_str(line);
    out.push_str(ending);
  }
  Ok(out.into_bytes())
}
