//! Demand-driven key resolution with per-session memoization.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info, trace};

use super::config_graph::{ConfigGraph, ConfigId, ProjectId};
use super::memo::{Claim, Memo, Slot, SlotGuard};
use super::types::{Binding, BindingKind, EvalError, Value};
use crate::cancel::CancelToken;
use crate::task::{Task, parse_tasks};

/// Same-thread resolution chain, innermost last.
struct Frame<'a> {
  slot: &'a Slot,
  parent: Option<&'a Frame<'a>>,
}

impl Frame<'_> {
  fn contains(&self, slot: &Slot) -> bool {
    let mut frame = Some(self);
    while let Some(current) = frame {
      if current.slot == slot {
        return true;
      }
      frame = current.parent;
    }
    false
  }

  fn labels(&self, graph: &ConfigGraph) -> Vec<String> {
    let mut labels = Vec::new();
    let mut frame = Some(self);
    while let Some(current) = frame {
      labels.push(slot_label(graph, current.slot));
      frame = current.parent;
    }
    labels.reverse();
    labels
  }
}

fn slot_label(graph: &ConfigGraph, slot: &Slot) -> String {
  format!(
    "{}:{}",
    graph.scope_label(slot.project, &slot.stack),
    graph.key(slot.key).name
  )
}

/// Resolves keys against one [`ConfigGraph`].
///
/// Values are memoized per (key, project, configuration stack) for the life of
/// the session. The session is `Sync`: concurrent resolutions of the same slot
/// wait for a single computation. Tasks invoked with arguments are never
/// memoized.
pub struct EvalSession {
  graph: Arc<ConfigGraph>,
  memo: Memo,
  cancel: CancelToken,
  next_resolution: AtomicU64,
}

impl EvalSession {
  pub fn new(graph: Arc<ConfigGraph>) -> Self {
    Self {
      graph,
      memo: Memo::default(),
      cancel: CancelToken::new(),
      next_resolution: AtomicU64::new(1),
    }
  }

  pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
    self.cancel = cancel;
    self
  }

  pub fn graph(&self) -> &ConfigGraph {
    &self.graph
  }

  pub fn cancel_token(&self) -> &CancelToken {
    &self.cancel
  }

  /// Number of values memoized so far.
  pub fn memoized(&self) -> usize {
    self.memo.ready()
  }

  /// Resolve `key` in `project` (the root project when `None`) under `configurations`.
  ///
  /// # Errors
  ///
  /// Unknown names, [`EvalError::Undefined`] when nothing binds the key,
  /// [`EvalError::CyclicEvaluation`] when the key depends on itself, and any
  /// error raised by a binding.
  pub fn resolve<S: AsRef<str>>(
    &self,
    key: &str,
    project: Option<&str>,
    configurations: &[S],
  ) -> Result<Value, EvalError> {
    let (project, stack) = self.graph.scope_ids(project, configurations)?;
    let key = self.graph.key_id(key)?;
    self.resolve_slot(Slot { key, project, stack }, &[], None, self.next_id())
  }

  /// Run one task, exposing its arguments to the key's bindings.
  pub fn run(&self, task: &Task) -> Result<Value, EvalError> {
    let (project, stack) = self.graph.scope_ids(task.project.as_deref(), &task.configurations)?;
    let key = self.graph.key_id(&task.key)?;
    info!(task = %task, "running task");
    self.resolve_slot(Slot { key, project, stack }, &task.arguments, None, self.next_id())
  }

  /// Run tasks in order, stopping at the first failure or cancellation.
  pub fn run_all(&self, tasks: &[Task]) -> Result<Vec<Value>, EvalError> {
    let mut values = Vec::with_capacity(tasks.len());
    for task in tasks {
      if self.cancel.is_cancelled() {
        return Err(EvalError::Cancelled);
      }
      values.push(self.run(task)?);
    }
    Ok(values)
  }

  /// Parse a `;`-separated task expression and run it.
  pub fn run_expr(&self, expr: &str) -> Result<Vec<Value>, EvalError> {
    let tasks = parse_tasks(expr)?;
    self.run_all(&tasks)
  }

  fn next_id(&self) -> u64 {
    self.next_resolution.fetch_add(1, Ordering::Relaxed)
  }

  fn cycle(&self, parent: Option<&Frame<'_>>, slot: &Slot) -> EvalError {
    let mut chain = parent.map(|frame| frame.labels(&self.graph)).unwrap_or_default();
    chain.push(slot_label(&self.graph, slot));
    EvalError::CyclicEvaluation { chain }
  }

  fn resolve_slot(
    &self,
    slot: Slot,
    arguments: &[(String, String)],
    parent: Option<&Frame<'_>>,
    resolution: u64,
  ) -> Result<Value, EvalError> {
    if parent.is_some_and(|frame| frame.contains(&slot)) {
      return Err(self.cycle(parent, &slot));
    }
    if self.cancel.is_cancelled() {
      return Err(EvalError::Cancelled);
    }

    let guard = if arguments.is_empty() {
      match self.memo.claim(&slot, resolution) {
        Claim::Ready(value) => {
          trace!(slot = %slot_label(&self.graph, &slot), "memoized");
          return Ok(value);
        }
        Claim::Owned => Some(SlotGuard::new(&self.memo, slot.clone())),
        Claim::WouldDeadlock => return Err(self.cycle(parent, &slot)),
      }
    } else {
      None
    };

    let frame = Frame { slot: &slot, parent };
    let value = self.evaluate(&frame, arguments, resolution)?;
    if let Some(guard) = guard {
      guard.fulfil(value.clone());
    }
    Ok(value)
  }

  fn evaluate(&self, frame: &Frame<'_>, arguments: &[(String, String)], resolution: u64) -> Result<Value, EvalError> {
    let slot = frame.slot;
    let key = self.graph.key(slot.key);
    let label = slot_label(&self.graph, slot);
    let operations = self.graph.operations(slot.key, slot.project, &slot.stack);

    if operations.is_empty() {
      return Err(EvalError::Undefined(label));
    }
    let last_set = operations
      .iter()
      .rposition(|op| op.kind() == BindingKind::Set)
      .unwrap_or(0);

    debug!(
      slot = %label,
      operations = operations.len(),
      skipped = last_set,
      "evaluating"
    );

    let scope = Scope {
      session: self,
      project: slot.project,
      stack: &slot.stack,
      arguments,
      frame,
      resolution,
    };

    let mut value = key.ty.default_value();
    for op in &operations[last_set..] {
      value = match op.binding {
        Binding::Set(f) => f(&scope)?,
        Binding::Modify(f) => f(&scope, value)?,
      };
    }

    key.ty.coerce(value).map_err(|actual| EvalError::TypeMismatch {
      scope: label,
      expected: key.ty,
      actual,
    })
  }
}

/// What a binding sees while it runs: the scope it was resolved in, the task
/// arguments and access to other keys.
pub struct Scope<'s> {
  session: &'s EvalSession,
  project: ProjectId,
  stack: &'s [ConfigId],
  arguments: &'s [(String, String)],
  frame: &'s Frame<'s>,
  resolution: u64,
}

impl Scope<'_> {
  /// Resolve `key` in the same project and configuration stack.
  pub fn get(&self, key: &str) -> Result<Value, EvalError> {
    let key = self.session.graph.key_id(key)?;
    self.resolve(Slot {
      key,
      project: self.project,
      stack: self.stack.to_vec(),
    })
  }

  /// Resolve `key` in the same project under a different configuration stack.
  pub fn get_in<S: AsRef<str>>(&self, key: &str, configurations: &[S]) -> Result<Value, EvalError> {
    let graph = &self.session.graph;
    let project = graph.project_name(self.project);
    let (project, stack) = graph.scope_ids(Some(project), configurations)?;
    let key = graph.key_id(key)?;
    self.resolve(Slot { key, project, stack })
  }

  /// Resolve `key` in another project.
  pub fn get_from<S: AsRef<str>>(&self, project: &str, key: &str, configurations: &[S]) -> Result<Value, EvalError> {
    let graph = &self.session.graph;
    let (project, stack) = graph.scope_ids(Some(project), configurations)?;
    let key = graph.key_id(key)?;
    self.resolve(Slot { key, project, stack })
  }

  fn resolve(&self, slot: Slot) -> Result<Value, EvalError> {
    self.session.resolve_slot(slot, &[], Some(self.frame), self.resolution)
  }

  pub fn arguments(&self) -> &[(String, String)] {
    self.arguments
  }

  /// Named argument `name`, or positional argument `name` when it is a number.
  pub fn argument(&self, name: &str) -> Option<&str> {
    if let Some((_, value)) = self.arguments.iter().find(|(arg, _)| !arg.is_empty() && arg == name) {
      return Some(value);
    }
    let index: usize = name.parse().ok()?;
    self
      .arguments
      .iter()
      .filter(|(arg, _)| arg.is_empty())
      .nth(index)
      .map(|(_, value)| value.as_str())
  }

  pub fn project(&self) -> &str {
    self.session.graph.project_name(self.project)
  }

  pub fn configurations(&self) -> Vec<&str> {
    self
      .stack
      .iter()
      .map(|&config| self.session.graph.configuration_name(config))
      .collect()
  }

  /// Name of the key being evaluated.
  pub fn key(&self) -> &str {
    &self.session.graph.key(self.frame.slot.key).name
  }

  pub fn cancel_token(&self) -> &CancelToken {
    &self.session.cancel
  }

  /// A [`EvalError::Binding`] for the key being evaluated.
  pub fn fail(&self, message: impl Into<String>) -> EvalError {
    EvalError::Binding {
      key: slot_label(&self.session.graph, self.frame.slot),
      message: message.into(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::graph::{GraphBuilder, ValueType};
  use std::sync::atomic::AtomicUsize;
  use std::thread;
  use std::time::Duration;

  fn session(builder: GraphBuilder) -> EvalSession {
    EvalSession::new(Arc::new(builder.build().unwrap()))
  }

  /// `a -> [b, c]`, `b -> [c, a]`, `c -> [a, b]`; each appends its letter to `acc`.
  fn diamond() -> GraphBuilder {
    let mut builder = GraphBuilder::new();
    builder
      .project("root")
      .configuration("root", "a", &["b", "c"])
      .configuration("root", "b", &["c", "a"])
      .configuration("root", "c", &["a", "b"])
      .setting("acc", ValueType::Str)
      .task("trail", ValueType::Str)
      .bind("root", "acc", Binding::constant(""));
    for letter in ["a", "b", "c"] {
      builder.bind_in("root", letter, "acc", Binding::append(letter));
    }
    builder
      .bind(
        "root",
        "trail",
        Binding::set(|scope| {
          let mut out = String::new();
          for configuration in ["a", "b", "c"] {
            out.push_str(&scope.get_in("acc", &[configuration])?.to_string());
          }
          Ok(Value::Str(out))
        }),
      )
      .bind("root", "trail", Binding::append("."));
    builder
  }

  mod fold {
    use super::*;

    #[test]
    fn diamond_trail_is_pinned() {
      let session = session(diamond());
      let trail = session.resolve("trail", None, &[] as &[&str]).unwrap();
      assert_eq!(trail, Value::from("abcbcacab."));
      assert_eq!(trail.to_string().len(), 10);
    }

    #[test]
    fn last_set_hides_earlier_operations() {
      let evaluated = Arc::new(AtomicUsize::new(0));
      let counter = Arc::clone(&evaluated);

      let mut builder = GraphBuilder::new();
      builder
        .project("p")
        .configuration("p", "test", &[])
        .setting("name", ValueType::Str)
        .bind(
          "p",
          "name",
          Binding::set(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Value::from("hidden"))
          }),
        )
        .bind_in("p", "test", "name", Binding::constant("shown"))
        .bind_in("p", "test", "name", Binding::append("!"));
      let session = session(builder);

      assert_eq!(session.resolve("name", None, &["test"]).unwrap(), Value::from("shown!"));
      assert_eq!(evaluated.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn modify_without_set_starts_from_type_default() {
      let mut builder = GraphBuilder::new();
      builder
        .project("p")
        .setting("count", ValueType::Int)
        .bind("p", "count", Binding::append(2_i64))
        .bind("p", "count", Binding::append(3_i64));
      assert_eq!(
        session(builder).resolve("count", None, &[] as &[&str]).unwrap(),
        Value::Int(5)
      );
    }

    #[test]
    fn no_operations_is_undefined() {
      let mut builder = GraphBuilder::new();
      builder.project("p").setting("missing", ValueType::Str);
      let err = session(builder).resolve("missing", None, &[] as &[&str]).unwrap_err();
      assert!(matches!(err, EvalError::Undefined(label) if label == "p:missing"));
    }

    #[test]
    fn result_is_type_checked() {
      let mut builder = GraphBuilder::new();
      builder
        .project("p")
        .setting("n", ValueType::Int)
        .bind("p", "n", Binding::constant("text"));
      let err = session(builder).resolve("n", None, &[] as &[&str]).unwrap_err();
      assert!(matches!(
        err,
        EvalError::TypeMismatch {
          expected: ValueType::Int,
          actual: ValueType::Str,
          ..
        }
      ));
    }
  }

  mod cycles {
    use super::*;

    fn cyclic() -> GraphBuilder {
      let mut builder = GraphBuilder::new();
      builder
        .project("p")
        .setting("x", ValueType::Int)
        .setting("y", ValueType::Int)
        .setting("z", ValueType::Int)
        .bind("p", "x", Binding::set(|scope| scope.get("y")))
        .bind("p", "y", Binding::set(|scope| scope.get("x")))
        .bind("p", "z", Binding::constant(3_i64));
      builder
    }

    #[test]
    fn self_dependency_reports_chain() {
      let session = session(cyclic());
      let err = session.resolve("x", None, &[] as &[&str]).unwrap_err();
      match err {
        EvalError::CyclicEvaluation { chain } => assert_eq!(chain, vec!["p:x", "p:y", "p:x"]),
        other => panic!("unexpected error: {other:?}"),
      }
    }

    #[test]
    fn failure_does_not_poison_other_keys() {
      let session = session(cyclic());
      assert!(session.resolve("x", None, &[] as &[&str]).is_err());
      assert_eq!(session.resolve("z", None, &[] as &[&str]).unwrap(), Value::Int(3));
      // failed slots are released, so the cycle is reported again rather than hanging
      assert!(matches!(
        session.resolve("y", None, &[] as &[&str]),
        Err(EvalError::CyclicEvaluation { .. })
      ));
      assert_eq!(session.memoized(), 1);
    }
  }

  mod memo {
    use super::*;

    #[test]
    fn concurrent_requests_compute_once() {
      let calls = Arc::new(AtomicUsize::new(0));
      let counter = Arc::clone(&calls);

      let mut builder = GraphBuilder::new();
      builder.project("p").setting("slow", ValueType::Int).bind(
        "p",
        "slow",
        Binding::set(move |_| {
          counter.fetch_add(1, Ordering::SeqCst);
          thread::sleep(Duration::from_millis(30));
          Ok(Value::Int(42))
        }),
      );
      let session = session(builder);

      thread::scope(|s| {
        let handles: Vec<_> = (0..8)
          .map(|_| s.spawn(|| session.resolve("slow", None, &[] as &[&str]).unwrap()))
          .collect();
        for handle in handles {
          assert_eq!(handle.join().unwrap(), Value::Int(42));
        }
      });
      assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn tasks_with_arguments_are_not_memoized() {
      let mut builder = GraphBuilder::new();
      builder.project("p").task("echo", ValueType::Str).bind(
        "p",
        "echo",
        Binding::set(|scope| Ok(Value::from(scope.argument("0").unwrap_or("none")))),
      );
      let session = session(builder);

      assert_eq!(session.run_expr("echo hi; echo there").unwrap(), vec![
        Value::from("hi"),
        Value::from("there")
      ]);
      assert_eq!(session.run_expr("echo").unwrap(), vec![Value::from("none")]);
      assert_eq!(session.memoized(), 1);
    }
  }

  #[test]
  fn named_arguments_and_scope_introspection() {
    let mut builder = GraphBuilder::new();
    builder
      .project("app")
      .configuration("app", "test", &[])
      .task("describe", ValueType::Str)
      .bind(
        "app",
        "describe",
        Binding::set(|scope| {
          Ok(Value::Str(format!(
            "{}/{}:{} level={}",
            scope.project(),
            scope.configurations().join(":"),
            scope.key(),
            scope.argument("level").unwrap_or("?")
          )))
        }),
      );
    let session = session(builder);

    let values = session.run_expr("app/test:describe level=3").unwrap();
    assert_eq!(values, vec![Value::from("app/test:describe level=3")]);
  }

  #[test]
  fn cancelled_session_stops_between_tasks() {
    let cancel = CancelToken::new();
    let mut builder = GraphBuilder::new();
    builder.project("p").setting("k", ValueType::Int).bind("p", "k", Binding::constant(1_i64));
    let session = session(builder).with_cancel(cancel.clone());

    assert!(session.run_all(&[Task::new("k")]).is_ok());
    cancel.cancel();
    assert!(matches!(session.run_all(&[Task::new("k")]), Err(EvalError::Cancelled)));
  }

  #[test]
  fn binding_errors_name_the_key() {
    let mut builder = GraphBuilder::new();
    builder
      .project("p")
      .setting("bad", ValueType::Str)
      .bind("p", "bad", Binding::set(|scope| Err(scope.fail("boom"))));
    let err = session(builder).resolve("bad", None, &[] as &[&str]).unwrap_err();
    assert_eq!(err.to_string(), "p:bad: boom");
  }
}
