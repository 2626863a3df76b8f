use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use cairn_lib::graph::{Binding, BuildDefinition, EvalError, EvalSession, GraphBuilder, Value, ValueType};
use tracing_test::traced_test;

fn letter(letter: &'static str) -> Binding {
  Binding::modify(move |scope, current| current.append(Value::from(letter)).map_err(|e| scope.fail(e)))
}

fn diamond() -> GraphBuilder {
  let mut builder = GraphBuilder::new();
  builder
    .project("root")
    .setting("acc", ValueType::Str)
    .task("trail", ValueType::Str)
    .configuration("root", "a", &["b", "c"])
    .configuration("root", "b", &["c", "a"])
    .configuration("root", "c", &["a", "b"])
    .bind("root", "acc", Binding::constant(""))
    .bind_in("root", "a", "acc", letter("a"))
    .bind_in("root", "b", "acc", letter("b"))
    .bind_in("root", "c", "acc", letter("c"))
    .bind("root", "trail", Binding::set(|scope| scope.get_in("acc", &["a"])))
    .bind(
      "root",
      "trail",
      Binding::modify(|scope, current| {
        let b = scope.get_in("acc", &["b"])?;
        let c = scope.get_in("acc", &["c"])?;
        current
          .append(b)
          .and_then(|v| v.append(c))
          .map_err(|e| scope.fail(e))
      }),
    )
    .bind("root", "trail", Binding::append("."));
  builder
}

#[test]
#[traced_test]
fn cyclic_diamond_produces_pinned_trail() {
  let session = EvalSession::new(Arc::new(diamond().build().unwrap()));
  assert_eq!(session.run_expr("trail").unwrap(), vec![Value::from("abcbcacab.")]);
  assert!(logs_contain("configuration extension graph contains cycles"));
}

#[test]
fn operation_audit_lists_visited_bindings() {
  let graph = diamond().build().unwrap();
  let (project, stack) = graph.scope_ids(None, &["b"]).unwrap();
  let key = graph.key_id("acc").unwrap();
  let audit: Vec<String> = graph
    .operations(key, project, &stack)
    .iter()
    .map(ToString::to_string)
    .collect();
  assert_eq!(audit, vec!["root#0 set", "root/b#0 modify", "root/c#0 modify", "root/a#0 modify"]);
}

#[test]
fn other_projects_are_reachable_from_bindings() {
  let mut builder = GraphBuilder::new();
  builder
    .project("app")
    .project("lib")
    .setting("name", ValueType::Str)
    .bind("lib", "name", Binding::constant("lib"))
    .bind(
      "app",
      "name",
      Binding::set(|scope| {
        let lib = scope.get_from("lib", "name", &[] as &[&str])?;
        Ok(Value::from(format!("app+{lib}")))
      }),
    );
  let session = EvalSession::new(Arc::new(builder.build().unwrap()));

  assert_eq!(session.run_expr("name; lib/name").unwrap(), vec![Value::from("app+lib"), Value::from("lib")]);
  assert!(matches!(session.run_expr("nope/name"), Err(EvalError::UnknownProject(_))));
}

#[test]
fn shared_session_evaluates_each_slot_once() {
  let calls = Arc::new(AtomicUsize::new(0));
  let counter = Arc::clone(&calls);

  let mut builder = GraphBuilder::new();
  builder.project("p").setting("slow", ValueType::Int).bind(
    "p",
    "slow",
    Binding::set(move |_| {
      counter.fetch_add(1, Ordering::SeqCst);
      thread::sleep(std::time::Duration::from_millis(20));
      Ok(Value::Int(7))
    }),
  );
  let session = Arc::new(EvalSession::new(Arc::new(builder.build().unwrap())));

  let handles: Vec<_> = (0..8)
    .map(|_| {
      let session = Arc::clone(&session);
      thread::spawn(move || session.resolve("slow", None, &[] as &[&str]))
    })
    .collect();
  for handle in handles {
    assert_eq!(handle.join().unwrap().unwrap(), Value::Int(7));
  }
  assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn definition_file_drives_a_session() {
  let temp = tempfile::tempdir().unwrap();
  let path = temp.path().join("build.json");
  std::fs::write(
    &path,
    r#"{
      "keys": { "greeting": { "type": "str", "kind": "task" }, "who": { "type": "str" } },
      "projects": [{
        "name": "hello",
        "configurations": [{ "name": "loud", "bindings": [{ "key": "greeting", "op": "append", "value": "!" }] }],
        "bindings": [
          { "key": "who", "op": "set", "value": "world" },
          { "key": "greeting", "op": "set", "value": "hello " },
          { "key": "greeting", "op": "append-ref", "source": "who" }
        ]
      }]
    }"#,
  )
  .unwrap();

  let definition = BuildDefinition::from_file(&path).unwrap();
  let mut builder = GraphBuilder::new();
  builder.register(&definition).unwrap();
  let session = EvalSession::new(Arc::new(builder.build().unwrap()));

  assert_eq!(
    session.run_expr("greeting; loud:greeting").unwrap(),
    vec![Value::from("hello world"), Value::from("hello world!")]
  );
}
