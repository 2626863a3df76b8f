use std::collections::HashMap;
use std::sync::Arc;

use cairn_lib::directive::plugin::{LIBRARY_DEPENDENCIES, RESOLVED_DEPENDENCIES, RESOLVERS};
use cairn_lib::directive::{DirectivePlugin, collect_facts};
use cairn_lib::graph::{EvalSession, GraphBuilder, Value};
use cairn_lib::version::{Version, parse_version};

const SCRIPT: &str = r#"#!/usr/bin/env cairn
// build header
//> dep org.example:core:[1.0,2.0)
//> repository central https://repo.example.org/maven2

fn main() {}
//> dep org.example:ignored:9.9
"#;

fn versions(texts: &[&str]) -> Vec<Version> {
  texts.iter().map(|text| parse_version(text).unwrap()).collect()
}

#[test]
fn header_facts_become_project_settings() {
  let (facts, summary) = collect_facts(SCRIPT).unwrap();
  assert_eq!(summary.directives, 2);
  assert_eq!(summary.stopped_at, Some(6));

  let available = HashMap::from([(
    "org.example:core".to_string(),
    versions(&["0.9", "1.4", "1.9.2", "2.0-RC1", "2.0"]),
  )]);

  let mut builder = GraphBuilder::new();
  builder.project("script");
  builder
    .register(&DirectivePlugin::new("script", facts).with_available(available))
    .unwrap();
  let session = EvalSession::new(Arc::new(builder.build().unwrap()));
  let none: &[&str] = &[];

  let dependencies = session.resolve(LIBRARY_DEPENDENCIES, None, none).unwrap();
  assert_eq!(dependencies.as_list().map(<[Value]>::len), Some(1));

  let resolvers = session.resolve(RESOLVERS, None, none).unwrap();
  let url = resolvers.as_list().unwrap()[0].as_map().unwrap()["url"].clone();
  assert_eq!(url, Value::from("https://repo.example.org/maven2"));

  let resolved = session.resolve(RESOLVED_DEPENDENCIES, None, none).unwrap();
  let version = resolved.as_list().unwrap()[0].as_map().unwrap()["version"].clone();
  // 2.0-RC1 sorts below 2.0, so it falls inside [1.0,2.0)
  assert_eq!(version, Value::from("2.0-RC1"));
}

#[test]
fn unsatisfiable_dependency_fails_registration() {
  let (facts, _) = collect_facts("//> dep org.example:core:[3,)\n").unwrap();
  let available = HashMap::from([("org.example:core".to_string(), versions(&["1.0", "2.0"]))]);

  let mut builder = GraphBuilder::new();
  builder.project("script");
  let err = builder
    .register(&DirectivePlugin::new("script", facts).with_available(available))
    .map(|_| ())
    .unwrap_err();
  assert!(err.to_string().contains("no available version of org.example:core"));
}
