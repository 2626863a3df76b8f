use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use cairn_lib::assembly::{
  AssemblyError, AssemblyInputs, AssemblySource, Matcher, MergePolicy, MergeStrategy, Merger, collect_dirs, write_dir,
  write_tar_gz,
};
use cairn_lib::cancel::CancelToken;
use cairn_lib::util::hash::hash_directory;
use tempfile::tempdir;

fn write(root: &Path, files: &[(&str, &str)]) {
  for (path, contents) in files {
    let target = root.join(path);
    fs::create_dir_all(target.parent().unwrap()).unwrap();
    fs::write(target, contents).unwrap();
  }
}

fn counting(origin: &str, bytes: &'static str, own: bool, loads: &Arc<AtomicUsize>) -> AssemblySource {
  let loads = Arc::clone(loads);
  AssemblySource::with_loader(origin, own, move || {
    loads.fetch_add(1, Ordering::SeqCst);
    Ok(bytes.as_bytes().to_vec())
  })
}

#[test]
fn jar_like_trees_merge_with_the_standard_policy() {
  let temp = tempdir().unwrap();
  let app = temp.path().join("app");
  let json = temp.path().join("json-lib");
  let http = temp.path().join("http-lib");
  write(
    &app,
    &[
      ("org/app/Main.class", "main"),
      ("META-INF/MANIFEST.MF", "Main-Class: org.app.Main\n"),
      ("LICENSE", "app license"),
    ],
  );
  write(
    &json,
    &[
      ("org/json/Parser.class", "parser"),
      ("META-INF/services/org.spi.Codec", "org.json.Codec\r\n"),
      ("reference.conf", "json { }\n"),
      ("LICENSE", "json license"),
      ("META-INF/MANIFEST.MF", "Created-By: json\n"),
      ("META-INF/JSON.SF", "signature"),
    ],
  );
  write(
    &http,
    &[
      ("org/json/Parser.class", "parser"),
      ("META-INF/services/org.spi.Codec", "org.http.Codec\norg.json.Codec\n"),
      ("reference.conf", "http { }\n"),
      ("META-INF/JSON.SF", "other signature"),
    ],
  );

  let inputs = collect_dirs(&[&app], &[&json, &http]).unwrap();
  let tree = Merger::new(MergePolicy::standard()).parallelism(3).merge(&inputs).unwrap();

  let text = |path: &str| String::from_utf8(tree.get(path).unwrap().to_vec()).unwrap();
  assert_eq!(text("org/json/Parser.class"), "parser");
  assert_eq!(text("META-INF/services/org.spi.Codec"), "org.json.Codec\norg.http.Codec\n");
  assert_eq!(text("reference.conf"), "json { }\nhttp { }\n");
  assert_eq!(text("LICENSE"), "app license");
  assert_eq!(text("LICENSE_json-lib"), "json license");
  assert!(tree.get("META-INF/MANIFEST.MF").is_none());
  assert!(tree.get("META-INF/JSON.SF").is_none());

  let out = temp.path().join("out");
  write_dir(&tree, &out).unwrap();
  assert_eq!(hash_directory(&out).unwrap(), tree.digest());
}

#[test]
fn losers_are_never_loaded() {
  let loads = Arc::new(AtomicUsize::new(0));
  let mut inputs = AssemblyInputs::new();
  for path in ["first.txt", "last.txt", "drop.txt"] {
    for origin in ["a", "b", "c"] {
      inputs.add(path, counting(origin, "x", false, &loads));
    }
  }

  let policy = MergePolicy::uniform(MergeStrategy::Discard)
    .rule(Matcher::Exact("first.txt".into()), MergeStrategy::First)
    .rule(Matcher::Exact("last.txt".into()), MergeStrategy::Last);
  let tree = Merger::new(policy).merge(&inputs).unwrap();

  assert_eq!(tree.paths().collect::<Vec<_>>(), vec!["first.txt", "last.txt"]);
  assert_eq!(loads.load(Ordering::SeqCst), 2);
}

#[test]
fn shared_source_bytes_load_once() {
  let loads = Arc::new(AtomicUsize::new(0));
  let shared = counting("dep", "same", false, &loads);
  let mut inputs = AssemblyInputs::new();
  inputs.add("a.txt", shared.clone());
  inputs.add("a.txt", AssemblySource::from_bytes("other", &b"same"[..], false));
  inputs.add("b.txt", shared);

  let tree = Merger::new(MergePolicy::uniform(MergeStrategy::Deduplicate))
    .merge(&inputs)
    .unwrap();
  assert_eq!(tree.len(), 2);
  assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[test]
fn conflicts_report_contributing_origins() {
  let mut inputs = AssemblyInputs::new();
  inputs.add("app.conf", AssemblySource::from_bytes("left", &b"1"[..], false));
  inputs.add("app.conf", AssemblySource::from_bytes("right", &b"2"[..], false));

  let err = Merger::new(MergePolicy::uniform(MergeStrategy::SingleOrError))
    .merge(&inputs)
    .unwrap_err();
  match err {
    AssemblyError::AmbiguousMerge { path, origins } => {
      assert_eq!(path, "app.conf");
      assert_eq!(origins, vec!["left".to_string(), "right".to_string()]);
    }
    other => panic!("unexpected error: {other}"),
  }
}

#[test]
fn cancelled_merge_writes_nothing() {
  let temp = tempdir().unwrap();
  let mut inputs = AssemblyInputs::new();
  inputs.add("a.txt", AssemblySource::from_bytes("own", &b"a"[..], true));

  let cancel = CancelToken::new();
  cancel.cancel();
  let err = Merger::new(MergePolicy::standard()).cancel(cancel).merge(&inputs).unwrap_err();
  assert!(matches!(err, AssemblyError::Cancelled));
  assert!(fs::read_dir(temp.path()).unwrap().next().is_none());
}

#[test]
fn archives_of_equal_trees_are_identical() {
  let temp = tempdir().unwrap();
  let mut inputs = AssemblyInputs::new();
  inputs.add("z.txt", AssemblySource::from_bytes("own", &b"z"[..], true));
  inputs.add("a/b.txt", AssemblySource::from_bytes("own", &b"b"[..], true));
  let merger = Merger::new(MergePolicy::standard());

  let first = temp.path().join("first.tar.gz");
  let second = temp.path().join("nested/second.tar.gz");
  write_tar_gz(&merger.merge(&inputs).unwrap(), &first).unwrap();
  write_tar_gz(&merger.merge(&inputs).unwrap(), &second).unwrap();
  assert_eq!(fs::read(first).unwrap(), fs::read(second).unwrap());
}
