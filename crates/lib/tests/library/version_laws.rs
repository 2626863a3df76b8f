use std::cmp::Ordering;

use cairn_lib::version::{Version, compare, parse_range, parse_version};
use proptest::prelude::*;

fn version_text() -> impl Strategy<Value = String> {
  let numbers = prop::collection::vec(0u64..12, 1..4);
  let qualifier = prop::sample::select(vec!["", "0", "alpha", "beta", "rc1", "SNAPSHOT"]);
  (numbers, qualifier).prop_map(|(numbers, qualifier)| {
    let numeric = numbers.iter().map(u64::to_string).collect::<Vec<_>>().join(".");
    if qualifier.is_empty() {
      numeric
    } else {
      format!("{numeric}-{qualifier}")
    }
  })
}

fn version() -> impl Strategy<Value = Version> {
  version_text().prop_map(|text| parse_version(&text).unwrap())
}

proptest! {
  #[test]
  fn ordering_is_antisymmetric(a in version(), b in version()) {
    prop_assert_eq!(compare(&a, &b), compare(&b, &a).reverse());
  }

  #[test]
  fn ordering_is_transitive(a in version(), b in version(), c in version()) {
    if compare(&a, &b) != Ordering::Greater && compare(&b, &c) != Ordering::Greater {
      prop_assert_ne!(compare(&a, &c), Ordering::Greater);
    }
  }

  #[test]
  fn equality_follows_ordering(a in version(), b in version()) {
    prop_assert_eq!(a == b, compare(&a, &b) == Ordering::Equal);
  }

  #[test]
  fn trailing_zero_segments_are_insignificant(text in version_text()) {
    let (numeric, qualifier) = match text.split_once('-') {
      Some((numeric, qualifier)) => (numeric.to_string(), format!("-{qualifier}")),
      None => (text.clone(), String::new()),
    };
    let padded = parse_version(&format!("{numeric}.0.0{qualifier}")).unwrap();
    prop_assert_eq!(parse_version(&text).unwrap(), padded);
  }

  #[test]
  fn display_reparses_to_an_equal_version(a in version()) {
    prop_assert_eq!(parse_version(&a.to_string()).unwrap(), a);
  }

  #[test]
  fn bracketed_range_matches_ordering(low in version(), high in version(), candidate in version()) {
    prop_assume!(compare(&low, &high) == Ordering::Less);
    let range = parse_range(&format!("[{low},{high}]")).unwrap();
    let expected = low <= candidate && candidate <= high;
    prop_assert_eq!(range.contains(&candidate), expected);
  }

  #[test]
  fn select_picks_the_greatest_member(candidates in prop::collection::vec(version(), 1..8), low in version()) {
    let range = parse_range(&format!("[{low},)")).unwrap();
    let expected = candidates.iter().filter(|c| **c >= low).max();
    prop_assert_eq!(range.select(&candidates), expected);
  }
}

#[test]
fn qualified_versions_sort_before_releases() {
  let mut versions: Vec<Version> = ["1.0", "1.0-SNAPSHOT", "1.0-alpha", "0.9", "1.0.1-beta", "1-0"]
    .iter()
    .map(|text| parse_version(text).unwrap())
    .collect();
  versions.sort();
  let texts: Vec<&str> = versions.iter().map(Version::as_str).collect();
  assert_eq!(texts, vec!["0.9", "1.0-SNAPSHOT", "1.0-alpha", "1.0", "1-0", "1.0.1-beta"]);
}
