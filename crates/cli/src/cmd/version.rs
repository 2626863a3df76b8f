//! `cairn version`: compare versions and query ranges.

use std::cmp::Ordering;

use anyhow::{Context, Result, bail};
use serde_json::json;

use cairn_lib::version::{Version, compare, parse_range, parse_version};

use crate::output::{OutputFormat, print_json};

pub fn cmd_version_compare(left: &str, right: &str, format: OutputFormat) -> Result<()> {
  let a = parse_version(left)?;
  let b = parse_version(right)?;
  let ordering = compare(&a, &b);

  if format.is_json() {
    let sign = match ordering {
      Ordering::Less => -1,
      Ordering::Equal => 0,
      Ordering::Greater => 1,
    };
    return print_json(&json!({ "left": a, "right": b, "ordering": sign }));
  }

  let symbol = match ordering {
    Ordering::Less => "<",
    Ordering::Equal => "==",
    Ordering::Greater => ">",
  };
  println!("{} {} {}", a, symbol, b);
  Ok(())
}

pub fn cmd_version_contains(range: &str, version: &str, format: OutputFormat) -> Result<()> {
  let range = parse_range(range)?;
  let version = parse_version(version)?;
  let contained = range.contains(&version);

  if format.is_json() {
    print_json(&json!({ "range": range, "version": version, "contains": contained }))
  } else {
    println!("{}", contained);
    Ok(())
  }
}

pub fn cmd_version_select(range: &str, candidates: &[String], format: OutputFormat) -> Result<()> {
  let range = parse_range(range)?;
  let candidates = candidates
    .iter()
    .map(|text| parse_version(text))
    .collect::<Result<Vec<Version>, _>>()
    .context("Invalid candidate version")?;

  let Some(selected) = range.select(&candidates) else {
    bail!("No candidate satisfies {}", range);
  };

  if format.is_json() {
    print_json(&json!({ "range": range, "selected": selected }))
  } else {
    println!("{}", selected);
    Ok(())
  }
}
