//! cairn-lib: the evaluation core of the cairn build tool
//!
//! This crate provides:
//! - `version`: artifact versions, ordering and range resolution
//! - `task`: the task expression grammar (`project/conf:key args; ...`)
//! - `directive`: script-header directive scanning
//! - `graph`: the scoped configuration graph and memoizing evaluator
//! - `assembly`: merging many input trees into one archive
//! - `settings`: user settings from file and environment

pub mod assembly;
pub mod cancel;
pub mod consts;
pub mod directive;
pub mod error;
pub mod graph;
pub mod platform;
pub mod settings;
pub mod task;
pub mod util;
pub mod version;
