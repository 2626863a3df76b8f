//! Merging a project's files with its dependencies' files into one output tree.
//!
//! Inputs map destination paths to the ordered sources that want them. A
//! [`MergePolicy`] picks a [`MergeStrategy`] per path, and the [`Merger`]
//! resolves every path independently, reading source bytes only when the
//! strategy needs them. The result is a [`MergedTree`] that can be written as
//! a directory or a tarball.

pub mod classify;
mod collect;
mod lazy;
mod merge;
mod output;
pub mod plugin;
mod policy;
mod types;

pub use classify::{is_junk, is_license, is_readme};
pub use collect::collect_dirs;
pub use lazy::LazyBytes;
pub use merge::{merge, Merger, OriginSuffixRenamer, Renamer};
pub use output::{write_dir, write_tar_gz};
pub use plugin::AssemblyPlugin;
pub use policy::{FileClass, Matcher, MergePolicy, Rule};
pub use types::{AssemblyError, AssemblyInputs, AssemblySource, MergeReport, MergeStrategy, MergedTree};
