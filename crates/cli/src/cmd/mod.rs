mod assemble;
mod directives;
mod inspect;
mod run;
mod task;
mod version;

pub use assemble::{AssembleArgs, cmd_assemble};
pub use directives::cmd_directives;
pub use inspect::cmd_inspect;
pub use run::{GraphOptions, cmd_run};
pub use task::cmd_task_parse;
pub use version::{cmd_version_compare, cmd_version_contains, cmd_version_select};
