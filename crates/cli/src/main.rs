mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cairn_lib::settings::Settings;

use cmd::{
  AssembleArgs, GraphOptions, cmd_assemble, cmd_directives, cmd_inspect, cmd_run, cmd_task_parse, cmd_version_compare,
  cmd_version_contains, cmd_version_select,
};
use output::OutputFormat;

/// cairn - build evaluation core: versions, task expressions, scoped settings and assembly
#[derive(Parser)]
#[command(name = "cairn")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output format
  #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
  format: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Compare versions and query version ranges
  Version {
    #[command(subcommand)]
    command: VersionCommand,
  },

  /// Work with task expressions
  Task {
    #[command(subcommand)]
    command: TaskCommand,
  },

  /// List the directives declared in a script header
  Directives {
    /// Script file to scan
    file: PathBuf,
  },

  /// Run tasks against a build definition
  Run {
    /// Build definition (JSON)
    definition: PathBuf,

    /// Register the assembly task and settings on this project
    #[arg(long)]
    assembly: Option<String>,

    /// Bind the header directives of this script on the first project
    #[arg(long)]
    directives: Option<PathBuf>,

    /// Task expression, as separate tokens (e.g. `test:compile ; package`)
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    tasks: Vec<String>,
  },

  /// Show the configurations visited and operations applied for a key
  Inspect {
    /// Build definition (JSON)
    definition: PathBuf,

    /// Task expression naming the keys to inspect
    expr: String,
  },

  /// Merge directory trees into a directory or .tar.gz archive
  Assemble {
    /// Directory holding the project's own files (repeatable)
    #[arg(long = "own", required = true)]
    own: Vec<PathBuf>,

    /// Directory holding a dependency's files (repeatable, in priority order)
    #[arg(long = "dep")]
    dependencies: Vec<PathBuf>,

    /// Output directory, or archive path ending in .tar.gz
    #[arg(long)]
    out: PathBuf,

    /// Merge policy file (JSON); defaults to the settings policy, then the standard policy
    #[arg(long)]
    policy: Option<PathBuf>,
  },
}

#[derive(Subcommand)]
enum VersionCommand {
  /// Compare two versions
  Compare { left: String, right: String },

  /// Check whether a range contains a version
  Contains { range: String, version: String },

  /// Pick the greatest candidate inside a range
  Select {
    range: String,
    #[arg(required = true)]
    candidates: Vec<String>,
  },
}

#[derive(Subcommand)]
enum TaskCommand {
  /// Parse a task expression and print its structure
  Parse {
    /// Treat each argument as an already-split token instead of joining them into one expression
    #[arg(long)]
    tokens: bool,

    #[arg(required = true, allow_hyphen_values = true)]
    input: Vec<String>,
  },
}

fn init_tracing(verbose: bool, settings: &Settings) {
  let default = if verbose {
    "debug"
  } else {
    settings.log.as_deref().unwrap_or("warn")
  };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  let settings = Settings::load().context("Failed to load settings")?;
  init_tracing(cli.verbose, &settings);

  let format = cli.format;
  match cli.command {
    Commands::Version { command } => match command {
      VersionCommand::Compare { left, right } => cmd_version_compare(&left, &right, format),
      VersionCommand::Contains { range, version } => cmd_version_contains(&range, &version, format),
      VersionCommand::Select { range, candidates } => cmd_version_select(&range, &candidates, format),
    },
    Commands::Task { command } => match command {
      TaskCommand::Parse { tokens, input } => cmd_task_parse(&input, tokens, format),
    },
    Commands::Directives { file } => cmd_directives(&file, format.is_json()),
    Commands::Run {
      definition,
      assembly,
      directives,
      tasks,
    } => {
      let options = GraphOptions {
        assembly: assembly.as_deref(),
        directives: directives.as_deref(),
      };
      cmd_run(&definition, &tasks, &options, &settings, format)
    }
    Commands::Inspect { definition, expr } => cmd_inspect(&definition, &expr, &settings, format),
    Commands::Assemble {
      own,
      dependencies,
      out,
      policy,
    } => {
      let args = AssembleArgs {
        own,
        dependencies,
        out,
        policy,
      };
      cmd_assemble(&args, &settings, cli.verbose, format)
    }
  }
}
