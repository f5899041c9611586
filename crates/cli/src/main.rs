mod cmd;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use output::OutputFormat;
use phasekit_lib::execute::ExecuteConfig;

#[derive(Parser)]
#[command(name = "phasekit")]
#[command(author, version, about = "Declarative build recipes with customizable phase pipelines", long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Shell used for shell-script phases
  #[arg(long, global = true, env = "PHASEKIT_SHELL")]
  shell: Option<String>,

  /// Let commands see the host PATH after the inputs' search path
  #[arg(long, global = true, env = "PHASEKIT_KEEP_HOST_PATH")]
  keep_host_path: bool,

  /// Parallel jobs for build tools (default: number of CPUs)
  #[arg(short, long, global = true, env = "PHASEKIT_JOBS")]
  jobs: Option<usize>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Validate every package in a catalog and materialize its pipeline
  Check {
    /// Path to the catalog file
    catalog: PathBuf,
  },

  /// Print the final phase order of a package
  Phases {
    /// Path to the catalog file
    catalog: PathBuf,

    /// Package name
    name: String,

    /// Package version (default: the greatest in the catalog)
    #[arg(long)]
    version: Option<String>,

    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// Build a package from an unpacked source tree
  Build {
    /// Path to the catalog file
    catalog: PathBuf,

    /// Package name
    name: String,

    /// Package version (default: the greatest in the catalog)
    #[arg(long)]
    version: Option<String>,

    /// Unpacked source directory
    #[arg(long)]
    source: PathBuf,

    /// JSON input table mapping roles and names to paths
    #[arg(long)]
    inputs: Option<PathBuf>,

    /// Output directory (default: <store>/<hash>-<name>-<version>)
    #[arg(long)]
    out: Option<PathBuf>,

    /// Store directory used for the default output directory
    #[arg(long, env = "PHASEKIT_STORE", default_value = "phasekit-store")]
    store: PathBuf,
  },

  /// Wrap a program with environment edits
  Wrap {
    /// Program to wrap
    program: PathBuf,

    /// Prefix VAR with VALUE (repeatable)
    #[arg(long, value_name = "VAR=VALUE")]
    prefix: Vec<String>,

    /// Append VALUE to VAR (repeatable)
    #[arg(long, value_name = "VAR=VALUE")]
    suffix: Vec<String>,

    /// Set VAR to VALUE (repeatable)
    #[arg(long, value_name = "VAR=VALUE")]
    set: Vec<String>,
  },
}

fn main() -> anyhow::Result<()> {
  let cli = Cli::parse();

  let level = if cli.verbose { "debug" } else { "info" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let mut config = ExecuteConfig {
    shell: cli.shell,
    keep_host_path: cli.keep_host_path,
    ..ExecuteConfig::default()
  };
  if let Some(jobs) = cli.jobs {
    config.jobs = jobs;
  }

  match cli.command {
    Commands::Check { catalog } => cmd::cmd_check(&catalog, &config),
    Commands::Phases {
      catalog,
      name,
      version,
      output,
    } => cmd::cmd_phases(&catalog, &name, version.as_deref(), output, &config),
    Commands::Build {
      catalog,
      name,
      version,
      source,
      inputs,
      out,
      store,
    } => cmd::cmd_build(
      &cmd::BuildArgs {
        catalog,
        name,
        version,
        source,
        inputs,
        out,
        store,
      },
      &config,
    ),
    Commands::Wrap {
      program,
      prefix,
      suffix,
      set,
    } => cmd::cmd_wrap(&program, &prefix, &suffix, &set),
  }
}
