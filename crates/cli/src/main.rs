mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{BuildArgs, cmd_build, cmd_info, cmd_is_installed, cmd_lint, cmd_resolve, cmd_stages};
use output::{error_kind, exit_code, print_error};

/// spc - build static PHP and its libraries from source
#[derive(Parser)]
#[command(name = "spc")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Directory holding pkg.json and pkg.*.json
  #[arg(long, global = true, default_value = "config")]
  config_dir: PathBuf,

  /// Target OS or triple (default: SPC_TARGET, then the host)
  #[arg(long, global = true)]
  target: Option<String>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build packages and their dependencies from source
  Build(BuildArgs),

  /// Make packages available, preferring prebuilt binaries
  Install(BuildArgs),

  /// Show the resolved build order
  Resolve {
    /// Packages to resolve
    #[arg(required = true)]
    packages: Vec<String>,

    /// Follow suggestion edges one hop from the request
    #[arg(long)]
    with_suggests: bool,

    /// Show which packages pull each entry in
    #[arg(long)]
    why: bool,

    /// Build option as key=value (repeatable)
    #[arg(short = 'o', long = "option", value_name = "KEY[=VALUE]")]
    options: Vec<String>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// Show details of a package
  Info {
    package: String,

    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// Exit 0 when every declared output of a package exists
  IsInstalled { package: String },

  /// List registered stages and hooks
  Stages {
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// Validate the package configuration for every target OS
  LintConfig,
}

fn init_tracing(verbose: bool) {
  let default = if verbose { "info,spc_lib=debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  let config_dir = cli.config_dir.as_path();
  let target = cli.target.as_deref();
  let result = match &cli.command {
    Commands::Build(args) => cmd_build(config_dir, target, args, false).map(|_| true),
    Commands::Install(args) => cmd_build(config_dir, target, args, true).map(|_| true),
    Commands::Resolve {
      packages,
      with_suggests,
      why,
      options,
      json,
    } => cmd_resolve(config_dir, target, packages, *with_suggests, *why, options, *json).map(|_| true),
    Commands::Info { package, json } => cmd_info(config_dir, target, package, *json).map(|_| true),
    Commands::IsInstalled { package } => cmd_is_installed(config_dir, target, package),
    Commands::Stages { json } => cmd_stages(config_dir, target, *json).map(|_| true),
    Commands::LintConfig => cmd_lint(config_dir).map(|_| true),
  };

  match result {
    Ok(true) => ExitCode::SUCCESS,
    Ok(false) => ExitCode::FAILURE,
    Err(e) => {
      let kind = error_kind(&e);
      print_error(&format!("{}: {:#}", kind, e));
      exit_code(kind)
    }
  }
}
