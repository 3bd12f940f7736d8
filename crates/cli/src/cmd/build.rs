//! `spc build` and `spc install`.
//!
//! Both drive the package installer over the requested packages. `build`
//! insists on building from source; `install` takes a prebuilt binary when
//! the artifact directory has one.

use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use clap::Args;
use tracing::info;

use spc_lib::artifact::LocalArtifacts;
use spc_lib::install::{InstallOptions, InstallReport, PackageInstaller};
use spc_lib::platform::BuildPaths;

use super::{load_registry, parse_options};
use crate::output::{format_elapsed, print_error, print_info, print_json, print_status, print_success, print_warning};

#[derive(Debug, Clone, Default, Args)]
pub struct BuildArgs {
  /// Packages to build
  #[arg(required = true)]
  pub packages: Vec<String>,

  /// Also build packages suggested by the requested ones
  #[arg(long)]
  pub with_suggests: bool,

  /// Rebuild even when all outputs already exist
  #[arg(short, long)]
  pub force: bool,

  /// Re-extract sources that are already present
  #[arg(long)]
  pub force_source: bool,

  /// Parallel jobs passed to make/cmake (default: SPC_CONCURRENCY or CPU count)
  #[arg(short, long)]
  pub jobs: Option<usize>,

  /// Build option as key=value, visible to package callbacks (repeatable)
  #[arg(short = 'o', long = "option", value_name = "KEY[=VALUE]")]
  pub options: Vec<String>,

  /// Print the run report as JSON
  #[arg(long)]
  pub json: bool,
}

/// Execute a build (`prefer_binary == false`) or install run.
pub fn cmd_build(config_dir: &Path, target: Option<&str>, args: &BuildArgs, prefer_binary: bool) -> Result<()> {
  let registry = load_registry(config_dir, target)?;
  let paths = BuildPaths::from_env();
  let provider = LocalArtifacts::new(&paths.download_root);

  let options = InstallOptions {
    force_rebuild: args.force,
    with_suggests: args.with_suggests,
    force_source: args.force_source,
    jobs: args.jobs,
    build_options: parse_options(&args.options)?,
  };

  let mut installer = PackageInstaller::new(&registry, &provider, paths, options)?;
  for pkg in &args.packages {
    if prefer_binary {
      installer.add_install_package(pkg)?;
    } else {
      installer.add_build_package(pkg)?;
    }
  }

  if !args.json {
    let verb = if prefer_binary { "Installing" } else { "Building" };
    print_info(&format!(
      "{} for {} into {}",
      verb,
      registry.os(),
      installer.paths().build_root.display()
    ));
  }

  let start = Instant::now();
  let result = installer.run();
  let elapsed = start.elapsed();

  match result {
    Ok(report) => {
      info!(elapsed = ?elapsed, "run complete");
      if args.json {
        print_json(&report)?;
      } else {
        print_report(&report);
        print_success(&format!(
          "{} package(s) done in {}",
          report.packages.len(),
          format_elapsed(elapsed)
        ));
      }
      Ok(())
    }
    Err(e) => {
      let report = installer.report();
      if args.json {
        print_json(&report)?;
      } else if !report.packages.is_empty() {
        print_report(&report);
      }
      if let Some(log) = e.log_path() {
        print_warning(&format!("Full tool output: {}", log.display()));
      }
      print_error(&format!("Run failed after {}", format_elapsed(elapsed)));
      Err(e.into())
    }
  }
}

fn print_report(report: &InstallReport) {
  for pkg in &report.packages {
    print_status(&pkg.name, pkg.status);
  }
}
