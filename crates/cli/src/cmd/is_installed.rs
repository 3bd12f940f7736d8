use std::path::Path;

use anyhow::Result;

use spc_lib::install::missing_outputs;
use spc_lib::platform::BuildPaths;

use super::{UsageError, load_registry};
use crate::output::{print_info, print_success, print_warning};

/// Whether every declared output of `package` exists in the build root.
pub fn cmd_is_installed(config_dir: &Path, target: Option<&str>, package: &str) -> Result<bool> {
  let registry = load_registry(config_dir, target)?;
  let Some(def) = registry.config().get(package) else {
    return Err(UsageError(format!("unknown package [{}]", package)).into());
  };
  if !def.kind.is_buildable() {
    print_info(&format!("{} is a {} and has no outputs of its own", package, def.kind));
    return Ok(false);
  }

  let paths = BuildPaths::from_env();
  let os = registry.os();
  if def.outputs(os).is_empty() {
    print_warning(&format!("{} declares no outputs for {}", package, os));
    return Ok(false);
  }
  let missing = missing_outputs(def, os, &paths);
  if missing.is_empty() {
    print_success(&format!("{} is installed", package));
    return Ok(true);
  }
  print_info(&format!("{} is not installed, missing:", package));
  for file in &missing {
    println!("  {}", file.display());
  }
  Ok(false)
}

