//! `spc lint-config`: validate configuration for every target OS.

use std::path::Path;

use anyhow::{Context, Result};

use spc_lib::config::PackageConfig;
use spc_lib::platform::Os;
use spc_lib::recipe::register_recipes;
use spc_lib::registry::Registry;

use crate::output::{print_error, print_success};

/// Load the configuration and run registry validation once per OS, so an
/// edge that only dangles on one platform is still caught.
pub fn cmd_lint(config_dir: &Path) -> Result<()> {
  let config = PackageConfig::load_dir(config_dir)
    .with_context(|| format!("Failed to load package configuration from {}", config_dir.display()))?;
  let count = config.len();

  let mut first_error = None;
  for os in Os::ALL {
    let mut registry = Registry::new(config.clone(), os);
    let result = register_recipes(&mut registry).and_then(|_| registry.validate());
    if let Err(e) = result {
      print_error(&format!("{}: {}", os, e));
      first_error.get_or_insert(e);
    }
  }
  if let Some(e) = first_error {
    return Err(e).context("Package configuration has errors");
  }
  print_success(&format!("{} package(s) valid on {} platform(s)", count, Os::ALL.len()));
  Ok(())
}
