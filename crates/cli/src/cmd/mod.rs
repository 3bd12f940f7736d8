//! Subcommand implementations and the setup they share.

mod build;
mod info;
mod is_installed;
mod lint;
mod resolve;
mod stages;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use spc_lib::config::PackageConfig;
use spc_lib::platform::{Os, target_os};
use spc_lib::recipe::register_recipes;
use spc_lib::registry::Registry;

pub use build::{BuildArgs, cmd_build};
pub use info::cmd_info;
pub use is_installed::cmd_is_installed;
pub use lint::cmd_lint;
pub use resolve::cmd_resolve;
pub use stages::cmd_stages;

/// The caller asked for something that cannot work, independent of the
/// package configuration.
#[derive(Debug)]
pub struct UsageError(pub String);

impl fmt::Display for UsageError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl std::error::Error for UsageError {}

/// Target OS from `--target`, else `SPC_TARGET`, else the host.
pub fn resolve_target(target: Option<&str>) -> Result<Os> {
  match target {
    Some(t) => t.parse::<Os>().map_err(|e| UsageError(e).into()),
    None => target_os().map_err(|e| UsageError(e).into()),
  }
}

/// Load configuration from `config_dir`, register recipe builds and validate.
pub fn load_registry(config_dir: &Path, target: Option<&str>) -> Result<Registry> {
  let os = resolve_target(target)?;
  let config = PackageConfig::load_dir(config_dir)
    .with_context(|| format!("Failed to load package configuration from {}", config_dir.display()))?;
  let mut registry = Registry::new(config, os);
  let recipes = register_recipes(&mut registry)?;
  debug!(recipes, os = %os, "registered recipe builds");
  registry.validate()?;
  Ok(registry)
}

/// Parse repeated `key=value` (or bare `key`) build options.
pub fn parse_options(raw: &[String]) -> Result<BTreeMap<String, String>> {
  let mut options = BTreeMap::new();
  for item in raw {
    let (key, value) = match item.split_once('=') {
      Some((k, v)) => (k.trim(), v.trim()),
      None => (item.trim(), ""),
    };
    if key.is_empty() {
      return Err(UsageError(format!("invalid build option: {:?}", item)).into());
    }
    options.insert(key.to_string(), value.to_string());
  }
  Ok(options)
}
