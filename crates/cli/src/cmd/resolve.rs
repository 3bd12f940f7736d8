//! `spc resolve`: show the build order without building anything.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use owo_colors::{OwoColorize, Stream};

use spc_lib::install::pending_packages;
use spc_lib::platform::BuildPaths;
use spc_lib::resolve::DependencyResolver;

use super::{load_registry, parse_options};
use crate::output::{print_info, print_json, symbols};

pub fn cmd_resolve(
  config_dir: &Path,
  target: Option<&str>,
  packages: &[String],
  with_suggests: bool,
  why: bool,
  options: &[String],
  json: bool,
) -> Result<()> {
  let registry = load_registry(config_dir, target)?;
  let options = parse_options(options)?;

  let overrides: HashMap<String, Vec<String>> = packages
    .iter()
    .filter_map(|pkg| {
      let extra = registry.resolve_build_deps(pkg, &options);
      (!extra.is_empty()).then(|| (pkg.clone(), extra))
    })
    .collect();
  let resolver = DependencyResolver::new(registry.config(), registry.os()).with_overrides(overrides);
  let set = resolver.resolve(packages, &[], with_suggests)?;
  let dependents = resolver.dependents(&set);
  let pending = pending_packages(&registry, &set, &BuildPaths::from_env());

  if json {
    let mut pending: Vec<&String> = pending.iter().collect();
    pending.sort();
    let output = serde_json::json!({
      "os": registry.os().as_str(),
      "order": set.as_slice(),
      "suggested": set.iter().filter(|p| set.is_suggested(p)).collect::<Vec<_>>(),
      "pending": pending,
      "dependents": dependents,
    });
    return print_json(&output);
  }

  print_info(&format!("{} package(s) for {}", set.len(), registry.os()));
  for (index, name) in set.iter().enumerate() {
    let mut notes = Vec::new();
    if let Some(def) = registry.config().get(name) {
      notes.push(def.kind.to_string());
    }
    if set.is_suggested(name) {
      notes.push("suggested".to_string());
    }
    if pending.contains(name) {
      notes.push("pending".to_string());
    }
    println!(
      "  {:>3}. {} {}",
      index + 1,
      name,
      format!("({})", notes.join(", ")).if_supports_color(Stream::Stdout, |s| s.dimmed())
    );
    if why
      && let Some(parents) = dependents.get(name)
      && !parents.is_empty()
    {
      println!("       {} {}", symbols::ARROW, parents.join(", "));
    }
  }
  Ok(())
}
