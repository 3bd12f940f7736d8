//! `spc info`: everything known about one package.

use std::path::Path;

use anyhow::Result;

use spc_lib::install::{expected_outputs, is_installed};
use spc_lib::platform::BuildPaths;
use spc_lib::resolve::DependencyResolver;

use super::{UsageError, load_registry};
use crate::output::{print_json, print_stat, print_success};

pub fn cmd_info(config_dir: &Path, target: Option<&str>, package: &str, json: bool) -> Result<()> {
  let registry = load_registry(config_dir, target)?;
  let os = registry.os();
  let Some(def) = registry.config().get(package) else {
    return Err(UsageError(format!("unknown package [{}]", package)).into());
  };
  let paths = BuildPaths::from_env();

  let resolver = DependencyResolver::new(registry.config(), os);
  let depends = resolver.required(package);
  let suggests = def.suggests(os);
  let stages: Vec<&str> = registry.stages().stage_names(package);
  let build_oses: Vec<&str> = registry
    .stages()
    .build_oses(package)
    .iter()
    .map(|o| o.as_str())
    .collect();
  let extra = registry.info(package);
  let installed = is_installed(def, os, &paths);
  let outputs: Vec<String> = expected_outputs(def, os, &paths)
    .iter()
    .map(|p| p.display().to_string())
    .collect();

  if json {
    let output = serde_json::json!({
      "package": def,
      "os": os.as_str(),
      "depends": depends,
      "suggests": suggests,
      "stages": stages,
      "build_oses": build_oses,
      "outputs": outputs,
      "installed": installed,
      "info": extra,
    });
    return print_json(&output);
  }

  print_success(&format!("{} ({})", def.name, def.kind));
  if let Some(artifact) = &def.artifact {
    print_stat("Artifact", artifact);
  }
  print_stat("Target", os.as_str());
  print_stat("Depends", &list_or_none(&depends));
  print_stat("Suggests", &list_or_none(&suggests));
  print_stat("Stages", &list_or_none(&stages));
  print_stat("Builds on", &list_or_none(&build_oses));
  if let Some(ext) = &def.php_extension {
    if let Some(arg) = ext.arg_type_for(os) {
      print_stat("Arg type", arg);
    }
    if let Some(support) = ext.support_on(os) {
      print_stat("Support", support);
    }
  }
  print_stat("Installed", if installed { "yes" } else { "no" });
  for (key, value) in &extra {
    print_stat(key, value);
  }
  Ok(())
}

fn list_or_none<S: AsRef<str>>(items: &[S]) -> String {
  if items.is_empty() {
    "-".to_string()
  } else {
    items.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(", ")
  }
}
