//! `spc stages`: registered stages, build entry points and hooks.

use std::path::Path;

use anyhow::Result;
use owo_colors::{OwoColorize, Stream};

use super::load_registry;
use crate::output::{print_info, print_json, symbols};

pub fn cmd_stages(config_dir: &Path, target: Option<&str>, json: bool) -> Result<()> {
  let registry = load_registry(config_dir, target)?;
  let table = registry.stages();

  if json {
    let packages: Vec<_> = table
      .packages()
      .into_iter()
      .map(|pkg| {
        let hooks: Vec<_> = table
          .hooks()
          .iter()
          .filter(|h| h.package == pkg)
          .map(|h| {
            serde_json::json!({
              "stage": h.stage,
              "timing": h.timing,
              "guard": h.guard,
              "owner": h.owner,
            })
          })
          .collect();
        serde_json::json!({
          "package": pkg,
          "stages": table.stage_names(pkg),
          "build_oses": table.build_oses(pkg).iter().map(|o| o.as_str()).collect::<Vec<_>>(),
          "hooks": hooks,
        })
      })
      .collect();
    return print_json(&serde_json::json!({ "os": registry.os().as_str(), "packages": packages }));
  }

  let packages = table.packages();
  if packages.is_empty() {
    print_info("No stages registered.");
    return Ok(());
  }
  print_info(&format!("{} package(s) with stages for {}", packages.len(), registry.os()));
  for pkg in packages {
    println!("  {}", pkg);
    for stage in table.stage_names(pkg) {
      println!("    {} {}", symbols::INFO, stage);
    }
    for hook in table.hooks().iter().filter(|h| h.package == pkg) {
      let mut line = format!("{}-hook on {}", hook.timing, hook.stage);
      if let Some(owner) = &hook.owner {
        line.push_str(&format!(" from {}", owner));
      }
      if let Some(guard) = &hook.guard {
        line.push_str(&format!(" when {} is built", guard));
      }
      println!(
        "    {} {}",
        symbols::ARROW,
        line.if_supports_color(Stream::Stdout, |s| s.dimmed())
      );
    }
  }
  Ok(())
}
