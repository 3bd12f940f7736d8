//! Declarative build recipes.
//!
//! Most libraries build with a stock toolchain invocation. A package that
//! declares `build-system` (optionally suffixed per platform) and
//! `build-args` gets a build entry point without any code: one shared
//! [`UnixBuild`] strategy serves Linux, macOS and FreeBSD, and
//! [`WindowsBuild`] serves Windows. Entry points registered in code always
//! win over recipes.

mod unix;
mod windows;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;

use crate::platform::{BuildPaths, Os, OsFamily};
use crate::registry::{Registry, RegistryError};
use crate::stage::{StageContext, StageError, StageFn};

pub use unix::UnixBuild;
pub use windows::WindowsBuild;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildSystem {
  CMake,
  Autoconf,
  Make,
  None,
}

impl FromStr for BuildSystem {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "cmake" => Ok(Self::CMake),
      "autoconf" => Ok(Self::Autoconf),
      "make" => Ok(Self::Make),
      "none" => Ok(Self::None),
      other => Err(format!("unknown build system: {}", other)),
    }
  }
}

impl fmt::Display for BuildSystem {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::CMake => "cmake",
      Self::Autoconf => "autoconf",
      Self::Make => "make",
      Self::None => "none",
    })
  }
}

/// Shared build logic for a family of operating systems.
pub trait BuildStrategy: Send + Sync {
  fn family(&self) -> OsFamily;

  /// Whether this strategy can drive `system`.
  fn supports(&self, system: BuildSystem) -> bool;

  /// Shell commands that build and install the package.
  fn plan(&self, system: BuildSystem, args: &[String], paths: &BuildPaths, jobs: usize) -> Vec<String>;

  /// Extra environment for the build commands.
  fn env(&self, _paths: &BuildPaths) -> Vec<(String, String)> {
    Vec::new()
  }

  fn build(&self, ctx: &StageContext<'_>) -> Result<(), StageError> {
    let system = ctx
      .string("build-system")
      .map(|s| s.parse::<BuildSystem>())
      .transpose()
      .map_err(StageError::Failed)?
      .unwrap_or(BuildSystem::None);
    let args = expand_args(&ctx.list("build-args"), ctx);
    let mut shell = ctx.shell();
    for (key, value) in self.env(ctx.paths) {
      shell = shell.with_env(&key, value);
    }
    for cmd in self.plan(system, &args, ctx.paths, ctx.jobs()) {
      shell.exec(&cmd)?;
    }
    Ok(())
  }
}

/// Replace `{build_root}`, `{lib_dir}`, `{include_dir}`, `{bin_dir}`,
/// `{source_dir}` and `{jobs}` in recipe arguments.
pub fn expand_args(args: &[String], ctx: &StageContext<'_>) -> Vec<String> {
  let vars = [
    ("{build_root}", ctx.paths.build_root.display().to_string()),
    ("{lib_dir}", ctx.paths.lib_dir().display().to_string()),
    ("{include_dir}", ctx.paths.include_dir().display().to_string()),
    ("{bin_dir}", ctx.paths.bin_dir().display().to_string()),
    ("{source_dir}", ctx.source_dir().display().to_string()),
    ("{jobs}", ctx.jobs().to_string()),
  ];
  args
    .iter()
    .map(|arg| vars.iter().fold(arg.clone(), |acc, (k, v)| acc.replace(k, v)))
    .collect()
}

/// Quote `arg` for the platform shell when it needs it.
pub(crate) fn quote(arg: &str, family: OsFamily) -> String {
  let plain = !arg.is_empty() && !arg.chars().any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '$' | '&' | '|' | ';'));
  if plain {
    return arg.to_string();
  }
  match family {
    OsFamily::Unix => format!("'{}'", arg.replace('\'', r"'\''")),
    OsFamily::Windows => format!("\"{}\"", arg.replace('"', "\\\"")),
  }
}

/// Register build entry points for every package whose `build-system`
/// resolves to something on an OS it has no coded entry point for.
///
/// Returns how many packages gained a recipe. Must run before
/// [`Registry::validate`].
pub fn register_recipes(registry: &mut Registry) -> Result<usize, RegistryError> {
  let strategies: [Arc<dyn BuildStrategy>; 2] = [Arc::new(UnixBuild), Arc::new(WindowsBuild)];
  let mut planned: Vec<(String, Vec<Os>, Arc<dyn BuildStrategy>)> = Vec::new();

  for pkg in registry.config().packages() {
    let coded = registry.stages().build_oses(&pkg.name);
    for strategy in &strategies {
      let oses: Vec<Os> = Os::ALL
        .into_iter()
        .filter(|os| os.family() == strategy.family() && !coded.contains(os))
        .filter(|os| {
          pkg
            .string("build-system", *os)
            .and_then(|s| s.parse::<BuildSystem>().ok())
            .is_some_and(|system| system != BuildSystem::None && strategy.supports(system))
        })
        .collect();
      if !oses.is_empty() {
        planned.push((pkg.name.clone(), oses, Arc::clone(strategy)));
      }
    }
  }

  let mut packages: Vec<&str> = planned.iter().map(|(name, _, _)| name.as_str()).collect();
  packages.dedup();
  let count = packages.len();
  for (name, oses, strategy) in planned.iter() {
    let strategy = Arc::clone(strategy);
    let body: StageFn = Arc::new(move |ctx: &StageContext<'_>| strategy.build(ctx));
    registry.build_for_shared(name, oses, body)?;
    debug!(package = %name, oses = ?oses, "registered recipe build");
  }
  Ok(count)
}
