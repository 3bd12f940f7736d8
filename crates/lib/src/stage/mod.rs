//! Stages, OS build entry points and hooks.
//!
//! A stage is a named unit of work owned by one package. The `build` stage is
//! special: packages register one entry point per OS and the entry for the
//! run's target OS is bound as `build` once, when the registry validates.
//!
//! Hooks attach to another package's stage and run before or after its body.
//! A hook may carry a guard package; it then fires only in runs whose
//! resolved set contains that package.

mod context;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::consts::BUILD_STAGE;
use crate::platform::Os;
use crate::registry::RegistryError;
use crate::shell::ShellError;

pub use context::StageContext;

/// Body of a stage, hook or build entry point.
pub type StageFn = Arc<dyn Fn(&StageContext<'_>) -> Result<(), StageError> + Send + Sync>;

/// Wrap a closure as a [`StageFn`].
pub fn stage_fn<F>(f: F) -> StageFn
where
  F: Fn(&StageContext<'_>) -> Result<(), StageError> + Send + Sync + 'static,
{
  Arc::new(f)
}

/// Errors raised by stage bodies and hooks.
#[derive(Debug, Error)]
pub enum StageError {
  #[error(transparent)]
  Shell(#[from] ShellError),

  #[error("{}: {source}", .path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// Invalid user input spotted by package logic (e.g. a flag combination).
  #[error("{0}")]
  Usage(String),

  #[error("stage is not registered")]
  UnknownStage,

  #[error("{0}")]
  Failed(String),
}

impl StageError {
  pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::Io {
      path: path.into(),
      source,
    }
  }

  /// Captured tool output for this failure, if any.
  pub fn log_path(&self) -> Option<&Path> {
    match self {
      Self::Shell(ShellError::Failed { log, .. }) => log.as_deref(),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Timing {
  Before,
  After,
}

impl fmt::Display for Timing {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Before => f.write_str("before"),
      Self::After => f.write_str("after"),
    }
  }
}

/// Which part of `run` failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  BeforeHook,
  Body,
  AfterHook,
}

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::BeforeHook => f.write_str("before-hook"),
      Self::Body => f.write_str("body"),
      Self::AfterHook => f.write_str("after-hook"),
    }
  }
}

/// A stage failure tagged with where it happened.
#[derive(Debug, Error)]
#[error("package [{package}] stage [{stage}] failed in {phase}: {source}")]
pub struct StageRunError {
  pub package: String,
  pub stage: String,
  pub phase: Phase,
  #[source]
  pub source: StageError,
}

/// A callback attached to another package's stage.
#[derive(Clone)]
pub struct Hook {
  pub package: String,
  pub stage: String,
  pub timing: Timing,
  /// Fire only when this package is in the resolved set.
  pub guard: Option<String>,
  /// Who registered the hook, for listings.
  pub owner: Option<String>,
  pub callable: StageFn,
}

impl fmt::Debug for Hook {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Hook")
      .field("package", &self.package)
      .field("stage", &self.stage)
      .field("timing", &self.timing)
      .field("guard", &self.guard)
      .field("owner", &self.owner)
      .finish_non_exhaustive()
  }
}

/// Stage bodies, build entry points and hooks of every package.
#[derive(Default)]
pub struct StageTable {
  stages: HashMap<String, Vec<(String, StageFn)>>,
  build_entries: HashMap<String, BTreeMap<Os, StageFn>>,
  hooks: Vec<Hook>,
}

impl StageTable {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register stage `name` on `package`.
  ///
  /// # Errors
  ///
  /// `DuplicateStage` when the package already has a stage of that name.
  pub fn add_stage(&mut self, package: &str, name: &str, body: StageFn) -> Result<(), RegistryError> {
    let stages = self.stages.entry(package.to_string()).or_default();
    if stages.iter().any(|(n, _)| n == name) {
      return Err(RegistryError::DuplicateStage {
        package: package.to_string(),
        stage: name.to_string(),
      });
    }
    stages.push((name.to_string(), body));
    Ok(())
  }

  /// Register the build entry point of `package` for each of `oses`.
  pub fn add_build_entry(&mut self, package: &str, oses: &[Os], body: StageFn) -> Result<(), RegistryError> {
    let entries = self.build_entries.entry(package.to_string()).or_default();
    for os in oses {
      if entries.contains_key(os) {
        return Err(RegistryError::DuplicateBuildEntry {
          package: package.to_string(),
          os: *os,
        });
      }
    }
    for os in oses {
      entries.insert(*os, Arc::clone(&body));
    }
    Ok(())
  }

  pub fn add_hook(&mut self, hook: Hook) {
    self.hooks.push(hook);
  }

  /// Bind each package's entry point for `os` as its `build` stage.
  pub fn bind_build_entries(&mut self, os: Os) -> Result<(), RegistryError> {
    let mut packages: Vec<&String> = self.build_entries.keys().collect();
    packages.sort();
    let mut bound = Vec::new();
    for package in packages {
      if let Some(body) = self.build_entries[package].get(&os) {
        bound.push((package.clone(), Arc::clone(body)));
      }
    }
    for (package, body) in bound {
      self.add_stage(&package, BUILD_STAGE, body)?;
      debug!(package = %package, os = %os, "bound build entry point");
    }
    Ok(())
  }

  pub fn has_stage(&self, package: &str, name: &str) -> bool {
    self.stage(package, name).is_some()
  }

  fn stage(&self, package: &str, name: &str) -> Option<&StageFn> {
    self
      .stages
      .get(package)?
      .iter()
      .find(|(n, _)| n == name)
      .map(|(_, body)| body)
  }

  /// Stage names of `package` in registration order.
  pub fn stage_names(&self, package: &str) -> Vec<&str> {
    self
      .stages
      .get(package)
      .map(|s| s.iter().map(|(n, _)| n.as_str()).collect())
      .unwrap_or_default()
  }

  /// Packages that registered any stage or build entry.
  pub fn packages(&self) -> Vec<&str> {
    let mut names: Vec<&str> = self
      .stages
      .keys()
      .chain(self.build_entries.keys())
      .map(String::as_str)
      .collect();
    names.sort_unstable();
    names.dedup();
    names
  }

  /// OSes `package` has a build entry point for.
  pub fn build_oses(&self, package: &str) -> Vec<Os> {
    self
      .build_entries
      .get(package)
      .map(|e| e.keys().copied().collect())
      .unwrap_or_default()
  }

  pub fn hooks(&self) -> &[Hook] {
    &self.hooks
  }

  /// Hooks for `(package, stage, timing)` in registration order.
  pub fn hooks_for<'a>(&'a self, package: &'a str, stage: &'a str, timing: Timing) -> impl Iterator<Item = &'a Hook> {
    self
      .hooks
      .iter()
      .filter(move |h| h.package == package && h.stage == stage && h.timing == timing)
  }

  /// Run `ctx.stage` of `ctx.package`: guarded before-hooks, the body, then
  /// guarded after-hooks. The first error stops the sequence.
  pub fn run(&self, ctx: &StageContext<'_>) -> Result<(), StageRunError> {
    let package = ctx.package.name.as_str();
    let stage = ctx.stage;
    let fail = |phase: Phase, source: StageError| StageRunError {
      package: package.to_string(),
      stage: stage.to_string(),
      phase,
      source,
    };

    let body = self.stage(package, stage).ok_or_else(|| fail(Phase::Body, StageError::UnknownStage))?;

    for hook in self.hooks_for(package, stage, Timing::Before) {
      if hook_enabled(hook, ctx) {
        debug!(package, stage, owner = ?hook.owner, "running before-hook");
        (hook.callable)(ctx).map_err(|e| fail(Phase::BeforeHook, e))?;
      }
    }

    info!(package, stage, "running stage");
    body(ctx).map_err(|e| fail(Phase::Body, e))?;

    for hook in self.hooks_for(package, stage, Timing::After) {
      if hook_enabled(hook, ctx) {
        debug!(package, stage, owner = ?hook.owner, "running after-hook");
        (hook.callable)(ctx).map_err(|e| fail(Phase::AfterHook, e))?;
      }
    }
    Ok(())
  }
}

fn hook_enabled(hook: &Hook, ctx: &StageContext<'_>) -> bool {
  match &hook.guard {
    Some(guard) => {
      let enabled = ctx.resolved.contains(guard);
      if !enabled {
        debug!(package = %hook.package, stage = %hook.stage, guard = %guard, "hook skipped by guard");
      }
      enabled
    }
    None => true,
  }
}
