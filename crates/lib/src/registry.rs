//! The per-process registry.
//!
//! A [`Registry`] owns the package configuration, every stage and hook, and
//! the package callbacks (validate, patch, info, resolve-build). Package
//! implementations register into it explicitly at startup; nothing is global.
//! [`Registry::validate`] must succeed before the registry is handed to the
//! installer; it rejects dangling references, dependency cycles and hooks or
//! callbacks that point at nothing.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{ConfigError, PackageConfig};
use crate::package::PackageDef;
use crate::platform::Os;
use crate::stage::{Hook, StageContext, StageError, StageFn, StageTable, Timing, stage_fn};

/// Errors raised while registering or validating.
#[derive(Debug, Error)]
pub enum RegistryError {
  #[error("package [{package}] already has a stage named [{stage}]")]
  DuplicateStage { package: String, stage: String },

  #[error("package [{package}] already has a build entry point for {os}")]
  DuplicateBuildEntry { package: String, os: Os },

  #[error("{what} registered for unknown package [{package}]")]
  UnknownPackage { package: String, what: &'static str },

  #[error("{timing}-hook{} targets missing stage [{stage}] of package [{package}]", owner_hint(.owner))]
  UnknownHookTarget {
    package: String,
    stage: String,
    timing: Timing,
    owner: Option<String>,
  },

  #[error("hook on [{package}:{stage}] is guarded by unknown package [{guard}]")]
  UnknownGuard {
    package: String,
    stage: String,
    guard: String,
  },

  #[error("dependency cycle between packages: {}", .path.join(" -> "))]
  Cycle { path: Vec<String> },

  #[error(transparent)]
  Config(#[from] ConfigError),
}

fn owner_hint(owner: &Option<String>) -> String {
  owner.as_ref().map(|o| format!(" from [{}]", o)).unwrap_or_default()
}

/// Patch callback; returns `true` when it changed the source tree.
pub type PatchFn = Arc<dyn Fn(&StageContext<'_>) -> Result<bool, StageError> + Send + Sync>;

/// Extra key/value facts shown by `spc info`.
pub type InfoFn = Arc<dyn Fn(&PackageDef, Os) -> BTreeMap<String, String> + Send + Sync>;

/// Extra required dependencies a target computes from the build options.
pub type ResolveBuildFn = Arc<dyn Fn(&PackageDef, &BTreeMap<String, String>, Os) -> Vec<String> + Send + Sync>;

#[derive(Default, Clone)]
struct Callbacks {
  validate: Vec<StageFn>,
  patch: Vec<(Option<String>, PatchFn)>,
  info: Option<InfoFn>,
  resolve_build: Option<ResolveBuildFn>,
}

pub struct Registry {
  config: PackageConfig,
  os: Os,
  stages: StageTable,
  callbacks: HashMap<String, Callbacks>,
  validated: bool,
}

impl Registry {
  pub fn new(config: PackageConfig, os: Os) -> Self {
    Self {
      config,
      os,
      stages: StageTable::new(),
      callbacks: HashMap::new(),
      validated: false,
    }
  }

  pub fn config(&self) -> &PackageConfig {
    &self.config
  }

  /// Target OS of the run.
  pub fn os(&self) -> Os {
    self.os
  }

  pub fn stages(&self) -> &StageTable {
    &self.stages
  }

  pub fn is_validated(&self) -> bool {
    self.validated
  }

  /// Register a named stage on `package`.
  pub fn add_stage<F>(&mut self, package: &str, name: &str, body: F) -> Result<(), RegistryError>
  where
    F: Fn(&StageContext<'_>) -> Result<(), StageError> + Send + Sync + 'static,
  {
    self.stages.add_stage(package, name, stage_fn(body))
  }

  /// Register the build entry point of `package` for `oses`.
  pub fn build_for<F>(&mut self, package: &str, oses: &[Os], body: F) -> Result<(), RegistryError>
  where
    F: Fn(&StageContext<'_>) -> Result<(), StageError> + Send + Sync + 'static,
  {
    self.build_for_shared(package, oses, stage_fn(body))
  }

  /// Like [`Registry::build_for`] with an already shared body, so one strategy
  /// can serve several packages.
  pub fn build_for_shared(&mut self, package: &str, oses: &[Os], body: StageFn) -> Result<(), RegistryError> {
    self.stages.add_build_entry(package, oses, body)
  }

  /// Run `body` before `stage` of `package`. With a `guard`, only in runs
  /// that include the guard package.
  pub fn before_stage<F>(&mut self, package: &str, stage: &str, guard: Option<&str>, body: F)
  where
    F: Fn(&StageContext<'_>) -> Result<(), StageError> + Send + Sync + 'static,
  {
    self.add_hook(None, package, stage, Timing::Before, guard, stage_fn(body));
  }

  pub fn after_stage<F>(&mut self, package: &str, stage: &str, guard: Option<&str>, body: F)
  where
    F: Fn(&StageContext<'_>) -> Result<(), StageError> + Send + Sync + 'static,
  {
    self.add_hook(None, package, stage, Timing::After, guard, stage_fn(body));
  }

  /// Register a hook, recording which package owns it.
  pub fn add_hook(
    &mut self,
    owner: Option<&str>,
    package: &str,
    stage: &str,
    timing: Timing,
    guard: Option<&str>,
    body: StageFn,
  ) {
    self.stages.add_hook(Hook {
      package: package.to_string(),
      stage: stage.to_string(),
      timing,
      guard: guard.map(str::to_string),
      owner: owner.map(str::to_string),
      callable: body,
    });
  }

  /// Check run options before `package` builds. Use [`StageError::Usage`]
  /// to reject bad input.
  pub fn on_validate<F>(&mut self, package: &str, body: F)
  where
    F: Fn(&StageContext<'_>) -> Result<(), StageError> + Send + Sync + 'static,
  {
    self.callbacks.entry(package.to_string()).or_default().validate.push(stage_fn(body));
  }

  /// One-time source patch of `package`, applied before its build.
  pub fn on_patch<F>(&mut self, package: &str, body: F)
  where
    F: Fn(&StageContext<'_>) -> Result<bool, StageError> + Send + Sync + 'static,
  {
    self.on_patch_from(None, package, body);
  }

  /// Patch registered by another package; with `guard` set to that package it
  /// only applies when the owner is in the run.
  pub fn on_patch_from<F>(&mut self, guard: Option<&str>, package: &str, body: F)
  where
    F: Fn(&StageContext<'_>) -> Result<bool, StageError> + Send + Sync + 'static,
  {
    let body: PatchFn = Arc::new(body);
    self
      .callbacks
      .entry(package.to_string())
      .or_default()
      .patch
      .push((guard.map(str::to_string), body));
  }

  pub fn on_info<F>(&mut self, package: &str, body: F)
  where
    F: Fn(&PackageDef, Os) -> BTreeMap<String, String> + Send + Sync + 'static,
  {
    let body: InfoFn = Arc::new(body);
    self.callbacks.entry(package.to_string()).or_default().info = Some(body);
  }

  pub fn on_resolve_build<F>(&mut self, package: &str, body: F)
  where
    F: Fn(&PackageDef, &BTreeMap<String, String>, Os) -> Vec<String> + Send + Sync + 'static,
  {
    let body: ResolveBuildFn = Arc::new(body);
    self.callbacks.entry(package.to_string()).or_default().resolve_build = Some(body);
  }

  pub fn validators(&self, package: &str) -> &[StageFn] {
    self.callbacks.get(package).map(|c| c.validate.as_slice()).unwrap_or(&[])
  }

  /// Patch callbacks of `package` as `(guard, callback)` pairs.
  pub fn patches(&self, package: &str) -> &[(Option<String>, PatchFn)] {
    self.callbacks.get(package).map(|c| c.patch.as_slice()).unwrap_or(&[])
  }

  pub fn info(&self, package: &str) -> BTreeMap<String, String> {
    match (self.callbacks.get(package).and_then(|c| c.info.as_ref()), self.config.get(package)) {
      (Some(info), Some(def)) => info(def, self.os),
      _ => BTreeMap::new(),
    }
  }

  /// Extra required dependencies of `package` for `options`.
  pub fn resolve_build_deps(&self, package: &str, options: &BTreeMap<String, String>) -> Vec<String> {
    match (
      self.callbacks.get(package).and_then(|c| c.resolve_build.as_ref()),
      self.config.get(package),
    ) {
      (Some(cb), Some(def)) => cb(def, options, self.os),
      _ => Vec::new(),
    }
  }

  pub fn has_build_stage(&self, package: &str) -> bool {
    self.stages.has_stage(package, crate::consts::BUILD_STAGE)
  }

  /// Fail fast on anything that would break a run later.
  ///
  /// Binds build entry points for the target OS, then checks that every edge,
  /// stage, hook, guard and callback refers to a declared package and that
  /// required edges are acyclic. Calling it twice is a no-op.
  pub fn validate(&mut self) -> Result<(), RegistryError> {
    if self.validated {
      return Ok(());
    }
    self.config.check_references(self.os)?;
    self.verify_acyclic()?;
    self.stages.bind_build_entries(self.os)?;

    for package in self.stages.packages() {
      if !self.config.contains(package) {
        return Err(RegistryError::UnknownPackage {
          package: package.to_string(),
          what: "stage",
        });
      }
    }

    let mut callback_owners: Vec<&String> = self.callbacks.keys().collect();
    callback_owners.sort();
    for package in callback_owners {
      if !self.config.contains(package) {
        return Err(RegistryError::UnknownPackage {
          package: package.clone(),
          what: "callback",
        });
      }
      for (guard, _) in &self.callbacks[package].patch {
        if let Some(guard) = guard
          && !self.config.contains(guard)
        {
          return Err(RegistryError::UnknownGuard {
            package: package.clone(),
            stage: "patch".into(),
            guard: guard.clone(),
          });
        }
      }
    }

    for hook in self.stages.hooks() {
      if !self.config.contains(&hook.package) || !self.stages.has_stage(&hook.package, &hook.stage) {
        return Err(RegistryError::UnknownHookTarget {
          package: hook.package.clone(),
          stage: hook.stage.clone(),
          timing: hook.timing,
          owner: hook.owner.clone(),
        });
      }
      if let Some(guard) = &hook.guard
        && !self.config.contains(guard)
      {
        return Err(RegistryError::UnknownGuard {
          package: hook.package.clone(),
          stage: hook.stage.clone(),
          guard: guard.clone(),
        });
      }
    }

    self.validated = true;
    info!(
      os = %self.os,
      packages = self.config.len(),
      hooks = self.stages.hooks().len(),
      "registry validated"
    );
    Ok(())
  }

  fn verify_acyclic(&self) -> Result<(), RegistryError> {
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();
    for name in self.config.names() {
      nodes.insert(name, graph.add_node(name));
    }
    for pkg in self.config.packages() {
      for dep in pkg.depends(self.os) {
        if let (Some(&from), Some(&to)) = (nodes.get(dep.as_str()), nodes.get(pkg.name.as_str())) {
          graph.add_edge(from, to, ());
        }
      }
    }

    if toposort(&graph, None).is_ok() {
      return Ok(());
    }
    let scc = tarjan_scc(&graph)
      .into_iter()
      .find(|c| c.len() > 1 || graph.contains_edge(c[0], c[0]))
      .unwrap_or_default();
    let members: HashSet<&str> = scc.iter().map(|idx| graph[*idx]).collect();
    let path = self.cycle_path(&members);
    debug!(cycle = ?path, "dependency cycle detected");
    Err(RegistryError::Cycle { path })
  }

  /// Shortest real edge path through a strongly connected component, from
  /// its first registered member back to itself.
  fn cycle_path(&self, members: &HashSet<&str>) -> Vec<String> {
    let Some(start) = self.config.names().find(|n| members.contains(n)) else {
      return Vec::new();
    };
    let mut parent: HashMap<String, String> = HashMap::new();
    let mut queue = VecDeque::from([start.to_string()]);
    while let Some(name) = queue.pop_front() {
      let deps = self.config.get(&name).map(|p| p.depends(self.os)).unwrap_or_default();
      for dep in deps.into_iter().filter(|d| members.contains(d.as_str())) {
        if dep == start {
          let mut path = vec![start.to_string()];
          let mut at = Some(name.as_str());
          while let Some(node) = at.filter(|n| *n != start) {
            path.push(node.to_string());
            at = parent.get(node).map(String::as_str);
          }
          path[1..].reverse();
          path.push(start.to_string());
          return path;
        }
        if !parent.contains_key(&dep) {
          parent.insert(dep.clone(), name.clone());
          queue.push_back(dep);
        }
      }
    }
    Vec::new()
  }
}
