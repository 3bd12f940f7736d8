use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use crate::config::PackageConfig;
use crate::consts::ENV_CONCURRENCY;
use crate::package::{BuildStatus, PackageDef};
use crate::platform::{BuildPaths, Os, concurrency};
use crate::resolve::ResolvedSet;
use crate::shell::Shell;

/// Everything a stage body or hook can see about the run.
///
/// Hooks receive the context of the stage they are attached to, so
/// `package` is always the package that owns the stage.
pub struct StageContext<'a> {
  pub package: &'a PackageDef,
  pub stage: &'a str,
  pub os: Os,
  pub paths: &'a BuildPaths,
  pub config: &'a PackageConfig,
  pub resolved: &'a ResolvedSet,
  statuses: &'a HashMap<String, BuildStatus>,
  options: &'a BTreeMap<String, String>,
  jobs: usize,
}

impl<'a> StageContext<'a> {
  #[allow(clippy::too_many_arguments)]
  pub fn new(
    package: &'a PackageDef,
    stage: &'a str,
    os: Os,
    paths: &'a BuildPaths,
    config: &'a PackageConfig,
    resolved: &'a ResolvedSet,
    statuses: &'a HashMap<String, BuildStatus>,
    options: &'a BTreeMap<String, String>,
  ) -> Self {
    Self {
      package,
      stage,
      os,
      paths,
      config,
      resolved,
      statuses,
      options,
      jobs: concurrency(),
    }
  }

  /// Same context pointed at another stage of the same package.
  pub fn for_stage(&self, stage: &'a str) -> Self {
    Self {
      stage,
      package: self.package,
      os: self.os,
      paths: self.paths,
      config: self.config,
      resolved: self.resolved,
      statuses: self.statuses,
      options: self.options,
      jobs: self.jobs,
    }
  }

  pub fn with_jobs(mut self, jobs: usize) -> Self {
    self.jobs = jobs.max(1);
    self
  }

  /// Job count to pass to make/cmake.
  pub fn jobs(&self) -> usize {
    self.jobs
  }

  pub fn source_dir(&self) -> PathBuf {
    self.paths.source_dir(self.package.source_name())
  }

  /// Shell in the package's source directory logging to the package log.
  pub fn shell(&self) -> Shell {
    Shell::new(self.source_dir())
      .with_log(self.paths.package_log(&self.package.name))
      .with_env(ENV_CONCURRENCY, self.jobs.to_string())
      .with_env("BUILD_ROOT_PATH", self.paths.build_root.display().to_string())
  }

  /// Whether `name` finished successfully earlier in this run.
  pub fn is_package_resolved(&self, name: &str) -> bool {
    self.statuses.get(name).is_some_and(BuildStatus::is_success)
  }

  /// Whether `name` is part of this run at all.
  pub fn in_resolved_set(&self, name: &str) -> bool {
    self.resolved.contains(name)
  }

  /// A build option passed by the caller (`--with-foo`, `--disable-bar`).
  pub fn option(&self, key: &str) -> Option<&str> {
    self.options.get(key).map(String::as_str)
  }

  pub fn has_option(&self, key: &str) -> bool {
    self.options.contains_key(key)
  }

  /// Platform-resolved list field of the current package.
  pub fn list(&self, field: &str) -> Vec<String> {
    self.package.list(field, self.os)
  }

  pub fn string(&self, field: &str) -> Option<String> {
    self.package.string(field, self.os)
  }
}
