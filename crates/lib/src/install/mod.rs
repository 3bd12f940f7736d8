//! The package installer.
//!
//! Drives a run end to end: resolve the request, validate, then walk the
//! resolved set in order. For each package it either proves the package is
//! already present (declared outputs exist), installs a prebuilt binary, or
//! fetches, patches and builds it through the stage table so hooks fire.
//!
//! Packages run strictly one after another. The first failure stops the run;
//! everything finished before it stays on disk and is picked up by the
//! already-satisfied check next time.

mod license;
mod outputs;
mod patch;
mod tracker;
mod types;

use std::collections::{HashMap, HashSet};

use tracing::{debug, error, info, warn};

use crate::artifact::ArtifactProvider;
use crate::consts::BUILD_STAGE;
use crate::package::{BuildStatus, PackageDef, PackageKind};
use crate::platform::BuildPaths;
use crate::registry::Registry;
use crate::resolve::{DependencyResolver, ResolvedSet};
use crate::stage::StageContext;

pub use license::install_licenses;
pub use outputs::{expected_outputs, is_installed, missing_outputs};
pub use patch::apply_patches;
pub use tracker::{BuildRootTracker, Snapshot, TrackedPackage};
pub use types::{ErrorKind, InstallError, InstallOptions, InstallReport, PackageReport};

pub struct PackageInstaller<'a> {
  registry: &'a Registry,
  provider: &'a dyn ArtifactProvider,
  paths: BuildPaths,
  options: InstallOptions,
  build_packages: Vec<String>,
  install_packages: Vec<String>,
  resolved: ResolvedSet,
  statuses: HashMap<String, BuildStatus>,
}

impl<'a> PackageInstaller<'a> {
  /// # Errors
  ///
  /// `NotValidated` unless [`Registry::validate`] succeeded first.
  pub fn new(
    registry: &'a Registry,
    provider: &'a dyn ArtifactProvider,
    paths: BuildPaths,
    options: InstallOptions,
  ) -> Result<Self, InstallError> {
    if !registry.is_validated() {
      return Err(InstallError::NotValidated);
    }
    Ok(Self {
      registry,
      provider,
      paths,
      options,
      build_packages: Vec::new(),
      install_packages: Vec::new(),
      resolved: ResolvedSet::default(),
      statuses: HashMap::new(),
    })
  }

  /// Request `name` to be built from source.
  ///
  /// # Errors
  ///
  /// `UnknownPackage`, or `NoBuildStage` when the package has no build entry
  /// point for the target OS.
  pub fn add_build_package(&mut self, name: &str) -> Result<&mut Self, InstallError> {
    if !self.registry.config().contains(name) {
      return Err(InstallError::UnknownPackage(name.to_string()));
    }
    if !self.registry.has_build_stage(name) {
      return Err(InstallError::NoBuildStage {
        package: name.to_string(),
        os: self.registry.os(),
      });
    }
    if !self.build_packages.iter().any(|p| p == name) {
      self.build_packages.push(name.to_string());
    }
    Ok(self)
  }

  /// Request `name` to be present, preferring a prebuilt binary and falling
  /// back to a source build.
  pub fn add_install_package(&mut self, name: &str) -> Result<&mut Self, InstallError> {
    if !self.registry.config().contains(name) {
      return Err(InstallError::UnknownPackage(name.to_string()));
    }
    if !self.install_packages.iter().any(|p| p == name) {
      self.install_packages.push(name.to_string());
    }
    Ok(self)
  }

  pub fn is_build_package(&self, name: &str) -> bool {
    self.build_packages.iter().any(|p| p == name)
  }

  /// Whether `name` completed successfully in this run.
  pub fn is_package_resolved(&self, name: &str) -> bool {
    self.statuses.get(name).is_some_and(BuildStatus::is_success)
  }

  pub fn resolved(&self) -> &ResolvedSet {
    &self.resolved
  }

  pub fn paths(&self) -> &BuildPaths {
    &self.paths
  }

  /// Statuses so far, in resolution order. Useful after a failed run.
  pub fn report(&self) -> InstallReport {
    InstallReport {
      packages: self
        .resolved
        .iter()
        .map(|name| PackageReport {
          name: name.to_string(),
          status: self.statuses.get(name).copied().unwrap_or(BuildStatus::Unresolved),
        })
        .collect(),
    }
  }

  /// Resolve the request into an ordered set without building anything.
  pub fn resolve(&mut self) -> Result<&ResolvedSet, InstallError> {
    let mut overrides = HashMap::new();
    for pkg in &self.build_packages {
      let extra = self.registry.resolve_build_deps(pkg, &self.options.build_options);
      if !extra.is_empty() {
        debug!(package = %pkg, extra = ?extra, "target adds build dependencies");
        overrides.insert(pkg.clone(), extra);
      }
    }
    let resolver = DependencyResolver::new(self.registry.config(), self.registry.os()).with_overrides(overrides);
    self.resolved = resolver.resolve(&self.build_packages, &self.install_packages, self.options.with_suggests)?;
    self.statuses = self
      .resolved
      .iter()
      .map(|name| (name.to_string(), BuildStatus::Unresolved))
      .collect();
    Ok(&self.resolved)
  }

  /// Run the whole request.
  ///
  /// # Errors
  ///
  /// Stops at the first failing package; [`PackageInstaller::report`] still
  /// shows what completed.
  pub fn run(&mut self) -> Result<InstallReport, InstallError> {
    self.resolve()?;
    info!(
      os = %self.registry.os(),
      packages = self.resolved.len(),
      order = ?self.resolved.as_slice(),
      "starting install run"
    );
    self
      .paths
      .ensure_build_root()
      .map_err(|e| InstallError::io(&self.paths.build_root, e))?;

    self.validate_all()?;

    let order: Vec<String> = self.resolved.as_slice().to_vec();
    let mut tracker = BuildRootTracker::load(&self.paths.build_root);
    for name in &order {
      self.statuses.insert(name.clone(), BuildStatus::Resolving);
      match self.process(name, &mut tracker) {
        Ok(status) => {
          info!(package = %name, status = %status, "package done");
          self.statuses.insert(name.clone(), status);
        }
        Err(e) => {
          error!(package = %name, error = %e, "package failed");
          self.statuses.insert(name.clone(), BuildStatus::Failed);
          return Err(e);
        }
      }
    }

    let report = self.report();
    info!(
      built = report.count(BuildStatus::Built),
      satisfied = report.count(BuildStatus::AlreadySatisfied),
      installed = report.count(BuildStatus::Installed),
      "install run finished"
    );
    Ok(report)
  }

  fn context<'s>(&'s self, package: &'s PackageDef, stage: &'s str) -> StageContext<'s> {
    let ctx = StageContext::new(
      package,
      stage,
      self.registry.os(),
      &self.paths,
      self.registry.config(),
      &self.resolved,
      &self.statuses,
      &self.options.build_options,
    );
    match self.options.jobs {
      Some(jobs) => ctx.with_jobs(jobs),
      None => ctx,
    }
  }

  fn package(&self, name: &str) -> Result<&'a PackageDef, InstallError> {
    self
      .registry
      .config()
      .get(name)
      .ok_or_else(|| InstallError::UnknownPackage(name.to_string()))
  }

  /// Run every validate callback before anything builds, so bad option
  /// combinations fail the run up front.
  fn validate_all(&self) -> Result<(), InstallError> {
    for name in self.resolved.iter() {
      let pkg = self.package(name)?;
      let ctx = self.context(pkg, "validate");
      for validator in self.registry.validators(name) {
        validator(&ctx).map_err(|source| InstallError::Validation {
          package: name.to_string(),
          source,
        })?;
      }
    }
    Ok(())
  }

  fn process(&self, name: &str, tracker: &mut BuildRootTracker) -> Result<BuildStatus, InstallError> {
    let pkg = self.package(name)?;
    let os = self.registry.os();
    let has_build = self.registry.has_build_stage(name);

    match pkg.kind {
      PackageKind::PhpExtension => {
        debug!(package = %name, "extension is built into its target");
        return Ok(BuildStatus::Included);
      }
      PackageKind::VirtualTarget if !has_build => return Ok(BuildStatus::Included),
      PackageKind::VirtualTarget => {
        self.build(pkg, tracker)?;
        return Ok(BuildStatus::Built);
      }
      PackageKind::Library | PackageKind::Target => {}
    }

    if !self.options.force_rebuild && is_installed(pkg, os, &self.paths) {
      info!(package = %name, "already satisfied, skipping");
      return Ok(BuildStatus::AlreadySatisfied);
    }

    let prefer_binary = self.install_packages.iter().any(|p| p == name) && !self.is_build_package(name);
    if (prefer_binary || !has_build) && self.install_binary(pkg, tracker)? {
      self.verify_outputs(pkg)?;
      return Ok(BuildStatus::Installed);
    }
    if !has_build {
      return Err(InstallError::NotInstallable {
        package: name.to_string(),
        os,
      });
    }

    self.build(pkg, tracker)?;
    self.verify_outputs(pkg)?;
    Ok(BuildStatus::Built)
  }

  /// Every declared output must exist once a package was built or installed.
  fn verify_outputs(&self, pkg: &PackageDef) -> Result<(), InstallError> {
    let missing = missing_outputs(pkg, self.registry.os(), &self.paths);
    if missing.is_empty() {
      return Ok(());
    }
    Err(InstallError::MissingOutputs {
      package: pkg.name.clone(),
      missing,
    })
  }

  fn install_binary(&self, pkg: &PackageDef, tracker: &mut BuildRootTracker) -> Result<bool, InstallError> {
    let artifact = pkg.source_name();
    let before = tracker.snapshot();
    let installed = self
      .provider
      .install_binary(artifact, self.registry.os(), &self.paths.build_root)
      .map_err(|source| InstallError::Artifact {
        package: pkg.name.clone(),
        source,
      })?;
    if installed {
      tracker.record(&pkg.name, "install", &before)?;
    }
    Ok(installed)
  }

  /// Fetch, patch, run the build stage with its hooks, install licenses.
  fn build(&self, pkg: &PackageDef, tracker: &mut BuildRootTracker) -> Result<(), InstallError> {
    let ctx = self.context(pkg, BUILD_STAGE);

    if pkg.kind.has_source() {
      self.ensure_source(pkg)?;
      apply_patches(self.registry, &ctx)?;
    }

    let before = tracker.snapshot();
    info!(package = %pkg.name, "building package");
    self.registry.stages().run(&ctx)?;

    if pkg.kind.has_source() {
      install_licenses(pkg, &self.paths, &ctx.source_dir())?;
    }
    tracker.record(&pkg.name, "build", &before)?;
    Ok(())
  }

  fn ensure_source(&self, pkg: &PackageDef) -> Result<(), InstallError> {
    let dest = self.paths.source_dir(pkg.source_name());
    if dest.is_dir() && !self.options.force_source {
      return Ok(());
    }
    let Some(artifact) = pkg.artifact.as_deref() else {
      warn!(package = %pkg.name, "no artifact declared and no source directory");
      return Err(InstallError::io(
        &dest,
        std::io::Error::new(std::io::ErrorKind::NotFound, "source directory does not exist"),
      ));
    };
    self
      .provider
      .extract(artifact, &dest, self.options.force_source)
      .map_err(|source| InstallError::Artifact {
        package: pkg.name.clone(),
        source,
      })
  }
}

/// Packages in `set` that are not yet present on disk, for dry runs.
pub fn pending_packages(registry: &Registry, set: &ResolvedSet, paths: &BuildPaths) -> HashSet<String> {
  set
    .iter()
    .filter_map(|name| registry.config().get(name))
    .filter(|pkg| pkg.kind.is_buildable() && !is_installed(pkg, registry.os(), paths))
    .map(|pkg| pkg.name.clone())
    .collect()
}
