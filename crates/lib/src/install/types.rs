//! Errors, options and reports of an install run.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::artifact::ArtifactError;
use crate::package::BuildStatus;
use crate::platform::Os;
use crate::registry::RegistryError;
use crate::resolve::ResolveError;
use crate::stage::{StageError, StageRunError};

/// Coarse classification used for exit codes and messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// The caller asked for something invalid.
  Usage,
  /// Package configuration or registration is broken.
  Configuration,
  /// An external tool or build logic failed.
  Build,
  /// A file or directory is missing or unwritable.
  Filesystem,
}

impl fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Usage => "usage error",
      Self::Configuration => "configuration error",
      Self::Build => "build error",
      Self::Filesystem => "filesystem error",
    })
  }
}

#[derive(Debug, Error)]
pub enum InstallError {
  #[error(transparent)]
  Resolve(#[from] ResolveError),

  #[error(transparent)]
  Registry(#[from] RegistryError),

  #[error("registry must be validated before installing")]
  NotValidated,

  #[error("unknown package [{0}]")]
  UnknownPackage(String),

  #[error("package [{package}] does not define a build process for {os}")]
  NoBuildStage { package: String, os: Os },

  #[error("package [{package}] cannot be installed: no build stage and no binary artifact for {os}")]
  NotInstallable { package: String, os: Os },

  #[error("package [{package}] rejected the build: {source}")]
  Validation {
    package: String,
    #[source]
    source: StageError,
  },

  #[error(transparent)]
  Stage(#[from] StageRunError),

  #[error("patching package [{package}] failed: {source}")]
  Patch {
    package: String,
    #[source]
    source: StageError,
  },

  #[error("fetching sources of package [{package}] failed: {source}")]
  Artifact {
    package: String,
    #[source]
    source: ArtifactError,
  },

  #[error("package [{package}] built but did not produce: {}", display_paths(.missing))]
  MissingOutputs { package: String, missing: Vec<PathBuf> },

  #[error("{}: {source}", .path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

fn display_paths(paths: &[PathBuf]) -> String {
  paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", ")
}

impl InstallError {
  pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::Io {
      path: path.into(),
      source,
    }
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::Resolve(e) if e.is_usage() => ErrorKind::Usage,
      Self::Resolve(_) | Self::Registry(_) | Self::NotValidated => ErrorKind::Configuration,
      Self::UnknownPackage(_) | Self::NoBuildStage { .. } | Self::NotInstallable { .. } => ErrorKind::Usage,
      Self::Validation { source, .. } => stage_kind(source, ErrorKind::Usage),
      Self::Stage(e) => stage_kind(&e.source, ErrorKind::Build),
      Self::Patch { source, .. } => stage_kind(source, ErrorKind::Build),
      Self::Artifact { .. } | Self::MissingOutputs { .. } | Self::Io { .. } => ErrorKind::Filesystem,
    }
  }

  /// Captured tool output of the failing step, when there is one.
  pub fn log_path(&self) -> Option<&Path> {
    match self {
      Self::Stage(e) => e.source.log_path(),
      Self::Patch { source, .. } | Self::Validation { source, .. } => source.log_path(),
      _ => None,
    }
  }
}

fn stage_kind(err: &StageError, default: ErrorKind) -> ErrorKind {
  match err {
    StageError::Usage(_) => ErrorKind::Usage,
    StageError::Io { .. } => ErrorKind::Filesystem,
    StageError::Shell(_) => ErrorKind::Build,
    StageError::UnknownStage | StageError::Failed(_) => default,
  }
}

/// Knobs for one run.
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
  /// Build even when every declared output exists.
  pub force_rebuild: bool,
  /// Follow suggestion edges one hop from the requested closure.
  pub with_suggests: bool,
  /// Re-extract sources that are already present.
  pub force_source: bool,
  /// Job count for make/cmake; `None` uses `SPC_CONCURRENCY` or the CPU count.
  pub jobs: Option<usize>,
  /// Free-form build options visible to stages and callbacks.
  pub build_options: BTreeMap<String, String>,
}

/// Outcome of one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageReport {
  pub name: String,
  pub status: BuildStatus,
}

/// Per-package statuses of a run, in resolution order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallReport {
  pub packages: Vec<PackageReport>,
}

impl InstallReport {
  pub fn status(&self, name: &str) -> Option<BuildStatus> {
    self.packages.iter().find(|p| p.name == name).map(|p| p.status)
  }

  pub fn is_success(&self) -> bool {
    self.packages.iter().all(|p| p.status.is_success())
  }

  /// Names with the given status, in order.
  pub fn with_status(&self, status: BuildStatus) -> Vec<&str> {
    self
      .packages
      .iter()
      .filter(|p| p.status == status)
      .map(|p| p.name.as_str())
      .collect()
  }

  pub fn count(&self, status: BuildStatus) -> usize {
    self.packages.iter().filter(|p| p.status == status).count()
  }
}
