//! Directory layout for a build run.
//!
//! Everything lives under a working directory unless overridden through the
//! environment:
//!
//! - `buildroot/` shared install prefix (`lib/`, `include/`, `bin/`)
//! - `source/` extracted sources, one directory per artifact
//! - `downloads/` pre-fetched artifacts consumed by the local provider
//! - `log/` captured output of every external command, one file per package

use std::path::{Path, PathBuf};

use crate::consts::{
  ENV_BUILD_ROOT, ENV_CONCURRENCY, ENV_DOWNLOAD_ROOT, ENV_LOG_ROOT, ENV_SOURCE_ROOT, ENV_TARGET, ENV_WORKING_DIR,
};
use crate::platform::os::Os;

/// Resolved directories for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPaths {
  pub working_dir: PathBuf,
  pub build_root: PathBuf,
  pub source_root: PathBuf,
  pub download_root: PathBuf,
  pub log_root: PathBuf,
}

impl BuildPaths {
  /// Default layout below `working_dir`.
  pub fn under(working_dir: impl Into<PathBuf>) -> Self {
    let working_dir = working_dir.into();
    Self {
      build_root: working_dir.join("buildroot"),
      source_root: working_dir.join("source"),
      download_root: working_dir.join("downloads"),
      log_root: working_dir.join("log"),
      working_dir,
    }
  }

  /// Layout from `SPC_*` environment variables, falling back to defaults
  /// below `SPC_WORKING_DIR` (or the current directory).
  pub fn from_env() -> Self {
    let working_dir = env_path(ENV_WORKING_DIR)
      .or_else(|| std::env::current_dir().ok())
      .unwrap_or_else(|| PathBuf::from("."));
    let working_dir = dunce::canonicalize(&working_dir).unwrap_or(working_dir);
    let mut paths = Self::under(working_dir);
    if let Some(p) = env_path(ENV_BUILD_ROOT) {
      paths.build_root = p;
    }
    if let Some(p) = env_path(ENV_SOURCE_ROOT) {
      paths.source_root = p;
    }
    if let Some(p) = env_path(ENV_DOWNLOAD_ROOT) {
      paths.download_root = p;
    }
    if let Some(p) = env_path(ENV_LOG_ROOT) {
      paths.log_root = p;
    }
    paths
  }

  pub fn lib_dir(&self) -> PathBuf {
    self.build_root.join("lib")
  }

  pub fn include_dir(&self) -> PathBuf {
    self.build_root.join("include")
  }

  pub fn bin_dir(&self) -> PathBuf {
    self.build_root.join("bin")
  }

  pub fn pkgconfig_dir(&self) -> PathBuf {
    self.lib_dir().join("pkgconfig")
  }

  /// Where the license files of `package` are installed.
  pub fn license_dir(&self, package: &str) -> PathBuf {
    self.build_root.join("source-licenses").join(package)
  }

  /// Extracted source tree of an artifact.
  pub fn source_dir(&self, artifact: &str) -> PathBuf {
    self.source_root.join(artifact)
  }

  /// Captured command output of a package.
  pub fn package_log(&self, package: &str) -> PathBuf {
    self.log_root.join(format!("{}.log", package))
  }

  /// Create the shared build root directories.
  pub fn ensure_build_root(&self) -> std::io::Result<()> {
    for dir in [self.lib_dir(), self.include_dir(), self.bin_dir(), self.log_root.clone()] {
      std::fs::create_dir_all(dir)?;
    }
    Ok(())
  }

  /// Resolve `file` against `base` unless it is already absolute.
  pub fn relative_to(base: &Path, file: &str) -> PathBuf {
    let path = Path::new(file);
    if path.is_absolute() { path.to_path_buf() } else { base.join(path) }
  }
}

/// Target OS for the run from `SPC_TARGET`, an OS name or a triple.
///
/// Unset, empty or `native` means the host. Anything else that names no
/// supported OS is an error rather than a silent fallback.
pub fn target_os() -> Result<Os, String> {
  let value = std::env::var(ENV_TARGET).unwrap_or_default();
  let value = value.trim();
  if value.is_empty() || value.eq_ignore_ascii_case("native") {
    return Os::current().ok_or_else(|| "host operating system is not supported".to_string());
  }
  value.parse::<Os>()
}

/// Job count handed to make/cmake.
pub fn concurrency() -> usize {
  std::env::var(ENV_CONCURRENCY)
    .ok()
    .and_then(|v| v.trim().parse::<usize>().ok())
    .filter(|n| *n > 0)
    .unwrap_or_else(|| std::thread::available_parallelism().map(|p| p.get()).unwrap_or(1))
}

fn env_path(name: &str) -> Option<PathBuf> {
  std::env::var_os(name).filter(|v| !v.is_empty()).map(PathBuf::from)
}
