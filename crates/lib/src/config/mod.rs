//! Package configuration.
//!
//! Configuration is a set of JSON files mapping package names to their
//! declaration. A directory is loaded as every `pkg.*.json` in sorted order
//! followed by `pkg.json`; a later declaration of a name replaces the earlier
//! one but keeps its registration position.
//!
//! Every entry is validated strictly while it loads (see [`validate`]), so a
//! [`PackageConfig`] that exists is well-formed. Cross-package checks that
//! depend on the target OS live in [`PackageConfig::check_references`].

mod validate;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::consts::{CONFIG_FILE, CONFIG_FILE_PREFIX, CONFIG_FILE_SUFFIX};
use crate::package::PackageDef;
use crate::platform::Os;

pub use validate::parse_package;

/// Errors raised while loading or checking package configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read {}: {source}", .path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("{origin} is not valid JSON: {source}")]
  Parse {
    origin: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("{origin} is broken: top level must be an object of packages")]
  NotAnObject { origin: String },

  #[error("no package configuration found in {}", .0.display())]
  NotFound(PathBuf),

  /// A single package entry failed validation.
  #[error("package [{package}] in {origin}: {message}")]
  Invalid {
    origin: String,
    package: String,
    message: String,
  },

  /// An edge names a package that is not declared.
  #[error("package [{package}] {field} unknown package [{target}]")]
  DanglingReference {
    package: String,
    field: &'static str,
    target: String,
  },
}

/// All declared packages, in registration order.
#[derive(Debug, Clone, Default)]
pub struct PackageConfig {
  packages: Vec<PackageDef>,
  index: HashMap<String, usize>,
}

impl PackageConfig {
  pub fn new() -> Self {
    Self::default()
  }

  /// Load every package file in `dir`.
  ///
  /// # Errors
  ///
  /// Returns `NotFound` when the directory holds no package file, and the
  /// first read, parse or validation error otherwise.
  pub fn load_dir(dir: &Path) -> Result<Self, ConfigError> {
    let entries = std::fs::read_dir(dir).map_err(|source| ConfigError::Io {
      path: dir.to_path_buf(),
      source,
    })?;

    let mut extra = Vec::new();
    for entry in entries {
      let entry = entry.map_err(|source| ConfigError::Io {
        path: dir.to_path_buf(),
        source,
      })?;
      let name = entry.file_name().to_string_lossy().to_string();
      if name != CONFIG_FILE && name.starts_with(CONFIG_FILE_PREFIX) && name.ends_with(CONFIG_FILE_SUFFIX) {
        extra.push(name);
      }
    }
    extra.sort();

    let mut files: Vec<PathBuf> = extra.iter().map(|n| dir.join(n)).collect();
    let main = dir.join(CONFIG_FILE);
    if main.is_file() {
      files.push(main);
    }
    if files.is_empty() {
      return Err(ConfigError::NotFound(dir.to_path_buf()));
    }

    let mut config = Self::new();
    for path in &files {
      config.merge(Self::load_file(path)?);
    }
    info!(dir = %dir.display(), files = files.len(), packages = config.len(), "loaded package configuration");
    Ok(config)
  }

  /// Load a single package file.
  pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    let origin = path
      .file_name()
      .map(|n| n.to_string_lossy().to_string())
      .unwrap_or_else(|| path.display().to_string());
    Self::from_json_str(&origin, &text)
  }

  /// Parse and validate one JSON document. `origin` names it in errors.
  pub fn from_json_str(origin: &str, text: &str) -> Result<Self, ConfigError> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(|source| ConfigError::Parse {
      origin: origin.to_string(),
      source,
    })?;
    let serde_json::Value::Object(map) = value else {
      return Err(ConfigError::NotAnObject {
        origin: origin.to_string(),
      });
    };

    let mut config = Self::new();
    for (name, entry) in &map {
      config.insert(parse_package(origin, name, entry)?);
    }
    debug!(origin, packages = config.len(), "parsed package file");
    Ok(config)
  }

  /// Add or replace a package. A replaced package keeps its position.
  pub fn insert(&mut self, def: PackageDef) {
    match self.index.get(&def.name) {
      Some(&idx) => self.packages[idx] = def,
      None => {
        self.index.insert(def.name.clone(), self.packages.len());
        self.packages.push(def);
      }
    }
  }

  /// Fold `other` into `self`; `other` wins on name clashes.
  pub fn merge(&mut self, other: PackageConfig) {
    for def in other.packages {
      self.insert(def);
    }
  }

  pub fn get(&self, name: &str) -> Option<&PackageDef> {
    self.index.get(name).map(|&idx| &self.packages[idx])
  }

  pub fn contains(&self, name: &str) -> bool {
    self.index.contains_key(name)
  }

  /// Packages in registration order.
  pub fn packages(&self) -> impl Iterator<Item = &PackageDef> {
    self.packages.iter()
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.packages.iter().map(|p| p.name.as_str())
  }

  pub fn len(&self) -> usize {
    self.packages.len()
  }

  pub fn is_empty(&self) -> bool {
    self.packages.is_empty()
  }

  /// Check that every `depends`/`suggests` edge on `os` names a declared
  /// package.
  pub fn check_references(&self, os: Os) -> Result<(), ConfigError> {
    for pkg in &self.packages {
      for (field, targets) in [("depends on", pkg.depends(os)), ("suggests", pkg.suggests(os))] {
        if let Some(target) = targets.into_iter().find(|t| !self.contains(t)) {
          return Err(ConfigError::DanglingReference {
            package: pkg.name.clone(),
            field,
            target,
          });
        }
      }
    }
    Ok(())
  }
}
