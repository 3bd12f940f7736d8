//! Artifact acquisition boundary.
//!
//! The installer never downloads anything itself. It asks an
//! [`ArtifactProvider`] to place a package's source tree at its expected
//! location, or to unpack a prebuilt binary into the build root. Network
//! strategies live outside this crate; [`LocalArtifacts`] serves a directory
//! of pre-fetched artifacts.

mod local;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::platform::Os;

pub use local::LocalArtifacts;

#[derive(Debug, Error)]
pub enum ArtifactError {
  #[error("artifact [{artifact}] not found in {}", .searched.display())]
  NotFound { artifact: String, searched: PathBuf },

  #[error("{}: {source}", .path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to unpack {}: {source}", .path.display())]
  Archive {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

impl ArtifactError {
  pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::Io {
      path: path.into(),
      source,
    }
  }
}

/// A cached artifact and the version it resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedArtifact {
  pub path: PathBuf,
  pub version: Option<String>,
}

pub trait ArtifactProvider {
  /// Make `artifact` available locally.
  fn fetch(&self, artifact: &str) -> Result<FetchedArtifact, ArtifactError>;

  /// Populate `dest` with the source tree of `artifact`. `force_source`
  /// replaces an existing tree.
  fn extract(&self, artifact: &str, dest: &Path, force_source: bool) -> Result<(), ArtifactError>;

  /// Unpack a prebuilt binary of `artifact` for `os` into `build_root`.
  ///
  /// Returns `false` when no binary exists, in which case the caller builds
  /// from source.
  fn install_binary(&self, _artifact: &str, _os: Os, _build_root: &Path) -> Result<bool, ArtifactError> {
    Ok(false)
  }
}
