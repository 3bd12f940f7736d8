use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::{ArtifactError, ArtifactProvider, FetchedArtifact};
use crate::platform::Os;

const ARCHIVE_SUFFIXES: &[&str] = &[".tar.gz", ".tgz", ".tar"];

/// Serves artifacts from a directory of pre-fetched sources.
///
/// Layout:
///
/// - `<dir>/<artifact>/` a ready source tree, copied as is
/// - `<dir>/<artifact>[-<version>].tar.gz|.tgz|.tar` an archive; a single
///   top-level directory is stripped on extraction
/// - `<dir>/binary/<artifact>-<os>.tar.gz` a prebuilt binary unpacked into
///   the build root
#[derive(Debug, Clone)]
pub struct LocalArtifacts {
  dir: PathBuf,
}

impl LocalArtifacts {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  fn find_archive(&self, artifact: &str) -> Result<Option<(PathBuf, Option<String>)>, ArtifactError> {
    if !self.dir.is_dir() {
      return Ok(None);
    }
    let entries = std::fs::read_dir(&self.dir).map_err(|e| ArtifactError::io(&self.dir, e))?;
    let mut found = Vec::new();
    for entry in entries {
      let entry = entry.map_err(|e| ArtifactError::io(&self.dir, e))?;
      let name = entry.file_name().to_string_lossy().to_string();
      if let Some(version) = archive_version(&name, artifact) {
        found.push((entry.path(), version));
      }
    }
    found.sort();
    Ok(found.into_iter().next())
  }
}

/// `Some(version)` when `file` is an archive of `artifact`.
fn archive_version(file: &str, artifact: &str) -> Option<Option<String>> {
  let stem = ARCHIVE_SUFFIXES.iter().find_map(|s| file.strip_suffix(s))?;
  if stem == artifact {
    return Some(None);
  }
  let version = stem.strip_prefix(artifact)?.strip_prefix('-')?;
  version
    .starts_with(|c: char| c.is_ascii_digit() || c == 'v')
    .then(|| Some(version.to_string()))
}

impl ArtifactProvider for LocalArtifacts {
  fn fetch(&self, artifact: &str) -> Result<FetchedArtifact, ArtifactError> {
    let tree = self.dir.join(artifact);
    if tree.is_dir() {
      return Ok(FetchedArtifact {
        path: tree,
        version: None,
      });
    }
    match self.find_archive(artifact)? {
      Some((path, version)) => Ok(FetchedArtifact { path, version }),
      None => Err(ArtifactError::NotFound {
        artifact: artifact.to_string(),
        searched: self.dir.clone(),
      }),
    }
  }

  fn extract(&self, artifact: &str, dest: &Path, force_source: bool) -> Result<(), ArtifactError> {
    if dest.exists() {
      if !force_source {
        debug!(artifact, dest = %dest.display(), "source already present");
        return Ok(());
      }
      std::fs::remove_dir_all(dest).map_err(|e| ArtifactError::io(dest, e))?;
    }
    let fetched = self.fetch(artifact)?;
    info!(
      artifact,
      from = %fetched.path.display(),
      version = fetched.version.as_deref().unwrap_or("-"),
      "extracting source"
    );

    if fetched.path.is_dir() {
      return copy_tree(&fetched.path, dest);
    }

    let staging = dest.with_extension("spc-extracting");
    if staging.exists() {
      std::fs::remove_dir_all(&staging).map_err(|e| ArtifactError::io(&staging, e))?;
    }
    std::fs::create_dir_all(&staging).map_err(|e| ArtifactError::io(&staging, e))?;
    unpack(&fetched.path, &staging)?;

    let root = single_top_dir(&staging)?.unwrap_or_else(|| staging.clone());
    if let Some(parent) = dest.parent() {
      std::fs::create_dir_all(parent).map_err(|e| ArtifactError::io(parent, e))?;
    }
    std::fs::rename(&root, dest).map_err(|e| ArtifactError::io(dest, e))?;
    if staging.exists() {
      std::fs::remove_dir_all(&staging).map_err(|e| ArtifactError::io(&staging, e))?;
    }
    Ok(())
  }

  fn install_binary(&self, artifact: &str, os: Os, build_root: &Path) -> Result<bool, ArtifactError> {
    let archive = self.dir.join("binary").join(format!("{}-{}.tar.gz", artifact, os));
    if !archive.is_file() {
      return Ok(false);
    }
    std::fs::create_dir_all(build_root).map_err(|e| ArtifactError::io(build_root, e))?;
    unpack(&archive, build_root)?;
    info!(artifact, os = %os, "installed prebuilt binary");
    Ok(true)
  }
}

fn unpack(archive: &Path, into: &Path) -> Result<(), ArtifactError> {
  let file = File::open(archive).map_err(|e| ArtifactError::io(archive, e))?;
  let reader: Box<dyn Read> = if archive.extension().is_some_and(|e| e == "tar") {
    Box::new(file)
  } else {
    Box::new(GzDecoder::new(file))
  };
  Archive::new(reader).unpack(into).map_err(|source| ArtifactError::Archive {
    path: archive.to_path_buf(),
    source,
  })
}

fn single_top_dir(dir: &Path) -> Result<Option<PathBuf>, ArtifactError> {
  let mut entries = std::fs::read_dir(dir)
    .map_err(|e| ArtifactError::io(dir, e))?
    .collect::<Result<Vec<_>, _>>()
    .map_err(|e| ArtifactError::io(dir, e))?;
  if entries.len() == 1 {
    let only = entries.remove(0).path();
    if only.is_dir() {
      return Ok(Some(only));
    }
  }
  Ok(None)
}

fn copy_tree(from: &Path, to: &Path) -> Result<(), ArtifactError> {
  for entry in WalkDir::new(from) {
    let entry = entry.map_err(|e| {
      let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| from.to_path_buf());
      ArtifactError::io(path, e.into())
    })?;
    let rel = entry.path().strip_prefix(from).unwrap_or(entry.path());
    let target = to.join(rel);
    if entry.file_type().is_dir() {
      std::fs::create_dir_all(&target).map_err(|e| ArtifactError::io(&target, e))?;
    } else {
      std::fs::copy(entry.path(), &target).map_err(|e| ArtifactError::io(&target, e))?;
    }
  }
  Ok(())
}
