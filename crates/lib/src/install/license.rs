use std::path::{Path, PathBuf};

use tracing::debug;

use super::InstallError;
use crate::package::{License, PackageDef};
use crate::platform::BuildPaths;

/// Write the license entries of `pkg` to `source-licenses/<pkg>/<i>.txt`.
///
/// Text licenses are written verbatim; file licenses are copied from the
/// package source tree. Returns the files written.
pub fn install_licenses(pkg: &PackageDef, paths: &BuildPaths, source_dir: &Path) -> Result<Vec<PathBuf>, InstallError> {
  if pkg.license.is_empty() {
    return Ok(Vec::new());
  }
  let dir = paths.license_dir(&pkg.name);
  std::fs::create_dir_all(&dir).map_err(|e| InstallError::io(&dir, e))?;

  let mut written = Vec::new();
  for (index, license) in pkg.license.iter().enumerate() {
    let target = dir.join(format!("{}.txt", index));
    match license {
      License::Text { text } => std::fs::write(&target, text).map_err(|e| InstallError::io(&target, e))?,
      License::File { path } => {
        let from = source_dir.join(path);
        std::fs::copy(&from, &target).map_err(|e| InstallError::io(&from, e))?;
      }
    }
    written.push(target);
  }
  debug!(package = %pkg.name, count = written.len(), "installed licenses");
  Ok(written)
}
