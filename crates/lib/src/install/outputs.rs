//! Declared-output checks behind idempotent re-runs.

use std::path::PathBuf;

use crate::package::PackageDef;
use crate::platform::{BuildPaths, Os};

/// Expected locations of every declared output of `pkg` on `os`.
///
/// Static libraries live in `lib/`, headers in `include/`, binaries in `bin/`
/// and pkg-config files at `lib/pkgconfig/<name>.pc`. Absolute entries are
/// taken as is.
pub fn expected_outputs(pkg: &PackageDef, os: Os, paths: &BuildPaths) -> Vec<PathBuf> {
  let outputs = pkg.outputs(os);
  let lib = paths.lib_dir();
  let include = paths.include_dir();
  let bin = paths.bin_dir();
  let pkgconfig = paths.pkgconfig_dir();

  let mut files = Vec::new();
  files.extend(outputs.static_libs.iter().map(|f| BuildPaths::relative_to(&lib, f)));
  files.extend(outputs.headers.iter().map(|f| BuildPaths::relative_to(&include, f)));
  files.extend(outputs.pkg_configs.iter().map(|f| {
    let name = if f.ends_with(".pc") { f.clone() } else { format!("{}.pc", f) };
    BuildPaths::relative_to(&pkgconfig, &name)
  }));
  files.extend(outputs.static_bins.iter().map(|f| BuildPaths::relative_to(&bin, f)));
  files
}

/// Declared outputs that do not exist yet.
pub fn missing_outputs(pkg: &PackageDef, os: Os, paths: &BuildPaths) -> Vec<PathBuf> {
  expected_outputs(pkg, os, paths)
    .into_iter()
    .filter(|p| !p.exists())
    .collect()
}

/// Whether `pkg` is already present in the build root.
///
/// A package that declares no outputs is never considered installed, since
/// there is nothing to prove it was built.
pub fn is_installed(pkg: &PackageDef, os: Os, paths: &BuildPaths) -> bool {
  let expected = expected_outputs(pkg, os, paths);
  !expected.is_empty() && expected.iter().all(|p| p.exists())
}
