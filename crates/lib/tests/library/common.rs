//! Shared fixtures for library integration tests.

use std::path::Path;
use std::sync::{Arc, Mutex};

use spc_lib::config::PackageConfig;
use spc_lib::install::expected_outputs;
use spc_lib::platform::BuildPaths;
use spc_lib::stage::{StageContext, StageError};
use tempfile::TempDir;

pub fn config(json: &str) -> PackageConfig {
  PackageConfig::from_json_str("pkg.json", json).unwrap()
}

/// Resolve names as owned strings, the way the CLI hands them over.
pub fn names(list: &[&str]) -> Vec<String> {
  list.iter().map(|s| s.to_string()).collect()
}

/// Isolated working directory with the default layout.
pub struct TestEnv {
  pub temp: TempDir,
  pub paths: BuildPaths,
}

impl TestEnv {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let paths = BuildPaths::under(temp.path());
    paths.ensure_build_root().unwrap();
    Self { temp, paths }
  }

  /// Create empty source trees so no artifact has to be extracted.
  pub fn with_sources(self, artifacts: &[&str]) -> Self {
    for artifact in artifacts {
      std::fs::create_dir_all(self.paths.source_dir(artifact)).unwrap();
    }
    self
  }

  pub fn downloads(&self) -> &Path {
    &self.paths.download_root
  }

  pub fn write(&self, relative: &str, content: &str) {
    let path = self.temp.path().join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
  }
}

pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog {
  Arc::new(Mutex::new(Vec::new()))
}

pub fn calls(log: &CallLog) -> Vec<String> {
  log.lock().unwrap().clone()
}

pub fn record(log: &CallLog, label: &str) -> impl Fn(&StageContext<'_>) -> Result<(), StageError> + Send + Sync + 'static {
  let log = Arc::clone(log);
  let label = label.to_string();
  move |_ctx| {
    log.lock().unwrap().push(label.clone());
    Ok(())
  }
}

/// Records `label` and creates every declared output of the package.
pub fn build_outputs(log: &CallLog, label: &str) -> impl Fn(&StageContext<'_>) -> Result<(), StageError> + Send + Sync + 'static {
  let log = Arc::clone(log);
  let label = label.to_string();
  move |ctx| {
    log.lock().unwrap().push(label.clone());
    for file in expected_outputs(ctx.package, ctx.os, ctx.paths) {
      let dir = file.parent().unwrap();
      std::fs::create_dir_all(dir).map_err(|e| StageError::io(dir, e))?;
      std::fs::write(&file, "").map_err(|e| StageError::io(&file, e))?;
    }
    Ok(())
  }
}

/// Write a gzipped tarball with the given `(path, content)` entries.
pub fn write_tarball(path: &Path, files: &[(&str, &str)]) {
  std::fs::create_dir_all(path.parent().unwrap()).unwrap();
  let file = std::fs::File::create(path).unwrap();
  let mut builder = tar::Builder::new(flate2::write::GzEncoder::new(file, flate2::Compression::default()));
  for (name, content) in files {
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, name, content.as_bytes()).unwrap();
  }
  builder.into_inner().unwrap().finish().unwrap();
}

/// Every file below `root` with its content, for before/after comparisons.
pub fn tree(root: &Path) -> Vec<(String, Vec<u8>)> {
  walkdir::WalkDir::new(root)
    .sort_by_file_name()
    .into_iter()
    .filter_map(Result::ok)
    .filter(|e| e.file_type().is_file())
    .map(|e| {
      let rel = e.path().strip_prefix(root).unwrap().to_string_lossy().to_string();
      (rel, std::fs::read(e.path()).unwrap())
    })
    .collect()
}
