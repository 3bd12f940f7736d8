//! Build-root provenance.
//!
//! Records which files each package added to the shared build root, in
//! `<build_root>/.spc-tracker.json`, so a stray header or library can be
//! traced back to the package that installed it.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::InstallError;
use crate::consts::TRACKER_FILE;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedPackage {
  /// `build` or `install`.
  #[serde(rename = "type")]
  pub kind: String,
  /// Paths relative to the build root, `/`-separated.
  pub files: Vec<String>,
  pub time: String,
}

#[derive(Debug, Clone, Default)]
pub struct BuildRootTracker {
  root: PathBuf,
  data: BTreeMap<String, TrackedPackage>,
}

/// Files present in the build root before a package ran.
#[derive(Debug, Clone)]
pub struct Snapshot(BTreeSet<String>);

impl BuildRootTracker {
  /// Load the tracker of `root`; a missing or unreadable file starts empty.
  pub fn load(root: &Path) -> Self {
    let file = root.join(TRACKER_FILE);
    let data = std::fs::read_to_string(&file)
      .ok()
      .and_then(|text| match serde_json::from_str(&text) {
        Ok(data) => Some(data),
        Err(e) => {
          warn!(file = %file.display(), error = %e, "ignoring corrupt tracker file");
          None
        }
      })
      .unwrap_or_default();
    Self {
      root: root.to_path_buf(),
      data,
    }
  }

  pub fn snapshot(&self) -> Snapshot {
    Snapshot(list_files(&self.root))
  }

  /// Record files added since `before` under `package` and save.
  ///
  /// Nothing is written when the package added no files.
  pub fn record(&mut self, package: &str, kind: &str, before: &Snapshot) -> Result<usize, InstallError> {
    let added: Vec<String> = list_files(&self.root).difference(&before.0).cloned().collect();
    if added.is_empty() {
      return Ok(0);
    }
    let count = added.len();
    self.data.insert(
      package.to_string(),
      TrackedPackage {
        kind: kind.to_string(),
        files: added,
        time: humantime::format_rfc3339_seconds(SystemTime::now()).to_string(),
      },
    );
    self.save()?;
    debug!(package, files = count, "tracked build root changes");
    Ok(count)
  }

  pub fn package(&self, name: &str) -> Option<&TrackedPackage> {
    self.data.get(name)
  }

  pub fn packages(&self) -> impl Iterator<Item = (&str, &TrackedPackage)> {
    self.data.iter().map(|(k, v)| (k.as_str(), v))
  }

  /// Package that introduced `file` (relative to the build root).
  pub fn owner_of(&self, file: &str) -> Option<&str> {
    let file = file.trim_start_matches(['/', '\\']).replace('\\', "/");
    self
      .data
      .iter()
      .find(|(_, t)| t.files.iter().any(|f| *f == file))
      .map(|(name, _)| name.as_str())
  }

  pub fn clear_package(&mut self, name: &str) -> Result<(), InstallError> {
    if self.data.remove(name).is_some() {
      self.save()?;
    }
    Ok(())
  }

  fn save(&self) -> Result<(), InstallError> {
    let file = self.root.join(TRACKER_FILE);
    std::fs::create_dir_all(&self.root).map_err(|e| InstallError::io(&self.root, e))?;
    let text = serde_json::to_string_pretty(&self.data).map_err(|e| InstallError::io(&file, e.into()))?;
    std::fs::write(&file, text).map_err(|e| InstallError::io(&file, e))
  }
}

fn list_files(root: &Path) -> BTreeSet<String> {
  WalkDir::new(root)
    .into_iter()
    .filter_map(Result::ok)
    .filter(|e| !e.file_type().is_dir())
    .filter_map(|e| {
      let rel = e.path().strip_prefix(root).ok()?;
      let rel = rel.to_string_lossy().replace('\\', "/");
      (rel != TRACKER_FILE).then_some(rel)
    })
    .collect()
}
