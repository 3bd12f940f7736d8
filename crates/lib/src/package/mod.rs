//! Package model.
//!
//! A [`PackageDef`] is the typed view of one entry in the package
//! configuration. It is created once when the configuration loads and never
//! mutated afterwards; per-run state such as [`BuildStatus`] lives in the
//! installer.

mod field;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use field::{DeclaredOutputs, KNOWN_FIELDS, PLATFORM_SUFFIXES, SUFFIX_ALLOWED_FIELDS, split_field_key};

/// What kind of unit a package is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageKind {
  Library,
  PhpExtension,
  Target,
  VirtualTarget,
}

impl PackageKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Library => "library",
      Self::PhpExtension => "php-extension",
      Self::Target => "target",
      Self::VirtualTarget => "virtual-target",
    }
  }

  /// Libraries and targets produce files under the build root and take part
  /// in the already-satisfied check.
  pub fn is_buildable(&self) -> bool {
    matches!(self, Self::Library | Self::Target)
  }

  /// Whether the kind is backed by source code that may need fetching,
  /// patching and license installation.
  pub fn has_source(&self) -> bool {
    !matches!(self, Self::VirtualTarget)
  }
}

impl fmt::Display for PackageKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for PackageKind {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "library" => Ok(Self::Library),
      "php-extension" => Ok(Self::PhpExtension),
      "target" => Ok(Self::Target),
      "virtual-target" => Ok(Self::VirtualTarget),
      other => Err(format!("unknown package type: {}", other)),
    }
  }
}

/// License metadata installed next to the build outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum License {
  /// Literal license text.
  Text { text: String },
  /// A file inside the package source tree.
  File { path: String },
}

/// The `php-extension` block of an extension package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PhpExtension {
  /// How the extension is enabled on `configure` (`enable`, `with`,
  /// `with-path`, ...), keyed by platform suffix (`""` for the bare key).
  pub arg_type: BTreeMap<String, String>,
  pub zend_extension: bool,
  pub build_shared: bool,
  pub build_static: bool,
  pub build_with_php: bool,
  /// Per-OS support note (`no`, `wip`, `partial`); absent means supported.
  pub support: BTreeMap<String, String>,
  pub notes: bool,
}

impl PhpExtension {
  /// Support note for `os`, if the extension is restricted there.
  pub fn support_on(&self, os: crate::platform::Os) -> Option<&str> {
    self.support.get(os.as_str()).map(String::as_str)
  }

  /// `arg-type` for `os`, following the suffix chain.
  pub fn arg_type_for(&self, os: crate::platform::Os) -> Option<&str> {
    os.suffix_chain()
      .iter()
      .find_map(|suffix| self.arg_type.get(*suffix))
      .map(String::as_str)
  }
}

/// One package as declared in configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageDef {
  pub name: String,
  pub kind: PackageKind,
  pub artifact: Option<String>,
  pub license: Vec<License>,
  pub php_extension: Option<PhpExtension>,
  /// Raw fields keyed by their full key, suffix included (`depends@linux`).
  pub fields: BTreeMap<String, serde_json::Value>,
}

impl PackageDef {
  /// A package with no fields, mostly useful for tests and embedding.
  pub fn new(name: impl Into<String>, kind: PackageKind) -> Self {
    Self {
      name: name.into(),
      kind,
      artifact: None,
      license: Vec::new(),
      php_extension: None,
      fields: BTreeMap::new(),
    }
  }

  /// Set a raw field; `key` may carry a platform suffix.
  pub fn with_field(mut self, key: &str, value: serde_json::Value) -> Self {
    self.fields.insert(key.to_string(), value);
    self
  }

  pub fn with_artifact(mut self, artifact: impl Into<String>) -> Self {
    self.artifact = Some(artifact.into());
    self
  }

  /// Directory name of the package's source tree. Packages without an
  /// artifact use their own name.
  pub fn source_name(&self) -> &str {
    self.artifact.as_deref().unwrap_or(&self.name)
  }
}

/// Per-run state of a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildStatus {
  Unresolved,
  Resolving,
  /// Every declared output was already present; nothing ran.
  AlreadySatisfied,
  Built,
  /// Satisfied from a prebuilt binary artifact.
  Installed,
  /// A php-extension consumed by its target's build.
  Included,
  Failed,
}

impl BuildStatus {
  pub fn is_terminal(&self) -> bool {
    !matches!(self, Self::Unresolved | Self::Resolving)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, Self::AlreadySatisfied | Self::Built | Self::Installed | Self::Included)
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Unresolved => "unresolved",
      Self::Resolving => "resolving",
      Self::AlreadySatisfied => "already-satisfied",
      Self::Built => "built",
      Self::Installed => "installed",
      Self::Included => "included",
      Self::Failed => "failed",
    }
  }
}

impl fmt::Display for BuildStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}
