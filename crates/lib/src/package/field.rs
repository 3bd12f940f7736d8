//! Platform-suffixed field lookup.
//!
//! A field such as `depends` may be declared several times with a platform
//! suffix (`depends@linux`, `depends@unix`). Lookup walks the target OS's
//! suffix chain from most to least specific and returns the first hit.

use serde::Serialize;
use serde_json::Value;

use super::PackageDef;
use crate::platform::Os;

/// Fields that may carry a platform suffix.
pub const SUFFIX_ALLOWED_FIELDS: &[&str] = &[
  "depends",
  "suggests",
  "headers",
  "static-libs",
  "static-bins",
  "frameworks",
  "build-system",
  "build-args",
];

/// Every field a package entry may declare.
pub const KNOWN_FIELDS: &[&str] = &[
  "type",
  "artifact",
  "license",
  "lang",
  "pkg-configs",
  "php-extension",
  "depends",
  "suggests",
  "headers",
  "static-libs",
  "static-bins",
  "frameworks",
  "build-system",
  "build-args",
];

pub const PLATFORM_SUFFIXES: &[&str] = &["@linux", "@macos", "@freebsd", "@bsd", "@unix", "@windows"];

/// Split `depends@linux` into `("depends", Some("@linux"))`.
pub fn split_field_key(key: &str) -> (&str, Option<&str>) {
  match key.find('@') {
    Some(idx) => (&key[..idx], Some(&key[idx..])),
    None => (key, None),
  }
}

/// Files a package promises to leave under the build root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeclaredOutputs {
  pub static_libs: Vec<String>,
  pub headers: Vec<String>,
  pub static_bins: Vec<String>,
  pub pkg_configs: Vec<String>,
}

impl DeclaredOutputs {
  pub fn is_empty(&self) -> bool {
    self.static_libs.is_empty() && self.headers.is_empty() && self.static_bins.is_empty() && self.pkg_configs.is_empty()
  }
}

impl PackageDef {
  /// Value of `field` for `os`, following the suffix chain down to the bare
  /// field.
  pub fn resolve(&self, field: &str, os: Os) -> Option<&Value> {
    os.suffix_chain()
      .iter()
      .find_map(|suffix| self.fields.get(&format!("{}{}", field, suffix)))
  }

  /// List-valued field; missing means empty.
  pub fn list(&self, field: &str, os: Os) -> Vec<String> {
    match self.resolve(field, os) {
      Some(Value::Array(items)) => items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
      Some(Value::String(s)) => vec![s.clone()],
      _ => Vec::new(),
    }
  }

  /// String-valued field.
  pub fn string(&self, field: &str, os: Os) -> Option<String> {
    self.resolve(field, os).and_then(Value::as_str).map(str::to_string)
  }

  /// Required dependencies on `os`, in declaration order.
  pub fn depends(&self, os: Os) -> Vec<String> {
    self.list("depends", os)
  }

  /// Suggested dependencies on `os`, in declaration order.
  pub fn suggests(&self, os: Os) -> Vec<String> {
    self.list("suggests", os)
  }

  pub fn outputs(&self, os: Os) -> DeclaredOutputs {
    DeclaredOutputs {
      static_libs: self.list("static-libs", os),
      headers: self.list("headers", os),
      static_bins: self.list("static-bins", os),
      pkg_configs: self.list("pkg-configs", os),
    }
  }
}
