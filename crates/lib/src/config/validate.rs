//! Strict validation of a single package entry.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::ConfigError;
use crate::package::{
  KNOWN_FIELDS, License, PLATFORM_SUFFIXES, PackageDef, PackageKind, PhpExtension, SUFFIX_ALLOWED_FIELDS,
  split_field_key,
};

const LIST_FIELDS: &[&str] = &[
  "depends",
  "suggests",
  "headers",
  "static-libs",
  "static-bins",
  "pkg-configs",
  "frameworks",
  "build-args",
];

const STRING_FIELDS: &[&str] = &["type", "artifact", "lang", "build-system"];

pub const BUILD_SYSTEMS: &[&str] = &["cmake", "autoconf", "make", "none"];

const EXTENSION_BOOL_FIELDS: &[&str] = &["zend-extension", "build-shared", "build-static", "build-with-php", "notes"];

/// Validate `value` as the declaration of package `name` and build its
/// [`PackageDef`].
///
/// # Errors
///
/// Returns `ConfigError::Invalid` naming the package, its origin and the
/// first problem found.
pub fn parse_package(origin: &str, name: &str, value: &Value) -> Result<PackageDef, ConfigError> {
  let invalid = |message: String| ConfigError::Invalid {
    origin: origin.to_string(),
    package: name.to_string(),
    message,
  };

  let Value::Object(entry) = value else {
    return Err(invalid("declaration is not an object".into()));
  };

  let kind = match entry.get("type") {
    Some(Value::String(t)) => t.parse::<PackageKind>().map_err(invalid)?,
    Some(_) => return Err(invalid("[type] must be a string".into())),
    None => return Err(invalid("missing [type] field".into())),
  };

  for (key, field_value) in entry {
    let (base, suffix) = split_field_key(key);
    if !KNOWN_FIELDS.contains(&base) {
      return Err(invalid(format!("unknown field [{}]", key)));
    }
    if let Some(suffix) = suffix {
      if !PLATFORM_SUFFIXES.contains(&suffix) {
        return Err(invalid(format!("malformed platform suffix in [{}]", key)));
      }
      if !SUFFIX_ALLOWED_FIELDS.contains(&base) {
        return Err(invalid(format!("field [{}] does not accept a platform suffix", base)));
      }
    }
    check_field_type(base, key, field_value).map_err(invalid)?;
  }

  let artifact = entry.get("artifact").and_then(Value::as_str).map(str::to_string);
  if kind.is_buildable() && artifact.is_none() {
    return Err(invalid(format!("packages of type '{}' must have an [artifact] field", kind)));
  }

  let license = match entry.get("license") {
    Some(v) => parse_license(v).map_err(invalid)?,
    None => Vec::new(),
  };

  let php_extension = match entry.get("php-extension") {
    Some(_) if kind != PackageKind::PhpExtension => {
      return Err(invalid("[php-extension] block is only allowed on php-extension packages".into()));
    }
    Some(Value::Object(block)) => Some(parse_php_extension(block).map_err(invalid)?),
    Some(_) => return Err(invalid("[php-extension] must be an object".into())),
    None => None,
  };

  let fields = entry
    .iter()
    .filter(|(k, _)| !matches!(k.as_str(), "type" | "license" | "php-extension"))
    .map(|(k, v)| (k.clone(), v.clone()))
    .collect();

  Ok(PackageDef {
    name: name.to_string(),
    kind,
    artifact,
    license,
    php_extension,
    fields,
  })
}

fn check_field_type(base: &str, key: &str, value: &Value) -> Result<(), String> {
  if LIST_FIELDS.contains(&base) {
    let ok = matches!(value, Value::Array(items) if items.iter().all(Value::is_string));
    if !ok {
      return Err(format!("[{}] must be a list of strings", key));
    }
  } else if STRING_FIELDS.contains(&base) {
    let Some(s) = value.as_str() else {
      return Err(format!("[{}] must be a string", key));
    };
    if base == "build-system" && !BUILD_SYSTEMS.contains(&s) {
      return Err(format!(
        "[{}] must be one of {}, got '{}'",
        key,
        BUILD_SYSTEMS.join(", "),
        s
      ));
    }
  }
  Ok(())
}

fn parse_license(value: &Value) -> Result<Vec<License>, String> {
  let items: Vec<&Value> = match value {
    Value::Array(items) => items.iter().collect(),
    Value::Object(_) => vec![value],
    _ => return Err("[license] must be an object or a list of objects".into()),
  };
  items
    .into_iter()
    .map(|item| serde_json::from_value::<License>(item.clone()).map_err(|e| format!("invalid [license]: {}", e)))
    .collect()
}

fn parse_php_extension(block: &Map<String, Value>) -> Result<PhpExtension, String> {
  let mut ext = PhpExtension::default();
  for (key, value) in block {
    let (base, suffix) = split_field_key(key);
    if suffix.is_some() && base != "arg-type" {
      return Err(format!("php-extension field [{}] does not accept a platform suffix", base));
    }
    if let Some(suffix) = suffix
      && !PLATFORM_SUFFIXES.contains(&suffix)
    {
      return Err(format!("malformed platform suffix in php-extension field [{}]", key));
    }

    match base {
      "arg-type" => {
        let s = value
          .as_str()
          .ok_or_else(|| format!("php-extension [{}] must be a string", key))?;
        ext.arg_type.insert(suffix.unwrap_or("").to_string(), s.to_string());
      }
      "support" => ext.support = parse_support(value)?,
      b if EXTENSION_BOOL_FIELDS.contains(&b) => {
        let flag = value
          .as_bool()
          .ok_or_else(|| format!("php-extension [{}] must be a boolean", key))?;
        match b {
          "zend-extension" => ext.zend_extension = flag,
          "build-shared" => ext.build_shared = flag,
          "build-static" => ext.build_static = flag,
          "build-with-php" => ext.build_with_php = flag,
          _ => ext.notes = flag,
        }
      }
      other => return Err(format!("unknown php-extension field [{}]", other)),
    }
  }
  Ok(ext)
}

fn parse_support(value: &Value) -> Result<BTreeMap<String, String>, String> {
  let Value::Object(map) = value else {
    return Err("php-extension [support] must be an object".into());
  };
  map
    .iter()
    .map(|(os, note)| {
      note
        .as_str()
        .map(|n| (os.clone(), n.to_string()))
        .ok_or_else(|| format!("php-extension [support.{}] must be a string", os))
    })
    .collect()
}
