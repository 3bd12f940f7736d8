//! Loading configuration directories and resolving platform fields.

use spc_lib::config::{ConfigError, PackageConfig};
use spc_lib::package::PackageKind;
use spc_lib::platform::Os;

use super::common::{TestEnv, config};

#[test]
fn directory_merges_split_files_then_main() {
  let env = TestEnv::new();
  env.write(
    "config/pkg.lib.json",
    r#"{"zlib": {"type": "library", "artifact": "zlib"}, "bzip2": {"type": "library", "artifact": "bzip2"}}"#,
  );
  env.write("config/pkg.ext.json", r#"{"ext-zlib": {"type": "php-extension", "depends": ["zlib"]}}"#);
  env.write(
    "config/pkg.json",
    r#"{"zlib": {"type": "library", "artifact": "zlib-ng", "static-libs": ["libz.a"]}}"#,
  );
  env.write("config/other.json", "not even json");

  let config = PackageConfig::load_dir(&env.temp.path().join("config")).unwrap();
  assert_eq!(config.names().collect::<Vec<_>>(), ["ext-zlib", "bzip2", "zlib"]);
  assert_eq!(config.get("zlib").unwrap().artifact.as_deref(), Some("zlib-ng"));
  assert_eq!(config.get("ext-zlib").unwrap().kind, PackageKind::PhpExtension);
}

#[test]
fn empty_directory_is_not_found() {
  let env = TestEnv::new();
  std::fs::create_dir_all(env.temp.path().join("config")).unwrap();
  let err = PackageConfig::load_dir(&env.temp.path().join("config")).unwrap_err();
  assert!(matches!(err, ConfigError::NotFound(_)));
}

#[test]
fn invalid_entry_names_file_and_package() {
  let env = TestEnv::new();
  env.write("config/pkg.json", r#"{"zlib": {"type": "library", "artifact": "zlib", "static-lib": []}}"#);
  let err = PackageConfig::load_dir(&env.temp.path().join("config")).unwrap_err();
  let message = err.to_string();
  assert!(message.contains("pkg.json"), "{}", message);
  assert!(message.contains("[zlib]"), "{}", message);
  assert!(message.contains("static-lib"), "{}", message);
}

#[test]
fn platform_fields_fall_back_along_the_chain() {
  let config = config(
    r#"{
      "curl": {
        "type": "library",
        "artifact": "curl",
        "static-libs": ["plain.a"],
        "static-libs@linux": ["linux.a"],
        "static-libs@unix": ["unix.a"]
      }
    }"#,
  );
  let curl = config.get("curl").unwrap();
  assert_eq!(curl.list("static-libs", Os::Linux), ["linux.a"]);
  assert_eq!(curl.list("static-libs", Os::MacOs), ["unix.a"]);
  assert_eq!(curl.list("static-libs", Os::FreeBsd), ["unix.a"]);
  assert_eq!(curl.list("static-libs", Os::Windows), ["plain.a"]);
  assert!(curl.list("headers", Os::Linux).is_empty());
}

#[test]
fn bsd_suffix_sits_between_freebsd_and_unix() {
  let config = config(
    r#"{
      "libiconv": {
        "type": "library",
        "artifact": "libiconv",
        "depends@unix": ["a"],
        "depends@bsd": ["b"]
      },
      "a": {"type": "library", "artifact": "a"},
      "b": {"type": "library", "artifact": "b"}
    }"#,
  );
  let iconv = config.get("libiconv").unwrap();
  assert_eq!(iconv.depends(Os::FreeBsd), ["b"]);
  assert_eq!(iconv.depends(Os::MacOs), ["a"]);
  assert!(iconv.depends(Os::Windows).is_empty());
  assert!(config.check_references(Os::FreeBsd).is_ok());
}
