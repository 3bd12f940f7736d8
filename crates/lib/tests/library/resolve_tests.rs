//! Resolution through the public API.

use spc_lib::platform::Os;
use spc_lib::registry::{Registry, RegistryError};
use spc_lib::resolve::{DependencyResolver, ResolveError, ResolvedSet};

use super::common::{config, names};

const EXTENSIONS: &str = r#"{
  "ext-a": {"type": "php-extension", "depends": ["libaaa"], "suggests": ["ext-b"]},
  "ext-b": {"type": "php-extension", "depends": ["libeee"]},
  "libaaa": {"type": "library", "artifact": "aaa", "depends": ["libbbb", "libccc"]},
  "libbbb": {"type": "library", "artifact": "bbb", "suggests": ["libccc"]},
  "libccc": {"type": "library", "artifact": "ccc"},
  "libeee": {"type": "library", "artifact": "eee"}
}"#;

fn resolve(json: &str, os: Os, requested: &[&str], suggests: bool) -> Result<ResolvedSet, ResolveError> {
  let config = config(json);
  DependencyResolver::new(&config, os).resolve(&names(requested), &[], suggests)
}

fn before(set: &ResolvedSet, first: &str, second: &str) -> bool {
  set.position(first).unwrap() < set.position(second).unwrap()
}

mod scenarios {
  use super::*;

  #[test]
  fn chain_resolves_leaf_first() {
    let set = resolve(
      r#"{
        "A": {"type": "library", "artifact": "a", "depends": ["B"]},
        "B": {"type": "library", "artifact": "b", "depends": ["C"]},
        "C": {"type": "library", "artifact": "c"}
      }"#,
      Os::Linux,
      &["A"],
      false,
    )
    .unwrap();
    assert_eq!(set.as_slice(), ["C", "B", "A"]);
  }

  #[test]
  fn extension_pulls_library_closure() {
    let set = resolve(EXTENSIONS, Os::Linux, &["ext-a"], false).unwrap();
    for pkg in ["libbbb", "libccc", "libaaa", "ext-a"] {
      assert!(set.contains(pkg), "{} missing from {:?}", pkg, set.as_slice());
    }
    assert!(before(&set, "libbbb", "libaaa"));
    assert!(before(&set, "libccc", "libaaa"));
    // libbbb suggests libccc, which is in the set anyway
    assert!(before(&set, "libccc", "libbbb"));
    assert!(!set.contains("ext-b"));
  }

  #[test]
  fn suggestions_follow_their_required_closure() {
    let with = resolve(EXTENSIONS, Os::Linux, &["ext-a"], true).unwrap();
    assert!(with.contains("ext-b"));
    assert!(with.contains("libeee"));
    assert!(before(&with, "libeee", "ext-b"));
    assert!(with.is_suggested("ext-b"));
    assert!(!with.is_suggested("libaaa"));

    let without = resolve(EXTENSIONS, Os::Linux, &["ext-a"], false).unwrap();
    assert!(!without.contains("ext-b"));
    assert!(!without.contains("libeee"));
  }
}

mod properties {
  use super::*;

  const WIDE: &str = r#"{
    "php": {"type": "target", "artifact": "php-src", "depends": ["ext-curl", "ext-zlib", "ext-openssl"]},
    "ext-curl": {"type": "php-extension", "depends": ["curl"]},
    "ext-zlib": {"type": "php-extension", "depends": ["zlib"]},
    "ext-openssl": {"type": "php-extension", "depends": ["openssl", "zlib"]},
    "curl": {"type": "library", "artifact": "curl", "depends": ["openssl", "zlib"], "depends@windows": ["zlib"]},
    "openssl": {"type": "library", "artifact": "openssl", "depends": ["zlib"]},
    "zlib": {"type": "library", "artifact": "zlib"}
  }"#;

  #[test]
  fn closure_is_complete_and_ordered() {
    let config = config(WIDE);
    for os in Os::ALL {
      let resolver = DependencyResolver::new(&config, os);
      let set = resolver.resolve(&names(&["php"]), &[], true).unwrap();
      for pkg in set.iter() {
        for dep in resolver.required(pkg) {
          assert!(set.contains(&dep), "{} requires {} on {}", pkg, dep, os);
          assert!(before(&set, &dep, pkg), "{} must precede {} on {}", dep, pkg, os);
        }
      }
    }
  }

  #[test]
  fn resolution_is_deterministic() {
    let config = config(WIDE);
    let resolver = DependencyResolver::new(&config, Os::Linux);
    let first = resolver.resolve(&names(&["php"]), &[], false).unwrap();
    let second = resolver.resolve(&names(&["php"]), &[], false).unwrap();
    assert_eq!(first.as_slice(), second.as_slice());
    assert_eq!(
      first.as_slice(),
      ["zlib", "openssl", "curl", "ext-curl", "ext-zlib", "ext-openssl", "php"]
    );
  }

  #[test]
  fn platform_edges_change_the_set() {
    let windows = resolve(WIDE, Os::Windows, &["curl"], false).unwrap();
    assert_eq!(windows.as_slice(), ["zlib", "curl"]);
    let macos = resolve(WIDE, Os::MacOs, &["curl"], false).unwrap();
    assert_eq!(macos.as_slice(), ["zlib", "openssl", "curl"]);
  }

  #[test]
  fn suggestion_against_required_path_keeps_dag_resolvable() {
    let json = r#"{
      "top": {"type": "virtual-target", "depends": ["a", "c"]},
      "a": {"type": "virtual-target", "depends": ["b"]},
      "b": {"type": "virtual-target", "suggests": ["c"]},
      "c": {"type": "virtual-target", "depends": ["a"]}
    }"#;
    let mut registry = Registry::new(config(json), Os::Linux);
    registry.validate().unwrap();

    for suggests in [false, true] {
      let set = resolve(json, Os::Linux, &["top"], suggests).unwrap();
      assert_eq!(set.as_slice(), ["b", "a", "c", "top"]);
    }
  }

  #[test]
  fn dependents_explain_membership() {
    let config = config(WIDE);
    let resolver = DependencyResolver::new(&config, Os::Linux);
    let set = resolver.resolve(&names(&["php"]), &[], false).unwrap();
    let why = resolver.dependents(&set);
    assert_eq!(why["openssl"], vec!["curl", "ext-openssl"]);
    assert!(why["php"].is_empty());
  }
}

mod failures {
  use super::*;

  const DANGLING: &str = r#"{
    "app": {"type": "target", "artifact": "app", "depends": ["libgone"]}
  }"#;

  #[test]
  fn unknown_request_is_usage_error() {
    let err = resolve(EXTENSIONS, Os::Linux, &["ext-zzz"], false).unwrap_err();
    assert_eq!(err, ResolveError::UnknownPackage("ext-zzz".into()));
    assert!(err.is_usage());
  }

  #[test]
  fn dangling_dependency_is_configuration_error() {
    let err = resolve(DANGLING, Os::Linux, &["app"], false).unwrap_err();
    assert!(matches!(err, ResolveError::MissingDependency { ref dependency, .. } if dependency == "libgone"));
    assert!(!err.is_usage());
  }

  #[test]
  fn dangling_dependency_fails_registry_validation() {
    let mut registry = Registry::new(config(DANGLING), Os::Linux);
    registry.build_for("app", &Os::ALL, |_| panic!("must not run")).unwrap();
    let err = registry.validate().unwrap_err();
    assert!(matches!(err, RegistryError::Config(_)));
    assert!(err.to_string().contains("libgone"));
  }

  #[test]
  fn required_cycle_names_its_path() {
    let json = r#"{
      "x": {"type": "library", "artifact": "x", "depends": ["y"]},
      "y": {"type": "library", "artifact": "y", "depends@unix": ["x"]}
    }"#;
    let err = resolve(json, Os::Linux, &["x"], false).unwrap_err();
    assert_eq!(err, ResolveError::Cycle { path: names(&["x", "y", "x"]) });
    // the back edge only exists on unix
    assert!(resolve(json, Os::Windows, &["x"], false).is_ok());

    let mut registry = Registry::new(config(json), Os::Linux);
    assert!(matches!(registry.validate(), Err(RegistryError::Cycle { .. })));
  }
}
