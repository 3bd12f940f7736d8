//! Installer runs: ordering, idempotence, failures, binaries.

use spc_lib::artifact::LocalArtifacts;
use spc_lib::consts::TRACKER_FILE;
use spc_lib::install::{BuildRootTracker, ErrorKind, InstallError, InstallOptions, PackageInstaller};
use spc_lib::package::BuildStatus;
use spc_lib::platform::Os;
use spc_lib::registry::Registry;

use super::common::{TestEnv, build_outputs, call_log, calls, config, record, tree, write_tarball};

const CHAIN: &str = r#"{
  "A": {"type": "target", "artifact": "a", "depends": ["B"], "static-bins": ["a"]},
  "B": {"type": "library", "artifact": "b", "depends": ["C"], "static-libs": ["libb.a"]},
  "C": {"type": "library", "artifact": "c", "static-libs": ["libc.a"], "headers": ["c/c.h"]}
}"#;

fn chain_registry(log: &super::common::CallLog) -> Registry {
  let mut registry = Registry::new(config(CHAIN), Os::Linux);
  for name in ["A", "B", "C"] {
    registry.build_for(name, &Os::ALL, build_outputs(log, name)).unwrap();
  }
  registry.validate().unwrap();
  registry
}

#[test]
fn satisfied_leaf_is_skipped() {
  let env = TestEnv::new().with_sources(&["a", "b", "c"]);
  std::fs::write(env.paths.lib_dir().join("libc.a"), "").unwrap();
  std::fs::create_dir_all(env.paths.include_dir().join("c")).unwrap();
  std::fs::write(env.paths.include_dir().join("c/c.h"), "").unwrap();

  let log = call_log();
  let registry = chain_registry(&log);
  let provider = LocalArtifacts::new(env.downloads());
  let mut installer = PackageInstaller::new(&registry, &provider, env.paths.clone(), InstallOptions::default()).unwrap();
  installer.add_build_package("A").unwrap();
  let report = installer.run().unwrap();

  assert_eq!(installer.resolved().as_slice(), ["C", "B", "A"]);
  assert_eq!(calls(&log), ["B", "A"]);
  assert_eq!(report.status("C"), Some(BuildStatus::AlreadySatisfied));
  assert_eq!(report.with_status(BuildStatus::Built), ["B", "A"]);
  assert!(report.is_success());
}

#[test]
fn second_run_changes_nothing() {
  let env = TestEnv::new().with_sources(&["a", "b", "c"]);
  let log = call_log();
  let registry = chain_registry(&log);
  let provider = LocalArtifacts::new(env.downloads());

  let mut first = PackageInstaller::new(&registry, &provider, env.paths.clone(), InstallOptions::default()).unwrap();
  first.add_build_package("A").unwrap();
  first.run().unwrap();
  assert_eq!(calls(&log), ["C", "B", "A"]);
  let before = tree(env.temp.path());

  let mut second = PackageInstaller::new(&registry, &provider, env.paths.clone(), InstallOptions::default()).unwrap();
  second.add_build_package("A").unwrap();
  let report = second.run().unwrap();
  assert_eq!(report.count(BuildStatus::AlreadySatisfied), 3);
  assert_eq!(calls(&log).len(), 3);
  assert_eq!(tree(env.temp.path()), before);
}

#[test]
fn force_rebuild_runs_every_stage() {
  let env = TestEnv::new().with_sources(&["a", "b", "c"]);
  let log = call_log();
  let registry = chain_registry(&log);
  let provider = LocalArtifacts::new(env.downloads());
  for force_rebuild in [false, true] {
    let options = InstallOptions {
      force_rebuild,
      ..Default::default()
    };
    let mut installer = PackageInstaller::new(&registry, &provider, env.paths.clone(), options).unwrap();
    installer.add_build_package("A").unwrap();
    installer.run().unwrap();
  }
  assert_eq!(calls(&log), ["C", "B", "A", "C", "B", "A"]);
}

#[test]
fn tracker_attributes_outputs() {
  let env = TestEnv::new().with_sources(&["a", "b", "c"]);
  let log = call_log();
  let registry = chain_registry(&log);
  let provider = LocalArtifacts::new(env.downloads());
  let mut installer = PackageInstaller::new(&registry, &provider, env.paths.clone(), InstallOptions::default()).unwrap();
  installer.add_build_package("A").unwrap();
  installer.run().unwrap();

  assert!(env.paths.build_root.join(TRACKER_FILE).is_file());
  let tracker = BuildRootTracker::load(&env.paths.build_root);
  assert_eq!(tracker.owner_of("include/c/c.h"), Some("C"));
  assert_eq!(tracker.owner_of("lib/libb.a"), Some("B"));
  assert_eq!(tracker.owner_of("bin/a"), Some("A"));
  assert_eq!(tracker.package("C").unwrap().kind, "build");
}

#[cfg(unix)]
#[test]
fn failed_command_keeps_progress_and_log() {
  let env = TestEnv::new().with_sources(&["a", "b", "c"]);
  let log = call_log();
  let mut registry = Registry::new(config(CHAIN), Os::Linux);
  registry.build_for("C", &[Os::Linux], build_outputs(&log, "C")).unwrap();
  registry
    .build_for("B", &[Os::Linux], |ctx| {
      ctx.shell().exec("echo compiling libb && exit 3")?;
      Ok(())
    })
    .unwrap();
  registry.build_for("A", &[Os::Linux], record(&log, "A")).unwrap();
  registry.validate().unwrap();
  let provider = LocalArtifacts::new(env.downloads());

  let mut installer = PackageInstaller::new(&registry, &provider, env.paths.clone(), InstallOptions::default()).unwrap();
  installer.add_build_package("A").unwrap();
  let err = installer.run().unwrap_err();

  assert_eq!(err.kind(), ErrorKind::Build);
  let log_file = err.log_path().unwrap();
  assert_eq!(log_file, env.paths.package_log("B"));
  let captured = std::fs::read_to_string(log_file).unwrap();
  assert!(captured.contains("compiling libb"));
  assert!(err.to_string().contains("see"));

  let report = installer.report();
  assert_eq!(report.status("C"), Some(BuildStatus::Built));
  assert_eq!(report.status("B"), Some(BuildStatus::Failed));
  assert_eq!(report.status("A"), Some(BuildStatus::Unresolved));
  assert!(!report.is_success());
  assert_eq!(calls(&log), ["C"]);
  assert!(env.paths.lib_dir().join("libc.a").exists());
}

#[test]
fn build_request_without_entry_point_is_rejected() {
  let env = TestEnv::new();
  let mut registry = Registry::new(config(CHAIN), Os::Windows);
  registry.build_for("A", &[Os::Linux], |_| Ok(())).unwrap();
  registry.validate().unwrap();
  let provider = LocalArtifacts::new(env.downloads());
  let mut installer = PackageInstaller::new(&registry, &provider, env.paths.clone(), InstallOptions::default()).unwrap();
  let err = installer.add_build_package("A").err().unwrap();
  assert_eq!(err.kind(), ErrorKind::Usage);
  assert!(err.to_string().contains("windows"));
}

#[test]
fn install_prefers_prebuilt_binary() {
  let env = TestEnv::new();
  write_tarball(
    &env.downloads().join("binary").join("c-linux.tar.gz"),
    &[("lib/libc.a", "prebuilt"), ("include/c/c.h", "")],
  );
  let log = call_log();
  let registry = chain_registry(&log);
  let provider = LocalArtifacts::new(env.downloads());

  let mut installer = PackageInstaller::new(&registry, &provider, env.paths.clone(), InstallOptions::default()).unwrap();
  installer.add_install_package("C").unwrap();
  let report = installer.run().unwrap();

  assert_eq!(report.status("C"), Some(BuildStatus::Installed));
  assert!(calls(&log).is_empty());
  assert_eq!(std::fs::read_to_string(env.paths.lib_dir().join("libc.a")).unwrap(), "prebuilt");
  let tracker = BuildRootTracker::load(&env.paths.build_root);
  assert_eq!(tracker.package("C").unwrap().kind, "install");
}

#[test]
fn partial_binary_is_a_filesystem_error() {
  let env = TestEnv::new();
  write_tarball(
    &env.downloads().join("binary").join("c-linux.tar.gz"),
    &[("lib/libc.a", "prebuilt")],
  );
  let log = call_log();
  let registry = chain_registry(&log);
  let provider = LocalArtifacts::new(env.downloads());

  let mut installer = PackageInstaller::new(&registry, &provider, env.paths.clone(), InstallOptions::default()).unwrap();
  installer.add_install_package("C").unwrap();
  let err = installer.run().unwrap_err();

  assert_eq!(err.kind(), ErrorKind::Filesystem);
  assert!(matches!(err, InstallError::MissingOutputs { ref missing, .. } if missing.len() == 1 && missing[0].ends_with("c/c.h")));
  assert!(calls(&log).is_empty());
  assert_eq!(installer.report().status("C"), Some(BuildStatus::Failed));
}

#[test]
fn validation_rejects_before_any_stage() {
  let env = TestEnv::new().with_sources(&["a", "b", "c"]);
  let log = call_log();
  let mut registry = Registry::new(config(CHAIN), Os::Linux);
  for name in ["A", "B", "C"] {
    registry.build_for(name, &[Os::Linux], record(&log, name)).unwrap();
  }
  registry.on_validate("A", |ctx| {
    if ctx.option("sapi") == Some("fpm") && !ctx.in_resolved_set("C") {
      return Err(spc_lib::stage::StageError::Usage("fpm needs C".into()));
    }
    match ctx.option("sapi") {
      Some("cli") | Some("fpm") | None => Ok(()),
      Some(other) => Err(spc_lib::stage::StageError::Usage(format!("unknown sapi {}", other))),
    }
  });
  registry.validate().unwrap();
  let provider = LocalArtifacts::new(env.downloads());

  let mut options = InstallOptions::default();
  options.build_options.insert("sapi".into(), "embed".into());
  let mut installer = PackageInstaller::new(&registry, &provider, env.paths.clone(), options).unwrap();
  installer.add_build_package("A").unwrap();
  let err = installer.run().unwrap_err();
  assert!(matches!(err, InstallError::Validation { ref package, .. } if package == "A"));
  assert!(err.to_string().contains("unknown sapi embed"));
  assert!(calls(&log).is_empty());
}

#[test]
fn resolve_build_callback_adds_dependencies() {
  let env = TestEnv::new().with_sources(&["a", "b", "c"]);
  let json = r#"{
    "A": {"type": "target", "artifact": "a", "static-bins": ["a"]},
    "B": {"type": "library", "artifact": "b", "static-libs": ["libb.a"]},
    "C": {"type": "library", "artifact": "c", "static-libs": ["libc.a"]}
  }"#;
  let log = call_log();
  let mut registry = Registry::new(config(json), Os::Linux);
  for name in ["A", "B", "C"] {
    registry.build_for(name, &[Os::Linux], build_outputs(&log, name)).unwrap();
  }
  registry.on_resolve_build("A", |_, options, _| {
    if options.contains_key("with-c") {
      vec!["C".to_string()]
    } else {
      Vec::new()
    }
  });
  registry.validate().unwrap();
  let provider = LocalArtifacts::new(env.downloads());

  let mut options = InstallOptions::default();
  options.build_options.insert("with-c".into(), String::new());
  let mut installer = PackageInstaller::new(&registry, &provider, env.paths.clone(), options).unwrap();
  installer.add_build_package("A").unwrap();
  installer.run().unwrap();
  assert_eq!(calls(&log), ["C", "A"]);
}
