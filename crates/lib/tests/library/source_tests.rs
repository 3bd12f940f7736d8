//! Source extraction, patching and license installation.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use spc_lib::artifact::LocalArtifacts;
use spc_lib::consts::PATCH_MARKER;
use spc_lib::install::{ErrorKind, InstallOptions, PackageInstaller};
use spc_lib::package::BuildStatus;
use spc_lib::platform::Os;
use spc_lib::registry::Registry;
use spc_lib::stage::StageError;

use super::common::{TestEnv, config, write_tarball};

const ZLIB: &str = r#"{
  "zlib": {
    "type": "library",
    "artifact": "zlib",
    "static-libs": ["libz.a"],
    "headers": ["zlib.h"],
    "license": [{"type": "file", "path": "LICENSE"}, {"type": "text", "text": "zlib notice"}]
  }
}"#;

fn zlib_archive(env: &TestEnv) {
  write_tarball(
    &env.downloads().join("zlib-1.3.1.tar.gz"),
    &[
      ("zlib-1.3.1/LICENSE", "zlib license text"),
      ("zlib-1.3.1/zlib.h", "#define ZLIB_VERSION \"1.3.1\"\n"),
      ("zlib-1.3.1/libz.a", "archive"),
    ],
  );
}

/// Copies the prebuilt files of the fixture archive into the build root.
fn install_from_source(ctx: &spc_lib::stage::StageContext<'_>) -> Result<(), StageError> {
  let source = ctx.source_dir();
  for (file, dir) in [("libz.a", ctx.paths.lib_dir()), ("zlib.h", ctx.paths.include_dir())] {
    let to = dir.join(file);
    std::fs::copy(source.join(file), &to).map_err(|e| StageError::io(&to, e))?;
  }
  Ok(())
}

#[test]
fn extracts_patches_and_installs_licenses() {
  let env = TestEnv::new();
  zlib_archive(&env);
  let patches = Arc::new(AtomicUsize::new(0));

  let mut registry = Registry::new(config(ZLIB), Os::Linux);
  registry.build_for("zlib", &Os::ALL, install_from_source).unwrap();
  let counter = Arc::clone(&patches);
  registry.on_patch("zlib", move |ctx| {
    counter.fetch_add(1, Ordering::SeqCst);
    let header = ctx.source_dir().join("zlib.h");
    let text = std::fs::read_to_string(&header).map_err(|e| StageError::io(&header, e))?;
    std::fs::write(&header, format!("{}#define Z_PATCHED 1\n", text)).map_err(|e| StageError::io(&header, e))?;
    Ok(true)
  });
  registry.validate().unwrap();
  let provider = LocalArtifacts::new(env.downloads());

  let mut installer = PackageInstaller::new(&registry, &provider, env.paths.clone(), InstallOptions::default()).unwrap();
  installer.add_build_package("zlib").unwrap();
  let report = installer.run().unwrap();
  assert_eq!(report.status("zlib"), Some(BuildStatus::Built));

  let source = env.paths.source_dir("zlib");
  assert!(source.join(PATCH_MARKER).is_file());
  let header = std::fs::read_to_string(env.paths.include_dir().join("zlib.h")).unwrap();
  assert!(header.contains("Z_PATCHED"));

  let licenses = env.paths.license_dir("zlib");
  assert_eq!(std::fs::read_to_string(licenses.join("0.txt")).unwrap(), "zlib license text");
  assert_eq!(std::fs::read_to_string(licenses.join("1.txt")).unwrap(), "zlib notice");

  // rebuilding the same tree does not patch twice
  let options = InstallOptions {
    force_rebuild: true,
    ..Default::default()
  };
  let mut installer = PackageInstaller::new(&registry, &provider, env.paths.clone(), options).unwrap();
  installer.add_build_package("zlib").unwrap();
  installer.run().unwrap();
  assert_eq!(patches.load(Ordering::SeqCst), 1);
  let header = std::fs::read_to_string(source.join("zlib.h")).unwrap();
  assert_eq!(header.matches("Z_PATCHED").count(), 1);
}

#[test]
fn force_source_re_extracts_and_patches_again() {
  let env = TestEnv::new();
  zlib_archive(&env);
  let patches = Arc::new(AtomicUsize::new(0));

  let mut registry = Registry::new(config(ZLIB), Os::Linux);
  registry.build_for("zlib", &Os::ALL, install_from_source).unwrap();
  let counter = Arc::clone(&patches);
  registry.on_patch("zlib", move |_| {
    counter.fetch_add(1, Ordering::SeqCst);
    Ok(true)
  });
  registry.validate().unwrap();
  let provider = LocalArtifacts::new(env.downloads());

  for force in [false, true] {
    let options = InstallOptions {
      force_rebuild: force,
      force_source: force,
      ..Default::default()
    };
    let mut installer = PackageInstaller::new(&registry, &provider, env.paths.clone(), options).unwrap();
    installer.add_build_package("zlib").unwrap();
    installer.run().unwrap();
  }
  assert_eq!(patches.load(Ordering::SeqCst), 2);
}

#[test]
fn guarded_patch_only_applies_with_its_owner() {
  let json = r#"{
    "zlib": {"type": "library", "artifact": "zlib", "static-libs": ["libz.a"], "headers": ["zlib.h"]},
    "ext-zlib": {"type": "php-extension", "depends": ["zlib"]}
  }"#;
  let env = TestEnv::new();
  zlib_archive(&env);
  let patches = Arc::new(AtomicUsize::new(0));

  let mut registry = Registry::new(config(json), Os::Linux);
  registry.build_for("zlib", &Os::ALL, install_from_source).unwrap();
  let counter = Arc::clone(&patches);
  registry.on_patch_from(Some("ext-zlib"), "zlib", move |_| {
    counter.fetch_add(1, Ordering::SeqCst);
    Ok(true)
  });
  registry.validate().unwrap();
  let provider = LocalArtifacts::new(env.downloads());

  let mut installer = PackageInstaller::new(&registry, &provider, env.paths.clone(), InstallOptions::default()).unwrap();
  installer.add_build_package("zlib").unwrap();
  installer.run().unwrap();
  assert_eq!(patches.load(Ordering::SeqCst), 0);
  assert!(!env.paths.source_dir("zlib").join(PATCH_MARKER).exists());
}

#[test]
fn missing_artifact_is_filesystem_error() {
  let env = TestEnv::new();
  let mut registry = Registry::new(config(ZLIB), Os::Linux);
  registry.build_for("zlib", &Os::ALL, install_from_source).unwrap();
  registry.validate().unwrap();
  let provider = LocalArtifacts::new(env.downloads());

  let mut installer = PackageInstaller::new(&registry, &provider, env.paths.clone(), InstallOptions::default()).unwrap();
  installer.add_build_package("zlib").unwrap();
  let err = installer.run().unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Filesystem);
  assert!(err.to_string().contains("zlib"));
}

#[cfg(unix)]
#[test]
fn stages_run_in_the_source_tree() {
  let env = TestEnv::new();
  zlib_archive(&env);
  let mut registry = Registry::new(config(ZLIB), Os::Linux);
  registry
    .build_for("zlib", &Os::ALL, |ctx| {
      let shell = ctx.shell();
      shell.exec("cp libz.a \"$BUILD_ROOT_PATH/lib/\"")?;
      shell.exec("cp zlib.h \"$BUILD_ROOT_PATH/include/\"")?;
      Ok(())
    })
    .unwrap();
  registry.validate().unwrap();
  let provider = LocalArtifacts::new(env.downloads());

  let mut installer = PackageInstaller::new(&registry, &provider, env.paths.clone(), InstallOptions::default()).unwrap();
  installer.add_build_package("zlib").unwrap();
  installer.run().unwrap();
  assert!(env.paths.lib_dir().join("libz.a").is_file());
  let log = std::fs::read_to_string(env.paths.package_log("zlib")).unwrap();
  assert!(log.contains("$ cp libz.a"));
}
