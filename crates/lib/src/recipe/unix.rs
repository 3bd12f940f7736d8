use super::{BuildStrategy, BuildSystem, quote};
use crate::platform::{BuildPaths, OsFamily};

/// configure/make and cmake builds into the shared build root, shared by
/// Linux, macOS and FreeBSD.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixBuild;

impl BuildStrategy for UnixBuild {
  fn family(&self) -> OsFamily {
    OsFamily::Unix
  }

  fn supports(&self, system: BuildSystem) -> bool {
    system != BuildSystem::None
  }

  fn env(&self, paths: &BuildPaths) -> Vec<(String, String)> {
    vec![
      ("PKG_CONFIG_PATH".into(), paths.pkgconfig_dir().display().to_string()),
      ("CPPFLAGS".into(), format!("-I{}", paths.include_dir().display())),
      ("LDFLAGS".into(), format!("-L{}", paths.lib_dir().display())),
    ]
  }

  fn plan(&self, system: BuildSystem, args: &[String], paths: &BuildPaths, jobs: usize) -> Vec<String> {
    let root = quote(&paths.build_root.display().to_string(), OsFamily::Unix);
    let extra: String = args.iter().map(|a| format!(" {}", quote(a, OsFamily::Unix))).collect();
    match system {
      BuildSystem::Autoconf => vec![
        "test -x ./configure || ./autogen.sh".to_string(),
        format!("./configure --prefix={} --enable-static --disable-shared{}", root, extra),
        format!("make -j{}", jobs),
        "make install".to_string(),
      ],
      BuildSystem::CMake => vec![
        format!(
          "cmake -S . -B build -DCMAKE_INSTALL_PREFIX={} -DCMAKE_INSTALL_LIBDIR=lib -DCMAKE_BUILD_TYPE=Release -DBUILD_SHARED_LIBS=OFF{}",
          root, extra
        ),
        format!("cmake --build build -j {}", jobs),
        "cmake --install build".to_string(),
      ],
      BuildSystem::Make => vec![
        format!("make -j{} PREFIX={}{}", jobs, root, extra),
        format!("make install PREFIX={}{}", root, extra),
      ],
      BuildSystem::None => Vec::new(),
    }
  }
}
