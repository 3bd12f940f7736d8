use super::{BuildStrategy, BuildSystem, quote};
use crate::platform::{BuildPaths, OsFamily};

/// cmake and nmake builds for Windows targets.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsBuild;

impl BuildStrategy for WindowsBuild {
  fn family(&self) -> OsFamily {
    OsFamily::Windows
  }

  fn supports(&self, system: BuildSystem) -> bool {
    matches!(system, BuildSystem::CMake | BuildSystem::Make)
  }

  fn plan(&self, system: BuildSystem, args: &[String], paths: &BuildPaths, jobs: usize) -> Vec<String> {
    let root = quote(&paths.build_root.display().to_string(), OsFamily::Windows);
    let extra: String = args.iter().map(|a| format!(" {}", quote(a, OsFamily::Windows))).collect();
    match system {
      BuildSystem::CMake => vec![
        format!(
          "cmake -S . -B build -DCMAKE_INSTALL_PREFIX={} -DCMAKE_BUILD_TYPE=Release -DBUILD_SHARED_LIBS=OFF -DCMAKE_MSVC_RUNTIME_LIBRARY=MultiThreaded{}",
          root, extra
        ),
        format!("cmake --build build --config Release -j {}", jobs),
        "cmake --install build --config Release".to_string(),
      ],
      BuildSystem::Make => vec![
        format!("nmake /nologo PREFIX={}{}", root, extra),
        format!("nmake /nologo install PREFIX={}{}", root, extra),
      ],
      BuildSystem::Autoconf | BuildSystem::None => Vec::new(),
    }
  }
}
