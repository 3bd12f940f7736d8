/// Marker written into a source tree once its patch callbacks have applied.
pub const PATCH_MARKER: &str = ".spc-patched";

/// Provenance file kept at the root of the build root.
pub const TRACKER_FILE: &str = ".spc-tracker.json";

/// Package configuration file names.
pub const CONFIG_FILE: &str = "pkg.json";
pub const CONFIG_FILE_PREFIX: &str = "pkg.";
pub const CONFIG_FILE_SUFFIX: &str = ".json";

/// Name of the stage every buildable package runs.
pub const BUILD_STAGE: &str = "build";

pub const ENV_WORKING_DIR: &str = "SPC_WORKING_DIR";
pub const ENV_BUILD_ROOT: &str = "SPC_BUILD_ROOT";
pub const ENV_SOURCE_ROOT: &str = "SPC_SOURCE_ROOT";
pub const ENV_DOWNLOAD_ROOT: &str = "SPC_DOWNLOAD_ROOT";
pub const ENV_LOG_ROOT: &str = "SPC_LOG_ROOT";
pub const ENV_CONCURRENCY: &str = "SPC_CONCURRENCY";
pub const ENV_TARGET: &str = "SPC_TARGET";
