//! Target platform model and on-disk layout.

pub mod os;
pub mod paths;

pub use os::{Os, OsFamily};
pub use paths::{BuildPaths, concurrency, target_os};
