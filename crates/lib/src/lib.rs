//! spc-lib: package resolution and staged build orchestration for static PHP
//!
//! This crate provides the pieces a static PHP build is driven by:
//! - `PackageConfig`: the declared packages, loaded from `pkg.json` files
//! - `DependencyResolver`: ordered closure of the requested packages
//! - `Registry`: stages, OS build entry points, hooks and package callbacks
//! - `PackageInstaller`: walks the resolved set and builds what is missing

pub mod artifact;
pub mod config;
pub mod consts;
pub mod install;
pub mod package;
pub mod platform;
pub mod recipe;
pub mod registry;
pub mod resolve;
pub mod shell;
pub mod stage;
pub mod util;
