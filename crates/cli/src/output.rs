//! CLI output formatting utilities.
//!
//! Colored status lines, per-package report rows and exit codes.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use owo_colors::{OwoColorize, Stream};

use spc_lib::config::ConfigError;
use spc_lib::install::{ErrorKind, InstallError};
use spc_lib::package::BuildStatus;
use spc_lib::registry::RegistryError;
use spc_lib::resolve::ResolveError;

use crate::cmd::UsageError;

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
  pub const SKIP: &str = "=";
}

/// Whole seconds are enough for build times.
pub fn format_elapsed(duration: Duration) -> String {
  if duration.as_secs() == 0 {
    return format!("{}ms", duration.subsec_millis());
  }
  humantime::format_duration(Duration::from_secs(duration.as_secs())).to_string()
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

/// One line of a run report.
pub fn print_status(name: &str, status: BuildStatus) {
  let symbol = match status {
    BuildStatus::Built | BuildStatus::Installed => symbols::SUCCESS,
    BuildStatus::AlreadySatisfied | BuildStatus::Included => symbols::SKIP,
    BuildStatus::Failed => symbols::ERROR,
    BuildStatus::Unresolved | BuildStatus::Resolving => symbols::INFO,
  };
  let symbol = match status {
    BuildStatus::Failed => symbol.if_supports_color(Stream::Stdout, |s| s.red()).to_string(),
    s if s.is_success() => symbol.if_supports_color(Stream::Stdout, |s| s.green()).to_string(),
    _ => symbol.if_supports_color(Stream::Stdout, |s| s.dimmed()).to_string(),
  };
  println!(
    "  {} {} {}",
    symbol,
    name,
    format!("({})", status).if_supports_color(Stream::Stdout, |s| s.dimmed())
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

/// Classify a top-level error for the exit code.
pub fn error_kind(err: &anyhow::Error) -> ErrorKind {
  if err.downcast_ref::<UsageError>().is_some() {
    return ErrorKind::Usage;
  }
  if let Some(e) = err.downcast_ref::<InstallError>() {
    return e.kind();
  }
  if let Some(e) = err.downcast_ref::<ResolveError>() {
    return if e.is_usage() { ErrorKind::Usage } else { ErrorKind::Configuration };
  }
  if err.downcast_ref::<ConfigError>().is_some() || err.downcast_ref::<RegistryError>().is_some() {
    return ErrorKind::Configuration;
  }
  if err.downcast_ref::<std::io::Error>().is_some() {
    return ErrorKind::Filesystem;
  }
  ErrorKind::Build
}

pub fn exit_code(kind: ErrorKind) -> ExitCode {
  ExitCode::from(match kind {
    ErrorKind::Build => 1,
    ErrorKind::Usage => 2,
    ErrorKind::Configuration => 3,
    ErrorKind::Filesystem => 4,
  })
}
