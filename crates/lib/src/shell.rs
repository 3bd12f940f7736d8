//! Blocking command runner for build stages.
//!
//! Each package gets a [`Shell`] bound to its source directory and its log
//! file. Every command's stdout and stderr are appended to the log so a
//! failed build can point the user at the full tool output.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ShellError {
  /// The command ran and exited non-zero (or was killed).
  #[error("command failed with exit code {code:?}: {cmd}{}", log_hint(.log))]
  Failed {
    cmd: String,
    code: Option<i32>,
    log: Option<PathBuf>,
  },

  /// The command could not be spawned or its log could not be written.
  #[error("failed to run `{cmd}`: {source}")]
  Io {
    cmd: String,
    #[source]
    source: std::io::Error,
  },
}

fn log_hint(log: &Option<PathBuf>) -> String {
  match log {
    Some(path) => format!(" (see {})", path.display()),
    None => String::new(),
  }
}

/// A working directory, extra environment and an optional log file.
#[derive(Debug, Clone)]
pub struct Shell {
  cwd: PathBuf,
  env: BTreeMap<String, String>,
  log: Option<PathBuf>,
}

impl Shell {
  pub fn new(cwd: impl Into<PathBuf>) -> Self {
    Self {
      cwd: cwd.into(),
      env: BTreeMap::new(),
      log: None,
    }
  }

  pub fn with_log(mut self, log: impl Into<PathBuf>) -> Self {
    self.log = Some(log.into());
    self
  }

  pub fn with_env(mut self, key: &str, value: impl Into<String>) -> Self {
    self.env.insert(key.to_string(), value.into());
    self
  }

  /// Same shell, different working directory.
  pub fn cd(&self, dir: impl AsRef<Path>) -> Self {
    let mut next = self.clone();
    next.cwd = self.cwd.join(dir);
    next
  }

  pub fn cwd(&self) -> &Path {
    &self.cwd
  }

  pub fn log_path(&self) -> Option<&Path> {
    self.log.as_deref()
  }

  /// Run `cmd` through the platform shell and wait for it.
  ///
  /// # Returns
  ///
  /// The trimmed stdout of the command.
  ///
  /// # Errors
  ///
  /// `ShellError::Failed` on a non-zero exit, naming the log file when one is
  /// attached.
  pub fn exec(&self, cmd: &str) -> Result<String, ShellError> {
    info!(cmd = %cmd, cwd = %self.cwd.display(), "executing command");

    let (program, args) = platform_shell();
    let output = Command::new(program)
      .args(args)
      .arg(cmd)
      .current_dir(&self.cwd)
      .envs(&self.env)
      .output()
      .map_err(|source| ShellError::Io {
        cmd: cmd.to_string(),
        source,
      })?;

    if let Some(log) = &self.log {
      append_log(log, cmd, &output).map_err(|source| ShellError::Io {
        cmd: cmd.to_string(),
        source,
      })?;
    }

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      if !stderr.is_empty() {
        debug!(stderr = %stderr, "command stderr");
      }
      return Err(ShellError::Failed {
        cmd: cmd.to_string(),
        code: output.status.code(),
        log: self.log.clone(),
      });
    }

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !stdout.is_empty() {
      debug!(stdout = %stdout, "command output");
    }
    Ok(stdout)
  }
}

fn append_log(log: &Path, cmd: &str, output: &std::process::Output) -> std::io::Result<()> {
  if let Some(parent) = log.parent() {
    std::fs::create_dir_all(parent)?;
  }
  let mut file = OpenOptions::new().create(true).append(true).open(log)?;
  writeln!(file, "$ {}", cmd)?;
  file.write_all(&output.stdout)?;
  file.write_all(&output.stderr)?;
  writeln!(file, "[exit: {:?}]", output.status.code())?;
  Ok(())
}

#[cfg(unix)]
fn platform_shell() -> (&'static str, &'static [&'static str]) {
  const ARGS: &[&str] = &["-c"];
  ("/bin/sh", ARGS)
}

#[cfg(windows)]
fn platform_shell() -> (&'static str, &'static [&'static str]) {
  const ARGS: &[&str] = &["/C"];
  ("cmd.exe", ARGS)
}
