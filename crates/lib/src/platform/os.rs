use std::fmt;
use std::str::FromStr;

/// Operating system variants a build can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Os {
  Linux,
  MacOs,
  FreeBsd,
  Windows,
}

/// Coarse OS grouping used to pick shared build strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsFamily {
  Unix,
  Windows,
}

impl Os {
  pub const ALL: [Os; 4] = [Os::Linux, Os::MacOs, Os::FreeBsd, Os::Windows];

  /// Detect the current operating system at runtime
  pub fn current() -> Option<Self> {
    match std::env::consts::OS {
      "linux" => Some(Self::Linux),
      "macos" => Some(Self::MacOs),
      "freebsd" => Some(Self::FreeBsd),
      "windows" => Some(Self::Windows),
      _ => None,
    }
  }

  /// Parse the OS part of a target triple such as `x86_64-linux-musl`.
  ///
  /// Returns `None` when the triple names no supported OS.
  pub fn from_target_triple(triple: &str) -> Option<Self> {
    let triple = triple.to_ascii_lowercase();
    if triple.contains("-linux") {
      Some(Self::Linux)
    } else if triple.contains("-macos") || triple.contains("-darwin") {
      Some(Self::MacOs)
    } else if triple.contains("-freebsd") {
      Some(Self::FreeBsd)
    } else if triple.contains("-windows") {
      Some(Self::Windows)
    } else {
      None
    }
  }

  /// Returns the lowercase string identifier for this OS
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::MacOs => "macos",
      Self::FreeBsd => "freebsd",
      Self::Windows => "windows",
    }
  }

  pub fn family(&self) -> OsFamily {
    match self {
      Self::Windows => OsFamily::Windows,
      Self::Linux | Self::MacOs | Self::FreeBsd => OsFamily::Unix,
    }
  }

  pub fn is_unix(&self) -> bool {
    self.family() == OsFamily::Unix
  }

  /// Field suffixes consulted for this OS, most specific first.
  ///
  /// The empty string (the bare field) is always last.
  pub fn suffix_chain(&self) -> &'static [&'static str] {
    match self {
      Self::Linux => &["@linux", "@unix", ""],
      Self::MacOs => &["@macos", "@unix", ""],
      Self::FreeBsd => &["@freebsd", "@bsd", "@unix", ""],
      Self::Windows => &["@windows", ""],
    }
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for Os {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "linux" => Ok(Self::Linux),
      "macos" | "darwin" => Ok(Self::MacOs),
      "freebsd" | "bsd" => Ok(Self::FreeBsd),
      "windows" => Ok(Self::Windows),
      other => Os::from_target_triple(other).ok_or_else(|| format!("unsupported target OS: {}", s)),
    }
  }
}
