//! Dependency resolution.
//!
//! Turns a request (a few package names) into the ordered, deduplicated list
//! of every package the request needs. Required edges are followed
//! transitively. Suggestion edges, when enabled, are followed one hop from
//! the *core* (the requested packages plus their required closure): a
//! suggested package is pulled in along with its own required closure, but
//! its suggestions are not.
//!
//! Ordering is a depth-first post-order walk in registration order, so the
//! same request always yields the same list and every required dependency of
//! a package precedes it. A suggested package that ends up in the set is also
//! ordered before the package suggesting it.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::config::PackageConfig;
use crate::platform::Os;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
  /// A requested name is not a declared package.
  #[error("unknown package [{0}]")]
  UnknownPackage(String),

  /// An edge points at a package that is not declared.
  #[error("package [{package}] {relation} unknown package [{dependency}]")]
  MissingDependency {
    package: String,
    dependency: String,
    relation: &'static str,
  },

  /// Required edges loop back on themselves.
  #[error("dependency cycle: {}", .path.join(" -> "))]
  Cycle { path: Vec<String> },
}

impl ResolveError {
  /// Whether the caller asked for something that does not exist, as
  /// opposed to the configuration itself being broken.
  pub fn is_usage(&self) -> bool {
    matches!(self, Self::UnknownPackage(_))
  }
}

/// Ordered closure of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedSet {
  order: Vec<String>,
  #[serde(skip)]
  members: HashSet<String>,
  /// Packages present only because something suggested them.
  suggested: Vec<String>,
}

impl ResolvedSet {
  pub fn contains(&self, name: &str) -> bool {
    self.members.contains(name)
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.order.iter().map(String::as_str)
  }

  pub fn as_slice(&self) -> &[String] {
    &self.order
  }

  pub fn len(&self) -> usize {
    self.order.len()
  }

  pub fn is_empty(&self) -> bool {
    self.order.is_empty()
  }

  pub fn position(&self, name: &str) -> Option<usize> {
    self.order.iter().position(|n| n == name)
  }

  pub fn is_suggested(&self, name: &str) -> bool {
    self.suggested.iter().any(|n| n == name)
  }

  fn push(&mut self, name: &str) {
    if self.members.insert(name.to_string()) {
      self.order.push(name.to_string());
    }
  }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
  Visiting,
  Done,
}

/// Resolves requests against one configuration for one target OS.
#[derive(Debug, Clone)]
pub struct DependencyResolver<'a> {
  config: &'a PackageConfig,
  os: Os,
  overrides: HashMap<String, Vec<String>>,
}

impl<'a> DependencyResolver<'a> {
  pub fn new(config: &'a PackageConfig, os: Os) -> Self {
    Self {
      config,
      os,
      overrides: HashMap::new(),
    }
  }

  /// Add required edges on top of the configured ones, e.g. dependencies a
  /// target computes from build options.
  pub fn with_overrides(mut self, overrides: HashMap<String, Vec<String>>) -> Self {
    for (pkg, deps) in overrides {
      let entry = self.overrides.entry(pkg).or_default();
      for dep in deps {
        if !entry.contains(&dep) {
          entry.push(dep);
        }
      }
    }
    self
  }

  /// Required dependencies of `name`, overrides appended.
  pub fn required(&self, name: &str) -> Vec<String> {
    let mut deps = self.config.get(name).map(|p| p.depends(self.os)).unwrap_or_default();
    if let Some(extra) = self.overrides.get(name) {
      for dep in extra {
        if !deps.contains(dep) {
          deps.push(dep.clone());
        }
      }
    }
    deps
  }

  fn suggested(&self, name: &str) -> Vec<String> {
    self.config.get(name).map(|p| p.suggests(self.os)).unwrap_or_default()
  }

  /// Resolve `requested` plus `extra` into an ordered set.
  ///
  /// # Errors
  ///
  /// Fails before producing anything if a requested name is unknown, an edge
  /// points at an undeclared package, or required edges form a cycle.
  pub fn resolve(
    &self,
    requested: &[String],
    extra: &[String],
    include_suggested: bool,
  ) -> Result<ResolvedSet, ResolveError> {
    let roots: Vec<&String> = requested.iter().chain(extra.iter()).collect();
    for name in &roots {
      if !self.config.contains(name) {
        return Err(ResolveError::UnknownPackage(name.to_string()));
      }
    }

    // Core: required closure of every root.
    let mut core = Vec::new();
    let mut marks = HashMap::new();
    let mut stack = Vec::new();
    for root in &roots {
      self.walk_required(root, &mut marks, &mut stack, &mut core)?;
    }

    let mut selected: HashSet<String> = core.iter().cloned().collect();
    let mut suggested_only = Vec::new();
    if include_suggested {
      let mut extra_pkgs = Vec::new();
      for pkg in &core {
        for sug in self.suggested(pkg) {
          if !self.config.contains(&sug) {
            return Err(ResolveError::MissingDependency {
              package: pkg.clone(),
              dependency: sug,
              relation: "suggests",
            });
          }
          self.walk_required(&sug, &mut marks, &mut stack, &mut extra_pkgs)?;
        }
      }
      for pkg in extra_pkgs {
        if selected.insert(pkg.clone()) {
          suggested_only.push(pkg);
        }
      }
    }

    // Final order: required edges plus suggestion edges inside the set.
    let mut set = ResolvedSet::default();
    let mut marks = HashMap::new();
    let mut stack = Vec::new();
    for root in &roots {
      self.walk_ordered(root, &selected, &mut marks, &mut stack, &mut set)?;
    }
    // Suggestion edges are reachable from the core, but a package can be
    // pulled in only through a required edge of a suggested package.
    for pkg in &suggested_only {
      self.walk_ordered(pkg, &selected, &mut marks, &mut stack, &mut set)?;
    }
    set.suggested = suggested_only.into_iter().filter(|p| set.contains(p)).collect();

    debug!(
      os = %self.os,
      requested = ?requested,
      resolved = ?set.as_slice(),
      "resolved packages"
    );
    Ok(set)
  }

  fn walk_required(
    &self,
    name: &str,
    marks: &mut HashMap<String, Mark>,
    stack: &mut Vec<String>,
    out: &mut Vec<String>,
  ) -> Result<(), ResolveError> {
    match marks.get(name) {
      Some(Mark::Done) => return Ok(()),
      Some(Mark::Visiting) => return Err(cycle(stack, name)),
      None => {}
    }
    marks.insert(name.to_string(), Mark::Visiting);
    stack.push(name.to_string());
    for dep in self.required(name) {
      if !self.config.contains(&dep) {
        return Err(ResolveError::MissingDependency {
          package: name.to_string(),
          dependency: dep,
          relation: "depends on",
        });
      }
      self.walk_required(&dep, marks, stack, out)?;
    }
    stack.pop();
    marks.insert(name.to_string(), Mark::Done);
    out.push(name.to_string());
    Ok(())
  }

  fn walk_ordered(
    &self,
    name: &str,
    selected: &HashSet<String>,
    marks: &mut HashMap<String, Mark>,
    stack: &mut Vec<String>,
    out: &mut ResolvedSet,
  ) -> Result<(), ResolveError> {
    if marks.contains_key(name) {
      return Ok(());
    }
    marks.insert(name.to_string(), Mark::Visiting);
    stack.push(name.to_string());
    for dep in self.required(name) {
      if marks.get(&dep) == Some(&Mark::Visiting) {
        return Err(cycle(stack, &dep));
      }
      self.walk_ordered(&dep, selected, marks, stack, out)?;
    }
    // A suggestion whose required closure reaches the current path would
    // invert a required edge; drop that ordering constraint.
    for sug in self.suggested(name) {
      if selected.contains(&sug) && !marks.contains_key(&sug) && !self.requires_visiting(&sug, marks) {
        self.walk_ordered(&sug, selected, marks, stack, out)?;
      }
    }
    stack.pop();
    marks.insert(name.to_string(), Mark::Done);
    out.push(name);
    Ok(())
  }

  /// Whether any package in the required closure of `from` is on the
  /// current walk path.
  fn requires_visiting(&self, from: &str, marks: &HashMap<String, Mark>) -> bool {
    let mut seen = HashSet::new();
    let mut todo = vec![from.to_string()];
    while let Some(name) = todo.pop() {
      if marks.get(&name) == Some(&Mark::Visiting) {
        return true;
      }
      if seen.insert(name.clone()) {
        todo.extend(self.required(&name));
      }
    }
    false
  }

  /// Reverse edges inside `set`: for each package, the members that pull it
  /// in, in resolution order.
  pub fn dependents(&self, set: &ResolvedSet) -> BTreeMap<String, Vec<String>> {
    let mut why: BTreeMap<String, Vec<String>> = set.iter().map(|p| (p.to_string(), Vec::new())).collect();
    for pkg in set.iter() {
      let edges = self
        .required(pkg)
        .into_iter()
        .chain(self.suggested(pkg).into_iter().filter(|s| set.contains(s)));
      for dep in edges {
        if let Some(list) = why.get_mut(&dep)
          && !list.iter().any(|p| p == pkg)
        {
          list.push(pkg.to_string());
        }
      }
    }
    why
  }
}

fn cycle(stack: &[String], back_to: &str) -> ResolveError {
  let start = stack.iter().position(|n| n == back_to).unwrap_or(0);
  let mut path: Vec<String> = stack[start..].to_vec();
  path.push(back_to.to_string());
  ResolveError::Cycle { path }
}
