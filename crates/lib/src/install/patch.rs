use tracing::{debug, info};

use super::InstallError;
use crate::consts::PATCH_MARKER;
use crate::registry::Registry;
use crate::stage::StageContext;

/// Run the patch callbacks of `ctx.package` unless its source tree carries
/// the patch marker. The marker is written once a callback reports that it
/// changed something.
///
/// Returns whether anything was patched.
pub fn apply_patches(registry: &Registry, ctx: &StageContext<'_>) -> Result<bool, InstallError> {
  let package = &ctx.package.name;
  let callbacks = registry.patches(package);
  if callbacks.is_empty() {
    return Ok(false);
  }
  let marker = ctx.source_dir().join(PATCH_MARKER);
  if marker.exists() {
    debug!(package = %package, "sources already patched");
    return Ok(false);
  }

  let mut patched = false;
  for (guard, callback) in callbacks {
    if let Some(guard) = guard
      && !ctx.in_resolved_set(guard)
    {
      continue;
    }
    let changed = callback(ctx).map_err(|source| InstallError::Patch {
      package: package.clone(),
      source,
    })?;
    patched |= changed;
  }

  if patched {
    std::fs::write(&marker, "PATCHED\n").map_err(|e| InstallError::io(&marker, e))?;
    info!(package = %package, "patched sources");
  }
  Ok(patched)
}
