//! CLI command implementations

pub mod export;
pub mod profiles;
pub mod simulate;

use anyhow::{bail, Context, Result};
use spool_core::ProfileCatalog;

/// Load the catalog at `config`, or the built-in profiles.
pub fn load_catalog(config: Option<&str>) -> Result<ProfileCatalog> {
    match config {
        Some(path) => ProfileCatalog::load(path)
            .with_context(|| format!("failed to load profile catalog '{path}'")),
        None => Ok(ProfileCatalog::builtin()),
    }
}

/// Number of frames and the per-frame time for a run.
pub fn frame_plan(seconds: f64, fps: f64) -> Result<(u64, f64)> {
    if !(fps.is_finite() && fps > 0.0) {
        bail!("fps must be positive, got {fps}");
    }
    if !(seconds.is_finite() && seconds >= 0.0) {
        bail!("seconds must be non-negative, got {seconds}");
    }
    Ok(((seconds * fps).ceil() as u64, 1.0 / fps))
}
