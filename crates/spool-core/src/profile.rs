//! Per-product coiler profiles and the TOML catalog they load from.
//!
//! A catalog file looks like:
//!
//! ```toml
//! [simulation]
//! iterations = 12
//!
//! [[profile]]
//! name = "compact"
//! drum_radius = 0.2
//! drum_height = 0.18
//! lateral_min = -0.07
//! lateral_max = 0.07
//! max_segments = 400
//! ```
//!
//! The drum is centered at the origin and turns about +Z; the lateral weave
//! moves the feed point along that axis.

use crate::config::SimSettings;
use crate::error::{Result, SpoolError};
use crate::types::Vec3;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Read-only drum geometry and growth limits for one product variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoilerProfile {
    pub name: String,
    pub drum_radius: f32,
    pub drum_height: f32,
    pub lateral_min: f32,
    pub lateral_max: f32,
    pub max_segments: u32,
    /// Drum rotation (radians) per added segment. Derived from
    /// `SimSettings::segment_spacing` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_angle: Option<f32>,
    /// Feed-arm attachment relative to the drum center, before lateral offset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_offset: Option<Vec3>,
}

impl CoilerProfile {
    /// Profile with lateral travel spanning 80% of the drum height.
    pub fn new(name: &str, drum_radius: f32, drum_height: f32, max_segments: u32) -> Self {
        let half_travel = drum_height * 0.4;
        Self {
            name: name.to_string(),
            drum_radius,
            drum_height,
            lateral_min: -half_travel,
            lateral_max: half_travel,
            max_segments,
            segment_angle: None,
            feed_offset: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |reason: &str| {
            Err(SpoolError::InvalidProfile {
                name: self.name.clone(),
                reason: reason.to_string(),
            })
        };
        if self.name.trim().is_empty() {
            return fail("name is empty");
        }
        if !(self.drum_radius.is_finite() && self.drum_radius > 0.0) {
            return fail("drum_radius must be positive");
        }
        if !(self.drum_height.is_finite() && self.drum_height > 0.0) {
            return fail("drum_height must be positive");
        }
        if !(self.lateral_min.is_finite() && self.lateral_max.is_finite())
            || self.lateral_min > self.lateral_max
        {
            return fail("lateral_min must not exceed lateral_max");
        }
        if self.lateral_min < -self.drum_height * 0.5 || self.lateral_max > self.drum_height * 0.5
        {
            return fail("lateral travel exceeds the drum width");
        }
        if self.max_segments == 0 {
            return fail("max_segments must be at least 1");
        }
        if let Some(angle) = self.segment_angle {
            if !(angle.is_finite() && angle > 0.0) {
                return fail("segment_angle must be positive");
            }
        }
        if let Some(offset) = self.feed_offset {
            if !offset.is_finite() {
                return fail("feed_offset must be finite");
            }
        }
        Ok(())
    }

    /// Drum rotation axis (unit)
    pub fn drum_axis(&self) -> Vec3 {
        Vec3::FORWARD
    }

    /// Drum angle that winds one segment onto the drum.
    pub fn segment_angle(&self, settings: &SimSettings) -> f32 {
        self.segment_angle
            .unwrap_or(settings.segment_spacing / self.drum_radius)
    }

    /// Target drum angular speed (rad/s) for the configured surface feed speed.
    pub fn rotation_speed(&self, settings: &SimSettings) -> f32 {
        settings.feed_speed / self.drum_radius
    }

    /// Rope start point in the drum's local (unrotated) frame: on the drum
    /// surface facing the feed arm, at the start of the lateral travel.
    pub fn start_anchor_local(&self, rope_radius: f32) -> Vec3 {
        let r = self.drum_radius + rope_radius;
        let diag = std::f32::consts::FRAC_1_SQRT_2;
        Vec3::new(r * diag, r * diag, self.lateral_min)
    }

    /// Feed-arm attachment point at the given lateral offset.
    pub fn feed_anchor(&self, lateral_offset: f32) -> Vec3 {
        let base = self
            .feed_offset
            .unwrap_or(Vec3::new(self.drum_radius * 3.0, self.drum_radius * 2.0, 0.0));
        Vec3::new(base.x, base.y, base.z + lateral_offset)
    }
}

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default)]
    simulation: SimSettings,
    #[serde(default, rename = "profile")]
    profiles: Vec<CoilerProfile>,
}

/// All profiles offered by the configurator plus shared simulation settings.
#[derive(Debug, Clone)]
pub struct ProfileCatalog {
    pub settings: SimSettings,
    profiles: Vec<CoilerProfile>,
}

impl ProfileCatalog {
    /// The three product variants shipped by default.
    pub fn builtin() -> Self {
        Self {
            settings: SimSettings::default(),
            profiles: vec![
                CoilerProfile::new("compact", 0.2, 0.18, 400),
                CoilerProfile::new("standard", 0.25, 0.22, 350),
                CoilerProfile::new("heavy", 0.3, 0.26, 300),
            ],
        }
    }

    /// Parse and validate a catalog from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(content)?;
        file.simulation.validate()?;

        let mut seen = std::collections::HashSet::new();
        for profile in &file.profiles {
            profile.validate()?;
            if !seen.insert(profile.name.as_str()) {
                return Err(SpoolError::InvalidProfile {
                    name: profile.name.clone(),
                    reason: "duplicate profile name".into(),
                });
            }
        }

        log::debug!("Loaded {} coiler profile(s)", file.profiles.len());
        Ok(Self {
            settings: file.simulation,
            profiles: file.profiles,
        })
    }

    /// Load a catalog file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn get(&self, name: &str) -> Result<&CoilerProfile> {
        self.profiles
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| SpoolError::ProfileNotFound(name.to_string()))
    }

    pub fn profiles(&self) -> &[CoilerProfile] {
        &self.profiles
    }

    pub fn names(&self) -> Vec<&str> {
        self.profiles.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
