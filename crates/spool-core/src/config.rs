//! Simulation settings shared by the stepper, growth policy and tube builder

use crate::error::{Result, SpoolError};
use crate::types::Vec3;
use serde::{Deserialize, Serialize};

/// Tunables for the whole pipeline. Every field has a default, so a TOML
/// `[simulation]` table only needs to name what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimSettings {
    /// Gravity acceleration (m/s²)
    pub gravity: Vec3,
    /// Linear velocity damping per second while winding
    pub damping: f32,
    /// Linear velocity damping per second during the settle delay
    pub settle_damping: f32,
    /// Relaxation iterations per sub-step
    pub iterations: u32,
    /// Distance constraint stiffness in (0, 1]
    pub stiffness: f32,
    pub particle_mass: f32,
    /// Physics timestep in seconds (default: 1/60)
    pub fixed_timestep: f64,
    /// Maximum catch-up sub-steps per render tick
    pub max_substeps: u32,
    /// Particle count of a freshly created chain
    pub initial_segments: usize,
    /// Sub-steps after chain creation during which rotation is held at zero
    pub settle_ticks: u32,
    /// Contact radius of a rope particle
    pub rope_radius: f32,
    /// Sagitta of the initial arc as a fraction of the anchor chord
    pub arc_sag: f32,
    /// Rope length wound per added segment; threshold angle = spacing / radius
    pub segment_spacing: f32,
    /// Drum surface speed (m/s) once winding is running
    pub feed_speed: f32,
    /// Exponential easing rate (1/s) of the drum toward its target speed
    pub rotation_ease: f32,
    /// Segments added before the lateral weave flips direction
    pub weave_interval: u32,
    pub tube_radius: f32,
    pub radial_segments: usize,
    pub samples_per_span: usize,
    /// Curve tension (0.5 = classic Catmull-Rom)
    pub tension: f32,
    /// Largest distance a displayed point may move in one render tick
    pub max_step_delta: f32,
    /// Blend factor of the companion-angle smoother
    pub smoothing_blend: f32,
    /// Render ticks the companion-angle smoother stays active after a splice
    pub smoothing_window: u32,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            damping: 0.4,
            settle_damping: 8.0,
            iterations: 10,
            stiffness: 1.0,
            particle_mass: 1.0,
            fixed_timestep: 1.0 / 60.0,
            max_substeps: 4,
            initial_segments: 64,
            settle_ticks: 120,
            rope_radius: 0.004,
            arc_sag: 0.1,
            segment_spacing: 0.012,
            feed_speed: 0.25,
            rotation_ease: 3.0,
            weave_interval: 30,
            tube_radius: 0.004,
            radial_segments: 8,
            samples_per_span: 4,
            tension: 0.1,
            max_step_delta: 0.05,
            smoothing_blend: 0.6,
            smoothing_window: 60,
        }
    }
}

impl SimSettings {
    /// Reject settings the stepper cannot run with.
    pub fn validate(&self) -> Result<()> {
        check_range("iterations", self.iterations as f64, 1.0, 256.0)?;
        check_range("stiffness", self.stiffness as f64, 0.0001, 1.0)?;
        check_range("particle_mass", self.particle_mass as f64, 1e-6, 1e6)?;
        check_range("fixed_timestep", self.fixed_timestep, 1e-5, 1.0)?;
        check_range("max_substeps", self.max_substeps as f64, 1.0, 64.0)?;
        check_range("initial_segments", self.initial_segments as f64, 2.0, 100_000.0)?;
        check_range("rope_radius", self.rope_radius as f64, 0.0, 1.0)?;
        check_range("arc_sag", self.arc_sag as f64, 0.0, 0.45)?;
        check_range("segment_spacing", self.segment_spacing as f64, 1e-5, 10.0)?;
        check_range("weave_interval", self.weave_interval as f64, 1.0, 1e6)?;
        check_range("radial_segments", self.radial_segments as f64, 3.0, 256.0)?;
        check_range("samples_per_span", self.samples_per_span as f64, 1.0, 64.0)?;
        check_range("smoothing_blend", self.smoothing_blend as f64, 0.0, 1.0)?;
        if !self.gravity.is_finite() {
            return Err(SpoolError::ValueOutOfRange {
                field: "gravity".into(),
                min: f64::MIN,
                max: f64::MAX,
                value: f64::NAN,
            });
        }
        Ok(())
    }
}

fn check_range(field: &str, value: f64, min: f64, max: f64) -> Result<()> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(SpoolError::ValueOutOfRange {
            field: field.to_string(),
            min,
            max,
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let settings = SimSettings::default();
        assert!(settings.validate().is_ok());
        assert!((settings.fixed_timestep - 1.0 / 60.0).abs() < 1e-12);
        assert_eq!(settings.initial_segments, 64);
    }

    #[test]
    fn test_partial_toml_override() {
        let settings: SimSettings = toml::from_str("iterations = 4\nfeed_speed = 0.5").unwrap();
        assert_eq!(settings.iterations, 4);
        assert_eq!(settings.feed_speed, 0.5);
        assert_eq!(settings.weave_interval, 30);
    }

    #[test]
    fn test_rejects_zero_substeps() {
        let settings = SimSettings {
            max_substeps: 0,
            ..SimSettings::default()
        };
        match settings.validate() {
            Err(SpoolError::ValueOutOfRange { field, .. }) => assert_eq!(field, "max_substeps"),
            other => panic!("expected range error, got {other:?}"),
        }
    }
}
