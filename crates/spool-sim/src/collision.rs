//! Static/kinematic guide volumes: the drum and its two side rings.

use spool_core::spline::rotate_around_axis;
use spool_core::{CoilerProfile, Vec3};

/// Guide ring radius relative to the drum radius
const GUIDE_RADIUS_SCALE: f32 = 1.35;
/// Half thickness of a guide ring along the drum axis
const GUIDE_HALF_THICKNESS: f32 = 0.004;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeRole {
    /// Turns with the winding and carries rope lying on it
    Drum,
    Guide,
}

/// Flat-capped cylinder, optionally rotated about its own axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionVolume {
    pub role: VolumeRole,
    pub center: Vec3,
    /// Unit axis of symmetry
    pub axis: Vec3,
    pub radius: f32,
    pub half_height: f32,
    /// Current rotation about `axis` in radians
    pub angle: f32,
}

impl CollisionVolume {
    pub fn cylinder(role: VolumeRole, center: Vec3, axis: Vec3, radius: f32, half_height: f32) -> Self {
        Self {
            role,
            center,
            axis: axis.normalized(),
            radius,
            half_height,
            angle: 0.0,
        }
    }

    /// If `point` (a sphere of radius `margin`) penetrates the volume, return
    /// the point projected out along the surface normal.
    pub fn resolve(&self, point: Vec3, margin: f32) -> Option<Vec3> {
        let rel = point - self.center;
        let axial = rel.dot(&self.axis);
        let r = self.radius + margin;
        let h = self.half_height + margin;
        let radial_vec = rel - self.axis * axial;
        let radial = radial_vec.length();
        if axial.abs() >= h || radial >= r {
            return None;
        }

        let radial_depth = r - radial;
        let cap_depth = h - axial.abs();
        if radial_depth <= cap_depth {
            let normal = radial_vec
                .try_normalized(1e-9)
                .unwrap_or_else(|| self.axis.any_orthogonal());
            Some(self.center + self.axis * axial + normal * r)
        } else {
            let sign = if axial >= 0.0 { 1.0 } else { -1.0 };
            Some(point + self.axis * (sign * cap_depth))
        }
    }

    /// Whether `point` rests on the side surface (within `slop` of it).
    pub fn touches(&self, point: Vec3, margin: f32, slop: f32) -> bool {
        let rel = point - self.center;
        let axial = rel.dot(&self.axis);
        if axial.abs() > self.half_height + margin {
            return false;
        }
        let radial = (rel - self.axis * axial).length();
        radial <= self.radius + margin + slop
    }

    /// Rotate `point` about the volume axis by `delta` radians.
    pub fn carry(&self, point: Vec3, delta: f32) -> Vec3 {
        self.center + rotate_around_axis(point - self.center, self.axis, delta)
    }
}

/// Drum plus two side guide rings for a profile. The drum comes first.
pub fn volumes_for_profile(profile: &CoilerProfile) -> Vec<CollisionVolume> {
    let axis = profile.drum_axis();
    let half = profile.drum_height * 0.5;
    let ring_radius = profile.drum_radius * GUIDE_RADIUS_SCALE;
    let ring_offset = half + GUIDE_HALF_THICKNESS;

    vec![
        CollisionVolume::cylinder(
            VolumeRole::Drum,
            Vec3::ZERO,
            axis,
            profile.drum_radius,
            half,
        ),
        CollisionVolume::cylinder(
            VolumeRole::Guide,
            axis * -ring_offset,
            axis,
            ring_radius,
            GUIDE_HALF_THICKNESS,
        ),
        CollisionVolume::cylinder(
            VolumeRole::Guide,
            axis * ring_offset,
            axis,
            ring_radius,
            GUIDE_HALF_THICKNESS,
        ),
    ]
}
