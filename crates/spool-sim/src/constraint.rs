//! Distance and anchor constraints over arena particles

use crate::particle::ParticleArena;
use spool_core::{ParticleHandle, Vec3};

/// Keeps two particles `rest_length` apart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceConstraint {
    pub a: ParticleHandle,
    pub b: ParticleHandle,
    pub rest_length: f32,
    /// Fraction of the error corrected per relaxation pass, in (0, 1]
    pub stiffness: f32,
}

impl DistanceConstraint {
    pub fn new(a: ParticleHandle, b: ParticleHandle, rest_length: f32, stiffness: f32) -> Self {
        Self {
            a,
            b,
            rest_length,
            stiffness,
        }
    }

    /// Mass-weighted position correction toward the rest length.
    pub fn solve(&self, arena: &mut ParticleArena) {
        let (Some(pa), Some(pb)) = (arena.get(self.a), arena.get(self.b)) else {
            return;
        };
        let (wa, wb) = (pa.inv_mass, pb.inv_mass);
        let w = wa + wb;
        if w == 0.0 {
            return;
        }

        let delta = pb.position - pa.position;
        let dist = delta.length();
        if dist < 1e-9 {
            return;
        }

        let correction = delta * ((dist - self.rest_length) / (dist * w) * self.stiffness);
        if let Some(pa) = arena.get_mut(self.a) {
            pa.position += correction * wa;
        }
        if let Some(pb) = arena.get_mut(self.b) {
            pb.position -= correction * wb;
        }
    }

    /// Current length divided by rest length.
    pub fn stretch_ratio(&self, arena: &ParticleArena) -> f32 {
        match (arena.get(self.a), arena.get(self.b)) {
            (Some(pa), Some(pb)) if self.rest_length > 0.0 => {
                pa.position.distance(&pb.position) / self.rest_length
            }
            _ => 1.0,
        }
    }
}

/// Pins one particle to an externally driven target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorConstraint {
    pub particle: ParticleHandle,
    pub target: Vec3,
}

impl AnchorConstraint {
    pub fn new(particle: ParticleHandle, target: Vec3) -> Self {
        Self { particle, target }
    }

    pub fn apply(&self, arena: &mut ParticleArena) {
        if let Some(p) = arena.get_mut(self.particle) {
            p.position = self.target;
            p.velocity = Vec3::ZERO;
        }
    }
}
