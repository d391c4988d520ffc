//! The rope: ordered arena particles joined by distance constraints.
//!
//! Constraint `i` always joins the particles at order positions `i` and
//! `i + 1`. The first particle is held by the start anchor, the last by the
//! moving (feed-arm) anchor. Growth splices particles into the interior only,
//! so both anchor handles survive every splice.

use crate::constraint::{AnchorConstraint, DistanceConstraint};
use crate::particle::{Particle, ParticleArena};
use crate::snapshot::Snapshot;
use spool_core::{ParticleHandle, Result, SimSettings, SpoolError, Vec3};

#[derive(Debug, Clone)]
pub struct Chain {
    arena: ParticleArena,
    order: Vec<ParticleHandle>,
    constraints: Vec<DistanceConstraint>,
    start_anchor: AnchorConstraint,
    moving_anchor: AnchorConstraint,
    particle_mass: f32,
    damping: f32,
    frozen: bool,
}

impl Chain {
    /// Seed `initial_len` particles along a gently sagging circular arc from
    /// `start_anchor` to `end_anchor`. Consecutive particles sit exactly one
    /// rest length apart, so the new chain starts without constraint error.
    pub fn create(
        initial_len: usize,
        start_anchor: Vec3,
        end_anchor: Vec3,
        settings: &SimSettings,
    ) -> Result<Self> {
        if initial_len < 2 {
            return Err(SpoolError::ChainTooShort(initial_len));
        }

        let sag_dir = settings
            .gravity
            .try_normalized(1e-6)
            .unwrap_or(Vec3::new(0.0, -1.0, 0.0));
        let points = arc_points(
            start_anchor,
            end_anchor,
            initial_len,
            settings.arc_sag,
            sag_dir,
            settings.segment_spacing,
        );

        let mut arena = ParticleArena::with_capacity(initial_len * 4);
        let order: Vec<ParticleHandle> = points
            .iter()
            .map(|&p| arena.insert(Particle::new(p, settings.particle_mass, settings.damping)))
            .collect();

        let constraints = order
            .windows(2)
            .zip(points.windows(2))
            .map(|(h, p)| {
                DistanceConstraint::new(h[0], h[1], p[0].distance(&p[1]), settings.stiffness)
            })
            .collect();

        let first = order[0];
        let last = order[order.len() - 1];
        for handle in [first, last] {
            if let Some(p) = arena.get_mut(handle) {
                p.pin();
            }
        }

        Ok(Self {
            arena,
            order,
            constraints,
            start_anchor: AnchorConstraint::new(first, start_anchor),
            moving_anchor: AnchorConstraint::new(last, end_anchor),
            particle_mass: settings.particle_mass,
            damping: settings.damping,
            frozen: false,
        })
    }

    /// Splice one particle in front of order position `insertion_index`.
    ///
    /// Valid positions are `1..len`, so the new particle is never first or
    /// last. The constraint between the former neighbours is replaced by two
    /// with the same rest length; the new particle starts at their midpoint
    /// with the averaged velocity. Returns `false` (logged no-op) when the
    /// index is out of range or the chain is frozen.
    pub fn append_segment(&mut self, insertion_index: usize) -> bool {
        if self.frozen {
            log::warn!("append_segment ignored: chain is frozen");
            return false;
        }
        let len = self.order.len();
        if insertion_index == 0 || insertion_index >= len {
            log::warn!(
                "append_segment ignored: index {insertion_index} outside interior range 1..{len}"
            );
            return false;
        }

        let prev = self.order[insertion_index - 1];
        let next = self.order[insertion_index];
        let replaced = self.constraints[insertion_index - 1];
        let (Some(pp), Some(pn)) = (self.arena.get(prev), self.arena.get(next)) else {
            log::warn!("append_segment ignored: stale neighbour handle");
            return false;
        };

        let mut particle = Particle::new(
            pp.position.lerp(pn.position, 0.5),
            self.particle_mass,
            self.damping,
        );
        particle.velocity = pp.velocity.lerp(pn.velocity, 0.5);

        let handle = self.arena.insert(particle);
        self.order.insert(insertion_index, handle);
        self.constraints[insertion_index - 1] =
            DistanceConstraint::new(prev, handle, replaced.rest_length, replaced.stiffness);
        self.constraints.insert(
            insertion_index,
            DistanceConstraint::new(handle, next, replaced.rest_length, replaced.stiffness),
        );
        true
    }

    /// Pin every particle in place and stop all motion.
    pub fn freeze(&mut self) {
        for p in self.arena.iter_mut() {
            p.pin();
        }
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn set_moving_anchor(&mut self, target: Vec3) {
        self.moving_anchor.target = target;
    }

    pub fn set_start_anchor(&mut self, target: Vec3) {
        self.start_anchor.target = target;
    }

    pub fn moving_anchor(&self) -> Vec3 {
        self.moving_anchor.target
    }

    pub fn start_anchor(&self) -> Vec3 {
        self.start_anchor.target
    }

    /// Snap both anchored particles to their targets.
    pub fn apply_anchors(&mut self) {
        if self.frozen {
            return;
        }
        self.start_anchor.apply(&mut self.arena);
        self.moving_anchor.apply(&mut self.arena);
    }

    pub fn relax_constraints(&mut self) {
        for c in &self.constraints {
            c.solve(&mut self.arena);
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.positions())
    }

    pub fn positions(&self) -> Vec<Vec3> {
        self.order
            .iter()
            .filter_map(|&h| self.arena.get(h).map(|p| p.position))
            .collect()
    }

    pub fn handles(&self) -> &[ParticleHandle] {
        &self.order
    }

    pub fn constraints(&self) -> &[DistanceConstraint] {
        &self.constraints
    }

    pub fn particle(&self, handle: ParticleHandle) -> Option<&Particle> {
        self.arena.get(handle)
    }

    pub(crate) fn arena_mut(&mut self) -> &mut ParticleArena {
        &mut self.arena
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Sum of constraint rest lengths.
    pub fn rest_length_total(&self) -> f32 {
        self.constraints.iter().map(|c| c.rest_length).sum()
    }

    /// Current polyline length through the particles.
    pub fn arc_length(&self) -> f32 {
        self.snapshot().polyline_length()
    }

    /// Worst current length / rest length over all constraints.
    pub fn max_stretch_ratio(&self) -> f32 {
        self.constraints
            .iter()
            .map(|c| c.stretch_ratio(&self.arena))
            .fold(0.0, f32::max)
    }
}

/// Points on a circular arc from `start` to `end` bulging toward `sag_dir`
/// by `sag_ratio` of the chord, at equal angular (and so equal chord)
/// spacing.
fn arc_points(
    start: Vec3,
    end: Vec3,
    count: usize,
    sag_ratio: f32,
    sag_dir: Vec3,
    fallback_spacing: f32,
) -> Vec<Vec3> {
    let chord_vec = end - start;
    let chord = chord_vec.length();

    let Some(along) = chord_vec.try_normalized(1e-6) else {
        log::warn!("Chain anchors coincide; hanging chain along gravity instead");
        return (0..count)
            .map(|i| start + sag_dir * (i as f32 * fallback_spacing))
            .collect();
    };

    let straight = |i: usize| start.lerp(end, i as f32 / (count - 1) as f32);
    let bulge = (sag_dir - along * sag_dir.dot(&along))
        .try_normalized(1e-6)
        .unwrap_or_else(|| along.any_orthogonal());
    let sagitta = chord * sag_ratio;
    if sagitta <= 1e-6 {
        return (0..count).map(straight).collect();
    }

    let radius = (chord * chord * 0.25 + sagitta * sagitta) / (2.0 * sagitta);
    let half_angle = (chord * 0.5 / radius).clamp(-1.0, 1.0).asin();
    let center = start.lerp(end, 0.5) - bulge * (radius - sagitta);

    (0..count)
        .map(|i| {
            if i == 0 {
                return start;
            }
            if i == count - 1 {
                return end;
            }
            let phi = -half_angle + 2.0 * half_angle * i as f32 / (count - 1) as f32;
            center + bulge * (radius * phi.cos()) + along * (radius * phi.sin())
        })
        .collect()
}
