//! Fixed-timestep position-based integrator for the chain.
//!
//! One call advances one sub-step: gravity and damping on velocity, position
//! prediction, a fixed number of Gauss-Seidel rounds of constraint relaxation,
//! anchor clamping and collision projection, kinematic carry of rope resting
//! on the turning drum, and finally velocity recovered from the positional
//! change. Nothing here is random; identical inputs give identical outputs.

use crate::chain::Chain;
use crate::collision::{CollisionVolume, VolumeRole};
use crate::snapshot::Snapshot;
use spool_core::{SimSettings, Vec3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepParams {
    pub gravity: Vec3,
    pub iterations: u32,
    /// Particle contact radius used against collision volumes
    pub contact_margin: f32,
    /// Replaces each particle's own damping when set (settle phase)
    pub damping_override: Option<f32>,
}

impl StepParams {
    pub fn from_settings(settings: &SimSettings) -> Self {
        Self {
            gravity: settings.gravity,
            iterations: settings.iterations.max(1),
            contact_margin: settings.rope_radius,
            damping_override: None,
        }
    }

    pub fn with_damping(mut self, damping: f32) -> Self {
        self.damping_override = Some(damping);
        self
    }
}

/// Advance the chain by one sub-step of `dt` seconds and return its snapshot.
pub fn step(
    chain: &mut Chain,
    dt: f32,
    volumes: &[CollisionVolume],
    rotation_speed: f32,
    params: &StepParams,
) -> Snapshot {
    if chain.is_empty() || chain.is_frozen() {
        return chain.snapshot();
    }
    if !(dt.is_finite() && dt > 0.0) {
        log::warn!("Ignoring step with invalid dt {dt}");
        return chain.snapshot();
    }

    integrate(chain, dt, params);

    for _ in 0..params.iterations {
        chain.apply_anchors();
        chain.relax_constraints();
        resolve_collisions(chain, volumes, params.contact_margin);
    }
    chain.apply_anchors();

    let delta = rotation_speed * dt;
    if delta != 0.0 && delta.is_finite() {
        carry_on_drum(chain, volumes, params.contact_margin, delta);
    }

    let faults = update_velocities(chain, dt);
    if faults > 0 {
        log::warn!("Recovered {faults} non-finite particle(s) from last known good state");
    }

    chain.snapshot()
}

fn integrate(chain: &mut Chain, dt: f32, params: &StepParams) {
    for p in chain.arena_mut().iter_mut() {
        p.last_good = p.position;
        if p.is_pinned() {
            continue;
        }
        // Apply gravity
        p.velocity += params.gravity * dt;
        // Apply damping
        let damping = params.damping_override.unwrap_or(p.damping);
        if damping > 0.0 {
            p.velocity = p.velocity * (1.0 - damping * dt).max(0.0);
        }
        p.position += p.velocity * dt;
    }
}

fn resolve_collisions(chain: &mut Chain, volumes: &[CollisionVolume], margin: f32) {
    for volume in volumes {
        for p in chain.arena_mut().iter_mut() {
            if p.is_pinned() {
                continue;
            }
            if let Some(corrected) = volume.resolve(p.position, margin) {
                p.position = corrected;
            }
        }
    }
}

fn carry_on_drum(chain: &mut Chain, volumes: &[CollisionVolume], margin: f32, delta: f32) {
    let slop = margin * 0.5;
    for drum in volumes.iter().filter(|v| v.role == VolumeRole::Drum) {
        for p in chain.arena_mut().iter_mut() {
            if !p.is_pinned() && drum.touches(p.position, margin, slop) {
                p.position = drum.carry(p.position, delta);
            }
        }
    }
}

/// Derive velocities from the positional change; restore any particle that
/// went non-finite. Returns the number of restored particles.
fn update_velocities(chain: &mut Chain, dt: f32) -> usize {
    let mut faults = 0;
    for p in chain.arena_mut().iter_mut() {
        if p.is_pinned() {
            p.velocity = Vec3::ZERO;
            continue;
        }
        let velocity = (p.position - p.last_good) / dt;
        if p.position.is_finite() && velocity.is_finite() {
            p.velocity = velocity;
        } else {
            p.position = p.last_good;
            p.velocity = Vec3::ZERO;
            faults += 1;
        }
    }
    faults
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::volumes_for_profile;
    use spool_core::CoilerProfile;

    const DT: f32 = 1.0 / 60.0;

    fn settings() -> SimSettings {
        SimSettings::default()
    }

    fn hanging_chain() -> Chain {
        Chain::create(16, Vec3::new(-0.5, 1.0, 0.0), Vec3::new(0.5, 1.0, 0.0), &settings()).unwrap()
    }

    #[test]
    fn step_is_deterministic() {
        let params = StepParams::from_settings(&settings());
        let mut a = hanging_chain();
        let mut b = hanging_chain();
        for _ in 0..50 {
            let sa = step(&mut a, DT, &[], 0.0, &params);
            let sb = step(&mut b, DT, &[], 0.0, &params);
            assert_eq!(sa, sb);
        }
    }

    #[test]
    fn anchors_hold_under_gravity() {
        let params = StepParams::from_settings(&settings());
        let mut c = hanging_chain();
        let snap = (0..30).map(|_| step(&mut c, DT, &[], 0.0, &params)).last().unwrap();
        assert_eq!(snap.positions[0], Vec3::new(-0.5, 1.0, 0.0));
        assert_eq!(snap.positions[15], Vec3::new(0.5, 1.0, 0.0));
    }

    #[test]
    fn gravity_pulls_interior_down() {
        let params = StepParams::from_settings(&settings());
        let straight = SimSettings {
            arc_sag: 0.0,
            ..settings()
        };
        let mut c = Chain::create(8, Vec3::new(-0.5, 1.0, 0.0), Vec3::new(0.5, 1.0, 0.0), &straight)
            .unwrap();
        let after = step(&mut c, DT, &[], 0.0, &params).positions[4];
        assert!(after.y < 1.0 - 1e-4, "interior should sag, got {after:?}");
    }

    #[test]
    fn frozen_chain_does_not_move() {
        let params = StepParams::from_settings(&settings());
        let mut c = hanging_chain();
        c.freeze();
        let before = c.snapshot();
        let after = step(&mut c, DT, &[], 1.0, &params);
        assert_eq!(before, after);
    }

    #[test]
    fn invalid_dt_is_ignored() {
        let params = StepParams::from_settings(&settings());
        let mut c = hanging_chain();
        let before = c.snapshot();
        assert_eq!(step(&mut c, f32::NAN, &[], 0.0, &params), before);
        assert_eq!(step(&mut c, 0.0, &[], 0.0, &params), before);
    }

    #[test]
    fn non_finite_particle_is_restored() {
        let params = StepParams::from_settings(&settings());
        let mut c = hanging_chain();
        let handle = c.handles()[5];
        if let Some(p) = c.arena_mut().get_mut(handle) {
            p.velocity = Vec3::new(f32::NAN, 0.0, 0.0);
        }
        let snap = step(&mut c, DT, &[], 0.0, &params);
        assert!(snap.is_finite());
    }

    #[test]
    fn rope_stays_outside_drum() {
        let s = settings();
        let profile = CoilerProfile::new("compact", 0.2, 0.18, 400);
        let volumes = volumes_for_profile(&profile);
        let mut c = Chain::create(
            40,
            profile.start_anchor_local(s.rope_radius),
            profile.feed_anchor(profile.lateral_min),
            &s,
        )
        .unwrap();
        let params = StepParams::from_settings(&s);
        let mut snap = c.snapshot();
        for _ in 0..120 {
            snap = step(&mut c, DT, &volumes, 0.0, &params);
        }
        for p in &snap.positions {
            let radial = (p.x * p.x + p.y * p.y).sqrt();
            assert!(radial > profile.drum_radius + s.rope_radius * 0.5, "{p:?} inside drum");
        }
    }

    #[test]
    fn drum_rotation_carries_resting_rope() {
        let s = settings();
        let drum = CollisionVolume::cylinder(VolumeRole::Drum, Vec3::ZERO, Vec3::FORWARD, 0.2, 0.09);
        // A short free particle pair lying on top of the drum, anchored far away.
        let mut c = Chain::create(3, Vec3::new(-0.01, 0.204, 0.0), Vec3::new(0.01, 0.204, 0.0), &SimSettings {
            arc_sag: 0.0,
            gravity: Vec3::ZERO,
            ..s.clone()
        })
        .unwrap();
        let params = StepParams {
            gravity: Vec3::ZERO,
            ..StepParams::from_settings(&s)
        };
        let before = c.positions()[1];
        let after = step(&mut c, DT, &[drum], 6.0, &params).positions[1];
        assert!(after.x < before.x, "carried particle should move with the drum");
    }
}
