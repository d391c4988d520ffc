//! Particle state and the append-only arena that owns it

use spool_core::{ParticleHandle, Vec3};

/// One point mass of the rope
#[derive(Debug, Clone)]
pub struct Particle {
    pub position: Vec3,
    pub velocity: Vec3,
    pub mass: f32,
    /// 0.0 for pinned particles
    pub inv_mass: f32,
    /// Velocity damping per second
    pub damping: f32,
    /// Position at the start of the current sub-step; restored on numerical fault
    pub last_good: Vec3,
}

impl Particle {
    pub fn new(position: Vec3, mass: f32, damping: f32) -> Self {
        let inv_mass = if mass > 0.0 { 1.0 / mass } else { 0.0 };
        Self {
            position,
            velocity: Vec3::ZERO,
            mass,
            inv_mass,
            damping,
            last_good: position,
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.inv_mass == 0.0
    }

    /// Make the particle immovable (anchors, finalized chains).
    pub fn pin(&mut self) {
        self.inv_mass = 0.0;
        self.velocity = Vec3::ZERO;
    }
}

/// Append-only particle storage addressed by stable handles.
///
/// Slots are never removed or reordered, so a handle stays valid for the
/// lifetime of the chain regardless of where later particles are spliced in.
#[derive(Debug, Clone, Default)]
pub struct ParticleArena {
    slots: Vec<Particle>,
}

impl ParticleArena {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
        }
    }

    pub fn insert(&mut self, particle: Particle) -> ParticleHandle {
        let handle = ParticleHandle::from_raw(self.slots.len() as u32);
        self.slots.push(particle);
        handle
    }

    pub fn get(&self, handle: ParticleHandle) -> Option<&Particle> {
        self.slots.get(handle.slot())
    }

    pub fn get_mut(&mut self, handle: ParticleHandle) -> Option<&mut Particle> {
        self.slots.get_mut(handle.slot())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.slots.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Particle> {
        self.slots.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_handles_are_stable() {
        let mut arena = ParticleArena::default();
        let a = arena.insert(Particle::new(Vec3::ZERO, 1.0, 0.0));
        let b = arena.insert(Particle::new(Vec3::UP, 1.0, 0.0));
        let c = arena.insert(Particle::new(Vec3::RIGHT, 1.0, 0.0));

        assert_eq!(arena.len(), 3);
        assert_eq!(arena.get(a).unwrap().position, Vec3::ZERO);
        assert_eq!(arena.get(b).unwrap().position, Vec3::UP);
        assert_eq!(arena.get(c).unwrap().position, Vec3::RIGHT);
        assert!(arena.get(ParticleHandle::from_raw(7)).is_none());
    }

    #[test]
    fn pin_zeroes_inverse_mass_and_velocity() {
        let mut p = Particle::new(Vec3::ZERO, 2.0, 0.1);
        assert!((p.inv_mass - 0.5).abs() < 1e-6);
        p.velocity = Vec3::UP;
        p.pin();
        assert!(p.is_pinned());
        assert_eq!(p.velocity, Vec3::ZERO);
    }
}
