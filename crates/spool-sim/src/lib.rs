//! Spool Sim - Constraint-chain rope simulation
//!
//! Provides the simulation side of the winding core:
//! - `Chain`: arena particles joined by distance constraints, grown by splicing
//! - `CollisionVolume`: drum and guide-ring cylinders
//! - `stepper::step`: fixed-timestep position-based integration
//! - `SimulationContext`: explicit per-simulation state answering `SimRequest`s
//! - `Snapshot`: immutable per-tick positions handed to presentation

pub mod chain;
pub mod collision;
pub mod constraint;
pub mod context;
pub mod particle;
pub mod protocol;
pub mod snapshot;
pub mod stepper;

pub use chain::Chain;
pub use collision::{volumes_for_profile, CollisionVolume, VolumeRole};
pub use constraint::{AnchorConstraint, DistanceConstraint};
pub use context::SimulationContext;
pub use particle::{Particle, ParticleArena};
pub use protocol::{SimRequest, SimResponse};
pub use snapshot::Snapshot;
pub use stepper::StepParams;
