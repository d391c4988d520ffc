//! Spool Runtime - presentation-side winding loop
//!
//! Provides the pieces that run on the render thread:
//! - `SimClock`: fixed-timestep accumulator with a catch-up cap
//! - `BridgeClient` / `SimBridge`: worker or local transport to the simulation
//! - `WindingStateMachine`: Idle / Filling / LimitReached / Finalized lifecycle
//! - `GrowthPolicy`: drum rotation to segment appends plus lateral weave
//! - `SnapshotInterpolator` / `AngleSmoother`: visual smoothing
//! - `CoilerController`: wires all of the above once per render tick
//! - `WindingEvent` / `EventBus`: lifecycle notifications for the host

pub mod bridge;
mod clock;
pub mod controller;
mod event_bus;
pub mod growth;
pub mod smoothing;
pub mod state;
mod surface;

pub use bridge::{connect, BridgeClient, BridgeMode, LocalBridge, SimBridge, WorkerBridge};
pub use clock::SimClock;
pub use controller::CoilerController;
pub use event_bus::{EventBus, WindingEvent};
pub use growth::{GrowthPolicy, GrowthStep};
pub use smoothing::{AngleSmoother, SnapshotInterpolator};
pub use state::{Transition, WindingCounters, WindingState, WindingStateMachine};
pub use surface::{CompanionMesh, HeadlessSurface, RenderSurface};
