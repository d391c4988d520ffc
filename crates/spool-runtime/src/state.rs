//! Winding state machine: the single owner of lifecycle state and counters.
//!
//! ```text
//! Idle --start--> Filling --reach_limit--> LimitReached --finalize--> Finalized
//!   ^                                                                     |
//!   +------------------------------ reset (from any state) ---------------+
//! ```
//!
//! Counters are only mutated through [`WindingStateMachine`] methods.

use crate::growth::{GrowthPolicy, GrowthStep};
use spool_core::CoilerProfile;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindingState {
    /// No chain; waiting for a valid profile.
    Idle,
    /// Chain exists and grows as the drum turns.
    Filling,
    /// Segment budget exhausted; the drum eases to a stop.
    LimitReached,
    /// Particles frozen, geometry detached.
    Finalized,
}

impl fmt::Display for WindingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WindingState::Idle => "idle",
            WindingState::Filling => "filling",
            WindingState::LimitReached => "limit-reached",
            WindingState::Finalized => "finalized",
        };
        f.write_str(name)
    }
}

/// A state change reported by the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: WindingState,
    pub to: WindingState,
}

/// Per-run counters, cleared on every reset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindingCounters {
    /// Appends requested by the growth policy
    pub segments_requested: u32,
    /// Appends the simulation has confirmed
    pub segments_added: u32,
    /// Sub-steps left before rotation is allowed, as last reported by the
    /// simulation
    pub settle_remaining: u32,
    /// Total drum angle since the chain was created
    pub rotation: f32,
    pub lateral_offset: f32,
    /// +1.0 or -1.0
    pub direction: f32,
    pub appends_since_flip: u32,
    pub angle_to_next_segment: f32,
}

impl Default for WindingCounters {
    fn default() -> Self {
        Self::starting_at(0.0, 0)
    }
}

impl WindingCounters {
    pub fn starting_at(lateral_offset: f32, settle_ticks: u32) -> Self {
        Self {
            segments_requested: 0,
            segments_added: 0,
            settle_remaining: settle_ticks,
            rotation: 0.0,
            lateral_offset,
            direction: 1.0,
            appends_since_flip: 0,
            angle_to_next_segment: 0.0,
        }
    }
}

pub struct WindingStateMachine {
    state: WindingState,
    counters: WindingCounters,
}

impl Default for WindingStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl WindingStateMachine {
    pub fn new() -> Self {
        Self {
            state: WindingState::Idle,
            counters: WindingCounters::default(),
        }
    }

    pub fn state(&self) -> WindingState {
        self.state
    }

    pub fn counters(&self) -> &WindingCounters {
        &self.counters
    }

    pub fn is_settling(&self) -> bool {
        self.counters.settle_remaining > 0
    }

    /// Idle → Filling for `profile`, starting the settle delay. Ignored in
    /// any other state or for an invalid profile.
    pub fn start(&mut self, profile: &CoilerProfile, settle_ticks: u32) -> Option<Transition> {
        if self.state != WindingState::Idle {
            log::warn!("Cannot start winding from state {}", self.state);
            return None;
        }
        if let Err(e) = profile.validate() {
            log::warn!("Staying idle: {e}");
            return None;
        }
        self.counters = WindingCounters::starting_at(profile.lateral_min, settle_ticks);
        self.transition(WindingState::Filling)
    }

    /// Filling → LimitReached
    pub fn reach_limit(&mut self) -> Option<Transition> {
        match self.state {
            WindingState::Filling => self.transition(WindingState::LimitReached),
            _ => None,
        }
    }

    /// LimitReached → Finalized
    pub fn finalize(&mut self) -> Option<Transition> {
        match self.state {
            WindingState::LimitReached => self.transition(WindingState::Finalized),
            _ => None,
        }
    }

    /// Any state → Idle with counters cleared. Returns `None` if already idle.
    pub fn reset(&mut self) -> Option<Transition> {
        self.counters = WindingCounters::default();
        if self.state == WindingState::Idle {
            return None;
        }
        self.transition(WindingState::Idle)
    }

    pub fn advance_rotation(&mut self, delta: f32) {
        if delta.is_finite() {
            self.counters.rotation += delta;
        }
    }

    /// Run the growth policy for this tick. Only grows while filling and
    /// not settling.
    pub fn grow(&mut self, policy: &GrowthPolicy, delta_angle: f32) -> GrowthStep {
        if self.state != WindingState::Filling || self.is_settling() {
            return GrowthStep::default();
        }
        policy.evaluate(&mut self.counters, delta_angle)
    }

    /// Adopt the settle countdown reported by the simulation.
    pub fn sync_settle(&mut self, remote_remaining: u32) {
        self.counters.settle_remaining = remote_remaining;
    }

    /// Record the number of appends the simulation has applied. Never
    /// exceeds what was requested.
    pub fn confirm_segments(&mut self, total: u32) {
        self.counters.segments_added = total.min(self.counters.segments_requested);
    }

    /// Every requested append has been applied by the simulation.
    pub fn growth_confirmed(&self) -> bool {
        self.counters.segments_added == self.counters.segments_requested
    }

    fn transition(&mut self, to: WindingState) -> Option<Transition> {
        let from = self.state;
        self.state = to;
        log::info!("Winding state: {from} -> {to}");
        Some(Transition { from, to })
    }
}
