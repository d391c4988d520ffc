//! Simulation clock with fixed-timestep accumulator

use spool_core::SimSettings;

/// Longest frame accepted before clamping
const MAX_FRAME_TIME: f64 = 0.25;

/// Converts presentation time into fixed simulation sub-steps
pub struct SimClock {
    /// Total accepted presentation time in seconds
    pub total_time: f64,
    /// Fixed timestep interval (default: 1/60 second)
    pub fixed_timestep: f64,
    /// Catch-up cap per frame; excess whole steps are discarded
    pub max_substeps: u32,
    /// Accumulated time for fixed-step consumption
    accumulator: f64,
    /// Total whole steps discarded by the cap
    dropped_steps: u64,
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new(1.0 / 60.0, 4)
    }
}

impl SimClock {
    pub fn new(fixed_timestep: f64, max_substeps: u32) -> Self {
        Self {
            total_time: 0.0,
            fixed_timestep,
            max_substeps: max_substeps.max(1),
            accumulator: 0.0,
            dropped_steps: 0,
        }
    }

    pub fn from_settings(settings: &SimSettings) -> Self {
        Self::new(settings.fixed_timestep, settings.max_substeps)
    }

    /// Advance by `elapsed` seconds and return the number of fixed steps to run.
    pub fn advance(&mut self, elapsed: f64) -> u32 {
        let elapsed = if elapsed.is_finite() { elapsed.max(0.0) } else { 0.0 };
        let accepted = elapsed.min(MAX_FRAME_TIME);
        self.total_time += accepted;
        self.accumulator += accepted;

        // Small epsilon so exact multiples of the timestep are not lost to rounding.
        let due = ((self.accumulator + 1e-9) / self.fixed_timestep).floor().max(0.0) as u64;
        self.accumulator = (self.accumulator - due as f64 * self.fixed_timestep).max(0.0);

        let steps = due.min(self.max_substeps as u64);
        if due > steps {
            self.dropped_steps += due - steps;
            log::debug!("Discarded {} catch-up step(s)", due - steps);
        }
        steps as u32
    }

    pub fn dropped_steps(&self) -> u64 {
        self.dropped_steps
    }

    pub fn fixed_dt(&self) -> f32 {
        self.fixed_timestep as f32
    }
}
