//! Presentation-side smoothing of simulation output

use spool_core::{SimSettings, Vec3};
use spool_sim::Snapshot;

/// Interpolates displayed rope points between the last applied positions and
/// the latest simulation snapshot.
pub struct SnapshotInterpolator {
    displayed: Vec<Vec3>,
    /// Positions on screen when the current target arrived
    from: Vec<Vec3>,
    target: Vec<Vec3>,
    elapsed: f32,
    fixed_dt: f32,
    max_step_delta: f32,
}

impl SnapshotInterpolator {
    pub fn new(fixed_dt: f32, max_step_delta: f32) -> Self {
        Self {
            displayed: Vec::new(),
            from: Vec::new(),
            target: Vec::new(),
            elapsed: 0.0,
            fixed_dt: fixed_dt.max(f32::EPSILON),
            max_step_delta,
        }
    }

    pub fn from_settings(settings: &SimSettings) -> Self {
        Self::new(settings.fixed_timestep as f32, settings.max_step_delta)
    }

    /// Take a new target. A length change (topology change or first
    /// snapshot) is applied immediately.
    pub fn push(&mut self, snapshot: &Snapshot) {
        if !snapshot.is_finite() {
            log::warn!("Ignoring snapshot with non-finite positions");
            return;
        }
        if snapshot.len() != self.displayed.len() {
            self.apply(snapshot);
            return;
        }
        self.from.clone_from(&self.displayed);
        self.target.clone_from(&snapshot.positions);
        self.elapsed = 0.0;
    }

    /// Replace displayed and target points without easing.
    pub fn apply(&mut self, snapshot: &Snapshot) {
        self.displayed.clone_from(&snapshot.positions);
        self.from.clone_from(&snapshot.positions);
        self.target.clone_from(&snapshot.positions);
        self.elapsed = 0.0;
    }

    /// Advance by one render tick of `dt` seconds and return the displayed points.
    pub fn advance(&mut self, dt: f32) -> &[Vec3] {
        if dt.is_finite() && dt > 0.0 {
            self.elapsed += dt;
        }
        let factor = (self.elapsed / self.fixed_dt).clamp(0.0, 1.0);

        for ((shown, &from), &target) in self.displayed.iter_mut().zip(&self.from).zip(&self.target) {
            let mut delta = from.lerp(target, factor) - *shown;
            let len = delta.length();
            if len > self.max_step_delta {
                delta = delta * (self.max_step_delta / len);
            }
            *shown += delta;
        }
        &self.displayed
    }

    pub fn displayed(&self) -> &[Vec3] {
        &self.displayed
    }

    pub fn clear(&mut self) {
        self.displayed.clear();
        self.from.clear();
        self.target.clear();
        self.elapsed = 0.0;
    }

    pub fn is_empty(&self) -> bool {
        self.displayed.is_empty()
    }
}

/// Exponential smoothing of companion-mesh angles, active only for a
/// window of render ticks after each topology change.
pub struct AngleSmoother {
    blend: f32,
    window: u32,
    remaining: u32,
    value: Option<f32>,
}

impl AngleSmoother {
    pub fn new(blend: f32, window: u32) -> Self {
        Self {
            blend: blend.clamp(0.0, 1.0),
            window,
            remaining: 0,
            value: None,
        }
    }

    pub fn from_settings(settings: &SimSettings) -> Self {
        Self::new(settings.smoothing_blend, settings.smoothing_window)
    }

    pub fn notify_topology_change(&mut self) {
        self.remaining = self.window;
    }

    pub fn is_active(&self) -> bool {
        self.remaining > 0
    }

    /// Feed the raw angle for this tick and get the value to display.
    pub fn apply(&mut self, raw: f32) -> f32 {
        let out = match self.value {
            Some(prev) if self.remaining > 0 => {
                self.remaining -= 1;
                prev + (raw - prev) * self.blend
            }
            _ => {
                self.remaining = self.remaining.saturating_sub(1);
                raw
            }
        };
        self.value = Some(out);
        out
    }

    pub fn reset(&mut self) {
        self.remaining = 0;
        self.value = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn line(n: usize, y: f32) -> Snapshot {
        Snapshot::new((0..n).map(|i| Vec3::new(i as f32 * 0.01, y, 0.0)).collect())
    }

    #[test]
    fn first_snapshot_is_applied_directly() {
        let mut interp = SnapshotInterpolator::new(DT, 0.05);
        interp.push(&line(4, 1.0));
        assert_eq!(interp.displayed(), line(4, 1.0).positions.as_slice());
    }

    #[test]
    fn eases_toward_target() {
        let mut interp = SnapshotInterpolator::new(DT, 1.0);
        interp.push(&line(4, 0.0));
        interp.push(&line(4, 0.01));

        let y = interp.advance(DT * 0.5)[0].y;
        assert!(y > 0.0 && y < 0.01);
        let y = interp.advance(DT * 0.5)[0].y;
        assert!((y - 0.01).abs() < 1e-6);
    }

    #[test]
    fn interpolation_is_linear_from_the_applied_positions() {
        let mut interp = SnapshotInterpolator::new(DT, 1.0);
        interp.push(&line(4, 0.0));
        interp.push(&line(4, 0.03));

        let y = interp.advance(DT / 3.0)[0].y;
        assert!((y - 0.01).abs() < 1e-6);
        let y = interp.advance(DT / 3.0)[0].y;
        assert!((y - 0.02).abs() < 1e-6);
    }

    #[test]
    fn snapshot_arriving_mid_interval_starts_from_shown_points() {
        let mut interp = SnapshotInterpolator::new(DT, 1.0);
        interp.push(&line(4, 0.0));
        interp.push(&line(4, 0.01));
        let halfway = interp.advance(DT * 0.5)[0].y;
        assert!((halfway - 0.005).abs() < 1e-6);

        // The next target replaces the old one; the interval restarts from
        // what is on screen, without a jump back to either snapshot.
        interp.push(&line(4, 0.035));
        assert!((interp.displayed()[0].y - halfway).abs() < 1e-9);
        let y = interp.advance(DT / 3.0)[0].y;
        assert!((y - 0.015).abs() < 1e-6);
        let y = interp.advance(DT / 3.0)[0].y;
        assert!((y - 0.025).abs() < 1e-6);
        let y = interp.advance(DT / 3.0)[0].y;
        assert!((y - 0.035).abs() < 1e-6);
    }

    #[test]
    fn step_size_is_capped() {
        let mut interp = SnapshotInterpolator::new(DT, 0.05);
        interp.push(&line(3, 0.0));
        interp.push(&line(3, 1.0));
        let y = interp.advance(DT)[1].y;
        assert!((y - 0.05).abs() < 1e-5);
    }

    #[test]
    fn length_mismatch_snaps() {
        let mut interp = SnapshotInterpolator::new(DT, 0.05);
        interp.push(&line(3, 0.0));
        interp.push(&line(4, 1.0));
        assert_eq!(interp.displayed().len(), 4);
        assert_eq!(interp.displayed()[0].y, 1.0);
    }

    #[test]
    fn non_finite_snapshot_is_ignored() {
        let mut interp = SnapshotInterpolator::new(DT, 0.05);
        interp.push(&line(2, 0.0));
        interp.push(&Snapshot::new(vec![Vec3::new(f32::NAN, 0.0, 0.0), Vec3::ZERO]));
        assert!(interp.advance(DT).iter().all(Vec3::is_finite));
    }

    #[test]
    fn angle_passes_through_outside_window() {
        let mut smoother = AngleSmoother::new(0.6, 60);
        assert_eq!(smoother.apply(1.0), 1.0);
        assert_eq!(smoother.apply(2.0), 2.0);
    }

    #[test]
    fn angle_blends_inside_window() {
        let mut smoother = AngleSmoother::new(0.6, 2);
        smoother.apply(0.0);
        smoother.notify_topology_change();
        assert!((smoother.apply(1.0) - 0.6).abs() < 1e-6);
        assert!((smoother.apply(1.0) - 0.84).abs() < 1e-6);
        assert!(!smoother.is_active());
        assert_eq!(smoother.apply(1.0), 1.0);
    }
}
