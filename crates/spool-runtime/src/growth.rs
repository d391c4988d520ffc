//! Segment growth policy: drum rotation in, append requests out

use crate::state::WindingCounters;
use spool_core::{CoilerProfile, SimSettings};

/// Result of one growth evaluation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GrowthStep {
    /// Segments to append this tick
    pub appends: u32,
    /// The segment budget is exhausted
    pub limit_reached: bool,
}

/// Read-only growth parameters derived from a profile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowthPolicy {
    /// Drum angle (radians) wound per appended segment
    pub segment_angle: f32,
    pub max_segments: u32,
    pub lateral_min: f32,
    pub lateral_max: f32,
    /// Appends between direction flips of the lateral weave
    pub weave_interval: u32,
}

impl GrowthPolicy {
    pub fn from_profile(profile: &CoilerProfile, settings: &SimSettings) -> Self {
        Self {
            segment_angle: profile.segment_angle(settings),
            max_segments: profile.max_segments,
            lateral_min: profile.lateral_min,
            lateral_max: profile.lateral_max,
            weave_interval: settings.weave_interval.max(1),
        }
    }

    /// Lateral travel per appended segment
    pub fn lateral_step(&self) -> f32 {
        (self.lateral_max - self.lateral_min) / self.weave_interval as f32
    }

    /// Accumulate `delta_angle` and emit one append per threshold crossing.
    /// The limit is reported in the same evaluation that reaches it.
    pub fn evaluate(&self, counters: &mut WindingCounters, delta_angle: f32) -> GrowthStep {
        if counters.segments_requested >= self.max_segments {
            return GrowthStep {
                appends: 0,
                limit_reached: true,
            };
        }
        if delta_angle.is_finite() && delta_angle > 0.0 {
            counters.angle_to_next_segment += delta_angle;
        }

        let threshold = self.segment_angle.max(f32::EPSILON);
        let mut appends = 0;
        while counters.angle_to_next_segment >= threshold
            && counters.segments_requested < self.max_segments
        {
            counters.angle_to_next_segment -= threshold;
            counters.segments_requested += 1;
            appends += 1;
            self.weave(counters);
        }

        let limit_reached = counters.segments_requested >= self.max_segments;
        if limit_reached {
            counters.angle_to_next_segment = 0.0;
        }
        GrowthStep {
            appends,
            limit_reached,
        }
    }

    fn weave(&self, counters: &mut WindingCounters) {
        counters.lateral_offset = (counters.lateral_offset
            + counters.direction * self.lateral_step())
        .clamp(self.lateral_min, self.lateral_max);

        counters.appends_since_flip += 1;
        if counters.appends_since_flip >= self.weave_interval {
            counters.direction = -counters.direction;
            counters.appends_since_flip = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max: u32) -> GrowthPolicy {
        GrowthPolicy {
            segment_angle: 0.1,
            max_segments: max,
            lateral_min: -0.05,
            lateral_max: 0.05,
            weave_interval: 10,
        }
    }

    fn counters(p: &GrowthPolicy) -> WindingCounters {
        WindingCounters::starting_at(p.lateral_min, 0)
    }

    #[test]
    fn one_append_per_threshold_crossing() {
        let p = policy(100);
        let mut c = counters(&p);
        assert_eq!(p.evaluate(&mut c, 0.05).appends, 0);
        assert_eq!(p.evaluate(&mut c, 0.06).appends, 1);
        assert_eq!(p.evaluate(&mut c, 0.35).appends, 3);
        assert_eq!(c.segments_requested, 4);
    }

    #[test]
    fn never_exceeds_max_and_reports_limit_in_same_evaluation() {
        let p = policy(5);
        let mut c = counters(&p);
        let step = p.evaluate(&mut c, 10.0);
        assert_eq!(step.appends, 5);
        assert!(step.limit_reached);

        let step = p.evaluate(&mut c, 10.0);
        assert_eq!(step.appends, 0);
        assert!(step.limit_reached);
        assert_eq!(c.segments_requested, 5);
    }

    #[test]
    fn negative_or_invalid_rotation_adds_nothing() {
        let p = policy(5);
        let mut c = counters(&p);
        assert_eq!(p.evaluate(&mut c, -1.0).appends, 0);
        assert_eq!(p.evaluate(&mut c, f32::NAN).appends, 0);
        assert_eq!(c.angle_to_next_segment, 0.0);
    }

    #[test]
    fn weave_flips_and_stays_in_bounds() {
        let p = policy(1000);
        let mut c = counters(&p);
        let mut offsets = Vec::new();
        for _ in 0..40 {
            p.evaluate(&mut c, p.segment_angle + 1e-4);
            assert!(c.lateral_offset >= p.lateral_min && c.lateral_offset <= p.lateral_max);
            offsets.push(c.lateral_offset);
        }
        // Moving up for the first interval, then back down.
        assert!((offsets[9] - p.lateral_max).abs() < 1e-5);
        assert!(offsets[15] < offsets[9]);
        assert!((offsets[19] - p.lateral_min).abs() < 1e-5);
        assert!(offsets[25] > offsets[19]);
    }

    #[test]
    fn policy_from_profile_uses_tunable_angle() {
        let settings = SimSettings::default();
        let mut profile = CoilerProfile::new("compact", 0.2, 0.18, 400);
        let p = GrowthPolicy::from_profile(&profile, &settings);
        assert!((p.segment_angle - 0.06).abs() < 1e-6);

        profile.segment_angle = Some(0.25);
        let p = GrowthPolicy::from_profile(&profile, &settings);
        assert_eq!(p.segment_angle, 0.25);
    }
}
