//! Pure curve math: cardinal spline sampling with parallel-transport frames.
//!
//! Fits an interpolating open curve through an ordered point list and
//! produces evenly-parameterized samples with position and unit tangent,
//! then sweeps a rotation-minimizing frame (tangent, normal, binormal) along
//! them. Degenerate tangents reuse the neighbouring direction so that no NaN
//! ever leaves this module.

use crate::Vec3;

/// Tangents shorter than this are treated as degenerate.
const MIN_TANGENT: f32 = 1e-7;

/// A sampled point along the curve.
#[derive(Debug, Clone, Copy)]
pub struct CurveSample {
    pub position: Vec3,
    /// Unit tangent
    pub tangent: Vec3,
    /// Parametric t in [0, 1] along the whole curve.
    pub t: f32,
}

/// An orthonormal frame attached to a curve sample.
#[derive(Debug, Clone, Copy)]
pub struct CurveFrame {
    pub position: Vec3,
    pub tangent: Vec3,
    pub normal: Vec3,
    pub binormal: Vec3,
}

/// Cardinal spline point between `p1` and `p2`.
///
/// Tangents are `tension * (p2 - p0)` and `tension * (p3 - p1)`; a tension of
/// 0.5 gives the classic Catmull-Rom curve, smaller values pull the curve
/// tighter toward the control polygon.
pub fn cardinal_point(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3, tension: f32, t: f32) -> Vec3 {
    let m1 = (p2 - p0) * tension;
    let m2 = (p3 - p1) * tension;
    let t2 = t * t;
    let t3 = t2 * t;
    p1 * (2.0 * t3 - 3.0 * t2 + 1.0)
        + m1 * (t3 - 2.0 * t2 + t)
        + p2 * (-2.0 * t3 + 3.0 * t2)
        + m2 * (t3 - t2)
}

/// Derivative of [`cardinal_point`] with respect to `t`.
pub fn cardinal_derivative(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3, tension: f32, t: f32) -> Vec3 {
    let m1 = (p2 - p0) * tension;
    let m2 = (p3 - p1) * tension;
    let t2 = t * t;
    p1 * (6.0 * t2 - 6.0 * t)
        + m1 * (3.0 * t2 - 4.0 * t + 1.0)
        + p2 * (-6.0 * t2 + 6.0 * t)
        + m2 * (3.0 * t2 - 2.0 * t)
}

/// Rotate a vector around a unit axis by an angle in radians (Rodrigues' formula).
pub fn rotate_around_axis(v: Vec3, axis: Vec3, angle: f32) -> Vec3 {
    let cos_a = angle.cos();
    let sin_a = angle.sin();
    let dot = v.dot(&axis);
    let cross = axis.cross(&v);
    v * cos_a + cross * sin_a + axis * (dot * (1.0 - cos_a))
}

/// Sample an open cardinal spline through `points`, `samples_per_span`
/// samples per span plus the final endpoint.
///
/// Phantom control points are created by reflecting the first and last
/// segments outward. Returns an empty list for fewer than 2 points.
pub fn sample_open_curve(points: &[Vec3], samples_per_span: usize, tension: f32) -> Vec<CurveSample> {
    let n = points.len();
    if n < 2 {
        return Vec::new();
    }
    let samples_per_span = samples_per_span.max(1);

    let phantom_start = points[0] * 2.0 - points[1];
    let phantom_end = points[n - 1] * 2.0 - points[n - 2];
    let control = |i: isize| -> Vec3 {
        if i < 0 {
            phantom_start
        } else if i as usize >= n {
            phantom_end
        } else {
            points[i as usize]
        }
    };

    let num_spans = n - 1;
    let total = num_spans * samples_per_span + 1;
    let mut positions = Vec::with_capacity(total);
    let mut raw_tangents = Vec::with_capacity(total);

    for i in 0..total {
        let (span, local_t) = if i == total - 1 {
            (num_spans - 1, 1.0)
        } else {
            (i / samples_per_span, (i % samples_per_span) as f32 / samples_per_span as f32)
        };
        let s = span as isize;
        let (p0, p1, p2, p3) = (control(s - 1), control(s), control(s + 1), control(s + 2));
        positions.push(cardinal_point(p0, p1, p2, p3, tension, local_t));
        raw_tangents.push(cardinal_derivative(p0, p1, p2, p3, tension, local_t));
    }

    let tangents = fill_degenerate_tangents(&raw_tangents, &positions);

    positions
        .into_iter()
        .zip(tangents)
        .enumerate()
        .map(|(i, (position, tangent))| CurveSample {
            position,
            tangent,
            t: i as f32 / (total - 1) as f32,
        })
        .collect()
}

/// Normalize tangents, replacing degenerate ones with the previous good
/// direction (or the first good one for a degenerate prefix).
fn fill_degenerate_tangents(raw: &[Vec3], positions: &[Vec3]) -> Vec<Vec3> {
    let normalized: Vec<Option<Vec3>> = raw.iter().map(|t| t.try_normalized(MIN_TANGENT)).collect();

    let first_good = normalized
        .iter()
        .flatten()
        .next()
        .copied()
        .or_else(|| {
            // Every derivative vanished; fall back to the overall chord.
            let chord = *positions.last()? - *positions.first()?;
            chord.try_normalized(MIN_TANGENT)
        })
        .unwrap_or(Vec3::RIGHT);

    let mut last = first_good;
    normalized
        .into_iter()
        .map(|t| {
            if let Some(t) = t {
                last = t;
            }
            last
        })
        .collect()
}

/// Sweep a rotation-minimizing frame along the samples.
///
/// The first normal is world-up projected onto the plane orthogonal to the
/// first tangent; each later normal is the previous one rotated by the minimal
/// rotation taking the previous tangent onto the current one.
pub fn parallel_transport(samples: &[CurveSample]) -> Vec<CurveFrame> {
    let mut frames: Vec<CurveFrame> = Vec::with_capacity(samples.len());

    for sample in samples {
        let tangent = sample.tangent;
        let normal = match frames.last() {
            None => (Vec3::UP - tangent * tangent.dot(&Vec3::UP))
                .try_normalized(1e-4)
                .unwrap_or_else(|| tangent.any_orthogonal()),
            Some(prev) => {
                let axis = prev.tangent.cross(&tangent);
                let carried = match axis.try_normalized(MIN_TANGENT) {
                    Some(axis) => {
                        let angle = prev.tangent.dot(&tangent).clamp(-1.0, 1.0).acos();
                        rotate_around_axis(prev.normal, axis, angle)
                    }
                    None => prev.normal,
                };
                // Re-orthogonalize against drift; fall back to the previous axis.
                (carried - tangent * tangent.dot(&carried))
                    .try_normalized(MIN_TANGENT)
                    .unwrap_or(prev.normal)
            }
        };
        let binormal = tangent.cross(&normal).normalized();

        frames.push(CurveFrame {
            position: sample.position,
            tangent,
            normal,
            binormal,
        });
    }

    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arc(n: usize) -> Vec<Vec3> {
        (0..n)
            .map(|i| {
                let a = i as f32 / (n - 1) as f32 * std::f32::consts::PI;
                Vec3::new(a.cos(), a.sin(), i as f32 * 0.05)
            })
            .collect()
    }

    #[test]
    fn open_curve_interpolates_control_points() {
        let pts = arc(6);
        let samples = sample_open_curve(&pts, 4, 0.1);
        assert_eq!(samples.len(), 5 * 4 + 1);
        for (i, p) in pts.iter().enumerate() {
            assert!((samples[i * 4].position - *p).length() < 1e-5);
        }
        assert!(samples.first().unwrap().t.abs() < 1e-6);
        assert!((samples.last().unwrap().t - 1.0).abs() < 1e-6);
    }

    #[test]
    fn too_few_points_returns_empty() {
        assert!(sample_open_curve(&[Vec3::ZERO], 4, 0.1).is_empty());
        assert!(sample_open_curve(&[], 4, 0.1).is_empty());
    }

    #[test]
    fn coincident_points_do_not_produce_nan() {
        let p = Vec3::new(1.0, 2.0, 3.0);
        let samples = sample_open_curve(&[p, p, p], 4, 0.1);
        assert!(!samples.is_empty());
        for frame in parallel_transport(&samples) {
            assert!(frame.tangent.is_finite());
            assert!(frame.normal.is_finite());
            assert!(frame.binormal.is_finite());
        }
    }

    #[test]
    fn duplicate_point_in_middle_reuses_previous_tangent() {
        let pts = vec![
            Vec3::ZERO,
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
        ];
        let samples = sample_open_curve(&pts, 3, 0.1);
        for s in &samples {
            assert!(s.tangent.is_finite());
            assert!((s.tangent.length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn frames_are_orthonormal() {
        let samples = sample_open_curve(&arc(12), 4, 0.1);
        let frames = parallel_transport(&samples);
        assert_eq!(frames.len(), samples.len());
        for f in &frames {
            assert!(f.tangent.dot(&f.normal).abs() < 1e-3);
            assert!(f.tangent.dot(&f.binormal).abs() < 1e-3);
            assert!((f.normal.length() - 1.0).abs() < 1e-3);
            assert!((f.binormal.length() - 1.0).abs() < 1e-3);
        }
    }

    #[test]
    fn straight_line_frames_do_not_twist() {
        let pts: Vec<Vec3> = (0..5).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect();
        let frames = parallel_transport(&sample_open_curve(&pts, 2, 0.1));
        let first = frames[0].normal;
        for f in &frames {
            assert!((f.normal - first).length() < 1e-5);
        }
    }

    #[test]
    fn rotate_quarter_turn() {
        let v = rotate_around_axis(Vec3::RIGHT, Vec3::FORWARD, std::f32::consts::FRAC_PI_2);
        assert!((v - Vec3::UP).length() < 1e-6);
    }
}
