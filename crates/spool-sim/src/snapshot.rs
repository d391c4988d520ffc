//! Immutable per-tick particle position snapshots

use serde::{Deserialize, Serialize};
use spool_core::Vec3;

/// Ordered particle positions at one simulation tick.
///
/// Wire form: `{"positions": [{"x": .., "y": .., "z": ..}, ...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub positions: Vec<Vec3>,
}

impl Snapshot {
    pub fn new(positions: Vec<Vec3>) -> Self {
        Self { positions }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn is_finite(&self) -> bool {
        self.positions.iter().all(Vec3::is_finite)
    }

    /// Largest per-particle distance to `other`, or `None` when the particle
    /// counts differ.
    pub fn max_displacement(&self, other: &Snapshot) -> Option<f32> {
        if self.len() != other.len() {
            return None;
        }
        Some(
            self.positions
                .iter()
                .zip(&other.positions)
                .map(|(a, b)| a.distance(b))
                .fold(0.0, f32::max),
        )
    }

    /// Sum of distances between consecutive positions.
    pub fn polyline_length(&self) -> f32 {
        self.positions
            .windows(2)
            .map(|w| w[0].distance(&w[1]))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displacement_requires_equal_length() {
        let a = Snapshot::new(vec![Vec3::ZERO, Vec3::UP]);
        let b = Snapshot::new(vec![Vec3::ZERO, Vec3::new(0.0, 3.0, 0.0)]);
        assert_eq!(a.max_displacement(&b), Some(2.0));
        assert_eq!(a.max_displacement(&Snapshot::default()), None);
    }

    #[test]
    fn wire_shape() {
        let snap = Snapshot::new(vec![Vec3::new(1.0, 0.0, 0.0)]);
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["positions"][0]["x"], 1.0);
        assert_eq!(json["positions"].as_array().unwrap().len(), 1);
    }
}
