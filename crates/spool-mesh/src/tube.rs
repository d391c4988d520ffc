//! Tube sweep around a cardinal spline

use bytemuck::{Pod, Zeroable};
use spool_core::spline::{parallel_transport, sample_open_curve};
use spool_core::{SimSettings, Vec3};

/// A tube vertex with position, outward normal and UV
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct TubeVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    /// u wraps around the circumference, v is arc length along the rope
    pub uv: [f32; 2],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TubeParams {
    pub radius: f32,
    pub radial_segments: usize,
    pub samples_per_span: usize,
    pub tension: f32,
}

impl TubeParams {
    pub fn from_settings(settings: &SimSettings) -> Self {
        Self {
            radius: settings.tube_radius,
            radial_segments: settings.radial_segments,
            samples_per_span: settings.samples_per_span,
            tension: settings.tension,
        }
    }
}

impl Default for TubeParams {
    fn default() -> Self {
        Self::from_settings(&SimSettings::default())
    }
}

/// Triangle mesh of the rope, plus the sampled centreline it was swept along
#[derive(Debug, Clone, Default)]
pub struct TubeMesh {
    pub vertices: Vec<TubeVertex>,
    pub indices: Vec<u32>,
    pub centreline: Vec<Vec3>,
}

impl TubeMesh {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn ring_count(&self) -> usize {
        self.centreline.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// True when every vertex attribute is finite and every index is in range.
    pub fn is_valid(&self) -> bool {
        let count = self.vertices.len() as u32;
        self.vertices.iter().all(|v| {
            v.position.iter().chain(&v.normal).chain(&v.uv).all(|c| c.is_finite())
        }) && self.indices.iter().all(|&i| i < count)
    }
}

/// Rebuild the tube for `points`. Fewer than two usable points gives an
/// empty mesh; non-finite points are skipped.
pub fn build_tube(points: &[Vec3], params: &TubeParams) -> TubeMesh {
    let usable: Vec<Vec3> = points.iter().copied().filter(Vec3::is_finite).collect();
    if usable.len() != points.len() {
        log::warn!(
            "build_tube skipped {} non-finite point(s)",
            points.len() - usable.len()
        );
    }
    if usable.len() < 2 {
        return TubeMesh::default();
    }

    let radial = params.radial_segments.max(3);
    let samples = sample_open_curve(&usable, params.samples_per_span, params.tension);
    let frames = parallel_transport(&samples);

    // One extra vertex per ring closes the UV seam.
    let ring_size = radial + 1;
    let mut vertices = Vec::with_capacity(frames.len() * ring_size);
    let mut centreline = Vec::with_capacity(frames.len());
    let mut distance = 0.0f32;

    for (i, frame) in frames.iter().enumerate() {
        if i > 0 {
            distance += frame.position.distance(&frames[i - 1].position);
        }
        for k in 0..ring_size {
            let u = k as f32 / radial as f32;
            let angle = u * std::f32::consts::TAU;
            let offset = frame.normal * angle.cos() + frame.binormal * angle.sin();
            vertices.push(TubeVertex {
                position: (frame.position + offset * params.radius).to_array(),
                normal: offset.to_array(),
                uv: [u, distance],
            });
        }
        centreline.push(frame.position);
    }

    let rings = frames.len();
    let mut indices = Vec::with_capacity((rings - 1) * radial * 6);
    for i in 0..rings - 1 {
        let ring = (i * ring_size) as u32;
        let next = ((i + 1) * ring_size) as u32;
        for k in 0..radial as u32 {
            let v0 = ring + k;
            let v1 = ring + k + 1;
            let v2 = next + k;
            let v3 = next + k + 1;
            indices.extend_from_slice(&[v0, v2, v1]);
            indices.extend_from_slice(&[v1, v2, v3]);
        }
    }

    TubeMesh {
        vertices,
        indices,
        centreline,
    }
}
