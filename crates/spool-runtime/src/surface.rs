//! Rendering collaborator interface

use spool_mesh::TubeMesh;

/// Meshes the controller rotates alongside the rope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompanionMesh {
    Drum,
    GuideRings,
}

/// Receives per-tick output from the controller. Implemented by the host's
/// renderer; nothing in this crate draws.
pub trait RenderSurface {
    fn upload_tube(&mut self, mesh: &TubeMesh);

    fn set_rotation(&mut self, mesh: CompanionMesh, angle: f32);

    /// Lateral position of the feed arm along the drum axis
    fn set_feed_offset(&mut self, offset: f32);
}

/// Surface that keeps only summary statistics, for headless runs and tests.
#[derive(Debug, Clone, Default)]
pub struct HeadlessSurface {
    pub uploads: u64,
    pub last_vertex_count: usize,
    pub last_triangle_count: usize,
    pub drum_angle: f32,
    pub guide_angle: f32,
    pub feed_offset: f32,
    /// False once any uploaded mesh failed validation
    pub all_valid: bool,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self {
            all_valid: true,
            ..Self::default()
        }
    }
}

impl RenderSurface for HeadlessSurface {
    fn upload_tube(&mut self, mesh: &TubeMesh) {
        self.uploads += 1;
        self.last_vertex_count = mesh.vertex_count();
        self.last_triangle_count = mesh.triangle_count();
        self.all_valid &= mesh.is_valid();
    }

    fn set_rotation(&mut self, mesh: CompanionMesh, angle: f32) {
        match mesh {
            CompanionMesh::Drum => self.drum_angle = angle,
            CompanionMesh::GuideRings => self.guide_angle = angle,
        }
    }

    fn set_feed_offset(&mut self, offset: f32) {
        self.feed_offset = offset;
    }
}
