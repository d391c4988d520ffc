//! Wavefront OBJ export

use crate::tube::TubeMesh;
use spool_core::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write `mesh` as OBJ text with positions, normals and texture coordinates.
pub fn write_obj<W: Write>(mesh: &TubeMesh, mut out: W) -> Result<()> {
    writeln!(out, "# spool tube: {} vertices, {} triangles", mesh.vertex_count(), mesh.triangle_count())?;
    writeln!(out, "o rope")?;
    for v in &mesh.vertices {
        writeln!(out, "v {} {} {}", v.position[0], v.position[1], v.position[2])?;
    }
    for v in &mesh.vertices {
        writeln!(out, "vn {} {} {}", v.normal[0], v.normal[1], v.normal[2])?;
    }
    for v in &mesh.vertices {
        writeln!(out, "vt {} {}", v.uv[0], v.uv[1])?;
    }
    // OBJ indices are 1-based
    for tri in mesh.indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] + 1, tri[1] + 1, tri[2] + 1];
        writeln!(out, "f {a}/{a}/{a} {b}/{b}/{b} {c}/{c}/{c}")?;
    }
    out.flush()?;
    Ok(())
}

pub fn save_obj(mesh: &TubeMesh, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    write_obj(mesh, BufWriter::new(file))?;
    log::info!("Wrote {} triangles to {}", mesh.triangle_count(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tube::{build_tube, TubeParams};
    use spool_core::Vec3;

    #[test]
    fn obj_lists_every_vertex_and_face() {
        let points = [Vec3::ZERO, Vec3::new(0.1, 0.0, 0.0), Vec3::new(0.2, 0.02, 0.0)];
        let mesh = build_tube(&points, &TubeParams::default());

        let mut buf = Vec::new();
        write_obj(&mesh, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        let count = |prefix: &str| text.lines().filter(|l| l.starts_with(prefix)).count();
        assert_eq!(count("v "), mesh.vertex_count());
        assert_eq!(count("vn "), mesh.vertex_count());
        assert_eq!(count("vt "), mesh.vertex_count());
        assert_eq!(count("f "), mesh.triangle_count());
        assert!(!text.contains(" 0/0/0"));
    }

    #[test]
    fn empty_mesh_writes_header_only() {
        let mut buf = Vec::new();
        write_obj(&TubeMesh::default(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 2);
    }
}
