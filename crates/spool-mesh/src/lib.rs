//! Spool Mesh - tube geometry rebuilt from rope snapshots
//!
//! A smooth cardinal curve is fitted through the snapshot points, framed
//! with parallel transport, and swept into a fixed-radius tube.

pub mod obj;
pub mod tube;

pub use obj::{save_obj, write_obj};
pub use tube::{build_tube, TubeMesh, TubeParams, TubeVertex};
