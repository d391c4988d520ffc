//! OBJ export command

use anyhow::{bail, Context, Result};
use spool_runtime::{BridgeMode, CoilerController, HeadlessSurface};
use std::time::Duration;

pub struct ExportArgs {
    pub profile: String,
    pub output: String,
    pub config: Option<String>,
    pub seconds: f64,
    pub mode: BridgeMode,
}

pub fn run(args: ExportArgs) -> Result<()> {
    let catalog = super::load_catalog(args.config.as_deref())?;
    let profile = catalog.get(&args.profile)?.clone();
    let (frames, frame_time) = super::frame_plan(args.seconds, 60.0)?;

    let mut controller = CoilerController::new(catalog.settings.clone(), args.mode);
    let mut surface = HeadlessSurface::new();
    controller.select_profile(Some(profile));

    for _ in 0..frames {
        controller.tick(frame_time, &mut surface);
        if !controller.wait_for_simulation(Duration::from_secs(5)) {
            log::warn!("Simulation fell behind at frame {}", controller.frame());
        }
        if controller.is_done() {
            break;
        }
    }
    if !controller.is_done() {
        log::warn!(
            "Winding still {} after {:.0}s; exporting current shape",
            controller.state(),
            args.seconds
        );
    }

    let mesh = controller.mesh();
    if mesh.is_empty() {
        bail!("no rope geometry was produced");
    }
    spool_mesh::save_obj(mesh, &args.output)
        .with_context(|| format!("failed to write '{}'", args.output))?;

    println!(
        "Exported {} ({} segments, {} vertices, {} triangles) to {}",
        controller.state(),
        controller.counters().segments_added,
        mesh.vertex_count(),
        mesh.triangle_count(),
        args.output
    );
    Ok(())
}
