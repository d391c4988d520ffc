//! Headless simulation command

use anyhow::{Context, Result};
use spool_runtime::{BridgeMode, CoilerController, HeadlessSurface, WindingEvent};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::time::Duration;

/// Longest wait per frame for the simulation in non-realtime runs
const SIM_WAIT: Duration = Duration::from_secs(5);

pub struct SimulateArgs {
    pub profile: String,
    pub config: Option<String>,
    pub seconds: f64,
    pub fps: f64,
    pub mode: BridgeMode,
    pub realtime: bool,
    pub trace: Option<String>,
}

pub fn run(args: SimulateArgs) -> Result<()> {
    let catalog = super::load_catalog(args.config.as_deref())?;
    let profile = catalog.get(&args.profile)?.clone();
    let (frames, frame_time) = super::frame_plan(args.seconds, args.fps)?;

    let mut trace = match &args.trace {
        Some(path) => Some(BufWriter::new(
            File::create(path).with_context(|| format!("failed to create trace file '{path}'"))?,
        )),
        None => None,
    };

    let mut controller = CoilerController::new(catalog.settings.clone(), args.mode);
    if trace.is_some() {
        controller.enable_trace();
    }
    let mut surface = HeadlessSurface::new();

    println!(
        "Simulating '{}' for {:.1}s at {} fps ({} bridge)",
        profile.name,
        args.seconds,
        args.fps,
        controller.bridge_mode()
    );
    controller.select_profile(Some(profile));

    let mut faults = 0;
    for frame in 0..frames {
        controller.tick(frame_time, &mut surface);
        if !args.realtime && !controller.wait_for_simulation(SIM_WAIT) {
            log::warn!("Simulation fell behind at frame {frame}");
        }

        for event in controller.drain_events() {
            match &event {
                WindingEvent::StateChanged { from, to } => {
                    println!("  [{:>7.2}s] {from} -> {to}", frame as f64 * frame_time);
                }
                WindingEvent::LimitReached { segments } => {
                    println!("  [{:>7.2}s] limit reached at {segments} segments", frame as f64 * frame_time);
                }
                WindingEvent::BridgeFault { message, fatal } => {
                    faults += 1;
                    println!("  bridge fault (fatal: {fatal}): {message}");
                }
                _ => {}
            }
        }

        if let Some(out) = trace.as_mut() {
            for response in controller.take_trace() {
                writeln!(out, "{}", spool_sim::protocol::encode(&response)?)?;
            }
        }

        if controller.is_done() {
            break;
        }
        if args.realtime {
            std::thread::sleep(Duration::from_secs_f64(frame_time));
        }
    }
    if let Some(mut out) = trace {
        out.flush()?;
    }

    let counters = controller.counters();
    println!();
    println!("State:      {}", controller.state());
    println!("Frames:     {}", controller.frame());
    println!("Sim time:   {:.2}s", controller.elapsed());
    println!("Segments:   {}", counters.segments_added);
    println!("Particles:  {}", controller.particles());
    println!("Drum angle: {:.2} rad", counters.rotation);
    println!(
        "Tube:       {} vertices, {} triangles ({} uploads)",
        surface.last_vertex_count, surface.last_triangle_count, surface.uploads
    );
    if faults > 0 {
        println!("Faults:     {faults}");
    }
    if let Some(path) = &args.trace {
        println!("Trace:      {path}");
    }
    Ok(())
}
