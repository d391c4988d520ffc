//! Profile listing command

use anyhow::Result;

pub fn run(config: Option<&str>) -> Result<()> {
    let catalog = super::load_catalog(config)?;

    println!("{} profile(s):", catalog.len());
    for profile in catalog.profiles() {
        println!(
            "  {:<12} r={:.3} m  h={:.3} m  lateral=[{:+.3}, {:+.3}]  max={}  segment={:.2}°",
            profile.name,
            profile.drum_radius,
            profile.drum_height,
            profile.lateral_min,
            profile.lateral_max,
            profile.max_segments,
            profile.segment_angle(&catalog.settings).to_degrees(),
        );
    }
    Ok(())
}
