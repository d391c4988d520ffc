//! Explicit simulation state and the request handler shared by every bridge
//! mode. Nothing here is global; each context is an independent simulation.

use crate::chain::Chain;
use crate::collision::{volumes_for_profile, CollisionVolume, VolumeRole};
use crate::protocol::{SimRequest, SimResponse};
use crate::snapshot::Snapshot;
use crate::stepper::{self, StepParams};
use spool_core::spline::rotate_around_axis;
use spool_core::{CoilerProfile, Result, SimSettings, Vec3};

pub struct SimulationContext {
    settings: SimSettings,
    params: StepParams,
    chain: Option<Chain>,
    volumes: Vec<CollisionVolume>,
    /// Start anchor in the drum's unrotated frame
    start_local: Vec3,
    drum_axis: Vec3,
    epoch: u64,
    drum_angle: f32,
    rotation_speed: f32,
    settle_remaining: u32,
    segments_added: u32,
}

impl SimulationContext {
    pub fn new(settings: SimSettings) -> Self {
        let params = StepParams::from_settings(&settings);
        Self {
            settings,
            params,
            chain: None,
            volumes: Vec::new(),
            start_local: Vec3::ZERO,
            drum_axis: Vec3::FORWARD,
            epoch: 0,
            drum_angle: 0.0,
            rotation_speed: 0.0,
            settle_remaining: 0,
            segments_added: 0,
        }
    }

    /// Process one request; fire-and-forget requests and no-ops return `None`.
    pub fn handle(&mut self, request: SimRequest) -> Option<SimResponse> {
        let epoch = self.epoch;
        match request {
            SimRequest::Init => Some(SimResponse::Initialized),
            SimRequest::CreateChain { profile } => match self.create_chain(&profile) {
                Ok(snapshot) => Some(SimResponse::ChainCreated { epoch, snapshot }),
                Err(e) => {
                    log::warn!("createChain rejected: {e}");
                    Some(SimResponse::Error {
                        message: e.to_string(),
                        fatal: false,
                    })
                }
            },
            SimRequest::AppendSegment {
                profile,
                angle,
                frame,
            } => self
                .append_segment(profile.max_segments, angle, frame)
                .map(|snapshot| SimResponse::SegmentAdded { epoch, snapshot }),
            SimRequest::Step {
                dt,
                sub_steps,
                rotation_speed,
                angle,
            } => self.step(dt, sub_steps, rotation_speed, angle).map(|snapshot| {
                SimResponse::Stepped {
                    epoch,
                    snapshot,
                    delay_active: self.settle_remaining > 0,
                    delay_remaining: self.settle_remaining,
                }
            }),
            SimRequest::ResetChain => {
                self.reset();
                Some(SimResponse::ChainReset { epoch: self.epoch })
            }
            SimRequest::Finalize { max_segments } => self
                .finalize(max_segments)
                .map(|snapshot| SimResponse::Finalized { epoch, snapshot }),
            SimRequest::SetRotationSpeed { speed } => {
                self.rotation_speed = speed;
                None
            }
            SimRequest::UpdateAnchor { position } => {
                self.update_anchor(position);
                None
            }
        }
    }

    /// Build a fresh chain and guide volumes for `profile`.
    ///
    /// The result depends only on the profile and settings, never on
    /// earlier simulation history.
    pub fn create_chain(&mut self, profile: &CoilerProfile) -> Result<Snapshot> {
        profile.validate()?;

        let volumes = volumes_for_profile(profile);
        let start_local = profile.start_anchor_local(self.settings.rope_radius);
        let end = profile.feed_anchor(profile.lateral_min);
        let chain = Chain::create(self.settings.initial_segments, start_local, end, &self.settings)?;
        let snapshot = chain.snapshot();

        if self.chain.is_some() {
            log::debug!("Replacing existing chain for profile '{}'", profile.name);
        }
        log::info!(
            "Created chain for '{}': {} particles, rest length {:.3} m",
            profile.name,
            chain.len(),
            chain.rest_length_total()
        );

        self.drum_axis = profile.drum_axis();
        self.volumes = volumes;
        self.start_local = start_local;
        self.chain = Some(chain);
        self.drum_angle = 0.0;
        self.rotation_speed = 0.0;
        self.settle_remaining = self.settings.settle_ticks;
        self.segments_added = 0;
        Ok(snapshot)
    }

    /// Splice one particle next to the feed end, up to `max_segments`
    /// additions. `None` when there is no chain.
    pub fn append_segment(&mut self, max_segments: u32, angle: f32, frame: u64) -> Option<Snapshot> {
        let Some(chain) = self.chain.as_mut() else {
            log::warn!("appendSegment ignored at frame {frame}: no chain");
            return None;
        };

        if self.segments_added >= max_segments {
            log::warn!(
                "appendSegment ignored at frame {frame}: limit of {max_segments} segments reached"
            );
        } else if chain.append_segment(chain.len() - 1) {
            self.segments_added += 1;
            log::debug!(
                "Segment {} added at drum angle {angle:.3} (frame {frame})",
                self.segments_added
            );
        }
        Some(chain.snapshot())
    }

    /// Run `sub_steps` fixed steps. Rotation is held at zero while the settle
    /// delay is active. `None` when there is no chain.
    pub fn step(&mut self, dt: f32, sub_steps: u32, rotation_speed: f32, angle: f32) -> Option<Snapshot> {
        self.chain.as_ref()?;
        self.rotation_speed = rotation_speed;

        let mut settled_whole_batch = true;
        for _ in 0..sub_steps {
            let settling = self.settle_remaining > 0;
            let speed = if settling {
                settled_whole_batch = false;
                0.0
            } else {
                self.drum_angle += self.rotation_speed * dt;
                self.rotation_speed
            };
            self.sub_step(dt, speed, settling);
            self.settle_remaining = self.settle_remaining.saturating_sub(1);
        }
        if settled_whole_batch && sub_steps > 0 && angle.is_finite() {
            // The presentation side owns the drum angle; re-sync to it.
            self.drum_angle = angle;
        }

        self.chain.as_ref().map(Chain::snapshot)
    }

    fn sub_step(&mut self, dt: f32, speed: f32, settling: bool) {
        let start_world = rotate_around_axis(self.start_local, self.drum_axis, self.drum_angle);
        for volume in self.volumes.iter_mut().filter(|v| v.role == VolumeRole::Drum) {
            volume.angle = self.drum_angle;
        }

        let params = if settling {
            self.params.with_damping(self.settings.settle_damping)
        } else {
            self.params
        };

        if let Some(chain) = self.chain.as_mut() {
            chain.set_start_anchor(start_world);
            stepper::step(chain, dt, &self.volumes, speed, &params);
        }
    }

    /// Drop the chain and volumes and bump the epoch.
    pub fn reset(&mut self) {
        self.chain = None;
        self.volumes.clear();
        self.epoch += 1;
        self.drum_angle = 0.0;
        self.rotation_speed = 0.0;
        self.settle_remaining = 0;
        self.segments_added = 0;
        log::debug!("Simulation reset (epoch {})", self.epoch);
    }

    /// Freeze every particle in place. `None` when there is no chain.
    pub fn finalize(&mut self, max_segments: u32) -> Option<Snapshot> {
        let chain = self.chain.as_mut()?;
        chain.freeze();
        self.rotation_speed = 0.0;
        log::info!(
            "Finalized chain: {} particles, {} of {} segments added",
            chain.len(),
            self.segments_added,
            max_segments
        );
        Some(chain.snapshot())
    }

    pub fn update_anchor(&mut self, position: Vec3) {
        if !position.is_finite() {
            log::warn!("updateAnchor ignored: non-finite position {position:?}");
            return;
        }
        if let Some(chain) = self.chain.as_mut() {
            chain.set_moving_anchor(position);
        }
    }

    pub fn chain(&self) -> Option<&Chain> {
        self.chain.as_ref()
    }

    pub fn volumes(&self) -> &[CollisionVolume] {
        &self.volumes
    }

    pub fn settings(&self) -> &SimSettings {
        &self.settings
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn segments_added(&self) -> u32 {
        self.segments_added
    }

    pub fn settle_remaining(&self) -> u32 {
        self.settle_remaining
    }

    pub fn drum_angle(&self) -> f32 {
        self.drum_angle
    }

}
