//! Per-render-tick orchestration of the winding pipeline.
//!
//! The controller is the only owner of the [`WindingStateMachine`]. Each tick
//! it converts wall time into fixed sub-steps, drains simulation responses,
//! drives rotation and growth, forwards anchor changes, requests the next
//! step, and hands smoothed geometry to the [`RenderSurface`].
//!
//! Nothing is driven before the simulation confirms the chain. The settle
//! countdown and the segment count come from simulation responses, so the
//! worker and local transports show the same winding.

use crate::bridge::{BridgeClient, BridgeMode};
use crate::clock::SimClock;
use crate::event_bus::{EventBus, WindingEvent};
use crate::growth::GrowthPolicy;
use crate::smoothing::{AngleSmoother, SnapshotInterpolator};
use crate::state::{Transition, WindingCounters, WindingState, WindingStateMachine};
use crate::surface::{CompanionMesh, RenderSurface};
use spool_core::{CoilerProfile, SimSettings, Vec3};
use spool_mesh::{build_tube, TubeMesh, TubeParams};
use spool_sim::{SimRequest, SimResponse};
use std::time::{Duration, Instant};

/// Below this the drum counts as stopped (rad/s)
const REST_SPEED: f32 = 1e-3;

pub struct CoilerController {
    settings: SimSettings,
    clock: SimClock,
    bridge: BridgeClient,
    machine: WindingStateMachine,
    profile: Option<CoilerProfile>,
    growth: Option<GrowthPolicy>,
    interpolator: SnapshotInterpolator,
    angle_smoother: AngleSmoother,
    tube_params: TubeParams,
    events: EventBus,
    anchor_override: Option<Vec3>,
    sent_anchor: Option<Vec3>,
    /// Current eased drum speed (rad/s)
    speed: f32,
    frame: u64,
    particles: usize,
    /// The simulation has created the chain for the active profile
    chain_ready: bool,
    /// Particle count of the freshly created chain
    base_particles: usize,
    mesh: TubeMesh,
    geometry_attached: bool,
    final_snapshot_ready: bool,
    trace: Option<Vec<SimResponse>>,
}

impl CoilerController {
    pub fn new(settings: SimSettings, mode: BridgeMode) -> Self {
        let bridge = BridgeClient::connect(mode, &settings);
        Self::with_bridge(settings, bridge)
    }

    pub fn with_bridge(settings: SimSettings, bridge: BridgeClient) -> Self {
        log::info!("Winding controller using {} simulation", bridge.mode());
        Self {
            clock: SimClock::from_settings(&settings),
            interpolator: SnapshotInterpolator::from_settings(&settings),
            angle_smoother: AngleSmoother::from_settings(&settings),
            tube_params: TubeParams::from_settings(&settings),
            settings,
            bridge,
            machine: WindingStateMachine::new(),
            profile: None,
            growth: None,
            events: EventBus::new(),
            anchor_override: None,
            sent_anchor: None,
            speed: 0.0,
            frame: 0,
            particles: 0,
            chain_ready: false,
            base_particles: 0,
            mesh: TubeMesh::default(),
            geometry_attached: false,
            final_snapshot_ready: false,
            trace: None,
        }
    }

    /// Switch to `profile`, or clear the selection with `None`. Always passes
    /// through `Idle`; an invalid profile leaves the machine there.
    pub fn select_profile(&mut self, profile: Option<CoilerProfile>) {
        self.reset();
        let Some(profile) = profile else {
            return;
        };

        let Some(transition) = self.machine.start(&profile, self.settings.settle_ticks) else {
            log::warn!("Profile '{}' not started; staying idle", profile.name);
            return;
        };
        self.emit_transition(transition);

        log::info!(
            "Winding '{}' (r={} m, h={} m, max {} segments)",
            profile.name,
            profile.drum_radius,
            profile.drum_height,
            profile.max_segments
        );
        self.growth = Some(GrowthPolicy::from_profile(&profile, &self.settings));
        self.bridge.request(SimRequest::CreateChain {
            profile: profile.clone(),
        });
        self.profile = Some(profile);
        self.geometry_attached = true;
    }

    /// Return to `Idle` and drop the simulated chain.
    pub fn reset(&mut self) {
        let had_chain = self.machine.state() != WindingState::Idle;
        if let Some(transition) = self.machine.reset() {
            self.emit_transition(transition);
        }
        if had_chain {
            self.bridge.request(SimRequest::ResetChain);
        }

        self.profile = None;
        self.growth = None;
        self.interpolator.clear();
        self.angle_smoother.reset();
        self.mesh = TubeMesh::default();
        self.sent_anchor = None;
        self.speed = 0.0;
        self.particles = 0;
        self.chain_ready = false;
        self.base_particles = 0;
        self.geometry_attached = false;
        self.final_snapshot_ready = false;
    }

    /// Pin the feed end to an externally driven position.
    pub fn set_anchor(&mut self, position: Vec3) {
        self.anchor_override = Some(position);
    }

    /// Go back to the feed-arm position derived from the profile.
    pub fn clear_anchor(&mut self) {
        self.anchor_override = None;
    }

    /// Run one render tick covering `elapsed` seconds of wall time.
    pub fn tick(&mut self, elapsed: f64, surface: &mut dyn RenderSurface) {
        self.frame += 1;
        let sub_steps = self.clock.advance(elapsed);
        self.process_responses();

        let state = self.machine.state();
        if state == WindingState::Idle {
            return;
        }
        if state != WindingState::Finalized {
            self.drive(sub_steps);
        }
        self.present(elapsed as f32, surface);
    }

    /// Block until the simulation has answered everything the winding
    /// depends on, or `timeout` passes. For headless runs that tick faster
    /// than real time; returns whether the simulation caught up.
    pub fn wait_for_simulation(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.process_responses();
            if self.is_caught_up() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_micros(200));
        }
    }

    /// No held requests, the chain exists, every append is confirmed, and a
    /// requested finalize has been answered.
    pub fn is_caught_up(&self) -> bool {
        let state = self.machine.state();
        if state == WindingState::Idle {
            return self.bridge.queued() == 0;
        }
        self.bridge.queued() == 0
            && self.chain_ready
            && self.machine.growth_confirmed()
            && (state != WindingState::Finalized || self.final_snapshot_ready)
    }

    fn drive(&mut self, sub_steps: u32) {
        if !self.chain_ready {
            return;
        }
        let Some(profile) = self.profile.clone() else {
            return;
        };
        let step_time = sub_steps as f32 * self.clock.fixed_dt();

        // Rotation: held during settle, eased toward target otherwise.
        let target = match self.machine.state() {
            WindingState::Filling => profile.rotation_speed(&self.settings),
            _ => 0.0,
        };
        if self.machine.is_settling() {
            self.speed = 0.0;
        } else {
            let k = (self.settings.rotation_ease * step_time).clamp(0.0, 1.0);
            self.speed += (target - self.speed) * k;
            if target == 0.0 && self.speed.abs() < REST_SPEED {
                self.speed = 0.0;
            }
        }
        let delta = self.speed * step_time;
        self.machine.advance_rotation(delta);

        if let Some(policy) = self.growth {
            let growth = self.machine.grow(&policy, delta);
            for _ in 0..growth.appends {
                self.bridge.request(SimRequest::AppendSegment {
                    profile: profile.clone(),
                    angle: self.machine.counters().rotation,
                    frame: self.frame,
                });
            }
            if growth.limit_reached {
                if let Some(transition) = self.machine.reach_limit() {
                    self.emit_transition(transition);
                    self.events.push(WindingEvent::LimitReached {
                        segments: self.machine.counters().segments_requested,
                    });
                }
            }
        }

        let anchor = self
            .anchor_override
            .unwrap_or_else(|| profile.feed_anchor(self.machine.counters().lateral_offset));
        if self.sent_anchor != Some(anchor) {
            self.bridge.request(SimRequest::UpdateAnchor { position: anchor });
            self.sent_anchor = Some(anchor);
        }

        if sub_steps > 0 {
            self.bridge.request(SimRequest::Step {
                dt: self.clock.fixed_dt(),
                sub_steps,
                rotation_speed: self.speed,
                angle: self.machine.counters().rotation,
            });
        }

        if self.machine.state() == WindingState::LimitReached
            && self.speed == 0.0
            && self.machine.growth_confirmed()
        {
            // One-time cleanup: stop, freeze, detach geometry after the final snapshot.
            self.bridge.request(SimRequest::SetRotationSpeed { speed: 0.0 });
            self.bridge.request(SimRequest::Finalize {
                max_segments: profile.max_segments,
            });
            if let Some(transition) = self.machine.finalize() {
                self.emit_transition(transition);
            }
        }
    }

    fn present(&mut self, dt: f32, surface: &mut dyn RenderSurface) {
        let counters = *self.machine.counters();
        let angle = self.angle_smoother.apply(counters.rotation);
        surface.set_rotation(CompanionMesh::Drum, angle);
        surface.set_rotation(CompanionMesh::GuideRings, angle);
        surface.set_feed_offset(counters.lateral_offset);

        if !self.geometry_attached {
            return;
        }
        let points = self.interpolator.advance(dt);
        if points.len() < 2 {
            return;
        }
        self.mesh = build_tube(points, &self.tube_params);
        surface.upload_tube(&self.mesh);

        if self.final_snapshot_ready {
            self.geometry_attached = false;
            log::info!(
                "Geometry detached: {} particles, {} triangles",
                self.particles,
                self.mesh.triangle_count()
            );
        }
    }

    fn process_responses(&mut self) {
        for response in self.bridge.poll() {
            if let Some(trace) = self.trace.as_mut() {
                trace.push(response.clone());
            }
            match response {
                SimResponse::Initialized | SimResponse::ChainReset { .. } => {}
                SimResponse::ChainCreated { snapshot, .. } => {
                    self.chain_ready = true;
                    self.base_particles = snapshot.len();
                    self.particles = snapshot.len();
                    self.interpolator.apply(&snapshot);
                    self.angle_smoother.notify_topology_change();
                    self.events.push(WindingEvent::ChainCreated {
                        particles: snapshot.len(),
                    });
                }
                SimResponse::SegmentAdded { snapshot, .. } => {
                    if snapshot.len() != self.particles {
                        self.angle_smoother.notify_topology_change();
                    }
                    self.particles = snapshot.len();
                    self.interpolator.push(&snapshot);

                    let total = snapshot.len().saturating_sub(self.base_particles) as u32;
                    if total > self.machine.counters().segments_added {
                        self.machine.confirm_segments(total);
                        self.events.push(WindingEvent::SegmentAdded {
                            total: self.machine.counters().segments_added,
                        });
                    }
                }
                SimResponse::Stepped {
                    snapshot,
                    delay_remaining,
                    ..
                } => {
                    self.machine.sync_settle(delay_remaining);
                    if !self.final_snapshot_ready {
                        self.interpolator.push(&snapshot);
                    }
                }
                SimResponse::Finalized { snapshot, .. } => {
                    self.particles = snapshot.len();
                    self.interpolator.apply(&snapshot);
                    self.final_snapshot_ready = true;
                    self.events.push(WindingEvent::Finalized {
                        particles: snapshot.len(),
                    });
                }
                SimResponse::Error { message, fatal } => {
                    self.events.push(WindingEvent::BridgeFault {
                        message: message.clone(),
                        fatal,
                    });
                    if fatal {
                        log::error!("Simulation fault: {message}");
                        self.rebuild_after_fault();
                        return;
                    }
                    log::warn!("Simulation error: {message}");
                }
            }
        }
    }

    /// The bridge is now local and empty; start the active profile again.
    fn rebuild_after_fault(&mut self) {
        let profile = self.profile.clone();
        if let Some(p) = &profile {
            log::info!("Re-creating chain for '{}' after bridge fault", p.name);
        }
        self.select_profile(profile);
    }

    fn emit_transition(&mut self, transition: Transition) {
        self.events.push(WindingEvent::StateChanged {
            from: transition.from,
            to: transition.to,
        });
    }

    pub fn state(&self) -> WindingState {
        self.machine.state()
    }

    pub fn counters(&self) -> &WindingCounters {
        self.machine.counters()
    }

    pub fn profile(&self) -> Option<&CoilerProfile> {
        self.profile.as_ref()
    }

    pub fn settings(&self) -> &SimSettings {
        &self.settings
    }

    pub fn mesh(&self) -> &TubeMesh {
        &self.mesh
    }

    pub fn displayed_points(&self) -> &[Vec3] {
        self.interpolator.displayed()
    }

    /// Particle count of the latest accepted snapshot
    pub fn particles(&self) -> usize {
        self.particles
    }

    pub fn rotation_speed(&self) -> f32 {
        self.speed
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Presentation time accepted by the clock (seconds)
    pub fn elapsed(&self) -> f64 {
        self.clock.total_time
    }

    pub fn bridge_mode(&self) -> BridgeMode {
        self.bridge.mode()
    }

    /// True once finalized and the last geometry has been handed out.
    pub fn is_done(&self) -> bool {
        self.machine.state() == WindingState::Finalized && !self.geometry_attached
    }

    pub fn drain_events(&mut self) -> Vec<WindingEvent> {
        self.events.drain()
    }

    /// Start recording every accepted response.
    pub fn enable_trace(&mut self) {
        self.trace.get_or_insert_with(Vec::new);
    }

    pub fn take_trace(&mut self) -> Vec<SimResponse> {
        self.trace.as_mut().map(std::mem::take).unwrap_or_default()
    }
}
