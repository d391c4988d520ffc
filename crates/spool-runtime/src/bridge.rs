//! Message bridge between the presentation loop and the simulation.
//!
//! Two interchangeable transports implement [`SimBridge`]:
//! - [`WorkerBridge`] runs a [`SimulationContext`] on its own thread behind
//!   bounded crossbeam channels.
//! - [`LocalBridge`] calls the same context synchronously.
//!
//! [`BridgeClient`] sits on top of either one and owns the presentation-side
//! protocol rules: holding requests in order until the `Initialized`
//! handshake and while the worker queue is full, dropping responses from
//! before the latest reset, and switching permanently to the local transport
//! after a fatal worker fault.

use crossbeam::channel::{self, Receiver, Sender, TryRecvError, TrySendError};
use spool_core::{Result, SimSettings, SpoolError};
use spool_sim::{SimRequest, SimResponse, SimulationContext};
use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use std::thread::{self, JoinHandle};

/// Capacity of each direction of the worker channels
pub const CHANNEL_CAPACITY: usize = 256;

/// Requests a [`BridgeClient`] may hold before the transport accepts them.
/// Overflowing it is treated as a dead worker.
pub const MAX_QUEUED: usize = CHANNEL_CAPACITY * 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeMode {
    Worker,
    Local,
}

impl fmt::Display for BridgeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeMode::Worker => f.write_str("worker"),
            BridgeMode::Local => f.write_str("local"),
        }
    }
}

impl FromStr for BridgeMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "worker" => Ok(BridgeMode::Worker),
            "local" => Ok(BridgeMode::Local),
            other => Err(format!("unknown bridge mode '{other}' (expected worker or local)")),
        }
    }
}

/// Transport for simulation requests and responses. Neither method blocks.
pub trait SimBridge {
    /// Hand a request to the simulation. A full or closed queue gives the
    /// request back so the caller can keep it.
    fn send(&mut self, request: SimRequest) -> std::result::Result<(), TrySendError<SimRequest>>;

    /// Drain every response that is ready.
    fn poll(&mut self) -> Vec<SimResponse>;

    fn mode(&self) -> BridgeMode;
}

/// Synchronous transport: requests are handled as they are sent.
pub struct LocalBridge {
    context: SimulationContext,
    outbox: VecDeque<SimResponse>,
}

impl LocalBridge {
    pub fn new(settings: SimSettings) -> Self {
        Self {
            context: SimulationContext::new(settings),
            outbox: VecDeque::new(),
        }
    }

    pub fn context(&self) -> &SimulationContext {
        &self.context
    }
}

impl SimBridge for LocalBridge {
    fn send(&mut self, request: SimRequest) -> std::result::Result<(), TrySendError<SimRequest>> {
        if let Some(response) = self.context.handle(request) {
            self.outbox.push_back(response);
        }
        Ok(())
    }

    fn poll(&mut self) -> Vec<SimResponse> {
        self.outbox.drain(..).collect()
    }

    fn mode(&self) -> BridgeMode {
        BridgeMode::Local
    }
}

/// Transport to a simulation thread over bounded channels.
pub struct WorkerBridge {
    requests: Option<Sender<SimRequest>>,
    responses: Receiver<SimResponse>,
    handle: Option<JoinHandle<()>>,
    alive: bool,
}

impl WorkerBridge {
    pub fn spawn(settings: SimSettings) -> Result<Self> {
        let (request_tx, request_rx) = channel::bounded(CHANNEL_CAPACITY);
        let (response_tx, response_rx) = channel::bounded(CHANNEL_CAPACITY);

        let handle = thread::Builder::new()
            .name("spool-sim".into())
            .spawn(move || run_worker(SimulationContext::new(settings), request_rx, response_tx))
            .map_err(|e| SpoolError::BridgeError(format!("failed to spawn simulation thread: {e}")))?;

        log::debug!("Simulation worker started");
        Ok(Self {
            requests: Some(request_tx),
            responses: response_rx,
            handle: Some(handle),
            alive: true,
        })
    }

    /// False once `poll` has seen the worker disconnect.
    pub fn is_alive(&self) -> bool {
        self.alive
    }
}

impl SimBridge for WorkerBridge {
    fn send(&mut self, request: SimRequest) -> std::result::Result<(), TrySendError<SimRequest>> {
        match self.requests.as_ref() {
            Some(tx) => tx.try_send(request),
            None => Err(TrySendError::Disconnected(request)),
        }
    }

    fn poll(&mut self) -> Vec<SimResponse> {
        let mut out = Vec::new();
        loop {
            match self.responses.try_recv() {
                Ok(response) => out.push(response),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.alive {
                        self.alive = false;
                        out.push(SimResponse::Error {
                            message: "simulation worker disconnected".into(),
                            fatal: true,
                        });
                    }
                    break;
                }
            }
        }
        out
    }

    fn mode(&self) -> BridgeMode {
        BridgeMode::Worker
    }
}

impl Drop for WorkerBridge {
    fn drop(&mut self) {
        // Closing both channels ends the worker loop even if it is blocked
        // on a full response queue.
        self.requests.take();
        drop(std::mem::replace(&mut self.responses, channel::never()));
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Simulation worker panicked during shutdown");
            }
        }
    }
}

fn run_worker(
    mut context: SimulationContext,
    requests: Receiver<SimRequest>,
    responses: Sender<SimResponse>,
) {
    while let Ok(first) = requests.recv() {
        let mut batch = vec![first];
        batch.extend(requests.try_iter());

        // Work queued ahead of the last reset in this batch is obsolete.
        let last_reset = batch
            .iter()
            .rposition(|r| matches!(r, SimRequest::ResetChain));

        for (i, request) in batch.into_iter().enumerate() {
            if last_reset.is_some_and(|reset| i < reset) && request.is_cancellable() {
                log::debug!("Dropping {} queued before reset", request.kind());
                continue;
            }

            let kind = request.kind();
            let response = match panic::catch_unwind(AssertUnwindSafe(|| context.handle(request))) {
                Ok(response) => response,
                Err(payload) => {
                    let message = format!("{kind} panicked: {}", panic_message(payload.as_ref()));
                    log::error!("Simulation worker stopping: {message}");
                    let _ = responses.send(SimResponse::Error {
                        message,
                        fatal: true,
                    });
                    return;
                }
            };

            if let Some(response) = response {
                if responses.send(response).is_err() {
                    log::debug!("Response channel closed; simulation worker exiting");
                    return;
                }
            }
        }
    }
    log::debug!("Simulation worker stopped");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Open a transport in `mode`. A worker that cannot be started falls back
/// to the local transport.
pub fn connect(mode: BridgeMode, settings: &SimSettings) -> Box<dyn SimBridge + Send> {
    match mode {
        BridgeMode::Local => Box::new(LocalBridge::new(settings.clone())),
        BridgeMode::Worker => match WorkerBridge::spawn(settings.clone()) {
            Ok(worker) => Box::new(worker),
            Err(e) => {
                log::warn!("{e}; using local simulation");
                Box::new(LocalBridge::new(settings.clone()))
            }
        },
    }
}

/// Presentation-side endpoint of the bridge.
pub struct BridgeClient {
    bridge: Box<dyn SimBridge + Send>,
    settings: SimSettings,
    /// Requests the transport has not accepted yet, oldest first
    outbox: VecDeque<SimRequest>,
    ready: bool,
    /// Resets issued so far; responses tagged with an older epoch are stale.
    /// A reset stays in the outbox until the transport takes it, so the
    /// simulation always catches up with this count.
    resets: u64,
    /// Presentation-side fault, reported by the next `poll`
    fault: Option<String>,
    fell_back: bool,
}

impl BridgeClient {
    pub fn connect(mode: BridgeMode, settings: &SimSettings) -> Self {
        Self::with_bridge(connect(mode, settings), settings)
    }

    pub fn with_bridge(bridge: Box<dyn SimBridge + Send>, settings: &SimSettings) -> Self {
        let mut client = Self {
            bridge,
            settings: settings.clone(),
            outbox: VecDeque::new(),
            ready: false,
            resets: 0,
            fault: None,
            fell_back: false,
        };
        client.handshake();
        client
    }

    pub fn mode(&self) -> BridgeMode {
        self.bridge.mode()
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// True once a fatal worker fault forced the local transport.
    pub fn fell_back(&self) -> bool {
        self.fell_back
    }

    /// Requests held until the handshake completes or the transport has room.
    pub fn queued(&self) -> usize {
        self.outbox.len()
    }

    /// Send `request` in order after everything already held. Nothing is
    /// dropped: a busy transport keeps it for the next flush, and repeated
    /// steps, anchor moves and speed changes are folded into one request.
    pub fn request(&mut self, request: SimRequest) {
        if matches!(request, SimRequest::ResetChain) {
            self.resets += 1;
            // Held chain work is obsolete once a reset is queued behind it.
            self.outbox.retain(|r| !r.is_cancellable());
        }
        self.enqueue(request);
        self.flush();
    }

    /// Drain fresh responses. Stale ones are dropped; a fatal error switches
    /// to the local transport and is passed on so the caller can rebuild.
    pub fn poll(&mut self) -> Vec<SimResponse> {
        if let Some(message) = self.fault.take() {
            return vec![SimResponse::Error {
                message,
                fatal: true,
            }];
        }

        let mut out = Vec::new();
        for response in self.bridge.poll() {
            match response {
                SimResponse::Initialized => {
                    self.ready = true;
                    self.flush();
                }
                SimResponse::Error { fatal: true, .. } => {
                    self.fall_back();
                    out.push(response);
                    return out;
                }
                response if response.epoch().is_some_and(|e| e < self.resets) => {
                    log::trace!("Dropping stale {} response", response.kind());
                }
                response => out.push(response),
            }
        }
        self.flush();
        out
    }

    fn enqueue(&mut self, request: SimRequest) {
        let max_substeps = self.settings.max_substeps;
        if let Some(last) = self.outbox.back_mut() {
            if coalesce(last, &request, max_substeps) {
                return;
            }
        }
        if self.outbox.len() >= MAX_QUEUED {
            self.fail(format!(
                "simulation stopped accepting requests ({} held, {} refused)",
                self.outbox.len(),
                request.kind()
            ));
            return;
        }
        self.outbox.push_back(request);
    }

    /// Hand held requests to the transport until it is full.
    fn flush(&mut self) {
        if !self.ready {
            return;
        }
        while let Some(request) = self.outbox.pop_front() {
            if let Err(e) = self.bridge.send(request) {
                self.outbox.push_front(e.into_inner());
                log::trace!("Transport busy; holding {} request(s)", self.outbox.len());
                break;
            }
        }
    }

    fn handshake(&mut self) {
        self.ready = false;
        if let Err(e) = self.bridge.send(SimRequest::Init) {
            log::warn!("Bridge handshake failed: {e}");
        }
    }

    fn fail(&mut self, message: String) {
        log::error!("Simulation bridge fault: {message}");
        self.fall_back();
        self.fault = Some(message);
    }

    fn fall_back(&mut self) {
        log::warn!("Simulation worker failed; switching to local simulation");
        self.bridge = Box::new(LocalBridge::new(self.settings.clone()));
        self.outbox.clear();
        self.resets = 0;
        self.fell_back = true;
        self.handshake();
    }
}

/// Fold `next` into the held `last` when only the newest value matters.
/// Merged steps keep the clock's catch-up cap.
fn coalesce(last: &mut SimRequest, next: &SimRequest, max_substeps: u32) -> bool {
    match (last, next) {
        (
            SimRequest::Step {
                dt,
                sub_steps,
                rotation_speed,
                angle,
            },
            SimRequest::Step {
                dt: next_dt,
                sub_steps: more,
                rotation_speed: next_speed,
                angle: next_angle,
            },
        ) if *dt == *next_dt => {
            *sub_steps = sub_steps.saturating_add(*more).min(max_substeps.max(1));
            *rotation_speed = *next_speed;
            *angle = *next_angle;
            true
        }
        (SimRequest::UpdateAnchor { position }, SimRequest::UpdateAnchor { position: next }) => {
            *position = *next;
            true
        }
        (SimRequest::SetRotationSpeed { speed }, SimRequest::SetRotationSpeed { speed: next }) => {
            *speed = *next;
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spool_core::{CoilerProfile, Vec3};
    use std::time::{Duration, Instant};

    fn profile() -> CoilerProfile {
        CoilerProfile::new("compact", 0.2, 0.18, 400)
    }

    fn step(rotation_speed: f32, angle: f32) -> SimRequest {
        SimRequest::Step {
            dt: 1.0 / 60.0,
            sub_steps: 1,
            rotation_speed,
            angle,
        }
    }

    fn kinds(requests: &VecDeque<SimRequest>) -> Vec<&'static str> {
        requests.iter().map(SimRequest::kind).collect()
    }

    fn collect(bridge: &mut dyn SimBridge, expected: usize) -> Vec<SimResponse> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut out = Vec::new();
        while out.len() < expected && Instant::now() < deadline {
            out.extend(bridge.poll());
            thread::sleep(Duration::from_millis(1));
        }
        out
    }

    #[test]
    fn mode_parses_from_str() {
        assert_eq!("worker".parse::<BridgeMode>(), Ok(BridgeMode::Worker));
        assert_eq!("LOCAL".parse::<BridgeMode>(), Ok(BridgeMode::Local));
        assert!("gpu".parse::<BridgeMode>().is_err());
    }

    #[test]
    fn local_bridge_answers_synchronously() {
        let mut bridge = LocalBridge::new(SimSettings::default());
        bridge.send(SimRequest::Init).unwrap();
        bridge.send(SimRequest::SetRotationSpeed { speed: 1.0 }).unwrap();
        assert_eq!(bridge.poll(), vec![SimResponse::Initialized]);
        assert!(bridge.poll().is_empty());
    }

    #[test]
    fn worker_round_trip() {
        let mut bridge = WorkerBridge::spawn(SimSettings::default()).unwrap();
        bridge.send(SimRequest::Init).unwrap();
        bridge.send(SimRequest::CreateChain { profile: profile() }).unwrap();
        let responses = collect(&mut bridge, 2);
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0], SimResponse::Initialized);
        assert_eq!(responses[1].kind(), "chainCreated");
        assert!(bridge.is_alive());
    }

    #[test]
    fn client_buffers_until_handshake() {
        let mut client = BridgeClient::connect(BridgeMode::Local, &SimSettings::default());
        client.request(SimRequest::CreateChain { profile: profile() });
        assert!(!client.is_ready());
        assert_eq!(client.queued(), 1);

        // The handshake flushes the buffered request; its reply arrives next poll.
        assert!(client.poll().is_empty());
        assert!(client.is_ready());
        let responses = client.poll();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].kind(), "chainCreated");
    }

    #[test]
    fn client_drops_responses_from_before_reset() {
        let settings = SimSettings::default();
        let mut client = BridgeClient::connect(BridgeMode::Local, &settings);
        client.poll();

        client.request(SimRequest::CreateChain { profile: profile() });
        client.request(SimRequest::ResetChain);
        client.request(SimRequest::CreateChain { profile: profile() });

        let responses = client.poll();
        let kinds: Vec<_> = responses.iter().map(SimResponse::kind).collect();
        assert_eq!(kinds, vec!["chainReset", "chainCreated"]);
        assert!(responses.iter().all(|r| r.epoch() == Some(1)));
    }

    struct BrokenBridge;

    impl SimBridge for BrokenBridge {
        fn send(&mut self, _request: SimRequest) -> std::result::Result<(), TrySendError<SimRequest>> {
            Ok(())
        }

        fn poll(&mut self) -> Vec<SimResponse> {
            vec![SimResponse::Error {
                message: "boom".into(),
                fatal: true,
            }]
        }

        fn mode(&self) -> BridgeMode {
            BridgeMode::Worker
        }
    }

    #[test]
    fn fatal_error_falls_back_to_local() {
        let settings = SimSettings::default();
        let mut client = BridgeClient::with_bridge(Box::new(BrokenBridge), &settings);
        let responses = client.poll();
        assert!(matches!(responses[..], [SimResponse::Error { fatal: true, .. }]));
        assert!(client.fell_back());
        assert_eq!(client.mode(), BridgeMode::Local);

        client.poll();
        assert!(client.is_ready());
    }

    /// Local transport that reports a full queue for its first `refusals`
    /// reset requests.
    struct BusyBridge {
        inner: LocalBridge,
        refusals: u32,
    }

    impl SimBridge for BusyBridge {
        fn send(&mut self, request: SimRequest) -> std::result::Result<(), TrySendError<SimRequest>> {
            if self.refusals > 0 && matches!(request, SimRequest::ResetChain) {
                self.refusals -= 1;
                return Err(TrySendError::Full(request));
            }
            self.inner.send(request)
        }

        fn poll(&mut self) -> Vec<SimResponse> {
            self.inner.poll()
        }

        fn mode(&self) -> BridgeMode {
            BridgeMode::Worker
        }
    }

    #[test]
    fn reset_refused_by_a_full_queue_is_retried() {
        let settings = SimSettings::default();
        let busy = BusyBridge {
            inner: LocalBridge::new(settings.clone()),
            refusals: 3,
        };
        let mut client = BridgeClient::with_bridge(Box::new(busy), &settings);
        client.poll();

        client.request(SimRequest::CreateChain { profile: profile() });
        client.request(SimRequest::ResetChain);
        client.request(SimRequest::CreateChain { profile: profile() });
        for i in 0..50 {
            client.request(step(0.0, i as f32 * 0.01));
        }
        assert_eq!(client.queued(), 0);

        let responses = client.poll();
        let kinds: Vec<_> = responses.iter().map(SimResponse::kind).collect();
        assert_eq!(kinds[..2], ["chainReset", "chainCreated"]);
        // The first two steps were held behind the reset and went out as one.
        assert_eq!(kinds.iter().filter(|k| **k == "stepped").count(), 49);
        assert!(responses.iter().all(|r| r.epoch() == Some(1)));
    }

    /// Transport that completes the handshake and then never has room.
    struct StalledBridge {
        greeted: bool,
    }

    impl SimBridge for StalledBridge {
        fn send(&mut self, request: SimRequest) -> std::result::Result<(), TrySendError<SimRequest>> {
            match request {
                SimRequest::Init => Ok(()),
                other => Err(TrySendError::Full(other)),
            }
        }

        fn poll(&mut self) -> Vec<SimResponse> {
            if self.greeted {
                return Vec::new();
            }
            self.greeted = true;
            vec![SimResponse::Initialized]
        }

        fn mode(&self) -> BridgeMode {
            BridgeMode::Worker
        }
    }

    fn stalled_client() -> BridgeClient {
        let stalled = StalledBridge { greeted: false };
        let mut client = BridgeClient::with_bridge(Box::new(stalled), &SimSettings::default());
        client.poll();
        assert!(client.is_ready());
        client
    }

    #[test]
    fn held_steps_and_anchor_moves_are_folded() {
        let mut client = stalled_client();
        for i in 0..10 {
            client.request(step(i as f32, i as f32 * 0.1));
        }
        client.request(SimRequest::UpdateAnchor {
            position: Vec3::new(1.0, 0.0, 0.0),
        });
        client.request(SimRequest::UpdateAnchor {
            position: Vec3::new(2.0, 0.0, 0.0),
        });

        assert_eq!(kinds(&client.outbox), ["step", "updateAnchor"]);
        match &client.outbox[0] {
            SimRequest::Step {
                sub_steps,
                rotation_speed,
                angle,
                ..
            } => {
                assert_eq!(*sub_steps, SimSettings::default().max_substeps);
                assert_eq!(*rotation_speed, 9.0);
                assert!((angle - 0.9).abs() < 1e-6);
            }
            other => panic!("expected a step, got {other:?}"),
        }
        assert_eq!(
            client.outbox[1],
            SimRequest::UpdateAnchor {
                position: Vec3::new(2.0, 0.0, 0.0)
            }
        );
    }

    #[test]
    fn queued_reset_discards_held_chain_work() {
        let mut client = stalled_client();
        client.request(SimRequest::CreateChain { profile: profile() });
        client.request(step(1.0, 0.0));
        client.request(SimRequest::AppendSegment {
            profile: profile(),
            angle: 0.0,
            frame: 1,
        });
        client.request(SimRequest::UpdateAnchor { position: Vec3::ZERO });
        client.request(SimRequest::ResetChain);
        assert_eq!(kinds(&client.outbox), ["updateAnchor", "resetChain"]);
    }

    #[test]
    fn overflowing_queue_is_a_fatal_fault() {
        let mut client = stalled_client();
        for _ in 0..MAX_QUEUED {
            client.request(SimRequest::CreateChain { profile: profile() });
        }
        assert_eq!(client.queued(), MAX_QUEUED);
        assert!(!client.fell_back());

        client.request(SimRequest::CreateChain { profile: profile() });
        assert!(client.fell_back());
        assert_eq!(client.mode(), BridgeMode::Local);
        assert_eq!(client.queued(), 0);

        let responses = client.poll();
        assert!(matches!(responses[..], [SimResponse::Error { fatal: true, .. }]));
        client.poll();
        assert!(client.is_ready());
    }
}
