//! The worker and local transports must answer identically.

use spool_core::{CoilerProfile, SimSettings, Vec3};
use spool_runtime::{LocalBridge, SimBridge, WorkerBridge};
use spool_sim::{SimRequest, SimResponse};
use std::time::{Duration, Instant};

fn requests() -> Vec<SimRequest> {
    let profile = CoilerProfile::new("compact", 0.2, 0.18, 400);
    let mut out = vec![
        SimRequest::Init,
        SimRequest::CreateChain {
            profile: profile.clone(),
        },
    ];
    for frame in 0..40u64 {
        out.push(SimRequest::Step {
            dt: 1.0 / 60.0,
            sub_steps: 1 + (frame % 3) as u32,
            rotation_speed: 1.25,
            angle: frame as f32 * 0.02,
        });
        if frame % 5 == 0 {
            out.push(SimRequest::AppendSegment {
                profile: profile.clone(),
                angle: frame as f32 * 0.02,
                frame,
            });
        }
        if frame == 20 {
            out.push(SimRequest::UpdateAnchor {
                position: Vec3::new(0.6, 0.4, -0.05),
            });
        }
    }
    out.push(SimRequest::Finalize { max_segments: 400 });
    out
}

fn expected_responses(requests: &[SimRequest]) -> usize {
    requests.iter().filter(|r| !r.is_fire_and_forget()).count()
}

fn run(bridge: &mut dyn SimBridge, requests: &[SimRequest]) -> Vec<SimResponse> {
    let expected = expected_responses(requests);
    let mut out = Vec::new();
    for request in requests {
        bridge.send(request.clone()).unwrap();
        // Drain as we go so the bounded response channel never fills.
        out.extend(bridge.poll());
    }
    let deadline = Instant::now() + Duration::from_secs(30);
    while out.len() < expected && Instant::now() < deadline {
        out.extend(bridge.poll());
        std::thread::sleep(Duration::from_millis(1));
    }
    out
}

#[test]
fn test_worker_matches_local() {
    let requests = requests();
    let settings = SimSettings::default();

    let mut local = LocalBridge::new(settings.clone());
    let local_responses = run(&mut local, &requests);

    let mut worker = WorkerBridge::spawn(settings).unwrap();
    let worker_responses = run(&mut worker, &requests);

    assert_eq!(local_responses.len(), expected_responses(&requests));
    assert_eq!(worker_responses.len(), local_responses.len());
    for (w, l) in worker_responses.iter().zip(&local_responses) {
        assert_eq!(w.kind(), l.kind());
        assert_eq!(
            w.snapshot().map(|s| s.len()),
            l.snapshot().map(|s| s.len())
        );
    }
    assert_eq!(worker_responses, local_responses);
}

#[test]
fn test_worker_drops_work_queued_before_reset() {
    let profile = CoilerProfile::new("compact", 0.2, 0.18, 400);
    let mut worker = WorkerBridge::spawn(SimSettings::default()).unwrap();

    // Everything below may arrive in one batch; whatever is processed, no
    // response may carry the pre-reset epoch after the reset reply.
    worker.send(SimRequest::Init).unwrap();
    worker
        .send(SimRequest::CreateChain {
            profile: profile.clone(),
        })
        .unwrap();
    for _ in 0..20 {
        worker
            .send(SimRequest::Step {
                dt: 1.0 / 60.0,
                sub_steps: 1,
                rotation_speed: 0.0,
                angle: 0.0,
            })
            .unwrap();
    }
    worker.send(SimRequest::ResetChain).unwrap();
    worker.send(SimRequest::CreateChain { profile }).unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    let mut responses = Vec::new();
    while !responses
        .iter()
        .any(|r: &SimResponse| r.epoch() == Some(1) && r.kind() == "chainCreated")
        && Instant::now() < deadline
    {
        responses.extend(worker.poll());
        std::thread::sleep(Duration::from_millis(1));
    }

    let reset_at = responses
        .iter()
        .position(|r| r.kind() == "chainReset")
        .expect("reset acknowledged");
    assert!(responses[reset_at..]
        .iter()
        .all(|r| r.epoch() == Some(1)));
    assert_eq!(responses.last().map(SimResponse::kind), Some("chainCreated"));
}
