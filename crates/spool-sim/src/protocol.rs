//! Messages exchanged between the presentation side and the simulation.
//!
//! Both enums are plain data (no references), so they can cross a thread
//! boundary by value or be encoded as JSON. The JSON form is adjacently
//! tagged: `{"type": "stepped", "data": {...}}` with camelCase names.

use crate::snapshot::Snapshot;
use serde::{Deserialize, Serialize};
use spool_core::{CoilerProfile, Result, Vec3};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum SimRequest {
    Init,
    CreateChain {
        profile: CoilerProfile,
    },
    AppendSegment {
        profile: CoilerProfile,
        /// Drum angle at which growth triggered
        angle: f32,
        /// Presentation frame that requested the segment
        frame: u64,
    },
    Step {
        dt: f32,
        sub_steps: u32,
        rotation_speed: f32,
        /// Drum angle at the end of this batch of sub-steps
        angle: f32,
    },
    ResetChain,
    Finalize {
        max_segments: u32,
    },
    SetRotationSpeed {
        speed: f32,
    },
    UpdateAnchor {
        position: Vec3,
    },
}

impl SimRequest {
    /// Requests without a response message.
    pub fn is_fire_and_forget(&self) -> bool {
        matches!(
            self,
            SimRequest::SetRotationSpeed { .. } | SimRequest::UpdateAnchor { .. }
        )
    }

    /// Chain work made obsolete by a later reset.
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            SimRequest::CreateChain { .. }
                | SimRequest::AppendSegment { .. }
                | SimRequest::Step { .. }
                | SimRequest::Finalize { .. }
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SimRequest::Init => "init",
            SimRequest::CreateChain { .. } => "createChain",
            SimRequest::AppendSegment { .. } => "appendSegment",
            SimRequest::Step { .. } => "step",
            SimRequest::ResetChain => "resetChain",
            SimRequest::Finalize { .. } => "finalize",
            SimRequest::SetRotationSpeed { .. } => "setRotationSpeed",
            SimRequest::UpdateAnchor { .. } => "updateAnchor",
        }
    }
}

/// Responses carry the simulation epoch (number of resets processed) so the
/// receiver can drop snapshots that predate its latest reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum SimResponse {
    Initialized,
    ChainCreated {
        epoch: u64,
        snapshot: Snapshot,
    },
    SegmentAdded {
        epoch: u64,
        snapshot: Snapshot,
    },
    Stepped {
        epoch: u64,
        snapshot: Snapshot,
        delay_active: bool,
        delay_remaining: u32,
    },
    ChainReset {
        epoch: u64,
    },
    Finalized {
        epoch: u64,
        snapshot: Snapshot,
    },
    Error {
        message: String,
        /// The simulation side can no longer be used
        fatal: bool,
    },
}

impl SimResponse {
    pub fn epoch(&self) -> Option<u64> {
        match self {
            SimResponse::ChainCreated { epoch, .. }
            | SimResponse::SegmentAdded { epoch, .. }
            | SimResponse::Stepped { epoch, .. }
            | SimResponse::ChainReset { epoch }
            | SimResponse::Finalized { epoch, .. } => Some(*epoch),
            SimResponse::Initialized | SimResponse::Error { .. } => None,
        }
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        match self {
            SimResponse::ChainCreated { snapshot, .. }
            | SimResponse::SegmentAdded { snapshot, .. }
            | SimResponse::Stepped { snapshot, .. }
            | SimResponse::Finalized { snapshot, .. } => Some(snapshot),
            SimResponse::Initialized
            | SimResponse::ChainReset { .. }
            | SimResponse::Error { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SimResponse::Initialized => "initialized",
            SimResponse::ChainCreated { .. } => "chainCreated",
            SimResponse::SegmentAdded { .. } => "segmentAdded",
            SimResponse::Stepped { .. } => "stepped",
            SimResponse::ChainReset { .. } => "chainReset",
            SimResponse::Finalized { .. } => "finalized",
            SimResponse::Error { .. } => "error",
        }
    }
}

/// Encode a message as wire JSON.
pub fn encode<T: Serialize>(message: &T) -> Result<String> {
    Ok(serde_json::to_string(message)?)
}

/// Decode a message from wire JSON.
pub fn decode<T: for<'de> Deserialize<'de>>(text: &str) -> Result<T> {
    Ok(serde_json::from_str(text)?)
}
