//! `doors.*` wire protocol.
//!
//! This module owns **every message that crosses the process boundary**
//! between the door engine and its trigger sources or observers (command
//! layer, redstone adapter, dashboards…).
//!
//! ## Channel namespaces
//!
//! | Namespace        | Direction          | Payload                          |
//! |------------------|--------------------|----------------------------------|
//! | `doors.toggle.*` | engine → observer  | lifecycle events                 |
//! | `doors.request`  | trigger → engine   | [`ToggleRequest`] JSON           |
//! | `doors.outcome`  | engine → trigger   | [`OutcomeMsg`]                   |
//! | `doors.cmd.*`    | client → engine    | request-reply commands           |
//!
//! ## Design rules
//!
//! 1. Every struct must be `Serialize + Deserialize` with snake_case JSON.
//! 2. Block contents never travel on the wire, only cuboids and counts.
//! 3. Every outbound event includes `frame: u64` and `session: String`.

use crate::request::{ToggleOutcome, ToggleRequest};
use crate::types::{Cuboid, StructureId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Common envelope
// ---------------------------------------------------------------------------

/// Every outbound message is wrapped in this envelope.
///
/// The `session` field lets multiplexed observers distinguish servers.
/// The `frame` field is the door service tick that produced the event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoorEvent<T> {
    pub session: String,
    pub frame: u64,
    pub payload: T,
}

impl<T> DoorEvent<T> {
    pub fn new(session: impl Into<String>, frame: u64, payload: T) -> Self {
        Self {
            session: session.into(),
            frame,
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// Outcomes  (subject: doors.outcome)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Completed,
    Rejected,
    Failed,
}

/// Flattened [`ToggleOutcome`] for trigger sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeMsg {
    pub structure_id: StructureId,
    pub status: OutcomeStatus,
    /// Human-readable reason for rejections and failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_open: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cuboid: Option<Cuboid>,
}

impl OutcomeMsg {
    pub fn from_outcome(structure_id: StructureId, outcome: &ToggleOutcome) -> Self {
        match outcome {
            ToggleOutcome::Completed(report) => Self {
                structure_id,
                status: OutcomeStatus::Completed,
                detail: (!report.persisted).then(|| "not persisted".to_string()),
                is_open: Some(report.structure.is_open),
                cuboid: Some(report.structure.cuboid),
            },
            ToggleOutcome::Rejected(r) => Self {
                structure_id,
                status: OutcomeStatus::Rejected,
                detail: Some(r.to_string()),
                is_open: None,
                cuboid: None,
            },
            ToggleOutcome::Failed(e) => Self {
                structure_id,
                status: OutcomeStatus::Failed,
                detail: Some(e.to_string()),
                is_open: None,
                cuboid: None,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Command requests  (client → engine, request-reply via doors.cmd.*)
// ---------------------------------------------------------------------------

/// Stop the animation of a structure at its next tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmdAbort {
    pub structure_id: StructureId,
}

/// Decode a trigger source's JSON request.
pub fn parse_request(bytes: &[u8]) -> Result<ToggleRequest, serde_json::Error> {
    serde_json::from_slice(bytes)
}

// ---------------------------------------------------------------------------
// Subject helpers
// ---------------------------------------------------------------------------

/// All subjects used by the door protocol, as constants.
pub mod subjects {
    pub const TOGGLE_START: &str = "doors.toggle.start";
    pub const TOGGLE_END: &str = "doors.toggle.end";
    pub const TOGGLE_FAILED: &str = "doors.toggle.failed";

    pub const REQUEST: &str = "doors.request";
    pub const OUTCOME: &str = "doors.outcome";

    /// Empty payload; replies with `DoorStats`.
    pub const CMD_STATS: &str = "doors.cmd.stats";
    pub const CMD_ABORT: &str = "doors.cmd.abort";
}
