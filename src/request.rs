//! Toggle requests and their outcomes.

use crate::error::ToggleError;
use crate::structure::Structure;
use crate::types::{Cuboid, PlayerId, StructureId, Vec3i};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleCause {
    Player(PlayerId),
    Signal,
    Server,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleAction {
    Open,
    Close,
    Toggle,
}

impl ToggleAction {
    /// Whether this action changes a structure whose open flag is `is_open`.
    pub fn applies_to(self, is_open: bool) -> bool {
        match self {
            ToggleAction::Open => !is_open,
            ToggleAction::Close => is_open,
            ToggleAction::Toggle => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureSelector {
    One(StructureId),
    Many(Vec<StructureId>),
}

impl StructureSelector {
    /// Resolved ids, duplicates removed, in request order.
    pub fn ids(&self) -> Vec<StructureId> {
        match self {
            StructureSelector::One(id) => vec![*id],
            StructureSelector::Many(ids) => {
                let mut seen = Vec::with_capacity(ids.len());
                for id in ids {
                    if !seen.contains(id) {
                        seen.push(*id);
                    }
                }
                seen
            }
        }
    }
}

/// Immutable toggle request. One request may target many structures; each is
/// processed independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToggleRequest {
    pub selector: StructureSelector,
    pub cause: ToggleCause,
    pub action: ToggleAction,
    /// Identity used for protection checks; defaults to the player cause,
    /// then the prime owner.
    #[serde(default)]
    pub responsible: Option<PlayerId>,
    #[serde(default = "default_speed")]
    pub speed_multiplier: f32,
    #[serde(default)]
    pub skip_animation: bool,
}

fn default_speed() -> f32 {
    1.0
}

impl ToggleRequest {
    pub fn new(selector: StructureSelector, cause: ToggleCause, action: ToggleAction) -> Self {
        Self {
            selector,
            cause,
            action,
            responsible: None,
            speed_multiplier: 1.0,
            skip_animation: false,
        }
    }

    pub fn player(id: StructureId, player: PlayerId, action: ToggleAction) -> Self {
        Self::new(StructureSelector::One(id), ToggleCause::Player(player), action)
    }

    /// The request the auto-close timer submits.
    pub fn auto_close(id: StructureId) -> Self {
        Self::new(
            StructureSelector::One(id),
            ToggleCause::Server,
            ToggleAction::Close,
        )
    }

    pub fn with_speed(mut self, multiplier: f32) -> Self {
        self.speed_multiplier = multiplier;
        self
    }

    pub fn skipping_animation(mut self) -> Self {
        self.skip_animation = true;
        self
    }

    pub fn with_responsible(mut self, player: PlayerId) -> Self {
        self.responsible = Some(player);
        self
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// A toggle refused without any side effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    NotFound,
    NoPermission,
    Locked,
    AlreadyInState,
    Busy,
    Cancelled(String),
    Unauthorized { at: Vec3i },
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::NotFound => f.write_str("structure not found"),
            Rejection::NoPermission => f.write_str("insufficient permission"),
            Rejection::Locked => f.write_str("structure is locked"),
            Rejection::AlreadyInState => f.write_str("structure is already in that state"),
            Rejection::Busy => f.write_str("structure is busy"),
            Rejection::Cancelled(reason) => write!(f, "cancelled: {}", reason),
            Rejection::Unauthorized { at } => write!(f, "not allowed to change {}", at),
        }
    }
}

/// Result of a completed toggle.
#[derive(Debug, Clone, PartialEq)]
pub struct ToggleReport {
    /// Structure state after the commit (already updated in memory).
    pub structure: Structure,
    pub previous_cuboid: Cuboid,
    pub committed_blocks: usize,
    /// False when saving failed; the world and the in-memory structure have
    /// already changed and must be reconciled with storage.
    pub persisted: bool,
    pub auto_close_scheduled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToggleOutcome {
    Completed(ToggleReport),
    Rejected(Rejection),
    Failed(ToggleError),
}

impl ToggleOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ToggleOutcome::Completed(_))
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            ToggleOutcome::Rejected(r) => Some(r),
            _ => None,
        }
    }

    pub fn report(&self) -> Option<&ToggleReport> {
        match self {
            ToggleOutcome::Completed(r) => Some(r),
            _ => None,
        }
    }
}

impl std::fmt::Display for ToggleOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToggleOutcome::Completed(r) => write!(
                f,
                "completed ({} blocks, now {})",
                r.committed_blocks,
                if r.structure.is_open { "open" } else { "closed" }
            ),
            ToggleOutcome::Rejected(r) => write!(f, "rejected: {}", r),
            ToggleOutcome::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}
