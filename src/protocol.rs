//! Outbound messages: what a session reports to its renderer.
//!
//! Every struct is `Serialize + Deserialize` with snake_case JSON.  Node
//! geometry never crosses this boundary; consumers receive ids, flags and
//! the agent position only.

use crate::scene::{NodeId, OcclusionChange};
use crate::tiles::{VisibilityChange, VisibilityRadius};
use crate::types::{Coordinate, SessionId, TileCoord};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Common envelope
// ---------------------------------------------------------------------------

/// Every published message is wrapped in this envelope.
///
/// `frame` is the tick counter that produced the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldEvent<T> {
    pub session: SessionId,
    pub frame: u64,
    pub payload: T,
}

impl<T> WorldEvent<T> {
    pub fn new(session: SessionId, frame: u64, payload: T) -> Self {
        Self {
            session,
            frame,
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// Per-tick events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMoved {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub stepped: bool,
    pub fell: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRejected {
    pub blocked_by: Vec<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveTileChanged {
    pub from: TileCoord,
    pub to: TileCoord,
}

/// Everything a single tick (or viewport change) changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickEvents {
    pub tick: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moved: Option<AgentMoved>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected: Option<MoveRejected>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tile_changed: Option<ActiveTileChanged>,
    pub visibility: Vec<VisibilityChange>,
    pub occlusion: Vec<OcclusionChange>,
}

impl TickEvents {
    pub fn new(tick: u64) -> Self {
        Self {
            tick,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.moved.is_none()
            && self.rejected.is_none()
            && self.tile_changed.is_none()
            && self.visibility.is_empty()
            && self.occlusion.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeState {
    pub id: NodeId,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Group descendants share their root's window membership.
    pub offscreen: bool,
    pub occluded: bool,
}

/// Full state for a renderer that attaches mid-session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub session: SessionId,
    pub frame: u64,
    pub agent: Coordinate,
    pub active_tile: TileCoord,
    pub radius: VisibilityRadius,
    pub nodes: Vec<NodeState>,
}
