//! Movement resolver: turns held commands into a proposed displacement and
//! decides whether the agent may take it.
//!
//! The agent's tracked position is centre-relative; scene nodes are authored
//! in world space.  Every geometry query goes through
//! [`WorldFrame::adjust`] first.
//!
//! Resolution per target:
//! 1. broad phase from the tile index,
//! 2. sphere test against every candidate,
//! 3. clear → accept at the current height, then fall onto the highest
//!    surface at or below it,
//! 4. blocked → step up onto the first landing an intersecting node offers,
//!    or reject the whole move.

use crate::error::Result;
use crate::scene::{NodeId, SceneGraph};
use crate::tiles::TileIndex;
use crate::types::{Command, CommandSet, Coordinate};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// The single controllable creature of a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub size: Coordinate,
    /// Centre-relative position.
    pub position: Coordinate,
}

impl Agent {
    pub fn new(size: Coordinate, position: Coordinate) -> Self {
        Self { size, position }
    }

    pub fn width(&self) -> f64 {
        self.size.x
    }

    pub fn height(&self) -> f64 {
        self.size.z
    }

    pub fn hitbox_radius(&self) -> f64 {
        self.width() / 3.0
    }

    pub fn z(&self) -> f64 {
        self.position.z
    }
}

// ---------------------------------------------------------------------------
// Frame + speed
// ---------------------------------------------------------------------------

/// World extents and the centre-relative ↔ world-space convention.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldFrame {
    pub width: f64,
    pub length: f64,
}

impl WorldFrame {
    pub fn new(width: f64, length: f64) -> Self {
        Self { width, length }
    }

    /// `(width/2 − x, length/2 − y, z)`.
    pub fn adjust(&self, p: Coordinate) -> Coordinate {
        Coordinate::new(self.width / 2.0 - p.x, self.length / 2.0 - p.y, p.z)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedBounds {
    pub walk: f64,
    pub sprint: f64,
}

impl SpeedBounds {
    pub fn new(walk: f64, sprint: f64) -> Self {
        Self { walk, sprint }
    }
}

/// Horizontal displacement for the held commands, or `None` when they
/// cancel out or no direction is held.
pub fn displacement(commands: &CommandSet, speed: SpeedBounds) -> Option<(f64, f64)> {
    let step = if commands.contains(&Command::Sprint) {
        speed.sprint
    } else {
        speed.walk
    };

    let mut dx = 0.0;
    let mut dy = 0.0;
    if commands.contains(&Command::MoveLeft) {
        dx -= step;
    }
    if commands.contains(&Command::MoveDown) {
        dy += step;
    }
    if commands.contains(&Command::MoveRight) {
        dx += step;
    }
    if commands.contains(&Command::MoveUp) {
        dy -= step;
    }

    if dx == 0.0 && dy == 0.0 {
        None
    } else {
        Some((dx, dy))
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MoveOutcome {
    /// The agent moves to `position` (centre-relative).
    Moved {
        position: Coordinate,
        /// Height came from a landing offered by an intersecting node.
        stepped: bool,
        /// Height snapped to a supporting surface after a clear move.
        fell: bool,
    },
    /// Nothing intersecting offered a landing; position unchanged.
    Rejected { blocked_by: Vec<NodeId> },
}

impl MoveOutcome {
    pub fn position(&self) -> Option<Coordinate> {
        match self {
            Self::Moved { position, .. } => Some(*position),
            Self::Rejected { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct MovementResolver {
    frame: WorldFrame,
    swept: bool,
}

impl MovementResolver {
    pub fn new(frame: WorldFrame) -> Self {
        Self {
            frame,
            swept: false,
        }
    }

    /// Also block moves whose path passes through a solid.
    pub fn with_swept_moves(mut self, swept: bool) -> Self {
        self.swept = swept;
        self
    }

    pub fn frame(&self) -> WorldFrame {
        self.frame
    }

    /// Broad phase: the active tile's bucket, plus the target tile's bucket
    /// when the move crosses into another tile.
    pub fn candidates(&self, tiles: &TileIndex, target: Coordinate) -> Result<Vec<NodeId>> {
        let mut out = tiles.nodes_in_active_tile().to_vec();
        let target_tile = tiles.active_tile_for(self.frame.adjust(target))?;
        if target_tile != tiles.active_tile() {
            for &id in tiles.nodes_in_tile(target_tile) {
                if !out.contains(&id) {
                    out.push(id);
                }
            }
        }
        Ok(out)
    }

    /// Resolve a move of `agent` to the centre-relative `target` (x/y only;
    /// the agent's current z is kept for the test).
    pub fn resolve(
        &self,
        graph: &SceneGraph,
        tiles: &TileIndex,
        agent: &Agent,
        target: Coordinate,
    ) -> Result<MoveOutcome> {
        let z = agent.z();
        let target = Coordinate::new(target.x, target.y, z);
        let adjusted = self.frame.adjust(target);
        let radius = agent.hitbox_radius();
        let candidates = self.candidates(tiles, target)?;

        let mut hits = Vec::new();
        for &id in &candidates {
            if graph.intersects_agent(id, adjusted, radius, z)? {
                hits.push(id);
            }
        }

        if hits.is_empty() && self.swept {
            let from = self.frame.adjust(agent.position);
            for &id in &candidates {
                if graph.sweep_intersects(id, from, adjusted, radius)? {
                    return Ok(MoveOutcome::Rejected { blocked_by: vec![id] });
                }
            }
        }

        if hits.is_empty() {
            let fallen = self.fall(graph, &candidates, adjusted)?;
            return Ok(MoveOutcome::Moved {
                position: Coordinate::new(target.x, target.y, fallen.unwrap_or(z)),
                stepped: false,
                fell: fallen.is_some(),
            });
        }

        for &id in &hits {
            if let Some(landing) = graph.resolve_landing(id, adjusted, radius, z)? {
                return Ok(MoveOutcome::Moved {
                    position: Coordinate::new(target.x, target.y, landing.z),
                    stepped: true,
                    fell: false,
                });
            }
        }

        Ok(MoveOutcome::Rejected { blocked_by: hits })
    }

    /// Height to snap the agent to when it stands at `agent.position`
    /// without moving, if any.
    pub fn settle(&self, graph: &SceneGraph, tiles: &TileIndex, agent: &Agent) -> Result<Option<f64>> {
        let candidates = self.candidates(tiles, agent.position)?;
        self.fall(graph, &candidates, self.frame.adjust(agent.position))
    }

    /// Highest supporting surface at or below `adjusted.z`, when it differs
    /// from the current height.
    fn fall(&self, graph: &SceneGraph, candidates: &[NodeId], adjusted: Coordinate) -> Result<Option<f64>> {
        let mut best: Option<f64> = None;
        for &id in candidates {
            if let Some(h) = graph.support_height(id, adjusted)? {
                best = Some(best.map_or(h, |b| b.max(h)));
            }
        }
        Ok(best.filter(|&h| h != adjusted.z))
    }
}
