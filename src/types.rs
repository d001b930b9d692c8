//! Core world types shared across all modules.

use crate::error::WorldError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

// ---------------------------------------------------------------------------
// Basic math
// ---------------------------------------------------------------------------

/// A point, extent or angle triple in world units.
///
/// `x`/`y` span the ground plane, `z` is height.  On the wire a coordinate is
/// a 3-element JSON array; decoding goes through [`Coordinate::try_from`] so
/// wrong arity and non-finite components are rejected.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(try_from = "Vec<f64>", into = "[f64; 3]")]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Coordinate {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    pub fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn scale(self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor, self.z * factor)
    }
}

impl TryFrom<Vec<f64>> for Coordinate {
    type Error = WorldError;

    fn try_from(value: Vec<f64>) -> Result<Self, Self::Error> {
        let [x, y, z]: [f64; 3] = value.as_slice().try_into().map_err(|_| {
            WorldError::InvalidCoordinate(format!("expected 3 components, got {}", value.len()))
        })?;
        let c = Self::new(x, y, z);
        if !c.is_finite() {
            return Err(WorldError::InvalidCoordinate(format!(
                "non-finite component in {c}"
            )));
        }
        Ok(c)
    }
}

impl From<Coordinate> for [f64; 3] {
    fn from(c: Coordinate) -> Self {
        c.to_array()
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Tile grid
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TileCoord {
    pub column: i32,
    pub row: i32,
}

impl TileCoord {
    pub const fn new(column: i32, row: i32) -> Self {
        Self { column, row }
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{},{}]", self.column, self.row)
    }
}

// ---------------------------------------------------------------------------
// Ownership handle
// ---------------------------------------------------------------------------

/// Opaque id of the session that owns a scene arena.
///
/// Nodes carry this instead of a pointer back to their world.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl SessionId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Input commands
// ---------------------------------------------------------------------------

/// Movement commands the resolver understands.  Key bindings live outside
/// this crate; only the held set reaches [`crate::session::WorldSession::step`].
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    Sprint,
}

impl std::str::FromStr for Command {
    type Err = WorldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" | "move_up" => Ok(Self::MoveUp),
            "down" | "move_down" => Ok(Self::MoveDown),
            "left" | "move_left" => Ok(Self::MoveLeft),
            "right" | "move_right" => Ok(Self::MoveRight),
            "sprint" => Ok(Self::Sprint),
            other => Err(WorldError::Definition(format!("unknown command '{other}'"))),
        }
    }
}

/// The set of commands held during a tick.
pub type CommandSet = HashSet<Command>;

// ---------------------------------------------------------------------------
// Stats & config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorldStats {
    pub total_nodes: usize,
    pub root_nodes: usize,
    pub tile_buckets: usize,
    pub onscreen_nodes: usize,
    pub occluded_nodes: usize,
    pub total_ticks: u64,
    pub accepted_moves: u64,
    pub rejected_moves: u64,
}

/// Runtime knobs that the world document does not carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Viewport width in screen units, used for the visibility window.
    pub viewport_width: f64,
    /// Viewport height in screen units.
    pub viewport_height: f64,
    /// Initial camera depth offset (the zoom translation).
    pub camera_depth_offset: f64,
    /// Reject moves whose path sweeps through a solid even when the target
    /// point itself is clear.
    pub swept_moves: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            viewport_width: 1280.0,
            viewport_height: 720.0,
            camera_depth_offset: 0.0,
            swept_moves: false,
        }
    }
}
