//! Error taxonomy for world building and queries.
//!
//! Rejected moves are not errors; they surface as
//! [`crate::movement::MoveOutcome::Rejected`].

use crate::scene::NodeId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorldError {
    /// Required field missing or out of range in the world document.
    #[error("malformed world definition: {0}")]
    Definition(String),

    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("failed to parse world definition: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read world definition: {0}")]
    Io(#[from] std::io::Error),

    /// Geometry query against a node whose `build()` has not run.
    #[error("node {0} queried before build()")]
    NotBuilt(NodeId),

    #[error("no such node {0}")]
    UnknownNode(NodeId),

    #[error("tile index used before configure()")]
    TileIndexUnconfigured,

    #[error("tile size must be positive and finite, got {0}")]
    InvalidTileSize(f64),

    #[error("degenerate perspective: depth {perspective}, camera offset {offset}")]
    DegeneratePerspective { perspective: f64, offset: f64 },
}

pub type Result<T> = std::result::Result<T, WorldError>;
