//! Tileworld Engine
//!
//! The spatial core of a pseudo-3D walkable block world: a scene graph of
//! oriented boxes, a tile hash for visibility culling, and a movement
//! resolver with step-up and fall-to-surface rules.
//!
//! ## Architecture
//!
//! ```text
//! WorldRunner  (runner.rs)   ← async tick loop, debounced resize
//!   └── WorldSession  (session.rs)  ← agent, coordinate frame, zoom
//!         ├── SceneGraph       (scene.rs)     ← solids / groups / grounds
//!         ├── TileIndex        (tiles.rs)     ← buckets, visibility window
//!         └── MovementResolver (movement.rs)  ← collide, step up, fall
//! ```
//!
//! Everything below `WorldRunner` is synchronous and runs without the
//! `server` feature.

// Core modules are always available (no server feature needed).
pub mod definition;
pub mod error;
pub mod geometry;
pub mod movement;
pub mod protocol;
pub mod scene;
pub mod session;
pub mod tiles;
pub mod types;

// Runtime modules require the `server` feature.
#[cfg(feature = "server")]
pub mod runner;
#[cfg(feature = "server")]
pub mod settings;

// Convenience re-exports
pub use definition::{NodeDefinition, WorldDefinition};
pub use error::{Result, WorldError};
pub use movement::{Agent, MoveOutcome, MovementResolver};
#[cfg(feature = "server")]
pub use runner::{RunnerConfig, RunnerHandle, WorldRunner};
pub use scene::{NodeId, SceneGraph};
pub use session::WorldSession;
#[cfg(feature = "server")]
pub use settings::Settings;
pub use tiles::TileIndex;
pub use types::{Command, CommandSet, Coordinate, SessionConfig, TileCoord, WorldStats};
