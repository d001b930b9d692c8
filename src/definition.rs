//! World definition document: the JSON a world is built from.
//!
//! ```json
//! {
//!   "id": "test",
//!   "width": 10000, "length": 10000,
//!   "spawn": [0, 0, 0],
//!   "perspective": 600,
//!   "speed": [5, 15],
//!   "zoom": [-300, 400],
//!   "tileSize": 512,
//!   "objects": [
//!     { "type": "group", "position": [5000, 5200, 0], "objects": [
//!       { "type": "solid", "size": [30, 30, 175] }
//!     ]},
//!     { "type": "ground", "size": [10000, 10000, 0], "style": "background: green" }
//!   ]
//! }
//! ```
//!
//! Nodes are kept as raw JSON until [`WorldDefinition::nodes`] resolves them,
//! so an unknown `type` can be skipped with a warning instead of failing the
//! whole document.

use crate::error::{Result, WorldError};
use crate::types::Coordinate;
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_agent_size() -> Coordinate {
    Coordinate::new(30.0, 30.0, 60.0)
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldDefinition {
    #[serde(default)]
    pub id: String,
    pub width: f64,
    pub length: f64,
    /// Centre-relative spawn position of the agent.
    pub spawn: Coordinate,
    /// CSS-style perspective depth.
    pub perspective: f64,
    /// `[walk, sprint]` speeds in world units per tick.
    pub speed: [f64; 2],
    /// `[min, max]` camera depth offsets.
    pub zoom: [f64; 2],
    pub tile_size: f64,
    #[serde(default = "default_agent_size")]
    pub agent_size: Coordinate,
    #[serde(default)]
    pub objects: Vec<serde_json::Value>,
}

impl WorldDefinition {
    pub fn from_json(text: &str) -> Result<Self> {
        let def: Self = serde_json::from_str(text)?;
        def.validate()?;
        Ok(def)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Range checks serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("width", self.width),
            ("length", self.length),
            ("tileSize", self.tile_size),
        ];
        for (name, v) in positive {
            if !v.is_finite() || v <= 0.0 {
                return Err(WorldError::Definition(format!(
                    "{name} must be positive, got {v}"
                )));
            }
        }
        if !self.perspective.is_finite() {
            return Err(WorldError::Definition("perspective must be finite".into()));
        }
        let [walk, sprint] = self.speed;
        if !(walk.is_finite() && sprint.is_finite()) || walk < 0.0 || sprint < walk {
            return Err(WorldError::Definition(format!(
                "speed must satisfy 0 <= min <= max, got [{walk}, {sprint}]"
            )));
        }
        let [zmin, zmax] = self.zoom;
        if !(zmin.is_finite() && zmax.is_finite()) || zmin > zmax {
            return Err(WorldError::Definition(format!(
                "zoom must satisfy min <= max, got [{zmin}, {zmax}]"
            )));
        }
        if self.agent_size.x <= 0.0 {
            return Err(WorldError::Definition("agentSize width must be positive".into()));
        }
        Ok(())
    }

    /// Resolve the raw node list into typed definitions.
    pub fn nodes(&self) -> Result<Vec<NodeDefinition>> {
        resolve_nodes(&self.objects)
    }
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// Fields every node variant carries.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NodeCommon {
    #[serde(default)]
    pub position: Coordinate,
    #[serde(default)]
    pub size: Coordinate,
    #[serde(default, alias = "rotate")]
    pub rotation: Coordinate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeDefinition {
    Solid(NodeCommon),
    Group {
        common: NodeCommon,
        children: Vec<NodeDefinition>,
    },
    Ground {
        common: NodeCommon,
        /// Rendering hint, carried through untouched.
        style: Option<String>,
    },
}

impl NodeDefinition {
    pub fn common(&self) -> &NodeCommon {
        match self {
            Self::Solid(common) => common,
            Self::Group { common, .. } | Self::Ground { common, .. } => common,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Solid(_) => "solid",
            Self::Group { .. } => "group",
            Self::Ground { .. } => "ground",
        }
    }
}

#[derive(Deserialize)]
struct GroupFields {
    #[serde(flatten)]
    common: NodeCommon,
    #[serde(default)]
    objects: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct GroundFields {
    #[serde(flatten)]
    common: NodeCommon,
    #[serde(default)]
    style: Option<String>,
}

type NodeParser = fn(serde_json::Value) -> Result<NodeDefinition>;

fn parse_solid(raw: serde_json::Value) -> Result<NodeDefinition> {
    Ok(NodeDefinition::Solid(serde_json::from_value(raw)?))
}

fn parse_group(raw: serde_json::Value) -> Result<NodeDefinition> {
    let fields: GroupFields = serde_json::from_value(raw)?;
    Ok(NodeDefinition::Group {
        common: fields.common,
        children: resolve_nodes(&fields.objects)?,
    })
}

fn parse_ground(raw: serde_json::Value) -> Result<NodeDefinition> {
    let fields: GroundFields = serde_json::from_value(raw)?;
    Ok(NodeDefinition::Ground {
        common: fields.common,
        style: fields.style,
    })
}

/// Closed type-tag table.  Aliases cover older documents.
fn parser_for(tag: &str) -> Option<NodeParser> {
    match tag {
        "solid" | "cuboid" => Some(parse_solid),
        "group" => Some(parse_group),
        "ground" | "floor" => Some(parse_ground),
        _ => None,
    }
}

fn resolve_nodes(raw: &[serde_json::Value]) -> Result<Vec<NodeDefinition>> {
    let mut out = Vec::with_capacity(raw.len());
    for (i, value) in raw.iter().enumerate() {
        let tag = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| WorldError::Definition(format!("node #{i} has no string 'type'")))?;

        match parser_for(tag) {
            Some(parse) => out.push(parse(value.clone())?),
            None => warn!("Skipping node #{} with unknown type '{}'", i, tag),
        }
    }
    Ok(out)
}
