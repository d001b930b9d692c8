//! Tile index: a spatial hash of node footprints used for visibility culling
//! and as the collision broad phase.
//!
//! A node lands in every bucket its footprint touches, so a node on a tile
//! boundary is found from both sides.  Buckets are created lazily and live
//! for the whole session.

use crate::error::{Result, WorldError};
use crate::scene::{NodeId, SceneGraph};
use crate::types::{Coordinate, TileCoord};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

// ---------------------------------------------------------------------------
// Bucket
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TileBucket {
    pub coord: TileCoord,
    /// Members in insertion order; no duplicates.
    nodes: Vec<NodeId>,
}

impl TileBucket {
    fn new(coord: TileCoord) -> Self {
        Self {
            coord,
            nodes: Vec::new(),
        }
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    fn push(&mut self, id: NodeId) {
        if !self.nodes.contains(&id) {
            self.nodes.push(id);
        }
    }
}

// ---------------------------------------------------------------------------
// Visibility window
// ---------------------------------------------------------------------------

/// How many tiles fit across the viewport at the current zoom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VisibilityRadius {
    pub columns: u32,
    pub rows: u32,
}

/// Tiles per viewport dimension after the perspective scale for a camera
/// pushed `camera_depth_offset` towards the scene.
pub fn visibility_radius(
    viewport: (f64, f64),
    perspective: f64,
    camera_depth_offset: f64,
    tile_size: f64,
) -> Result<VisibilityRadius> {
    let denom = perspective - camera_depth_offset;
    if perspective <= 0.0 || denom <= 0.0 || !denom.is_finite() {
        return Err(WorldError::DegeneratePerspective {
            perspective,
            offset: camera_depth_offset,
        });
    }
    if !(tile_size.is_finite() && tile_size > 0.0) {
        return Err(WorldError::InvalidTileSize(tile_size));
    }

    let scale = perspective / denom;
    let effective = tile_size * scale;
    let count = |extent: f64| (extent.max(0.0) / effective).ceil() as u32;

    Ok(VisibilityRadius {
        columns: count(viewport.0),
        rows: count(viewport.1),
    })
}

/// One on/off-screen flip produced by a visibility pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityChange {
    pub node: NodeId,
    pub offscreen: bool,
}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct TileIndex {
    tile_size: Option<f64>,
    buckets: HashMap<TileCoord, TileBucket>,
    active: TileCoord,
    radius: VisibilityRadius,
}

impl TileIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configure(&mut self, tile_size: f64) -> Result<()> {
        if !(tile_size.is_finite() && tile_size > 0.0) {
            return Err(WorldError::InvalidTileSize(tile_size));
        }
        if !self.buckets.is_empty() {
            warn!("Tile index reconfigured after insertion; existing buckets keep their old grid");
        }
        self.tile_size = Some(tile_size);
        Ok(())
    }

    pub fn tile_size(&self) -> Result<f64> {
        self.tile_size.ok_or(WorldError::TileIndexUnconfigured)
    }

    pub fn tile_coord(&self, x: f64, y: f64) -> Result<TileCoord> {
        let size = self.tile_size()?;
        Ok(TileCoord::new(
            (x / size).floor() as i32,
            (y / size).floor() as i32,
        ))
    }

    /// Tile containing `position` (an adjusted world-space coordinate).
    pub fn active_tile_for(&self, position: Coordinate) -> Result<TileCoord> {
        self.tile_coord(position.x, position.y)
    }

    pub fn active_tile(&self) -> TileCoord {
        self.active
    }

    pub fn radius(&self) -> VisibilityRadius {
        self.radius
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn bucket(&self, coord: TileCoord) -> Option<&TileBucket> {
        self.buckets.get(&coord)
    }

    pub fn buckets(&self) -> impl Iterator<Item = &TileBucket> {
        self.buckets.values()
    }

    // -----------------------------------------------------------------------
    // Insertion
    // -----------------------------------------------------------------------

    /// Register `id` in every bucket its footprint touches, inclusive of the
    /// far edge.  New members and their descendants start off-screen.
    pub fn insert(&mut self, graph: &mut SceneGraph, id: NodeId) -> Result<Vec<TileCoord>> {
        let fp = graph.footprint(id)?;
        let start = self.tile_coord(fp.left, fp.top)?;
        let end = self.tile_coord(fp.left + fp.width, fp.top + fp.length)?;

        let mut touched = Vec::new();
        for column in start.column..=end.column {
            for row in start.row..=end.row {
                let coord = TileCoord::new(column, row);
                match self.buckets.entry(coord) {
                    Entry::Occupied(mut e) => e.get_mut().push(id),
                    Entry::Vacant(v) => v.insert(TileBucket::new(coord)).push(id),
                }
                touched.push(coord);
            }
        }
        graph.set_offscreen_subtree(id, true)?;
        Ok(touched)
    }

    // -----------------------------------------------------------------------
    // Active tile + visibility
    // -----------------------------------------------------------------------

    /// Update the active tile; returns `true` if it changed.
    pub fn set_active_tile(&mut self, tile: TileCoord) -> bool {
        if tile == self.active {
            return false;
        }
        debug!("Active tile {} -> {}", self.active, tile);
        self.active = tile;
        true
    }

    /// Update the visibility radius; returns `true` if it changed.
    pub fn set_radius(&mut self, radius: VisibilityRadius) -> bool {
        if radius == self.radius {
            return false;
        }
        debug!(
            "Visibility radius {}x{} -> {}x{}",
            self.radius.columns, self.radius.rows, radius.columns, radius.rows
        );
        self.radius = radius;
        true
    }

    /// Whether `coord` lies inside the window centred on `active`.
    ///
    /// The row window extends at least one row upwards so a one-row window
    /// never collapses onto the active row alone.
    pub fn in_window(coord: TileCoord, active: TileCoord, radius: VisibilityRadius) -> bool {
        let half_cols = f64::from(radius.columns) / 2.0;
        let half_rows = f64::from(radius.rows) / 2.0;
        let (col, row) = (f64::from(active.column), f64::from(active.row));
        let (c, r) = (f64::from(coord.column), f64::from(coord.row));

        c >= col - half_cols
            && c <= col + half_cols
            && r >= row - half_rows.max(1.0)
            && r <= row + half_rows
    }

    /// Mark every member of an in-range bucket on-screen and every node seen
    /// only in out-of-range buckets off-screen.  Group descendants follow
    /// their root.  Returns the flags that actually flipped.
    pub fn recompute_visibility(
        &mut self,
        active: TileCoord,
        radius: VisibilityRadius,
        graph: &mut SceneGraph,
    ) -> Result<Vec<VisibilityChange>> {
        self.set_active_tile(active);
        self.set_radius(radius);

        let mut in_range: HashSet<NodeId> = HashSet::new();
        let mut members: Vec<NodeId> = Vec::new();
        let mut seen: HashSet<NodeId> = HashSet::new();

        for bucket in self.buckets.values() {
            let visible = Self::in_window(bucket.coord, active, radius);
            for &id in &bucket.nodes {
                if visible {
                    in_range.insert(id);
                }
                if seen.insert(id) {
                    members.push(id);
                }
            }
        }

        members.sort_unstable();
        let mut changes = Vec::new();
        for id in members {
            let offscreen = !in_range.contains(&id);
            for node in graph.set_offscreen_subtree(id, offscreen)? {
                changes.push(VisibilityChange { node, offscreen });
            }
        }
        Ok(changes)
    }

    /// Broad-phase candidates: members of the active tile's bucket only.
    pub fn nodes_in_active_tile(&self) -> &[NodeId] {
        self.nodes_in_tile(self.active)
    }

    pub fn nodes_in_tile(&self, coord: TileCoord) -> &[NodeId] {
        self.buckets
            .get(&coord)
            .map(|b| b.nodes.as_slice())
            .unwrap_or(&[])
    }

    /// Bucket contents as sorted sets, keyed by tile.  Two builds of the same
    /// document compare equal here.
    pub fn membership(&self) -> std::collections::BTreeMap<TileCoord, Vec<NodeId>> {
        self.buckets
            .iter()
            .map(|(coord, b)| {
                let mut ids = b.nodes.clone();
                ids.sort_unstable();
                (*coord, ids)
            })
            .collect()
    }
}
