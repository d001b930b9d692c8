//! WorldSession – owns the scene, the tile index and the agent, and drives
//! one movement resolution per tick.
//!
//! All mutation of node flags and the index happens through `&mut self`, so
//! a tick's movement, visibility and occlusion updates are applied together.

use crate::definition::WorldDefinition;
use crate::error::{Result, WorldError};
use crate::movement::{displacement, Agent, MoveOutcome, MovementResolver, SpeedBounds, WorldFrame};
use crate::protocol::{
    ActiveTileChanged, AgentMoved, MoveRejected, NodeState, TickEvents, WorldSnapshot,
};
use crate::scene::{NodeId, NodeKind, OcclusionChange, SceneGraph};
use crate::tiles::{visibility_radius, TileIndex, VisibilityChange, VisibilityRadius};
use crate::types::{CommandSet, Coordinate, SessionConfig, SessionId, WorldStats};
use log::{debug, info};

/// Camera depth change applied by one zoom step.
pub const ZOOM_STEP: f64 = 25.0;

pub struct WorldSession {
    id: SessionId,
    definition_id: String,
    config: SessionConfig,
    perspective: f64,
    zoom: [f64; 2],
    camera_depth_offset: f64,
    speed: SpeedBounds,
    resolver: MovementResolver,
    graph: SceneGraph,
    tiles: TileIndex,
    agent: Agent,
    settled: bool,
    tick_count: u64,
    accepted_moves: u64,
    rejected_moves: u64,
}

impl WorldSession {
    // -----------------------------------------------------------------------
    // Build
    // -----------------------------------------------------------------------

    /// Build the scene from `definition`, register every root in the tile
    /// index and compute the initial visibility window.
    pub fn build(definition: &WorldDefinition, config: SessionConfig) -> Result<Self> {
        definition.validate()?;
        let id = SessionId::next();

        let nodes = definition.nodes()?;
        let mut graph = SceneGraph::from_definitions(id, &nodes)?;

        let mut tiles = TileIndex::new();
        tiles.configure(definition.tile_size)?;
        for root in graph.roots().to_vec() {
            let touched = tiles.insert(&mut graph, root)?;
            debug!("Registered node {} in {} tile(s)", root, touched.len());
        }

        let frame = WorldFrame::new(definition.width, definition.length);
        let resolver = MovementResolver::new(frame).with_swept_moves(config.swept_moves);
        let [walk, sprint] = definition.speed;

        let mut session = Self {
            id,
            definition_id: definition.id.clone(),
            camera_depth_offset: 0.0,
            config,
            perspective: definition.perspective,
            zoom: definition.zoom,
            speed: SpeedBounds::new(walk, sprint),
            resolver,
            graph,
            tiles,
            agent: Agent::new(definition.agent_size, definition.spawn),
            settled: false,
            tick_count: 0,
            accepted_moves: 0,
            rejected_moves: 0,
        };
        session.camera_depth_offset = session.clamp_camera(session.config.camera_depth_offset);

        let active = session.tiles.active_tile_for(session.adjusted_position())?;
        let radius = session.current_radius()?;
        session
            .tiles
            .recompute_visibility(active, radius, &mut session.graph)?;
        session.refresh_occlusion()?;

        info!(
            "Built world '{}' as {} ({} nodes, {} tiles, agent at {})",
            session.definition_id,
            id,
            session.graph.len(),
            session.tiles.len(),
            session.agent.position
        );
        Ok(session)
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Advance one tick with the held `commands`.  With `delta_allowed`
    /// false (paused, not ready) the tick is counted but nothing moves.
    pub fn step(&mut self, commands: &CommandSet, delta_allowed: bool) -> Result<TickEvents> {
        self.tick_count += 1;
        let mut events = TickEvents::new(self.tick_count);
        if !delta_allowed {
            return Ok(events);
        }

        if !self.settled {
            self.settled = true;
            if let Some(z) = self.resolver.settle(&self.graph, &self.tiles, &self.agent)? {
                let p = self.agent.position;
                let landed = Coordinate::new(p.x, p.y, z);
                self.apply_position(landed, &mut events)?;
                events.moved = Some(AgentMoved {
                    x: landed.x,
                    y: landed.y,
                    z: landed.z,
                    stepped: false,
                    fell: true,
                });
            }
        }

        let Some((dx, dy)) = displacement(commands, self.speed) else {
            return Ok(events);
        };
        let p = self.agent.position;
        let target = Coordinate::new(p.x + dx, p.y + dy, p.z);

        match self
            .resolver
            .resolve(&self.graph, &self.tiles, &self.agent, target)?
        {
            MoveOutcome::Moved {
                position,
                stepped,
                fell,
            } => {
                self.accepted_moves += 1;
                self.apply_position(position, &mut events)?;
                events.moved = Some(AgentMoved {
                    x: position.x,
                    y: position.y,
                    z: position.z,
                    stepped,
                    fell,
                });
            }
            MoveOutcome::Rejected { blocked_by } => {
                self.rejected_moves += 1;
                debug!("Move to {} rejected by {:?}", target, blocked_by);
                events.rejected = Some(MoveRejected { blocked_by });
            }
        }
        Ok(events)
    }

    /// Place the agent without collision checks (spawn/respawn).
    pub fn teleport(&mut self, to: Coordinate) -> Result<TickEvents> {
        if !to.is_finite() {
            return Err(WorldError::InvalidCoordinate(format!("teleport target {to}")));
        }
        let mut events = TickEvents::new(self.tick_count);
        self.apply_position(to, &mut events)?;
        Ok(events)
    }

    fn apply_position(&mut self, position: Coordinate, events: &mut TickEvents) -> Result<()> {
        if position == self.agent.position {
            return Ok(());
        }
        self.agent.position = position;

        let tile = self.tiles.active_tile_for(self.adjusted_position())?;
        let previous = self.tiles.active_tile();
        if tile != previous {
            let radius = self.tiles.radius();
            let changes = self
                .tiles
                .recompute_visibility(tile, radius, &mut self.graph)?;
            events.visibility.extend(changes);
            events.tile_changed = Some(ActiveTileChanged {
                from: previous,
                to: tile,
            });
        }

        events.occlusion.extend(self.refresh_occlusion()?);
        Ok(())
    }

    /// Re-run the occlusion pass for every on-screen root against the
    /// agent's adjusted position.
    fn refresh_occlusion(&mut self) -> Result<Vec<OcclusionChange>> {
        let adjusted = self.adjusted_position();
        let mut changes = Vec::new();
        for root in self.graph.roots().to_vec() {
            if self.graph.get(root)?.is_offscreen() {
                continue;
            }
            self.graph.update_occlusion(root, adjusted, &mut changes)?;
        }
        Ok(changes)
    }

    // -----------------------------------------------------------------------
    // Viewport + zoom
    // -----------------------------------------------------------------------

    fn current_radius(&self) -> Result<VisibilityRadius> {
        self.radius_for(
            (self.config.viewport_width, self.config.viewport_height),
            self.camera_depth_offset,
        )
    }

    fn radius_for(&self, viewport: (f64, f64), camera_depth_offset: f64) -> Result<VisibilityRadius> {
        visibility_radius(
            viewport,
            self.perspective,
            camera_depth_offset,
            self.tiles.tile_size()?,
        )
    }

    /// Apply an already validated radius.  Roots that come back on-screen
    /// get a fresh occlusion pass.
    fn apply_radius(&mut self, radius: VisibilityRadius) -> Result<Vec<VisibilityChange>> {
        if radius == self.tiles.radius() {
            return Ok(Vec::new());
        }
        let active = self.tiles.active_tile();
        let changes = self
            .tiles
            .recompute_visibility(active, radius, &mut self.graph)?;
        if !changes.is_empty() {
            let occlusion = self.refresh_occlusion()?;
            debug!("Radius change re-evaluated occlusion: {} flip(s)", occlusion.len());
        }
        Ok(changes)
    }

    /// New viewport size; recomputes the window if the tile radius changed.
    /// On error the previous viewport is kept.
    pub fn resize_viewport(&mut self, width: f64, height: f64) -> Result<Vec<VisibilityChange>> {
        let radius = self.radius_for((width, height), self.camera_depth_offset)?;
        self.config.viewport_width = width;
        self.config.viewport_height = height;
        self.apply_radius(radius)
    }

    /// Camera depth range implied by the document's `zoom` bounds: the
    /// camera may approach up to `-zoom[0]` and retreat to `-zoom[1]`.
    pub fn camera_bounds(&self) -> (f64, f64) {
        (-self.zoom[1], -self.zoom[0])
    }

    fn clamp_camera(&self, offset: f64) -> f64 {
        let (lo, hi) = self.camera_bounds();
        offset.clamp(lo, hi)
    }

    pub fn camera_depth_offset(&self) -> f64 {
        self.camera_depth_offset
    }

    /// Move the camera within its bounds.  An offset that would put the
    /// camera at or behind the perspective depth is rejected and the current
    /// offset is kept.
    pub fn set_camera_depth_offset(&mut self, offset: f64) -> Result<Vec<VisibilityChange>> {
        let offset = self.clamp_camera(offset);
        let viewport = (self.config.viewport_width, self.config.viewport_height);
        let radius = self.radius_for(viewport, offset)?;
        self.camera_depth_offset = offset;
        self.apply_radius(radius)
    }

    pub fn zoom_in(&mut self) -> Result<Vec<VisibilityChange>> {
        self.set_camera_depth_offset(self.camera_depth_offset + ZOOM_STEP)
    }

    pub fn zoom_out(&mut self) -> Result<Vec<VisibilityChange>> {
        self.set_camera_depth_offset(self.camera_depth_offset - ZOOM_STEP)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// Centre-relative agent position.
    pub fn agent_position(&self) -> Coordinate {
        self.agent.position
    }

    /// Agent position in the world-space frame nodes are authored in.
    pub fn adjusted_position(&self) -> Coordinate {
        self.resolver.frame().adjust(self.agent.position)
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn tiles(&self) -> &TileIndex {
        &self.tiles
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn is_offscreen(&self, id: NodeId) -> Result<bool> {
        Ok(self.graph.get(id)?.is_offscreen())
    }

    pub fn is_occluded(&self, id: NodeId) -> Result<bool> {
        Ok(self.graph.get(id)?.is_occluded())
    }

    pub fn stats(&self) -> WorldStats {
        let nodes = || self.graph.ids().filter_map(|id| self.graph.get(id).ok());
        WorldStats {
            total_nodes: self.graph.len(),
            root_nodes: self.graph.roots().len(),
            tile_buckets: self.tiles.len(),
            onscreen_nodes: self
                .graph
                .roots()
                .iter()
                .filter_map(|&id| self.graph.get(id).ok())
                .filter(|n| !n.is_offscreen())
                .count(),
            occluded_nodes: nodes().filter(|n| n.is_occluded()).count(),
            total_ticks: self.tick_count,
            accepted_moves: self.accepted_moves,
            rejected_moves: self.rejected_moves,
        }
    }

    /// Full flag state for a renderer attaching mid-session.
    pub fn snapshot(&self) -> WorldSnapshot {
        let nodes = self
            .graph
            .ids()
            .filter_map(|id| self.graph.get(id).ok().map(|n| (id, n)))
            .map(|(id, n)| NodeState {
                id,
                kind: match n.kind() {
                    NodeKind::Solid { .. } => "solid",
                    NodeKind::Group { .. } => "group",
                    NodeKind::Ground { .. } => "ground",
                }
                .to_string(),
                label: n.label.clone(),
                offscreen: n.is_offscreen(),
                occluded: n.is_occluded(),
            })
            .collect();

        WorldSnapshot {
            session: self.id,
            frame: self.tick_count,
            agent: self.agent.position,
            active_tile: self.tiles.active_tile(),
            radius: self.tiles.radius(),
            nodes,
        }
    }
}
