//! Scene node model: solids, groups and grounds stored in a flat arena.
//!
//! A [`SceneGraph`] owns every node.  Groups refer to their children by
//! [`NodeId`] in declared order; roots are owned by the graph itself.  Each
//! node carries its visibility flags (`occluded`, `offscreen`) so the only
//! writer is whoever holds `&mut SceneGraph`.
//!
//! Point queries against a group are translated into the group's frame by
//! subtracting the group position before they reach the children.

use crate::definition::{NodeCommon, NodeDefinition};
use crate::error::{Result, WorldError};
use crate::geometry::{
    point_in_footprint, segment_aabb_distance_squared, sphere_intersects_box, PrecomputedBox,
};
use crate::types::{Coordinate, SessionId};
use log::debug;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Ids
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Node record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Six-sided box.  `precomputed` is `None` until `build()`.
    Solid { precomputed: Option<PrecomputedBox> },
    /// Ordered children; order decides first-match-wins queries.
    Group { children: Vec<NodeId> },
    /// Walkable plane of unbounded footprint.
    Ground { style: Option<String> },
}

#[derive(Debug, Clone)]
pub struct SceneNode {
    pub label: Option<String>,
    pub owner: SessionId,
    position: Coordinate,
    size: Coordinate,
    rotation: Coordinate,
    kind: NodeKind,
    built: bool,
    occluded: bool,
    offscreen: bool,
}

impl SceneNode {
    fn new(common: &NodeCommon, kind: NodeKind, owner: SessionId) -> Self {
        Self {
            label: common.label.clone(),
            owner,
            position: common.position,
            size: common.size,
            rotation: common.rotation,
            kind,
            built: false,
            occluded: false,
            offscreen: false,
        }
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, NodeKind::Group { .. })
    }

    pub fn position(&self) -> Coordinate {
        self.position
    }

    pub fn size(&self) -> Coordinate {
        self.size
    }

    pub fn rotation(&self) -> Coordinate {
        self.rotation
    }

    pub fn width(&self) -> f64 {
        self.size.x
    }

    pub fn length(&self) -> f64 {
        self.size.y
    }

    pub fn height(&self) -> f64 {
        self.size.z
    }

    pub fn left(&self) -> f64 {
        self.position.x
    }

    pub fn top(&self) -> f64 {
        self.position.y
    }

    /// Ground offset of the node (position z).
    pub fn base(&self) -> f64 {
        self.position.z
    }

    /// Vertical extent (size z).
    pub fn depth(&self) -> f64 {
        self.size.z
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    pub fn is_occluded(&self) -> bool {
        self.occluded
    }

    pub fn is_offscreen(&self) -> bool {
        self.offscreen
    }

    pub fn precomputed_box(&self) -> Option<&PrecomputedBox> {
        match &self.kind {
            NodeKind::Solid { precomputed } => precomputed.as_ref(),
            _ => None,
        }
    }

    fn refresh_box(&mut self) {
        let (position, size, rotation) = (self.position, self.size, self.rotation);
        if let NodeKind::Solid { precomputed } = &mut self.kind {
            *precomputed = Some(PrecomputedBox::new(position, size, rotation));
        }
    }
}

/// Axis-aligned top-down rectangle, `left..left+width` × `top..top+length`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Footprint {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub length: f64,
}

impl Footprint {
    fn union(self, other: Self) -> Self {
        let left = self.left.min(other.left);
        let top = self.top.min(other.top);
        let right = (self.left + self.width).max(other.left + other.width);
        let bottom = (self.top + self.length).max(other.top + other.length);
        Self {
            left,
            top,
            width: right - left,
            length: bottom - top,
        }
    }

    fn offset(self, by: Coordinate) -> Self {
        Self {
            left: self.left + by.x,
            top: self.top + by.y,
            ..self
        }
    }
}

/// One flag flip produced by an occlusion pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcclusionChange {
    pub node: NodeId,
    pub occluded: bool,
}

// ---------------------------------------------------------------------------
// Arena
// ---------------------------------------------------------------------------

pub struct SceneGraph {
    owner: SessionId,
    nodes: Vec<SceneNode>,
    roots: Vec<NodeId>,
}

impl SceneGraph {
    pub fn new(owner: SessionId) -> Self {
        Self {
            owner,
            nodes: Vec::new(),
            roots: Vec::new(),
        }
    }

    /// Instantiate `defs` as roots, building every node.
    pub fn from_definitions(owner: SessionId, defs: &[NodeDefinition]) -> Result<Self> {
        let mut graph = Self::new(owner);
        for def in defs {
            let id = graph.add_root(def);
            graph.build(id)?;
        }
        debug!(
            "Built scene for {}: {} nodes, {} roots",
            owner,
            graph.len(),
            graph.roots.len()
        );
        Ok(graph)
    }

    pub fn owner(&self) -> SessionId {
        self.owner
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn get(&self, id: NodeId) -> Result<&SceneNode> {
        self.nodes.get(id.0).ok_or(WorldError::UnknownNode(id))
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut SceneNode> {
        self.nodes.get_mut(id.0).ok_or(WorldError::UnknownNode(id))
    }

    /// First node carrying `label`, in arena order.
    pub fn find_by_label(&self, label: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.label.as_deref() == Some(label))
            .map(NodeId)
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// Insert `def` (and its subtree) as a root.  Call [`Self::build`] before
    /// querying it.
    pub fn add_root(&mut self, def: &NodeDefinition) -> NodeId {
        let id = self.insert(def);
        self.roots.push(id);
        id
    }

    fn insert(&mut self, def: &NodeDefinition) -> NodeId {
        let kind = match def {
            NodeDefinition::Solid(_) => NodeKind::Solid { precomputed: None },
            NodeDefinition::Group { children, .. } => NodeKind::Group {
                children: children.iter().map(|c| self.insert(c)).collect(),
            },
            NodeDefinition::Ground { style, .. } => NodeKind::Ground {
                style: style.clone(),
            },
        };
        let id = NodeId(self.nodes.len());
        self.nodes.push(SceneNode::new(def.common(), kind, self.owner));
        id
    }

    /// Finalize cached geometry for `id` and its descendants.
    pub fn build(&mut self, id: NodeId) -> Result<()> {
        let children = match &self.get(id)?.kind {
            NodeKind::Group { children } => children.clone(),
            _ => Vec::new(),
        };
        for child in children {
            self.build(child)?;
        }
        let node = self.get_mut(id)?;
        node.refresh_box();
        node.built = true;
        Ok(())
    }

    /// Move a node (position relative to its parent) and refresh its cache.
    pub fn move_to(&mut self, id: NodeId, to: Coordinate) -> Result<()> {
        if !to.is_finite() {
            return Err(WorldError::InvalidCoordinate(format!("move target {to}")));
        }
        let node = self.get_mut(id)?;
        node.position = to;
        if node.built {
            node.refresh_box();
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    fn built(&self, id: NodeId) -> Result<&SceneNode> {
        let node = self.get(id)?;
        if !node.built {
            return Err(WorldError::NotBuilt(id));
        }
        Ok(node)
    }

    fn solid_box(&self, id: NodeId, node: &SceneNode) -> Result<PrecomputedBox> {
        node.precomputed_box().copied().ok_or(WorldError::NotBuilt(id))
    }

    /// Does an agent sphere at `point` touch this node?
    pub fn intersects_agent(
        &self,
        id: NodeId,
        point: Coordinate,
        radius: f64,
        height: f64,
    ) -> Result<bool> {
        let node = self.built(id)?;
        match &node.kind {
            NodeKind::Solid { .. } => {
                let bx = self.solid_box(id, node)?;
                Ok(sphere_intersects_box(point, radius, &bx))
            }
            NodeKind::Group { children } => {
                let local = point.sub(node.position);
                for &child in children {
                    if self.intersects_agent(child, local, radius, height)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            NodeKind::Ground { .. } => Ok(false),
        }
    }

    /// Does the segment `from..to` pass within `radius` of any solid in this
    /// subtree?  Grounds never block.
    pub fn sweep_intersects(&self, id: NodeId, from: Coordinate, to: Coordinate, radius: f64) -> Result<bool> {
        let node = self.built(id)?;
        match &node.kind {
            NodeKind::Solid { .. } => {
                let bx = self.solid_box(id, node)?;
                let inflated = bx.half_extents.add(Coordinate::new(radius, radius, radius));
                let d = segment_aabb_distance_squared(bx.to_local(from), bx.to_local(to), inflated);
                Ok(d == 0.0)
            }
            NodeKind::Group { children } => {
                let (from, to) = (from.sub(node.position), to.sub(node.position));
                for &child in children {
                    if self.sweep_intersects(child, from, to, radius)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            NodeKind::Ground { .. } => Ok(false),
        }
    }

    /// Top-down footprint containment.  Only solids can answer `true`.
    pub fn contains_footprint(&self, id: NodeId, point: Coordinate) -> Result<bool> {
        let node = self.built(id)?;
        match &node.kind {
            NodeKind::Solid { .. } => Ok(point_in_footprint(point, &self.solid_box(id, node)?)),
            NodeKind::Group { .. } | NodeKind::Ground { .. } => Ok(false),
        }
    }

    /// Surface this node offers the agent at `point`, if any.
    ///
    /// Groups answer with the first child that offers one, in declared order,
    /// shifted back into the caller's frame.
    pub fn resolve_landing(
        &self,
        id: NodeId,
        point: Coordinate,
        radius: f64,
        height: f64,
    ) -> Result<Option<Coordinate>> {
        let node = self.built(id)?;
        match &node.kind {
            NodeKind::Solid { .. } => Ok(None),
            NodeKind::Ground { .. } => Ok(Some(Coordinate::new(
                point.x,
                point.y,
                node.base() + node.depth(),
            ))),
            NodeKind::Group { children } => {
                let local = point.sub(node.position);
                for &child in children {
                    if let Some(landing) = self.resolve_landing(child, local, radius, height)? {
                        return Ok(Some(landing.add(node.position)));
                    }
                }
                Ok(None)
            }
        }
    }

    /// Highest surface at or below `point.z` that can hold the agent,
    /// expressed in the caller's frame.
    ///
    /// Grounds support everywhere; solids support when the point is inside
    /// their footprint; groups recurse and shift child heights back by their
    /// own z.
    pub fn support_height(&self, id: NodeId, point: Coordinate) -> Result<Option<f64>> {
        let node = self.built(id)?;
        let surface = match &node.kind {
            NodeKind::Ground { .. } => Some(node.base() + node.depth()),
            NodeKind::Solid { .. } => {
                if point_in_footprint(point, &self.solid_box(id, node)?) {
                    Some(node.base() + node.depth())
                } else {
                    None
                }
            }
            NodeKind::Group { children } => {
                let local = point.sub(node.position);
                let mut best: Option<f64> = None;
                for &child in children {
                    if let Some(h) = self.support_height(child, local)? {
                        let h = h + node.position.z;
                        best = Some(best.map_or(h, |b| b.max(h)));
                    }
                }
                best
            }
        };
        Ok(surface.filter(|&h| h <= point.z))
    }

    /// Axis-aligned footprint used for tile bucketing.
    ///
    /// Groups cover their own declared rectangle plus every child footprint
    /// shifted into the parent frame.
    pub fn footprint(&self, id: NodeId) -> Result<Footprint> {
        let node = self.get(id)?;
        let own = Footprint {
            left: node.left(),
            top: node.top(),
            width: node.width(),
            length: node.length(),
        };
        match &node.kind {
            NodeKind::Group { children } => {
                let mut fp = own;
                for &child in children {
                    fp = fp.union(self.footprint(child)?.offset(node.position));
                }
                Ok(fp)
            }
            _ => Ok(own),
        }
    }

    // -----------------------------------------------------------------------
    // Visibility flags
    // -----------------------------------------------------------------------

    /// Set the occluded flag, returning `true` if it changed.
    pub fn set_occluded(&mut self, id: NodeId, hidden: bool) -> Result<bool> {
        let node = self.get_mut(id)?;
        let changed = node.occluded != hidden;
        node.occluded = hidden;
        Ok(changed)
    }

    /// Set the off-screen flag, returning `true` if it changed.
    pub fn set_offscreen(&mut self, id: NodeId, offscreen: bool) -> Result<bool> {
        let node = self.get_mut(id)?;
        let changed = node.offscreen != offscreen;
        node.offscreen = offscreen;
        Ok(changed)
    }

    /// Set the off-screen flag on `id` and every descendant, returning the
    /// nodes whose flag changed.
    pub fn set_offscreen_subtree(&mut self, id: NodeId, offscreen: bool) -> Result<Vec<NodeId>> {
        let mut changed = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if self.set_offscreen(next, offscreen)? {
                changed.push(next);
            }
            if let NodeKind::Group { children } = &self.get(next)?.kind {
                stack.extend(children.iter().rev().copied());
            }
        }
        Ok(changed)
    }

    /// Re-evaluate occlusion for `id` against `point` (in `id`'s parent
    /// frame), appending every flag flip to `changes`.
    ///
    /// Leaves decide for themselves from their containment test.  A group
    /// never occludes itself; it hides its nested groups when any of its
    /// direct non-group children contains the point, then lets each nested
    /// group run the same pass for its own children.
    pub fn update_occlusion(
        &mut self,
        id: NodeId,
        point: Coordinate,
        changes: &mut Vec<OcclusionChange>,
    ) -> Result<()> {
        let node = self.built(id)?;
        let NodeKind::Group { children } = &node.kind else {
            let hidden = self.contains_footprint(id, point)?;
            if self.set_occluded(id, hidden)? {
                changes.push(OcclusionChange { node: id, occluded: hidden });
            }
            return Ok(());
        };

        let local = point.sub(node.position);
        let children = children.clone();
        let (groups, leaves): (Vec<NodeId>, Vec<NodeId>) = children
            .into_iter()
            .partition(|&c| self.nodes[c.0].is_group());

        let mut hide_groups = false;
        for leaf in leaves {
            self.update_occlusion(leaf, local, changes)?;
            hide_groups |= self.nodes[leaf.0].occluded;
        }
        for group in groups {
            if self.set_occluded(group, hide_groups)? {
                changes.push(OcclusionChange {
                    node: group,
                    occluded: hide_groups,
                });
            }
            self.update_occlusion(group, local, changes)?;
        }
        Ok(())
    }
}
