//! Scene graph unit tests

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use tileworld::scene::{Footprint, OcclusionChange};
    use tileworld::types::SessionId;
    use tileworld::{Coordinate, NodeDefinition, NodeId, SceneGraph, WorldDefinition, WorldError};

    fn definitions(objects: Value) -> Vec<NodeDefinition> {
        let doc = json!({
            "width": 1000, "length": 1000,
            "spawn": [0, 0, 0],
            "perspective": 600,
            "speed": [5, 15],
            "zoom": [-300, 400],
            "tileSize": 100,
            "objects": objects
        });
        WorldDefinition::from_json(&doc.to_string())
            .unwrap()
            .nodes()
            .unwrap()
    }

    fn graph(objects: Value) -> SceneGraph {
        SceneGraph::from_definitions(SessionId(1), &definitions(objects)).unwrap()
    }

    fn id(g: &SceneGraph, label: &str) -> NodeId {
        g.find_by_label(label).unwrap()
    }

    fn c(x: f64, y: f64, z: f64) -> Coordinate {
        Coordinate::new(x, y, z)
    }

    // -----------------------------------------------------------------------
    // Build
    // -----------------------------------------------------------------------

    #[test]
    fn queries_before_build_fail() {
        let defs = definitions(json!([{ "type": "solid", "size": [10, 10, 10] }]));
        let mut g = SceneGraph::new(SessionId(1));
        let solid = g.add_root(&defs[0]);

        assert!(!g.get(solid).unwrap().is_built());
        assert!(matches!(
            g.intersects_agent(solid, c(5.0, 5.0, 5.0), 1.0, 0.0),
            Err(WorldError::NotBuilt(_))
        ));
        assert!(matches!(
            g.contains_footprint(solid, c(5.0, 5.0, 5.0)),
            Err(WorldError::NotBuilt(_))
        ));

        g.build(solid).unwrap();
        assert!(g.intersects_agent(solid, c(5.0, 5.0, 5.0), 1.0, 0.0).unwrap());
    }

    #[test]
    fn build_reaches_nested_children() {
        let g = graph(json!([
            { "type": "group", "label": "outer", "objects": [
                { "type": "group", "label": "inner", "objects": [
                    { "type": "solid", "label": "leaf", "size": [1, 1, 1] }
                ]}
            ]}
        ]));
        assert_eq!(g.len(), 3);
        assert_eq!(g.roots(), &[id(&g, "outer")]);
        let leaf = g.get(id(&g, "leaf")).unwrap();
        assert!(leaf.is_built());
        assert!(leaf.precomputed_box().is_some());
    }

    #[test]
    fn unknown_ids_are_reported() {
        let g = graph(json!([]));
        assert!(matches!(g.get(NodeId(7)), Err(WorldError::UnknownNode(NodeId(7)))));
    }

    #[test]
    fn move_to_refreshes_cached_box() {
        let mut g = graph(json!([{ "type": "solid", "label": "s", "size": [10, 10, 10] }]));
        let s = id(&g, "s");
        g.move_to(s, c(100.0, 0.0, 0.0)).unwrap();
        assert!(g.intersects_agent(s, c(105.0, 5.0, 5.0), 1.0, 0.0).unwrap());
        assert!(!g.intersects_agent(s, c(5.0, 5.0, 5.0), 1.0, 0.0).unwrap());
    }

    // -----------------------------------------------------------------------
    // Group frames
    // -----------------------------------------------------------------------

    #[test]
    fn group_translates_queries_into_its_frame() {
        let mut g = graph(json!([
            { "type": "group", "label": "g", "position": [100, 100, 0], "objects": [
                { "type": "solid", "label": "s", "size": [50, 50, 50] }
            ]}
        ]));
        let (group, solid) = (id(&g, "g"), id(&g, "s"));
        let world_point = c(125.0, 125.0, 10.0);

        // Groups never claim containment themselves.
        assert!(!g.contains_footprint(group, world_point).unwrap());
        assert!(g.intersects_agent(group, world_point, 1.0, 0.0).unwrap());

        let mut changes = Vec::new();
        g.update_occlusion(group, world_point, &mut changes).unwrap();
        assert!(g.get(solid).unwrap().is_occluded());
        assert_eq!(changes, vec![OcclusionChange { node: solid, occluded: true }]);
    }

    #[test]
    fn group_footprint_covers_children() {
        let g = graph(json!([
            { "type": "group", "label": "g", "position": [100, 100, 0], "objects": [
                { "type": "solid", "position": [50, -20, 0], "size": [30, 30, 10] }
            ]}
        ]));
        assert_eq!(
            g.footprint(id(&g, "g")).unwrap(),
            Footprint { left: 100.0, top: 80.0, width: 80.0, length: 30.0 }
        );
    }

    // -----------------------------------------------------------------------
    // Landing + support
    // -----------------------------------------------------------------------

    #[test]
    fn ground_never_blocks_and_always_lands() {
        let g = graph(json!([
            { "type": "ground", "label": "floor", "position": [0, 0, 5], "size": [100, 100, 10] }
        ]));
        let floor = id(&g, "floor");
        let p = c(500.0, -40.0, 0.0);
        assert!(!g.intersects_agent(floor, p, 10.0, 0.0).unwrap());
        assert!(!g.contains_footprint(floor, p).unwrap());
        assert_eq!(
            g.resolve_landing(floor, p, 10.0, 0.0).unwrap(),
            Some(c(500.0, -40.0, 15.0))
        );
    }

    #[test]
    fn solid_offers_no_landing() {
        let g = graph(json!([{ "type": "solid", "label": "s", "size": [10, 10, 10] }]));
        assert_eq!(g.resolve_landing(id(&g, "s"), c(5.0, 5.0, 5.0), 1.0, 0.0).unwrap(), None);
    }

    #[test]
    fn group_landing_takes_first_child_in_order() {
        let g = graph(json!([
            { "type": "group", "label": "g", "objects": [
                { "type": "solid", "size": [10, 10, 100] },
                { "type": "ground", "size": [10, 10, 5] },
                { "type": "ground", "size": [10, 10, 20] }
            ]}
        ]));
        let landing = g.resolve_landing(id(&g, "g"), c(5.0, 5.0, 0.0), 1.0, 0.0).unwrap();
        assert_eq!(landing, Some(c(5.0, 5.0, 5.0)));
    }

    #[test]
    fn group_landing_is_returned_in_the_callers_frame() {
        let g = graph(json!([
            { "type": "group", "label": "g", "position": [10, 20, 50], "objects": [
                { "type": "ground", "size": [10, 10, 5] }
            ]}
        ]));
        let landing = g.resolve_landing(id(&g, "g"), c(15.0, 25.0, 0.0), 1.0, 0.0).unwrap();
        assert_eq!(landing, Some(c(15.0, 25.0, 55.0)));
    }

    #[test]
    fn offscreen_flag_covers_the_whole_subtree() {
        let mut g = nested_occlusion_graph();
        let root = id(&g, "g");
        let changed = g.set_offscreen_subtree(root, true).unwrap();
        assert_eq!(changed.len(), 4);
        assert!(g.ids().all(|n| g.get(n).unwrap().is_offscreen()));
        assert!(g.set_offscreen_subtree(root, true).unwrap().is_empty());
    }

    #[test]
    fn support_height_is_shifted_by_group_base() {
        let g = graph(json!([
            { "type": "group", "label": "g", "position": [0, 0, 20], "objects": [
                { "type": "solid", "size": [50, 50, 30] }
            ]}
        ]));
        let group = id(&g, "g");
        assert_eq!(g.support_height(group, c(10.0, 10.0, 100.0)).unwrap(), Some(50.0));
        // Below the top surface: nothing to stand on.
        assert_eq!(g.support_height(group, c(10.0, 10.0, 40.0)).unwrap(), None);
        // Outside the footprint.
        assert_eq!(g.support_height(group, c(80.0, 10.0, 100.0)).unwrap(), None);
    }

    // -----------------------------------------------------------------------
    // Sweeps
    // -----------------------------------------------------------------------

    #[test]
    fn sweep_detects_paths_through_solids() {
        let g = graph(json!([{ "type": "solid", "label": "s", "size": [10, 10, 10] }]));
        let s = id(&g, "s");
        assert!(g.sweep_intersects(s, c(-20.0, 5.0, 5.0), c(20.0, 5.0, 5.0), 1.0).unwrap());
        assert!(!g.sweep_intersects(s, c(-20.0, 50.0, 5.0), c(20.0, 50.0, 5.0), 1.0).unwrap());
    }

    // -----------------------------------------------------------------------
    // Occlusion
    // -----------------------------------------------------------------------

    fn nested_occlusion_graph() -> SceneGraph {
        graph(json!([
            { "type": "group", "label": "g", "objects": [
                { "type": "solid", "label": "s", "size": [10, 10, 10] },
                { "type": "group", "label": "n", "objects": [
                    { "type": "solid", "label": "t", "position": [100, 100, 0], "size": [10, 10, 10] }
                ]}
            ]}
        ]))
    }

    #[test]
    fn leaf_containment_hides_sibling_groups_but_not_the_parent() {
        let mut g = nested_occlusion_graph();
        let (root, s, n, t) = (id(&g, "g"), id(&g, "s"), id(&g, "n"), id(&g, "t"));

        let mut changes = Vec::new();
        g.update_occlusion(root, c(5.0, 5.0, 0.0), &mut changes).unwrap();

        assert!(g.get(s).unwrap().is_occluded());
        assert!(g.get(n).unwrap().is_occluded());
        assert!(!g.get(t).unwrap().is_occluded());
        assert!(!g.get(root).unwrap().is_occluded());
        assert_eq!(
            changes,
            vec![
                OcclusionChange { node: s, occluded: true },
                OcclusionChange { node: n, occluded: true },
            ]
        );
    }

    #[test]
    fn nested_leaves_decide_for_themselves() {
        let mut g = nested_occlusion_graph();
        let (root, s, n, t) = (id(&g, "g"), id(&g, "s"), id(&g, "n"), id(&g, "t"));

        let mut changes = Vec::new();
        g.update_occlusion(root, c(5.0, 5.0, 0.0), &mut changes).unwrap();
        changes.clear();
        g.update_occlusion(root, c(105.0, 105.0, 0.0), &mut changes).unwrap();

        assert!(!g.get(s).unwrap().is_occluded());
        assert!(!g.get(n).unwrap().is_occluded());
        assert!(g.get(t).unwrap().is_occluded());
        assert_eq!(changes.len(), 3);
    }

    #[test]
    fn repeated_occlusion_pass_reports_nothing() {
        let mut g = nested_occlusion_graph();
        let root = id(&g, "g");
        let mut changes = Vec::new();
        g.update_occlusion(root, c(5.0, 5.0, 0.0), &mut changes).unwrap();
        changes.clear();
        g.update_occlusion(root, c(5.0, 5.0, 0.0), &mut changes).unwrap();
        assert!(changes.is_empty());
    }
}
