//! Movement resolver unit tests

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use tileworld::movement::{displacement, SpeedBounds, WorldFrame};
    use tileworld::types::SessionId;
    use tileworld::{
        Agent, Command, CommandSet, Coordinate, MoveOutcome, MovementResolver, SceneGraph,
        TileIndex, WorldDefinition,
    };

    const AGENT_SIZE: Coordinate = Coordinate::new(30.0, 30.0, 60.0);

    struct Fixture {
        graph: SceneGraph,
        tiles: TileIndex,
        resolver: MovementResolver,
    }

    /// 1000×1000 world with the given nodes, tiles of `tile_size`, active
    /// tile set to wherever `agent` stands.
    fn fixture(objects: Value, tile_size: f64, agent: &Agent) -> Fixture {
        let doc = json!({
            "width": 1000, "length": 1000,
            "spawn": [0, 0, 0],
            "perspective": 600,
            "speed": [5, 15],
            "zoom": [-300, 400],
            "tileSize": tile_size,
            "objects": objects
        });
        let nodes = WorldDefinition::from_json(&doc.to_string())
            .unwrap()
            .nodes()
            .unwrap();
        let mut graph = SceneGraph::from_definitions(SessionId(1), &nodes).unwrap();
        let mut tiles = TileIndex::new();
        tiles.configure(tile_size).unwrap();
        for root in graph.roots().to_vec() {
            tiles.insert(&mut graph, root).unwrap();
        }

        let resolver = MovementResolver::new(WorldFrame::new(1000.0, 1000.0));
        let active = tiles
            .active_tile_for(resolver.frame().adjust(agent.position))
            .unwrap();
        tiles.set_active_tile(active);
        Fixture { graph, tiles, resolver }
    }

    fn commands(list: &[Command]) -> CommandSet {
        list.iter().copied().collect()
    }

    // -----------------------------------------------------------------------
    // Displacement
    // -----------------------------------------------------------------------

    #[test]
    fn displacement_follows_screen_directions() {
        let speed = SpeedBounds::new(5.0, 15.0);
        assert_eq!(displacement(&commands(&[Command::MoveLeft]), speed), Some((-5.0, 0.0)));
        assert_eq!(displacement(&commands(&[Command::MoveRight]), speed), Some((5.0, 0.0)));
        assert_eq!(displacement(&commands(&[Command::MoveUp]), speed), Some((0.0, -5.0)));
        assert_eq!(displacement(&commands(&[Command::MoveDown]), speed), Some((0.0, 5.0)));
        assert_eq!(
            displacement(&commands(&[Command::MoveDown, Command::MoveRight, Command::Sprint]), speed),
            Some((15.0, 15.0))
        );
    }

    #[test]
    fn opposing_or_missing_directions_do_not_move() {
        let speed = SpeedBounds::new(5.0, 15.0);
        assert_eq!(displacement(&CommandSet::new(), speed), None);
        assert_eq!(displacement(&commands(&[Command::Sprint]), speed), None);
        assert_eq!(
            displacement(&commands(&[Command::MoveLeft, Command::MoveRight]), speed),
            None
        );
    }

    #[test]
    fn frame_adjust_maps_centre_to_middle_of_world() {
        let frame = WorldFrame::new(1000.0, 1000.0);
        assert_eq!(frame.adjust(Coordinate::new(500.0, 500.0, 7.0)), Coordinate::new(0.0, 0.0, 7.0));
        assert_eq!(frame.adjust(Coordinate::zero()), Coordinate::new(500.0, 500.0, 0.0));
    }

    #[test]
    fn hitbox_radius_is_a_third_of_width() {
        let agent = Agent::new(AGENT_SIZE, Coordinate::zero());
        assert_eq!(agent.hitbox_radius(), 10.0);
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    #[test]
    fn move_into_a_solid_in_the_target_tile_is_rejected() {
        // Agent at world corner (0, 0), moving onto the solid's corner at (500, 500).
        let agent = Agent::new(AGENT_SIZE, Coordinate::new(500.0, 500.0, 0.0));
        let f = fixture(
            json!([{ "type": "solid", "position": [500, 500, 0], "size": [100, 100, 100] }]),
            100.0,
            &agent,
        );

        let outcome = f
            .resolver
            .resolve(&f.graph, &f.tiles, &agent, Coordinate::new(0.0, 0.0, 0.0))
            .unwrap();
        assert!(matches!(outcome, MoveOutcome::Rejected { ref blocked_by } if blocked_by.len() == 1));
        assert_eq!(outcome.position(), None);
    }

    #[test]
    fn clear_move_keeps_height_without_support() {
        let agent = Agent::new(AGENT_SIZE, Coordinate::new(0.0, 0.0, 40.0));
        let f = fixture(json!([]), 100.0, &agent);
        let outcome = f
            .resolver
            .resolve(&f.graph, &f.tiles, &agent, Coordinate::new(-5.0, 0.0, 0.0))
            .unwrap();
        assert_eq!(
            outcome,
            MoveOutcome::Moved {
                position: Coordinate::new(-5.0, 0.0, 40.0),
                stepped: false,
                fell: false,
            }
        );
    }

    #[test]
    fn clear_move_falls_onto_highest_surface_below() {
        // Agent at world (300, 300); a low ground everywhere and a 40-high
        // solid under the target.
        let agent = Agent::new(AGENT_SIZE, Coordinate::new(200.0, 200.0, 60.0));
        let f = fixture(
            json!([
                { "type": "ground", "size": [1000, 1000, 10] },
                { "type": "solid", "position": [250, 250, 0], "size": [100, 100, 40] }
            ]),
            1000.0,
            &agent,
        );
        let outcome = f
            .resolver
            .resolve(&f.graph, &f.tiles, &agent, Coordinate::new(195.0, 200.0, 0.0))
            .unwrap();
        assert_eq!(
            outcome,
            MoveOutcome::Moved {
                position: Coordinate::new(195.0, 200.0, 40.0),
                stepped: false,
                fell: true,
            }
        );
    }

    #[test]
    fn blocked_move_steps_onto_group_landing() {
        let agent = Agent::new(AGENT_SIZE, Coordinate::new(450.0, 450.0, 0.0));
        let f = fixture(
            json!([
                { "type": "group", "position": [0, 0, 0], "objects": [
                    { "type": "solid", "size": [100, 100, 30] },
                    { "type": "ground", "size": [100, 100, 30] }
                ]}
            ]),
            1000.0,
            &agent,
        );
        let outcome = f
            .resolver
            .resolve(&f.graph, &f.tiles, &agent, Coordinate::new(445.0, 450.0, 0.0))
            .unwrap();
        assert_eq!(
            outcome,
            MoveOutcome::Moved {
                position: Coordinate::new(445.0, 450.0, 30.0),
                stepped: true,
                fell: false,
            }
        );
    }

    #[test]
    fn step_up_inside_raised_group_lands_on_world_height() {
        // Group lifted to z 50; its ground child tops out at 30 locally.
        let agent = Agent::new(AGENT_SIZE, Coordinate::new(450.0, 450.0, 50.0));
        let f = fixture(
            json!([
                { "type": "group", "position": [0, 0, 50], "objects": [
                    { "type": "solid", "size": [100, 100, 30] },
                    { "type": "ground", "size": [100, 100, 30] }
                ]}
            ]),
            1000.0,
            &agent,
        );
        let target = Coordinate::new(445.0, 450.0, 0.0);
        let outcome = f.resolver.resolve(&f.graph, &f.tiles, &agent, target).unwrap();
        assert_eq!(
            outcome,
            MoveOutcome::Moved {
                position: Coordinate::new(445.0, 450.0, 80.0),
                stepped: true,
                fell: false,
            }
        );

        let group = f.graph.roots()[0];
        let surface = f
            .graph
            .support_height(group, Coordinate::new(55.0, 50.0, 100.0))
            .unwrap();
        assert_eq!(outcome.position().map(|p| p.z), surface);
    }

    #[test]
    fn settle_snaps_to_ground_top() {
        let agent = Agent::new(AGENT_SIZE, Coordinate::new(0.0, 0.0, 50.0));
        let f = fixture(json!([{ "type": "ground", "size": [1000, 1000, 10] }]), 100.0, &agent);
        assert_eq!(f.resolver.settle(&f.graph, &f.tiles, &agent).unwrap(), Some(10.0));

        let grounded = Agent::new(AGENT_SIZE, Coordinate::new(0.0, 0.0, 10.0));
        assert_eq!(f.resolver.settle(&f.graph, &f.tiles, &grounded).unwrap(), None);
    }

    // -----------------------------------------------------------------------
    // Swept moves
    // -----------------------------------------------------------------------

    fn wall_case() -> (Agent, Fixture, Coordinate) {
        // World x 85 → 115 across a 2-unit wall at x 100..102.
        let agent = Agent::new(AGENT_SIZE, Coordinate::new(415.0, 450.0, 50.0));
        let f = fixture(
            json!([{ "type": "solid", "position": [100, 0, 0], "size": [2, 100, 100] }]),
            1000.0,
            &agent,
        );
        (agent, f, Coordinate::new(385.0, 450.0, 0.0))
    }

    #[test]
    fn long_step_tunnels_through_thin_wall_by_default() {
        let (agent, f, target) = wall_case();
        let outcome = f.resolver.resolve(&f.graph, &f.tiles, &agent, target).unwrap();
        assert_eq!(outcome.position(), Some(Coordinate::new(385.0, 450.0, 50.0)));
    }

    #[test]
    fn swept_moves_block_tunnelling() {
        let (agent, f, target) = wall_case();
        let resolver = f.resolver.with_swept_moves(true);
        let outcome = resolver.resolve(&f.graph, &f.tiles, &agent, target).unwrap();
        assert!(matches!(outcome, MoveOutcome::Rejected { .. }));
    }
}
