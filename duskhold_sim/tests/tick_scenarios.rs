// End-to-end scenarios across a full simulation tick.
//
// Each test drives the real tick order: grid mutations issued by the
// command phase, the maintenance pass, task dispatch, then the searches
// dispatched tasks trigger. Unit tests in the modules pin individual
// operations; these pin the seams between them.

use duskhold_script::{NullScript, StaticScript};
use duskhold_sim::components::{
    Align, AlignState, DummyAlign, Graphics, GridNode, Pathfinding, Physics, Structure, Task,
    TaskHandler,
};
use duskhold_sim::entity::EntitySystem;
use duskhold_sim::grid::Grid;
use duskhold_sim::maintenance;
use duskhold_sim::pathfinding::{self, Octile};
use duskhold_sim::task;
use duskhold_sim::types::{Entity, TaskType, TaskTypeSet, Vec3};
use smallvec::SmallVec;

fn board(width: u32, height: u32) -> (EntitySystem, Grid) {
    let mut ents = EntitySystem::new();
    let grid = Grid::create(&mut ents, width, height, 1.0, Vec3::default());
    (ents, grid)
}

fn wall_blueprint() -> Align {
    let mut states: [AlignState; 6] = Default::default();
    for (i, state) in states.iter_mut().enumerate() {
        state.mesh = format!("wall_{i}");
        state.material = "stone".to_string();
        state.scale = Vec3::new(1.0, 1.0, 1.0);
    }
    Align { states }
}

fn spawn_wall(ents: &mut EntitySystem) -> Entity {
    let wall = ents.create_entity();
    ents.add(
        wall,
        Structure { radius: 0, walk_through: false, residences: SmallVec::new() },
    );
    ents.add(wall, wall_blueprint());
    ents.add(wall, Graphics::default());
    ents.add(wall, Physics::default());
    wall
}

fn spawn_walker(ents: &mut EntitySystem, x: f32, z: f32) -> Entity {
    let walker = ents.create_entity();
    ents.add(
        walker,
        Physics { position: Vec3::new(x, 0.0, z), ..Physics::default() },
    );
    ents.add(
        walker,
        Pathfinding { blueprint: "walker".to_string(), ..Pathfinding::default() },
    );
    ents.add(
        walker,
        TaskHandler {
            possible_tasks: TaskTypeSet::of(&[
                TaskType::GoTo,
                TaskType::GoKill,
                TaskType::Kill,
                TaskType::GetInRange,
            ]),
            ..TaskHandler::default()
        },
    );
    walker
}

#[test]
fn placement_tick_realigns_the_neighbourhood() {
    let (mut ents, mut grid) = board(3, 3);
    let mut script = NullScript;

    // Command phase: drop a radius-0 wall-like marker on the center.
    let marker = ents.create_entity();
    ents.add(
        marker,
        Structure { radius: 0, walk_through: false, residences: SmallVec::new() },
    );
    ents.add(marker, DummyAlign);
    let center = grid.get_node(1, 1);
    assert!(grid.place_structure(&mut ents, marker, center));
    assert!(!grid.area_free(&ents, center, 0));
    assert_eq!(grid.resident(&ents, center), marker);

    // Maintenance phase: the four cardinal neighbours each see exactly one
    // occupied cardinal.
    let report = maintenance::run(&mut ents, &mut grid, &mut script, &Octile);
    for (x, y) in [(1, 0), (1, 2), (0, 1), (2, 1)] {
        let node = grid.get_node(x, y);
        let entry = report.realigned.iter().find(|r| r.node == node).unwrap();
        assert_eq!(entry.state, 1);
    }
}

#[test]
fn wall_placed_across_a_route_repairs_or_strands_walkers() {
    let (mut ents, mut grid) = board(6, 3);
    let mut script = NullScript;
    let walker = spawn_walker(&mut ents, 0.0, 1.0);
    let target = grid.get_node(5, 1);
    assert!(pathfinding::pathfind(&mut ents, &grid, &mut script, &Octile, walker, target));

    // Tick 1: a wall lands on the straight route; repair finds the detour.
    let wall = spawn_wall(&mut ents);
    assert!(grid.place_structure(&mut ents, wall, grid.get_node(3, 1)));
    let report = maintenance::run(&mut ents, &mut grid, &mut script, &Octile);
    assert_eq!(report.repaired, vec![walker]);
    let record = ents.get::<Pathfinding>(walker).unwrap();
    assert_eq!(record.target, target);
    assert!(!record.path.contains(&grid.get_node(3, 1)));

    // Tick 2: the rest of the column fills in; the walker is stranded and
    // its plan cleared rather than left pointing at an unreachable goal.
    for y in [0, 2] {
        let wall = spawn_wall(&mut ents);
        assert!(grid.place_structure(&mut ents, wall, grid.get_node(3, y)));
    }
    let report = maintenance::run(&mut ents, &mut grid, &mut script, &Octile);
    assert_eq!(report.cleared, vec![walker]);
    let record = ents.get::<Pathfinding>(walker).unwrap();
    assert!(record.path.is_empty());
    assert!(record.target.is_none());
}

#[test]
fn demolishing_a_wall_reopens_the_route_next_tick() {
    let (mut ents, mut grid) = board(5, 1);
    let mut script = NullScript;
    let walker = spawn_walker(&mut ents, 0.0, 0.0);
    let wall = spawn_wall(&mut ents);
    assert!(grid.place_structure(&mut ents, wall, grid.get_node(2, 0)));
    maintenance::run(&mut ents, &mut grid, &mut script, &Octile);

    let target = grid.get_node(4, 0);
    assert!(!pathfinding::pathfind(&mut ents, &grid, &mut script, &Octile, walker, target));

    // Command phase of the next tick: the wall dies. Vacating its
    // footprint precedes the reap so the grid never points at a freed id.
    grid.remove_structure(&mut ents, wall);
    ents.destroy(&mut script, wall, false, Entity::NONE);
    ents.cleanup();
    maintenance::run(&mut ents, &mut grid, &mut script, &Octile);

    assert!(!ents.exists(wall));
    assert!(pathfinding::pathfind(&mut ents, &grid, &mut script, &Octile, walker, target));
    let record = ents.get::<Pathfinding>(walker).unwrap();
    assert_eq!(record.path.back().copied(), Some(target));
}

#[test]
fn dispatched_goto_task_drives_a_search() {
    let (mut ents, grid) = board(5, 2);
    let mut script = NullScript;
    let walker = spawn_walker(&mut ents, 0.0, 0.0);
    let goal = grid.get_node(4, 1);
    let goto = task::create_task(&mut ents, goal, TaskType::GoTo);
    assert!(task::add_task(&mut ents, walker, goto, false));

    // Dispatch phase hands the task out; the AI layer reacts by pathing
    // toward its target.
    let dispatched = task::advance(&mut ents);
    assert_eq!(dispatched, vec![(walker, goto)]);
    for (handler, active) in dispatched {
        let target = ents.get::<Task>(active).unwrap().target;
        assert!(pathfinding::pathfind(
            &mut ents,
            &grid,
            &mut script,
            &Octile,
            handler,
            target
        ));
    }
    assert_eq!(
        ents.get::<Pathfinding>(walker).unwrap().path.back().copied(),
        Some(goal)
    );

    // Arrival completes the task; the sweep retires it.
    task::set_complete(&mut ents, goto, true);
    assert!(task::advance(&mut ents).is_empty());
    ents.cleanup();
    assert!(!ents.exists(goto));
    let handler = ents.get::<TaskHandler>(walker).unwrap();
    assert!(handler.curr_task.is_none());
    assert!(!handler.busy);
}

#[test]
fn breakable_wall_queues_combat_before_the_walk() {
    let (mut ents, mut grid) = board(5, 1);
    let walker = spawn_walker(&mut ents, 0.0, 0.0);
    let wall = spawn_wall(&mut ents);
    assert!(grid.place_structure(&mut ents, wall, grid.get_node(2, 0)));
    let mut script = StaticScript::default().with_breaker("walker");

    // The search trades the blocked route for the combat pair; no plan is
    // installed while the wall still stands.
    assert!(!pathfinding::pathfind(
        &mut ents,
        &grid,
        &mut script,
        &Octile,
        walker,
        grid.get_node(4, 0)
    ));
    assert!(ents.get::<Pathfinding>(walker).unwrap().path.is_empty());

    // The next two dispatches are the close-and-destroy pair, in order.
    let first = task::advance(&mut ents);
    assert_eq!(first.len(), 1);
    let (_, close) = first[0];
    assert_eq!(ents.get::<Task>(close).unwrap().task_type, TaskType::GetInRange);
    assert_eq!(ents.get::<Task>(close).unwrap().target, wall);

    task::set_complete(&mut ents, close, true);
    let second = task::advance(&mut ents);
    assert_eq!(second.len(), 1);
    let (_, kill) = second[0];
    assert_eq!(ents.get::<Task>(kill).unwrap().task_type, TaskType::Kill);
    assert_eq!(ents.get::<Task>(kill).unwrap().target, wall);

    // Once the wall is down, the same request yields the walk.
    grid.remove_structure(&mut ents, wall);
    ents.destroy(&mut script, wall, false, walker);
    ents.cleanup();
    maintenance::run(&mut ents, &mut grid, &mut script, &Octile);
    assert!(pathfinding::pathfind(
        &mut ents,
        &grid,
        &mut script,
        &Octile,
        walker,
        grid.get_node(4, 0)
    ));
    assert_eq!(
        ents.get::<Pathfinding>(walker).unwrap().path.back().copied(),
        Some(grid.get_node(4, 0))
    );
}

#[test]
fn saved_game_restores_grid_and_search_behavior() {
    let (mut ents, mut grid) = board(5, 3);
    let mut script = NullScript;
    let wall = spawn_wall(&mut ents);
    assert!(grid.place_structure(&mut ents, wall, grid.get_node(2, 1)));
    maintenance::run(&mut ents, &mut grid, &mut script, &Octile);
    let walker = spawn_walker(&mut ents, 0.0, 1.0);
    let target = grid.get_node(4, 1);
    assert!(pathfinding::pathfind(&mut ents, &grid, &mut script, &Octile, walker, target));
    let path_before = ents.get::<Pathfinding>(walker).unwrap().path.clone();

    let blob = bincode::serialize(&(&ents, &grid)).unwrap();
    let (mut ents2, grid2): (EntitySystem, Grid) = bincode::deserialize(&blob).unwrap();

    // Stored plan survives, and a fresh search over the restored grid
    // makes the same deterministic choice.
    assert_eq!(ents2.get::<Pathfinding>(walker).unwrap().path, path_before);
    assert_eq!(grid2.resident(&ents2, grid2.get_node(2, 1)), wall);
    assert!(pathfinding::pathfind(&mut ents2, &grid2, &mut script, &Octile, walker, target));
    assert_eq!(ents2.get::<Pathfinding>(walker).unwrap().path, path_before);
}

#[test]
fn destructor_hook_sees_sibling_components_before_the_reap() {
    use duskhold_sim::components::{Destructor, Gold};

    let (mut ents, _grid) = board(2, 1);
    let mut script = StaticScript::default();
    let hoard = ents.create_entity();
    ents.add(hoard, Gold { curr: 120, max: 500 });
    ents.add(hoard, Destructor { blueprint: "hoard".to_string() });

    ents.destroy(&mut script, hoard, false, Entity::NONE);
    // Phase 1 fired the hook while the entity was still whole.
    assert_eq!(script.invocations.len(), 1);
    assert!(ents.exists(hoard));
    assert_eq!(ents.get::<Gold>(hoard).unwrap().curr, 120);

    // Phase 2 reaps.
    let destroyed = ents.cleanup();
    assert_eq!(destroyed, vec![hoard]);
    assert!(ents.get::<Gold>(hoard).is_none());
}

#[test]
fn ninety_node_grid_has_coherent_records() {
    let (ents, grid) = board(10, 9);
    assert_eq!(grid.node_count(), 90);
    let mut seen = 0;
    for (node, record) in ents.iter::<GridNode>() {
        assert_eq!(grid.get_node(record.x, record.y), node);
        assert!(record.free);
        seen += 1;
    }
    assert_eq!(seen, 90);
}
