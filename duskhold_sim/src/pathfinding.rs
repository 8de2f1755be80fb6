// A* search over the grid and the path-following component layer.
//
// `find_path` is the raw search: it walks a node's nine neighbour links,
// prices each edge through the searcher's script blueprint and returns the
// full node sequence from start to target. `pathfind` and `correct_path`
// sit above it and manage the `Pathfinding` component: storing the queue,
// remembering the target so a broken path can be recomputed, and turning a
// breakable obstacle on the route into combat tasks.
//
// **Critical constraint: determinism.** Open-set ties are broken by node
// id, so equal-cost frontiers expand in the same order on every run.
//
// See also: `grid.rs` for the traversal predicate, `task.rs` for the
// obstacle-clearing tasks, `maintenance.rs` for the repair pass that calls
// `correct_path`.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use duskhold_script::ScriptHost;

use crate::components::{GridNode, Pathfinding, Physics};
use crate::entity::EntitySystem;
use crate::grid::Grid;
use crate::task;
use crate::types::{Direction, Entity, TaskType};

/// Hard-coded sqrt(2); corner edges multiply their scripted cost by this.
pub const DIAGONAL_COST: f32 = 1.414_213_6;

/// Distance estimate from `from` to `to`, pluggable per entity class.
pub trait Heuristic {
    fn estimate(&self, ents: &EntitySystem, grid: &Grid, from: Entity, to: Entity) -> f32;
}

/// Octile distance over board coordinates. Admissible for unit step costs
/// with sqrt(2) diagonals, so searches using it return cheapest paths.
pub struct Octile;

fn octile_distance(ents: &EntitySystem, grid: &Grid, from: Entity, to: Entity) -> f32 {
    let (Ok((ax, ay)), Ok((bx, by))) =
        (grid.board_coords(ents, from), grid.board_coords(ents, to))
    else {
        return 0.0;
    };
    let dx = ax.abs_diff(bx) as f32;
    let dy = ay.abs_diff(by) as f32;
    let (long, short) = if dx > dy { (dx, dy) } else { (dy, dx) };
    long + (DIAGONAL_COST - 1.0) * short
}

impl Heuristic for Octile {
    fn estimate(&self, ents: &EntitySystem, grid: &Grid, from: Entity, to: Entity) -> f32 {
        octile_distance(ents, grid, from, to)
    }
}

/// Zero estimate; degrades the search to uniform-cost expansion.
pub struct NoHeuristic;

impl Heuristic for NoHeuristic {
    fn estimate(&self, _: &EntitySystem, _: &Grid, _: Entity, _: Entity) -> f32 {
        0.0
    }
}

/// Inverted estimate that rewards distance from a threat. Pair it with a
/// far-away target to route fleeing entities around the threat rather
/// than past it. Deliberately inadmissible.
pub struct FleeFrom {
    pub threat: Entity,
}

impl Heuristic for FleeFrom {
    fn estimate(&self, ents: &EntitySystem, grid: &Grid, from: Entity, _: Entity) -> f32 {
        -octile_distance(ents, grid, from, self.threat)
    }
}

struct OpenEntry {
    f: f32,
    node: Entity,
    slot: usize,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    // Reversed so the max-heap pops the lowest f, then the lowest id.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.node.cmp(&self.node))
    }
}

/// The scripted price of stepping onto `to`, never below 1 for a
/// misbehaving callback, with the diagonal multiplier on corner edges.
/// Portal hops are free.
fn edge_cost(
    script: &mut dyn ScriptHost,
    blueprint: &str,
    dir: Direction,
    from: Entity,
    to: Entity,
) -> f32 {
    if dir == Direction::Portal {
        return 0.0;
    }
    let raw = script.cost(blueprint, from.raw(), to.raw());
    let base = if raw <= 0.0 { 1.0 } else { raw };
    if dir.is_diagonal() { base * DIAGONAL_COST } else { base }
}

/// Whether the searcher may expand an edge onto `node`. Open nodes always
/// pass; blocked ones only when the searcher's script lets it break the
/// resident. The target is always expandable so searches can end at an
/// occupied goal.
fn can_enter(
    ents: &EntitySystem,
    grid: &Grid,
    script: &mut dyn ScriptHost,
    blueprint: &str,
    searcher: Entity,
    node: Entity,
    target: Entity,
) -> bool {
    if node == target || grid.traversal_free(ents, node) {
        return true;
    }
    let resident = grid.resident(ents, node);
    if resident.is_none() {
        return false;
    }
    script.can_break(blueprint, searcher.raw(), resident.raw())
}

/// A* from `start` to `target` for `searcher`, pricing edges through the
/// given blueprint. Returns the node sequence including both endpoints,
/// or `None` when the open set empties first.
#[allow(clippy::too_many_arguments)]
pub fn find_path(
    ents: &EntitySystem,
    grid: &Grid,
    script: &mut dyn ScriptHost,
    heuristic: &dyn Heuristic,
    searcher: Entity,
    blueprint: &str,
    start: Entity,
    target: Entity,
) -> Option<Vec<Entity>> {
    let start_slot = grid.node_index(start)?;
    grid.node_index(target)?;
    if start == target {
        return Some(vec![start]);
    }

    let n = grid.node_count();
    let mut g_score = vec![f32::INFINITY; n];
    let mut came_from = vec![Entity::NONE; n];
    let mut closed = vec![false; n];
    let mut open = BinaryHeap::new();

    g_score[start_slot] = 0.0;
    open.push(OpenEntry {
        f: heuristic.estimate(ents, grid, start, target),
        node: start,
        slot: start_slot,
    });

    while let Some(OpenEntry { node, slot, .. }) = open.pop() {
        if closed[slot] {
            continue;
        }
        closed[slot] = true;
        if node == target {
            let mut path = vec![node];
            let mut at = slot;
            while !came_from[at].is_none() {
                let prev = came_from[at];
                path.push(prev);
                at = match grid.node_index(prev) {
                    Some(i) => i,
                    None => break,
                };
            }
            path.reverse();
            return Some(path);
        }

        let links = ents.get::<GridNode>(node)?.neighbours;
        for dir in Direction::ALL {
            let next = links[dir.index()];
            if next.is_none() {
                continue;
            }
            let Some(next_slot) = grid.node_index(next) else {
                continue;
            };
            if closed[next_slot] {
                continue;
            }
            if !can_enter(ents, grid, script, blueprint, searcher, next, target) {
                continue;
            }
            let tentative = g_score[slot] + edge_cost(script, blueprint, dir, node, next);
            if tentative < g_score[next_slot] {
                g_score[next_slot] = tentative;
                came_from[next_slot] = node;
                open.push(OpenEntry {
                    f: tentative + heuristic.estimate(ents, grid, next, target),
                    node: next,
                    slot: next_slot,
                });
            }
        }
    }
    None
}

/// Runs a search for the entity from its current cell to `target` and
/// installs the result on its `Pathfinding` component. When the route runs
/// through a breakable obstacle, the path is withheld and priority tasks
/// to close with and destroy the obstacle are queued in its place; the
/// owner re-paths once the obstacle is down. Returns false when the entity
/// cannot path, no route exists or the route was traded for combat.
pub fn pathfind(
    ents: &mut EntitySystem,
    grid: &Grid,
    script: &mut dyn ScriptHost,
    heuristic: &dyn Heuristic,
    entity: Entity,
    target: Entity,
) -> bool {
    let Some(blueprint) = ents.get::<Pathfinding>(entity).map(|p| p.blueprint.clone()) else {
        return false;
    };
    let Some(position) = ents.get::<Physics>(entity).map(|p| p.position) else {
        return false;
    };
    let start = grid.get_node_from_position(position);
    if start.is_none() {
        return false;
    }

    let Some(path) = find_path(ents, grid, script, heuristic, entity, &blueprint, start, target)
    else {
        return false;
    };

    // First blocked node on the route that survives only because the
    // searcher can break its resident. Such a route is never installed;
    // a plan crossing an occupied node would leave the walker marching
    // into the obstacle while the combat below is still underway.
    let obstacle = path
        .iter()
        .find(|&&node| node != target && !grid.traversal_free(ents, node))
        .map(|&node| grid.resident(ents, node))
        .filter(|resident| !resident.is_none());
    if let Some(resident) = obstacle {
        let kill = task::create_task(ents, resident, TaskType::Kill);
        let close = task::create_task(ents, resident, TaskType::GetInRange);
        task::add_task(ents, entity, kill, true);
        task::add_task(ents, entity, close, true);
        return false;
    }

    let mut queue: std::collections::VecDeque<Entity> = path.into();
    if queue.len() >= 3 {
        // Drop the cell the entity is already standing on.
        queue.pop_front();
    }
    if let Some(record) = ents.get_mut::<Pathfinding>(entity) {
        record.last = start;
        record.target = target;
        record.path = queue;
    }
    true
}

/// Re-runs the entity's last search toward its unchanged target. On
/// failure the stale queue is cleared and the target reset so the owner
/// can pick a new destination.
pub fn correct_path(
    ents: &mut EntitySystem,
    grid: &Grid,
    script: &mut dyn ScriptHost,
    heuristic: &dyn Heuristic,
    entity: Entity,
) -> bool {
    let Some(target) = ents.get::<Pathfinding>(entity).map(|p| p.target) else {
        return false;
    };
    if target.is_none() {
        return false;
    }
    if pathfind(ents, grid, script, heuristic, entity, target) {
        return true;
    }
    if let Some(record) = ents.get_mut::<Pathfinding>(entity) {
        record.path.clear();
        record.target = Entity::NONE;
    }
    false
}
