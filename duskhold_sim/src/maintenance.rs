// Per-tick grid maintenance.
//
// Consumes the freed/unfreed node sets the grid accumulated since the last
// pass and does two jobs. First, every changed node and its geometric
// neighbours get a fresh alignment state, an index in 0..=5 describing
// which cardinal neighbours hold wall-like residents; residents carrying an
// `Align` record have their visuals rewritten from the matching variant.
// Second, every in-flight path that crosses a newly occupied node is
// re-searched toward its unchanged target, or cleared when no route
// remains.
//
// The pass returns a report of what it touched so the renderer and AI
// layers can react without re-deriving the diff.

use rustc_hash::FxHashSet;

use duskhold_script::ScriptHost;

use crate::components::{Align, DummyAlign, Graphics, GridNode, Pathfinding, Physics};
use crate::entity::EntitySystem;
use crate::grid::Grid;
use crate::pathfinding::{self, Heuristic};
use crate::types::{Direction, Entity, Rotation, Vec3};

/// New alignment of one affected node, emitted for the renderer.
#[derive(Clone, Debug, PartialEq)]
pub struct Realignment {
    pub node: Entity,
    /// NONE when the node itself is free.
    pub resident: Entity,
    /// 0..=4 occupied cardinal neighbours, 5 for the straight tunnel.
    pub state: usize,
    pub rotation: Rotation,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MaintenanceReport {
    pub realigned: Vec<Realignment>,
    /// Entities whose broken path was successfully re-searched.
    pub repaired: Vec<Entity>,
    /// Entities left with no route; their plan was cleared.
    pub cleared: Vec<Entity>,
}

/// Maps the four cardinal occupancy flags `[up, down, left, right]` to an
/// alignment state and orientation. Exactly two opposite neighbours form a
/// tunnel, a distinct state from the two-neighbour corner.
fn alignment(flags: [bool; 4]) -> (usize, Rotation) {
    let [up, down, left, right] = flags;
    let count = flags.iter().filter(|f| **f).count();
    match count {
        0 => (0, Rotation::None),
        1 => {
            let rotation = if up {
                Rotation::Deg0
            } else if right {
                Rotation::Deg90
            } else if down {
                Rotation::Deg180
            } else {
                Rotation::Deg270
            };
            (1, rotation)
        }
        2 if up && down => (5, Rotation::Deg0),
        2 if left && right => (5, Rotation::Deg90),
        2 => {
            let rotation = if up && right {
                Rotation::Deg0
            } else if right && down {
                Rotation::Deg90
            } else if down && left {
                Rotation::Deg180
            } else {
                Rotation::Deg270
            };
            (2, rotation)
        }
        3 => {
            // Oriented by the one open side.
            let rotation = if !down {
                Rotation::Deg0
            } else if !left {
                Rotation::Deg90
            } else if !up {
                Rotation::Deg180
            } else {
                Rotation::Deg270
            };
            (3, rotation)
        }
        _ => (4, Rotation::None),
    }
}

/// Whether the resident counts as a wall for its neighbours' alignment.
fn alignable(ents: &EntitySystem, resident: Entity) -> bool {
    ents.has::<Align>(resident) || ents.has::<DummyAlign>(resident)
}

/// Cardinal occupancy flags of a node, plus whether any counted neighbour
/// is a border dummy (which selects the `_full` mesh variant).
fn cardinal_flags(ents: &EntitySystem, node: Entity) -> ([bool; 4], bool) {
    let Some(record) = ents.get::<GridNode>(node) else {
        return ([false; 4], false);
    };
    let mut flags = [false; 4];
    let mut near_dummy = false;
    for (i, dir) in Direction::CARDINAL.iter().enumerate() {
        let neighbour = record.neighbours[dir.index()];
        if neighbour.is_none() {
            continue;
        }
        let Some(n) = ents.get::<GridNode>(neighbour) else {
            continue;
        };
        if !n.free && alignable(ents, n.resident) {
            flags[i] = true;
            if ents.has::<DummyAlign>(n.resident) {
                near_dummy = true;
            }
        }
    }
    (flags, near_dummy)
}

fn realign_node(ents: &mut EntitySystem, node: Entity) -> Option<Realignment> {
    let record = ents.get::<GridNode>(node)?;
    let resident = if record.free { Entity::NONE } else { record.resident };
    let (flags, near_dummy) = cardinal_flags(ents, node);
    let (state, rotation) = alignment(flags);

    // Border dummies count for their neighbours but are never redrawn.
    if !resident.is_none() && !ents.has::<DummyAlign>(resident)
        && let Some(align) = ents.get::<Align>(resident).cloned()
    {
        let variant = &align.states[state];
        let node_position = ents.get::<Physics>(node).map(|p| p.position);
        if let Some(graphics) = ents.get_mut::<Graphics>(resident) {
            graphics.mesh = if near_dummy {
                format!("{}_full", variant.mesh)
            } else {
                variant.mesh.clone()
            };
            graphics.material = variant.material.clone();
            graphics.manual_scaling = true;
            graphics.scale = variant.scale;
        }
        if let (Some(base), Some(physics)) = (node_position, ents.get_mut::<Physics>(resident)) {
            physics.position = Vec3::new(
                base.x + variant.position_offset.x,
                base.y + variant.position_offset.y,
                base.z + variant.position_offset.z,
            );
        }
    }

    Some(Realignment { node, resident, state, rotation })
}

/// Runs the full maintenance pass and drains the grid's change sets.
pub fn run(
    ents: &mut EntitySystem,
    grid: &mut Grid,
    script: &mut dyn ScriptHost,
    heuristic: &dyn Heuristic,
) -> MaintenanceReport {
    let (freed, unfreed) = grid.take_changes();
    let mut report = MaintenanceReport::default();

    // Realign each changed node and its geometric neighbours exactly once,
    // in sorted order of the change sets.
    let mut visited: FxHashSet<Entity> = FxHashSet::default();
    for &changed in freed.iter().chain(unfreed.iter()) {
        let mut affected = vec![changed];
        for dir in Direction::GEOMETRIC {
            let neighbour = grid.neighbours(ents, changed)[dir.index()];
            if !neighbour.is_none() {
                affected.push(neighbour);
            }
        }
        for node in affected {
            if visited.insert(node)
                && let Some(change) = realign_node(ents, node)
            {
                report.realigned.push(change);
            }
        }
    }

    // Re-search every plan that crossed a newly occupied node.
    let broken: Vec<Entity> = ents
        .iter::<Pathfinding>()
        .filter(|(_, record)| record.path.iter().any(|node| unfreed.contains(node)))
        .map(|(entity, _)| entity)
        .collect();
    for entity in broken {
        if pathfinding::correct_path(ents, grid, script, heuristic, entity) {
            report.repaired.push(entity);
        } else {
            report.cleared.push(entity);
        }
    }

    report
}
