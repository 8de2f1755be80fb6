// The pathfinding grid.
//
// Nodes are ordinary entities carrying a `GridNode` record, created in one
// batch by `Grid::create`, so their ids form a sorted run and membership is
// a binary search. The `Grid` itself holds only the node list, the board
// geometry and the two per-tick change sets consumed by `maintenance`.
//
// Geometric neighbour links are symmetric by construction. The portal slot
// is the exception: it is wired one-directionally by `set_portal_neighbour`
// and each side is set on its own.
//
// See also: `maintenance.rs` for the per-tick realignment and path repair
// driven by the `freed`/`unfreed` sets, `pathfinding.rs` for the search
// that walks these links.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::components::{GridNode, Physics, Structure};
use crate::entity::EntitySystem;
use crate::error::SimError;
use crate::types::{Direction, Entity, Vec3};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Grid {
    /// Row-major node entities, ascending ids.
    nodes: Vec<Entity>,
    width: u32,
    height: u32,
    /// World position of node (0, 0).
    start: Vec3,
    /// Cell spacing in world units.
    distance: f32,
    /// Nodes that became free since the last maintenance pass.
    pub(crate) freed: BTreeSet<Entity>,
    /// Nodes that became occupied since the last maintenance pass.
    pub(crate) unfreed: BTreeSet<Entity>,
}

/// Board offset of each neighbour slot. `Up` is towards row 0.
fn neighbour_offset(dir: Direction) -> (i64, i64) {
    match dir {
        Direction::Up => (0, -1),
        Direction::Down => (0, 1),
        Direction::Left => (-1, 0),
        Direction::Right => (1, 0),
        Direction::UpLeft => (-1, -1),
        Direction::UpRight => (1, -1),
        Direction::DownLeft => (-1, 1),
        Direction::DownRight => (1, 1),
        Direction::Portal => (0, 0),
    }
}

impl Grid {
    /// Creates the board: `width * height` node entities with symmetric
    /// geometric links, all free.
    pub fn create(
        ents: &mut EntitySystem,
        width: u32,
        height: u32,
        distance: f32,
        start: Vec3,
    ) -> Self {
        let mut nodes = Vec::with_capacity((width as usize) * (height as usize));
        for y in 0..height {
            for x in 0..width {
                let node = ents.create_entity();
                ents.add(node, GridNode { x, y, ..GridNode::default() });
                ents.add(
                    node,
                    Physics {
                        position: Vec3::new(
                            start.x + x as f32 * distance,
                            start.y,
                            start.z + y as f32 * distance,
                        ),
                        solid: false,
                        half_height: 0.0,
                    },
                );
                nodes.push(node);
            }
        }

        let grid = Self {
            nodes,
            width,
            height,
            start,
            distance,
            freed: BTreeSet::new(),
            unfreed: BTreeSet::new(),
        };

        for y in 0..height {
            for x in 0..width {
                let node = grid.node_at(x, y);
                let mut links = [Entity::NONE; Direction::COUNT];
                for dir in Direction::GEOMETRIC {
                    let (dx, dy) = neighbour_offset(dir);
                    let nx = x as i64 + dx;
                    let ny = y as i64 + dy;
                    if grid.in_board(nx, ny) {
                        links[dir.index()] = grid.node_at(nx as u32, ny as u32);
                    }
                }
                if let Some(record) = ents.get_mut::<GridNode>(node) {
                    record.neighbours = links;
                }
            }
        }
        grid
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn in_board(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && (x as u64) < u64::from(self.width) && (y as u64) < u64::from(self.height)
    }

    fn node_at(&self, x: u32, y: u32) -> Entity {
        self.nodes[(y as usize) * (self.width as usize) + (x as usize)]
    }

    /// The node at board coordinates, or an error past the board edge.
    pub fn try_node(&self, x: u32, y: u32) -> Result<Entity, SimError> {
        if x < self.width && y < self.height {
            Ok(self.node_at(x, y))
        } else {
            Err(SimError::OutOfBounds { x, y })
        }
    }

    /// The node at board coordinates, or NONE outside the board.
    pub fn get_node(&self, x: u32, y: u32) -> Entity {
        self.try_node(x, y).unwrap_or(Entity::NONE)
    }

    /// The node whose cell contains the world position, or NONE outside
    /// the board.
    pub fn get_node_from_position(&self, position: Vec3) -> Entity {
        if self.distance <= 0.0 {
            return Entity::NONE;
        }
        let x = ((position.x - self.start.x) / self.distance).round() as i64;
        let y = ((position.z - self.start.z) / self.distance).round() as i64;
        if self.in_board(x, y) {
            self.node_at(x as u32, y as u32)
        } else {
            Entity::NONE
        }
    }

    /// Dense index of a node entity, usable for flat per-search arrays.
    pub fn node_index(&self, node: Entity) -> Option<usize> {
        self.nodes.binary_search(&node).ok()
    }

    pub fn is_node(&self, node: Entity) -> bool {
        self.node_index(node).is_some()
    }

    pub fn board_coords(&self, ents: &EntitySystem, node: Entity) -> Result<(u32, u32), SimError> {
        ents.get::<GridNode>(node)
            .map(|record| (record.x, record.y))
            .ok_or(SimError::NotANode(node))
    }

    /// All nine neighbour links of a node. NONE-filled for non-nodes.
    pub fn neighbours(&self, ents: &EntitySystem, node: Entity) -> [Entity; Direction::COUNT] {
        ents.get::<GridNode>(node)
            .map(|record| record.neighbours)
            .unwrap_or([Entity::NONE; Direction::COUNT])
    }

    /// Wires `from`'s portal slot to `to`. One-directional; call once per
    /// side for a two-way portal.
    pub fn set_portal_neighbour(
        &self,
        ents: &mut EntitySystem,
        from: Entity,
        to: Entity,
    ) -> Result<(), SimError> {
        let record = ents.get_mut::<GridNode>(from).ok_or(SimError::NotANode(from))?;
        record.neighbours[Direction::Portal.index()] = to;
        Ok(())
    }

    pub fn is_free(&self, ents: &EntitySystem, node: Entity) -> bool {
        ents.get::<GridNode>(node).is_none_or(|record| record.free)
    }

    pub fn resident(&self, ents: &EntitySystem, node: Entity) -> Entity {
        ents.get::<GridNode>(node)
            .map(|record| record.resident)
            .unwrap_or(Entity::NONE)
    }

    /// Flips a node's free flag and records the change for the next
    /// maintenance pass. Freeing a node also evicts its resident.
    pub fn set_free(&mut self, ents: &mut EntitySystem, node: Entity, free: bool) {
        let Some(record) = ents.get_mut::<GridNode>(node) else {
            return;
        };
        if record.free == free {
            return;
        }
        record.free = free;
        if free {
            record.resident = Entity::NONE;
            self.freed.insert(node);
            self.unfreed.remove(&node);
        } else {
            self.unfreed.insert(node);
            self.freed.remove(&node);
        }
    }

    /// Installs a resident on a vacant node, marking it occupied. Fails if
    /// the node is missing, already occupied or already has a resident.
    pub fn set_resident(&mut self, ents: &mut EntitySystem, node: Entity, resident: Entity) -> bool {
        let Some(record) = ents.get_mut::<GridNode>(node) else {
            return false;
        };
        if !record.free || !record.resident.is_none() {
            return false;
        }
        record.resident = resident;
        record.free = false;
        self.unfreed.insert(node);
        self.freed.remove(&node);
        true
    }

    /// Placement test: the node must exist, be free and have no resident.
    pub fn placement_free(&self, ents: &EntitySystem, node: Entity) -> bool {
        ents.get::<GridNode>(node)
            .is_some_and(|record| record.free && record.resident.is_none())
    }

    /// Movement test: free nodes pass, occupied nodes pass only when their
    /// resident is a walk-through structure.
    pub fn traversal_free(&self, ents: &EntitySystem, node: Entity) -> bool {
        let Some(record) = ents.get::<GridNode>(node) else {
            return false;
        };
        if record.free {
            return true;
        }
        ents.get::<Structure>(record.resident)
            .is_some_and(|structure| structure.walk_through)
    }

    /// Whether the whole `(2r+1)` by `(2r+1)` block centred on `center` is
    /// open for placement.
    pub fn area_free(&self, ents: &EntitySystem, center: Entity, radius: u32) -> bool {
        let Ok((cx, cy)) = self.board_coords(ents, center) else {
            return false;
        };
        let r = i64::from(radius);
        for dy in -r..=r {
            for dx in -r..=r {
                let x = i64::from(cx) + dx;
                let y = i64::from(cy) + dy;
                if !self.in_board(x, y) {
                    return false;
                }
                if !self.placement_free(ents, self.node_at(x as u32, y as u32)) {
                    return false;
                }
            }
        }
        true
    }

    /// Occupies the structure's footprint block centred on `center`.
    /// All-or-nothing: when the block is not entirely open the grid is left
    /// untouched and `false` is returned. On success every footprint node
    /// gets `resident = structure` and is appended to the structure's
    /// residence list.
    pub fn place_structure(
        &mut self,
        ents: &mut EntitySystem,
        structure: Entity,
        center: Entity,
    ) -> bool {
        let Some(radius) = ents.get::<Structure>(structure).map(|s| s.radius) else {
            return false;
        };
        if !self.area_free(ents, center, radius) {
            return false;
        }
        let Ok((cx, cy)) = self.board_coords(ents, center) else {
            return false;
        };

        let r = i64::from(radius);
        let mut residences = Vec::new();
        for dy in -r..=r {
            for dx in -r..=r {
                let x = (i64::from(cx) + dx) as u32;
                let y = (i64::from(cy) + dy) as u32;
                let node = self.node_at(x, y);
                // area_free vetted the block, so every claim succeeds.
                if self.set_resident(ents, node, structure) {
                    residences.push(node);
                }
            }
        }
        if let Some(record) = ents.get_mut::<Structure>(structure) {
            record.residences.extend(residences);
        }
        true
    }

    /// Vacates every node the structure sits on and clears its residence
    /// list. The freed nodes feed the next maintenance pass.
    pub fn remove_structure(&mut self, ents: &mut EntitySystem, structure: Entity) {
        let residences: Vec<Entity> = ents
            .get::<Structure>(structure)
            .map(|record| record.residences.iter().copied().collect())
            .unwrap_or_default();
        for node in residences {
            if self.resident(ents, node) == structure {
                self.set_free(ents, node, true);
            }
        }
        if let Some(record) = ents.get_mut::<Structure>(structure) {
            record.residences.clear();
        }
    }

    /// Drains the per-tick change sets. Called by maintenance after it has
    /// processed them.
    pub(crate) fn take_changes(&mut self) -> (BTreeSet<Entity>, BTreeSet<Entity>) {
        (
            std::mem::take(&mut self.freed),
            std::mem::take(&mut self.unfreed),
        )
    }
}
