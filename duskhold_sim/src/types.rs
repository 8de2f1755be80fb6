// Core types shared across the simulation.
//
// Defines the entity handle, the component presence bitset, grid directions,
// task types and the small categorizing enums carried by component records.
// All types derive `Serialize` and `Deserialize` for save/load.
//
// See also: `components.rs` for the component records these types appear in,
// `grid.rs` for how `Direction` indexes a node's neighbour slots.
//
// **Critical constraint: determinism.** Entity handles are sequential
// integers assigned in creation order, never random. Anything keyed by
// `Entity` iterates in a fixed order.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Entity handle
// ---------------------------------------------------------------------------

/// An opaque handle identifying a game object. Carries no data itself;
/// behavior is entirely a function of which components are attached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity(pub u32);

impl Entity {
    /// The reserved "no entity" sentinel. Neighbour slots, residents and
    /// task fields use it instead of an `Option` so records stay plain
    /// copyable data.
    pub const NONE: Entity = Entity(u32::MAX);

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    /// The handle as it crosses the scripting boundary.
    pub fn raw(self) -> u64 {
        u64::from(self.0)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "Entity(NONE)")
        } else {
            write!(f, "Entity({})", self.0)
        }
    }
}

// ---------------------------------------------------------------------------
// Spatial type
// ---------------------------------------------------------------------------

/// A position in world units. The grid lies in the XZ plane; Y is height.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance in the XZ plane (height ignored).
    pub fn ground_distance(self, other: Self) -> f32 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        (dx * dx + dz * dz).sqrt()
    }
}

// ---------------------------------------------------------------------------
// Presence mask
// ---------------------------------------------------------------------------

/// Fixed-width bitset with one bit per component kind.
///
/// Invariant: bit `k` is set iff a live record of kind `k` exists for the
/// entity in its typed store. `EntitySystem` updates mask and store together
/// at a single choke point, so the two can never drift apart.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceMask(u64);

impl PresenceMask {
    pub fn test(self, bit: usize) -> bool {
        self.0 & (1 << bit) != 0
    }

    pub fn set(&mut self, bit: usize) {
        self.0 |= 1 << bit;
    }

    pub fn clear(&mut self, bit: usize) {
        self.0 &= !(1 << bit);
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

// ---------------------------------------------------------------------------
// Grid directions
// ---------------------------------------------------------------------------

/// The nine neighbour slots of a grid node: the 8-neighbourhood plus one
/// logical portal link. Slot order matches the neighbour array layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(usize)]
pub enum Direction {
    Up = 0,
    Down = 1,
    Left = 2,
    Right = 3,
    UpLeft = 4,
    UpRight = 5,
    DownLeft = 6,
    DownRight = 7,
    Portal = 8,
}

impl Direction {
    pub const COUNT: usize = 9;

    /// All slots in array order.
    pub const ALL: [Direction; Self::COUNT] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
        Direction::UpLeft,
        Direction::UpRight,
        Direction::DownLeft,
        Direction::DownRight,
        Direction::Portal,
    ];

    /// The four cardinal slots used by alignment computation.
    pub const CARDINAL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// The eight geometric slots (everything but the portal link).
    pub const GEOMETRIC: [Direction; 8] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
        Direction::UpLeft,
        Direction::UpRight,
        Direction::DownLeft,
        Direction::DownRight,
    ];

    /// True exactly for the four corner directions, which carry the
    /// diagonal cost multiplier during pathfinding.
    pub fn is_diagonal(self) -> bool {
        matches!(
            self,
            Direction::UpLeft | Direction::UpRight | Direction::DownLeft | Direction::DownRight
        )
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// Task types
// ---------------------------------------------------------------------------

/// The kinds of goal-directed work a task can represent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum TaskType {
    #[default]
    None = 0,
    /// Walk to the target entity's node.
    GoTo = 1,
    /// Walk into combat range of the target, then fight it.
    GoKill = 2,
    /// Attack the target from the current position.
    Kill = 3,
    /// Close to within combat range of the target.
    GetInRange = 4,
    /// Walk to a gold pile / mine and pick up gold.
    GoPickUpGold = 5,
    /// Carry held gold to a vault and deposit it.
    GoDepositGold = 6,
}

impl TaskType {
    pub const COUNT: usize = 7;
}

/// Bitset over `TaskType`, used for a handler's acceptable-task set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTypeSet(u32);

impl TaskTypeSet {
    pub fn test(self, task_type: TaskType) -> bool {
        self.0 & (1 << task_type as u32) != 0
    }

    pub fn set(&mut self, task_type: TaskType) {
        self.0 |= 1 << task_type as u32;
    }

    pub fn clear(&mut self, task_type: TaskType) {
        self.0 &= !(1 << task_type as u32);
    }

    /// Convenience constructor for tests and blueprint loaders.
    pub fn of(types: &[TaskType]) -> Self {
        let mut set = Self::default();
        for &t in types {
            set.set(t);
        }
        set
    }
}

// ---------------------------------------------------------------------------
// Categorizing enums carried by component records
// ---------------------------------------------------------------------------

/// The kinds of happenings an event record can describe and an event
/// handler can subscribe to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum EventType {
    #[default]
    None = 0,
    KillEntity = 1,
    GoldDropped = 2,
    RestoreSpeed = 3,
    Meteor = 4,
}

impl EventType {
    pub const COUNT: usize = 5;
}

/// Bitset over `EventType`, used for a handler's subscription set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTypeSet(u32);

impl EventTypeSet {
    pub fn test(self, event_type: EventType) -> bool {
        self.0 & (1 << event_type as u32) != 0
    }

    pub fn set(&mut self, event_type: EventType) {
        self.0 |= 1 << event_type as u32;
    }

    pub fn clear(&mut self, event_type: EventType) {
        self.0 &= !(1 << event_type as u32);
    }
}

/// Player order a commandable entity can answer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandKind {
    #[default]
    Mine,
    Attack,
    Reposition,
    ReturnGold,
    FallBack,
}

/// Which side an entity fights for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Faction {
    Friendly,
    Enemy,
    #[default]
    Neutral,
}

/// Coarse AI state stored on the AI record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityState {
    #[default]
    None,
    Normal,
}

/// Attack delivery of a combat record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttackType {
    #[default]
    None,
    Melee,
    Ranged,
}

/// Shape of the selection marker drawn under a selectable entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionMarkerType {
    #[default]
    Circle,
    Square,
    HalfSquare,
}

/// One of the five fixed orientations the renderer applies to an aligned
/// structure mesh. Emitted as data by grid maintenance; never interpreted
/// by the core.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rotation {
    /// Orientation untouched (isolated block or full cross).
    #[default]
    None,
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}
