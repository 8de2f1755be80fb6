// Component records and the kind registry.
//
// Every behavior an entity can exhibit is a plain data record attached to
// it. The `components!` macro at the bottom is the single registration
// point: it generates the `ComponentKind` enum (one bit per kind in the
// presence mask), the typed field of `Stores` each record lives in, the
// `Component` trait impls that let generic code reach the right store, and
// the `ComponentSnapshot` enum used for persistence.
//
// Adding a kind means writing its record struct here and adding one line to
// the macro invocation. Nothing else in the crate enumerates kinds by hand.
//
// See also: `store.rs` for the per-kind storage, `entity.rs` for the
// attach/detach choke point that keeps masks and stores in sync.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::VecDeque;

use crate::store::ComponentStore;
use crate::types::{
    AttackType, CommandKind, Direction, Entity, EntityState, EventType, EventTypeSet, Faction,
    Rotation, SelectionMarkerType, TaskType, TaskTypeSet, Vec3,
};

// ---------------------------------------------------------------------------
// Spatial and presentation records
// ---------------------------------------------------------------------------

/// Position in the world. `solid` blocks projectiles; `half_height` lifts
/// the visual origin off the ground.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Physics {
    pub position: Vec3,
    pub solid: bool,
    pub half_height: f32,
}

/// Render model description. Grid maintenance rewrites these fields on
/// aligned structures; the core never interprets them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Graphics {
    pub mesh: String,
    pub material: String,
    pub visible: bool,
    pub manual_scaling: bool,
    pub scale: Vec3,
}

/// Point light attached to the entity.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub visible: bool,
}

/// Looping or one-shot animation request for the renderer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Animation {
    pub current: String,
    pub looping: bool,
}

/// Selection marker drawn under the entity when the player picks it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub blueprint: String,
    pub material: String,
    pub scale: Vec3,
    pub marker_type: SelectionMarkerType,
    pub rotation: Rotation,
}

// ---------------------------------------------------------------------------
// Stats and combat records
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub curr: u32,
    pub max: u32,
    pub regen: u32,
    pub defense: u32,
    pub alive: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Mana {
    pub curr: u32,
    pub max: u32,
    pub regen: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Combat {
    pub target: Entity,
    pub min_dmg: u32,
    pub max_dmg: u32,
    pub cooldown: f32,
    pub cd_time: f32,
    pub range: f32,
    pub attack_type: AttackType,
    pub pursue: bool,
}

impl Default for Combat {
    fn default() -> Self {
        Self {
            target: Entity::NONE,
            min_dmg: 0,
            max_dmg: 0,
            cooldown: 0.0,
            cd_time: 0.0,
            range: 0.0,
            attack_type: AttackType::None,
            pursue: false,
        }
    }
}

/// Projectile homing on a target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Homing {
    pub source: Entity,
    pub target: Entity,
    pub dmg: u32,
}

impl Default for Homing {
    fn default() -> Self {
        Self { source: Entity::NONE, target: Entity::NONE, dmg: 0 }
    }
}

/// Expanding area damage effect.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Explosion {
    pub delta: f32,
    pub max_radius: f32,
    pub curr_radius: f32,
}

/// Script hook fired when the entity takes a hit.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OnHit {
    pub blueprint: String,
    pub cooldown: f32,
    pub curr_time: f32,
}

// ---------------------------------------------------------------------------
// Behavior records
// ---------------------------------------------------------------------------

/// Scripted decision making. The blueprint names the script table whose
/// `update` the AI dispatch calls when the entity is idle.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Ai {
    pub blueprint: String,
    pub state: EntityState,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    pub speed: f32,
    pub original_speed: f32,
    pub moving: bool,
}

/// Script table answering player input events for this entity.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Input {
    pub input_handler: String,
}

/// Countdown that fires an event at a target when the limit elapses.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Time {
    pub curr_time: f32,
    pub time_limit: f32,
    pub target: Entity,
    pub event_type: EventType,
}

impl Default for Time {
    fn default() -> Self {
        Self {
            curr_time: 0.0,
            time_limit: 0.0,
            target: Entity::NONE,
            event_type: EventType::None,
        }
    }
}

/// Entity is destroyed when its lifespan runs out.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Lifespan {
    pub curr_time: f32,
    pub max_time: f32,
}

/// Script hook invoked when the entity is destroyed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Destructor {
    pub blueprint: String,
}

/// Periodic script hook fired at entities entering the radius.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub blueprint: String,
    pub linked_entity: Entity,
    pub cooldown: f32,
    pub curr_time: f32,
    pub radius: f32,
}

impl Default for Trigger {
    fn default() -> Self {
        Self {
            blueprint: String::new(),
            linked_entity: Entity::NONE,
            cooldown: 0.0,
            curr_time: 0.0,
            radius: 0.0,
        }
    }
}

/// Answers one of the player-issued commands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub command: CommandKind,
}

/// Generic counter consulted by scripts.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Counter {
    pub curr: u32,
    pub max: u32,
}

// ---------------------------------------------------------------------------
// Event records
// ---------------------------------------------------------------------------

/// A happening in the world, consumed by whichever handler claims it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    pub target: Entity,
    pub handler: Entity,
    pub radius: f32,
    pub active: bool,
}

impl Default for Event {
    fn default() -> Self {
        Self {
            event_type: EventType::None,
            target: Entity::NONE,
            handler: Entity::NONE,
            radius: 0.0,
            active: true,
        }
    }
}

/// Script table plus subscription set for reacting to events.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EventHandler {
    pub blueprint: String,
    pub possible_events: EventTypeSet,
}

// ---------------------------------------------------------------------------
// Economy records
// ---------------------------------------------------------------------------

/// Gold carried or stored, capped at `max`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Gold {
    pub curr: u32,
    pub max: u32,
}

/// Purchase and refund value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub price: u32,
}

/// Marks a mineable gold deposit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Mine;

/// Raises the owning player's mana pool while the entity lives.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ManaCrystal {
    pub cap_increase: u32,
    pub regen_increase: u32,
}

/// Spawner that produces entities from a blueprint up to a limit.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Production {
    pub blueprint: String,
    pub limit: u32,
    pub count: u32,
    pub cooldown: f32,
    pub curr_cd: f32,
}

/// Back-pointer from a produced entity to its producer, so the producer's
/// count can be decremented when the product dies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub producer: Entity,
}

impl Default for Product {
    fn default() -> Self {
        Self { producer: Entity::NONE }
    }
}

/// Active spell the entity can cast.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Spell {
    pub blueprint: String,
    pub cooldown: f32,
    pub cd_time: f32,
}

/// Script-driven placement of new buildings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Constructor {
    pub blueprint: String,
}

/// Level progression driven by accumulated experience.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Upgrade {
    pub blueprint: String,
    pub experience: u32,
    pub exp_needed: u32,
    pub level: u32,
    pub level_cap: u32,
}

/// Experience awarded to the killer when this entity dies.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperienceValue {
    pub value: u32,
}

/// On-screen notification cooldown for this entity's messages.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub curr_time: f32,
    pub cooldown: f32,
}

/// Display name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Name {
    pub name: String,
}

/// Which side the entity fights for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FactionTag {
    pub faction: Faction,
}

// ---------------------------------------------------------------------------
// Grid records
// ---------------------------------------------------------------------------

/// One cell of the pathfinding grid.
///
/// `neighbours` holds the 8-neighbourhood plus the portal slot, indexed by
/// `Direction`. Geometric links are symmetric by construction; the portal
/// slot is wired independently per side. `resident` is the structure
/// occupying the cell, if any.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridNode {
    pub neighbours: [Entity; Direction::COUNT],
    pub free: bool,
    pub resident: Entity,
    pub x: u32,
    pub y: u32,
}

impl Default for GridNode {
    fn default() -> Self {
        Self {
            neighbours: [Entity::NONE; Direction::COUNT],
            free: true,
            resident: Entity::NONE,
            x: 0,
            y: 0,
        }
    }
}

/// A building occupying a square block of grid cells.
///
/// `radius` is in cells; the footprint is the (2r+1) by (2r+1) block centred
/// on the placement cell. `walk_through` structures block placement but not
/// movement. `residences` lists every node the structure sits on.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub radius: u32,
    pub walk_through: bool,
    pub residences: SmallVec<[Entity; 9]>,
}

/// Alignment variant applied to a structure mesh for one connectivity
/// state. Pure data for the renderer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AlignState {
    pub mesh: String,
    pub material: String,
    pub position_offset: Vec3,
    pub scale: Vec3,
}

/// Visuals for each wall connectivity state, indexed by neighbour count
/// 0 through 4 plus the straight tunnel variant at index 5.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Align {
    pub states: [AlignState; 6],
}

/// Marks a structure that counts as a wall for its neighbours' alignment
/// without being realigned itself.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DummyAlign;

/// Marks a node pair endpoint reachable through the portal slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Portal;

// ---------------------------------------------------------------------------
// Movement planning and task records
// ---------------------------------------------------------------------------

/// Path-following state. `path` holds the node entities still ahead of the
/// walker; `last` and `target` bracket the most recent search so a broken
/// path can be recomputed toward the same goal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pathfinding {
    pub target: Entity,
    pub last: Entity,
    pub path: VecDeque<Entity>,
    pub blueprint: String,
}

impl Default for Pathfinding {
    fn default() -> Self {
        Self {
            target: Entity::NONE,
            last: Entity::NONE,
            path: VecDeque::new(),
            blueprint: String::new(),
        }
    }
}

/// One unit of goal-directed work. Tasks are entities themselves, queued on
/// a handler and destroyed on completion or cancellation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_type: TaskType,
    pub source: Entity,
    pub target: Entity,
    pub complete: bool,
}

impl Default for Task {
    fn default() -> Self {
        Self {
            task_type: TaskType::None,
            source: Entity::NONE,
            target: Entity::NONE,
            complete: false,
        }
    }
}

/// Work queue of an entity that executes tasks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskHandler {
    pub queue: VecDeque<Entity>,
    pub curr_task: Entity,
    pub busy: bool,
    pub possible_tasks: TaskTypeSet,
    pub blueprint: String,
}

impl Default for TaskHandler {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            curr_task: Entity::NONE,
            busy: false,
            possible_tasks: TaskTypeSet::default(),
            blueprint: String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Kind registry
// ---------------------------------------------------------------------------

/// Ties a record type to its kind and its field of `Stores`.
pub trait Component: Clone + std::fmt::Debug + 'static {
    const KIND: ComponentKind;

    fn store(stores: &Stores) -> &ComponentStore<Self>;
    fn store_mut(stores: &mut Stores) -> &mut ComponentStore<Self>;
}

macro_rules! components {
    ( $( $kind:ident => $ty:ident in $field:ident ),+ $(,)? ) => {
        /// Discriminant for every component kind. The variant's position is
        /// its bit in the presence mask.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum ComponentKind {
            $( $kind, )+
        }

        impl ComponentKind {
            pub const COUNT: usize = [$( stringify!($kind) ),+].len();

            /// Every kind in mask-bit order.
            pub const ALL: [ComponentKind; Self::COUNT] = [
                $( ComponentKind::$kind, )+
            ];

            /// This kind's bit in the presence mask.
            pub fn bit(self) -> usize {
                self as usize
            }
        }

        /// A detached copy of one record, tagged with its kind. The unit of
        /// component persistence.
        #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
        pub enum ComponentSnapshot {
            $( $kind($ty), )+
        }

        impl ComponentSnapshot {
            pub fn kind(&self) -> ComponentKind {
                match self {
                    $( ComponentSnapshot::$kind(_) => ComponentKind::$kind, )+
                }
            }
        }

        /// One typed store per component kind.
        #[derive(Clone, Debug, Default, Serialize, Deserialize)]
        pub struct Stores {
            $( pub $field: ComponentStore<$ty>, )+
        }

        impl Stores {
            /// Removes the entity's record of the given kind, if present.
            pub fn remove_kind(&mut self, kind: ComponentKind, entity: Entity) -> bool {
                match kind {
                    $( ComponentKind::$kind => self.$field.remove(entity).is_some(), )+
                }
            }

            /// Copies out the entity's record of the given kind.
            pub fn snapshot_kind(
                &self,
                kind: ComponentKind,
                entity: Entity,
            ) -> Option<ComponentSnapshot> {
                match kind {
                    $( ComponentKind::$kind => {
                        self.$field.get(entity).cloned().map(ComponentSnapshot::$kind)
                    } )+
                }
            }

            /// Reattaches a snapshotted record to the entity.
            pub fn restore(&mut self, entity: Entity, snapshot: ComponentSnapshot) {
                match snapshot {
                    $( ComponentSnapshot::$kind(record) => {
                        self.$field.insert(entity, record);
                    } )+
                }
            }
        }

        $(
            impl Component for $ty {
                const KIND: ComponentKind = ComponentKind::$kind;

                fn store(stores: &Stores) -> &ComponentStore<Self> {
                    &stores.$field
                }

                fn store_mut(stores: &mut Stores) -> &mut ComponentStore<Self> {
                    &mut stores.$field
                }
            }
        )+
    };
}

components! {
    Physics => Physics in physics,
    Health => Health in health,
    Ai => Ai in ai,
    Graphics => Graphics in graphics,
    Movement => Movement in movement,
    Combat => Combat in combat,
    Event => Event in event,
    Input => Input in input,
    Time => Time in time,
    Mana => Mana in mana,
    Spell => Spell in spell,
    Production => Production in production,
    GridNode => GridNode in grid_node,
    Product => Product in product,
    Pathfinding => Pathfinding in pathfinding,
    Task => Task in task,
    TaskHandler => TaskHandler in task_handler,
    Structure => Structure in structure,
    Homing => Homing in homing,
    EventHandler => EventHandler in event_handler,
    Destructor => Destructor in destructor,
    Gold => Gold in gold,
    Faction => FactionTag in faction,
    Price => Price in price,
    Align => Align in align,
    Mine => Mine in mine,
    ManaCrystal => ManaCrystal in mana_crystal,
    OnHit => OnHit in on_hit,
    Constructor => Constructor in constructor,
    Trigger => Trigger in trigger,
    Upgrade => Upgrade in upgrade,
    Notification => Notification in notification,
    Explosion => Explosion in explosion,
    Lifespan => Lifespan in lifespan,
    Name => Name in name,
    ExperienceValue => ExperienceValue in experience_value,
    Light => Light in light,
    Command => Command in command,
    Counter => Counter in counter,
    Portal => Portal in portal,
    Animation => Animation in animation,
    Selection => Selection in selection,
    DummyAlign => DummyAlign in dummy_align,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_bits_fit_the_presence_mask() {
        assert!(ComponentKind::COUNT <= 64);
        for (i, kind) in ComponentKind::ALL.iter().enumerate() {
            assert_eq!(kind.bit(), i);
        }
    }

    #[test]
    fn snapshot_and_restore_one_kind() {
        let mut stores = Stores::default();
        let entity = Entity(3);
        stores.health.insert(
            entity,
            Health { curr: 10, max: 20, regen: 1, defense: 2, alive: true },
        );

        let snapshot = stores.snapshot_kind(ComponentKind::Health, entity).unwrap();
        assert_eq!(snapshot.kind(), ComponentKind::Health);
        assert!(stores.remove_kind(ComponentKind::Health, entity));
        assert!(stores.health.get(entity).is_none());

        stores.restore(entity, snapshot);
        assert_eq!(stores.health.get(entity).unwrap().curr, 10);
    }

    #[test]
    fn remove_kind_misses_cleanly() {
        let mut stores = Stores::default();
        assert!(!stores.remove_kind(ComponentKind::Gold, Entity(1)));
        assert!(stores.snapshot_kind(ComponentKind::Gold, Entity(1)).is_none());
    }

    #[test]
    fn component_trait_reaches_the_right_store() {
        let mut stores = Stores::default();
        Gold::store_mut(&mut stores).insert(Entity(5), Gold { curr: 7, max: 100 });
        assert_eq!(Gold::store(&stores).get(Entity(5)).unwrap().curr, 7);
        assert_eq!(Gold::KIND, ComponentKind::Gold);
    }

    #[test]
    fn default_grid_node_is_unlinked_and_free() {
        let node = GridNode::default();
        assert!(node.free);
        assert!(node.resident.is_none());
        assert!(node.neighbours.iter().all(|n| n.is_none()));
    }
}
