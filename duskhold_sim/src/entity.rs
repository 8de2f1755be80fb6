// Entity lifecycle and component attachment.
//
// `EntitySystem` owns the presence masks and the typed stores, and is the
// only place either is mutated, so the invariant "mask bit set iff record
// present" holds everywhere else by construction.
//
// Destruction is two-phase. Game logic marks entities (and individual
// components) for removal mid-tick; `cleanup` applies the removals at the
// end of the tick. Handles stay valid for the remainder of the tick in
// which their entity was marked, so systems never observe a handle going
// dangling under them.
//
// **Critical constraint: determinism.** Ids are handed out sequentially.
// Cleanup processes marked entities in ascending id order.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use duskhold_script::{ScriptHost, ScriptValue};

use crate::components::{Component, ComponentKind, ComponentSnapshot, Destructor, Stores};
use crate::error::SimError;
use crate::types::{Entity, PresenceMask};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EntitySystem {
    stores: Stores,
    entities: BTreeMap<Entity, PresenceMask>,
    to_destroy: BTreeSet<Entity>,
    comps_to_remove: BTreeSet<(Entity, ComponentKind)>,
    blueprints: BTreeSet<String>,
    next_id: u32,
}

impl EntitySystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_id(&mut self) -> Entity {
        if self.next_id < u32::MAX {
            let id = Entity(self.next_id);
            self.next_id += 1;
            return id;
        }
        // Id space saturated; reuse the lowest free id.
        let mut candidate = 0u32;
        for &Entity(id) in self.entities.keys() {
            if id > candidate {
                break;
            }
            if id == candidate {
                candidate += 1;
            }
        }
        debug_assert!(Entity(candidate) != Entity::NONE);
        Entity(candidate)
    }

    /// Creates an empty entity with no components.
    pub fn create_entity(&mut self) -> Entity {
        let entity = self.alloc_id();
        self.entities.insert(entity, PresenceMask::default());
        entity
    }

    /// Registers a blueprint name so entities can be created from it.
    pub fn register_blueprint(&mut self, name: &str) {
        self.blueprints.insert(name.to_string());
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.blueprints.contains(name)
    }

    /// Creates an entity and hands it to the named blueprint's `init`
    /// method, which attaches the components the blueprint calls for.
    pub fn create_entity_from_blueprint(
        &mut self,
        script: &mut dyn ScriptHost,
        blueprint: &str,
    ) -> Result<Entity, SimError> {
        if !self.blueprints.contains(blueprint) {
            return Err(SimError::UnknownBlueprint(blueprint.to_string()));
        }
        let entity = self.create_entity();
        script.invoke(blueprint, "init", &[ScriptValue::Uint(entity.raw())]);
        Ok(entity)
    }

    pub fn exists(&self, entity: Entity) -> bool {
        self.entities.contains_key(&entity)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Attaches a record, replacing any existing one of the same kind.
    /// Ignored for untracked entities.
    pub fn add<T: Component>(&mut self, entity: Entity, record: T) -> bool {
        let Some(mask) = self.entities.get_mut(&entity) else {
            return false;
        };
        mask.set(T::KIND.bit());
        T::store_mut(&mut self.stores).insert(entity, record);
        true
    }

    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        T::store(&self.stores).get(entity)
    }

    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        T::store_mut(&mut self.stores).get_mut(entity)
    }

    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.entities
            .get(&entity)
            .is_some_and(|mask| mask.test(T::KIND.bit()))
    }

    pub fn has_kind(&self, entity: Entity, kind: ComponentKind) -> bool {
        self.entities
            .get(&entity)
            .is_some_and(|mask| mask.test(kind.bit()))
    }

    /// Every record of one kind in ascending entity order.
    pub fn iter<T: Component>(&self) -> impl Iterator<Item = (Entity, &T)> {
        T::store(&self.stores).iter()
    }

    /// Sorted ids of every entity carrying the component.
    pub fn entities_with<T: Component>(&self) -> Vec<Entity> {
        T::store(&self.stores).entities()
    }

    /// Detaches a record immediately, bypassing the end-of-tick phase.
    pub fn remove_now<T: Component>(&mut self, entity: Entity) -> Option<T> {
        let removed = T::store_mut(&mut self.stores).remove(entity)?;
        if let Some(mask) = self.entities.get_mut(&entity) {
            mask.clear(T::KIND.bit());
        }
        Some(removed)
    }

    /// Marks one component for detachment at the next `cleanup`.
    pub fn schedule_remove(&mut self, entity: Entity, kind: ComponentKind) {
        if self.has_kind(entity, kind) {
            self.comps_to_remove.insert((entity, kind));
        }
    }

    /// Marks the entity for destruction at the next `cleanup`. Its handle
    /// and components stay valid until then.
    pub fn destroy_entity(&mut self, entity: Entity) {
        if self.entities.contains_key(&entity) {
            self.to_destroy.insert(entity);
        }
    }

    pub fn is_marked(&self, entity: Entity) -> bool {
        self.to_destroy.contains(&entity)
    }

    /// Marks every live entity for destruction at the next `cleanup` and
    /// restarts the id counter. This is the whole-world reset used when a
    /// game ends or a save is about to load; run `cleanup` before creating
    /// new entities so fresh ids cannot collide with doomed ones.
    pub fn delete_entities(&mut self) {
        self.to_destroy.extend(self.entities.keys().copied());
        self.next_id = 0;
    }

    /// Marks the entity for destruction, first firing its destructor hook
    /// unless suppressed. `killer` is forwarded to the hook and may be
    /// `Entity::NONE`.
    pub fn destroy(
        &mut self,
        script: &mut dyn ScriptHost,
        entity: Entity,
        suppress_dtor: bool,
        killer: Entity,
    ) {
        if !self.entities.contains_key(&entity) || self.to_destroy.contains(&entity) {
            return;
        }
        if !suppress_dtor
            && let Some(dtor) = self.get::<Destructor>(entity)
        {
            let blueprint = dtor.blueprint.clone();
            script.invoke(
                &blueprint,
                "dtor",
                &[
                    ScriptValue::Uint(entity.raw()),
                    ScriptValue::Uint(killer.raw()),
                ],
            );
        }
        self.to_destroy.insert(entity);
    }

    /// Applies all pending removals. Component removals run first; an
    /// entity whose last component is detached here is destroyed in the
    /// same pass. Returns the destroyed ids in ascending order.
    pub fn cleanup(&mut self) -> Vec<Entity> {
        let comps = std::mem::take(&mut self.comps_to_remove);
        for (entity, kind) in comps {
            if self.stores.remove_kind(kind, entity)
                && let Some(mask) = self.entities.get_mut(&entity)
            {
                mask.clear(kind.bit());
                if mask.is_empty() {
                    self.to_destroy.insert(entity);
                }
            }
        }

        let doomed = std::mem::take(&mut self.to_destroy);
        let mut destroyed = Vec::with_capacity(doomed.len());
        for entity in doomed {
            let Some(mask) = self.entities.remove(&entity) else {
                continue;
            };
            for kind in ComponentKind::ALL {
                if mask.test(kind.bit()) {
                    self.stores.remove_kind(kind, entity);
                }
            }
            destroyed.push(entity);
        }
        destroyed
    }

    /// Copies out every component the entity carries, in mask-bit order.
    pub fn snapshot_entity(&self, entity: Entity) -> Vec<ComponentSnapshot> {
        let Some(mask) = self.entities.get(&entity) else {
            return Vec::new();
        };
        ComponentKind::ALL
            .iter()
            .filter(|kind| mask.test(kind.bit()))
            .filter_map(|&kind| self.stores.snapshot_kind(kind, entity))
            .collect()
    }

    /// Recreates an entity from snapshotted components under a fresh id.
    pub fn restore_entity(&mut self, snapshots: Vec<ComponentSnapshot>) -> Entity {
        let entity = self.create_entity();
        for snapshot in snapshots {
            let kind = snapshot.kind();
            self.stores.restore(entity, snapshot);
            if let Some(mask) = self.entities.get_mut(&entity) {
                mask.set(kind.bit());
            }
        }
        entity
    }
}
