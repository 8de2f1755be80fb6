// Typed component storage.
//
// One `ComponentStore<T>` holds every live record of a single component
// kind. Records live in a dense vector for cache-friendly scans; a `BTreeMap`
// maps entity to slot for point lookups. On top of that sits a one-entry
// memo of the last lookup, since the access pattern is dominated by runs of
// repeated queries for the same entity within a tick.
//
// **Critical constraint: the memo can never serve stale data.** It is a pure
// hint, validated on every hit against the slot it points at. A swap-remove
// that moves some other record into the memoized slot makes the validation
// fail and the lookup falls back to the index. There is no invalidation
// protocol for callers to get wrong.

use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::collections::BTreeMap;

use crate::types::Entity;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ComponentStore<T> {
    entries: Vec<(Entity, T)>,
    index: BTreeMap<Entity, usize>,
    #[serde(skip)]
    memo: Cell<Option<(Entity, usize)>>,
}

impl<T> Default for ComponentStore<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: BTreeMap::new(),
            memo: Cell::new(None),
        }
    }
}

impl<T> ComponentStore<T> {
    /// Inserts a record, replacing any existing one. Returns the replaced
    /// record if there was one.
    pub fn insert(&mut self, entity: Entity, value: T) -> Option<T> {
        if let Some(&slot) = self.index.get(&entity) {
            let old = std::mem::replace(&mut self.entries[slot].1, value);
            return Some(old);
        }
        let slot = self.entries.len();
        self.entries.push((entity, value));
        self.index.insert(entity, slot);
        None
    }

    /// Checks whether the memo points at the queried entity's live slot.
    fn memo_slot(&self, entity: Entity) -> Option<usize> {
        let (memo_entity, slot) = self.memo.get()?;
        if memo_entity != entity {
            return None;
        }
        match self.entries.get(slot) {
            Some((occupant, _)) if *occupant == entity => Some(slot),
            _ => None,
        }
    }

    pub fn get(&self, entity: Entity) -> Option<&T> {
        if let Some(slot) = self.memo_slot(entity) {
            return Some(&self.entries[slot].1);
        }
        let slot = *self.index.get(&entity)?;
        self.memo.set(Some((entity, slot)));
        Some(&self.entries[slot].1)
    }

    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        let slot = match self.memo_slot(entity) {
            Some(slot) => slot,
            None => {
                let slot = *self.index.get(&entity)?;
                self.memo.set(Some((entity, slot)));
                slot
            }
        };
        Some(&mut self.entries[slot].1)
    }

    /// Removes and returns the entity's record. The vacated slot is filled
    /// by swapping in the last entry.
    pub fn remove(&mut self, entity: Entity) -> Option<T> {
        let slot = self.index.remove(&entity)?;
        self.memo.set(None);
        let (_, value) = self.entries.swap_remove(slot);
        if let Some((moved, _)) = self.entries.get(slot) {
            self.index.insert(*moved, slot);
        }
        Some(value)
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.index.contains_key(&entity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates records in ascending entity order regardless of the dense
    /// vector's current layout.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.index.iter().map(|(&entity, &slot)| (entity, &self.entries[slot].1))
    }

    /// Sorted entity list, for callers that need to look records up mutably
    /// one at a time while holding other borrows between lookups.
    pub fn entities(&self) -> Vec<Entity> {
        self.index.keys().copied().collect()
    }

    /// Mutable iteration in ascending entity order. Re-sorts the dense
    /// vector first so the scan order is stable across removal histories.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut T)> {
        self.entries.sort_by_key(|(entity, _)| *entity);
        for (slot, (entity, _)) in self.entries.iter().enumerate() {
            self.index.insert(*entity, slot);
        }
        self.memo.set(None);
        self.entries.iter_mut().map(|(entity, value)| (*entity, &mut *value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_of(pairs: &[(u32, &str)]) -> ComponentStore<String> {
        let mut store = ComponentStore::default();
        for &(id, value) in pairs {
            store.insert(Entity(id), value.to_string());
        }
        store
    }

    #[test]
    fn insert_get_replace() {
        let mut store = store_of(&[(1, "a"), (2, "b")]);
        assert_eq!(store.get(Entity(1)).unwrap(), "a");
        assert_eq!(store.len(), 2);

        let old = store.insert(Entity(1), "a2".to_string());
        assert_eq!(old.as_deref(), Some("a"));
        assert_eq!(store.get(Entity(1)).unwrap(), "a2");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn remove_swaps_and_fixes_index() {
        let mut store = store_of(&[(1, "a"), (2, "b"), (3, "c")]);
        assert_eq!(store.remove(Entity(1)).as_deref(), Some("a"));
        // Entity 3 was swapped into slot 0; both survivors still resolve.
        assert_eq!(store.get(Entity(3)).unwrap(), "c");
        assert_eq!(store.get(Entity(2)).unwrap(), "b");
        assert!(!store.contains(Entity(1)));
        assert_eq!(store.remove(Entity(1)), None);
    }

    #[test]
    fn memo_survives_unrelated_removal() {
        let mut store = store_of(&[(1, "a"), (2, "b"), (3, "c")]);
        // Prime the memo on entity 3 (slot 2), then remove entity 3 and
        // re-query: the memoized slot is gone or holds someone else, so the
        // lookup must miss cleanly.
        assert_eq!(store.get(Entity(3)).unwrap(), "c");
        store.remove(Entity(3));
        assert_eq!(store.get(Entity(3)), None);

        // Prime on entity 2, remove entity 1 (swapping 3.. already gone;
        // swaps 2 into slot 0) and re-query through the stale memo.
        assert_eq!(store.get(Entity(2)).unwrap(), "b");
        store.remove(Entity(1));
        assert_eq!(store.get(Entity(2)).unwrap(), "b");
    }

    #[test]
    fn iter_is_entity_ordered() {
        let mut store = store_of(&[(5, "e"), (1, "a"), (3, "c")]);
        store.remove(Entity(1));
        store.insert(Entity(2), "b".to_string());
        let order: Vec<u32> = store.iter().map(|(entity, _)| entity.0).collect();
        assert_eq!(order, vec![2, 3, 5]);
    }

    #[test]
    fn iter_mut_is_entity_ordered_after_churn() {
        let mut store = store_of(&[(4, "d"), (1, "a"), (2, "b"), (3, "c")]);
        store.remove(Entity(1));
        let order: Vec<u32> = store.iter_mut().map(|(entity, _)| entity.0).collect();
        assert_eq!(order, vec![2, 3, 4]);
        // Index is still coherent after the re-sort.
        assert_eq!(store.get(Entity(4)).unwrap(), "d");
    }

    #[test]
    fn serialization_drops_the_memo() {
        let store = store_of(&[(1, "a"), (2, "b")]);
        let _ = store.get(Entity(2));
        let json = serde_json::to_string(&store).unwrap();
        let restored: ComponentStore<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.get(Entity(1)).unwrap(), "a");
        assert_eq!(restored.get(Entity(2)).unwrap(), "b");
        assert_eq!(restored.len(), 2);
    }
}
