// Task creation, queueing and dispatch.
//
// Tasks are entities carrying a `Task` record, owned by the handler whose
// queue they sit in. The functions here keep the handler's bookkeeping
// honest; deciding what a dispatched task actually does is the AI layer's
// business.
//
// Cancellation tombstones a queue entry (writes NONE over it) instead of
// resizing the queue, so a sweep iterating the queue never sees entries
// shift under it. `next_task` skips tombstones when dispatching.
//
// See also: `pathfinding.rs`, which queues obstacle-clearing tasks through
// `add_task` when a route runs through a breakable structure.

use crate::components::{Task, TaskHandler};
use crate::entity::EntitySystem;
use crate::types::{Entity, TaskType};

/// Creates a standalone task entity aimed at `target`. Unowned until
/// `add_task` assigns it to a handler.
pub fn create_task(ents: &mut EntitySystem, target: Entity, task_type: TaskType) -> Entity {
    let task = ents.create_entity();
    ents.add(
        task,
        Task { task_type, source: Entity::NONE, target, complete: false },
    );
    task
}

/// Whether the handler's acceptable-type set covers the task.
pub fn task_possible(ents: &EntitySystem, handler: Entity, task: Entity) -> bool {
    let Some(record) = ents.get::<Task>(task) else {
        return false;
    };
    ents.get::<TaskHandler>(handler)
        .is_some_and(|h| h.possible_tasks.test(record.task_type))
}

pub fn add_possible_task(ents: &mut EntitySystem, handler: Entity, task_type: TaskType) {
    if let Some(record) = ents.get_mut::<TaskHandler>(handler) {
        record.possible_tasks.set(task_type);
    }
}

pub fn delete_possible_task(ents: &mut EntitySystem, handler: Entity, task_type: TaskType) {
    if let Some(record) = ents.get_mut::<TaskHandler>(handler) {
        record.possible_tasks.clear(task_type);
    }
}

/// Hands a task to a handler. A handler that cannot accept the task's type
/// ignores the call; callers are expected to pre-filter by capability.
///
/// A priority add jumps the queue: the new task goes to the front, the
/// handler's current task (if any) is demoted to the slot right behind it
/// and the handler is marked not busy so the next dispatch re-picks.
pub fn add_task(ents: &mut EntitySystem, handler: Entity, task: Entity, priority: bool) -> bool {
    if !task_possible(ents, handler, task) {
        return false;
    }
    if let Some(record) = ents.get_mut::<Task>(task) {
        record.source = handler;
    }
    let Some(record) = ents.get_mut::<TaskHandler>(handler) else {
        return false;
    };
    if priority {
        if !record.curr_task.is_none() {
            record.queue.push_front(record.curr_task);
            record.curr_task = Entity::NONE;
        }
        record.queue.push_front(task);
        record.busy = false;
    } else {
        record.queue.push_back(task);
    }
    true
}

/// Unhooks a task from its owner and marks the task entity for
/// destruction. Matching queue entries become tombstones.
pub fn cancel_task(ents: &mut EntitySystem, task: Entity) {
    let owner = ents.get::<Task>(task).map(|t| t.source);
    let Some(owner) = owner else {
        return;
    };
    if let Some(record) = ents.get_mut::<TaskHandler>(owner) {
        for slot in record.queue.iter_mut() {
            if *slot == task {
                *slot = Entity::NONE;
            }
        }
        if record.curr_task == task {
            record.curr_task = Entity::NONE;
            record.busy = false;
        }
    }
    ents.destroy_entity(task);
}

pub fn set_complete(ents: &mut EntitySystem, task: Entity, complete: bool) {
    if let Some(record) = ents.get_mut::<Task>(task) {
        record.complete = complete;
    }
}

/// A task that no longer exists counts as complete, so a handler whose
/// current task died mid-tick moves on instead of stalling.
pub fn is_complete(ents: &EntitySystem, task: Entity) -> bool {
    match ents.get::<Task>(task) {
        Some(record) => record.complete,
        None => true,
    }
}

/// Destroys every queued task and empties the queue. The current task is
/// left running.
pub fn clear_task_queue(ents: &mut EntitySystem, handler: Entity) {
    let queued: Vec<Entity> = ents
        .get_mut::<TaskHandler>(handler)
        .map(|record| record.queue.drain(..).collect())
        .unwrap_or_default();
    for task in queued {
        if !task.is_none() {
            ents.destroy_entity(task);
        }
    }
}

/// Pops the next live task off the queue and makes it current, skipping
/// tombstones. Returns NONE when the queue is exhausted.
pub fn next_task(ents: &mut EntitySystem, handler: Entity) -> Entity {
    loop {
        let Some(record) = ents.get_mut::<TaskHandler>(handler) else {
            return Entity::NONE;
        };
        let Some(candidate) = record.queue.pop_front() else {
            record.busy = false;
            return Entity::NONE;
        };
        if candidate.is_none() {
            continue;
        }
        // A queued task whose entity died is treated like a tombstone.
        if !ents.exists(candidate) || ents.get::<Task>(candidate).is_none() {
            continue;
        }
        if let Some(record) = ents.get_mut::<TaskHandler>(handler) {
            record.curr_task = candidate;
            record.busy = true;
        }
        return candidate;
    }
}

/// One dispatch sweep over every handler, in id order. Completed current
/// tasks are retired (their entities marked for destruction) and the next
/// live queued task is promoted. Returns the `(handler, task)` pairs that
/// went current this sweep, for the AI layer to act on.
pub fn advance(ents: &mut EntitySystem) -> Vec<(Entity, Entity)> {
    let handlers = ents.entities_with::<TaskHandler>();
    let mut dispatched = Vec::new();
    for handler in handlers {
        let Some(record) = ents.get::<TaskHandler>(handler) else {
            continue;
        };
        let curr = record.curr_task;
        if !curr.is_none() {
            if !is_complete(ents, curr) {
                continue;
            }
            if let Some(record) = ents.get_mut::<TaskHandler>(handler) {
                record.curr_task = Entity::NONE;
                record.busy = false;
            }
            if ents.exists(curr) {
                ents.destroy_entity(curr);
            }
        }
        let next = next_task(ents, handler);
        if !next.is_none() {
            dispatched.push((handler, next));
        }
    }
    dispatched
}
