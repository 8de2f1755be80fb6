// duskhold_sim — pure Rust simulation library.
//
// This crate contains the simulation substrate for Duskhold: the entity
// registry and component stores, the pathfinding grid and its per-tick
// maintenance, A* search, and the task queue layer. It has zero renderer
// dependencies and can be tested, benchmarked, and run headless.
//
// Module overview:
// - `entity.rs`:      EntitySystem — entity lifecycle, component attach/detach, two-phase destroy.
// - `components.rs`:  Component records + the `components!` kind registry macro.
// - `store.rs`:       ComponentStore — dense per-kind storage with a self-validating lookup memo.
// - `grid.rs`:        Grid — node entities, neighbour links, structure placement.
// - `maintenance.rs`: Per-tick realignment of changed nodes + repair of broken paths.
// - `pathfinding.rs`: A* over the grid with script-priced edges and pluggable heuristics.
// - `task.rs`:        Task entities, handler queues, the dispatch sweep.
// - `error.rs`:       SimError.
// - `types.rs`:       Entity, Vec3, PresenceMask, Direction, TaskType, small enums.
//
// Scripted behavior (edge costs, obstacle breaking, blueprint hooks)
// crosses the `duskhold_script::ScriptHost` trait; this crate triggers
// those callbacks but never implements them.
//
// **Critical constraint: determinism.** The simulation is a pure function
// of its inputs. Entity ids are sequential, ordered collections are
// `BTreeMap`/`BTreeSet`, and search ties break by node id. No system time,
// no OS entropy, no address-dependent iteration order.

pub mod components;
pub mod entity;
pub mod error;
pub mod grid;
pub mod maintenance;
pub mod pathfinding;
pub mod store;
pub mod task;
pub mod types;
