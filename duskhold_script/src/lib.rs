// duskhold_script — the scripting boundary of the Duskhold engine.
//
// Entity behavior in Duskhold (edge costs for pathfinding, obstacle-breaking
// permission, AI hooks, destructors, on-hit effects) is supplied by an
// embedded scripting host keyed by *blueprint name*. This crate defines the
// three callback shapes the simulation core is allowed to depend on and
// nothing else:
//
// - `cost(blueprint, from, to) -> f32`   per-edge pathfinding cost
// - `can_break(blueprint, from, to)`     may `from` demolish the obstacle `to`?
// - `invoke(blueprint, method, args)`    generic hook (dtor, on_hit, ai update)
//
// The concrete scripting runtime lives outside the workspace and implements
// `ScriptHost`. That boundary is enforced at the compiler level — the sim
// crate can name these shapes but can never link a script VM. Entity handles
// cross this boundary as plain `u64`s so the host needs no simulation types.
//
// `StaticScript` is a table-driven host used by the sim crate's tests.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A value passed to or returned from a script callback.
///
/// Mirrors the value kinds the simulation actually sends across the
/// boundary: entity handles ride as `Uint`, measurements as `Real`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ScriptValue {
    Nil,
    Bool(bool),
    Uint(u64),
    Real(f32),
    Str(String),
}

/// The callback surface the simulation core consumes.
///
/// All three methods take `&mut self` because real hosts (an embedded VM)
/// are stateful; a cost query may legitimately mutate interpreter state.
pub trait ScriptHost {
    /// Per-edge pathfinding cost for an entity using `blueprint`, moving
    /// toward `to`. The sim clamps non-positive returns to 1.0.
    fn cost(&mut self, blueprint: &str, from: u64, to: u64) -> f32;

    /// Whether the entity `from` (using `blueprint`) may break through the
    /// obstacle entity `to`.
    fn can_break(&mut self, blueprint: &str, from: u64, to: u64) -> bool;

    /// Generic hook dispatch: `blueprint.method(args...)`. Used for
    /// destructors, on-hit handlers and AI updates triggered by the core.
    fn invoke(&mut self, blueprint: &str, method: &str, args: &[ScriptValue]) -> ScriptValue;
}

/// A host that answers every query with the neutral value: cost 1.0, no
/// breaking, `Nil` from every hook. Handy as a placeholder and in tests that
/// don't care about scripted behavior.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullScript;

impl ScriptHost for NullScript {
    fn cost(&mut self, _blueprint: &str, _from: u64, _to: u64) -> f32 {
        1.0
    }

    fn can_break(&mut self, _blueprint: &str, _from: u64, _to: u64) -> bool {
        false
    }

    fn invoke(&mut self, _blueprint: &str, _method: &str, _args: &[ScriptValue]) -> ScriptValue {
        ScriptValue::Nil
    }
}

/// Table-driven script host for tests.
///
/// Costs resolve in order: per-destination override, then per-blueprint base
/// cost, then 1.0. Breaking is an allowlist of blueprint names. Every
/// `invoke` is recorded so tests can assert which hooks fired.
#[derive(Clone, Debug, Default)]
pub struct StaticScript {
    /// Base edge cost per blueprint name.
    pub base_costs: BTreeMap<String, f32>,
    /// Cost override keyed by destination entity handle.
    pub node_costs: BTreeMap<u64, f32>,
    /// Blueprints whose entities may break obstacles.
    pub breakers: BTreeSet<String>,
    /// Log of `(blueprint, method, args)` for every invoke call.
    pub invocations: Vec<(String, String, Vec<ScriptValue>)>,
}

impl StaticScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base cost for a blueprint.
    pub fn with_base_cost(mut self, blueprint: &str, cost: f32) -> Self {
        self.base_costs.insert(blueprint.to_owned(), cost);
        self
    }

    /// Override the cost of any edge ending at `node`.
    pub fn with_node_cost(mut self, node: u64, cost: f32) -> Self {
        self.node_costs.insert(node, cost);
        self
    }

    /// Allow entities of `blueprint` to break obstacles.
    pub fn with_breaker(mut self, blueprint: &str) -> Self {
        self.breakers.insert(blueprint.to_owned());
        self
    }
}

impl ScriptHost for StaticScript {
    fn cost(&mut self, blueprint: &str, _from: u64, to: u64) -> f32 {
        if let Some(&cost) = self.node_costs.get(&to) {
            return cost;
        }
        self.base_costs.get(blueprint).copied().unwrap_or(1.0)
    }

    fn can_break(&mut self, blueprint: &str, _from: u64, _to: u64) -> bool {
        self.breakers.contains(blueprint)
    }

    fn invoke(&mut self, blueprint: &str, method: &str, args: &[ScriptValue]) -> ScriptValue {
        self.invocations
            .push((blueprint.to_owned(), method.to_owned(), args.to_vec()));
        ScriptValue::Nil
    }
}
