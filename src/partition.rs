// ==============================================================================
// Partitioner
// ==============================================================================
//
// Splits one schema across named modules. Every module prunes the *original*
// schema with its own rules, so the shape a type takes inside a module is
// decided by that module alone. What the dependency graph adds is ownership:
// walking modules in topological order, the first module whose pruned schema
// retains a type owns it, and downstream modules treat that type as supplied
// by its owner instead of emitting it again.
//
// The module graph must name only known modules and must be acyclic. Cycle
// validation reports every strongly-connected component at once, in a fixed
// message format.

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::error::ConfigError;
use crate::model::proto_type::ProtoType;
use crate::model::schema::Schema;
use crate::model::types::Type;
use crate::pruner::PruningRules;

/// A named slice of the schema: which modules it builds on and which types it
/// keeps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    dependencies: IndexSet<String>,
    pruning_rules: PruningRules,
}

impl Module {
    pub fn builder() -> ModuleBuilder {
        ModuleBuilder::default()
    }

    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.dependencies.iter().map(String::as_str)
    }

    pub fn pruning_rules(&self) -> &PruningRules {
        &self.pruning_rules
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModuleBuilder {
    dependencies: IndexSet<String>,
    pruning_rules: PruningRules,
}

impl ModuleBuilder {
    /// Depend on another module by name. The name is checked against the
    /// module map when partitioning, not here.
    pub fn dependency(mut self, name: impl Into<String>) -> ModuleBuilder {
        self.dependencies.insert(name.into());
        self
    }

    pub fn pruning_rules(mut self, rules: PruningRules) -> ModuleBuilder {
        self.pruning_rules = rules;
        self
    }

    pub fn build(self) -> Module {
        Module {
            dependencies: self.dependencies,
            pruning_rules: self.pruning_rules,
        }
    }
}

/// One module's output: its independently pruned schema and the types it
/// owns (emits). Types the schema retains but some upstream module owns are
/// present in `schema` but absent from `types`.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    schema: Schema,
    types: IndexSet<ProtoType>,
}

impl Partition {
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The types and services this module owns, in retention order.
    pub fn types(&self) -> &IndexSet<ProtoType> {
        &self.types
    }
}

/// Partition `schema` across `modules`. The result is keyed in topological
/// order: every module comes after the modules it depends on.
pub fn partition(
    schema: &Schema,
    modules: &IndexMap<String, Module>,
) -> Result<IndexMap<String, Partition>, ConfigError> {
    for (name, module) in modules {
        for dependency in &module.dependencies {
            if !modules.contains_key(dependency) {
                return Err(ConfigError::UnknownModuleDependency {
                    module: name.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
    }
    let cycles = find_cycles(modules);
    if !cycles.is_empty() {
        let mut message = String::from("ERROR: Modules contain dependency cycle(s):\n");
        for cycle in &cycles {
            message.push_str(&format!(" - [{}]\n", cycle.join(", ")));
        }
        return Err(ConfigError::ModuleCycle { message });
    }

    let order = topological_order(modules);
    debug!(order = ?order.iter().map(|(name, _)| *name).collect::<Vec<_>>(), "partitioning modules");

    let mut claimed: IndexSet<ProtoType> = IndexSet::new();
    let mut partitions = IndexMap::with_capacity(modules.len());
    for (name, module) in order {
        let module_schema = schema.prune(module.pruning_rules());
        let mut types: IndexSet<ProtoType> = IndexSet::new();
        for ty in module_schema.types() {
            // Enclosing shells only exist to carry a nested name; nobody
            // owns them.
            if matches!(module_schema.get_type(ty.as_str()), Some(Type::Enclosing(_))) {
                continue;
            }
            if claimed.insert(ty.clone()) {
                types.insert(ty.clone());
            }
        }
        for service in module_schema.services() {
            let service_name = service.name().clone();
            if claimed.insert(service_name.clone()) {
                types.insert(service_name);
            }
        }
        partitions.insert(
            name.to_string(),
            Partition {
                schema: module_schema,
                types,
            },
        );
    }
    Ok(partitions)
}

/// Every non-trivial strongly-connected component of the dependency graph
/// (including self-loops), members in declaration order, components ordered
/// by their first member.
fn find_cycles(modules: &IndexMap<String, Module>) -> Vec<Vec<String>> {
    let adjacency: Vec<Vec<usize>> = modules
        .values()
        .map(|module| {
            module
                .dependencies
                .iter()
                .filter_map(|dependency| modules.get_index_of(dependency.as_str()))
                .collect()
        })
        .collect();

    struct State {
        index: Vec<Option<usize>>,
        low: Vec<usize>,
        on_stack: Vec<bool>,
        stack: Vec<usize>,
        counter: usize,
        components: Vec<Vec<usize>>,
    }

    fn connect(v: usize, adjacency: &[Vec<usize>], state: &mut State) {
        state.index[v] = Some(state.counter);
        state.low[v] = state.counter;
        state.counter += 1;
        state.stack.push(v);
        state.on_stack[v] = true;
        for &w in &adjacency[v] {
            if state.index[w].is_none() {
                connect(w, adjacency, state);
                state.low[v] = state.low[v].min(state.low[w]);
            } else if state.on_stack[w]
                && let Some(index_w) = state.index[w]
            {
                state.low[v] = state.low[v].min(index_w);
            }
        }
        if Some(state.low[v]) == state.index[v] {
            let mut component = Vec::new();
            while let Some(w) = state.stack.pop() {
                state.on_stack[w] = false;
                component.push(w);
                if w == v {
                    break;
                }
            }
            state.components.push(component);
        }
    }

    let count = modules.len();
    let mut state = State {
        index: vec![None; count],
        low: vec![0; count],
        on_stack: vec![false; count],
        stack: Vec::new(),
        counter: 0,
        components: Vec::new(),
    };
    for v in 0..count {
        if state.index[v].is_none() {
            connect(v, &adjacency, &mut state);
        }
    }

    let mut cycles: Vec<Vec<usize>> = state
        .components
        .into_iter()
        .filter(|component| component.len() > 1 || adjacency[component[0]].contains(&component[0]))
        .map(|mut component| {
            component.sort_unstable();
            component
        })
        .collect();
    cycles.sort_unstable();
    cycles
        .into_iter()
        .map(|component| {
            component
                .into_iter()
                .filter_map(|i| modules.get_index(i).map(|(name, _)| name.clone()))
                .collect()
        })
        .collect()
}

/// Kahn's algorithm with a declaration-order scan, so ties break the same
/// way on every run.
fn topological_order(modules: &IndexMap<String, Module>) -> Vec<(&str, &Module)> {
    let mut order: Vec<(&str, &Module)> = Vec::with_capacity(modules.len());
    let mut placed: IndexSet<&str> = IndexSet::new();
    while placed.len() < modules.len() {
        for (name, module) in modules {
            if placed.contains(name.as_str()) {
                continue;
            }
            if module
                .dependencies
                .iter()
                .all(|dependency| placed.contains(dependency.as_str()))
            {
                placed.insert(name.as_str());
                order.push((name.as_str(), module));
            }
        }
    }
    order
}
