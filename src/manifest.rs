// ==============================================================================
// Module Manifest
// ==============================================================================
//
// A JSON file mapping module names to their dependencies and pruning
// patterns, the file-based way to drive the partitioner:
//
// ```json
// {
//   "common":  { "roots": ["squareup.geometry.*"] },
//   "feature": { "dependencies": ["common"], "roots": ["squareup.app.*"] }
// }
// ```
//
// Every field is optional. Module declaration order is preserved, which
// keeps cycle reports and topological tie-breaks stable across runs.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::partition::Module;
use crate::pruner::PruningRules;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModuleSpec {
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    roots: Vec<String>,
    #[serde(default)]
    rubbish: Vec<String>,
}

/// Parse a JSON manifest into modules, in declaration order.
pub fn parse_manifest(source: &str) -> Result<IndexMap<String, Module>, ConfigError> {
    let specs: IndexMap<String, ModuleSpec> =
        serde_json::from_str(source).map_err(|e| ConfigError::Manifest {
            reason: e.to_string(),
        })?;
    let mut modules = IndexMap::with_capacity(specs.len());
    for (name, spec) in specs {
        let mut rules = PruningRules::builder();
        for root in spec.roots {
            rules = rules.root(root);
        }
        for pattern in spec.rubbish {
            rules = rules.rubbish(pattern);
        }
        let mut module = Module::builder().pruning_rules(rules.build()?);
        for dependency in spec.dependencies {
            module = module.dependency(dependency);
        }
        modules.insert(name, module.build());
    }
    Ok(modules)
}

/// Read and parse the manifest at `path`.
pub fn read_manifest(path: &Path) -> Result<IndexMap<String, Module>, ConfigError> {
    let source = fs::read_to_string(path).map_err(|e| ConfigError::Manifest {
        reason: format!("{}: {e}", path.display()),
    })?;
    parse_manifest(&source)
}
