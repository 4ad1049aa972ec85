// ==============================================================================
// Schema Handlers
// ==============================================================================
//
// The seam between this crate and whatever consumes a linked schema: code
// generators, validators, exporters. A handler is looked up by name in a
// registry of factory functions and constructed fresh per compilation, so
// handlers may carry per-run state without sharing it across runs. Asking
// for a name nobody registered is a configuration error that lists what is
// registered.

use indexmap::IndexMap;

use crate::error::ConfigError;
use crate::model::schema::Schema;

/// A consumer of linked schemas. Implementations receive each schema (one
/// per compilation, or one per module when partitioning) after all loading,
/// linking, and pruning has finished.
pub trait SchemaHandler {
    fn handle(&mut self, schema: &Schema) -> miette::Result<()>;
}

/// Builds a fresh handler per compilation.
pub type HandlerFactory = Box<dyn Fn() -> Box<dyn SchemaHandler>>;

/// Named handler factories.
#[derive(Default)]
pub struct HandlerRegistry {
    factories: IndexMap<String, HandlerFactory>,
}

impl HandlerRegistry {
    pub fn new() -> HandlerRegistry {
        HandlerRegistry::default()
    }

    /// Register `factory` under `name`, replacing any previous registration.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn() -> Box<dyn SchemaHandler> + 'static,
    ) {
        self.factories.insert(name.into(), Box::new(factory));
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Construct the handler registered under `name`.
    pub fn create(&self, name: &str) -> Result<Box<dyn SchemaHandler>, ConfigError> {
        match self.factories.get(name) {
            Some(factory) => Ok(factory()),
            None => Err(ConfigError::UnknownHandler {
                name: name.to_string(),
                registered: self.names().collect::<Vec<_>>().join(", "),
            }),
        }
    }
}
