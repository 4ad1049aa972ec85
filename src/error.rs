// ==============================================================================
// Error Taxonomy
// ==============================================================================
//
// Two kinds of failure, handled very differently:
//
//   - `ConfigError`: the caller configured something unusable (a root path
//     that is neither directory, archive, nor schema file; a malformed
//     pruning pattern; a module graph with a cycle). These fail immediately
//     at the point of construction or validation.
//
//   - `SchemaError`: a problem in the schema content itself (missing import,
//     unresolved reference, package cycle). These are *collected* across a
//     whole loading or linking pass, keyed by the location that triggered
//     them, and raised together as one `SchemaErrors` aggregate so a user can
//     fix many problems per invocation instead of one.
//
// Both aggregate and enum implement `miette::Diagnostic` so callers can `?`
// them straight into `miette::Result`.

use crate::location::Location;

/// A failure in caller-supplied configuration. Raised immediately.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A search-path entry that exists but is neither a directory, a
    /// `.zip`/`.jar` archive, nor a schema file.
    #[error("unexpected root: {path} (expected a directory, archive (.zip / .jar), or .proto file)")]
    UnexpectedRoot { path: String },

    /// A search-path entry that could not be opened or read at all.
    #[error("unable to read root {path}: {reason}")]
    UnreadableRoot { path: String, reason: String },

    /// A pruning pattern that is neither a dotted identifier path nor a
    /// `package.*` prefix wildcard.
    #[error("unexpected pruning pattern: {pattern}")]
    InvalidPattern { pattern: String },

    /// A module declares a dependency on a module that does not exist.
    #[error("unknown module dependency: {dependency} (declared by {module})")]
    UnknownModuleDependency { module: String, dependency: String },

    /// The module dependency graph contains at least one cycle. The message
    /// lists every cycle and is produced by the partitioner in a fixed format.
    #[error("{message}")]
    ModuleCycle { message: String },

    /// A handler name with no registered factory.
    #[error("unknown handler: {name} (registered: {registered})")]
    UnknownHandler { name: String, registered: String },

    /// A module manifest that could not be deserialized.
    #[error("unable to parse module manifest: {reason}")]
    Manifest { reason: String },
}

impl miette::Diagnostic for ConfigError {}

/// One collected schema problem. The message is complete on its own (it
/// embeds whatever file context applies); the location keys the error for
/// programmatic inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    pub message: String,
    pub location: Location,
}

/// Accumulates `SchemaError`s across one loading or linking pass.
///
/// The collector is owned by the running pass and converted into a result at
/// the pass boundary: `into_result` yields `Ok(())` when nothing was
/// collected, or every collected error as one `SchemaErrors` aggregate.
#[derive(Debug, Default)]
pub struct ErrorCollector {
    errors: Vec<SchemaError>,
}

impl ErrorCollector {
    pub fn new() -> ErrorCollector {
        ErrorCollector::default()
    }

    /// Record one error attributed to `location`.
    pub fn error(&mut self, message: impl Into<String>, location: &Location) {
        self.errors.push(SchemaError {
            message: message.into(),
            location: location.clone(),
        });
    }

    /// Finish the pass: no errors is `Ok`, anything else is the aggregate.
    pub fn into_result(self) -> Result<(), SchemaErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(SchemaErrors {
                errors: self.errors,
            })
        }
    }
}

/// Every schema problem from one pass, raised as a single failure.
#[derive(Debug)]
pub struct SchemaErrors {
    errors: Vec<SchemaError>,
}

impl SchemaErrors {
    /// The collected errors, in the order they were recorded.
    pub fn errors(&self) -> &[SchemaError] {
        &self.errors
    }
}

impl std::fmt::Display for SchemaErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            f.write_str(&error.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for SchemaErrors {}

impl miette::Diagnostic for SchemaErrors {}

/// Top-level failure of a full `load_schema` run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Schema(#[from] SchemaErrors),
}

impl miette::Diagnostic for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_collector_is_ok() {
        let collector = ErrorCollector::new();
        assert!(collector.into_result().is_ok());
    }

    #[test]
    fn aggregate_joins_messages_with_newlines() {
        let mut collector = ErrorCollector::new();
        collector.error("unable to find a/b.proto", &Location::get("x.proto"));
        collector.error("no sources", &Location::default());
        let errors = collector
            .into_result()
            .expect_err("collector with entries produces an aggregate");
        assert_eq!(errors.to_string(), "unable to find a/b.proto\nno sources");
        assert_eq!(errors.errors().len(), 2);
    }

    #[test]
    fn errors_keep_their_locations() {
        let mut collector = ErrorCollector::new();
        let location = Location::new("protos", "a.proto").at(3, 1);
        collector.error("boom", &location);
        let errors = collector
            .into_result()
            .expect_err("collector with entries produces an aggregate");
        assert_eq!(errors.errors()[0].location, location);
    }

    #[test]
    fn module_cycle_message_is_verbatim() {
        let err = ConfigError::ModuleCycle {
            message: "ERROR: Modules contain dependency cycle(s):\n - [one, two]\n".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "ERROR: Modules contain dependency cycle(s):\n - [one, two]\n"
        );
    }
}
