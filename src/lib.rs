//! Protobuf schema linker — load `.proto` files from directories, archives,
//! and standalone files, link them into a resolved schema, and shake that
//! schema down to the types a build actually uses.
//!
//! The crate is the middle of a schema toolchain: a parser (supplied through
//! the [`Parser`] seam) produces file ASTs, and code generators (registered
//! as [`SchemaHandler`]s) consume the linked output. In between:
//!
//! - [`SchemaLoader`] — enumerates the source path eagerly, pulls imports
//!   from the proto path lazily and memoized, decodes files by their byte
//!   order mark, and collects every loading problem before giving up.
//! - [`Schema`] — the linked result: every written type name resolved,
//!   extension fields injected into the messages they extend, and
//!   parenthesized options linked to the extension members they name.
//! - [`PruningRules`] with [`Schema::prune`] — mark-and-sweep tree shaking
//!   from root patterns, with rubbish patterns that always win.
//! - [`partition`] — split one schema across named modules, each pruned
//!   independently, with first-owner-wins type ownership along the module
//!   dependency order.
//!
//! # Loading and linking
//!
//! ```no_run
//! use protolink::{Error, Location, Parser, SchemaLoader};
//!
//! fn compile(parser: Box<dyn Parser>) -> Result<(), Error> {
//!     let mut loader = SchemaLoader::new(parser);
//!     loader.init_roots(
//!         &[Location::get("src/main/proto")],
//!         &[Location::get("lib/protos.jar")],
//!     )?;
//!     let schema = loader.load_schema()?;
//!     for ty in schema.types() {
//!         println!("{ty}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Tree shaking
//!
//! ```no_run
//! use protolink::{ConfigError, PruningRules, Schema};
//!
//! fn shake(schema: &Schema) -> Result<Schema, ConfigError> {
//!     let rules = PruningRules::builder()
//!         .root("squareup.dinosaurs.*")
//!         .rubbish("squareup.dinosaurs.Fossil")
//!         .build()?;
//!     Ok(schema.prune(&rules))
//! }
//! ```
//!
//! # Error handling
//!
//! Configuration mistakes ([`ConfigError`]) fail immediately at the call that
//! made them. Schema problems are collected across the whole pass and surface
//! together as [`SchemaErrors`], one fully-contextualized message per issue,
//! so a single run reports everything wrong with the inputs. Both implement
//! [`miette::Diagnostic`] for rich output when printed with `{:?}`.

pub(crate) mod ast;
pub(crate) mod error;
pub(crate) mod handler;
pub(crate) mod linker;
pub(crate) mod loader;
pub(crate) mod location;
pub(crate) mod manifest;
pub(crate) mod model;
pub(crate) mod partition;
pub(crate) mod pruner;
pub(crate) mod roots;
pub(crate) mod suggest;
pub(crate) mod union_find;

// Re-export the public API at the crate root; the module split above is an
// implementation detail.
pub use ast::{
    EnumConstantElement, EnumElement, ExtendElement, FieldElement, Label, MessageElement,
    OptionElement, Parser, ProtoFileElement, RpcElement, ServiceElement, Syntax, TypeElement,
};
pub use error::{ConfigError, Error, SchemaError, SchemaErrors};
pub use handler::{HandlerFactory, HandlerRegistry, SchemaHandler};
pub use linker::Linker;
pub use loader::{SchemaLoader, locations_to_check};
pub use location::Location;
pub use manifest::{parse_manifest, read_manifest};
pub use model::proto_type::{ProtoMember, ProtoType};
pub use model::schema::Schema;
pub use model::types::{
    EnclosingType, EnumConstant, EnumType, Extend, Field, LinkedOption, MessageType, Options,
    ProtoFile, Rpc, Service, Type,
};
pub use partition::{Module, ModuleBuilder, Partition, partition};
pub use pruner::{PruningRules, PruningRulesBuilder};
pub use union_find::UnionFind;
