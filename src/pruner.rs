// ==============================================================================
// Pruner
// ==============================================================================
//
// Mark-and-sweep tree shaking over a linked schema. The mark phase seeds the
// retained set with every type and service matching a root pattern (minus
// rubbish), then chases references: a retained message reaches its fields'
// types, a retained service reaches its rpcs' request and response types, and
// a retained declaration's linked options reach the extension members they
// name. Rubbish is checked at every step, so a reachable-but-rubbish type is
// never added and nothing is reached through it. The sweep phase then copies
// the schema, keeping only what was marked: fields of unretained types are
// dropped outright, extension fields survive only when their member was
// marked through an applied option, and a dropped message whose nested type
// survives leaves an enclosing shell so the nested name keeps its dotted
// path.
//
// Pruning never fails. A pattern that matches nothing simply contributes
// nothing, and a schema pruned twice with the same rules comes out unchanged.

use std::collections::VecDeque;
use std::sync::LazyLock;

use indexmap::IndexSet;
use regex::Regex;
use tracing::debug;

use crate::error::ConfigError;
use crate::model::proto_type::{ProtoMember, ProtoType};
use crate::model::schema::Schema;
use crate::model::types::{
    EnclosingType, EnumConstant, EnumType, Extend, Field, MessageType, Options, ProtoFile, Rpc,
    Service, Type,
};

/// Which types to keep and which to throw away. A pattern is either an exact
/// fully-qualified name (`squareup.dinosaurs.Dinosaur`) or a package prefix
/// (`squareup.dinosaurs.*`). Rubbish always wins over roots; with no roots
/// configured at all, everything is kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PruningRules {
    roots: Vec<String>,
    rubbish: Vec<String>,
}

static PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*(\.\*)?$")
        .expect("the pattern grammar is a valid regex")
});

impl PruningRules {
    pub fn builder() -> PruningRulesBuilder {
        PruningRulesBuilder::default()
    }

    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    pub fn rubbish(&self) -> &[String] {
        &self.rubbish
    }

    pub(crate) fn has_roots(&self) -> bool {
        !self.roots.is_empty()
    }

    pub(crate) fn is_root(&self, name: &str) -> bool {
        matches(&self.roots, name)
    }

    pub(crate) fn is_rubbish(&self, name: &str) -> bool {
        matches(&self.rubbish, name)
    }
}

fn matches(patterns: &[String], name: &str) -> bool {
    patterns.iter().any(|pattern| match pattern.strip_suffix('*') {
        Some(prefix) => name.starts_with(prefix),
        None => pattern == name,
    })
}

/// Accumulates patterns and validates them all at [`build`](Self::build).
#[derive(Debug, Clone, Default)]
pub struct PruningRulesBuilder {
    roots: Vec<String>,
    rubbish: Vec<String>,
}

impl PruningRulesBuilder {
    /// Keep `pattern` and everything reachable from it.
    pub fn root(mut self, pattern: impl Into<String>) -> PruningRulesBuilder {
        self.roots.push(pattern.into());
        self
    }

    /// Throw `pattern` away even when something retained references it.
    pub fn rubbish(mut self, pattern: impl Into<String>) -> PruningRulesBuilder {
        self.rubbish.push(pattern.into());
        self
    }

    pub fn build(self) -> Result<PruningRules, ConfigError> {
        for pattern in self.roots.iter().chain(&self.rubbish) {
            if !PATTERN.is_match(pattern) {
                return Err(ConfigError::InvalidPattern {
                    pattern: pattern.clone(),
                });
            }
        }
        Ok(PruningRules {
            roots: self.roots,
            rubbish: self.rubbish,
        })
    }
}

/// Prune `schema` down to the types reachable from `rules`' roots.
pub(crate) fn prune(schema: &Schema, rules: &PruningRules) -> Schema {
    if !rules.has_roots() {
        return schema.clone();
    }
    let marks = Marks::compute(schema, rules);
    debug!(
        types = marks.retained.len(),
        members = marks.members.len(),
        "pruned schema"
    );
    marks.sweep()
}

struct Marks<'a> {
    schema: &'a Schema,
    rules: &'a PruningRules,
    /// Fully-qualified names of retained types and services.
    retained: IndexSet<String>,
    /// Extension members reached through applied options on retained
    /// declarations.
    members: IndexSet<ProtoMember>,
    queue: VecDeque<String>,
}

impl<'a> Marks<'a> {
    fn compute(schema: &'a Schema, rules: &'a PruningRules) -> Marks<'a> {
        let mut marks = Marks {
            schema,
            rules,
            retained: IndexSet::new(),
            members: IndexSet::new(),
            queue: VecDeque::new(),
        };
        let seeds: Vec<String> = schema
            .types()
            .map(|ty| ty.as_str().to_string())
            .chain(schema.services().map(|s| s.name().as_str().to_string()))
            .filter(|name| rules.is_root(name))
            .collect();
        for seed in seeds {
            marks.reach(&seed);
        }
        // File options are always live, whatever the roots are.
        for file in schema.proto_files() {
            marks.mark_options(file.options());
        }
        while let Some(name) = marks.queue.pop_front() {
            marks.visit(&name);
        }
        marks
    }

    /// Retain `name` unless it is rubbish, queueing it for a visit the first
    /// time.
    fn reach(&mut self, name: &str) {
        if self.rules.is_rubbish(name) {
            return;
        }
        if self.retained.insert(name.to_string()) {
            self.queue.push_back(name.to_string());
        }
    }

    fn reach_type(&mut self, ty: &ProtoType) {
        if ty.is_scalar() {
            return;
        }
        if let (Some(key), Some(value)) = (ty.key_type(), ty.value_type()) {
            self.reach_type(key);
            self.reach_type(value);
            return;
        }
        self.reach(ty.as_str());
    }

    /// Would a field of this type survive the sweep? Scalars always do; named
    /// types survive unless rubbish blocks them from ever being retained.
    fn allowed(&self, ty: &ProtoType) -> bool {
        if ty.is_scalar() {
            return true;
        }
        if let (Some(key), Some(value)) = (ty.key_type(), ty.value_type()) {
            return self.allowed(key) && self.allowed(value);
        }
        !self.rules.is_rubbish(ty.as_str())
    }

    fn visit(&mut self, name: &str) {
        let schema = self.schema;
        if let Some(ty) = schema.get_type(name) {
            self.visit_type(ty);
        } else if let Some(service) = schema.get_service(name) {
            self.visit_service(service);
        }
    }

    fn visit_type(&mut self, ty: &Type) {
        match ty {
            Type::Message(message) => {
                self.mark_options(message.options());
                for field in message.declared_fields() {
                    if self.allowed(field.ty()) {
                        self.reach_type(field.ty());
                        self.mark_options(field.options());
                    }
                }
            }
            Type::Enum(enum_type) => {
                self.mark_options(enum_type.options());
                for constant in enum_type.constants() {
                    self.mark_options(constant.options());
                }
            }
            Type::Enclosing(_) => {}
        }
    }

    fn visit_service(&mut self, service: &Service) {
        self.mark_options(service.options());
        for rpc in service.rpcs() {
            if self.allowed(rpc.request_type()) && self.allowed(rpc.response_type()) {
                self.reach_type(rpc.request_type());
                self.reach_type(rpc.response_type());
                self.mark_options(rpc.options());
            }
        }
    }

    /// A linked option on a live declaration marks its extension member and
    /// reaches both the extended type and the extension field's type.
    fn mark_options(&mut self, options: &Options) {
        for linked in options.linked() {
            if self.members.insert(linked.member.clone()) {
                self.reach(linked.member.ty().as_str());
                self.reach_type(&linked.field_type);
            }
        }
    }

    // --------------------------------------------------------------------------
    // Sweep
    // --------------------------------------------------------------------------

    fn sweep(&self) -> Schema {
        let files = self
            .schema
            .proto_files()
            .iter()
            .map(|file| ProtoFile {
                location: file.location().clone(),
                package_name: file.package_name().map(String::from),
                syntax: file.syntax(),
                imports: file.imports().to_vec(),
                public_imports: file.public_imports().to_vec(),
                types: file
                    .types()
                    .iter()
                    .filter_map(|ty| self.sweep_type(ty))
                    .collect(),
                extends: file
                    .extends()
                    .iter()
                    .filter_map(|extend| self.sweep_extend(extend))
                    .collect(),
                services: file
                    .services()
                    .iter()
                    .filter_map(|service| self.sweep_service(service))
                    .collect(),
                options: self.sweep_options(file.options()),
            })
            .collect();
        Schema::new(files)
    }

    fn retained(&self, name: &str) -> bool {
        self.retained.contains(name)
    }

    /// Does a field or rpc of this type survive?
    fn kept(&self, ty: &ProtoType) -> bool {
        if ty.is_scalar() {
            return true;
        }
        if let (Some(key), Some(value)) = (ty.key_type(), ty.value_type()) {
            return self.kept(key) && self.kept(value);
        }
        self.retained(ty.as_str())
    }

    fn sweep_type(&self, ty: &Type) -> Option<Type> {
        match ty {
            Type::Message(message) => {
                let nested_types: Vec<Type> = message
                    .nested_types()
                    .iter()
                    .filter_map(|nested| self.sweep_type(nested))
                    .collect();
                if self.retained(message.name().as_str()) {
                    let declared_fields = message
                        .declared_fields()
                        .iter()
                        .filter(|field| self.kept(field.ty()))
                        .map(|field| self.sweep_field(field))
                        .collect();
                    let extension_fields = message
                        .extension_fields()
                        .iter()
                        .filter(|field| self.extension_kept(message.name(), field))
                        .map(|field| self.sweep_field(field))
                        .collect();
                    Some(Type::Message(MessageType {
                        name: message.name().clone(),
                        location: message.location().clone(),
                        documentation: message.documentation().to_string(),
                        declared_fields,
                        extension_fields,
                        nested_types,
                        options: self.sweep_options(message.options()),
                    }))
                } else if nested_types.is_empty() {
                    None
                } else {
                    Some(Type::Enclosing(EnclosingType {
                        name: message.name().clone(),
                        location: message.location().clone(),
                        nested_types,
                    }))
                }
            }
            Type::Enum(enum_type) => self.retained(enum_type.name().as_str()).then(|| {
                Type::Enum(EnumType {
                    name: enum_type.name().clone(),
                    location: enum_type.location().clone(),
                    documentation: enum_type.documentation().to_string(),
                    constants: enum_type
                        .constants()
                        .iter()
                        .map(|constant| EnumConstant {
                            options: self.sweep_options(constant.options()),
                            ..constant.clone()
                        })
                        .collect(),
                    options: self.sweep_options(enum_type.options()),
                })
            }),
            Type::Enclosing(enclosing) => {
                let nested_types: Vec<Type> = enclosing
                    .nested_types()
                    .iter()
                    .filter_map(|nested| self.sweep_type(nested))
                    .collect();
                if nested_types.is_empty() {
                    None
                } else {
                    Some(Type::Enclosing(EnclosingType {
                        name: enclosing.name().clone(),
                        location: enclosing.location().clone(),
                        nested_types,
                    }))
                }
            }
        }
    }

    fn extension_kept(&self, target: &ProtoType, field: &Field) -> bool {
        let member = ProtoMember::new(target.clone(), field.qualified_name());
        self.members.contains(&member) && self.kept(field.ty())
    }

    fn sweep_field(&self, field: &Field) -> Field {
        Field {
            options: self.sweep_options(field.options()),
            ..field.clone()
        }
    }

    fn sweep_extend(&self, extend: &Extend) -> Option<Extend> {
        let target = extend.ty()?;
        if !self.retained(target.as_str()) {
            return None;
        }
        let fields: Vec<Field> = extend
            .fields()
            .iter()
            .filter(|field| self.extension_kept(target, field))
            .map(|field| self.sweep_field(field))
            .collect();
        if fields.is_empty() {
            return None;
        }
        Some(Extend {
            location: extend.location().clone(),
            documentation: extend.documentation().to_string(),
            name: extend.name().to_string(),
            ty: Some(target.clone()),
            fields,
        })
    }

    fn sweep_service(&self, service: &Service) -> Option<Service> {
        if !self.retained(service.name().as_str()) {
            return None;
        }
        let rpcs = service
            .rpcs()
            .iter()
            .filter(|rpc| self.kept(rpc.request_type()) && self.kept(rpc.response_type()))
            .map(|rpc| Rpc {
                options: self.sweep_options(rpc.options()),
                ..rpc.clone()
            })
            .collect();
        Some(Service {
            name: service.name().clone(),
            location: service.location().clone(),
            documentation: service.documentation().to_string(),
            rpcs,
            options: self.sweep_options(service.options()),
        })
    }

    /// Keep plain options as-is; keep a linked option only when its member
    /// was marked and its extension field's type survived.
    fn sweep_options(&self, options: &Options) -> Options {
        let mut elements = Vec::new();
        let mut linked = Vec::new();
        for (element, link) in options.elements().iter().zip(&options.linked) {
            match link {
                Some(link) => {
                    if self.members.contains(&link.member) && self.kept(&link.field_type) {
                        elements.push(element.clone());
                        linked.push(Some(link.clone()));
                    }
                }
                None => {
                    elements.push(element.clone());
                    linked.push(None);
                }
            }
        }
        Options { elements, linked }
    }
}
