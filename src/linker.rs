// ==============================================================================
// Linker
// ==============================================================================
//
// Turns parsed file elements into a linked `Schema`. Linking runs in passes:
// a symbol table of every declared type and service is built first (a
// fully-qualified name declared twice ends the link right there), then every
// written type reference is resolved against its scope, then option
// references are linked to the extension fields they name, and finally
// extension fields are injected into the messages they extend.
//
// A written name resolves against, in order: types nested in the enclosing
// messages (innermost first), the file's own package, the packages visible
// through the file's imports (direct imports plus the closure of their public
// imports), and lastly the name taken as already fully qualified. A leading
// dot skips straight to the fully-qualified reading.
//
// Validation is non-transitive: files loaded only to satisfy somebody else's
// imports keep their symbols but are not held to option and member
// correctness. Resolution failures are collected, not thrown, so one link
// reports every broken reference at once.

use std::collections::VecDeque;

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::ast::{
    EnumConstantElement, ExtendElement, FieldElement, ProtoFileElement, RpcElement,
    ServiceElement, TypeElement,
};
use crate::error::{ErrorCollector, SchemaErrors};
use crate::location::Location;
use crate::model::proto_type::{ProtoMember, ProtoType};
use crate::model::schema::Schema;
use crate::model::types::{
    EnumConstant, EnumType, Extend, Field, LinkedOption, MessageType, Options, ProtoFile, Rpc,
    Service, Type,
};
use crate::suggest;

const FILE_OPTIONS: &str = "google.protobuf.FileOptions";
const MESSAGE_OPTIONS: &str = "google.protobuf.MessageOptions";
const FIELD_OPTIONS: &str = "google.protobuf.FieldOptions";
const ENUM_OPTIONS: &str = "google.protobuf.EnumOptions";
const ENUM_VALUE_OPTIONS: &str = "google.protobuf.EnumValueOptions";
const SERVICE_OPTIONS: &str = "google.protobuf.ServiceOptions";
const METHOD_OPTIONS: &str = "google.protobuf.MethodOptions";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SymbolKind {
    Message,
    Enum,
}

struct Declared {
    kind: SymbolKind,
    location: Location,
}

/// What a file can see: its own package and the packages reachable through
/// its imports.
struct FileScope {
    package: Option<String>,
    /// Packages of the directly imported files plus the closure of their
    /// public imports, in import order.
    visible_packages: Vec<String>,
    /// Whether this file is held to full validation: it is a source file or
    /// directly imported by one.
    validated: bool,
}

/// One resolution context: the enclosing message chain plus the file scope.
struct Scope<'a> {
    /// Fully-qualified enclosing message names, outermost first.
    enclosing: &'a [String],
    file: &'a FileScope,
}

/// Links parsed files into a [`Schema`].
pub struct Linker {
    types: IndexMap<String, Declared>,
    services: IndexMap<String, Location>,
    /// Extension namespace (the extended type) to the qualified extension
    /// field names declared for it, with each field's type.
    extensions: IndexMap<String, IndexMap<String, ProtoType>>,
    /// Message name to its declared fields' types, for walking option paths.
    field_types: IndexMap<String, IndexMap<String, ProtoType>>,
    errors: ErrorCollector,
}

impl Linker {
    /// Link parsed files into a schema. `source_files` are the files being
    /// compiled; `imported_files` were loaded through imports and are exempt
    /// from option and member validation unless directly imported.
    pub fn link(
        source_files: Vec<ProtoFileElement>,
        imported_files: Vec<ProtoFileElement>,
    ) -> Result<Schema, SchemaErrors> {
        let source_count = source_files.len();
        let mut elements = source_files;
        elements.extend(imported_files);
        let scopes = file_scopes(&elements, source_count);

        let mut linker = Linker {
            types: IndexMap::new(),
            services: IndexMap::new(),
            extensions: IndexMap::new(),
            field_types: IndexMap::new(),
            errors: ErrorCollector::new(),
        };
        linker.register(&elements)?;
        linker.check_package_cycles(&elements);

        let mut files: Vec<ProtoFile> = Vec::with_capacity(elements.len());
        for (element, scope) in elements.iter().zip(&scopes) {
            files.push(linker.file(element, scope));
        }
        linker.index_members(&files);
        for (file, scope) in files.iter_mut().zip(&scopes) {
            linker.link_file_options(file, scope);
        }
        inject_extension_fields(&mut files);

        debug!(
            files = files.len(),
            types = linker.types.len(),
            "linked schema"
        );
        linker.errors.into_result()?;
        Ok(Schema::new(files))
    }

    // --------------------------------------------------------------------------
    // Symbol registration
    // --------------------------------------------------------------------------

    fn register(&mut self, elements: &[ProtoFileElement]) -> Result<(), SchemaErrors> {
        for element in elements {
            let package = element.package_name.as_deref();
            for ty in &element.types {
                self.register_type(ty, package)?;
            }
            for service in &element.services {
                let name = qualified(package, &service.name);
                self.check_collision(&name, &service.location)?;
                self.services.insert(name, service.location.clone());
            }
        }
        Ok(())
    }

    fn register_type(
        &mut self,
        element: &TypeElement,
        enclosing: Option<&str>,
    ) -> Result<(), SchemaErrors> {
        let name = qualified(enclosing, element.name());
        self.check_collision(&name, element.location())?;
        let kind = match element {
            TypeElement::Message(_) => SymbolKind::Message,
            TypeElement::Enum(_) => SymbolKind::Enum,
        };
        self.types.insert(
            name.clone(),
            Declared {
                kind,
                location: element.location().clone(),
            },
        );
        if let TypeElement::Message(message) = element {
            for nested in &message.nested_types {
                self.register_type(nested, Some(&name))?;
            }
        }
        Ok(())
    }

    fn check_collision(&self, name: &str, location: &Location) -> Result<(), SchemaErrors> {
        let previous = self
            .types
            .get(name)
            .map(|declared| &declared.location)
            .or_else(|| self.services.get(name));
        if let Some(previous) = previous {
            let mut collector = ErrorCollector::new();
            collector.error(
                format!("multiple declarations of {name}:\n  {previous}\n  {location}"),
                location,
            );
            collector.into_result()?;
        }
        Ok(())
    }

    // --------------------------------------------------------------------------
    // Model building and reference resolution
    // --------------------------------------------------------------------------

    fn file(&mut self, element: &ProtoFileElement, scope: &FileScope) -> ProtoFile {
        let validated = scope.validated;
        let mut enclosing = Vec::new();
        let mut types = Vec::with_capacity(element.types.len());
        for ty in &element.types {
            types.push(self.build_type(ty, &mut enclosing, scope, validated));
        }
        let mut extends = Vec::with_capacity(element.extends.len());
        for extend in &element.extends {
            extends.push(self.build_extend(extend, scope, validated));
        }
        let mut services = Vec::with_capacity(element.services.len());
        for service in &element.services {
            services.push(self.build_service(service, scope, validated));
        }
        ProtoFile {
            location: element.location.clone(),
            package_name: element.package_name.clone(),
            syntax: element.syntax,
            imports: element.imports.clone(),
            public_imports: element.public_imports.clone(),
            types,
            extends,
            services,
            options: Options::unlinked(element.options.clone()),
        }
    }

    fn build_type(
        &mut self,
        element: &TypeElement,
        enclosing: &mut Vec<String>,
        scope: &FileScope,
        validated: bool,
    ) -> Type {
        let parent = enclosing.last().map(String::as_str).or(scope.package.as_deref());
        let name = qualified(parent, element.name());
        match element {
            TypeElement::Message(message) => {
                enclosing.push(name.clone());
                let mut declared_fields = Vec::with_capacity(message.fields.len());
                for field in &message.fields {
                    declared_fields.push(self.build_field(field, enclosing, scope, validated, false));
                }
                self.check_tags(&declared_fields, &message.location, validated);
                let mut nested_types = Vec::with_capacity(message.nested_types.len());
                for nested in &message.nested_types {
                    nested_types.push(self.build_type(nested, enclosing, scope, validated));
                }
                enclosing.pop();
                Type::Message(MessageType {
                    name: ProtoType::get(&name),
                    location: message.location.clone(),
                    documentation: message.documentation.clone(),
                    declared_fields,
                    extension_fields: Vec::new(),
                    nested_types,
                    options: Options::unlinked(message.options.clone()),
                })
            }
            TypeElement::Enum(enum_element) => Type::Enum(EnumType {
                name: ProtoType::get(&name),
                location: enum_element.location.clone(),
                documentation: enum_element.documentation.clone(),
                constants: enum_element.constants.iter().map(constant).collect(),
                options: Options::unlinked(enum_element.options.clone()),
            }),
        }
    }

    fn build_field(
        &mut self,
        element: &FieldElement,
        enclosing: &[String],
        scope: &FileScope,
        validated: bool,
        is_extension: bool,
    ) -> Field {
        if validated && element.tag < 1 {
            self.errors.error(
                format!(
                    "tag is out of range: {}\n  for field {} ({})",
                    element.tag, element.name, element.location
                ),
                &element.location,
            );
        }
        let context = format!("for field {}", element.name);
        let ty = self.resolve_type(
            &element.type_name,
            &Scope { enclosing, file: scope },
            &context,
            &element.location,
        );
        let qualified_name = if is_extension {
            qualified(scope.package.as_deref(), &element.name)
        } else {
            element.name.clone()
        };
        Field {
            location: element.location.clone(),
            label: element.label,
            name: element.name.clone(),
            qualified_name,
            written_type: element.type_name.clone(),
            tag: element.tag,
            documentation: element.documentation.clone(),
            options: Options::unlinked(element.options.clone()),
            ty,
            is_extension,
        }
    }

    fn build_extend(
        &mut self,
        element: &ExtendElement,
        scope: &FileScope,
        validated: bool,
    ) -> Extend {
        let resolution_scope = Scope {
            enclosing: &[],
            file: scope,
        };
        let context = format!("for extend {}", element.name);
        let ty = match resolve_name(&self.types, &element.name, &resolution_scope) {
            Some(name) => {
                let resolved = ProtoType::get(&name);
                self.expect_message(&resolved, &context, &element.location, validated);
                Some(resolved)
            }
            None => {
                // An unresolved extension target only matters in files held
                // to full validation.
                if validated {
                    self.report_unresolved(&element.name, &context, &element.location);
                }
                None
            }
        };
        let mut fields = Vec::with_capacity(element.fields.len());
        for field in &element.fields {
            fields.push(self.build_field(field, &[], scope, validated, true));
        }
        Extend {
            location: element.location.clone(),
            documentation: element.documentation.clone(),
            name: element.name.clone(),
            ty,
            fields,
        }
    }

    fn build_service(
        &mut self,
        element: &ServiceElement,
        scope: &FileScope,
        validated: bool,
    ) -> Service {
        let name = qualified(scope.package.as_deref(), &element.name);
        let mut rpcs = Vec::with_capacity(element.rpcs.len());
        for rpc in &element.rpcs {
            rpcs.push(self.build_rpc(rpc, scope, validated));
        }
        Service {
            name: ProtoType::get(&name),
            location: element.location.clone(),
            documentation: element.documentation.clone(),
            rpcs,
            options: Options::unlinked(element.options.clone()),
        }
    }

    fn build_rpc(&mut self, element: &RpcElement, scope: &FileScope, validated: bool) -> Rpc {
        let resolution_scope = Scope {
            enclosing: &[],
            file: scope,
        };
        let context = format!("for rpc {}", element.name);
        let request_type = self.resolve_type(
            &element.request_type,
            &resolution_scope,
            &context,
            &element.location,
        );
        self.expect_message(&request_type, &context, &element.location, validated);
        let response_type = self.resolve_type(
            &element.response_type,
            &resolution_scope,
            &context,
            &element.location,
        );
        self.expect_message(&response_type, &context, &element.location, validated);
        Rpc {
            location: element.location.clone(),
            name: element.name.clone(),
            documentation: element.documentation.clone(),
            request_type,
            response_type,
            options: Options::unlinked(element.options.clone()),
        }
    }

    /// Resolve a written type. Scalars and maps short-circuit; map key and
    /// value types resolve individually.
    fn resolve_type(
        &mut self,
        written: &str,
        scope: &Scope<'_>,
        context: &str,
        location: &Location,
    ) -> ProtoType {
        let parsed = ProtoType::get(written);
        if parsed.is_scalar() {
            return parsed;
        }
        if let (Some(key), Some(value)) = (parsed.key_type(), parsed.value_type()) {
            let key = self.resolve_component(key, scope, context, location);
            let value = self.resolve_component(value, scope, context, location);
            return ProtoType::map_of(key, value);
        }
        self.resolve_or_report(written, scope, context, location)
    }

    fn resolve_component(
        &mut self,
        component: &ProtoType,
        scope: &Scope<'_>,
        context: &str,
        location: &Location,
    ) -> ProtoType {
        if component.is_scalar() {
            return component.clone();
        }
        self.resolve_or_report(component.as_str(), scope, context, location)
    }

    fn resolve_or_report(
        &mut self,
        written: &str,
        scope: &Scope<'_>,
        context: &str,
        location: &Location,
    ) -> ProtoType {
        if let Some(name) = resolve_name(&self.types, written, scope) {
            return ProtoType::get(&name);
        }
        self.report_unresolved(written, context, location);
        ProtoType::get(written)
    }

    fn report_unresolved(&mut self, written: &str, context: &str, location: &Location) {
        let mut message = format!("unable to resolve {written}");
        if let Some(suggestion) = suggest::closest(written, self.types.keys().map(String::as_str)) {
            message.push_str(&format!(" (did you mean {suggestion}?)"));
        }
        message.push_str(&format!("\n  {context} ({location})"));
        self.errors.error(message, location);
    }

    /// Require a resolved type to be a message. Unresolved names were already
    /// reported, so only known non-messages are flagged here.
    fn expect_message(
        &mut self,
        ty: &ProtoType,
        context: &str,
        location: &Location,
        validated: bool,
    ) {
        if !validated {
            return;
        }
        let is_message = if ty.is_scalar() || ty.is_map() {
            false
        } else {
            match self.types.get(ty.as_str()) {
                Some(declared) => declared.kind == SymbolKind::Message,
                None => return,
            }
        };
        if !is_message {
            self.errors.error(
                format!(
                    "expected a message but was {}\n  {context} ({location})",
                    ty.as_str()
                ),
                location,
            );
        }
    }

    fn check_tags(&mut self, fields: &[Field], location: &Location, validated: bool) {
        if !validated {
            return;
        }
        let mut by_tag: IndexMap<i32, Vec<&Field>> = IndexMap::new();
        for field in fields {
            by_tag.entry(field.tag).or_default().push(field);
        }
        for (tag, shared) in by_tag {
            if shared.len() < 2 {
                continue;
            }
            let mut message = format!("multiple fields share tag {tag}:");
            for (i, field) in shared.iter().enumerate() {
                message.push_str(&format!("\n  {}. {} ({})", i + 1, field.name, field.location));
            }
            self.errors.error(message, location);
        }
    }

    // --------------------------------------------------------------------------
    // Option linking
    // --------------------------------------------------------------------------

    /// Index every message's declared fields and every resolved extension,
    /// for option references to resolve against.
    fn index_members(&mut self, files: &[ProtoFile]) {
        for file in files {
            for ty in &file.types {
                self.index_type_members(ty);
            }
        }
        for file in files {
            for extend in &file.extends {
                let Some(target) = &extend.ty else { continue };
                let is_message = self
                    .types
                    .get(target.as_str())
                    .is_some_and(|declared| declared.kind == SymbolKind::Message);
                if !is_message {
                    continue;
                }
                let namespace = self.extensions.entry(target.as_str().to_string()).or_default();
                for field in &extend.fields {
                    namespace.insert(field.qualified_name.clone(), field.ty.clone());
                }
            }
        }
    }

    fn index_type_members(&mut self, ty: &Type) {
        if let Type::Message(message) = ty {
            let fields = message
                .declared_fields
                .iter()
                .map(|field| (field.name.clone(), field.ty.clone()))
                .collect();
            self.field_types.insert(message.name.as_str().to_string(), fields);
            for nested in &message.nested_types {
                self.index_type_members(nested);
            }
        }
    }

    fn link_file_options(&mut self, file: &mut ProtoFile, scope: &FileScope) {
        let validated = scope.validated;
        self.link_options(&mut file.options, FILE_OPTIONS, scope, validated);
        for ty in &mut file.types {
            self.link_type_options(ty, scope, validated);
        }
        for extend in &mut file.extends {
            for field in &mut extend.fields {
                self.link_options(&mut field.options, FIELD_OPTIONS, scope, validated);
            }
        }
        for service in &mut file.services {
            self.link_options(&mut service.options, SERVICE_OPTIONS, scope, validated);
            for rpc in &mut service.rpcs {
                self.link_options(&mut rpc.options, METHOD_OPTIONS, scope, validated);
            }
        }
    }

    fn link_type_options(&mut self, ty: &mut Type, scope: &FileScope, validated: bool) {
        match ty {
            Type::Message(message) => {
                self.link_options(&mut message.options, MESSAGE_OPTIONS, scope, validated);
                for field in &mut message.declared_fields {
                    self.link_options(&mut field.options, FIELD_OPTIONS, scope, validated);
                }
                for nested in &mut message.nested_types {
                    self.link_type_options(nested, scope, validated);
                }
            }
            Type::Enum(enum_type) => {
                self.link_options(&mut enum_type.options, ENUM_OPTIONS, scope, validated);
                for constant in &mut enum_type.constants {
                    self.link_options(&mut constant.options, ENUM_VALUE_OPTIONS, scope, validated);
                }
            }
            Type::Enclosing(_) => {}
        }
    }

    fn link_options(
        &mut self,
        options: &mut Options,
        namespace: &str,
        scope: &FileScope,
        validated: bool,
    ) {
        for i in 0..options.elements.len() {
            if !options.elements[i].name.starts_with('(') {
                continue;
            }
            let name = options.elements[i].name.clone();
            let location = options.elements[i].location.clone();
            options.linked[i] = self.link_option(&name, namespace, scope, validated, &location);
        }
    }

    /// Link one parenthesized option reference like `(a.b).c.d`: `a.b` names
    /// an extension field of `namespace`, and each later segment a field of
    /// the type before it.
    fn link_option(
        &mut self,
        written: &str,
        namespace: &str,
        scope: &FileScope,
        validated: bool,
        location: &Location,
    ) -> Option<LinkedOption> {
        let (reference, rest) = match written[1..].split_once(')') {
            Some((reference, rest)) => (reference, rest),
            None => (&written[1..], ""),
        };
        let resolution_scope = Scope {
            enclosing: &[],
            file: scope,
        };
        let resolved = self.extensions.get(namespace).and_then(|table| {
            let name = resolve_name(table, reference, &resolution_scope)?;
            let field_type = table.get(&name)?.clone();
            Some((name, field_type))
        });
        let Some((qualified_name, field_type)) = resolved else {
            if validated {
                let mut message = format!("unable to resolve option {reference}");
                let candidates = self
                    .extensions
                    .get(namespace)
                    .into_iter()
                    .flat_map(|table| table.keys().map(String::as_str));
                if let Some(suggestion) = suggest::closest(reference, candidates) {
                    message.push_str(&format!(" (did you mean {suggestion}?)"));
                }
                message.push_str(&format!("\n  for option {written} ({location})"));
                self.errors.error(message, location);
            }
            return None;
        };

        let mut current = field_type.clone();
        for segment in rest.split('.').filter(|s| !s.is_empty()) {
            let next = self
                .field_types
                .get(current.as_str())
                .and_then(|fields| fields.get(segment))
                .cloned();
            match next {
                Some(ty) => current = ty,
                None => {
                    if validated {
                        self.errors.error(
                            format!(
                                "unable to resolve option field {segment} on {}\n  for option {written} ({location})",
                                current.as_str()
                            ),
                            location,
                        );
                    }
                    return None;
                }
            }
        }
        Some(LinkedOption {
            member: ProtoMember::new(ProtoType::get(namespace), qualified_name),
            field_type,
        })
    }

    // --------------------------------------------------------------------------
    // Package cycles
    // --------------------------------------------------------------------------

    /// Detect cycles in the package graph, where an edge records every file
    /// and import statement that produced it. The first cycle found is
    /// reported in full.
    fn check_package_cycles(&mut self, elements: &[ProtoFileElement]) {
        // from-package -> to-package -> importing file -> import statements
        type Edges<'a> = IndexMap<&'a str, IndexMap<&'a str, IndexMap<&'a str, Vec<&'a str>>>>;

        let package_of: IndexMap<&str, &str> = elements
            .iter()
            .filter_map(|e| e.package_name.as_deref().map(|p| (e.location.path.as_str(), p)))
            .collect();
        let mut packages: IndexSet<&str> = IndexSet::new();
        let mut edges: Edges<'_> = IndexMap::new();
        for element in elements {
            let Some(from) = element.package_name.as_deref() else {
                continue;
            };
            packages.insert(from);
            for import in element.imports.iter().chain(&element.public_imports) {
                let Some(&to) = package_of.get(import.as_str()) else {
                    continue;
                };
                if to == from {
                    continue;
                }
                packages.insert(to);
                edges
                    .entry(from)
                    .or_default()
                    .entry(to)
                    .or_default()
                    .entry(element.location.path.as_str())
                    .or_default()
                    .push(import);
            }
        }

        #[derive(Clone, Copy, PartialEq)]
        enum State {
            New,
            Active,
            Done,
        }

        fn visit<'a>(
            node: &'a str,
            edges: &Edges<'a>,
            states: &mut IndexMap<&'a str, State>,
            stack: &mut Vec<&'a str>,
        ) -> Option<Vec<&'a str>> {
            states.insert(node, State::Active);
            stack.push(node);
            if let Some(neighbors) = edges.get(node) {
                for &next in neighbors.keys() {
                    match states.get(next).copied().unwrap_or(State::New) {
                        State::Active => {
                            let start = stack
                                .iter()
                                .position(|&p| p == next)
                                .expect("an active vertex is on the stack");
                            return Some(stack[start..].to_vec());
                        }
                        State::New => {
                            if let Some(cycle) = visit(next, edges, states, stack) {
                                return Some(cycle);
                            }
                        }
                        State::Done => {}
                    }
                }
            }
            stack.pop();
            states.insert(node, State::Done);
            None
        }

        let mut states: IndexMap<&str, State> =
            packages.iter().map(|&p| (p, State::New)).collect();
        let mut stack: Vec<&str> = Vec::new();
        let mut cycle = None;
        for &package in &packages {
            if states.get(package) == Some(&State::New) {
                cycle = visit(package, &edges, &mut states, &mut stack);
                if cycle.is_some() {
                    break;
                }
            }
        }
        let Some(cycle) = cycle else { return };

        let mut message = String::from("packages form a cycle:");
        for (i, &from) in cycle.iter().enumerate() {
            let to = cycle[(i + 1) % cycle.len()];
            message.push_str(&format!("\n  {from} imports {to}"));
            if let Some(files) = edges.get(from).and_then(|m| m.get(to)) {
                for (file, imports) in files {
                    message.push_str(&format!("\n    {file}:"));
                    for import in imports {
                        message.push_str(&format!("\n      import \"{import}\";"));
                    }
                }
            }
        }
        let location = edges
            .get(cycle[0])
            .and_then(|m| m.get(cycle[1 % cycle.len()]))
            .and_then(|files| files.keys().next())
            .map(|&file| Location::get(file))
            .unwrap_or_default();
        self.errors.error(message, &location);
    }
}

fn constant(element: &EnumConstantElement) -> EnumConstant {
    EnumConstant {
        location: element.location.clone(),
        name: element.name.clone(),
        tag: element.tag,
        documentation: element.documentation.clone(),
        options: Options::unlinked(element.options.clone()),
    }
}

fn qualified(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}.{name}"),
        None => name.to_string(),
    }
}

/// Resolve a written name against a table of fully-qualified names, walking
/// the scope ladder: enclosing messages innermost first, then the package,
/// then visible packages, then the name as written.
fn resolve_name<V>(
    table: &IndexMap<String, V>,
    written: &str,
    scope: &Scope<'_>,
) -> Option<String> {
    if let Some(rooted) = written.strip_prefix('.') {
        return table.contains_key(rooted).then(|| rooted.to_string());
    }
    for prefix in scope.enclosing.iter().rev() {
        let candidate = format!("{prefix}.{written}");
        if table.contains_key(&candidate) {
            return Some(candidate);
        }
    }
    if let Some(package) = &scope.file.package {
        let candidate = format!("{package}.{written}");
        if table.contains_key(&candidate) {
            return Some(candidate);
        }
    }
    for package in &scope.file.visible_packages {
        let candidate = format!("{package}.{written}");
        if table.contains_key(&candidate) {
            return Some(candidate);
        }
    }
    table.contains_key(written).then(|| written.to_string())
}

/// Per-file scope: the package, the packages visible through imports, and
/// whether the file is in the validated set (source files and their direct
/// imports).
fn file_scopes(elements: &[ProtoFileElement], source_count: usize) -> Vec<FileScope> {
    let by_path: IndexMap<&str, &ProtoFileElement> = elements
        .iter()
        .map(|e| (e.location.path.as_str(), e))
        .collect();
    let mut validated: IndexSet<&str> = IndexSet::new();
    for element in &elements[..source_count] {
        validated.insert(element.location.path.as_str());
        for import in element.imports.iter().chain(&element.public_imports) {
            validated.insert(import);
        }
    }
    elements
        .iter()
        .map(|element| {
            let mut visible_packages: Vec<String> = Vec::new();
            let mut seen: IndexSet<&str> = IndexSet::new();
            let mut queue: VecDeque<&str> = element
                .imports
                .iter()
                .chain(&element.public_imports)
                .map(String::as_str)
                .collect();
            while let Some(path) = queue.pop_front() {
                if !seen.insert(path) {
                    continue;
                }
                let Some(imported) = by_path.get(path) else {
                    continue;
                };
                if let Some(package) = &imported.package_name
                    && !visible_packages.contains(package)
                {
                    visible_packages.push(package.clone());
                }
                for public in &imported.public_imports {
                    queue.push_back(public);
                }
            }
            FileScope {
                package: element.package_name.clone(),
                visible_packages,
                validated: validated.contains(element.location.path.as_str()),
            }
        })
        .collect()
}

/// Copy every resolved extension's fields into the message it extends.
fn inject_extension_fields(files: &mut [ProtoFile]) {
    let mut injections: IndexMap<String, Vec<Field>> = IndexMap::new();
    for file in files.iter() {
        for extend in &file.extends {
            let Some(target) = &extend.ty else { continue };
            injections
                .entry(target.as_str().to_string())
                .or_default()
                .extend(extend.fields.iter().cloned());
        }
    }
    for file in files.iter_mut() {
        for ty in &mut file.types {
            inject(ty, &mut injections);
        }
    }
}

fn inject(ty: &mut Type, injections: &mut IndexMap<String, Vec<Field>>) {
    if let Type::Message(message) = ty {
        if let Some(fields) = injections.shift_remove(message.name.as_str()) {
            message.extension_fields.extend(fields);
        }
        for nested in &mut message.nested_types {
            inject(nested, injections);
        }
    }
}
