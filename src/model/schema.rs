// ==============================================================================
// Linked Schema
// ==============================================================================
//
// An immutable set of linked files plus derived indices. The indices map a
// fully-qualified name to the *position* of its declaration (file index plus
// nesting path) rather than holding a second copy of the type, so a `Schema`
// is cheap to clone and rebuild. Every `ProtoType` referenced anywhere inside
// a schema resolves through `get_type` -- unresolved references are a linking
// failure and never survive into a returned `Schema`.

use indexmap::IndexMap;
use indexmap::map::Entry;

use crate::model::proto_type::{ProtoMember, ProtoType};
use crate::model::types::{Field, ProtoFile, Service, Type};
use crate::pruner::PruningRules;
use crate::union_find::UnionFind;

/// Where a type's declaration sits: which file, then the index of the
/// declaration at each nesting level.
#[derive(Debug, Clone, PartialEq)]
struct TypePath {
    file: usize,
    path: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
struct ServicePath {
    file: usize,
    index: usize,
}

/// A fully linked, immutable schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    files: Vec<ProtoFile>,
    types: IndexMap<ProtoType, TypePath>,
    services: IndexMap<ProtoType, ServicePath>,
    files_by_path: IndexMap<String, usize>,
}

impl Schema {
    /// Index a set of linked files. The linker guarantees name uniqueness
    /// before this is called; pruning preserves it.
    pub(crate) fn new(files: Vec<ProtoFile>) -> Schema {
        let mut types = IndexMap::new();
        let mut services = IndexMap::new();
        let mut files_by_path = IndexMap::new();
        for (file_index, file) in files.iter().enumerate() {
            files_by_path.insert(file.path().to_string(), file_index);
            for (i, ty) in file.types.iter().enumerate() {
                register_type(ty, file_index, vec![i], &mut types);
            }
            for (i, service) in file.services.iter().enumerate() {
                services.insert(
                    service.name.clone(),
                    ServicePath {
                        file: file_index,
                        index: i,
                    },
                );
            }
        }
        Schema {
            files,
            types,
            services,
            files_by_path,
        }
    }

    /// The linked files, in load order.
    pub fn proto_files(&self) -> &[ProtoFile] {
        &self.files
    }

    /// The file loaded under `path`, if any.
    pub fn proto_file(&self, path: &str) -> Option<&ProtoFile> {
        self.files_by_path.get(path).map(|&i| &self.files[i])
    }

    /// Every type name in the schema, nested before enclosing, in file order.
    pub fn types(&self) -> impl Iterator<Item = &ProtoType> {
        self.types.keys()
    }

    /// Every service in the schema, in file order.
    pub fn services(&self) -> impl Iterator<Item = &Service> {
        self.services
            .values()
            .map(|p| &self.files[p.file].services[p.index])
    }

    /// Look up a type by fully-qualified name.
    pub fn get_type(&self, name: &str) -> Option<&Type> {
        self.types.get(name).map(|path| self.type_at(path))
    }

    /// Look up a service by fully-qualified name.
    pub fn get_service(&self, name: &str) -> Option<&Service> {
        self.services
            .get(name)
            .map(|p| &self.files[p.file].services[p.index])
    }

    /// Look up a field by `(type, member)`. Declared fields match on their
    /// plain name, extension fields on their package-qualified name.
    pub fn get_field(&self, member: &ProtoMember) -> Option<&Field> {
        let message = self.get_type(member.ty().as_str())?.as_message()?;
        message
            .field(member.member())
            .or_else(|| message.extension_field(member.member()))
    }

    /// Compute the subset of this schema reachable from `rules`' roots.
    pub fn prune(&self, rules: &PruningRules) -> Schema {
        crate::pruner::prune(self, rules)
    }

    /// Group declarations whose generated-file identities collide under a
    /// case-insensitive file system: types and services whose lowercased
    /// fully-qualified names are equal. Groups keep declaration order and
    /// only actual collisions (two or more members) are reported.
    pub fn identity_conflicts(&self) -> Vec<Vec<ProtoType>> {
        let names: Vec<ProtoType> = self
            .types
            .keys()
            .chain(self.services.keys())
            .cloned()
            .collect();
        let mut sets = UnionFind::new(names.iter().cloned());
        let mut by_identity: IndexMap<String, ProtoType> = IndexMap::new();
        for name in &names {
            match by_identity.entry(name.as_str().to_lowercase()) {
                Entry::Occupied(first) => {
                    sets.union(first.get(), name);
                }
                Entry::Vacant(slot) => {
                    slot.insert(name.clone());
                }
            }
        }
        sets.groups()
            .into_iter()
            .filter(|group| group.len() > 1)
            .collect()
    }

    fn type_at(&self, path: &TypePath) -> &Type {
        let mut ty = &self.files[path.file].types[path.path[0]];
        for &i in &path.path[1..] {
            ty = &ty.nested_types()[i];
        }
        ty
    }
}

fn register_type(
    ty: &Type,
    file: usize,
    path: Vec<usize>,
    types: &mut IndexMap<ProtoType, TypePath>,
) {
    for (i, nested) in ty.nested_types().iter().enumerate() {
        let mut child = path.clone();
        child.push(i);
        register_type(nested, file, child, types);
    }
    types.insert(ty.name().clone(), TypePath { file, path });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Label;
    use crate::location::Location;
    use crate::model::types::{EnumConstant, EnumType, MessageType, Options};
    use pretty_assertions::assert_eq;

    fn field(name: &str, ty: &str, tag: i32) -> Field {
        Field {
            location: Location::get("test.proto").at(1, 1),
            label: Some(Label::Optional),
            name: name.to_string(),
            qualified_name: name.to_string(),
            written_type: ty.to_string(),
            tag,
            documentation: String::new(),
            options: Options::default(),
            ty: ProtoType::get(ty),
            is_extension: false,
        }
    }

    fn message(name: &str, fields: Vec<Field>, nested: Vec<Type>) -> Type {
        Type::Message(MessageType {
            name: ProtoType::get(name),
            location: Location::get("test.proto").at(1, 1),
            documentation: String::new(),
            declared_fields: fields,
            extension_fields: Vec::new(),
            nested_types: nested,
            options: Options::default(),
        })
    }

    fn enum_type(name: &str, constants: &[(&str, i32)]) -> Type {
        Type::Enum(EnumType {
            name: ProtoType::get(name),
            location: Location::get("test.proto").at(1, 1),
            documentation: String::new(),
            constants: constants
                .iter()
                .map(|(name, tag)| EnumConstant {
                    location: Location::get("test.proto").at(1, 1),
                    name: (*name).to_string(),
                    tag: *tag,
                    documentation: String::new(),
                    options: Options::default(),
                })
                .collect(),
            options: Options::default(),
        })
    }

    fn file(
        path: &str,
        package: Option<&str>,
        types: Vec<Type>,
        services: Vec<Service>,
    ) -> ProtoFile {
        ProtoFile {
            location: Location::get(path),
            package_name: package.map(String::from),
            syntax: None,
            imports: Vec::new(),
            public_imports: Vec::new(),
            types,
            extends: Vec::new(),
            services,
            options: Options::default(),
        }
    }

    fn service(name: &str) -> Service {
        Service {
            name: ProtoType::get(name),
            location: Location::get("test.proto").at(1, 1),
            documentation: String::new(),
            rpcs: Vec::new(),
            options: Options::default(),
        }
    }

    #[test]
    fn indexes_top_level_and_nested_types() {
        let inner = message("squareup.Outer.Inner", vec![], vec![]);
        let outer = message("squareup.Outer", vec![field("i", "int32", 1)], vec![inner]);
        let schema = Schema::new(vec![file(
            "squareup/outer.proto",
            Some("squareup"),
            vec![outer],
            vec![],
        )]);

        assert!(schema.get_type("squareup.Outer").is_some());
        assert!(schema.get_type("squareup.Outer.Inner").is_some());
        assert!(schema.get_type("squareup.Missing").is_none());
        let names: Vec<_> = schema.types().map(|t| t.as_str().to_string()).collect();
        assert_eq!(names, vec!["squareup.Outer.Inner", "squareup.Outer"]);
    }

    #[test]
    fn looks_up_fields_by_member() {
        let outer = message("squareup.Outer", vec![field("radius", "double", 1)], vec![]);
        let schema = Schema::new(vec![file(
            "squareup/outer.proto",
            Some("squareup"),
            vec![outer],
            vec![],
        )]);

        let member = ProtoMember::new(ProtoType::get("squareup.Outer"), "radius");
        let found = schema.get_field(&member).expect("declared field is found");
        assert_eq!(found.name(), "radius");
        assert_eq!(found.tag(), 1);

        let missing = ProtoMember::new(ProtoType::get("squareup.Outer"), "diameter");
        assert!(schema.get_field(&missing).is_none());
    }

    #[test]
    fn looks_up_files_by_path() {
        let schema = Schema::new(vec![
            file("a/one.proto", Some("a"), vec![], vec![]),
            file("b/two.proto", Some("b"), vec![], vec![]),
        ]);
        assert!(schema.proto_file("a/one.proto").is_some());
        assert!(schema.proto_file("c/three.proto").is_none());
        assert_eq!(schema.proto_files().len(), 2);
    }

    #[test]
    fn services_are_indexed_separately_from_types() {
        let schema = Schema::new(vec![file(
            "s.proto",
            Some("squareup"),
            vec![enum_type("squareup.Color", &[("BLUE", 1)])],
            vec![service("squareup.DrawService")],
        )]);
        assert!(schema.get_service("squareup.DrawService").is_some());
        assert!(schema.get_type("squareup.DrawService").is_none());
        assert_eq!(schema.services().count(), 1);
    }

    #[test]
    fn identity_conflicts_group_case_insensitive_collisions() {
        let schema = Schema::new(vec![file(
            "c.proto",
            Some("squareup"),
            vec![
                message("squareup.Color", vec![], vec![]),
                enum_type("squareup.COLOR", &[("RED", 1)]),
                message("squareup.Shape", vec![], vec![]),
                message("squareup.color", vec![], vec![]),
            ],
            vec![],
        )]);

        let conflicts = schema.identity_conflicts();
        assert_eq!(conflicts.len(), 1);
        let group: Vec<_> = conflicts[0]
            .iter()
            .map(|t| t.as_str().to_string())
            .collect();
        assert_eq!(
            group,
            vec!["squareup.Color", "squareup.COLOR", "squareup.color"]
        );
    }

    #[test]
    fn identity_conflicts_cover_services_too() {
        let schema = Schema::new(vec![file(
            "c.proto",
            Some("squareup"),
            vec![message("squareup.Draw", vec![], vec![])],
            vec![service("squareup.DRAW")],
        )]);
        let conflicts = schema.identity_conflicts();
        assert_eq!(conflicts.len(), 1);
        let group: Vec<_> = conflicts[0]
            .iter()
            .map(|t| t.as_str().to_string())
            .collect();
        assert_eq!(group, vec!["squareup.Draw", "squareup.DRAW"]);
    }

    #[test]
    fn no_conflicts_means_no_groups() {
        let schema = Schema::new(vec![file(
            "c.proto",
            Some("squareup"),
            vec![
                message("squareup.Color", vec![], vec![]),
                message("squareup.Shape", vec![], vec![]),
            ],
            vec![],
        )]);
        assert!(schema.identity_conflicts().is_empty());
    }
}
