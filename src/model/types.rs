// ==============================================================================
// Linked Model
// ==============================================================================
//
// The immutable output of linking: every written type name replaced by a
// resolved `ProtoType`, extension fields injected into their target messages,
// and option references linked to the extension members they name. The
// pruner and partitioner construct smaller copies of these values; nothing
// mutates them in place after the linker returns.

use crate::ast::{Label, OptionElement, Syntax};
use crate::location::Location;
use crate::model::proto_type::{ProtoMember, ProtoType};

/// A linked message, enum, or enclosing shell.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Message(MessageType),
    Enum(EnumType),
    /// A type that was pruned away but still has retained nested types. Only
    /// the pruner creates these.
    Enclosing(EnclosingType),
}

impl Type {
    pub fn name(&self) -> &ProtoType {
        match self {
            Type::Message(message) => &message.name,
            Type::Enum(enum_type) => &enum_type.name,
            Type::Enclosing(enclosing) => &enclosing.name,
        }
    }

    pub fn location(&self) -> &Location {
        match self {
            Type::Message(message) => &message.location,
            Type::Enum(enum_type) => &enum_type.location,
            Type::Enclosing(enclosing) => &enclosing.location,
        }
    }

    pub fn documentation(&self) -> &str {
        match self {
            Type::Message(message) => &message.documentation,
            Type::Enum(enum_type) => &enum_type.documentation,
            Type::Enclosing(_) => "",
        }
    }

    pub fn nested_types(&self) -> &[Type] {
        match self {
            Type::Message(message) => &message.nested_types,
            Type::Enum(_) => &[],
            Type::Enclosing(enclosing) => &enclosing.nested_types,
        }
    }

    pub fn as_message(&self) -> Option<&MessageType> {
        match self {
            Type::Message(message) => Some(message),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumType> {
        match self {
            Type::Enum(enum_type) => Some(enum_type),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageType {
    pub(crate) name: ProtoType,
    pub(crate) location: Location,
    pub(crate) documentation: String,
    pub(crate) declared_fields: Vec<Field>,
    /// Fields injected by `extend` declarations targeting this message, in
    /// link order. Looked up by qualified name.
    pub(crate) extension_fields: Vec<Field>,
    pub(crate) nested_types: Vec<Type>,
    pub(crate) options: Options,
}

impl MessageType {
    pub fn name(&self) -> &ProtoType {
        &self.name
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn documentation(&self) -> &str {
        &self.documentation
    }

    /// Declared fields followed by injected extension fields.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.declared_fields.iter().chain(&self.extension_fields)
    }

    pub fn declared_fields(&self) -> &[Field] {
        &self.declared_fields
    }

    pub fn extension_fields(&self) -> &[Field] {
        &self.extension_fields
    }

    /// A declared field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.declared_fields.iter().find(|f| f.name == name)
    }

    /// An extension field by package-qualified name.
    pub fn extension_field(&self, qualified_name: &str) -> Option<&Field> {
        self.extension_fields
            .iter()
            .find(|f| f.qualified_name == qualified_name)
    }

    pub fn nested_types(&self) -> &[Type] {
        &self.nested_types
    }

    pub fn options(&self) -> &Options {
        &self.options
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    pub(crate) name: ProtoType,
    pub(crate) location: Location,
    pub(crate) documentation: String,
    pub(crate) constants: Vec<EnumConstant>,
    pub(crate) options: Options,
}

impl EnumType {
    pub fn name(&self) -> &ProtoType {
        &self.name
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn documentation(&self) -> &str {
        &self.documentation
    }

    pub fn constants(&self) -> &[EnumConstant] {
        &self.constants
    }

    pub fn constant(&self, name: &str) -> Option<&EnumConstant> {
        self.constants.iter().find(|c| c.name == name)
    }

    pub fn options(&self) -> &Options {
        &self.options
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumConstant {
    pub(crate) location: Location,
    pub(crate) name: String,
    pub(crate) tag: i32,
    pub(crate) documentation: String,
    pub(crate) options: Options,
}

impl EnumConstant {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> i32 {
        self.tag
    }

    pub fn options(&self) -> &Options {
        &self.options
    }
}

/// A pruned-away parent kept only to carry retained nested types.
#[derive(Debug, Clone, PartialEq)]
pub struct EnclosingType {
    pub(crate) name: ProtoType,
    pub(crate) location: Location,
    pub(crate) nested_types: Vec<Type>,
}

impl EnclosingType {
    pub fn name(&self) -> &ProtoType {
        &self.name
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn nested_types(&self) -> &[Type] {
        &self.nested_types
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub(crate) location: Location,
    pub(crate) label: Option<Label>,
    pub(crate) name: String,
    /// Package-qualified name for extension fields, `name` for the rest.
    pub(crate) qualified_name: String,
    /// The type exactly as the source wrote it.
    pub(crate) written_type: String,
    pub(crate) tag: i32,
    pub(crate) documentation: String,
    pub(crate) options: Options,
    /// The resolved type.
    pub(crate) ty: ProtoType,
    pub(crate) is_extension: bool,
}

impl Field {
    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn label(&self) -> Option<Label> {
        self.label
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    pub fn written_type(&self) -> &str {
        &self.written_type
    }

    pub fn tag(&self) -> i32 {
        self.tag
    }

    pub fn documentation(&self) -> &str {
        &self.documentation
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// The resolved type: a scalar, a named type, or a map.
    pub fn ty(&self) -> &ProtoType {
        &self.ty
    }

    pub fn is_extension(&self) -> bool {
        self.is_extension
    }
}

/// A linked `extend` declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Extend {
    pub(crate) location: Location,
    pub(crate) documentation: String,
    /// The target as written.
    pub(crate) name: String,
    /// The resolved target. `None` only for files outside the validated set
    /// whose target could not be resolved.
    pub(crate) ty: Option<ProtoType>,
    pub(crate) fields: Vec<Field>,
}

impl Extend {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> Option<&ProtoType> {
        self.ty.as_ref()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn documentation(&self) -> &str {
        &self.documentation
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Service {
    pub(crate) name: ProtoType,
    pub(crate) location: Location,
    pub(crate) documentation: String,
    pub(crate) rpcs: Vec<Rpc>,
    pub(crate) options: Options,
}

impl Service {
    pub fn name(&self) -> &ProtoType {
        &self.name
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn documentation(&self) -> &str {
        &self.documentation
    }

    pub fn rpcs(&self) -> &[Rpc] {
        &self.rpcs
    }

    pub fn rpc(&self, name: &str) -> Option<&Rpc> {
        self.rpcs.iter().find(|r| r.name == name)
    }

    pub fn options(&self) -> &Options {
        &self.options
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rpc {
    pub(crate) location: Location,
    pub(crate) name: String,
    pub(crate) documentation: String,
    pub(crate) request_type: ProtoType,
    pub(crate) response_type: ProtoType,
    pub(crate) options: Options,
}

impl Rpc {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn request_type(&self) -> &ProtoType {
        &self.request_type
    }

    pub fn response_type(&self) -> &ProtoType {
        &self.response_type
    }

    pub fn options(&self) -> &Options {
        &self.options
    }
}

/// The options applied to one declaration.
///
/// `linked` runs parallel to `elements`: entries whose written name begins
/// with a parenthesized extension reference link to the extension member they
/// resolved to, plain built-in names stay `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    pub(crate) elements: Vec<OptionElement>,
    pub(crate) linked: Vec<Option<LinkedOption>>,
}

impl Options {
    /// Options with no linked extension entries (yet).
    pub(crate) fn unlinked(elements: Vec<OptionElement>) -> Options {
        let linked = vec![None; elements.len()];
        Options { elements, linked }
    }

    pub fn elements(&self) -> &[OptionElement] {
        &self.elements
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// The linked extension entries, in element order.
    pub fn linked(&self) -> impl Iterator<Item = &LinkedOption> {
        self.linked.iter().flatten()
    }

    /// The value of the option written exactly as `name`, if present.
    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.elements
            .iter()
            .find(|o| o.name == name)
            .map(|o| &o.value)
    }
}

/// A linked option's resolution: which extension member the parenthesized
/// reference named, and that extension field's declared type.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedOption {
    pub member: ProtoMember,
    pub field_type: ProtoType,
}

/// One linked file.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtoFile {
    pub(crate) location: Location,
    pub(crate) package_name: Option<String>,
    pub(crate) syntax: Option<Syntax>,
    pub(crate) imports: Vec<String>,
    pub(crate) public_imports: Vec<String>,
    pub(crate) types: Vec<Type>,
    pub(crate) extends: Vec<Extend>,
    pub(crate) services: Vec<Service>,
    pub(crate) options: Options,
}

impl ProtoFile {
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// The root-relative path, which is also the file's import string.
    pub fn path(&self) -> &str {
        &self.location.path
    }

    pub fn package_name(&self) -> Option<&str> {
        self.package_name.as_deref()
    }

    pub fn syntax(&self) -> Option<Syntax> {
        self.syntax
    }

    pub fn imports(&self) -> &[String] {
        &self.imports
    }

    pub fn public_imports(&self) -> &[String] {
        &self.public_imports
    }

    pub fn types(&self) -> &[Type] {
        &self.types
    }

    pub fn extends(&self) -> &[Extend] {
        &self.extends
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    pub fn options(&self) -> &Options {
        &self.options
    }
}
