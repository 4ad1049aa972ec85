// ==============================================================================
// Parsed File AST
// ==============================================================================
//
// The text-level parser lives outside this crate; callers implement `Parser`
// and hand the loader one parsed `ProtoFileElement` per file. The element
// types below are plain data: the linker only ever reads them (plus the
// `Location` each one came from) and produces the linked model in
// `model::types` from them. Option values ride along as `serde_json::Value`
// because this crate links option *names* structurally but never interprets
// the values.

use serde_json::Value;

use crate::location::Location;

/// Turns one file's source text into its AST.
///
/// Implementations are supplied by the caller; the loader hands them decoded
/// text (byte-order marks already stripped) and the file's location for
/// diagnostics. Errors are collected by the loader alongside missing and
/// ambiguous imports rather than aborting the compilation.
pub trait Parser {
    fn parse(&self, location: &Location, source: &str) -> miette::Result<ProtoFileElement>;
}

/// The declared syntax level of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    Proto2,
    Proto3,
}

/// A field's presence label. Proto2-only; proto3 fields carry `None` unless
/// repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Required,
    Optional,
    Repeated,
}

/// One parsed schema file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProtoFileElement {
    pub location: Location,
    pub package_name: Option<String>,
    pub syntax: Option<Syntax>,
    /// Regular import strings, in declaration order.
    pub imports: Vec<String>,
    /// Public import strings, in declaration order. A public import is
    /// re-exported to files that import this one.
    pub public_imports: Vec<String>,
    pub types: Vec<TypeElement>,
    pub extends: Vec<ExtendElement>,
    pub services: Vec<ServiceElement>,
    pub options: Vec<OptionElement>,
}

impl ProtoFileElement {
    /// An empty file at `location`, useful as a starting point.
    pub fn empty(location: Location) -> ProtoFileElement {
        ProtoFileElement {
            location,
            ..ProtoFileElement::default()
        }
    }
}

/// A declared message or enum.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeElement {
    Message(MessageElement),
    Enum(EnumElement),
}

impl TypeElement {
    pub fn name(&self) -> &str {
        match self {
            TypeElement::Message(message) => &message.name,
            TypeElement::Enum(enum_element) => &enum_element.name,
        }
    }

    pub fn location(&self) -> &Location {
        match self {
            TypeElement::Message(message) => &message.location,
            TypeElement::Enum(enum_element) => &enum_element.location,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageElement {
    pub location: Location,
    pub name: String,
    pub documentation: String,
    pub fields: Vec<FieldElement>,
    pub nested_types: Vec<TypeElement>,
    pub options: Vec<OptionElement>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnumElement {
    pub location: Location,
    pub name: String,
    pub documentation: String,
    pub constants: Vec<EnumConstantElement>,
    pub options: Vec<OptionElement>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnumConstantElement {
    pub location: Location,
    pub name: String,
    pub tag: i32,
    pub documentation: String,
    pub options: Vec<OptionElement>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldElement {
    pub location: Location,
    pub label: Option<Label>,
    /// The type exactly as written: `Circle`, `.squareup.Circle`,
    /// `map<string, Circle>`, `int32`, ...
    pub type_name: String,
    pub name: String,
    pub tag: i32,
    pub documentation: String,
    pub options: Vec<OptionElement>,
}

/// An `extend Target { ... }` declaration injecting fields into a foreign
/// message, most commonly one of the option-carrying descriptor types.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtendElement {
    pub location: Location,
    /// The target type as written.
    pub name: String,
    pub documentation: String,
    pub fields: Vec<FieldElement>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceElement {
    pub location: Location,
    pub name: String,
    pub documentation: String,
    pub rpcs: Vec<RpcElement>,
    pub options: Vec<OptionElement>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RpcElement {
    pub location: Location,
    pub name: String,
    pub documentation: String,
    pub request_type: String,
    pub response_type: String,
    pub options: Vec<OptionElement>,
}

/// One applied option. The name is either a plain built-in name
/// (`deprecated`) or starts with a parenthesized extension reference
/// (`(squareup.units).unit`).
#[derive(Debug, Clone, PartialEq)]
pub struct OptionElement {
    pub location: Location,
    pub name: String,
    pub value: Value,
}

impl OptionElement {
    pub fn new(location: Location, name: impl Into<String>, value: Value) -> OptionElement {
        OptionElement {
            location,
            name: name.into(),
            value,
        }
    }
}
