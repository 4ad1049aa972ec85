// ==============================================================================
// Canonical Type Names
// ==============================================================================
//
// `ProtoType` is the sole lookup key into every symbol table in this crate: a
// canonical, fully-qualified dotted name such as `squareup.colors.Blue`. Two
// values are equal iff their canonical strings are equal, so equality and
// hashing are defined on the string alone even for map types that also carry
// their parsed key/value halves.
//
// Scalar types (`int32`, `string`, ...) are recognized by `ProtoType::get` and
// never participate in resolution: a written name that matches a scalar is
// final. Map types are written `map<K, V>` and carry the key and value types
// so the linker can resolve the halves and the pruner can follow the value.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// The built-in scalar type names, in the order the language defines them.
const SCALARS: [&str; 15] = [
    "bool", "bytes", "double", "float", "fixed32", "fixed64", "int32", "int64", "sfixed32",
    "sfixed64", "sint32", "sint64", "string", "uint32", "uint64",
];

/// A canonical, fully-qualified type name.
#[derive(Debug, Clone)]
pub struct ProtoType {
    string: String,
    scalar: bool,
    /// Present only for `map<K, V>` types.
    map_types: Option<Box<(ProtoType, ProtoType)>>,
}

impl ProtoType {
    /// Interpret a written type name: a scalar, a `map<K, V>`, or a (possibly
    /// not yet fully-qualified) named type. Never fails -- a malformed name
    /// simply becomes an unresolvable named type, which the linker reports at
    /// the reference that used it.
    pub fn get(name: &str) -> ProtoType {
        if SCALARS.contains(&name) {
            return ProtoType {
                string: name.to_string(),
                scalar: true,
                map_types: None,
            };
        }
        if let Some(inner) = name.strip_prefix("map<").and_then(|s| s.strip_suffix('>'))
            && let Some((key, value)) = split_map_arguments(inner)
        {
            return ProtoType::map_of(ProtoType::get(key.trim()), ProtoType::get(value.trim()));
        }
        ProtoType {
            string: name.to_string(),
            scalar: false,
            map_types: None,
        }
    }

    /// The map type `map<key, value>`.
    pub fn map_of(key: ProtoType, value: ProtoType) -> ProtoType {
        let string = format!("map<{key}, {value}>");
        ProtoType {
            string,
            scalar: false,
            map_types: Some(Box::new((key, value))),
        }
    }

    /// The type named `name` nested directly inside `self`.
    pub fn nested(&self, name: &str) -> ProtoType {
        ProtoType {
            string: format!("{}.{}", self.string, name),
            scalar: false,
            map_types: None,
        }
    }

    /// The canonical dotted name.
    pub fn as_str(&self) -> &str {
        &self.string
    }

    pub fn is_scalar(&self) -> bool {
        self.scalar
    }

    pub fn is_map(&self) -> bool {
        self.map_types.is_some()
    }

    /// The key type of a map, if this is a map.
    pub fn key_type(&self) -> Option<&ProtoType> {
        self.map_types.as_ref().map(|kv| &kv.0)
    }

    /// The value type of a map, if this is a map.
    pub fn value_type(&self) -> Option<&ProtoType> {
        self.map_types.as_ref().map(|kv| &kv.1)
    }

    /// The name after the final dot: `squareup.colors.Blue` -> `Blue`.
    pub fn simple_name(&self) -> &str {
        match self.string.rfind('.') {
            Some(dot) => &self.string[dot + 1..],
            None => &self.string,
        }
    }

    /// Everything before the final dot: the enclosing message for a nested
    /// type, or the package for a top-level one. `None` for unqualified names.
    pub fn enclosing_type_or_package(&self) -> Option<&str> {
        self.string.rfind('.').map(|dot| &self.string[..dot])
    }
}

/// Split the interior of `map<...>` at the comma separating key from value.
/// Nested maps are not a thing in the language, so the first comma wins, but
/// the value half may itself contain dots.
fn split_map_arguments(inner: &str) -> Option<(&str, &str)> {
    let comma = inner.find(',')?;
    Some((&inner[..comma], &inner[comma + 1..]))
}

impl fmt::Display for ProtoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.string)
    }
}

impl PartialEq for ProtoType {
    fn eq(&self, other: &Self) -> bool {
        self.string == other.string
    }
}

impl Eq for ProtoType {}

impl Hash for ProtoType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.string.hash(state);
    }
}

impl PartialOrd for ProtoType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ProtoType {
    fn cmp(&self, other: &Self) -> Ordering {
        self.string.cmp(&other.string)
    }
}

/// `&str` lookups into maps keyed by `ProtoType`, without allocating.
impl indexmap::Equivalent<ProtoType> for str {
    fn equivalent(&self, key: &ProtoType) -> bool {
        self == key.string
    }
}

/// A `(type, member name)` pair: the key for field lookups and for option
/// linking marks. The member is a plain field name for declared fields and a
/// package-qualified name for extension fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProtoMember {
    ty: ProtoType,
    member: String,
}

impl ProtoMember {
    pub fn new(ty: ProtoType, member: impl Into<String>) -> ProtoMember {
        ProtoMember {
            ty,
            member: member.into(),
        }
    }

    pub fn ty(&self) -> &ProtoType {
        &self.ty
    }

    pub fn member(&self) -> &str {
        &self.member
    }
}

impl fmt::Display for ProtoMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.ty, self.member)
    }
}
