//! The object model for linked schemas: type names, declarations, and the
//! indexed [`Schema`](schema::Schema) container they live in.

pub(crate) mod proto_type;
pub(crate) mod schema;
pub(crate) mod types;
