//! Engine-independent schema model

pub mod column;
pub mod registry;
pub mod table;

pub use column::TypedColumn;
pub use registry::SchemaRegistry;
pub use table::{EdgeTableSpec, NodeTableSpec, TableSpec, FROM_COLUMN, TO_COLUMN};
