//! Configuration schema, loading, and validation.

mod schema;
mod loader;

pub use schema::*;
pub use loader::*;
