//! Core types for Vaultkeep.

mod identifiers;
mod item;
mod record;

pub use identifiers::*;
pub use item::*;
pub use record::*;
