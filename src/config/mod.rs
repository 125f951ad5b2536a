//! Profile parsing, validation and resolution
//!
//! This module handles loading profile documents, interpolating their
//! variables and resolving tasks into runnable materials.

pub mod interpolate;
pub mod parse;
pub mod resolve;
pub mod schema;
pub mod types;

// Re-export main types
pub use interpolate::*;
pub use parse::*;
pub use resolve::*;
pub use schema::*;
pub use types::*;
