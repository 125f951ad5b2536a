//! Task execution engine
//!
//! This module drives resolved tasks: condition inspection, action
//! execution with deadlines, and the manager that schedules handlers.

pub mod command;
pub mod context;
pub mod criteria;
pub mod deadline;
pub mod handler;
pub mod inspector;
pub mod manager;
pub mod state;

#[cfg(test)]
pub(crate) mod fakes;

// Re-export main types
pub use command::*;
pub use context::*;
pub use criteria::*;
pub use deadline::*;
pub use handler::*;
pub use inspector::*;
pub use manager::*;
pub use state::*;
