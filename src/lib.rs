//! Delegator - a node-local diagnostic agent
//!
//! Delegator reads a profile describing diagnostic tasks, waits for each
//! task's condition on a monitored process, and runs allow-listed tools
//! through an executor binary under layered deadlines.

// Public modules
pub mod cli;
pub mod config;
pub mod error;
pub mod runner;
pub mod system;

// Re-export commonly used types
pub use error::{DelegatorError, Result};

/// Current version of Delegator
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
