//! CLI interface and argument parsing
//!
//! This module handles command-line parsing, logging setup and the
//! run/validate/list commands.

pub mod app;

// Re-export main types
pub use app::*;
