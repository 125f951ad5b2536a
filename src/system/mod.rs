//! Operating system collaborators
//!
//! Metrics, registry lookups and the output directory sit behind small
//! traits and types so the runner can be driven without a live system.

pub mod metrics;
pub mod output;
pub mod registry;

pub use metrics::*;
pub use output::*;
pub use registry::*;
