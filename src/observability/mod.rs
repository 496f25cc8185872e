//! Logging setup for the command-line tool.
//!
//! Logs always go to stderr; stdout is reserved for discovery and statistics
//! output consumed by monitoring agents.

mod tracing_init;

pub use tracing_init::*;
