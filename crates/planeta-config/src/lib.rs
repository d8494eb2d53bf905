//! Configuration for the planeta demo and tools.
//!
//! Settings persist to disk as RON, can be overridden from the command line
//! via clap, and support change detection for hot-reload. Unknown fields are
//! ignored and missing fields fall back to defaults, so old config files keep
//! loading as sections grow.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{CameraConfig, Config, DebugConfig, SchedulerConfig, TerrainConfig};
pub use error::ConfigError;
