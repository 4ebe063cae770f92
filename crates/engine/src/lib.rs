//! # Engine: Runtime Lookup Over a Loaded Rule Dataset
//!
//! The host (a decompiler annotator) activates a [`LinterPlugin`] once and
//! then asks it, per referenced signature, which findings apply. Queries are
//! synchronous, side-effect free and never touch the filesystem.

pub mod config;
pub mod constants;
pub mod context;
pub mod deps;
pub mod finding;
pub mod lookup;
pub mod plugin;

pub use config::{ConfigError, ConfigOverrides, LinterConfig};
pub use constants::{ArgValue, ConstantResolution, Replacement};
pub use context::{QueryContext, QueryError};
pub use deps::DependencyTracker;
pub use finding::{Finding, MatchScope};
pub use lookup::LookupEngine;
pub use plugin::{LinterPlugin, PluginStatus};
