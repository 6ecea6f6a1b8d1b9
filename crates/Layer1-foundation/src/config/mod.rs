//! Config - layered run configuration
//!
//! - `swarm.rs` - SwarmConfig (tool + run settings)
//! - `loader.rs` - ConfigLoader (user / project / explicit TOML files)

mod loader;
mod swarm;

pub use loader::{ConfigLoader, CONFIG_DIR_NAME, CONFIG_FILE};
pub use swarm::{
    RunConfig, SwarmConfig, ToolConfig, DEFAULT_APPROVAL, DEFAULT_BINARY, DEFAULT_MODEL_ENV,
    DEFAULT_QUICK_TIMEOUT_SECS,
};
