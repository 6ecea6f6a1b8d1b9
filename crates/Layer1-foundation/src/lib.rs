//! # swarm-foundation
//!
//! Foundation layer for agent-swarm:
//! - Error: the shared error taxonomy (`Error`, `Result`)
//! - Config: layered `SwarmConfig` (user file, project file, explicit file, env)
//!
//! ## Layering
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  swarm-cli    (clap, tracing-subscriber)      │
//! │       │                                       │
//! │       ▼                                       │
//! │  swarm-task   (tasks, engine, scheduler)      │
//! │       │                                       │
//! │       ▼                                       │
//! │  swarm-foundation (Error, SwarmConfig)        │
//! └──────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config
// ============================================================================
pub use config::{
    ConfigLoader, RunConfig, SwarmConfig, ToolConfig, CONFIG_DIR_NAME, CONFIG_FILE,
    DEFAULT_APPROVAL, DEFAULT_BINARY, DEFAULT_MODEL_ENV, DEFAULT_QUICK_TIMEOUT_SECS,
};
