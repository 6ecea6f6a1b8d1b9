//! Configuration Loader
//!
//! ## Search order (lowest priority first)
//!
//! 1. User-level: `<config_dir>/agent-swarm/config.toml`
//! 2. Project-level: `<workspace>/.swarm/config.toml`
//! 3. Explicit: paths added with [`ConfigLoader::add_path`] (e.g. `--config`)
//!
//! Tables are deep-merged, so a later file only needs the keys it overrides.

use super::swarm::SwarmConfig;
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Project-level config directory
pub const CONFIG_DIR_NAME: &str = ".swarm";

/// Config file name inside each config directory
pub const CONFIG_FILE: &str = "config.toml";

/// User-level config directory name under `dirs::config_dir()`
const USER_CONFIG_DIR: &str = "agent-swarm";

// ============================================================================
// ConfigLoader
// ============================================================================

/// Config file location
#[derive(Debug, Clone)]
struct ConfigPath {
    path: PathBuf,
    /// Higher wins
    priority: u8,
    description: &'static str,
}

/// Loads and merges `SwarmConfig` layers
pub struct ConfigLoader {
    search_paths: Vec<ConfigPath>,
}

impl ConfigLoader {
    /// Default search paths for a workspace
    pub fn new(working_dir: &Path) -> Self {
        let mut paths = Vec::new();

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(ConfigPath {
                path: config_dir.join(USER_CONFIG_DIR).join(CONFIG_FILE),
                priority: 10,
                description: "User config",
            });
        }

        paths.push(ConfigPath {
            path: working_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE),
            priority: 20,
            description: "Project config",
        });

        Self {
            search_paths: paths,
        }
    }

    /// Custom search paths, in ascending priority
    pub fn with_paths(paths: Vec<PathBuf>) -> Self {
        let search_paths = paths
            .into_iter()
            .enumerate()
            .map(|(i, path)| ConfigPath {
                path,
                priority: i as u8,
                description: "Custom",
            })
            .collect();

        Self { search_paths }
    }

    /// Add a search path
    pub fn add_path(&mut self, path: PathBuf, priority: u8) {
        self.search_paths.push(ConfigPath {
            path,
            priority,
            description: "Explicit config",
        });
        self.search_paths.sort_by_key(|p| p.priority);
    }

    /// Merge every existing layer into a validated config
    pub fn load(&self) -> Result<SwarmConfig> {
        let mut merged = toml::Table::new();

        for config_path in self.sorted() {
            if !config_path.path.exists() {
                debug!("No config at {}", config_path.path.display());
                continue;
            }

            let layer = read_table(&config_path.path)?;
            info!(
                "Loaded {} from: {}",
                config_path.description,
                config_path.path.display()
            );
            merge_tables(&mut merged, layer);
        }

        let config: SwarmConfig = toml::Value::Table(merged).try_into()?;
        config.validate()?;
        Ok(config)
    }

    fn sorted(&self) -> Vec<&ConfigPath> {
        let mut paths: Vec<&ConfigPath> = self.search_paths.iter().collect();
        paths.sort_by_key(|p| p.priority);
        paths
    }
}

fn read_table(path: &Path) -> Result<toml::Table> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    content
        .parse::<toml::Table>()
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Deep merge: nested tables merge key by key, anything else is replaced
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
